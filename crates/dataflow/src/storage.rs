//! Dataset storage.
//!
//! A dataset is a directory holding one `part-r-NNNNN` file per reduce
//! partition and an empty `_SUCCESS` marker written last. Readers refuse
//! datasets without the marker, so a stage never consumes a predecessor that
//! did not finish.

use anyhow::{Context, Result, bail};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Completion marker written after every part file
pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// File name of a reduce partition's output
pub fn part_name(partition: usize) -> String {
    format!("part-r-{:05}", partition)
}

/// Storage addressable by path.
///
/// `write_dataset` is write-once: it fails if the location already exists.
/// Callers that re-run a stage delete the location first.
pub trait DatasetStore: Send + Sync {
    fn exists(&self, location: &Path) -> Result<bool>;

    fn delete_if_exists(&self, location: &Path) -> Result<()>;

    /// Write one part per partition, then the completion marker
    fn write_dataset(&self, location: &Path, partitions: &[Vec<String>]) -> Result<()>;

    /// All non-empty lines of a completed dataset, part by part
    fn read_lines(&self, location: &Path) -> Result<Vec<String>>;
}

/// Datasets as directories on the local filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalStore;

impl DatasetStore for LocalStore {
    fn exists(&self, location: &Path) -> Result<bool> {
        location
            .try_exists()
            .with_context(|| format!("Failed to stat {}", location.display()))
    }

    fn delete_if_exists(&self, location: &Path) -> Result<()> {
        if !self.exists(location)? {
            return Ok(());
        }
        debug!("Deleting previous output at {}", location.display());
        if location.is_dir() {
            fs::remove_dir_all(location)
        } else {
            fs::remove_file(location)
        }
        .with_context(|| format!("Failed to delete {}", location.display()))
    }

    fn write_dataset(&self, location: &Path, partitions: &[Vec<String>]) -> Result<()> {
        if self.exists(location)? {
            bail!(
                "Output location {} already exists; delete it before writing",
                location.display()
            );
        }
        if let Some(parent) = location.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::create_dir(location)
            .with_context(|| format!("Failed to create dataset {}", location.display()))?;

        for (partition, lines) in partitions.iter().enumerate() {
            let path = location.join(part_name(partition));
            let file = File::create(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            for line in lines {
                writeln!(writer, "{}", line)?;
            }
            writer.flush()?;
        }

        File::create(location.join(SUCCESS_MARKER))
            .with_context(|| format!("Failed to mark {} complete", location.display()))?;
        Ok(())
    }

    fn read_lines(&self, location: &Path) -> Result<Vec<String>> {
        if !location.join(SUCCESS_MARKER).is_file() {
            bail!(
                "Dataset {} is not materialized (no {} marker)",
                location.display(),
                SUCCESS_MARKER
            );
        }

        let mut parts = Vec::new();
        for entry in fs::read_dir(location)
            .with_context(|| format!("Failed to list {}", location.display()))?
        {
            let path = entry?.path();
            let is_part = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("part-"));
            if is_part {
                parts.push(path);
            }
        }
        parts.sort();

        let mut lines = Vec::new();
        for part in parts {
            let content = fs::read_to_string(&part)
                .with_context(|| format!("Failed to read {}", part.display()))?;
            lines.extend(
                content
                    .lines()
                    .map(|line| line.trim_end_matches('\r'))
                    .filter(|line| !line.is_empty())
                    .map(str::to_string),
            );
        }
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("step1");
        let store = LocalStore;

        let partitions = vec![
            vec!["1\ta".to_string(), "2\tb".to_string()],
            vec![],
            vec!["3\tc".to_string()],
        ];
        store.write_dataset(&location, &partitions).unwrap();

        assert!(location.join("part-r-00001").is_file());
        assert!(location.join(SUCCESS_MARKER).is_file());
        assert_eq!(store.read_lines(&location).unwrap(), vec!["1\ta", "2\tb", "3\tc"]);
    }

    #[test]
    fn test_write_requires_absent_location() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("out");
        let store = LocalStore;

        store.write_dataset(&location, &[vec!["x".to_string()]]).unwrap();
        assert!(store.write_dataset(&location, &[]).is_err());

        store.delete_if_exists(&location).unwrap();
        assert!(!store.exists(&location).unwrap());
        store.write_dataset(&location, &[]).unwrap();
    }

    #[test]
    fn test_read_requires_success_marker() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("partial");
        fs::create_dir(&location).unwrap();
        fs::write(location.join(part_name(0)), "1\ta\n").unwrap();

        assert!(LocalStore.read_lines(&location).is_err());
    }

    #[test]
    fn test_delete_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        LocalStore.delete_if_exists(&dir.path().join("nothing")).unwrap();
    }
}
