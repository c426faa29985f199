//! Local bulk-synchronous execution of a single stage.
//!
//! ## Phases
//! 1. **Map**: input records are cut into splits of `split_lines` records;
//!    each split is an independent task on the rayon pool
//! 2. **Shuffle**: every emitted pair is routed by key hash to exactly one of
//!    `reduce_tasks` partitions and grouped by key. No reduce starts before
//!    every map task has finished
//! 3. **Reduce**: partitions run in parallel, keys within a partition in key
//!    order, so the output is byte-for-byte reproducible
//!
//! Any map or reduce error aborts the stage and nothing is written.

use crate::storage::DatasetStore;
use crate::traits::Stage;
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

/// Counters and timing for one completed stage
#[derive(Debug, Clone)]
pub struct StageReport {
    pub name: String,
    pub input_records: usize,
    pub map_tasks: usize,
    pub intermediate_records: usize,
    pub groups: usize,
    pub output_records: usize,
    pub elapsed: Duration,
}

/// Result of running a stage in memory: one vector of lines per partition
#[derive(Debug)]
pub struct Execution {
    pub partitions: Vec<Vec<String>>,
    pub map_tasks: usize,
    pub intermediate_records: usize,
    pub groups: usize,
}

impl Execution {
    pub fn output_records(&self) -> usize {
        self.partitions.iter().map(Vec::len).sum()
    }

    /// All output lines, partition by partition
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.partitions.iter().flatten().map(String::as_str)
    }
}

/// Reduce partition for a key
fn partition_for<K: Hash>(key: &K, partitions: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() % partitions as u64) as usize
}

/// Run map, shuffle and reduce over in-memory records.
///
/// Each record is `(input index, line)`.
pub fn execute<T: Stage>(
    stage: &T,
    records: &[(usize, String)],
    reduce_tasks: usize,
    split_lines: usize,
) -> Result<Execution> {
    let reduce_tasks = reduce_tasks.max(1);
    let splits: Vec<&[(usize, String)]> = records.chunks(split_lines.max(1)).collect();
    let map_tasks = splits.len();

    // Map phase
    let mapped: Vec<Vec<(T::Key, T::Value)>> = splits
        .par_iter()
        .map(|split| {
            let mut emitted = Vec::new();
            for (input, line) in split.iter() {
                stage
                    .map(*input, line, &mut emitted)
                    .with_context(|| format!("{} map failed on record {:?}", stage.name(), line))?;
            }
            Ok(emitted)
        })
        .collect::<Result<Vec<_>>>()?;

    // Shuffle: all map tasks are done at this point
    let intermediate_records = mapped.iter().map(Vec::len).sum();
    let mut partitions: Vec<BTreeMap<T::Key, Vec<T::Value>>> =
        (0..reduce_tasks).map(|_| BTreeMap::new()).collect();
    for (key, value) in mapped.into_iter().flatten() {
        let partition = partition_for(&key, reduce_tasks);
        partitions[partition].entry(key).or_default().push(value);
    }
    let groups = partitions.iter().map(BTreeMap::len).sum();
    debug!(
        "{}: {} map tasks emitted {} pairs in {} groups",
        stage.name(),
        map_tasks,
        intermediate_records,
        groups
    );

    // Reduce phase
    let partitions: Vec<Vec<String>> = partitions
        .into_par_iter()
        .map(|groups| {
            let mut output = Vec::new();
            for (key, values) in groups {
                stage.reduce(&key, values, &mut output).with_context(|| {
                    format!("{} reduce failed for key {:?}", stage.name(), key)
                })?;
            }
            Ok(output.iter().map(ToString::to_string).collect())
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Execution {
        partitions,
        map_tasks,
        intermediate_records,
        groups,
    })
}

/// Executes stages against a dataset store.
///
/// ## Usage
/// ```ignore
/// let runner = StageRunner::new(Arc::new(LocalStore)).with_reduce_tasks(8);
/// let report = runner.run(&stage, &[input], &output)?;
/// ```
#[derive(Clone)]
pub struct StageRunner {
    store: Arc<dyn DatasetStore>,
    reduce_tasks: usize,
    split_lines: usize,
}

impl StageRunner {
    pub fn new(store: Arc<dyn DatasetStore>) -> Self {
        Self {
            store,
            reduce_tasks: 4,
            split_lines: 4096,
        }
    }

    /// Configure the number of reduce partitions (default: 4)
    pub fn with_reduce_tasks(mut self, reduce_tasks: usize) -> Self {
        self.reduce_tasks = reduce_tasks.max(1);
        self
    }

    /// Configure the number of records per map task (default: 4096)
    pub fn with_split_lines(mut self, split_lines: usize) -> Self {
        self.split_lines = split_lines.max(1);
        self
    }

    pub fn store(&self) -> &Arc<dyn DatasetStore> {
        &self.store
    }

    /// Run a stage: clear its output, read its inputs, execute, write.
    ///
    /// Inputs are read in the order given; the position of each input is
    /// what the stage's `map` receives as `input`.
    #[instrument(skip_all, fields(stage = stage.name()))]
    pub fn run<T: Stage>(
        &self,
        stage: &T,
        inputs: &[PathBuf],
        output: &Path,
    ) -> Result<StageReport> {
        let start = Instant::now();

        // The output location must not exist when the stage starts
        self.store.delete_if_exists(output)?;

        let mut records = Vec::new();
        for (input, location) in inputs.iter().enumerate() {
            let lines = self
                .store
                .read_lines(location)
                .with_context(|| format!("Failed to read input {}", location.display()))?;
            debug!("Read {} records from {}", lines.len(), location.display());
            records.extend(lines.into_iter().map(|line| (input, line)));
        }

        let execution = execute(stage, &records, self.reduce_tasks, self.split_lines)?;
        self.store
            .write_dataset(output, &execution.partitions)
            .with_context(|| format!("Failed to write output {}", output.display()))?;

        let report = StageReport {
            name: stage.name().to_string(),
            input_records: records.len(),
            map_tasks: execution.map_tasks,
            intermediate_records: execution.intermediate_records,
            groups: execution.groups,
            output_records: execution.output_records(),
            elapsed: start.elapsed(),
        };
        info!(
            "Stage {} complete: {} in, {} out, {:.2?}",
            report.name, report.input_records, report.output_records, report.elapsed
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStore;
    use anyhow::bail;
    use data_loader::TextRecord;
    use std::fs;

    /// Sums `key<TAB>number` lines per key
    struct SumStage;

    impl Stage for SumStage {
        type Key = String;
        type Value = f64;

        fn name(&self) -> &str {
            "sum"
        }

        fn map(&self, _input: usize, line: &str, emit: &mut Vec<(String, f64)>) -> Result<()> {
            let Some((key, value)) = line.split_once('\t') else {
                bail!("no tab in {line:?}");
            };
            emit.push((key.to_string(), value.parse()?));
            Ok(())
        }

        fn reduce(
            &self,
            key: &String,
            values: Vec<f64>,
            output: &mut Vec<TextRecord>,
        ) -> Result<()> {
            let total: f64 = values.iter().sum();
            output.push(TextRecord::new(key.clone(), total.to_string()));
            Ok(())
        }
    }

    fn records(lines: &[&str]) -> Vec<(usize, String)> {
        lines.iter().map(|l| (0, l.to_string())).collect()
    }

    #[test]
    fn test_groups_across_splits() {
        let input = records(&["a\t1", "b\t2", "a\t3", "c\t4", "b\t5"]);
        let execution = execute(&SumStage, &input, 3, 2).unwrap();

        assert_eq!(execution.map_tasks, 3);
        assert_eq!(execution.intermediate_records, 5);
        assert_eq!(execution.groups, 3);

        let mut lines: Vec<&str> = execution.lines().collect();
        lines.sort();
        assert_eq!(lines, vec!["a\t4", "b\t7", "c\t4"]);
    }

    #[test]
    fn test_each_key_lands_in_one_partition() {
        let input = records(&["k\t1", "k\t1", "k\t1", "k\t1"]);
        let execution = execute(&SumStage, &input, 4, 1).unwrap();
        assert_eq!(execution.output_records(), 1);
        assert_eq!(execution.lines().next(), Some("k\t4"));
    }

    #[test]
    fn test_map_error_aborts() {
        let input = records(&["a\t1", "broken"]);
        let err = execute(&SumStage, &input, 2, 1).unwrap_err();
        assert!(format!("{err:#}").contains("broken"));
    }

    #[test]
    fn test_runner_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input");
        let output = dir.path().join("output");
        let store: Arc<dyn DatasetStore> = Arc::new(LocalStore);
        store
            .write_dataset(&input, &[vec!["x\t1".into(), "y\t2".into(), "x\t0.5".into()]])
            .unwrap();

        let runner = StageRunner::new(store).with_reduce_tasks(2);
        let first = runner.run(&SumStage, &[input.clone()], &output).unwrap();
        let first_bytes: Vec<Vec<u8>> = (0..2)
            .map(|p| fs::read(output.join(crate::storage::part_name(p))).unwrap())
            .collect();

        let second = runner.run(&SumStage, &[input], &output).unwrap();
        let second_bytes: Vec<Vec<u8>> = (0..2)
            .map(|p| fs::read(output.join(crate::storage::part_name(p))).unwrap())
            .collect();

        assert_eq!(first.output_records, 2);
        assert_eq!(second.output_records, 2);
        assert_eq!(first_bytes, second_bytes);
    }

    #[test]
    fn test_runner_fails_on_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let runner = StageRunner::new(Arc::new(LocalStore));
        let result = runner.run(&SumStage, &[dir.path().join("absent")], &dir.path().join("out"));
        assert!(result.is_err());
        assert!(!dir.path().join("out").exists());
    }
}
