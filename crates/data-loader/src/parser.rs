//! Parser for raw ratings files.
//!
//! Two line layouts are accepted:
//! - CSV: `userId,itemId,score`
//! - MovieLens: `userId::itemId::score::timestamp` (timestamp is ignored)
//!
//! Blank lines are skipped. Anything else that fails to parse is an error;
//! there is no skip-and-continue.

use crate::codec::{parse_float, parse_id};
use crate::error::{RecordError, Result};
use crate::types::*;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Read a file as Latin-1 and split it into lines
///
/// MovieLens files are ISO-8859-1. Each byte maps directly to a Unicode code
/// point, so decoding never fails.
pub fn read_lines_latin1(path: &Path) -> Result<Vec<String>> {
    let mut file = File::open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;

    let content: String = bytes.iter().map(|&b| b as char).collect();

    Ok(content.lines().map(|s| s.to_string()).collect())
}

/// Parse a single ratings line
pub fn parse_rating_line(line: &str) -> Result<RatingEntry> {
    let line = line.trim();
    let fields: Vec<&str> = if line.contains("::") {
        line.split("::").map(str::trim).collect()
    } else {
        line.split(',').map(str::trim).collect()
    };

    // user, item, score and an optional timestamp
    if !(3..=4).contains(&fields.len()) {
        return Err(RecordError::FieldCountMismatch {
            expected: 3,
            found: fields.len(),
            record: line.to_string(),
        });
    }

    Ok(RatingEntry {
        user_id: parse_id("userID", fields[0])?,
        item_id: parse_id("itemID", fields[1])?,
        score: parse_float("score", fields[2])?,
    })
}

/// Parse ratings from already-loaded text
///
/// `source` names the input in error messages.
pub fn parse_ratings_str(content: &str, source: &str) -> Result<Vec<RatingEntry>> {
    let mut ratings = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let rating = parse_rating_line(line).map_err(|e| RecordError::ParseError {
            file: source.to_string(),
            line: idx + 1,
            reason: e.to_string(),
        })?;
        ratings.push(rating);
    }

    Ok(ratings)
}

/// Parse a ratings file
pub fn parse_ratings(path: &Path) -> Result<Vec<RatingEntry>> {
    let lines = read_lines_latin1(path)?;
    parse_ratings_str(&lines.join("\n"), &path.display().to_string())
}
