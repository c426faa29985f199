//! Error types for the data-loader crate.
//!
//! Every malformed record in the pipeline surfaces as one of these variants.
//! None of them is recoverable at record level: a stage that hits one aborts.

use thiserror::Error;

/// Errors that can occur while reading ratings or decoding pipeline records
#[derive(Error, Debug)]
pub enum RecordError {
    /// I/O error occurred while reading a file
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Line in a ratings file couldn't be parsed
    ///
    /// Carries the file and line so the operator can find the bad input.
    #[error("Parse error at line {line} in {file}: {reason}")]
    ParseError {
        file: String,
        line: usize,
        reason: String,
    },

    /// A record or token lacks the delimiter its shape requires
    #[error("Missing '{delimiter}' delimiter in record {record:?}")]
    MissingDelimiter { delimiter: char, record: String },

    /// A field had a non-numeric or otherwise invalid value
    #[error("Invalid value for {field}: {value:?}")]
    InvalidValue { field: String, value: String },

    /// Expected number of fields in a record doesn't match actual
    #[error("Expected {expected} fields but found {found} in record {record:?}")]
    FieldCountMismatch {
        expected: usize,
        found: usize,
        record: String,
    },
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, RecordError>;
