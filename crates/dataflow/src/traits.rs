//! Core traits for the dataflow engine.
//!
//! A stage is a map function and a reduce function over text records. The
//! engine owns everything in between: splitting, shuffling, grouping and
//! writing the output.

use anyhow::Result;
use data_loader::TextRecord;
use std::fmt::Debug;
use std::hash::Hash;

/// One map/shuffle/reduce step of a batch pipeline.
///
/// ## Design Note
/// - `Send + Sync` lets map and reduce tasks share one stage instance across
///   the thread pool
/// - Keys must be `Hash` for partitioning and `Ord` for deterministic group
///   order within a partition
/// - Values are typed, so a stage that joins two streams carries an enum
///   through the shuffle rather than re-parsing text in the reducer
pub trait Stage: Send + Sync {
    type Key: Hash + Ord + Debug + Send;
    type Value: Send;

    /// Returns the name of this stage (for logging and reports)
    fn name(&self) -> &str;

    /// Map one input line to zero or more key-value pairs.
    ///
    /// # Arguments
    /// * `input` - Position of the line's dataset in the stage's input list
    /// * `line` - The raw record
    /// * `emit` - Sink for intermediate pairs
    ///
    /// # Returns
    /// * `Err` - If the record is malformed; the whole stage aborts
    fn map(&self, input: usize, line: &str, emit: &mut Vec<(Self::Key, Self::Value)>)
    -> Result<()>;

    /// Reduce every value shuffled to one key.
    ///
    /// Value order carries no meaning. Output records are written in the
    /// order they are pushed.
    fn reduce(
        &self,
        key: &Self::Key,
        values: Vec<Self::Value>,
        output: &mut Vec<TextRecord>,
    ) -> Result<()>;
}
