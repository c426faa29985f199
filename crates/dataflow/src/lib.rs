//! Map/shuffle/reduce engine for batch stages.
//!
//! This crate provides:
//! - The `Stage` trait: a map function and a reduce function
//! - `StageRunner` for executing a stage against stored datasets
//! - `DatasetStore` and its local-filesystem implementation
//!
//! ## Architecture
//! A stage runs in three phases:
//! 1. Map tasks process disjoint splits of the input in parallel
//! 2. The shuffle routes each emitted pair to one reduce partition by key
//! 3. Reduce tasks process their partitions in parallel and the output is
//!    written as one part file per partition
//!
//! ## Example Usage
//! ```ignore
//! use dataflow::{LocalStore, StageRunner};
//! use std::sync::Arc;
//!
//! let runner = StageRunner::new(Arc::new(LocalStore)).with_reduce_tasks(4);
//! let report = runner.run(&my_stage, &[input_path], &output_path)?;
//! println!("{} wrote {} records", report.name, report.output_records);
//! ```

pub mod engine;
pub mod storage;
pub mod traits;

// Re-export main types
pub use engine::{Execution, StageReport, StageRunner, execute};
pub use storage::{DatasetStore, LocalStore, SUCCESS_MARKER, part_name};
pub use traits::Stage;
