//! # Orchestrator Crate
//!
//! Drives the item-based collaborative filtering pipeline over a base root.
//!
//! ## Main Components
//!
//! - **config**: `PipelineConfig`, the immutable run parameters
//! - **plan**: The stage DAG with declared inputs and outputs
//! - **orchestrator**: `RecommendationPipeline`, which ingests the ratings
//!   and runs each stage behind a barrier
//!
//! ## Example Usage
//!
//! ```ignore
//! use orchestrator::{PipelineConfig, RecommendationPipeline};
//!
//! let config = PipelineConfig::new("/data/recommend", "/data/ratings.dat").with_top_n(20);
//! let outcome = RecommendationPipeline::new(config)?.run().await?;
//! println!("{}", outcome.output.display());
//! ```

pub mod config;
pub mod orchestrator;
pub mod plan;

pub use config::{CONFIG_FILE, PipelineConfig};
pub use orchestrator::{INGEST_LABEL, PipelineOutcome, RecommendationPipeline};
pub use plan::{Dataset, PipelinePlan, PlanError, StageDescriptor, StageKind};
