//! # Stages Crate
//!
//! The map and reduce functions of the item-based collaborative filtering
//! pipeline.
//!
//! ## Components
//!
//! | Stage | Type | Output |
//! |---|---|---|
//! | S1 | [`ExtractionStage`] | `item<TAB>u_user:s` and `a<TAB>b:1` |
//! | S2 | [`NormalizationStage`] | `a<TAB>b:weight` |
//! | S3a | [`SimilarityRowsStage`] | `a<TAB>b:w,c:w,...` |
//! | S3b | [`UserColumnsStage`] | `item<TAB>u_user:s,...` |
//! | S4a | [`PartialMultiplyStage`] | `user,target,source<TAB>product` |
//! | S4b | [`AggregateStage`] | `user,target<TAB>total` |
//! | S5 | [`RankingStage`] | `user<TAB>item:score,...` |
//!
//! [`ReferenceRecommender`] computes the same result in memory.
//!
//! ## Example Usage
//!
//! ```ignore
//! use dataflow::{LocalStore, StageRunner};
//! use stages::PartialMultiplyStage;
//! use std::sync::Arc;
//!
//! let runner = StageRunner::new(Arc::new(LocalStore));
//! runner.run(&PartialMultiplyStage, &[rows, columns], &products)?;
//! ```

pub mod aggregate;
pub mod extraction;
pub mod multiply;
pub mod normalization;
pub mod partitioning;
pub mod ranking;
pub mod reference;

// Re-export commonly used types
pub use aggregate::AggregateStage;
pub use extraction::ExtractionStage;
pub use multiply::{JoinEntry, PartialMultiplyStage, cross_product};
pub use normalization::NormalizationStage;
pub use partitioning::{SimilarityRowsStage, UserColumnsStage};
pub use ranking::{RankInput, RankingStage, rank_items};
pub use reference::{ReferenceRecommender, recommendations_agree};
