//! Core domain types for the ratings pipeline.
//!
//! These are the conceptual entities that flow between stages. On disk every
//! one of them is a line of delimited text (see [`crate::codec`]); in memory
//! they are plain structs with public fields.

use serde::{Deserialize, Serialize};

// =============================================================================
// Type Aliases
// =============================================================================
// These make the domain clearer and prevent mixing up user IDs with item IDs

/// Unique identifier for a user
pub type UserId = u32;

/// Unique identifier for an item
pub type ItemId = u32;

// =============================================================================
// Input
// =============================================================================

/// One sparse entry of the user-item rating matrix R
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingEntry {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub score: f64,
}

// =============================================================================
// Item-item matrices
// =============================================================================

/// Entry (a, b) of the co-occurrence matrix C: users who rated both a and b
///
/// The relation is symmetric but stored as directed pairs, so `(a, b)` and
/// `(b, a)` are separate entries with the same count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CooccurrencePair {
    pub item_a: ItemId,
    pub item_b: ItemId,
    pub count: u64,
}

/// Row-normalized form of a co-occurrence entry
///
/// `weight = count(a, b) / sum_b count(a, b)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSimilarity {
    pub item_a: ItemId,
    pub item_b: ItemId,
    pub weight: f64,
}

// =============================================================================
// Matrix product
// =============================================================================

/// One term of the dot product for (user, target), keyed by the source item
/// it was joined on
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartialProduct {
    pub user_id: UserId,
    pub target: ItemId,
    pub source: ItemId,
    pub value: f64,
}

/// Sum of all partial products for (user, target): the predicted preference
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregatedScore {
    pub user_id: UserId,
    pub target: ItemId,
    pub total: f64,
}

// =============================================================================
// Output
// =============================================================================

/// A single ranked entry of a recommendation list
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecommendedItem {
    pub item_id: ItemId,
    pub score: f64,
}

/// Final ranked list for one user, highest score first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub user_id: UserId,
    pub items: Vec<RecommendedItem>,
}

impl Recommendation {
    pub fn new(user_id: UserId, items: Vec<RecommendedItem>) -> Self {
        Self { user_id, items }
    }

    /// Item ids in rank order
    pub fn item_ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|i| i.item_id).collect()
    }
}
