//! In-memory reference recommender.
//!
//! Computes the same recommendations as the staged pipeline with plain maps
//! on one machine: co-occurrence counts, row normalization, a dense
//! matrix-vector product per user and top-N ranking. Used to check the
//! pipeline's output on data small enough to hold in memory.

use crate::ranking::rank_items;
use data_loader::{
    CooccurrencePair, ItemId, NormalizedSimilarity, RatingIndex, Recommendation, UserId,
};
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Whether two ranked lists for the same user agree
///
/// Scores must match rank by rank within `tolerance`, and so must the item
/// ids. An item may differ only where its score ties, within `tolerance`,
/// with the expected item at that rank or with the last expected item, since
/// summation order can reorder near-equal scores or swap them across the
/// top-N cut.
pub fn recommendations_agree(
    expected: &Recommendation,
    actual: &Recommendation,
    tolerance: f64,
) -> bool {
    if expected.user_id != actual.user_id || expected.items.len() != actual.items.len() {
        return false;
    }
    let Some(cutoff) = expected.items.last().map(|item| item.score) else {
        return true;
    };
    let close = |a: f64, b: f64| (a - b).abs() < tolerance;

    expected.items.iter().zip(&actual.items).all(|(want, got)| {
        if !close(want.score, got.score) {
            return false;
        }
        if want.item_id == got.item_id {
            return true;
        }
        match expected.items.iter().find(|item| item.item_id == got.item_id) {
            Some(same) => close(same.score, got.score),
            None => close(cutoff, got.score),
        }
    })
}

/// Normalized similarity rows, keyed by source item
pub type SimilarityRows = BTreeMap<ItemId, Vec<NormalizedSimilarity>>;

/// Single-machine recommender with the pipeline's semantics
pub struct ReferenceRecommender {
    top_n: usize,
    exclude_rated: bool,
}

impl ReferenceRecommender {
    pub fn new(top_n: usize) -> Self {
        Self {
            top_n,
            exclude_rated: false,
        }
    }

    /// Drop items the user already rated (default: false)
    pub fn with_exclude_rated(mut self, exclude_rated: bool) -> Self {
        self.exclude_rated = exclude_rated;
        self
    }

    /// Co-occurrence counts over ordered pairs of distinct items
    pub fn cooccurrence(index: &RatingIndex) -> Vec<CooccurrencePair> {
        let mut counts: BTreeMap<(ItemId, ItemId), u64> = BTreeMap::new();
        for (_, items) in index.users() {
            for &item_a in items.keys() {
                for &item_b in items.keys() {
                    if item_a != item_b {
                        *counts.entry((item_a, item_b)).or_insert(0) += 1;
                    }
                }
            }
        }
        counts
            .into_iter()
            .map(|((item_a, item_b), count)| CooccurrencePair {
                item_a,
                item_b,
                count,
            })
            .collect()
    }

    /// Row-normalized similarity
    pub fn similarity(index: &RatingIndex) -> SimilarityRows {
        let mut rows: BTreeMap<ItemId, Vec<CooccurrencePair>> = BTreeMap::new();
        for pair in Self::cooccurrence(index) {
            rows.entry(pair.item_a).or_default().push(pair);
        }

        rows.into_iter()
            .filter_map(|(item_a, pairs)| {
                let total: u64 = pairs.iter().map(|p| p.count).sum();
                if total == 0 {
                    return None;
                }
                let row = pairs
                    .iter()
                    .map(|p| NormalizedSimilarity {
                        item_a,
                        item_b: p.item_b,
                        weight: p.count as f64 / total as f64,
                    })
                    .collect();
                Some((item_a, row))
            })
            .collect()
    }

    /// Predicted score for every (user, target) with at least one contributing
    /// source item
    #[instrument(skip_all)]
    pub fn predict(index: &RatingIndex) -> BTreeMap<(UserId, ItemId), f64> {
        let rows = Self::similarity(index);
        let users: Vec<_> = index.users().collect();

        let per_user: Vec<(UserId, BTreeMap<ItemId, f64>)> = users
            .par_iter()
            .map(|(user_id, items)| {
                let user_id = **user_id;
                let mut scores: BTreeMap<ItemId, f64> = BTreeMap::new();
                for (source, &score) in items.iter() {
                    let Some(row) = rows.get(source) else {
                        continue;
                    };
                    for sim in row {
                        *scores.entry(sim.item_b).or_insert(0.0) += sim.weight * score;
                    }
                }
                (user_id, scores)
            })
            .collect();

        let predictions: BTreeMap<(UserId, ItemId), f64> = per_user
            .into_iter()
            .flat_map(|(user_id, scores)| {
                scores
                    .into_iter()
                    .map(move |(target, total)| ((user_id, target), total))
            })
            .collect();
        debug!("Reference predicted {} (user, item) scores", predictions.len());
        predictions
    }

    /// Ranked recommendations for every user that has any, in user order
    pub fn recommend(&self, index: &RatingIndex) -> Vec<Recommendation> {
        let mut by_user: BTreeMap<UserId, Vec<(ItemId, f64)>> = BTreeMap::new();
        for ((user_id, target), total) in Self::predict(index) {
            let already_rated = index
                .get_user_ratings(user_id)
                .is_some_and(|items| items.contains_key(&target));
            if self.exclude_rated && already_rated {
                continue;
            }
            by_user.entry(user_id).or_default().push((target, total));
        }

        by_user
            .into_iter()
            .map(|(user_id, scored)| Recommendation::new(user_id, rank_items(scored, self.top_n)))
            .filter(|rec| !rec.items.is_empty())
            .collect()
    }
}
