//! In-memory rating index.
//!
//! Holds the whole rating matrix on one machine. The distributed stages never
//! use it; it backs the reference recommender, the CLI's `verify` command
//! and the tests that check the pipeline against a dense computation.

use crate::error::{RecordError, Result};
use crate::parser;
use crate::types::*;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Ratings grouped by user
///
/// A repeated (user, item) rating replaces the earlier one, matching the
/// extraction stage's de-duplication.
#[derive(Debug, Default, Clone)]
pub struct RatingIndex {
    user_ratings: BTreeMap<UserId, BTreeMap<ItemId, f64>>,
}

impl RatingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ratings(ratings: impl IntoIterator<Item = RatingEntry>) -> Self {
        let mut index = Self::new();
        for rating in ratings {
            index.insert_rating(rating);
        }
        index
    }

    /// Load and index a ratings file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let index = Self::from_ratings(parser::parse_ratings(path)?);
        index.validate()?;
        Ok(index)
    }

    pub fn insert_rating(&mut self, rating: RatingEntry) {
        self.user_ratings
            .entry(rating.user_id)
            .or_default()
            .insert(rating.item_id, rating.score);
    }

    /// Items rated by a user, with scores, in item order
    pub fn get_user_ratings(&self, user_id: UserId) -> Option<&BTreeMap<ItemId, f64>> {
        self.user_ratings.get(&user_id)
    }

    pub fn users(&self) -> impl Iterator<Item = (&UserId, &BTreeMap<ItemId, f64>)> {
        self.user_ratings.iter()
    }

    /// (users, items, ratings)
    pub fn counts(&self) -> (usize, usize, usize) {
        let items: BTreeSet<ItemId> = self
            .user_ratings
            .values()
            .flat_map(|items| items.keys().copied())
            .collect();
        let total = self.user_ratings.values().map(|items| items.len()).sum();
        (self.user_ratings.len(), items.len(), total)
    }

    /// Scores must be finite; the parser already guarantees this for loaded
    /// files, but hand-built indices go through here too
    pub fn validate(&self) -> Result<()> {
        for (user, items) in &self.user_ratings {
            for (item, score) in items {
                if !score.is_finite() {
                    return Err(RecordError::InvalidValue {
                        field: format!("score of user {user} for item {item}"),
                        value: score.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rating(user_id: UserId, item_id: ItemId, score: f64) -> RatingEntry {
        RatingEntry {
            user_id,
            item_id,
            score,
        }
    }

    #[test]
    fn test_empty_index() {
        let index = RatingIndex::new();
        assert_eq!(index.counts(), (0, 0, 0));
        assert!(index.get_user_ratings(1).is_none());
    }

    #[test]
    fn test_insert_and_query() {
        let index = RatingIndex::from_ratings([
            rating(1, 101, 5.0),
            rating(1, 102, 3.0),
            rating(2, 101, 4.0),
        ]);

        assert_eq!(index.counts(), (2, 2, 3));
        assert_eq!(index.get_user_ratings(1).unwrap().len(), 2);
        assert_eq!(index.get_user_ratings(2).unwrap()[&101], 4.0);
    }

    #[test]
    fn test_duplicate_rating_replaces() {
        let index = RatingIndex::from_ratings([rating(1, 101, 2.0), rating(1, 101, 4.0)]);
        assert_eq!(index.counts(), (1, 1, 1));
        assert_eq!(index.get_user_ratings(1).unwrap()[&101], 4.0);
    }

    #[test]
    fn test_validate_rejects_nan() {
        let index = RatingIndex::from_ratings([rating(1, 101, f64::NAN)]);
        assert!(index.validate().is_err());
    }
}
