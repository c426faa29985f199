//! S5 Ranking
//!
//! Groups aggregated scores by user and keeps the `top_n` best items.
//!
//! ## Inputs
//! - input 0: aggregated scores, `user,target<TAB>total`
//! - input 1 (optional): user columns, `item<TAB>u_user:s,...`, read only to
//!   learn which items each user already rated
//!
//! ## Ordering
//! Descending by score; equal scores are ordered by ascending item id so the
//! output never depends on shuffle order.

use anyhow::{Result, bail};
use data_loader::codec::{parse_id, split_list, split_record};
use data_loader::{
    AggregatedScore, ItemId, ItemPayload, Recommendation, RecommendedItem, TextRecord, Token,
    UserId,
};
use dataflow::Stage;
use std::collections::HashSet;

/// Position of the aggregated scores among the stage inputs
pub const SCORES_INPUT: usize = 0;

/// Position of the user columns among the stage inputs
pub const RATED_INPUT: usize = 1;

/// Values shuffled to a user's group
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RankInput {
    Scored { item: ItemId, total: f64 },
    Rated { item: ItemId },
}

/// Sort by score descending, ties by item id ascending, and keep `top_n`
pub fn rank_items(mut scored: Vec<(ItemId, f64)>, top_n: usize) -> Vec<RecommendedItem> {
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    scored.truncate(top_n);
    scored
        .into_iter()
        .map(|(item_id, score)| RecommendedItem { item_id, score })
        .collect()
}

/// Per-user top-N selection
pub struct RankingStage {
    top_n: usize,
    exclude_rated: bool,
}

impl RankingStage {
    /// Create a ranking stage keeping `top_n` items per user
    pub fn new(top_n: usize) -> Self {
        Self {
            top_n,
            exclude_rated: false,
        }
    }

    /// Drop items the user already rated (default: false)
    ///
    /// Requires the user columns as the stage's second input.
    pub fn with_exclude_rated(mut self, exclude_rated: bool) -> Self {
        self.exclude_rated = exclude_rated;
        self
    }
}

impl Stage for RankingStage {
    type Key = UserId;
    type Value = RankInput;

    fn name(&self) -> &str {
        "S5-ranking"
    }

    fn map(&self, input: usize, line: &str, emit: &mut Vec<(UserId, RankInput)>) -> Result<()> {
        match input {
            SCORES_INPUT => {
                let score = AggregatedScore::parse(line)?;
                emit.push((
                    score.user_id,
                    RankInput::Scored {
                        item: score.target,
                        total: score.total,
                    },
                ));
            }
            RATED_INPUT => {
                let (key, value) = split_record(line)?;
                let item = parse_id("itemID", key)?;
                for token in split_list(value) {
                    match Token::parse(token, ItemPayload::Weight)? {
                        Token::UserScore { user, .. } => {
                            emit.push((user, RankInput::Rated { item }))
                        }
                        other => bail!("expected a user score token, found {other}"),
                    }
                }
            }
            other => bail!("ranking reads at most two inputs, got input #{other}"),
        }
        Ok(())
    }

    fn reduce(
        &self,
        user: &UserId,
        values: Vec<RankInput>,
        output: &mut Vec<TextRecord>,
    ) -> Result<()> {
        let mut rated = HashSet::new();
        let mut scored = Vec::new();
        for value in values {
            match value {
                RankInput::Scored { item, total } => scored.push((item, total)),
                RankInput::Rated { item } => {
                    rated.insert(item);
                }
            }
        }

        if self.exclude_rated {
            scored.retain(|(item, _)| !rated.contains(item));
        }

        let items = rank_items(scored, self.top_n);
        if items.is_empty() {
            return Ok(());
        }
        output.push(Recommendation::new(*user, items).to_record());
        Ok(())
    }
}
