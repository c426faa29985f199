//! S4a Partial Multiply
//!
//! Joins similarity rows and user-score columns on the shared source item and
//! emits every term of the matrix product routed through that item.
//!
//! ## Algorithm
//! 1. Map: split `<source><TAB><list>` back into single tokens, decode each
//!    into a [`JoinEntry`] and emit it under the source item. Rows and columns
//!    arrive as one combined stream; the shuffle merges both sides of a key
//!    into one group
//! 2. Reduce (per source item): bucket the group by variant, then emit the
//!    full cross product `user x target`, keyed by `(user, target, source)`
//!    with value `score * weight`
//!
//! A group with an empty bucket yields no records and is not an error.

use anyhow::{Result, bail};
use data_loader::codec::{parse_id, split_list, split_record};
use data_loader::{ItemId, ItemPayload, PartialProduct, TextRecord, Token, UserId};
use dataflow::Stage;

/// One side of the join, carried through the shuffle as an explicit variant
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JoinEntry {
    UserScore { user: UserId, score: f64 },
    Similarity { item: ItemId, weight: f64 },
}

impl TryFrom<Token> for JoinEntry {
    type Error = anyhow::Error;

    fn try_from(token: Token) -> Result<Self> {
        match token {
            Token::UserScore { user, score } => Ok(JoinEntry::UserScore { user, score }),
            Token::Similarity { item, weight } => Ok(JoinEntry::Similarity { item, weight }),
            Token::Cooccurrence { .. } => bail!("raw co-occurrence count {token} cannot be joined"),
        }
    }
}

/// All partial products for one source item
///
/// Emits exactly `users x targets` products, each the plain IEEE product of
/// its two fields.
pub fn cross_product(source: ItemId, entries: Vec<JoinEntry>) -> Vec<PartialProduct> {
    let mut users = Vec::new();
    let mut targets = Vec::new();
    for entry in entries {
        match entry {
            JoinEntry::UserScore { user, score } => users.push((user, score)),
            JoinEntry::Similarity { item, weight } => targets.push((item, weight)),
        }
    }

    let mut products = Vec::with_capacity(users.len() * targets.len());
    for &(user_id, score) in &users {
        for &(target, weight) in &targets {
            products.push(PartialProduct {
                user_id,
                target,
                source,
                value: score * weight,
            });
        }
    }
    products
}

/// Cross product of user columns and similarity rows per source item
pub struct PartialMultiplyStage;

impl Stage for PartialMultiplyStage {
    type Key = ItemId;
    type Value = JoinEntry;

    fn name(&self) -> &str {
        "S4a-partial-multiply"
    }

    fn map(&self, _input: usize, line: &str, emit: &mut Vec<(ItemId, JoinEntry)>) -> Result<()> {
        let (key, value) = split_record(line)?;
        let source = parse_id("itemSource", key)?;
        for token in split_list(value) {
            let entry = JoinEntry::try_from(Token::parse(token, ItemPayload::Weight)?)?;
            emit.push((source, entry));
        }
        Ok(())
    }

    fn reduce(
        &self,
        source: &ItemId,
        values: Vec<JoinEntry>,
        output: &mut Vec<TextRecord>,
    ) -> Result<()> {
        output.extend(
            cross_product(*source, values)
                .iter()
                .map(PartialProduct::to_record),
        );
        Ok(())
    }
}
