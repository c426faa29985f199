//! S2 Normalization
//!
//! Rescales co-occurrence counts into row-normalized similarity weights:
//! `weight(a, b) = count(a, b) / sum_b count(a, b)`.
//!
//! Items that co-occur with everything get large row sums, so dividing by the
//! row sum removes the bias towards popular items. Weights in a row sum to 1.
//! A row whose counts sum to zero produces no output.

use anyhow::Result;
use data_loader::codec::{parse_id, split_record};
use data_loader::{ItemId, ItemPayload, TextRecord, Token};
use dataflow::Stage;
use std::collections::BTreeMap;

/// Row-sum normalization of the co-occurrence matrix
pub struct NormalizationStage;

impl Stage for NormalizationStage {
    type Key = ItemId;
    type Value = (ItemId, u64);

    fn name(&self) -> &str {
        "S2-normalization"
    }

    fn map(
        &self,
        _input: usize,
        line: &str,
        emit: &mut Vec<(ItemId, (ItemId, u64))>,
    ) -> Result<()> {
        let (key, value) = split_record(line)?;
        let item_a = parse_id("itemA", key)?;
        // User score tokens share this dataset; only increments matter here
        if let Token::Cooccurrence { item, count } = Token::parse(value, ItemPayload::Count)? {
            emit.push((item_a, (item, count)));
        }
        Ok(())
    }

    fn reduce(
        &self,
        item_a: &ItemId,
        values: Vec<(ItemId, u64)>,
        output: &mut Vec<TextRecord>,
    ) -> Result<()> {
        let mut row: BTreeMap<ItemId, u64> = BTreeMap::new();
        for (item_b, count) in values {
            *row.entry(item_b).or_insert(0) += count;
        }

        let total: u64 = row.values().sum();
        if total == 0 {
            return Ok(());
        }

        for (item_b, count) in row {
            let token = Token::Similarity {
                item: item_b,
                weight: count as f64 / total as f64,
            };
            output.push(TextRecord::new(item_a.to_string(), token.to_string()));
        }
        Ok(())
    }
}
