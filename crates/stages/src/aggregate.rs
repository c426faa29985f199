//! S4b Aggregate
//!
//! Drops the source item from each partial product's key and sums what is
//! left per `(user, target)`. The sum is the matrix-product entry
//! `sum_s weight(s -> target) * score(user, s)`. Pairs with no contributing
//! source never appear; no explicit zeros are written.

use anyhow::Result;
use data_loader::{AggregatedScore, ItemId, PartialProduct, TextRecord, UserId};
use dataflow::Stage;

/// Sum of partial products over the discarded join key
pub struct AggregateStage;

impl Stage for AggregateStage {
    type Key = (UserId, ItemId);
    type Value = f64;

    fn name(&self) -> &str {
        "S4b-aggregate"
    }

    fn map(
        &self,
        _input: usize,
        line: &str,
        emit: &mut Vec<((UserId, ItemId), f64)>,
    ) -> Result<()> {
        let product = PartialProduct::parse(line)?;
        emit.push(((product.user_id, product.target), product.value));
        Ok(())
    }

    fn reduce(
        &self,
        key: &(UserId, ItemId),
        values: Vec<f64>,
        output: &mut Vec<TextRecord>,
    ) -> Result<()> {
        let (user_id, target) = *key;
        let score = AggregatedScore {
            user_id,
            target,
            total: values.iter().sum(),
        };
        output.push(score.to_record());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataflow::execute;

    #[test]
    fn test_sums_over_sources() {
        let records: Vec<(usize, String)> = [
            "1,103,101\t1.5",
            "1,103,102\t1",
            "2,103,101\t0.25",
            "1,104,101\t2",
        ]
        .iter()
        .map(|l| (0, l.to_string()))
        .collect();

        let execution = execute(&AggregateStage, &records, 2, 1).unwrap();
        let mut scores: Vec<AggregatedScore> = execution
            .lines()
            .map(|line| AggregatedScore::parse(line).unwrap())
            .collect();
        scores.sort_by_key(|s| (s.user_id, s.target));

        assert_eq!(scores.len(), 3);
        assert_eq!((scores[0].user_id, scores[0].target, scores[0].total), (1, 103, 2.5));
        assert_eq!((scores[1].user_id, scores[1].target, scores[1].total), (1, 104, 2.0));
        assert_eq!((scores[2].user_id, scores[2].target, scores[2].total), (2, 103, 0.25));
    }

    #[test]
    fn test_key_without_source_fails() {
        let records = vec![(0, "1,103\t1.5".to_string())];
        assert!(execute(&AggregateStage, &records, 1, 1).is_err());
    }
}
