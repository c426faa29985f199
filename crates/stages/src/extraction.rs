//! S1 Extraction
//!
//! Turns raw ratings into one item-keyed dataset that mixes two kinds of
//! tokens:
//! - `item<TAB><user>_user:<score>` for every rating
//! - `a<TAB>b:1` for every ordered pair of distinct items a user rated
//!
//! ## Algorithm
//! 1. Map: parse each rating and key it by user
//! 2. Reduce (per user): keep the last rating per item, then emit the user's
//!    score tokens and all ordered co-occurrence increments
//!
//! A user with a single rated item yields no co-occurrence increments.

use anyhow::Result;
use data_loader::parser::parse_rating_line;
use data_loader::{ItemId, TextRecord, Token, UserId};
use dataflow::Stage;
use std::collections::BTreeMap;

/// Per-user pair generation
pub struct ExtractionStage;

impl Stage for ExtractionStage {
    type Key = UserId;
    type Value = (ItemId, f64);

    fn name(&self) -> &str {
        "S1-extraction"
    }

    fn map(
        &self,
        _input: usize,
        line: &str,
        emit: &mut Vec<(UserId, (ItemId, f64))>,
    ) -> Result<()> {
        let rating = parse_rating_line(line)?;
        emit.push((rating.user_id, (rating.item_id, rating.score)));
        Ok(())
    }

    fn reduce(
        &self,
        user: &UserId,
        values: Vec<(ItemId, f64)>,
        output: &mut Vec<TextRecord>,
    ) -> Result<()> {
        let items: BTreeMap<ItemId, f64> = values.into_iter().collect();

        for (&item, &score) in &items {
            let token = Token::UserScore { user: *user, score };
            output.push(TextRecord::new(item.to_string(), token.to_string()));
        }

        for &item_a in items.keys() {
            for &item_b in items.keys() {
                if item_a == item_b {
                    continue;
                }
                let token = Token::Cooccurrence {
                    item: item_b,
                    count: 1,
                };
                output.push(TextRecord::new(item_a.to_string(), token.to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::ItemPayload;
    use data_loader::codec::split_record;
    use dataflow::execute;
    use std::collections::HashMap;

    fn run(lines: &[&str]) -> Vec<String> {
        let records: Vec<(usize, String)> = lines.iter().map(|l| (0, l.to_string())).collect();
        execute(&ExtractionStage, &records, 2, 2)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// (a, b) -> summed count
    fn cooccurrence_counts(lines: &[String]) -> HashMap<(ItemId, ItemId), u64> {
        let mut counts = HashMap::new();
        for line in lines {
            let (key, value) = split_record(line).unwrap();
            let token = Token::parse(value, ItemPayload::Count).unwrap();
            if let Token::Cooccurrence { item, count } = token {
                *counts.entry((key.parse().unwrap(), item)).or_insert(0) += count;
            }
        }
        counts
    }

    #[test]
    fn test_single_item_user_has_no_pairs() {
        let lines = run(&["1,101,5"]);
        assert_eq!(lines, vec!["101\t1_user:5"]);
    }

    #[test]
    fn test_user_scores_keyed_by_item() {
        let lines = run(&["1,101,5", "1,102,3"]);
        assert!(lines.contains(&"101\t1_user:5".to_string()));
        assert!(lines.contains(&"102\t1_user:3".to_string()));
        assert!(lines.contains(&"101\t102:1".to_string()));
        assert!(lines.contains(&"102\t101:1".to_string()));
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_cooccurrence_is_symmetric() {
        let lines = run(&[
            "1,101,5", "1,102,3", "1,103,1",
            "2,101,4", "2,103,2",
            "3,102,5", "3,103,5", "3,104,2",
        ]);
        let counts = cooccurrence_counts(&lines);

        assert_eq!(counts[&(101, 103)], 2);
        for (&(a, b), &count) in &counts {
            assert_ne!(a, b);
            assert_eq!(counts[&(b, a)], count, "count({a},{b}) != count({b},{a})");
        }
    }

    #[test]
    fn test_duplicate_rating_counts_once() {
        let lines = run(&["1,101,2", "1,102,3", "1,101,4"]);
        let counts = cooccurrence_counts(&lines);
        assert_eq!(counts[&(101, 102)], 1);
        assert!(lines.contains(&"101\t1_user:4".to_string()));
    }

    #[test]
    fn test_malformed_rating_fails() {
        let records = vec![(0, "1;101;5".to_string())];
        assert!(execute(&ExtractionStage, &records, 1, 1).is_err());
    }
}
