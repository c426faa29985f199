//! S3 Partitioning
//!
//! Two selection-and-reformatting stages that give the partial multiply two
//! plain inputs keyed by the same source item:
//! - [`SimilarityRowsStage`] (S3a): normalized rows, `a<TAB>b:w,c:w,...`
//! - [`UserColumnsStage`] (S3b): rating columns, `item<TAB>u_user:s,v_user:s,...`
//!
//! Neither stage aggregates. Tokens of an unexpected shape abort the stage.

use anyhow::{Result, bail};
use data_loader::codec::{parse_id, split_list, split_record};
use data_loader::{ItemId, ItemPayload, TextRecord, Token, UserId};
use dataflow::Stage;

/// Join tokens of one group into a comma list
fn join_tokens(tokens: impl Iterator<Item = Token>) -> String {
    tokens.map(|t| t.to_string()).collect::<Vec<_>>().join(",")
}

/// S3a: groups the normalization output into one row per item
pub struct SimilarityRowsStage;

impl Stage for SimilarityRowsStage {
    type Key = ItemId;
    type Value = (ItemId, f64);

    fn name(&self) -> &str {
        "S3a-similarity-rows"
    }

    fn map(
        &self,
        _input: usize,
        line: &str,
        emit: &mut Vec<(ItemId, (ItemId, f64))>,
    ) -> Result<()> {
        let (key, value) = split_record(line)?;
        let source = parse_id("itemA", key)?;
        for token in split_list(value) {
            match Token::parse(token, ItemPayload::Weight)? {
                Token::Similarity { item, weight } => emit.push((source, (item, weight))),
                other => bail!("expected a similarity token, found {other}"),
            }
        }
        Ok(())
    }

    fn reduce(
        &self,
        source: &ItemId,
        mut values: Vec<(ItemId, f64)>,
        output: &mut Vec<TextRecord>,
    ) -> Result<()> {
        values.sort_by_key(|(item, _)| *item);
        let row = join_tokens(
            values
                .into_iter()
                .map(|(item, weight)| Token::Similarity { item, weight }),
        );
        output.push(TextRecord::new(source.to_string(), row));
        Ok(())
    }
}

/// S3b: selects user scores out of the extraction output, one column per item
pub struct UserColumnsStage;

impl Stage for UserColumnsStage {
    type Key = ItemId;
    type Value = (UserId, f64);

    fn name(&self) -> &str {
        "S3b-user-columns"
    }

    fn map(
        &self,
        _input: usize,
        line: &str,
        emit: &mut Vec<(ItemId, (UserId, f64))>,
    ) -> Result<()> {
        let (key, value) = split_record(line)?;
        let item = parse_id("itemID", key)?;
        for token in split_list(value) {
            if let Token::UserScore { user, score } = Token::parse(token, ItemPayload::Count)? {
                emit.push((item, (user, score)));
            }
        }
        Ok(())
    }

    fn reduce(
        &self,
        item: &ItemId,
        mut values: Vec<(UserId, f64)>,
        output: &mut Vec<TextRecord>,
    ) -> Result<()> {
        values.sort_by_key(|(user, _)| *user);
        let column = join_tokens(
            values
                .into_iter()
                .map(|(user, score)| Token::UserScore { user, score }),
        );
        output.push(TextRecord::new(item.to_string(), column));
        Ok(())
    }
}
