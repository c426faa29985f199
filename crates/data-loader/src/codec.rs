//! Text wire format shared by every stage.
//!
//! Records are lines of the form `key<TAB>value`. Grouped values are
//! comma-separated token lists, and a token is `subkey:payload`:
//!
//! - `<userID>_user:<score>`: a user score
//! - `<itemID>:<count>`: a co-occurrence increment
//! - `<itemID>:<weight>`: a normalized similarity weight
//!
//! Item tokens with a count and with a weight look alike on the wire, so the
//! reader states which one it expects via [`ItemPayload`]. The `_user` suffix
//! is decoded here, once, into [`Token::UserScore`]; stages only ever match on
//! the variant.

use crate::error::{RecordError, Result};
use crate::types::*;
use std::fmt;

/// Separates the key from the value of a record
pub const RECORD_DELIMITER: char = '\t';

/// Separates tokens in a grouped value, and fields of composite keys
pub const LIST_DELIMITER: char = ',';

/// Separates a token's subkey from its payload
pub const PAYLOAD_DELIMITER: char = ':';

/// Suffix that marks a token's subkey as a user id
pub const USER_TAG: &str = "_user";

// =============================================================================
// Records
// =============================================================================

/// A single output line, `key<TAB>value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRecord {
    pub key: String,
    pub value: String,
}

impl TextRecord {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for TextRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.key, RECORD_DELIMITER, self.value)
    }
}

/// Split a line into its key and value
///
/// Exactly one tab is allowed; anything else is a malformed record.
pub fn split_record(line: &str) -> Result<(&str, &str)> {
    let (key, value) = line
        .split_once(RECORD_DELIMITER)
        .ok_or_else(|| RecordError::MissingDelimiter {
            delimiter: RECORD_DELIMITER,
            record: line.to_string(),
        })?;
    if value.contains(RECORD_DELIMITER) {
        return Err(RecordError::FieldCountMismatch {
            expected: 2,
            found: line.split(RECORD_DELIMITER).count(),
            record: line.to_string(),
        });
    }
    Ok((key, value))
}

/// Iterate over the tokens of a grouped value
pub fn split_list(value: &str) -> impl Iterator<Item = &str> + '_ {
    value.split(LIST_DELIMITER)
}

/// Split a composite key such as `user,target,source` into exactly `N` fields
fn split_key<const N: usize>(key: &str) -> Result<[&str; N]> {
    let fields: Vec<&str> = key.split(LIST_DELIMITER).collect();
    fields
        .try_into()
        .map_err(|fields: Vec<&str>| RecordError::FieldCountMismatch {
            expected: N,
            found: fields.len(),
            record: key.to_string(),
        })
}

// =============================================================================
// Field parsing
// =============================================================================

/// Parse a user or item identifier
pub fn parse_id(field: &str, value: &str) -> Result<u32> {
    value.parse().map_err(|_| RecordError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    })
}

/// Parse a score, weight or product; NaN and infinities are rejected
pub fn parse_float(field: &str, value: &str) -> Result<f64> {
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(RecordError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Parse a co-occurrence count
pub fn parse_count(value: &str) -> Result<u64> {
    value.parse().map_err(|_| RecordError::InvalidValue {
        field: "count".to_string(),
        value: value.to_string(),
    })
}

// =============================================================================
// Tokens
// =============================================================================

/// What the payload of an item token means in the dataset being read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemPayload {
    /// Integer co-occurrence increment (extraction output)
    Count,
    /// Float similarity weight (normalization output and later)
    Weight,
}

/// A decoded `subkey:payload` token
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token {
    UserScore { user: UserId, score: f64 },
    Cooccurrence { item: ItemId, count: u64 },
    Similarity { item: ItemId, weight: f64 },
}

impl Token {
    /// Decode a token, reading item payloads as `payload` says
    pub fn parse(token: &str, payload: ItemPayload) -> Result<Self> {
        let (subkey, value) =
            token
                .split_once(PAYLOAD_DELIMITER)
                .ok_or_else(|| RecordError::MissingDelimiter {
                    delimiter: PAYLOAD_DELIMITER,
                    record: token.to_string(),
                })?;

        if let Some(user) = subkey.strip_suffix(USER_TAG) {
            return Ok(Token::UserScore {
                user: parse_id("userID", user)?,
                score: parse_float("score", value)?,
            });
        }

        let item = parse_id("itemID", subkey)?;
        match payload {
            ItemPayload::Count => Ok(Token::Cooccurrence {
                item,
                count: parse_count(value)?,
            }),
            ItemPayload::Weight => Ok(Token::Similarity {
                item,
                weight: parse_float("weight", value)?,
            }),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::UserScore { user, score } => {
                write!(f, "{user}{USER_TAG}{PAYLOAD_DELIMITER}{score}")
            }
            Token::Cooccurrence { item, count } => write!(f, "{item}{PAYLOAD_DELIMITER}{count}"),
            Token::Similarity { item, weight } => write!(f, "{item}{PAYLOAD_DELIMITER}{weight}"),
        }
    }
}

// =============================================================================
// Typed records
// =============================================================================

impl PartialProduct {
    /// `user,target,source<TAB>value`
    pub fn to_record(&self) -> TextRecord {
        TextRecord::new(
            format!("{},{},{}", self.user_id, self.target, self.source),
            self.value.to_string(),
        )
    }

    pub fn parse(line: &str) -> Result<Self> {
        let (key, value) = split_record(line)?;
        let [user, target, source] = split_key::<3>(key)?;
        Ok(Self {
            user_id: parse_id("userID", user)?,
            target: parse_id("itemTarget", target)?,
            source: parse_id("itemSource", source)?,
            value: parse_float("product", value)?,
        })
    }
}

impl AggregatedScore {
    /// `user,target<TAB>total`
    pub fn to_record(&self) -> TextRecord {
        TextRecord::new(
            format!("{},{}", self.user_id, self.target),
            self.total.to_string(),
        )
    }

    pub fn parse(line: &str) -> Result<Self> {
        let (key, value) = split_record(line)?;
        let [user, target] = split_key::<2>(key)?;
        Ok(Self {
            user_id: parse_id("userID", user)?,
            target: parse_id("itemTarget", target)?,
            total: parse_float("total", value)?,
        })
    }
}

impl Recommendation {
    /// `user<TAB>item:score,item:score,...`
    pub fn to_record(&self) -> TextRecord {
        let list = self
            .items
            .iter()
            .map(|i| {
                Token::Similarity {
                    item: i.item_id,
                    weight: i.score,
                }
                .to_string()
            })
            .collect::<Vec<_>>()
            .join(",");
        TextRecord::new(self.user_id.to_string(), list)
    }

    pub fn parse(line: &str) -> Result<Self> {
        let (key, value) = split_record(line)?;
        let user_id = parse_id("userID", key)?;
        let mut items = Vec::new();
        for token in split_list(value) {
            match Token::parse(token, ItemPayload::Weight)? {
                Token::Similarity { item, weight } => items.push(RecommendedItem {
                    item_id: item,
                    score: weight,
                }),
                other => {
                    return Err(RecordError::InvalidValue {
                        field: "recommended item".to_string(),
                        value: other.to_string(),
                    });
                }
            }
        }
        Ok(Self { user_id, items })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_record() {
        assert_eq!(split_record("7\t3:1").unwrap(), ("7", "3:1"));
        assert!(matches!(
            split_record("7 3:1"),
            Err(RecordError::MissingDelimiter { delimiter: '\t', .. })
        ));
        assert!(matches!(
            split_record("7\t3:1\t4:1"),
            Err(RecordError::FieldCountMismatch { .. })
        ));
    }

    #[test]
    fn test_parse_user_token() {
        let token = Token::parse("42_user:4.5", ItemPayload::Weight).unwrap();
        assert_eq!(token, Token::UserScore { user: 42, score: 4.5 });
    }

    #[test]
    fn test_item_payload_context() {
        assert_eq!(
            Token::parse("9:3", ItemPayload::Count).unwrap(),
            Token::Cooccurrence { item: 9, count: 3 }
        );
        assert_eq!(
            Token::parse("9:0.25", ItemPayload::Weight).unwrap(),
            Token::Similarity { item: 9, weight: 0.25 }
        );
        // A fractional count is not a count
        assert!(Token::parse("9:0.25", ItemPayload::Count).is_err());
    }

    #[test]
    fn test_malformed_tokens() {
        assert!(matches!(
            Token::parse("42_user", ItemPayload::Weight),
            Err(RecordError::MissingDelimiter { delimiter: ':', .. })
        ));
        assert!(matches!(
            Token::parse("42_user:high", ItemPayload::Weight),
            Err(RecordError::InvalidValue { .. })
        ));
        assert!(matches!(
            Token::parse("abc:1", ItemPayload::Count),
            Err(RecordError::InvalidValue { .. })
        ));
        assert!(Token::parse("3:NaN", ItemPayload::Weight).is_err());
        assert!(Token::parse("", ItemPayload::Weight).is_err());
    }

    #[test]
    fn test_token_display_matches_wire() {
        assert_eq!(Token::UserScore { user: 3, score: 5.0 }.to_string(), "3_user:5");
        assert_eq!(Token::Cooccurrence { item: 8, count: 1 }.to_string(), "8:1");
        assert_eq!(Token::Similarity { item: 8, weight: 0.5 }.to_string(), "8:0.5");
    }

    #[test]
    fn test_partial_product_record() {
        let product = PartialProduct {
            user_id: 1,
            target: 102,
            source: 101,
            value: 2.5,
        };
        let line = product.to_record().to_string();
        assert_eq!(line, "1,102,101\t2.5");
        assert!(PartialProduct::parse("1,102\t2.5").is_err());
    }

    #[test]
    fn test_recommendation_record() {
        let rec = Recommendation::parse("5\t12:9,3:4.5").unwrap();
        assert_eq!(rec.user_id, 5);
        assert_eq!(rec.item_ids(), vec![12, 3]);
        assert_eq!(rec.to_record().to_string(), "5\t12:9,3:4.5");
    }
}
