//! # Data Loader Crate
//!
//! Ratings input and the record formats that flow between pipeline stages.
//!
//! ## Main Components
//!
//! - **types**: Domain types (RatingEntry, PartialProduct, Recommendation, ...)
//! - **codec**: The `key<TAB>value` text wire format and its typed tokens
//! - **parser**: Parse raw ratings files (CSV or MovieLens layout)
//! - **index**: In-memory RatingIndex for reference computations
//! - **error**: Error types for parsing and decoding
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::{ItemPayload, Token, codec};
//!
//! let (key, value) = codec::split_record("101\t7_user:4.5,9_user:2")?;
//! for token in codec::split_list(value) {
//!     match Token::parse(token, ItemPayload::Weight)? {
//!         Token::UserScore { user, score } => println!("{key}: user {user} scored {score}"),
//!         other => println!("{key}: {other}"),
//!     }
//! }
//! ```

// Public modules
pub mod codec;
pub mod error;
pub mod index;
pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use codec::{ItemPayload, TextRecord, Token};
pub use error::{RecordError, Result};
pub use index::RatingIndex;
pub use types::{
    // Type aliases
    ItemId,
    UserId,
    // Core types
    AggregatedScore,
    CooccurrencePair,
    NormalizedSimilarity,
    PartialProduct,
    RatingEntry,
    Recommendation,
    RecommendedItem,
};
