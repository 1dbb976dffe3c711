//! Free-text search parsing for filter criteria.
//!
//! # Responsibility
//! - Split user search strings into terms and boolean keywords.
//! - Fold the tokens into one parameterized `LIKE` condition.
//!
//! # Invariants
//! - Quoted phrases are always single terms.
//! - The folded condition never starts or ends with a connector.

mod keywords;
mod terms;

pub use keywords::{IdentityTranslator, Keyword, KeywordMap, KeywordTranslator};
pub use terms::{
    escape_like_pattern, fold_search_tokens, tokenize_search, Connector, SearchExpression,
    SearchToken, TokenizedSearch, MIN_TERM_LENGTH,
};
