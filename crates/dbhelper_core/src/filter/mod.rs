//! Composable SELECT/COUNT query builder.
//!
//! # Responsibility
//! - Collect WHERE/JOIN/GROUP BY/HAVING/ORDER/LIMIT fragments.
//! - Turn free-text search into bound `LIKE` conditions.
//! - Execute item and count queries through [`crate::db::DbHelper`].
//!
//! # Invariants
//! - Building is idempotent for a given state: fragments are
//!   de-duplicated and equal values share one placeholder.
//!
//! # See also
//! - `crate::search` for tokenization rules.

mod criteria;
mod definition;

pub use criteria::{FilterCriteria, FilterMessage, MessageKind, SortOrder};
pub use definition::{FilterDefinition, DEFAULT_QUERY_TEMPLATE};
