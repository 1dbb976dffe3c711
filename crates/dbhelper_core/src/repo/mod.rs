//! Record collections and their filters.
//!
//! # Responsibility
//! - Load, cache, create and delete records of one [`crate::model::Entity`].
//! - List and count records through collection-bound filter criteria.
//!
//! # Invariants
//! - Every statement issued here is scoped by the collection's foreign
//!   keys.
//! - Creating a record requires an active transaction.
//!
//! # See also
//! - `crate::filter` for the query builder behind [`RecordFilter`].

mod collection;
mod record_filter;

pub use collection::Collection;
pub use record_filter::RecordFilter;
