//! Entity descriptors and change-tracked records.
//!
//! # Responsibility
//! - Describe record tables through the [`Entity`] trait.
//! - Represent loaded rows as [`Record`] values with typed accessors.
//!
//! # See also
//! - `crate::repo` for the collections that load and cache records.

mod entity;
mod record;

pub use entity::{Entity, EntityDescription};
pub use record::{KeyChange, ParentRecord, Record, RecordState};
