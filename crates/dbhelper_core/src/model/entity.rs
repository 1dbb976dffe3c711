//! Per-table entity descriptor consumed by records and collections.
//!
//! # Responsibility
//! - Describe one record table: name, primary column, default sort and
//!   searchable columns.
//! - Offer the hooks records and collection filters call into.
//!
//! # Invariants
//! - `primary_name` is an integer column generated by the store (or by
//!   the table named by `id_table`).
//! - `id_table`, when set, differs from `table_name`.

use super::record::{KeyChange, Record};
use crate::db::{DbHelper, DbResult};
use crate::filter::{FilterCriteria, SortOrder};
use crate::repo::RecordFilter;

/// Table description plus behavior hooks for one record type.
///
/// Every hook has an empty default so plain tables only implement the
/// metadata methods.
pub trait Entity: Sized + 'static {
    fn table_name(&self) -> &str;

    fn primary_name(&self) -> &str;

    /// Short machine name, e.g. `product`.
    fn type_name(&self) -> &str;

    fn default_sort_key(&self) -> &str;

    fn default_sort_dir(&self) -> SortOrder {
        SortOrder::Asc
    }

    /// `(column, label)` pairs searched by collection filters.
    fn searchable_columns(&self) -> Vec<(String, String)>;

    fn collection_label(&self) -> String {
        self.type_name().to_string()
    }

    fn record_label(&self) -> String {
        self.type_name().to_string()
    }

    /// `(column, label)` pairs describing the record's properties.
    fn record_properties(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Separate table whose auto-increment column hands out new ids.
    fn id_table(&self) -> Option<&str> {
        None
    }

    /// Type name of the parent records this collection is scoped by.
    fn parent_type(&self) -> Option<&str> {
        None
    }

    fn has_parent_collection(&self) -> bool {
        self.parent_type().is_some()
    }

    fn searchable_keys(&self) -> Vec<String> {
        self.searchable_columns()
            .into_iter()
            .map(|(column, _)| column)
            .collect()
    }

    fn searchable_labels(&self) -> Vec<String> {
        self.searchable_columns()
            .into_iter()
            .map(|(_, label)| label)
            .collect()
    }

    fn describe(&self) -> EntityDescription {
        EntityDescription {
            type_name: self.type_name().to_string(),
            table_name: self.table_name().to_string(),
            primary_name: self.primary_name().to_string(),
            default_sort_key: self.default_sort_key().to_string(),
            default_sort_dir: self.default_sort_dir(),
            searchable_columns: self.searchable_columns(),
            collection_label: self.collection_label(),
            record_label: self.record_label(),
            record_properties: self.record_properties(),
            id_table: self.id_table().map(str::to_string),
            parent_type: self.parent_type().map(str::to_string),
        }
    }

    /// Runs after a record is loaded; register tracked keys here.
    fn init_record(&self, _record: &mut Record<Self>) {}

    /// Runs when a registered key first changes after a load or save.
    fn on_registered_key_modified(&self, _record: &Record<Self>, _change: &KeyChange) {}

    /// Runs once after a new record has been inserted and loaded.
    fn on_created(&self, _record: &mut Record<Self>, _db: &mut DbHelper) -> DbResult<()> {
        Ok(())
    }

    /// Adds joins and conditions to every collection filter query.
    fn prepare_filter(&self, _criteria: &mut FilterCriteria<RecordFilter<Self>>) -> DbResult<()> {
        Ok(())
    }
}

/// Snapshot of an entity's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescription {
    pub type_name: String,
    pub table_name: String,
    pub primary_name: String,
    pub default_sort_key: String,
    pub default_sort_dir: SortOrder,
    pub searchable_columns: Vec<(String, String)>,
    pub collection_label: String,
    pub record_label: String,
    pub record_properties: Vec<(String, String)>,
    pub id_table: Option<String>,
    pub parent_type: Option<String>,
}
