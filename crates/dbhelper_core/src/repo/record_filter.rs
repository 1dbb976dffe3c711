//! Filter definition bound to a record collection.

use super::collection::Collection;
use crate::db::{quote_identifier, DbHelper, DbResult, DbValue, Params};
use crate::filter::{FilterCriteria, FilterDefinition};
use crate::model::{Entity, Record};
use std::rc::Rc;

/// Selects the primary keys of one entity table, scoped by the foreign
/// keys of the collection that created it.
pub struct RecordFilter<E: Entity> {
    entity: Rc<E>,
    foreign_keys: Params,
}

impl<E: Entity> RecordFilter<E> {
    pub(crate) fn new(entity: Rc<E>, foreign_keys: Params) -> Self {
        Self {
            entity,
            foreign_keys,
        }
    }

    pub fn entity(&self) -> &E {
        &self.entity
    }

    pub fn foreign_keys(&self) -> &Params {
        &self.foreign_keys
    }

    /// Alias when one is set, the quoted table name otherwise.
    pub fn table_selector(&self, criteria: &FilterCriteria<Self>) -> String {
        match criteria.select_alias() {
            Some(alias) => alias.to_string(),
            None => quote_identifier(self.entity.table_name()),
        }
    }

    fn qualify(&self, criteria: &FilterCriteria<Self>, column: &str) -> String {
        if column.contains('.') {
            return column.to_string();
        }
        format!("{}.{}", self.table_selector(criteria), quote_identifier(column))
    }
}

impl<E: Entity> FilterDefinition for RecordFilter<E> {
    fn table_name(&self) -> &str {
        self.entity.table_name()
    }

    fn table_alias(&self) -> &str {
        self.entity.table_name()
    }

    fn select_fields(&self, criteria: &FilterCriteria<Self>) -> Vec<String> {
        vec![self.qualify(criteria, self.entity.primary_name())]
    }

    fn search_fields(&self, criteria: &FilterCriteria<Self>) -> Vec<String> {
        self.entity
            .searchable_keys()
            .iter()
            .map(|column| self.qualify(criteria, column))
            .collect()
    }

    fn query_template(&self, criteria: &FilterCriteria<Self>) -> String {
        let mut from = quote_identifier(self.entity.table_name());
        if let Some(alias) = criteria.select_alias() {
            from.push_str(" AS ");
            from.push_str(alias);
        }
        format!("SELECT {{WHAT}} FROM {from} {{JOINS}} {{WHERE}} {{GROUPBY}} {{ORDERBY}} {{LIMIT}}")
    }

    fn init(&self, criteria: &mut FilterCriteria<Self>) {
        criteria.set_order_by(self.entity.default_sort_key(), self.entity.default_sort_dir());
    }

    fn prepare_query(&self, criteria: &mut FilterCriteria<Self>) -> DbResult<()> {
        self.entity.prepare_filter(criteria)?;

        for (column, value) in &self.foreign_keys {
            let column = self.qualify(criteria, column);
            criteria.add_where_column_equals(&column, value.clone())?;
        }
        Ok(())
    }
}

impl<E: Entity> FilterCriteria<RecordFilter<E>> {
    /// Primary keys of all matching records.
    pub fn get_ids(&mut self, db: &mut DbHelper) -> DbResult<Vec<i64>> {
        let primary = self.definition().entity().primary_name().to_string();
        let rows = self.get_items(db)?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get(&primary).and_then(DbValue::as_i64))
            .collect())
    }

    /// Matching records, loaded through `collection` in query order.
    pub fn get_items_objects<'c>(
        &mut self,
        db: &mut DbHelper,
        collection: &'c mut Collection<E>,
    ) -> DbResult<Vec<&'c Record<E>>> {
        let ids = self.get_ids(db)?;
        for id in &ids {
            collection.get_by_id(db, *id)?;
        }

        let collection: &'c Collection<E> = collection;
        Ok(ids.iter().filter_map(|id| collection.cached(*id)).collect())
    }
}
