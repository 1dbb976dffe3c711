//! Record collections: lookup, caching, creation and deletion.
//!
//! # Responsibility
//! - Load records by id or column value and cache them per instance.
//! - Scope every query by the collection's foreign keys.
//! - Create records inside an active transaction.
//!
//! # Invariants
//! - A cached record is handed out for every later lookup of its id.
//! - A parent record can be bound at most once.
//! - Collections declaring a parent type refuse record lookups until a
//!   parent is bound.

use super::record_filter::RecordFilter;
use crate::db::{
    build_where_fields_statement, quote_identifier, DbError, DbHelper, DbResult, DbValue, Params,
};
use crate::filter::FilterCriteria;
use crate::model::{Entity, EntityDescription, ParentRecord, Record};
use log::info;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::rc::Rc;

pub struct Collection<E: Entity> {
    entity: Rc<E>,
    records: HashMap<i64, Record<E>>,
    foreign_keys: Params,
    parent: Option<ParentRecord>,
    dummy: Option<Record<E>>,
}

impl<E: Entity> Collection<E> {
    pub fn new(entity: E) -> Self {
        Self::from_shared(Rc::new(entity))
    }

    pub fn from_shared(entity: Rc<E>) -> Self {
        Self {
            entity,
            records: HashMap::new(),
            foreign_keys: Params::new(),
            parent: None,
            dummy: None,
        }
    }

    pub fn entity(&self) -> &E {
        &self.entity
    }

    pub fn describe(&self) -> EntityDescription {
        self.entity.describe()
    }

    /// Column constraints added to every query of this collection.
    pub fn foreign_keys(&self) -> &Params {
        &self.foreign_keys
    }

    /// Adds a column constraint to every later query.
    pub fn set_foreign_key(&mut self, column: &str, value: impl Into<DbValue>) -> &mut Self {
        self.foreign_keys.insert(column.to_string(), value.into());
        self.records.clear();
        self.dummy = None;
        self
    }

    // ---- parent binding ----

    /// Scopes this collection by `record`'s primary key.
    ///
    /// # Errors
    /// - [`DbError::CollectionAlreadyHasParent`] on a second call.
    /// - [`DbError::BindingNotAllowed`] when the entity declares no parent
    ///   of `record`'s type, or `record` is a template.
    pub fn bind_parent_record<P: Entity>(&mut self, record: &Record<P>) -> DbResult<()> {
        let collection = self.entity.type_name().to_string();
        let described = describe_record(record.record_type_name(), record.id());

        if let Some(bound) = &self.parent {
            return Err(DbError::CollectionAlreadyHasParent {
                collection,
                record: described,
                bound: describe_record(&bound.type_name, Some(bound.id)),
            });
        }

        let parent = record
            .to_parent()
            .filter(|parent| self.entity.parent_type() == Some(parent.type_name.as_str()))
            .ok_or(DbError::BindingNotAllowed {
                collection,
                record: described,
            })?;

        self.set_foreign_key(&parent.primary_name, parent.id);
        self.parent = Some(parent);
        Ok(())
    }

    pub fn parent_record(&self) -> Option<&ParentRecord> {
        self.parent.as_ref()
    }

    /// # Errors
    /// - [`DbError::CollectionHasNoParent`] when no parent type is declared.
    pub fn parent_type(&self) -> DbResult<&str> {
        self.entity
            .parent_type()
            .ok_or_else(|| DbError::CollectionHasNoParent {
                collection: self.entity.type_name().to_string(),
            })
    }

    fn require_parent(&self) -> DbResult<()> {
        if self.entity.has_parent_collection() && self.parent.is_none() {
            return Err(DbError::NoParentRecordBound {
                collection: self.entity.type_name().to_string(),
            });
        }
        Ok(())
    }

    fn scoped_where(&self, column: &str, value: DbValue) -> Params {
        let mut where_fields = self.foreign_keys.clone();
        where_fields.insert(column.to_string(), value);
        where_fields
    }

    // ---- lookups ----

    /// Cached record `id`, loading it on first access.
    ///
    /// # Errors
    /// - [`DbError::NoParentRecordBound`] when a required parent is missing.
    /// - [`DbError::RecordDoesNotExist`] when no row matches.
    pub fn get_by_id(&mut self, db: &mut DbHelper, id: i64) -> DbResult<&mut Record<E>> {
        if !self.records.contains_key(&id) {
            self.require_parent()?;
        }

        match self.records.entry(id) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let record = Record::load(
                    Rc::clone(&self.entity),
                    db,
                    id,
                    self.foreign_keys.clone(),
                    self.parent.clone(),
                )?;
                Ok(entry.insert(record))
            }
        }
    }

    pub(crate) fn cached(&self, id: i64) -> Option<&Record<E>> {
        self.records.get(&id)
    }

    /// First record whose `column` equals `value`, in default sort order.
    pub fn get_by_key(
        &mut self,
        db: &mut DbHelper,
        column: &str,
        value: impl Into<DbValue>,
    ) -> DbResult<Option<&mut Record<E>>> {
        let value = value.into();
        if column == self.entity.primary_name() {
            return match value.as_i64() {
                Some(id) => self.get_by_id(db, id).map(Some),
                None => Ok(None),
            };
        }

        let primary = self.entity.primary_name();
        let where_fields = self.scoped_where(column, value);
        let sql = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY {} {} LIMIT 1",
            quote_identifier(primary),
            quote_identifier(self.entity.table_name()),
            build_where_fields_statement(&where_fields),
            quote_identifier(self.entity.default_sort_key()),
            self.entity.default_sort_dir()
        );

        let found = db.fetch_key(primary, &sql, &where_fields)?;
        match found.and_then(|value| value.as_i64()) {
            Some(id) => self.get_by_id(db, id).map(Some),
            None => Ok(None),
        }
    }

    pub fn id_exists(&mut self, db: &mut DbHelper, id: i64) -> DbResult<bool> {
        if self.records.contains_key(&id) {
            return Ok(true);
        }
        Ok(self
            .record_key_value_exists(db, self.entity.primary_name(), id)?
            .is_some())
    }

    /// Id of a record whose `column` equals `value`, if any.
    pub fn record_key_value_exists(
        &self,
        db: &mut DbHelper,
        column: &str,
        value: impl Into<DbValue>,
    ) -> DbResult<Option<i64>> {
        let primary = self.entity.primary_name();
        let where_fields = self.scoped_where(column, value.into());
        let sql = format!(
            "SELECT {} FROM {} WHERE {}",
            quote_identifier(primary),
            quote_identifier(self.entity.table_name()),
            build_where_fields_statement(&where_fields)
        );

        Ok(db
            .fetch_key(primary, &sql, &where_fields)?
            .and_then(|value| value.as_i64()))
    }

    /// Metadata-only record, created once per collection.
    ///
    /// # Errors
    /// - [`DbError::IdTableSameAsRecordTable`] for a misconfigured entity.
    pub fn create_dummy_record(&mut self) -> DbResult<&Record<E>> {
        self.check_id_table()?;

        let entity = Rc::clone(&self.entity);
        let foreign_keys = self.foreign_keys.clone();
        let parent = self.parent.clone();
        let dummy = self
            .dummy
            .get_or_insert_with(|| Record::template(entity, foreign_keys, parent));
        Ok(&*dummy)
    }

    fn check_id_table(&self) -> DbResult<()> {
        match self.entity.id_table() {
            Some(table) if table == self.entity.table_name() => {
                Err(DbError::IdTableSameAsRecordTable {
                    collection: self.entity.type_name().to_string(),
                    table: table.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    // ---- writes ----

    /// Inserts a row with `data` plus the foreign keys and returns the
    /// loaded record.
    ///
    /// # Errors
    /// - [`DbError::TransactionRequired`] without an active transaction.
    /// - [`DbError::IdTableSameAsRecordTable`] for a misconfigured entity.
    pub fn create_new_record(&mut self, db: &mut DbHelper, data: Params) -> DbResult<&mut Record<E>> {
        db.require_transaction(&format!("Create a new {}", self.entity.type_name()))?;
        self.check_id_table()?;

        let mut data = data;
        data.extend(self.foreign_keys.clone());

        let table = self.entity.table_name();
        let id = match self.entity.id_table() {
            Some(id_table) => {
                let id = db.insert_dynamic(id_table, &Params::new())?;
                data.insert(self.entity.primary_name().to_string(), DbValue::Integer(id));
                db.insert_dynamic(table, &data)?;
                id
            }
            None => db.insert_dynamic(table, &data)?,
        };

        info!(
            "event=record_create module=collection status=ok type={} id={id}",
            self.entity.type_name()
        );

        let entity = Rc::clone(&self.entity);
        let record = self.get_by_id(db, id)?;
        entity.on_created(record, db)?;
        Ok(record)
    }

    /// Evicts record `id` from the cache and deletes its row.
    pub fn delete_record(&mut self, db: &mut DbHelper, id: i64) -> DbResult<bool> {
        self.records.remove(&id);

        let where_fields = self.scoped_where(self.entity.primary_name(), DbValue::Integer(id));
        let deleted = db.delete_records(self.entity.table_name(), &where_fields)?;
        info!(
            "event=record_delete module=collection status=ok type={} id={id}",
            self.entity.type_name()
        );
        Ok(deleted)
    }

    // ---- filters ----

    /// Filter over this collection's table, inheriting its foreign keys
    /// and default sort.
    pub fn get_filter_criteria(&self) -> FilterCriteria<RecordFilter<E>> {
        FilterCriteria::new(RecordFilter::new(
            Rc::clone(&self.entity),
            self.foreign_keys.clone(),
        ))
    }

    /// Every record in default sort order.
    pub fn get_all(&mut self, db: &mut DbHelper) -> DbResult<Vec<&Record<E>>> {
        self.require_parent()?;
        let mut criteria = self.get_filter_criteria();
        criteria.get_items_objects(db, self)
    }

    pub fn count_records(&self, db: &mut DbHelper) -> DbResult<i64> {
        self.require_parent()?;
        self.get_filter_criteria().count_items(db)
    }
}

fn describe_record(type_name: &str, id: Option<i64>) -> String {
    match id {
        Some(id) => format!("{type_name}, ID {id}"),
        None => format!("{type_name}, template"),
    }
}
