//! One loaded table row with change tracking.
//!
//! # Responsibility
//! - Hold the column values of one row and coerce them through typed
//!   accessors.
//! - Track modified columns and write only those back on save.
//!
//! # Invariants
//! - The column set is fixed when the record is loaded.
//! - Template records reject writes and never report modifications.
//! - Saves are scoped by the owning collection's foreign keys plus the
//!   primary key, and require an active transaction.

use super::entity::Entity;
use crate::db::{
    build_set_statement, build_where_fields_statement, quote_identifier, DbError, DbHelper,
    DbResult, DbValue, Params, Row, DATETIME_FORMAT,
};
use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, info};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Whether a record stands for a stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Loaded { id: i64 },
    /// Metadata-only record without a stored row.
    Template,
}

/// Identity of the record a collection is scoped by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRecord {
    pub type_name: String,
    pub table: String,
    pub primary_name: String,
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RegisteredKey {
    label: String,
    structural: bool,
}

/// Passed to [`Entity::on_registered_key_modified`].
#[derive(Debug, Clone, PartialEq)]
pub struct KeyChange {
    pub name: String,
    pub label: String,
    pub structural: bool,
    pub old_value: DbValue,
    pub new_value: DbValue,
}

#[derive(Debug)]
pub struct Record<E: Entity> {
    entity: Rc<E>,
    state: RecordState,
    data: Row,
    modified: Vec<String>,
    registered: BTreeMap<String, RegisteredKey>,
    foreign_keys: Params,
    parent: Option<ParentRecord>,
}

impl<E: Entity> Record<E> {
    /// Loads the row `id`, scoped by `foreign_keys`.
    ///
    /// # Errors
    /// - [`DbError::RecordDoesNotExist`] when no row matches.
    pub(crate) fn load(
        entity: Rc<E>,
        db: &mut DbHelper,
        id: i64,
        foreign_keys: Params,
        parent: Option<ParentRecord>,
    ) -> DbResult<Self> {
        let mut where_keys = foreign_keys.clone();
        where_keys.insert(entity.primary_name().to_string(), DbValue::Integer(id));

        let data = db
            .fetch_data(entity.table_name(), &where_keys, &[])?
            .ok_or_else(|| DbError::RecordDoesNotExist {
                type_name: entity.type_name().to_string(),
                table: entity.table_name().to_string(),
                id,
            })?;

        let mut record = Self {
            entity: Rc::clone(&entity),
            state: RecordState::Loaded { id },
            data,
            modified: Vec::new(),
            registered: BTreeMap::new(),
            foreign_keys,
            parent,
        };
        entity.init_record(&mut record);
        Ok(record)
    }

    pub(crate) fn template(
        entity: Rc<E>,
        foreign_keys: Params,
        parent: Option<ParentRecord>,
    ) -> Self {
        let mut data = Row::new();
        data.insert(entity.primary_name().to_string(), DbValue::Null);
        Self {
            entity,
            state: RecordState::Template,
            data,
            modified: Vec::new(),
            registered: BTreeMap::new(),
            foreign_keys,
            parent,
        }
    }

    pub fn entity(&self) -> &E {
        &self.entity
    }

    pub fn state(&self) -> RecordState {
        self.state
    }

    /// Primary key; `None` for template records.
    pub fn id(&self) -> Option<i64> {
        match self.state {
            RecordState::Loaded { id } => Some(id),
            RecordState::Template => None,
        }
    }

    pub fn is_dummy(&self) -> bool {
        self.state == RecordState::Template
    }

    pub fn record_table(&self) -> &str {
        self.entity.table_name()
    }

    pub fn record_primary_name(&self) -> &str {
        self.entity.primary_name()
    }

    pub fn record_type_name(&self) -> &str {
        self.entity.type_name()
    }

    pub fn parent_record(&self) -> Option<&ParentRecord> {
        self.parent.as_ref()
    }

    /// Column names known since the record was loaded.
    pub fn record_keys(&self) -> Vec<&str> {
        self.data.keys().map(String::as_str).collect()
    }

    /// This record as the parent of a sub-collection.
    pub fn to_parent(&self) -> Option<ParentRecord> {
        self.id().map(|id| ParentRecord {
            type_name: self.entity.type_name().to_string(),
            table: self.entity.table_name().to_string(),
            primary_name: self.entity.primary_name().to_string(),
            id,
        })
    }

    /// Foreign keys plus the primary key.
    pub fn where_keys(&self) -> Params {
        let mut keys = self.foreign_keys.clone();
        if let Some(id) = self.id() {
            keys.insert(self.entity.primary_name().to_string(), DbValue::Integer(id));
        }
        keys
    }

    // ---- typed accessors ----

    /// Raw value; `None` when the column is unknown or `NULL`.
    pub fn record_key(&self, name: &str) -> Option<&DbValue> {
        self.data.get(name).filter(|value| !value.is_null())
    }

    fn record_text(&self, name: &str) -> Option<String> {
        self.record_key(name)
            .and_then(DbValue::as_text)
            .map(|text| text.into_owned())
            .filter(|text| !text.is_empty())
    }

    pub fn record_int_key(&self, name: &str, default: i64) -> i64 {
        self.record_key(name)
            .filter(|value| value.as_text().is_some_and(|text| !text.is_empty()))
            .and_then(DbValue::as_i64)
            .unwrap_or(default)
    }

    pub fn record_string_key(&self, name: &str, default: &str) -> String {
        self.record_text(name)
            .unwrap_or_else(|| default.to_string())
    }

    /// Accepts `yes`/`no`, `true`/`false` and `1`/`0`.
    pub fn record_boolean_key(&self, name: &str, default: bool) -> bool {
        self.record_text(name)
            .and_then(|text| parse_bool(&text))
            .unwrap_or(default)
    }

    /// Parses `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD` values.
    pub fn record_date_key(
        &self,
        name: &str,
        default: Option<NaiveDateTime>,
    ) -> Option<NaiveDateTime> {
        self.record_text(name)
            .and_then(|text| parse_datetime(&text))
            .or(default)
    }

    // ---- modification ----

    /// Sets a column value.
    ///
    /// Returns `Ok(false)` for template records and for values equal
    /// (as strings) to the current one.
    ///
    /// # Errors
    /// - [`DbError::RecordKeyUnknown`] when the column was not loaded.
    /// - [`DbError::ForeignKeyReadOnly`] when changing a column that scopes
    ///   the owning collection.
    pub fn set_record_key(&mut self, name: &str, value: impl Into<DbValue>) -> DbResult<bool> {
        if self.is_dummy() {
            return Ok(false);
        }
        self.require_key(name)?;

        let value = value.into();
        let previous = self.data.get(name).cloned().unwrap_or(DbValue::Null);
        if previous.text_eq(&value) {
            return Ok(false);
        }
        if self.foreign_keys.contains_key(name) {
            return Err(DbError::ForeignKeyReadOnly {
                key: name.to_string(),
                type_name: self.entity.type_name().to_string(),
            });
        }

        self.data.insert(name.to_string(), value.clone());

        if !self.modified.iter().any(|key| key == name) {
            self.modified.push(name.to_string());

            if let Some(registered) = self.registered.get(name) {
                let change = KeyChange {
                    name: name.to_string(),
                    label: registered.label.clone(),
                    structural: registered.structural,
                    old_value: previous,
                    new_value: value,
                };
                let entity = Rc::clone(&self.entity);
                entity.on_registered_key_modified(self, &change);
            }
        }

        Ok(true)
    }

    /// Stores a boolean as `yes`/`no`, or `true`/`false` when `yes_no`
    /// is off.
    pub fn set_record_boolean_key(&mut self, name: &str, value: bool, yes_no: bool) -> DbResult<bool> {
        let text = match (value, yes_no) {
            (true, true) => "yes",
            (false, true) => "no",
            (true, false) => "true",
            (false, false) => "false",
        };
        self.set_record_key(name, text)
    }

    /// Tracks changes of `name` through [`Entity::on_registered_key_modified`].
    pub fn register_record_key(&mut self, name: &str, label: &str, structural: bool) {
        self.registered.insert(
            name.to_string(),
            RegisteredKey {
                label: label.to_string(),
                structural,
            },
        );
    }

    pub fn is_modified(&self) -> bool {
        !self.is_dummy() && !self.modified.is_empty()
    }

    /// # Errors
    /// - [`DbError::RecordKeyUnknown`] when the column was not loaded.
    pub fn is_modified_key(&self, name: &str) -> DbResult<bool> {
        if self.is_dummy() {
            return Ok(false);
        }
        self.require_key(name)?;
        Ok(self.modified.iter().any(|key| key == name))
    }

    pub fn modified_keys(&self) -> &[String] {
        &self.modified
    }

    /// Writes the modified columns back. Returns `Ok(false)` when
    /// nothing changed.
    ///
    /// # Errors
    /// - [`DbError::TransactionRequired`] without an active transaction.
    pub fn save(&mut self, db: &mut DbHelper) -> DbResult<bool> {
        let Some(id) = self.id().filter(|_| self.is_modified()) else {
            return Ok(false);
        };

        db.require_transaction(&format!(
            "Save {} record [{id}]",
            self.entity.type_name()
        ))?;

        let primary = self.entity.primary_name();
        let mut sets = Params::new();
        for key in &self.modified {
            if key == primary {
                continue;
            }
            if let Some(value) = self.data.get(key) {
                sets.insert(key.clone(), value.clone());
            }
        }

        if !sets.is_empty() {
            let where_keys = self.where_keys();
            let sql = format!(
                "UPDATE {} SET {} WHERE {}",
                quote_identifier(self.entity.table_name()),
                build_set_statement(&sets),
                build_where_fields_statement(&where_keys)
            );
            let mut params = sets;
            params.extend(where_keys);
            db.update(&sql, &params)?;
        }

        info!(
            "event=record_save module=record status=ok type={} id={id} keys={}",
            self.entity.type_name(),
            self.modified.len()
        );
        self.modified.clear();
        Ok(true)
    }

    fn require_key(&self, name: &str) -> DbResult<()> {
        if self.data.contains_key(name) {
            return Ok(());
        }

        debug!(
            "event=record_key_unknown module=record status=error type={} key={name}",
            self.entity.type_name()
        );
        Err(DbError::RecordKeyUnknown {
            key: name.to_string(),
            type_name: self.entity.type_name().to_string(),
            available: self.data.keys().cloned().collect(),
        })
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" => Some(true),
        "no" | "false" | "0" => Some(false),
        _ => None,
    }
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, DATETIME_FORMAT)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}
