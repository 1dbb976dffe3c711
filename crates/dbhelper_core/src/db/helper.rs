//! The helper context: connection registry, statement execution and
//! query bookkeeping.
//!
//! # Responsibility
//! - Own every piece of session state (connections, observers, options,
//!   query history, transaction flag, column cache) in one value.
//! - Execute statements with named parameter binding only.
//!
//! # Invariants
//! - The query counter increments only after a statement executed
//!   successfully; vetoed writes are neither counted nor tracked.
//! - Only one transaction can be active at a time.
//! - Structured log events carry metadata only, never bound values.
//!
//! # See also
//! - `diagnostics` for the simulated SQL shown in errors.

use super::connection::{ConnectionDescriptor, ConnectionSettings};
use super::diagnostics::{analyze_placeholders, format_query};
use super::error::{DbError, DbResult, QueryFailure};
use super::events::{
    BeforeWriteObserver, EventKind, EventRegistry, InitObserver, ListenerId, WriteEvent,
};
use super::operation::OperationType;
use super::options::{DbOptions, OPTION_DEBUGGING, OPTION_LOG_QUERIES, OPTION_TRACK_QUERIES};
use super::statements::{build_set_statement, build_where_fields_statement, quote_identifier};
use super::value::{lookup_param, DbValue, Params, Row};
use log::{debug, error, info, warn};
use rusqlite::{Connection, Statement};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::io::Write;
use std::time::{Duration, Instant};

/// `log` target used for executed statements when no callback is set.
pub const QUERY_LOG_TARGET: &str = "dbhelper::queries";

/// One entry of the query history.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedQuery {
    pub sql: String,
    pub params: Params,
    pub duration: Duration,
    pub operation: OperationType,
}

impl TrackedQuery {
    /// SQL with the bound values substituted, for display.
    pub fn formatted(&self) -> String {
        format_query(&self.sql, &self.params)
    }
}

/// Result of [`DbHelper::insert_or_update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted(i64),
    Updated,
}

/// Coarse shape of a statement result, used by the debug echo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSummary {
    Bool(bool),
    Entries(usize),
    Null,
    Unknown,
}

impl Display for ResultSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(true) => f.write_str("true"),
            Self::Bool(false) => f.write_str("false"),
            Self::Entries(count) => write!(f, "{count} entries"),
            Self::Null => f.write_str("NULL"),
            Self::Unknown => f.write_str("Unknown"),
        }
    }
}

struct ActiveQuery {
    sql: String,
    params: Params,
}

struct LastError {
    message: String,
    code: Option<i32>,
}

enum StatementOutcome {
    Rows(Vec<Row>),
    Changes(usize),
}

enum StatementFailure {
    Connection(DbError),
    Prepare(rusqlite::Error),
    MissingValue(String),
    Execute(rusqlite::Error),
    Fetch(rusqlite::Error),
}

impl StatementFailure {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Connection(_) => "db_connect_failed",
            Self::Prepare(_) => "db_prepare_failed",
            Self::MissingValue(_) => "db_bind_failed",
            Self::Execute(_) => "db_execute_failed",
            Self::Fetch(_) => "db_fetch_failed",
        }
    }

    fn last_error(&self) -> Option<LastError> {
        match self {
            Self::Connection(_) => None,
            Self::MissingValue(name) => Some(LastError {
                message: format!("no value supplied for placeholder {name}"),
                code: None,
            }),
            Self::Prepare(err) | Self::Execute(err) | Self::Fetch(err) => Some(LastError {
                message: err.to_string(),
                code: err.sqlite_error().map(|native| native.extended_code),
            }),
        }
    }
}

/// Session object holding all helper state.
///
/// Replace it with [`DbHelper::reset`] to start a fresh session.
pub struct DbHelper {
    connections: Vec<ConnectionDescriptor>,
    selected: Option<String>,
    initialized: bool,
    options: DbOptions,
    events: EventRegistry,
    log_callback: Option<Box<dyn FnMut(&str)>>,
    debug_output: Box<dyn Write>,
    active_query: Option<ActiveQuery>,
    last_rows: Vec<Row>,
    last_error: Option<LastError>,
    affected_rows: i64,
    query_count: u64,
    queries: Vec<TrackedQuery>,
    transaction_started: bool,
    column_cache: HashMap<(String, String), bool>,
}

impl Default for DbHelper {
    fn default() -> Self {
        Self::new()
    }
}

impl DbHelper {
    pub fn new() -> Self {
        Self {
            connections: Vec::new(),
            selected: None,
            initialized: false,
            options: DbOptions::default(),
            events: EventRegistry::default(),
            log_callback: None,
            debug_output: Box::new(std::io::stdout()),
            active_query: None,
            last_rows: Vec::new(),
            last_error: None,
            affected_rows: -1,
            query_count: 0,
            queries: Vec::new(),
            transaction_started: false,
            column_cache: HashMap::new(),
        }
    }

    /// Drops every connection, observer, option and statistic.
    pub fn reset(&mut self) {
        *self = Self::new();
        info!("event=db_reset module=db status=ok");
    }

    // ---- connection registry ----

    /// Registers a connection. The first one added becomes the selected one.
    ///
    /// # Errors
    /// - [`DbError::DuplicateConnectionId`] when `id` is already registered.
    pub fn add_connection(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
    ) -> DbResult<&mut ConnectionDescriptor> {
        let descriptor = ConnectionDescriptor::new(id, name);
        self.register_connection(descriptor)
    }

    pub fn add_connection_from_settings(
        &mut self,
        id: impl Into<String>,
        settings: ConnectionSettings,
    ) -> DbResult<&mut ConnectionDescriptor> {
        let descriptor = ConnectionDescriptor::from_settings(id, settings);
        self.register_connection(descriptor)
    }

    fn register_connection(
        &mut self,
        descriptor: ConnectionDescriptor,
    ) -> DbResult<&mut ConnectionDescriptor> {
        if self
            .connections
            .iter()
            .any(|known| known.id() == descriptor.id())
        {
            return Err(DbError::DuplicateConnectionId(descriptor.id().to_string()));
        }

        if self.selected.is_none() {
            self.selected = Some(descriptor.id().to_string());
        }
        info!(
            "event=db_connection_added module=db status=ok connection={}",
            descriptor.id()
        );
        self.connections.push(descriptor);
        self.connections
            .last_mut()
            .ok_or(DbError::NoConnectionsAdded)
    }

    /// # Errors
    /// - [`DbError::UnknownConnection`] listing the registered ids.
    pub fn select_connection(&mut self, id: &str) -> DbResult<()> {
        if self.connections.iter().any(|known| known.id() == id) {
            self.selected = Some(id.to_string());
            return Ok(());
        }

        Err(DbError::UnknownConnection {
            id: id.to_string(),
            available: self.connection_ids().into_iter().map(str::to_string).collect(),
        })
    }

    pub fn connection_ids(&self) -> Vec<&str> {
        self.connections.iter().map(ConnectionDescriptor::id).collect()
    }

    pub fn selected_connection(&self) -> DbResult<&ConnectionDescriptor> {
        let selected = self.selected.as_deref().ok_or(DbError::NoConnectionSelected)?;
        self.connections
            .iter()
            .find(|known| known.id() == selected)
            .ok_or(DbError::NoConnectionSelected)
    }

    pub fn selected_connection_mut(&mut self) -> DbResult<&mut ConnectionDescriptor> {
        let selected = self.selected.as_deref().ok_or(DbError::NoConnectionSelected)?;
        self.connections
            .iter_mut()
            .find(|known| known.id() == selected)
            .ok_or(DbError::NoConnectionSelected)
    }

    /// Native handle of the selected connection, connecting on first use.
    pub fn connection(&mut self) -> DbResult<&Connection> {
        self.selected_connection_mut()?.connect()
    }

    pub fn is_connected(&self) -> bool {
        self.selected_connection()
            .map(ConnectionDescriptor::is_connected)
            .unwrap_or(false)
    }

    /// Drops the handle of the selected connection.
    pub fn disconnect(&mut self) -> DbResult<()> {
        self.selected_connection_mut()?.disconnect();
        Ok(())
    }

    /// Connects the selected connection and fires the init observers.
    ///
    /// Runs once; later calls are no-ops.
    ///
    /// # Errors
    /// - [`DbError::NoConnectionsAdded`] when nothing was registered.
    /// - Any connection error of the selected connection.
    pub fn init(&mut self) -> DbResult<()> {
        if self.initialized {
            return Ok(());
        }
        if self.connections.is_empty() {
            return Err(DbError::NoConnectionsAdded);
        }

        let selected = self.selected.clone().ok_or(DbError::NoConnectionSelected)?;
        self.select_connection(&selected)?;
        self.connection()?;
        self.initialized = true;

        info!("event=db_init module=db status=ok connection={selected}");
        self.events.trigger_init();
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    // ---- events ----

    pub fn on_init(&mut self, observer: impl InitObserver + 'static) -> ListenerId {
        self.events.add_init(Box::new(observer))
    }

    /// Registers an observer that may veto write statements.
    pub fn on_before_write_operation(
        &mut self,
        observer: impl BeforeWriteObserver + 'static,
    ) -> ListenerId {
        self.events.add_before_write(Box::new(observer))
    }

    pub fn has_listener(&self, kind: EventKind) -> bool {
        self.events.has_listener(kind)
    }

    pub fn listener_ids(&self, kind: EventKind) -> Vec<ListenerId> {
        self.events.listener_ids(kind)
    }

    /// Returns whether a listener was removed.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.events.remove(id)
    }

    pub fn remove_listeners(&mut self, kind: EventKind) {
        self.events.remove_all(kind);
    }

    // ---- options ----

    /// # Errors
    /// - [`DbError::UnknownConfigOption`] for unrecognized names.
    pub fn set_option(&mut self, name: &str, value: bool) -> DbResult<()> {
        self.options.set(name, value)
    }

    pub fn option(&self, name: &str) -> Option<bool> {
        self.options.get(name)
    }

    pub fn options(&self) -> DbOptions {
        self.options
    }

    pub fn apply_options(&mut self, options: DbOptions) {
        self.options = options;
    }

    pub fn enable_query_logging(&mut self, enable: bool) {
        self.options.log_queries = enable;
    }

    pub fn disable_query_logging(&mut self) {
        self.enable_query_logging(false);
    }

    pub fn is_query_logging_enabled(&self) -> bool {
        self.option(OPTION_LOG_QUERIES).unwrap_or(false)
    }

    pub fn enable_query_tracking(&mut self, enable: bool) {
        self.options.track_queries = enable;
    }

    pub fn disable_query_tracking(&mut self) {
        self.enable_query_tracking(false);
    }

    pub fn is_query_tracking_enabled(&self) -> bool {
        self.option(OPTION_TRACK_QUERIES).unwrap_or(false)
    }

    pub fn enable_debugging(&mut self, enable: bool) {
        self.options.debugging = enable;
    }

    pub fn disable_debugging(&mut self) {
        self.enable_debugging(false);
    }

    pub fn is_debugging_enabled(&self) -> bool {
        self.option(OPTION_DEBUGGING).unwrap_or(false)
    }

    /// Receives `DBHelper | <message>` lines.
    pub fn set_log_callback(&mut self, callback: impl FnMut(&str) + 'static) {
        self.log_callback = Some(Box::new(callback));
    }

    /// Target of the debug echo, stdout by default.
    pub fn set_debug_output(&mut self, output: impl Write + 'static) {
        self.debug_output = Box::new(output);
    }

    fn log(&mut self, message: &str) {
        let line = format!("DBHelper | {message}");
        match self.log_callback.as_mut() {
            Some(callback) => callback(&line),
            None => info!(target: QUERY_LOG_TARGET, "{line}"),
        }
    }

    fn echo_debug(&mut self, sql: &str, params: &Params, summary: ResultSummary) {
        if !self.options.debugging {
            return;
        }

        let rendered = format_query(sql, params);
        if let Err(err) = writeln!(self.debug_output, "{}\nResult: {summary}", rendered.trim()) {
            warn!("event=db_debug_echo module=db status=error error={err}");
        }
    }

    // ---- statement execution ----

    /// Prepares, binds and runs one statement.
    ///
    /// Returns `Ok(true)` on success and when a before-write observer
    /// vetoed the statement. With `exception_on_error` unset, prepare and
    /// execute failures yield `Ok(false)` instead of an error.
    ///
    /// # Errors
    /// - [`DbError::PreparingQueryFailed`], [`DbError::ExecutingQueryFailed`]
    ///   or [`DbError::FetchFailed`] with diagnostic detail.
    /// - Connection errors, regardless of `exception_on_error`.
    pub fn execute(
        &mut self,
        operation: OperationType,
        sql: &str,
        params: &Params,
        exception_on_error: bool,
    ) -> DbResult<bool> {
        self.init()?;

        let started_at = Instant::now();
        self.active_query = Some(ActiveQuery {
            sql: sql.to_string(),
            params: params.clone(),
        });
        self.last_error = None;
        self.last_rows.clear();

        if operation.is_write() && self.events.has_listener(EventKind::BeforeWriteOperation) {
            let mut event = WriteEvent::new(operation, sql, params);
            self.events.trigger_before_write(&mut event);
            if event.is_cancelled() {
                info!("event=db_write_cancelled module=db status=ok operation={operation}");
                return Ok(true);
            }
        }

        let outcome = match self.run_statement(sql, params) {
            Ok(outcome) => outcome,
            Err(StatementFailure::Connection(err)) => return Err(err),
            Err(failure) => {
                error!(
                    "event=db_execute module=db status=error operation={operation} duration_ms={} error_code={}",
                    started_at.elapsed().as_millis(),
                    failure.error_code()
                );
                self.affected_rows = 0;
                self.last_error = failure.last_error();
                if !exception_on_error {
                    self.echo_debug(sql, params, ResultSummary::Bool(false));
                    return Ok(false);
                }
                return Err(self.failure_error(failure));
            }
        };

        self.query_count += 1;
        let summary = match outcome {
            StatementOutcome::Rows(rows) => {
                let total = rows.len();
                self.affected_rows = i64::try_from(total).unwrap_or(i64::MAX);
                self.last_rows = rows;
                ResultSummary::Entries(total)
            }
            StatementOutcome::Changes(changes) => {
                self.affected_rows = i64::try_from(changes).unwrap_or(i64::MAX);
                if operation == OperationType::Select {
                    ResultSummary::Null
                } else {
                    ResultSummary::Bool(true)
                }
            }
        };

        let duration = started_at.elapsed();
        if self.options.track_queries {
            self.queries.push(TrackedQuery {
                sql: sql.to_string(),
                params: params.clone(),
                duration,
                operation,
            });
        }
        if self.options.log_queries {
            let rendered = format_query(sql, params);
            self.log(&rendered);
        }
        self.echo_debug(sql, params, summary);

        debug!(
            "event=db_execute module=db status=ok operation={operation} rows={} duration_ms={}",
            self.affected_rows,
            duration.as_millis()
        );
        Ok(true)
    }

    fn run_statement(
        &mut self,
        sql: &str,
        params: &Params,
    ) -> Result<StatementOutcome, StatementFailure> {
        let conn = self
            .selected_connection_mut()
            .and_then(|descriptor| descriptor.connect())
            .map_err(StatementFailure::Connection)?;

        let mut stmt = conn.prepare(sql).map_err(StatementFailure::Prepare)?;
        bind_params(&mut stmt, params)?;

        if stmt.column_count() == 0 {
            return stmt
                .raw_execute()
                .map(StatementOutcome::Changes)
                .map_err(StatementFailure::Execute);
        }

        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let mut rows = stmt.raw_query();
        let mut collected = Vec::new();
        loop {
            let row = match rows.next() {
                Ok(Some(row)) => row,
                Ok(None) => break,
                // The first step runs the statement itself.
                Err(err) if collected.is_empty() => return Err(StatementFailure::Execute(err)),
                Err(err) => return Err(StatementFailure::Fetch(err)),
            };

            let mut record = Row::new();
            for (index, name) in columns.iter().enumerate() {
                let value = row.get_ref(index).map_err(StatementFailure::Fetch)?;
                record.insert(name.clone(), DbValue::from(value));
            }
            collected.push(record);
        }

        Ok(StatementOutcome::Rows(collected))
    }

    fn failure_error(&self, failure: StatementFailure) -> DbError {
        let native = failure.last_error().map(|last| last.message);
        match failure {
            StatementFailure::Connection(err) => err,
            StatementFailure::Prepare(_) => DbError::PreparingQueryFailed(self.query_failure(native)),
            StatementFailure::MissingValue(_) | StatementFailure::Execute(_) => {
                DbError::ExecutingQueryFailed(self.query_failure(native))
            }
            StatementFailure::Fetch(_) => DbError::FetchFailed(self.query_failure(native)),
        }
    }

    fn query_failure(&self, native_message: Option<String>) -> Box<QueryFailure> {
        let empty = Params::new();
        let (sql, params) = match &self.active_query {
            Some(active) => (active.sql.as_str(), &active.params),
            None => ("", &empty),
        };
        let (placeholders, inconsistent_placeholders) = analyze_placeholders(sql, params);

        Box::new(QueryFailure {
            native_message,
            sql: format_query(sql, params),
            placeholders,
            inconsistent_placeholders,
            database: self
                .selected_connection()
                .map(ConnectionDescriptor::describe)
                .unwrap_or_default(),
        })
    }

    /// Runs an INSERT and returns the generated row id.
    ///
    /// # Errors
    /// - [`DbError::InsertFailed`] whenever the statement fails.
    pub fn insert(&mut self, sql: &str, params: &Params) -> DbResult<i64> {
        if self.execute(OperationType::Insert, sql, params, false)? {
            return Ok(self.connection()?.last_insert_rowid());
        }

        let native = self.last_error.as_ref().map(|last| last.message.clone());
        Err(DbError::InsertFailed(self.query_failure(native)))
    }

    pub fn update(&mut self, sql: &str, params: &Params) -> DbResult<bool> {
        self.execute(OperationType::Update, sql, params, true)
    }

    pub fn delete(&mut self, sql: &str, params: &Params) -> DbResult<bool> {
        self.execute(OperationType::Delete, sql, params, true)
    }

    /// First row of a SELECT, if any.
    pub fn fetch(&mut self, sql: &str, params: &Params) -> DbResult<Option<Row>> {
        self.execute(OperationType::Select, sql, params, true)?;
        let rows = std::mem::take(&mut self.last_rows);
        Ok(rows.into_iter().next())
    }

    /// # Errors
    /// - [`DbError::FetchFailed`] when reading the result set fails.
    pub fn fetch_all(&mut self, sql: &str, params: &Params) -> DbResult<Vec<Row>> {
        self.execute(OperationType::Select, sql, params, true)?;
        Ok(std::mem::take(&mut self.last_rows))
    }

    /// Fetches one row of `table` matching `where_fields`; all columns
    /// when `columns` is empty.
    pub fn fetch_data(
        &mut self,
        table: &str,
        where_fields: &Params,
        columns: &[&str],
    ) -> DbResult<Option<Row>> {
        let select = if columns.is_empty() {
            "*".to_string()
        } else {
            columns
                .iter()
                .map(|column| quote_identifier(column))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let sql = format!(
            "SELECT {select} FROM {} WHERE {}",
            quote_identifier(table),
            build_where_fields_statement(where_fields)
        );
        self.fetch(&sql, where_fields)
    }

    /// Value of the `count` column of the first row, 0 when absent.
    pub fn fetch_count(&mut self, sql: &str, params: &Params) -> DbResult<i64> {
        let row = self.fetch(sql, params)?;
        Ok(row
            .and_then(|row| row.get("count").and_then(DbValue::as_i64))
            .unwrap_or(0))
    }

    /// Column `key` of the first row; `None` when missing or `NULL`.
    pub fn fetch_key(&mut self, key: &str, sql: &str, params: &Params) -> DbResult<Option<DbValue>> {
        let row = self.fetch(sql, params)?;
        Ok(row
            .and_then(|mut row| row.remove(key))
            .filter(|value| !value.is_null()))
    }

    /// Non-null values of column `key` across all rows.
    pub fn fetch_all_key(&mut self, key: &str, sql: &str, params: &Params) -> DbResult<Vec<DbValue>> {
        let rows = self.fetch_all(sql, params)?;
        Ok(rows
            .into_iter()
            .filter_map(|mut row| row.remove(key))
            .filter(|value| !value.is_null())
            .collect())
    }

    // ---- diagnostics ----

    /// Last statement with simulated values.
    pub fn sql(&self) -> Option<String> {
        self.active_query
            .as_ref()
            .map(|active| format_query(&active.sql, &active.params))
    }

    pub fn error_message(&self) -> Option<&str> {
        self.last_error.as_ref().map(|last| last.message.as_str())
    }

    /// Extended SQLite result code of the last failure.
    pub fn error_code(&self) -> Option<i32> {
        self.last_error.as_ref().and_then(|last| last.code)
    }

    /// Rows returned or changed by the last statement, -1 before any.
    pub fn count_affected_rows(&self) -> i64 {
        self.affected_rows
    }

    // ---- query history ----

    /// Statements executed successfully since the session started.
    pub fn query_count(&self) -> u64 {
        self.query_count
    }

    /// Tracked queries of the given types; all of them for an empty slice.
    pub fn queries(&self, types: &[OperationType]) -> Vec<&TrackedQuery> {
        self.queries
            .iter()
            .filter(|query| types.is_empty() || types.contains(&query.operation))
            .collect()
    }

    pub fn write_queries(&self) -> Vec<&TrackedQuery> {
        self.queries(&OperationType::WRITE_TYPES)
    }

    pub fn select_queries(&self) -> Vec<&TrackedQuery> {
        self.queries(&[OperationType::Select])
    }

    pub fn count_queries(&self, types: &[OperationType]) -> usize {
        self.queries(types).len()
    }

    pub fn count_select_queries(&self) -> usize {
        self.count_queries(&[OperationType::Select])
    }

    pub fn count_write_queries(&self) -> usize {
        self.count_queries(&OperationType::WRITE_TYPES)
    }

    // ---- transactions ----

    /// # Errors
    /// - [`DbError::TransactionAlreadyActive`] when one is running.
    pub fn start_transaction(&mut self) -> DbResult<bool> {
        self.log("Starting a new transaction.");
        if self.transaction_started {
            return Err(DbError::TransactionAlreadyActive);
        }

        let started = self.execute(OperationType::Transaction, "BEGIN", &Params::new(), true)?;
        self.transaction_started = true;
        Ok(started)
    }

    pub fn is_transaction_started(&self) -> bool {
        self.transaction_started
    }

    /// # Errors
    /// - [`DbError::NoActiveTransaction`] when none was started.
    pub fn commit_transaction(&mut self) -> DbResult<bool> {
        self.log("Committing the transaction.");
        if !self.transaction_started {
            return Err(DbError::NoActiveTransaction { action: "commit" });
        }

        self.transaction_started = false;
        self.execute(OperationType::Transaction, "COMMIT", &Params::new(), true)
    }

    /// # Errors
    /// - [`DbError::NoActiveTransaction`] when none was started.
    pub fn rollback_transaction(&mut self) -> DbResult<bool> {
        self.log("Rolling back the transaction.");
        if !self.transaction_started {
            return Err(DbError::NoActiveTransaction {
                action: "roll back",
            });
        }

        self.transaction_started = false;
        self.execute(OperationType::Transaction, "ROLLBACK", &Params::new(), true)
    }

    /// # Errors
    /// - [`DbError::TransactionRequired`] naming `operation_label`.
    pub fn require_transaction(&self, operation_label: &str) -> DbResult<()> {
        if self.transaction_started {
            return Ok(());
        }

        Err(DbError::TransactionRequired {
            operation: operation_label.to_string(),
        })
    }

    // ---- table helpers ----

    /// Removes every row of `table`.
    pub fn truncate(&mut self, table: &str) -> DbResult<bool> {
        let sql = format!("DELETE FROM {}", quote_identifier(table));
        self.execute(OperationType::Truncate, &sql, &Params::new(), true)
    }

    pub fn fetch_table_names(&mut self) -> DbResult<Vec<String>> {
        let names = self.fetch_all_key(
            "name",
            "SELECT `name` FROM `sqlite_master` WHERE `type` = 'table' AND `name` NOT LIKE 'sqlite_%' ORDER BY `name`",
            &Params::new(),
        )?;
        Ok(names
            .iter()
            .filter_map(DbValue::as_text)
            .map(|name| name.into_owned())
            .collect())
    }

    /// Case-sensitive table lookup.
    pub fn table_exists(&mut self, table: &str) -> DbResult<bool> {
        Ok(self.fetch_table_names()?.iter().any(|name| name == table))
    }

    /// Drops every table, one statement per table.
    pub fn drop_tables(&mut self) -> DbResult<bool> {
        let mut dropped = true;
        for table in self.fetch_table_names()? {
            let sql = format!("DROP TABLE IF EXISTS {}", quote_identifier(&table));
            dropped &= self.execute(OperationType::Drop, &sql, &Params::new(), true)?;
        }
        self.column_cache.clear();
        Ok(dropped)
    }

    /// Whether `table` has `column`. The answer is cached per session.
    pub fn column_exists(&mut self, table: &str, column: &str) -> DbResult<bool> {
        let cache_key = (table.to_string(), column.to_string());
        if let Some(exists) = self.column_cache.get(&cache_key) {
            return Ok(*exists);
        }

        let found = self.fetch_key(
            "name",
            "SELECT `name` FROM pragma_table_info(:tablename) WHERE `name` = :columnname",
            &crate::db_params! { "tablename" => table, "columnname" => column },
        )?;
        let exists = found.is_some();
        self.column_cache.insert(cache_key, exists);
        Ok(exists)
    }

    /// Whether `column` is the integer primary key of `table`, which
    /// SQLite fills automatically.
    pub fn is_autoincrement_column(&mut self, table: &str, column: &str) -> DbResult<bool> {
        let count = self.fetch_count(
            "SELECT COUNT(*) AS `count` FROM pragma_table_info(:tablename) WHERE `name` = :columnname AND `pk` = 1 AND UPPER(`type`) = 'INTEGER'",
            &crate::db_params! { "tablename" => table, "columnname" => column },
        )?;
        Ok(count > 0)
    }

    // ---- dynamic CRUD ----

    /// Deletes rows matching all `where_fields`; every row when empty.
    pub fn delete_records(&mut self, table: &str, where_fields: &Params) -> DbResult<bool> {
        let mut sql = format!("DELETE FROM {}", quote_identifier(table));
        if !where_fields.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&build_where_fields_statement(where_fields));
        }
        self.delete(&sql, where_fields)
    }

    /// Whether a row with the given (possibly composite) key exists.
    pub fn key_exists(&mut self, table: &str, key: &Params) -> DbResult<bool> {
        if key.is_empty() {
            return Ok(false);
        }
        self.record_exists(table, key)
    }

    pub fn record_exists(&mut self, table: &str, where_fields: &Params) -> DbResult<bool> {
        let sql = format!(
            "SELECT COUNT(*) AS `count` FROM {} WHERE {}",
            quote_identifier(table),
            build_where_fields_statement(where_fields)
        );
        Ok(self.fetch_count(&sql, where_fields)? > 0)
    }

    /// Inserts `data` into `table`. `NULL` values are written inline.
    pub fn insert_dynamic(&mut self, table: &str, data: &Params) -> DbResult<i64> {
        if data.is_empty() {
            let sql = format!("INSERT INTO {} DEFAULT VALUES", quote_identifier(table));
            return self.insert(&sql, &Params::new());
        }

        let mut columns = Vec::with_capacity(data.len());
        let mut values = Vec::with_capacity(data.len());
        let mut bound = Params::new();
        for (key, value) in data {
            let column = key.trim_start_matches(':');
            columns.push(quote_identifier(column));
            if value.is_null() {
                values.push("NULL".to_string());
            } else {
                values.push(format!(":{column}"));
                bound.insert(column.to_string(), value.clone());
            }
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(table),
            columns.join(", "),
            values.join(", ")
        );
        self.insert(&sql, &bound)
    }

    /// Updates the row identified by `primary_fields` or inserts it.
    ///
    /// # Errors
    /// - [`DbError::MissingPrimaryField`] when `data` lacks a primary field.
    pub fn insert_or_update(
        &mut self,
        table: &str,
        data: &Params,
        primary_fields: &[&str],
    ) -> DbResult<UpsertOutcome> {
        let key = primary_key_values(data, primary_fields)?;

        if self.record_exists(table, &key)? {
            let sql = format!(
                "UPDATE {} SET {} WHERE {}",
                quote_identifier(table),
                build_set_statement(data),
                build_where_fields_statement(&key)
            );
            self.update(&sql, data)?;
            return Ok(UpsertOutcome::Updated);
        }

        self.insert_dynamic(table, data).map(UpsertOutcome::Inserted)
    }

    /// Updates the row identified by `primary_fields` with all of `data`.
    ///
    /// # Errors
    /// - [`DbError::MissingPrimaryField`] when `data` lacks a primary field.
    pub fn update_dynamic(
        &mut self,
        table: &str,
        data: &Params,
        primary_fields: &[&str],
    ) -> DbResult<bool> {
        let key = primary_key_values(data, primary_fields)?;
        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            quote_identifier(table),
            build_set_statement(data),
            build_where_fields_statement(&key)
        );
        self.update(&sql, data)
    }
}

fn bind_params(stmt: &mut Statement<'_>, params: &Params) -> Result<(), StatementFailure> {
    for index in 1..=stmt.parameter_count() {
        let name = stmt
            .parameter_name(index)
            .map(str::to_string)
            .unwrap_or_else(|| format!("?{index}"));
        let value = lookup_param(params, &name)
            .ok_or_else(|| StatementFailure::MissingValue(name.clone()))?;
        stmt.raw_bind_parameter(index, value)
            .map_err(StatementFailure::Execute)?;
    }
    Ok(())
}

fn primary_key_values(data: &Params, primary_fields: &[&str]) -> DbResult<Params> {
    let mut key = Params::new();
    for field in primary_fields {
        let value = lookup_param(data, field).ok_or_else(|| DbError::MissingPrimaryField {
            field: (*field).to_string(),
            available: data.keys().cloned().collect(),
        })?;
        key.insert((*field).to_string(), value.clone());
    }
    Ok(key)
}
