//! Error taxonomy for connection, statement, filter and record failures.
//!
//! # Invariants
//! - Connection errors never include the password.
//! - Query failures always carry the SQL with simulated values and the
//!   placeholder analysis, so callers can render a diagnostic view.

use std::fmt::{Display, Formatter};
use thiserror::Error;

pub type DbResult<T> = Result<T, DbError>;

/// Diagnostic detail attached to statement-level failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFailure {
    /// Native driver message, if the driver reported one.
    pub native_message: Option<String>,
    /// SQL text with bound values substituted as quoted literals.
    pub sql: String,
    /// One line per placeholder / supplied value.
    pub placeholders: Vec<String>,
    /// Whether the placeholder analysis found mismatches.
    pub inconsistent_placeholders: bool,
    /// `user@database on host` of the selected connection.
    pub database: String,
}

impl Display for QueryFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DB error message: [{}]; Database: {}",
            self.native_message.as_deref().unwrap_or("No message specified"),
            self.database
        )?;
        if !self.sql.is_empty() {
            write!(f, "; SQL (with simulated variable values): {}", self.sql)?;
        }
        if self.inconsistent_placeholders {
            f.write_str("; Analysis: Placeholders have inconsistencies, see detail below.")?;
        }
        if !self.placeholders.is_empty() {
            write!(
                f,
                "; Placeholders: {} [{}]",
                self.placeholders.len(),
                self.placeholders.join("; ")
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error(
        "could not connect to the database [{database}]: tried connecting with user [{username}] on host [{host}] and port [{port}]: {message}"
    )]
    Connection {
        database: String,
        username: String,
        host: String,
        port: u16,
        message: String,
    },
    #[error("cannot connect to the database: the database driver is missing: {message}")]
    ConnectionDriverMissing { message: String },

    #[error("could not prepare query: {0}")]
    PreparingQueryFailed(Box<QueryFailure>),
    #[error("query execution failed: {0}")]
    ExecutingQueryFailed(Box<QueryFailure>),
    #[error("failed fetching a record: {0}")]
    FetchFailed(Box<QueryFailure>),
    #[error("failed inserting a record: {0}")]
    InsertFailed(Box<QueryFailure>),

    #[error("cannot add new database [{0}], ID already exists")]
    DuplicateConnectionId(String),
    #[error("cannot select database [{id}], no such database has been added; available databases are [{}]", .available.join(", "))]
    UnknownConnection { id: String, available: Vec<String> },
    #[error("cannot get selected database: no database selected")]
    NoConnectionSelected,
    #[error("cannot initialize: no databases were added")]
    NoConnectionsAdded,
    #[error("cannot set unknown option [{0}]")]
    UnknownConfigOption(String),

    #[error("cannot start another transaction: commit or roll back the current transaction first")]
    TransactionAlreadyActive,
    #[error("cannot {action} transaction: no transaction was started")]
    NoActiveTransaction { action: &'static str },
    #[error("a transaction is required for the following operation: {operation}")]
    TransactionRequired { operation: String },

    #[error("the collection [{collection}] has no parent collection")]
    CollectionHasNoParent { collection: String },
    #[error("cannot bind record [{record}], collection [{collection}] is already bound to record [{bound}]")]
    CollectionAlreadyHasParent {
        collection: String,
        record: String,
        bound: String,
    },
    #[error("the collection [{collection}] is not configured as a subcollection and cannot be bound to a [{record}]")]
    BindingNotAllowed { collection: String, record: String },
    #[error("collections of type [{collection}] need a parent record to be set")]
    NoParentRecordBound { collection: String },
    #[error("the collection [{collection}] has the same table [{table}] defined as record table and ID table")]
    IdTableSameAsRecordTable { collection: String, table: String },

    #[error("record not found: tried to retrieve a [{type_name}] with primary id [{id}] from table [{table}]")]
    RecordDoesNotExist {
        type_name: String,
        table: String,
        id: i64,
    },
    #[error("cannot set key [{key}] of [{type_name}] record, it does not exist; available keys are [{}]", .available.join(","))]
    RecordKeyUnknown {
        key: String,
        type_name: String,
        available: Vec<String>,
    },
    #[error("cannot set key [{key}] of [{type_name}] record, it scopes the record's collection")]
    ForeignKeyReadOnly { key: String, type_name: String },
    #[error("the value for primary field [{field}] is not included in the data set; data set contains the keys [{}]", .available.join(", "))]
    MissingPrimaryField { field: String, available: Vec<String> },

    #[error("invalid where statement: where statements may not be empty, and must be valid SQL conditions in statement: {0}")]
    InvalidWhereStatement(String),
    #[error("select fields list cannot be empty")]
    EmptySelectFieldsList,
    #[error("invalid sorting order [{0}], expected ASC or DESC")]
    InvalidSortingOrder(String),
    #[error("SELECT keyword missing in the query: {0}")]
    MissingSelectKeyword(String),
}

impl DbError {
    /// Diagnostic detail for statement-level failures.
    pub fn query_failure(&self) -> Option<&QueryFailure> {
        match self {
            Self::PreparingQueryFailed(failure)
            | Self::ExecutingQueryFailed(failure)
            | Self::FetchFailed(failure)
            | Self::InsertFailed(failure) => Some(failure),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DbError, QueryFailure};

    #[test]
    fn connection_error_message_has_context_without_password() {
        let err = DbError::Connection {
            database: "shop".to_string(),
            username: "admin".to_string(),
            host: "db.local".to_string(),
            port: 3306,
            message: "unable to open database file".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("admin"));
        assert!(message.contains("db.local"));
        assert!(message.contains("3306"));
    }

    #[test]
    fn query_failure_display_mentions_inconsistencies() {
        let failure = QueryFailure {
            native_message: Some("no such column".to_string()),
            sql: "SELECT 'a'".to_string(),
            placeholders: vec!["id = Placeholder not specified in values list".to_string()],
            inconsistent_placeholders: true,
            database: "root@:memory: on localhost".to_string(),
        };
        let err = DbError::ExecutingQueryFailed(Box::new(failure));

        assert!(err.query_failure().is_some());
        let message = err.to_string();
        assert!(message.contains("inconsistencies"));
        assert!(message.contains("no such column"));
    }
}
