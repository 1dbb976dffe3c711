//! Thin data-access toolkit over SQLite.
//!
//! [`DbHelper`] owns the connections, statement execution and query
//! history of one session; [`FilterCriteria`] builds parameterized
//! SELECT/COUNT queries; [`Collection`] and [`Record`] load and save
//! change-tracked rows of one table.

pub mod db;
pub mod filter;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;

pub use db::{
    ConnectionDescriptor, ConnectionSettings, DbError, DbHelper, DbOptions, DbResult, DbValue,
    EventKind, ListenerId, OperationType, Params, Row, WriteEvent,
};
pub use filter::{FilterCriteria, FilterDefinition, FilterMessage, MessageKind, SortOrder};
pub use logging::{
    default_log_level, init_logging, init_logging_with, logging_status, LoggingConfig,
    LoggingError, LoggingStatus,
};
pub use model::{Entity, KeyChange, ParentRecord, Record, RecordState};
pub use repo::{Collection, RecordFilter};
pub use search::{IdentityTranslator, Keyword, KeywordMap, KeywordTranslator};

/// Crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
