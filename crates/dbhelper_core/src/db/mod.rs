//! Connection gateway and statement execution core.
//!
//! # Responsibility
//! - Register named connections and open them lazily.
//! - Execute parameter-bound statements and keep query bookkeeping.
//! - Build the small SQL fragments used by the dynamic CRUD helpers.
//!
//! # Invariants
//! - Values never reach SQL text; they are always bound.
//! - All session state lives in one [`DbHelper`] value.
//!
//! # See also
//! - `crate::filter` for composed SELECT queries.

mod connection;
mod diagnostics;
mod error;
mod events;
mod helper;
mod operation;
mod options;
mod statements;
mod value;

pub use connection::{
    ConnectionDescriptor, ConnectionSettings, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_USERNAME,
    MEMORY_DATABASE,
};
pub use diagnostics::{format_query, placeholder_names};
pub use error::{DbError, DbResult, QueryFailure};
pub use events::{BeforeWriteObserver, EventKind, InitObserver, ListenerId, WriteEvent};
pub use helper::{DbHelper, ResultSummary, TrackedQuery, UpsertOutcome, QUERY_LOG_TARGET};
pub use operation::OperationType;
pub use options::{DbOptions, OPTION_DEBUGGING, OPTION_LOG_QUERIES, OPTION_TRACK_QUERIES};
pub use statements::{
    build_limit_statement, build_set_statement, build_where_fields_statement, quote_identifier,
};
pub use value::{DbValue, Params, Row, DATETIME_FORMAT};

pub(crate) use value::lookup_param;
