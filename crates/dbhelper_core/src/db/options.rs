//! Runtime switches of the helper.

use super::error::{DbError, DbResult};
use serde::Deserialize;

pub const OPTION_TRACK_QUERIES: &str = "track-queries";
pub const OPTION_LOG_QUERIES: &str = "log-queries";
pub const OPTION_DEBUGGING: &str = "debugging";

/// All recognized options; every flag defaults to off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct DbOptions {
    /// Keep the full query history.
    pub track_queries: bool,
    /// Route every executed statement to the log sink.
    pub log_queries: bool,
    /// Echo every executed statement with a result summary.
    pub debugging: bool,
}

impl DbOptions {
    pub fn get(&self, name: &str) -> Option<bool> {
        match name {
            OPTION_TRACK_QUERIES => Some(self.track_queries),
            OPTION_LOG_QUERIES => Some(self.log_queries),
            OPTION_DEBUGGING => Some(self.debugging),
            _ => None,
        }
    }

    /// # Errors
    /// - [`DbError::UnknownConfigOption`] for unrecognized names.
    pub fn set(&mut self, name: &str, value: bool) -> DbResult<()> {
        let slot = match name {
            OPTION_TRACK_QUERIES => &mut self.track_queries,
            OPTION_LOG_QUERIES => &mut self.log_queries,
            OPTION_DEBUGGING => &mut self.debugging,
            _ => return Err(DbError::UnknownConfigOption(name.to_string())),
        };
        *slot = value;
        Ok(())
    }
}
