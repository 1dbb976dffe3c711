//! Rolling file logs for the toolkit's diagnostic events.
//!
//! # Responsibility
//! - Start one `flexi_logger` file backend per process.
//! - Report which configuration is active.
//!
//! # Invariants
//! - Starting again with an identical configuration is a no-op.
//! - Starting with a different level or directory is rejected.
//! - Events are metadata only; bound statement values are never logged
//!   through this backend unless query logging is enabled explicitly.
//!
//! # See also
//! - `crate::db::QUERY_LOG_TARGET` for the query log target.

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::info;
use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

const LOG_FILE_BASENAME: &str = "dbhelper";
const DEFAULT_MAX_FILE_BYTES: u64 = 5 * 1024 * 1024;
const DEFAULT_MAX_FILES: usize = 3;

static ACTIVE_LOGGER: OnceCell<ActiveLogger> = OnceCell::new();

struct ActiveLogger {
    status: LoggingStatus,
    _handle: LoggerHandle,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoggingError {
    #[error("unsupported log level `{0}`; expected trace|debug|info|warn|error")]
    UnsupportedLevel(String),
    #[error("log directory must be a non-empty absolute path, got `{0}`")]
    InvalidDirectory(String),
    #[error("cannot create log directory `{path}`: {message}")]
    CreateDirectory { path: String, message: String },
    #[error("logging already active with {active}; refusing to switch to {requested}")]
    AlreadyActive { active: String, requested: String },
    #[error("cannot start logger: {0}")]
    Backend(String),
}

/// File logging settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct LoggingConfig {
    pub level: String,
    pub directory: PathBuf,
    pub max_file_bytes: u64,
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            directory: PathBuf::new(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            max_files: DEFAULT_MAX_FILES,
        }
    }
}

/// Level and directory of the running logger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingStatus {
    pub level: &'static str,
    pub directory: PathBuf,
}

impl LoggingStatus {
    fn summary(&self) -> String {
        format!("level `{}` in `{}`", self.level, self.directory.display())
    }
}

/// Starts file logging at `level` under the absolute `log_dir`.
///
/// # Errors
/// - See [`init_logging_with`].
pub fn init_logging(level: &str, log_dir: &str) -> Result<(), LoggingError> {
    init_logging_with(&LoggingConfig {
        level: level.to_string(),
        directory: PathBuf::from(log_dir.trim()),
        ..LoggingConfig::default()
    })
}

/// Starts file logging from a full configuration.
///
/// # Errors
/// - [`LoggingError::UnsupportedLevel`] or [`LoggingError::InvalidDirectory`]
///   for bad settings.
/// - [`LoggingError::AlreadyActive`] when a different configuration runs.
/// - [`LoggingError::CreateDirectory`] / [`LoggingError::Backend`] when the
///   backend cannot start.
pub fn init_logging_with(config: &LoggingConfig) -> Result<(), LoggingError> {
    let requested = LoggingStatus {
        level: normalize_level(&config.level)?,
        directory: validate_directory(&config.directory)?,
    };

    let active = ACTIVE_LOGGER.get_or_try_init(|| start_backend(config, requested.clone()))?;
    if active.status != requested {
        return Err(LoggingError::AlreadyActive {
            active: active.status.summary(),
            requested: requested.summary(),
        });
    }
    Ok(())
}

fn start_backend(config: &LoggingConfig, status: LoggingStatus) -> Result<ActiveLogger, LoggingError> {
    std::fs::create_dir_all(&status.directory).map_err(|err| LoggingError::CreateDirectory {
        path: status.directory.display().to_string(),
        message: err.to_string(),
    })?;

    let handle = Logger::try_with_str(status.level)
        .map_err(|err| LoggingError::Backend(err.to_string()))?
        .log_to_file(
            FileSpec::default()
                .directory(status.directory.as_path())
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(config.max_file_bytes),
            Naming::Numbers,
            Cleanup::KeepLogFiles(config.max_files),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| LoggingError::Backend(err.to_string()))?;

    info!(
        "event=logging_start module=logging status=ok level={} log_dir={} version={}",
        status.level,
        status.directory.display(),
        env!("CARGO_PKG_VERSION")
    );

    Ok(ActiveLogger {
        status,
        _handle: handle,
    })
}

/// Active configuration, `None` before [`init_logging`] succeeded.
pub fn logging_status() -> Option<LoggingStatus> {
    ACTIVE_LOGGER.get().map(|active| active.status.clone())
}

/// `debug` in debug builds, `info` otherwise.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn normalize_level(level: &str) -> Result<&'static str, LoggingError> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        _ => Err(LoggingError::UnsupportedLevel(level.to_string())),
    }
}

fn validate_directory(directory: &Path) -> Result<PathBuf, LoggingError> {
    if directory.as_os_str().is_empty() || !directory.is_absolute() {
        return Err(LoggingError::InvalidDirectory(
            directory.display().to_string(),
        ));
    }
    Ok(directory.to_path_buf())
}
