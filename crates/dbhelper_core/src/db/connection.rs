//! Connection descriptors and lazy connection handling.
//!
//! # Responsibility
//! - Hold the parameters of one named database connection.
//! - Open the native handle on first use and reuse it afterwards.
//!
//! # Invariants
//! - At most one live handle per descriptor.
//! - Connection failures are surfaced with user/host/port context but
//!   never with the password.

use super::error::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt::{Debug, Formatter};
use std::time::Instant;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 3306;
pub const DEFAULT_USERNAME: &str = "root";
/// Database name that opens a private in-memory database.
pub const MEMORY_DATABASE: &str = ":memory:";

/// Deserializable connection parameters.
#[derive(Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ConnectionSettings {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub init_command: Option<String>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            username: DEFAULT_USERNAME.to_string(),
            password: String::new(),
            init_command: None,
        }
    }
}

impl Debug for ConnectionSettings {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("init_command", &self.init_command)
            .finish()
    }
}

/// One registered database connection.
///
/// For the SQLite driver the database name is the file path, or
/// [`MEMORY_DATABASE`] for an in-memory database.
pub struct ConnectionDescriptor {
    id: String,
    name: String,
    host: String,
    port: u16,
    username: String,
    password: SecretString,
    init_command: Option<String>,
    handle: Option<Connection>,
}

impl ConnectionDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            username: DEFAULT_USERNAME.to_string(),
            password: SecretString::from(String::new()),
            init_command: None,
            handle: None,
        }
    }

    pub fn from_settings(id: impl Into<String>, settings: ConnectionSettings) -> Self {
        let mut descriptor = Self::new(id, settings.name);
        descriptor
            .set_host(settings.host)
            .set_port(settings.port)
            .set_credentials(settings.username, settings.password);
        if let Some(command) = settings.init_command {
            descriptor.set_init_command(command);
        }
        descriptor
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &SecretString {
        &self.password
    }

    /// Driver init command, empty when none was set.
    pub fn init_command(&self) -> &str {
        self.init_command.as_deref().unwrap_or("")
    }

    pub fn set_host(&mut self, host: impl Into<String>) -> &mut Self {
        self.host = host.into();
        self
    }

    pub fn set_port(&mut self, port: u16) -> &mut Self {
        self.port = port;
        self
    }

    pub fn set_credentials(
        &mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> &mut Self {
        self.username = username.into();
        self.password = SecretString::from(password.into());
        self
    }

    /// Sets a statement batch executed right after the handle is opened.
    pub fn set_init_command(&mut self, command: impl Into<String>) -> &mut Self {
        self.init_command = Some(command.into());
        self
    }

    pub fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    /// Returns the native handle, opening it on first use.
    ///
    /// # Errors
    /// - [`DbError::ConnectionDriverMissing`] when the driver is unavailable.
    /// - [`DbError::Connection`] for every other open failure.
    pub fn connect(&mut self) -> DbResult<&Connection> {
        let conn = match self.handle.take() {
            Some(conn) => conn,
            None => self.open()?,
        };
        Ok(self.handle.insert(conn))
    }

    /// Drops the cached handle; the next [`connect`](Self::connect) reopens it.
    pub fn disconnect(&mut self) {
        if self.handle.take().is_some() {
            info!(
                "event=db_disconnect module=db status=ok connection={}",
                self.id
            );
        }
    }

    /// `user@database on host`, used in diagnostics.
    pub fn describe(&self) -> String {
        format!("{}@{} on {}", self.username, self.name, self.host)
    }

    fn open(&self) -> DbResult<Connection> {
        let started_at = Instant::now();
        let mode = if self.name == MEMORY_DATABASE {
            "memory"
        } else {
            "file"
        };
        info!(
            "event=db_connect module=db status=start connection={} mode={mode}",
            self.id
        );

        let opened = if self.name == MEMORY_DATABASE {
            Connection::open_in_memory()
        } else {
            Connection::open(&self.name)
        };

        let conn = opened.map_err(|err| {
            error!(
                "event=db_connect module=db status=error connection={} mode={mode} duration_ms={} error_code=db_open_failed",
                self.id,
                started_at.elapsed().as_millis()
            );
            self.connection_error(err.to_string())
        })?;

        if let Some(command) = self.init_command.as_deref().filter(|cmd| !cmd.trim().is_empty()) {
            conn.execute_batch(command).map_err(|err| {
                error!(
                    "event=db_connect module=db status=error connection={} mode={mode} duration_ms={} error_code=db_init_command_failed",
                    self.id,
                    started_at.elapsed().as_millis()
                );
                self.connection_error(err.to_string())
            })?;
        }

        info!(
            "event=db_connect module=db status=ok connection={} mode={mode} duration_ms={}",
            self.id,
            started_at.elapsed().as_millis()
        );
        Ok(conn)
    }

    fn connection_error(&self, message: String) -> DbError {
        if message.to_ascii_lowercase().contains("driver") {
            return DbError::ConnectionDriverMissing { message };
        }

        DbError::Connection {
            database: self.name.clone(),
            username: self.username.clone(),
            host: self.host.clone(),
            port: self.port,
            message,
        }
    }

    pub(crate) fn has_password(&self) -> bool {
        !self.password.expose_secret().is_empty()
    }
}

impl Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password)
            .field("init_command", &self.init_command)
            .field("connected", &self.is_connected())
            .finish()
    }
}
