//! SQLite driver built on rusqlite.
//!
//! DSNs take the form `sqlite:<path>`, with `sqlite::memory:` for a private
//! in-memory database. SQLite result codes are mapped onto SQLSTATEs the
//! way PDO's sqlite driver maps them, so error codes look the same to a
//! caller whichever side of the boundary raised them.

mod connection;
mod convert;
mod statement;

use std::time::Duration;

use rusqlite::ErrorCode;
use tracing::debug;

pub use connection::SqliteConnection;
pub use statement::SqliteStatement;

use super::{Driver, DriverConnection, DriverError, DriverResult};
use crate::config::Dsn;
use crate::types::ConnectParams;

/// Busy timeout applied to new connections, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// The SQLite driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDriver;

impl SqliteDriver {
    pub fn new() -> Self {
        Self
    }
}

impl Driver for SqliteDriver {
    type Connection = SqliteConnection;

    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn open(&self, params: &ConnectParams) -> DriverResult<SqliteConnection> {
        let dsn = Dsn::parse(&params.dsn).map_err(|err| DriverError::generic(err.to_string()))?;
        if dsn.driver != self.name() {
            return Err(DriverError::generic("could not find driver"));
        }

        let conn = if dsn.target == ":memory:" {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open(&dsn.target)
        }
        .map_err(map_error)?;

        let timeout = Duration::from_secs(DEFAULT_TIMEOUT_SECS);
        conn.busy_timeout(timeout).map_err(map_error)?;
        debug!(target = %dsn.target, "opened sqlite database");

        let mut connection = SqliteConnection::new(conn, timeout);
        for (attribute, value) in &params.options {
            connection.set_attribute(*attribute, value.clone())?;
        }
        Ok(connection)
    }
}

/// Translate a rusqlite error into a driver error.
pub(crate) fn map_error(err: rusqlite::Error) -> DriverError {
    match err {
        rusqlite::Error::SqliteFailure(failure, message) => {
            let message = message.unwrap_or_else(|| failure.to_string());
            sqlite_failure(failure, message)
        }
        // Prepare-time errors carry the offending SQL; only SQLite's own
        // message is kept.
        rusqlite::Error::SqlInputError { error, msg, .. } => sqlite_failure(error, msg),
        rusqlite::Error::InvalidParameterName(_) | rusqlite::Error::InvalidParameterCount(..) => {
            DriverError::invalid_parameter("parameter was not defined")
        }
        rusqlite::Error::InvalidColumnIndex(_) => DriverError::generic("Invalid column index"),
        other => DriverError::sql("HY000", None, other.to_string()),
    }
}

fn sqlite_failure(failure: rusqlite::ffi::Error, message: String) -> DriverError {
    let sqlstate = match failure.code {
        ErrorCode::ConstraintViolation => "23000",
        ErrorCode::NotFound => "42S02",
        ErrorCode::OperationInterrupted => "01002",
        ErrorCode::NoLargeFileSupport => "HYC00",
        ErrorCode::TooBig => "22001",
        _ => "HY000",
    };
    DriverError::sql(sqlstate, Some(i64::from(failure.extended_code & 0xff)), message)
}
