use std::time::Duration;

use super::{map_error, SqliteStatement};
use crate::driver::{DriverConnection, DriverError, DriverResult, DriverStatement};
use crate::types::{Attribute, CaseMode, ErrorInfo, FetchMode, ParamType};
use crate::value::{FromValue, Value};

/// An open SQLite database.
#[derive(Debug)]
pub struct SqliteConnection {
    pub(super) conn: rusqlite::Connection,
    pub(super) case: CaseMode,
    pub(super) default_fetch_mode: FetchMode,
    timeout: Duration,
    last_error: Option<ErrorInfo>,
}

impl SqliteConnection {
    pub(super) fn new(conn: rusqlite::Connection, timeout: Duration) -> Self {
        Self {
            conn,
            case: CaseMode::Natural,
            default_fetch_mode: FetchMode::Both,
            timeout,
            last_error: None,
        }
    }

    /// Remember the outcome of an operation for `error_code`/`error_info`.
    fn track<T>(&mut self, result: DriverResult<T>) -> DriverResult<T> {
        self.last_error = Some(match &result {
            Ok(_) => ErrorInfo::success(),
            Err(err) => err.info(),
        });
        result
    }

    fn batch(&mut self, sql: &str) -> DriverResult<()> {
        let result = self.conn.execute_batch(sql).map_err(map_error);
        self.track(result)
    }

    fn apply_attribute(&mut self, attribute: Attribute, value: Value) -> DriverResult<bool> {
        match attribute {
            Attribute::Case => {
                self.case = parse_attribute(attribute, value)?;
            }
            Attribute::ErrMode => {
                if value.as_str() != Some("exception") {
                    return Err(DriverError::generic("Only the exception error mode is supported"));
                }
            }
            Attribute::DefaultFetchMode => {
                let mode: FetchMode = parse_attribute(attribute, value)?;
                if !mode.is_primitive() {
                    return Err(DriverError::generic(format!(
                        "The {mode} fetch mode cannot be used as the connection default"
                    )));
                }
                self.default_fetch_mode = mode;
            }
            Attribute::Timeout => {
                let seconds = value
                    .as_i64()
                    .filter(|seconds| *seconds >= 0)
                    .ok_or_else(|| DriverError::generic("timeout must be a non-negative number of seconds"))?;
                let timeout = Duration::from_secs(seconds as u64);
                self.conn.busy_timeout(timeout).map_err(map_error)?;
                self.timeout = timeout;
            }
            Attribute::DriverName | Attribute::ServerVersion | Attribute::ClientVersion => return Ok(false),
        }
        Ok(true)
    }
}

fn parse_attribute<T: FromValue>(attribute: Attribute, value: Value) -> DriverResult<T> {
    T::from_value(value).map_err(|err| DriverError::generic(format!("invalid value for {attribute}: {err}")))
}

impl DriverConnection for SqliteConnection {
    type Statement = SqliteStatement;

    fn prepare(&mut self, sql: &str) -> DriverResult<Option<SqliteStatement>> {
        let result = SqliteStatement::prepare(&self.conn, sql);
        self.track(result)
    }

    fn query(&mut self, sql: &str) -> DriverResult<Option<SqliteStatement>> {
        let Some(mut stmt) = self.prepare(sql)? else {
            return Ok(None);
        };
        let result = stmt.execute(self, None).map(|_| Some(stmt));
        self.track(result)
    }

    fn exec(&mut self, sql: &str) -> DriverResult<u64> {
        self.batch(sql)?;
        Ok(self.conn.changes() as u64)
    }

    fn begin_transaction(&mut self) -> DriverResult<bool> {
        if self.in_transaction() {
            return Err(DriverError::generic("There is already an active transaction"));
        }
        self.batch("BEGIN").map(|()| true)
    }

    fn commit(&mut self) -> DriverResult<bool> {
        if !self.in_transaction() {
            return Err(DriverError::generic("There is no active transaction"));
        }
        self.batch("COMMIT").map(|()| true)
    }

    fn roll_back(&mut self) -> DriverResult<bool> {
        if !self.in_transaction() {
            return Err(DriverError::generic("There is no active transaction"));
        }
        self.batch("ROLLBACK").map(|()| true)
    }

    fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    fn last_insert_id(&mut self, _name: Option<&str>) -> DriverResult<String> {
        Ok(self.conn.last_insert_rowid().to_string())
    }

    fn error_code(&self) -> Option<String> {
        self.last_error.as_ref().map(|info| info.sqlstate.clone())
    }

    fn error_info(&self) -> ErrorInfo {
        self.last_error
            .clone()
            .unwrap_or_else(|| ErrorInfo::new("", None, None))
    }

    fn quote(&mut self, string: &str, _param_type: ParamType) -> DriverResult<String> {
        Ok(format!("'{}'", string.replace('\'', "''")))
    }

    fn get_attribute(&mut self, attribute: Attribute) -> DriverResult<Value> {
        let value = match attribute {
            Attribute::Case => self.case.into(),
            Attribute::ErrMode => Value::from("exception"),
            Attribute::DefaultFetchMode => self.default_fetch_mode.into(),
            Attribute::DriverName => Value::from("sqlite"),
            Attribute::ServerVersion | Attribute::ClientVersion => Value::from(rusqlite::version()),
            Attribute::Timeout => Value::Int(self.timeout.as_secs() as i64),
        };
        Ok(value)
    }

    fn set_attribute(&mut self, attribute: Attribute, value: Value) -> DriverResult<bool> {
        let result = self.apply_attribute(attribute, value);
        self.track(result)
    }
}
