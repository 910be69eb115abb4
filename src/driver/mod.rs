//! The synchronous database driver behind the worker.
//!
//! The dispatcher only ever talks to these traits. A driver opens
//! connections; a connection prepares statements. Statement operations
//! take the owning connection by `&mut`, so a statement can never outlive
//! or run without the connection it came from.
//!
//! Every call may block. Nothing here is async: the worker runs the
//! driver on its own thread and the caller only ever sees it through the
//! protocol.

mod error;
mod row;
pub mod sqlite;

pub use error::{describe_sqlstate, DriverError, DriverResult};
pub use row::{ensure_primitive, shape_row};
pub use sqlite::SqliteDriver;

use crate::types::{Attribute, ColumnMeta, ConnectParams, CursorOrientation, ErrorInfo, FetchMode, Param, ParamType, Params};
use crate::value::Value;

/// Opens connections.
pub trait Driver: Send + 'static {
    type Connection: DriverConnection;

    /// Name reported through [`Attribute::DriverName`].
    fn name(&self) -> &'static str;

    fn open(&self, params: &ConnectParams) -> DriverResult<Self::Connection>;
}

/// A live connection.
pub trait DriverConnection: Send + 'static {
    type Statement: DriverStatement<Connection = Self>;

    /// Prepare a statement; `None` when the SQL holds no statement at all.
    fn prepare(&mut self, sql: &str) -> DriverResult<Option<Self::Statement>>;

    /// Prepare and execute in one step.
    fn query(&mut self, sql: &str) -> DriverResult<Option<Self::Statement>>;

    /// Run SQL without a result set and return the number of affected rows.
    fn exec(&mut self, sql: &str) -> DriverResult<u64>;

    fn begin_transaction(&mut self) -> DriverResult<bool>;
    fn commit(&mut self) -> DriverResult<bool>;
    fn roll_back(&mut self) -> DriverResult<bool>;
    fn in_transaction(&self) -> bool;

    fn last_insert_id(&mut self, name: Option<&str>) -> DriverResult<String>;

    /// SQLSTATE of the last operation, `None` before the first one.
    fn error_code(&self) -> Option<String>;
    fn error_info(&self) -> ErrorInfo;

    fn quote(&mut self, string: &str, param_type: ParamType) -> DriverResult<String>;

    fn get_attribute(&mut self, attribute: Attribute) -> DriverResult<Value>;
    fn set_attribute(&mut self, attribute: Attribute, value: Value) -> DriverResult<bool>;
}

/// A prepared statement and its cursor.
pub trait DriverStatement: Send + 'static {
    type Connection;

    fn execute(&mut self, conn: &mut Self::Connection, params: Option<Params>) -> DriverResult<bool>;

    fn bind_value(&mut self, param: Param, value: Value, param_type: ParamType) -> DriverResult<bool>;

    /// Next row shaped by `mode` (the connection default when `None`);
    /// `Ok(None)` once the cursor is exhausted.
    fn fetch(
        &mut self,
        conn: &mut Self::Connection,
        mode: Option<FetchMode>,
        orientation: CursorOrientation,
        offset: i64,
    ) -> DriverResult<Option<Value>>;

    fn fetch_all(&mut self, conn: &mut Self::Connection, mode: Option<FetchMode>) -> DriverResult<Vec<Value>>;

    fn fetch_column(&mut self, index: usize) -> DriverResult<Option<Value>>;

    fn column_count(&self) -> i64;
    fn row_count(&self) -> u64;

    /// `Ok(None)` when the column does not exist.
    fn get_column_meta(&mut self, index: usize) -> DriverResult<Option<ColumnMeta>>;

    fn next_rowset(&mut self) -> DriverResult<bool>;
    fn close_cursor(&mut self) -> DriverResult<bool>;

    fn get_attribute(&mut self, attribute: Attribute) -> DriverResult<Value>;
    fn set_attribute(&mut self, attribute: Attribute, value: Value) -> DriverResult<bool>;

    fn error_code(&self) -> Option<String>;
    fn error_info(&self) -> ErrorInfo;

    fn query_string(&self) -> &str;
    fn debug_dump_params(&self) -> String;
}
