//! The allow-listed operation set.
//!
//! A request names its operation with a free-form string; the dispatcher
//! only ever acts on the typed variants below. Anything outside the list is
//! answered with an error and never reaches the driver.

use thiserror::Error;

use super::{Handle, Request, CONNECTION_HANDLE};
use crate::error::ProtocolError;
use crate::types::{Attribute, ConnectParams, CursorOrientation, FetchMode, Param, ParamType, Params};
use crate::value::{FromValue, Key, Record, Value};

/// Why a request could not be turned into an operation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperationError {
    #[error("Call to undefined method {0}()")]
    UnknownMethod(String),

    #[error("{method}(): argument #{position} ({name}) {problem}")]
    BadArgument {
        method: String,
        position: usize,
        name: &'static str,
        problem: String,
    },
}

/// Operations on the connection object (handle 0).
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionOp {
    Connect(ConnectParams),
    Disconnect,
    Prepare { sql: String },
    Query { sql: String },
    Exec { sql: String },
    BeginTransaction,
    Commit,
    RollBack,
    InTransaction,
    LastInsertId { name: Option<String> },
    ErrorCode,
    ErrorInfo,
    Quote { string: String, param_type: ParamType },
    GetAttribute(Attribute),
    SetAttribute(Attribute, Value),
}

impl ConnectionOp {
    pub fn method(&self) -> &'static str {
        match self {
            ConnectionOp::Connect(_) => "connect",
            ConnectionOp::Disconnect => "disconnect",
            ConnectionOp::Prepare { .. } => "prepare",
            ConnectionOp::Query { .. } => "query",
            ConnectionOp::Exec { .. } => "exec",
            ConnectionOp::BeginTransaction => "begin_transaction",
            ConnectionOp::Commit => "commit",
            ConnectionOp::RollBack => "roll_back",
            ConnectionOp::InTransaction => "in_transaction",
            ConnectionOp::LastInsertId { .. } => "last_insert_id",
            ConnectionOp::ErrorCode => "error_code",
            ConnectionOp::ErrorInfo => "error_info",
            ConnectionOp::Quote { .. } => "quote",
            ConnectionOp::GetAttribute(_) => "get_attribute",
            ConnectionOp::SetAttribute(..) => "set_attribute",
        }
    }

    /// Notifications are never answered.
    pub fn is_notification(&self) -> bool {
        matches!(self, ConnectionOp::Disconnect)
    }

    pub fn into_request(self) -> Request {
        let method = self.method();
        let args = match self {
            ConnectionOp::Connect(params) => {
                let options: Record = params
                    .options
                    .into_iter()
                    .map(|(attribute, value)| (Key::from(attribute.as_str()), value))
                    .collect();
                vec![
                    Value::Text(params.dsn),
                    params.username.into(),
                    params.password.into(),
                    Value::Record(options),
                ]
            }
            ConnectionOp::Prepare { sql } | ConnectionOp::Query { sql } | ConnectionOp::Exec { sql } => {
                vec![Value::Text(sql)]
            }
            ConnectionOp::LastInsertId { name } => match name {
                Some(name) => vec![Value::Text(name)],
                None => vec![],
            },
            ConnectionOp::Quote { string, param_type } => {
                vec![Value::Text(string), param_type.into()]
            }
            ConnectionOp::GetAttribute(attribute) => vec![attribute.into()],
            ConnectionOp::SetAttribute(attribute, value) => vec![attribute.into(), value],
            ConnectionOp::Disconnect
            | ConnectionOp::BeginTransaction
            | ConnectionOp::Commit
            | ConnectionOp::RollBack
            | ConnectionOp::InTransaction
            | ConnectionOp::ErrorCode
            | ConnectionOp::ErrorInfo => vec![],
        };
        Request::new(CONNECTION_HANDLE, method, args)
    }

    pub fn decode(method: &str, args: Vec<Value>) -> Result<Self, OperationError> {
        let mut args = Args::new(method, args);
        let op = match method {
            "connect" => {
                let dsn = args.required("dsn")?;
                let username = args.optional("username")?;
                let password = args.optional("password")?;
                let options = match args.optional::<Value>("options")? {
                    None => Vec::new(),
                    Some(Value::Record(record)) => decode_options(method, record)?,
                    Some(other) => {
                        return Err(args.bad(4, "options", format!("must be a record, {} given", other.type_name())))
                    }
                };
                ConnectionOp::Connect(ConnectParams {
                    dsn,
                    username,
                    password,
                    options,
                })
            }
            "disconnect" => ConnectionOp::Disconnect,
            "prepare" => ConnectionOp::Prepare {
                sql: args.required("statement")?,
            },
            "query" => ConnectionOp::Query {
                sql: args.required("statement")?,
            },
            "exec" => ConnectionOp::Exec {
                sql: args.required("statement")?,
            },
            "begin_transaction" => ConnectionOp::BeginTransaction,
            "commit" => ConnectionOp::Commit,
            "roll_back" => ConnectionOp::RollBack,
            "in_transaction" => ConnectionOp::InTransaction,
            "last_insert_id" => ConnectionOp::LastInsertId {
                name: args.optional("name")?,
            },
            "error_code" => ConnectionOp::ErrorCode,
            "error_info" => ConnectionOp::ErrorInfo,
            "quote" => ConnectionOp::Quote {
                string: args.required("string")?,
                param_type: args.optional("type")?.unwrap_or_default(),
            },
            "get_attribute" => ConnectionOp::GetAttribute(args.required("attribute")?),
            "set_attribute" => ConnectionOp::SetAttribute(args.required("attribute")?, args.required("value")?),
            other => return Err(OperationError::UnknownMethod(other.to_string())),
        };
        Ok(op)
    }
}

fn decode_options(method: &str, record: Record) -> Result<Vec<(Attribute, Value)>, OperationError> {
    record
        .into_iter()
        .map(|(key, value)| {
            let attribute = match &key {
                Key::Name(name) => name.parse::<Attribute>().ok(),
                Key::Index(_) => None,
            };
            attribute
                .map(|attribute| (attribute, value))
                .ok_or_else(|| OperationError::BadArgument {
                    method: method.to_string(),
                    position: 4,
                    name: "options",
                    problem: format!("names unknown attribute '{key}'"),
                })
        })
        .collect()
}

/// Operations on a statement object.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementOp {
    Release,
    Execute { params: Option<Params> },
    BindValue { param: Param, value: Value, param_type: ParamType },
    Fetch { mode: Option<FetchMode>, orientation: CursorOrientation, offset: i64 },
    FetchAll { mode: Option<FetchMode> },
    FetchColumn { index: usize },
    ColumnCount,
    RowCount,
    GetColumnMeta { index: usize },
    NextRowset,
    CloseCursor,
    GetAttribute(Attribute),
    SetAttribute(Attribute, Value),
    ErrorCode,
    ErrorInfo,
    QueryString,
    DebugDumpParams,
}

impl StatementOp {
    pub fn method(&self) -> &'static str {
        match self {
            StatementOp::Release => "release",
            StatementOp::Execute { .. } => "execute",
            StatementOp::BindValue { .. } => "bind_value",
            StatementOp::Fetch { .. } => "fetch",
            StatementOp::FetchAll { .. } => "fetch_all",
            StatementOp::FetchColumn { .. } => "fetch_column",
            StatementOp::ColumnCount => "column_count",
            StatementOp::RowCount => "row_count",
            StatementOp::GetColumnMeta { .. } => "get_column_meta",
            StatementOp::NextRowset => "next_rowset",
            StatementOp::CloseCursor => "close_cursor",
            StatementOp::GetAttribute(_) => "get_attribute",
            StatementOp::SetAttribute(..) => "set_attribute",
            StatementOp::ErrorCode => "error_code",
            StatementOp::ErrorInfo => "error_info",
            StatementOp::QueryString => "query_string",
            StatementOp::DebugDumpParams => "debug_dump_params",
        }
    }

    pub fn is_notification(&self) -> bool {
        matches!(self, StatementOp::Release)
    }

    pub fn into_request(self, handle: Handle) -> Request {
        let method = self.method();
        let args = match self {
            StatementOp::Execute { params } => match params {
                Some(params) => vec![params.into()],
                None => vec![],
            },
            StatementOp::BindValue {
                param,
                value,
                param_type,
            } => vec![param.into(), value, param_type.into()],
            StatementOp::Fetch {
                mode,
                orientation,
                offset,
            } => vec![mode.into(), orientation.into(), Value::Int(offset)],
            StatementOp::FetchAll { mode } => match mode {
                Some(mode) => vec![mode.into()],
                None => vec![],
            },
            StatementOp::FetchColumn { index } | StatementOp::GetColumnMeta { index } => {
                vec![Value::Int(index as i64)]
            }
            StatementOp::GetAttribute(attribute) => vec![attribute.into()],
            StatementOp::SetAttribute(attribute, value) => vec![attribute.into(), value],
            StatementOp::Release
            | StatementOp::ColumnCount
            | StatementOp::RowCount
            | StatementOp::NextRowset
            | StatementOp::CloseCursor
            | StatementOp::ErrorCode
            | StatementOp::ErrorInfo
            | StatementOp::QueryString
            | StatementOp::DebugDumpParams => vec![],
        };
        Request::new(handle, method, args)
    }

    pub fn decode(method: &str, args: Vec<Value>) -> Result<Self, OperationError> {
        let mut args = Args::new(method, args);
        let op = match method {
            "release" => StatementOp::Release,
            "execute" => StatementOp::Execute {
                params: args.optional("params")?,
            },
            "bind_value" => StatementOp::BindValue {
                param: args.required("param")?,
                value: args.required("value")?,
                param_type: args.optional("type")?.unwrap_or_default(),
            },
            "fetch" => StatementOp::Fetch {
                mode: args.optional("mode")?,
                orientation: args.optional("cursor_orientation")?.unwrap_or_default(),
                offset: args.optional("cursor_offset")?.unwrap_or(0),
            },
            "fetch_all" => StatementOp::FetchAll {
                mode: args.optional("mode")?,
            },
            "fetch_column" => StatementOp::FetchColumn {
                index: args.index("column")?.unwrap_or(0),
            },
            "column_count" => StatementOp::ColumnCount,
            "row_count" => StatementOp::RowCount,
            "get_column_meta" => StatementOp::GetColumnMeta {
                index: args.index("column")?.unwrap_or(0),
            },
            "next_rowset" => StatementOp::NextRowset,
            "close_cursor" => StatementOp::CloseCursor,
            "get_attribute" => StatementOp::GetAttribute(args.required("attribute")?),
            "set_attribute" => StatementOp::SetAttribute(args.required("attribute")?, args.required("value")?),
            "error_code" => StatementOp::ErrorCode,
            "error_info" => StatementOp::ErrorInfo,
            "query_string" => StatementOp::QueryString,
            "debug_dump_params" => StatementOp::DebugDumpParams,
            other => return Err(OperationError::UnknownMethod(other.to_string())),
        };
        Ok(op)
    }
}

/// Positional argument reader.
struct Args {
    method: String,
    items: std::vec::IntoIter<Value>,
    position: usize,
}

impl Args {
    fn new(method: &str, args: Vec<Value>) -> Self {
        Self {
            method: method.to_string(),
            items: args.into_iter(),
            position: 0,
        }
    }

    fn bad(&self, position: usize, name: &'static str, problem: impl Into<String>) -> OperationError {
        OperationError::BadArgument {
            method: self.method.clone(),
            position,
            name,
            problem: problem.into(),
        }
    }

    fn convert<T: FromValue>(&self, name: &'static str, value: Value) -> Result<T, OperationError> {
        T::from_value(value).map_err(|err: ProtocolError| self.bad(self.position, name, err.to_string()))
    }

    fn required<T: FromValue>(&mut self, name: &'static str) -> Result<T, OperationError> {
        self.position += 1;
        match self.items.next() {
            Some(value) => self.convert(name, value),
            None => Err(self.bad(self.position, name, "is required")),
        }
    }

    /// A missing argument and an explicit `null` both mean "not given".
    fn optional<T: FromValue>(&mut self, name: &'static str) -> Result<Option<T>, OperationError> {
        self.position += 1;
        match self.items.next() {
            None | Some(Value::Null) => Ok(None),
            Some(value) => self.convert(name, value).map(Some),
        }
    }

    fn index(&mut self, name: &'static str) -> Result<Option<usize>, OperationError> {
        match self.optional::<i64>(name)? {
            Some(i) if i < 0 => Err(self.bad(self.position, name, "must be greater than or equal to 0")),
            Some(i) => Ok(Some(i as usize)),
            None => Ok(None),
        }
    }
}
