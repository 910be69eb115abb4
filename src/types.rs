//! Protocol-level vocabulary shared by both sides of the boundary.
//!
//! Enumerations travel as their snake_case names inside [`Value::Text`];
//! structured types travel as lists or records. Each type knows how to turn
//! itself into a [`Value`] for a request and back via [`FromValue`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::value::{FromValue, Key, Record, Value};

macro_rules! named_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("unknown {} '{}'", stringify!($name), other)),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl From<$name> for Value {
            fn from(v: $name) -> Self {
                Value::Text(v.as_str().to_string())
            }
        }

        impl FromValue for $name {
            fn from_value(value: Value) -> Result<Self, ProtocolError> {
                match value {
                    Value::Text(s) => s.parse().map_err(ProtocolError::Malformed),
                    other => Err(ProtocolError::unexpected_payload(stringify!($name), &other)),
                }
            }
        }
    };
}

named_enum! {
    /// How a result row is shaped.
    FetchMode {
        /// Column name to value.
        Assoc => "assoc",
        /// Name and position keys side by side.
        Both => "both",
        /// Like `Assoc`, but duplicate names collect their values in a list.
        Named => "named",
        /// Positional list.
        Num => "num",
        /// Anonymous object.
        Obj => "obj",
        /// New instance of a caller-side type, hydrated on the caller side.
        Class => "class",
        /// Existing caller-side instance, populated on the caller side.
        Into => "into",
        Bound => "bound",
        Lazy => "lazy",
    }
}

impl FetchMode {
    /// Modes a driver can answer on its own, without caller-side types.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            FetchMode::Assoc | FetchMode::Both | FetchMode::Named | FetchMode::Num | FetchMode::Obj
        )
    }

    /// Modes that rely on by-reference binding or lazy row objects, which
    /// have no sound remote equivalent.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, FetchMode::Bound | FetchMode::Lazy)
    }
}

named_enum! {
    /// Cursor movement for a single-row fetch.
    CursorOrientation {
        Next => "next",
        Prior => "prior",
        First => "first",
        Last => "last",
        Abs => "abs",
        Rel => "rel",
    }
}

impl Default for CursorOrientation {
    fn default() -> Self {
        CursorOrientation::Next
    }
}

named_enum! {
    /// Data type hint for a bound value.
    ParamType {
        Null => "null",
        Int => "int",
        Str => "str",
        Lob => "lob",
        Bool => "bool",
    }
}

impl Default for ParamType {
    fn default() -> Self {
        ParamType::Str
    }
}

named_enum! {
    /// Connection attributes understood by the protocol.
    Attribute {
        /// Key case for associative rows (`natural`, `lower`, `upper`).
        Case => "case",
        /// Error reporting mode; only `exception` is supported.
        ErrMode => "err_mode",
        /// Fetch mode used when a fetch names none.
        DefaultFetchMode => "default_fetch_mode",
        DriverName => "driver_name",
        ServerVersion => "server_version",
        ClientVersion => "client_version",
        /// Lock wait timeout in seconds.
        Timeout => "timeout",
    }
}

named_enum! {
    /// Key case applied to column names in associative rows.
    CaseMode {
        Natural => "natural",
        Lower => "lower",
        Upper => "upper",
    }
}

impl CaseMode {
    pub fn apply(&self, name: &str) -> String {
        match self {
            CaseMode::Natural => name.to_string(),
            CaseMode::Lower => name.to_lowercase(),
            CaseMode::Upper => name.to_uppercase(),
        }
    }
}

/// A placeholder: 1-based position or name (with or without the leading
/// colon).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Param {
    Position(usize),
    Name(String),
}

impl From<usize> for Param {
    fn from(v: usize) -> Self {
        Param::Position(v)
    }
}

impl From<&str> for Param {
    fn from(v: &str) -> Self {
        Param::Name(v.to_string())
    }
}

impl From<Param> for Value {
    fn from(v: Param) -> Self {
        match v {
            Param::Position(i) => Value::Int(i as i64),
            Param::Name(n) => Value::Text(n),
        }
    }
}

impl FromValue for Param {
    fn from_value(value: Value) -> Result<Self, ProtocolError> {
        match value {
            Value::Int(i) if i > 0 => Ok(Param::Position(i as usize)),
            Value::Text(n) => Ok(Param::Name(n)),
            other => Err(ProtocolError::unexpected_payload("parameter", &other)),
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Position(i) => write!(f, "#{i}"),
            Param::Name(n) => write!(f, "{n}"),
        }
    }
}

/// Input parameters for a statement execution.
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    Positional(Vec<Value>),
    Named(Vec<(String, Value)>),
}

impl Params {
    pub fn len(&self) -> usize {
        match self {
            Params::Positional(v) => v.len(),
            Params::Named(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten into `(placeholder, value)` pairs.
    pub fn into_bindings(self) -> Vec<(Param, Value)> {
        match self {
            Params::Positional(values) => values
                .into_iter()
                .enumerate()
                .map(|(i, v)| (Param::Position(i + 1), v))
                .collect(),
            Params::Named(values) => values
                .into_iter()
                .map(|(n, v)| (Param::Name(n), v))
                .collect(),
        }
    }
}

impl From<Params> for Value {
    fn from(v: Params) -> Self {
        match v {
            Params::Positional(values) => Value::List(values),
            Params::Named(values) => Value::Record(values.into_iter().collect()),
        }
    }
}

impl FromValue for Params {
    fn from_value(value: Value) -> Result<Self, ProtocolError> {
        match value {
            Value::List(values) => Ok(Params::Positional(values)),
            Value::Record(record) => record
                .into_iter()
                .map(|(k, v)| match k {
                    Key::Name(n) => Ok((n, v)),
                    Key::Index(i) => Err(ProtocolError::Malformed(format!(
                        "named parameters cannot use index key {i}"
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Params::Named),
            other => Err(ProtocolError::unexpected_payload("parameters", &other)),
        }
    }
}

/// The three-part diagnostic a driver keeps for its last operation:
/// SQLSTATE, driver-native code, driver message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub sqlstate: String,
    pub native_code: Option<i64>,
    pub message: Option<String>,
}

impl ErrorInfo {
    pub const SUCCESS: &'static str = "00000";

    pub fn new(sqlstate: impl Into<String>, native_code: Option<i64>, message: Option<String>) -> Self {
        Self {
            sqlstate: sqlstate.into(),
            native_code,
            message,
        }
    }

    /// The state after an operation that succeeded.
    pub fn success() -> Self {
        Self::new(Self::SUCCESS, None, None)
    }

    pub fn is_success(&self) -> bool {
        self.sqlstate == Self::SUCCESS
    }
}

impl From<ErrorInfo> for Value {
    fn from(v: ErrorInfo) -> Self {
        Value::List(vec![
            Value::Text(v.sqlstate),
            v.native_code.into(),
            v.message.into(),
        ])
    }
}

impl FromValue for ErrorInfo {
    fn from_value(value: Value) -> Result<Self, ProtocolError> {
        match value {
            Value::List(items) if items.len() == 3 => {
                let mut items = items.into_iter();
                let sqlstate = String::from_value(items.next().unwrap_or(Value::Null))?;
                let native_code = Option::<i64>::from_value(items.next().unwrap_or(Value::Null))?;
                let message = Option::<String>::from_value(items.next().unwrap_or(Value::Null))?;
                Ok(ErrorInfo::new(sqlstate, native_code, message))
            }
            other => Err(ProtocolError::unexpected_payload("error info", &other)),
        }
    }
}

/// Metadata about one result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    /// Storage class of the column as the driver reports it.
    pub native_type: Option<String>,
    /// Declared type from the table definition, if any.
    pub decl_type: Option<String>,
    pub len: i64,
    pub precision: i64,
    pub param_type: ParamType,
}

impl From<ColumnMeta> for Value {
    fn from(v: ColumnMeta) -> Self {
        let mut record = Record::with_capacity(6);
        record.insert("name", v.name);
        record.insert("native_type", v.native_type);
        record.insert("decl_type", v.decl_type);
        record.insert("len", v.len);
        record.insert("precision", v.precision);
        record.insert("param_type", v.param_type);
        Value::Record(record)
    }
}

impl FromValue for ColumnMeta {
    fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let record = match value {
            Value::Record(record) => record,
            other => return Err(ProtocolError::unexpected_payload("column meta", &other)),
        };
        let field = |name: &str| record.get(name).cloned().unwrap_or(Value::Null);
        Ok(ColumnMeta {
            name: String::from_value(field("name"))?,
            native_type: Option::<String>::from_value(field("native_type"))?,
            decl_type: Option::<String>::from_value(field("decl_type"))?,
            len: i64::from_value(field("len"))?,
            precision: i64::from_value(field("precision"))?,
            param_type: ParamType::from_value(field("param_type"))?,
        })
    }
}

/// Everything needed to open a driver connection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectParams {
    pub dsn: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Attributes applied right after the connection opens.
    pub options: Vec<(Attribute, Value)>,
}

impl ConnectParams {
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            ..Self::default()
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_option(mut self, attribute: Attribute, value: impl Into<Value>) -> Self {
        self.options.push((attribute, value.into()));
        self
    }
}
