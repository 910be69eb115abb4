//! Wire messages exchanged between a client session and the dispatcher.
//!
//! ```text
//! client                                   worker
//!   | -- {"handle":0,"method":"prepare","args":[{"text":"SELECT 1"}]} --> |
//!   | <------------------- {"type":"new_statement","handle":1} --------- |
//!   | -- {"handle":1,"method":"execute"} --------------------------------> |
//!   | <------------------- {"type":"value","payload":{"bool":true}} ----- |
//!   | -- {"handle":1,"method":"release"} --------------------------------> |  (no reply)
//!   | -- {"handle":0,"method":"disconnect"} -----------------------------> |  (no reply)
//! ```
//!
//! There is no request id: a channel never carries more than one
//! unanswered request, so order alone pairs requests with responses.

pub mod operation;

use serde::{Deserialize, Serialize};

use crate::types::ErrorInfo;
use crate::value::Value;

pub use operation::{ConnectionOp, StatementOp};

/// Identifier of a server-side object.
pub type Handle = u64;

/// The connection object. Never reassigned while the connection lives.
pub const CONNECTION_HANDLE: Handle = 0;

/// A call on a remote object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub handle: Handle,
    pub method: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Value>,
}

impl Request {
    pub fn new(handle: Handle, method: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            handle,
            method: method.into(),
            args,
        }
    }
}

/// Outcome of one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// The operation's return value.
    Value { payload: Value },
    /// The operation produced a live statement registered under `handle`.
    NewStatement { handle: Handle },
    /// The operation raised.
    Error(ErrorEnvelope),
}

impl Response {
    pub fn value(payload: impl Into<Value>) -> Self {
        Response::Value {
            payload: payload.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Response::Value { .. } => "value",
            Response::NewStatement { .. } => "new_statement",
            Response::Error(_) => "error",
        }
    }
}

/// Which family an error belongs to on the raising side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Raised by the driver; carries SQLSTATE, native code and message.
    Driver,
    /// Anything else raised while dispatching; carries message and code.
    Generic,
}

/// An error flattened for transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub kind: ErrorKind,
    /// SQLSTATE for driver errors, a numeric code rendered as text otherwise.
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<ErrorInfo>,
}

impl ErrorEnvelope {
    pub fn driver(message: impl Into<String>, detail: ErrorInfo) -> Self {
        Self {
            kind: ErrorKind::Driver,
            code: detail.sqlstate.clone(),
            message: message.into(),
            detail: Some(detail),
        }
    }

    pub fn generic(message: impl Into<String>, code: i64) -> Self {
        Self {
            kind: ErrorKind::Generic,
            code: code.to_string(),
            message: message.into(),
            detail: None,
        }
    }
}
