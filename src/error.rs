//! Errors seen by callers of the client proxies.
//!
//! The taxonomy mirrors what a caller would see from an in-process driver:
//!
//! * [`DbError::Driver`] and [`DbError::Generic`] were raised on the worker
//!   and crossed the boundary with their classification intact.
//! * [`DbError::Protocol`] means the session is desynchronised or the
//!   transport failed. It is never sent across the boundary, always fatal.
//! * [`DbError::Usage`] is local misuse of the proxy API, raised without
//!   any request being sent.
//! * [`DbError::Worker`] is a failure to start the worker at all.

use thiserror::Error;

use crate::channel::ChannelError;
use crate::protocol::{ErrorEnvelope, ErrorKind, Handle};
use crate::types::{ErrorInfo, FetchMode};
use crate::value::Value;
use crate::worker::WorkerError;

/// Result type for client operations.
pub type DbResult<T> = Result<T, DbError>;

#[derive(Error, Debug)]
pub enum DbError {
    /// Raised by the remote driver.
    #[error("{message}")]
    Driver {
        message: String,
        /// SQLSTATE-like code.
        code: String,
        info: Option<ErrorInfo>,
    },

    /// Any other error raised while the worker dispatched the call.
    #[error("{message}")]
    Generic { message: String, code: i64 },

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Usage(#[from] UsageError),

    #[error(transparent)]
    Worker(#[from] WorkerError),
}

impl DbError {
    /// Protocol failures end the session; nothing else does.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DbError::Protocol(_))
    }

    pub fn is_driver(&self) -> bool {
        matches!(self, DbError::Driver { .. })
    }

    /// The SQLSTATE carried by a driver error.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            DbError::Driver { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Three-part diagnostic for driver errors.
    ///
    /// When the worker sent no detail but did send a code, the code stands
    /// in for both SQLSTATE and native code.
    pub fn error_info(&self) -> Option<ErrorInfo> {
        match self {
            DbError::Driver {
                info: Some(info), ..
            } => Some(info.clone()),
            DbError::Driver {
                code,
                message,
                info: None,
            } if !code.is_empty() && code != "0" => Some(ErrorInfo::new(
                code.clone(),
                code.parse().ok(),
                Some(message.clone()),
            )),
            _ => None,
        }
    }
}

impl From<ErrorEnvelope> for DbError {
    fn from(envelope: ErrorEnvelope) -> Self {
        match envelope.kind {
            ErrorKind::Driver => DbError::Driver {
                message: envelope.message,
                code: envelope.code,
                info: envelope.detail,
            },
            ErrorKind::Generic => DbError::Generic {
                code: envelope.code.parse().unwrap_or(0),
                message: envelope.message,
            },
        }
    }
}

impl From<ChannelError> for DbError {
    fn from(err: ChannelError) -> Self {
        DbError::Protocol(ProtocolError::Channel(err))
    }
}

/// The peers no longer agree on the state of the session.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("unknown object #{0}")]
    UnknownHandle(Handle),

    #[error("unexpected {got} response to {method}()")]
    UnexpectedResponse { method: String, got: &'static str },

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("channel closed before a response to {0}() arrived")]
    ClosedMidRequest(String),

    #[error("a previous request was abandoned part-way through being written")]
    Poisoned,

    #[error("session is closed")]
    SessionClosed,

    #[error(transparent)]
    Channel(ChannelError),
}

impl ProtocolError {
    pub fn unexpected_payload(expected: &str, got: &Value) -> Self {
        ProtocolError::Malformed(format!("expected {expected}, got {}", got.type_name()))
    }
}

/// Local misuse of the proxy API.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UsageError {
    #[error("The {0} fetch mode is not yet supported.")]
    UnsupportedFetchMode(FetchMode),

    #[error("The {0} fetch mode requires {1}.")]
    InvalidFetchArgument(FetchMode, &'static str),

    #[error("{0} must be configured as the default fetch mode in order to use it.")]
    DefaultModeRequired(FetchMode),

    #[error("{0}() binds by reference, which cannot cross a process boundary; use bind_value()")]
    BindByReference(&'static str),
}
