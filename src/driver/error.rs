//! Errors raised by a driver.

use thiserror::Error;

use crate::types::ErrorInfo;

/// Result type for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;

/// A failed driver call.
///
/// SQL errors carry the full three-part diagnostic; anything else the
/// driver objects to (misuse, unsupported values) is generic.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    #[error("{}", format_sql_message(.sqlstate, .native_code, .message))]
    Sql {
        sqlstate: String,
        native_code: Option<i64>,
        message: String,
    },

    #[error("{message}")]
    Generic { code: i64, message: String },
}

impl DriverError {
    pub fn sql(sqlstate: impl Into<String>, native_code: Option<i64>, message: impl Into<String>) -> Self {
        Self::Sql {
            sqlstate: sqlstate.into(),
            native_code,
            message: message.into(),
        }
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            code: 0,
            message: message.into(),
        }
    }

    /// The feature asked for is not implemented by this driver.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::sql("IM001", None, message)
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::sql("HY093", None, message)
    }

    /// Diagnostic left behind by this error.
    ///
    /// Generic errors have no SQLSTATE of their own and report the general
    /// error state.
    pub fn info(&self) -> ErrorInfo {
        match self {
            DriverError::Sql {
                sqlstate,
                native_code,
                message,
            } => ErrorInfo::new(sqlstate.clone(), *native_code, Some(message.clone())),
            DriverError::Generic { message, .. } => ErrorInfo::new("HY000", None, Some(message.clone())),
        }
    }
}

/// `SQLSTATE[HY000]: General error: 1 near "FOO": syntax error`
fn format_sql_message(sqlstate: &str, native_code: &Option<i64>, message: &str) -> String {
    let description = describe_sqlstate(sqlstate);
    match native_code {
        Some(code) => format!("SQLSTATE[{sqlstate}]: {description}: {code} {message}"),
        None => format!("SQLSTATE[{sqlstate}]: {description}: {message}"),
    }
}

/// Human-readable class of a SQLSTATE.
pub fn describe_sqlstate(sqlstate: &str) -> &'static str {
    match sqlstate {
        "00000" => "No error",
        "01002" => "Disconnect error",
        "08003" => "Connection does not exist",
        "22001" => "String data, right truncated",
        "23000" => "Integrity constraint violation",
        "42S02" => "Base table or view not found",
        "HY093" => "Invalid parameter number",
        "HYC00" => "Optional feature not implemented",
        "IM001" => "Driver does not support this function",
        _ => "General error",
    }
}
