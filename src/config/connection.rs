//! Data source names and environment-based connection configuration.
//!
//! Supports configuration via environment variables:
//! - `DBRELAY_DSN`: Data source name, e.g. `sqlite:/var/lib/app.db`
//! - `DBRELAY_USER`: Username (optional)
//! - `DBRELAY_PASSWORD`: Password (optional)

use std::env;
use std::fmt;

use crate::types::ConnectParams;

/// Error type for connection configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid data source name '{0}': expected driver:parameters")]
    InvalidDsn(String),
}

/// A data source name split into its driver prefix and the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dsn {
    /// Driver name, lowercased.
    pub driver: String,
    /// Everything after the first colon; for SQLite, a path or `:memory:`.
    pub target: String,
}

impl Dsn {
    pub fn parse(dsn: &str) -> Result<Self, ConnectionError> {
        let (driver, target) = dsn
            .split_once(':')
            .filter(|(driver, _)| !driver.is_empty() && driver.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
            .ok_or_else(|| ConnectionError::InvalidDsn(dsn.to_string()))?;

        Ok(Self {
            driver: driver.to_ascii_lowercase(),
            target: target.to_string(),
        })
    }
}

impl fmt::Display for Dsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.driver, self.target)
    }
}

/// Build connection parameters from environment variables.
pub fn params_from_env() -> Result<ConnectParams, ConnectionError> {
    let dsn = env::var("DBRELAY_DSN").map_err(|_| ConnectionError::MissingEnvVar("DBRELAY_DSN".to_string()))?;
    Dsn::parse(&dsn)?;

    let mut params = ConnectParams::new(dsn);
    params.username = env::var("DBRELAY_USER").ok();
    params.password = env::var("DBRELAY_PASSWORD").ok();
    Ok(params)
}
