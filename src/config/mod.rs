//! Configuration module for dbrelay.
//!
//! Handles data source names, environment variables, and settings.

mod connection;
mod settings;

pub use connection::{params_from_env, ConnectionError, Dsn};
pub use settings::{
    expand_env_vars, ConnectionSettings, OptionValue, Settings, SettingsError, WorkerSettings, WORKER_BINARY,
};
