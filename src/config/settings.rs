//! TOML-based configuration for dbrelay.
//!
//! Supports a config file (dbrelay.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [worker]
//! path = "/usr/local/bin/dbrelay-worker"
//! log_filter = "dbrelay=debug"
//!
//! [connections.main]
//! dsn = "sqlite:${DATA_DIR}/main.db"
//!
//! [connections.main.options]
//! timeout = 5
//! case = "lower"
//!
//! [connections.scratch]
//! dsn = "sqlite::memory:"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::types::{Attribute, ConnectParams};
use crate::value::Value;

/// Name of the worker binary.
pub const WORKER_BINARY: &str = "dbrelay-worker";

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Named database connections.
    pub connections: HashMap<String, ConnectionSettings>,

    /// Worker configuration.
    pub worker: WorkerSettings,
}

/// Connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionSettings {
    /// Data source name, `driver:rest` (supports ${ENV_VAR} expansion).
    pub dsn: String,

    #[serde(default)]
    pub username: Option<String>,

    /// Password (supports ${ENV_VAR} expansion).
    #[serde(default)]
    pub password: Option<String>,

    /// Connection attributes applied right after connecting.
    #[serde(default)]
    pub options: BTreeMap<String, OptionValue>,
}

/// A scalar attribute value in the config file.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<OptionValue> for Value {
    fn from(v: OptionValue) -> Self {
        match v {
            OptionValue::Bool(b) => Value::Bool(b),
            OptionValue::Int(i) => Value::Int(i),
            OptionValue::Float(f) => Value::Float(f),
            OptionValue::Text(s) => Value::Text(s),
        }
    }
}

impl ConnectionSettings {
    /// Get the DSN with environment variables expanded.
    pub fn resolved_dsn(&self) -> Result<String, SettingsError> {
        expand_env_vars(&self.dsn)
    }

    /// Build the parameters for a `connect` call.
    pub fn to_params(&self) -> Result<ConnectParams, SettingsError> {
        let mut params = ConnectParams::new(self.resolved_dsn()?);
        params.username = self.username.clone();
        params.password = self.password.as_deref().map(expand_env_vars).transpose()?;

        for (name, value) in &self.options {
            let attribute: Attribute = name.parse().map_err(SettingsError::InvalidConfig)?;
            params.options.push((attribute, value.clone().into()));
        }
        Ok(params)
    }
}

/// Worker configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Path to the worker binary.
    pub path: Option<String>,

    /// Extra command-line arguments for the worker.
    pub args: Vec<String>,

    /// Log filter handed to the worker (`--log-filter`).
    pub log_filter: Option<String>,
}

impl WorkerSettings {
    /// Command-line arguments for the worker process.
    pub fn to_worker_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.args.len() + 2);
        if let Some(filter) = &self.log_filter {
            args.push("--log-filter".to_string());
            args.push(filter.clone());
        }
        args.extend(self.args.iter().cloned());
        args
    }

    /// Get the worker binary path.
    ///
    /// Uses the configured path if any, otherwise looks next to the running
    /// executable and in the current directory, and finally falls back to
    /// the bare binary name so the OS searches `PATH`.
    pub fn worker_path(&self) -> Result<PathBuf, SettingsError> {
        if let Some(path) = &self.path {
            return expand_env_vars(path).map(PathBuf::from);
        }

        let sibling = env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(WORKER_BINARY)));
        let candidates = sibling
            .into_iter()
            .chain([PathBuf::from(".").join(WORKER_BINARY)]);

        for candidate in candidates {
            if candidate.exists() {
                return Ok(candidate);
            }
        }

        Ok(PathBuf::from(WORKER_BINARY))
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `DBRELAY_CONFIG`
    /// 2. `./dbrelay.toml`
    /// 3. `~/.config/dbrelay/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("DBRELAY_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("dbrelay.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("dbrelay").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// Get a connection by name.
    pub fn get_connection(&self, name: &str) -> Result<&ConnectionSettings, SettingsError> {
        self.connections
            .get(name)
            .ok_or_else(|| SettingsError::ConnectionNotFound(name.to_string()))
    }

    /// Get the default connection ("default" if it exists, else any).
    pub fn default_connection(&self) -> Option<(&str, &ConnectionSettings)> {
        if let Some(conn) = self.connections.get("default") {
            return Some(("default", conn));
        }
        self.connections.iter().next().map(|(k, v)| (k.as_str(), v))
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name: String = if chars.next_if_eq(&'{').is_some() {
            chars.by_ref().take_while(|&ch| ch != '}').collect()
        } else {
            let mut name = String::new();
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                name.push(ch);
            }
            if name.is_empty() {
                // Just a lone $, keep it
                result.push('$');
                continue;
            }
            name
        };

        let value = env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
