//! # dbrelay
//!
//! Drive a synchronous, stateful SQL driver from async code by remoting
//! every call to a worker that owns the real, blocking driver.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │        Connection / Statement proxies  [client]          │
//! │  (fetch-mode emulation, error reconstruction)            │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [protocol: Request / Response]
//! ┌─────────────────────────────────────────────────────────┐
//! │          Channel (NDJSON over stdio, or memory)          │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [service]
//! ┌─────────────────────────────────────────────────────────┐
//! │              Dispatcher + HandleTable                    │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [driver]
//! ┌─────────────────────────────────────────────────────────┐
//! │                SqliteDriver (rusqlite)                   │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod channel;
pub mod client;
pub mod config;
pub mod driver;
pub mod error;
pub mod protocol;
pub mod service;
pub mod types;
pub mod value;
pub mod worker;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::client::{Connection, Entity, EntityClass, FetchArgument, FetchModeSpec, Fetched, Statement, StdObject};
    pub use crate::error::{DbError, DbResult};
    pub use crate::types::{Attribute, ConnectParams, CursorOrientation, FetchMode, ParamType, Params};
    pub use crate::value::{Record, Value};
    pub use crate::worker::ConnectionFactory;
}

// Also export at crate root for convenience
pub use client::{Connection, Statement};
pub use error::{DbError, DbResult};
pub use value::Value;
pub use worker::ConnectionFactory;
