//! Worker startup.
//!
//! The worker owns the blocking driver and serves exactly one connection.
//! It runs either as a child process speaking NDJSON over stdin/stdout or,
//! for tests and embedding, on a thread of the calling process.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │         caller (tokio tasks)                 │
//! │  Connection / Statement proxies              │
//! │  Session: one request in flight at a time    │
//! └──────────────────────────────────────────────┘
//!                stdin (NDJSON) │ stdout (NDJSON)
//!                               ▼
//! ┌──────────────────────────────────────────────┐
//! │         dbrelay-worker (one per connection)  │
//! │  Dispatcher + HandleTable                    │
//! │  SqliteDriver (rusqlite, blocking)           │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use dbrelay::config::Settings;
//! use dbrelay::worker::ConnectionFactory;
//!
//! let settings = Settings::load()?;
//! let factory = ConnectionFactory::from_settings(&settings);
//! let conn = factory.connect_with(settings.get_connection("main")?).await?;
//! ```

mod error;
mod factory;
mod process;

pub use error::{WorkerError, WorkerResult};
pub use factory::ConnectionFactory;
pub use process::WorkerProcess;
