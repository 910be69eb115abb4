//! Caller side of the protocol.
//!
//! [`Connection`] and [`Statement`] mirror a synchronous database API, but
//! every method is an `async` round trip to the worker that owns the real
//! driver. Fetch modes that need caller-side types (`Class`, `Into`) are
//! rebuilt here on top of a remote associative fetch.
//!
//! ```ignore
//! use dbrelay::client::{FetchModeSpec, Fetched};
//! use dbrelay::types::{ConnectParams, FetchMode};
//! use dbrelay::worker::ConnectionFactory;
//!
//! let conn = ConnectionFactory::in_process()
//!     .connect(ConnectParams::new("sqlite::memory:"))
//!     .await?;
//! conn.exec("CREATE TABLE t(id INTEGER PRIMARY KEY, name TEXT)").await?;
//!
//! let stmt = conn
//!     .query("SELECT * FROM t", Some(FetchModeSpec::new(FetchMode::Num)))
//!     .await?
//!     .expect("a statement");
//! let rows = stmt.fetch_all(None, None, None).await?;
//! stmt.close().await?;
//! conn.close().await?;
//! ```

mod connection;
mod entity;
mod fetch;
mod session;
mod statement;

pub use connection::Connection;
pub use entity::{shared, AsAny, Entity, EntityClass, SharedEntity, StdObject};
pub use fetch::{FetchArgument, FetchModeSpec, FetchState, Fetched};
pub use session::Session;
pub use statement::Statement;
