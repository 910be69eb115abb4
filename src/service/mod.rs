//! Worker side of the protocol.
//!
//! The [`Dispatcher`] reads one request at a time, resolves its handle in
//! the [`HandleTable`], runs the named operation on the driver and writes
//! back exactly one response, except for the `release` and `disconnect`
//! notifications which are never answered. It stops once the connection
//! handle has been evicted.

mod dispatcher;
mod handle_table;

pub use dispatcher::{error_response, Dispatcher, ServiceError};
pub use handle_table::HandleTable;
