//! Ordered, reliable, duplex message transport between two peers.
//!
//! The protocol only needs four things from a transport: send one message,
//! receive one message, tell whether it is closed, and close it. Framing is
//! the transport's business.
//!
//! Two transports ship with the crate:
//!
//! * [`StreamChannel`] - NDJSON over any tokio reader/writer pair; this is
//!   what runs over a worker's stdin/stdout.
//! * [`MemoryChannel`] - an in-process pair of unbounded queues.

mod memory;
mod stream;

use std::io;

use async_trait::async_trait;
use thiserror::Error;

use crate::protocol::{Request, Response};

pub use memory::{pair, MemoryChannel};
pub use stream::{StreamChannel, MAX_LINE_SIZE};

/// Errors raised by a transport.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Failed to write a message.
    #[error("failed to write message: {0}")]
    WriteFailed(#[source] io::Error),

    /// Failed to read a message.
    #[error("failed to read message: {0}")]
    ReadFailed(#[source] io::Error),

    /// Failed to serialize an outgoing message.
    #[error("failed to serialize message: {0}")]
    SerializeFailed(#[source] serde_json::Error),

    /// An incoming message could not be decoded.
    #[error("failed to deserialize message: {0}")]
    DeserializeFailed(#[source] serde_json::Error),

    /// An incoming line exceeded [`MAX_LINE_SIZE`].
    #[error("message exceeds {0} bytes")]
    TooLarge(usize),

    /// The channel was closed by either side.
    #[error("channel is closed")]
    Closed,
}

/// A duplex message channel sending `Out` and receiving `In`.
#[async_trait]
pub trait Channel<Out, In>: Send
where
    Out: Send + 'static,
    In: Send + 'static,
{
    /// Send one message; returns once it has been handed to the transport
    /// in full.
    async fn write(&mut self, message: Out) -> Result<(), ChannelError>;

    /// Receive one message; `Ok(None)` means the peer closed the channel.
    async fn read(&mut self) -> Result<Option<In>, ChannelError>;

    fn is_closed(&self) -> bool;

    async fn close(&mut self) -> Result<(), ChannelError>;
}

/// The caller's end of a session.
pub type ClientChannel = Box<dyn Channel<Request, Response>>;

/// The worker's end of a session.
pub type ServiceChannel = Box<dyn Channel<Response, Request>>;
