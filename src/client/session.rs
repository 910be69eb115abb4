//! One request at a time over a client channel.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::runtime::Handle as RuntimeHandle;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::channel::ClientChannel;
use crate::error::{DbError, DbResult, ProtocolError};
use crate::protocol::{ConnectionOp, Request, Response};
use crate::value::FromValue;

/// Owns the caller's end of a channel and serialises calls over it.
///
/// There is no request id on the wire, so a response belongs to the
/// oldest unanswered request. The session keeps that pairing intact when
/// a caller abandons a call:
///
/// * abandoned after the request was written: the session remembers the
///   response is still owed and the next call reads and discards it first;
/// * abandoned while the request was being written: the framing is
///   unknown, so the session is poisoned and every later call fails.
///
/// The connection and each of its statements hold the session. When the
/// last of them is dropped without an explicit close, `disconnect` is sent
/// from a task on the session's runtime.
pub struct Session {
    wire: Mutex<Wire>,
    runtime: RuntimeHandle,
    /// Set once `disconnect` went out or the peer closed the channel.
    closed: AtomicBool,
    /// Set on any fatal error.
    failed: AtomicBool,
}

struct Wire {
    /// Taken when the channel is closed.
    channel: Option<ClientChannel>,
    /// Responses the peer still owes for abandoned calls.
    owed: usize,
    /// A write started but never finished.
    torn: bool,
}

impl Wire {
    fn channel(&mut self) -> Result<&mut ClientChannel, ProtocolError> {
        self.channel.as_mut().ok_or(ProtocolError::SessionClosed)
    }

    async fn send(&mut self, request: Request) -> Result<(), ProtocolError> {
        self.torn = true;
        self.channel()?.write(request).await.map_err(ProtocolError::Channel)?;
        self.torn = false;
        Ok(())
    }

    async fn receive(&mut self, method: &str) -> Result<Response, ProtocolError> {
        match self.channel()?.read().await {
            Ok(Some(response)) => Ok(response),
            Ok(None) => Err(ProtocolError::ClosedMidRequest(method.to_string())),
            Err(err) => Err(ProtocolError::Channel(err)),
        }
    }

    async fn drain(&mut self) -> Result<(), ProtocolError> {
        while self.owed > 0 {
            let stale = self.receive("an abandoned call").await?;
            debug!(kind = stale.kind(), "discarding response to an abandoned call");
            self.owed -= 1;
        }
        Ok(())
    }

    /// Settle owed responses, send `disconnect` and close the channel.
    /// A poisoned or torn wire is closed without a word.
    async fn hang_up(&mut self, poisoned: bool) -> Result<(), ProtocolError> {
        let mut result = Ok(());
        if !poisoned && !self.torn && self.channel.is_some() {
            result = self.drain().await;
            if result.is_ok() {
                result = self.send(ConnectionOp::Disconnect.into_request()).await;
            }
        }
        self.close().await;
        result
    }

    async fn close(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            if let Err(err) = channel.close().await {
                debug!(error = %err, "closing channel");
            }
        }
    }
}

impl Session {
    pub fn new(channel: ClientChannel, runtime: RuntimeHandle) -> Self {
        Self {
            wire: Mutex::new(Wire {
                channel: Some(channel),
                owed: 0,
                torn: false,
            }),
            runtime,
            closed: AtomicBool::new(false),
            failed: AtomicBool::new(false),
        }
    }

    /// Runtime that best-effort cleanup from `Drop` is spawned on.
    pub fn runtime(&self) -> &RuntimeHandle {
        &self.runtime
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// True once a fatal error has been seen.
    pub fn is_poisoned(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    /// Send a request and wait for its response.
    pub async fn call(&self, request: Request) -> DbResult<Response> {
        let method = request.method.clone();
        let mut wire = self.wire.lock().await;
        self.ensure_usable(&wire)?;
        wire.drain().await.map_err(|err| self.lost(err))?;

        debug!(handle = request.handle, method = %method, "call");
        wire.send(request).await.map_err(|err| self.lost(err))?;
        wire.owed += 1;

        let response = wire.receive(&method).await.map_err(|err| self.lost(err))?;
        wire.owed -= 1;
        Ok(response)
    }

    /// Send a request that is never answered.
    pub async fn notify(&self, request: Request) -> DbResult<()> {
        let mut wire = self.wire.lock().await;
        self.ensure_usable(&wire)?;
        wire.drain().await.map_err(|err| self.lost(err))?;

        debug!(handle = request.handle, method = %request.method, "notify");
        wire.send(request).await.map_err(|err| self.lost(err))
    }

    /// Call and decode the `Value` payload.
    ///
    /// An `Error` response becomes a driver or generic error; any other
    /// response shape is fatal.
    pub async fn invoke<T: FromValue>(&self, request: Request) -> DbResult<T> {
        let method = request.method.clone();
        match self.call(request).await? {
            Response::Value { payload } => T::from_value(payload).map_err(|err| self.fail(err)),
            Response::Error(envelope) => Err(envelope.into()),
            other => Err(self.fail(ProtocolError::UnexpectedResponse {
                method,
                got: other.kind(),
            })),
        }
    }

    /// Send `disconnect` unless the session is already closed, then close
    /// the channel. Safe to call more than once.
    pub async fn shutdown(&self) -> DbResult<()> {
        let mut wire = self.wire.lock().await;
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        wire.hang_up(self.is_poisoned()).await.map_err(|err| self.fail(err))
    }

    /// Close the channel without saying goodbye, for sessions that never
    /// got past `connect`.
    pub async fn abandon(&self) {
        let mut wire = self.wire.lock().await;
        self.closed.store(true, Ordering::SeqCst);
        wire.close().await;
    }

    fn ensure_usable(&self, wire: &Wire) -> Result<(), ProtocolError> {
        if self.is_closed() {
            return Err(ProtocolError::SessionClosed);
        }
        if wire.torn || self.is_poisoned() {
            return Err(ProtocolError::Poisoned);
        }
        Ok(())
    }

    /// A send or receive failed: the peer is gone or the framing is lost.
    fn lost(&self, err: ProtocolError) -> DbError {
        if matches!(err, ProtocolError::ClosedMidRequest(_)) {
            self.closed.store(true, Ordering::SeqCst);
        }
        self.fail(err)
    }

    /// Poison the session and turn `err` into the caller's error.
    pub(crate) fn fail(&self, err: ProtocolError) -> DbError {
        if !self.failed.swap(true, Ordering::SeqCst) {
            warn!(error = %err, "session poisoned");
        }
        err.into()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let poisoned = self.is_poisoned();
        let wire = self.wire.get_mut();
        let mut farewell = Wire {
            channel: wire.channel.take(),
            owed: wire.owed,
            torn: wire.torn,
        };
        debug!("last holder dropped without close, disconnecting in the background");
        self.runtime.spawn(async move {
            if let Err(err) = farewell.hang_up(poisoned).await {
                debug!(error = %err, "background disconnect failed");
            }
        });
    }
}
