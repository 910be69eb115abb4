//! Ready-to-use connections backed by a fresh worker.

use std::thread;

use tokio::runtime::{Builder, Handle as RuntimeHandle};
use tracing::{debug, error, warn};

use super::error::{WorkerError, WorkerResult};
use super::process::WorkerProcess;
use crate::channel::{pair, ClientChannel, MemoryChannel};
use crate::client::Connection;
use crate::config::{ConnectionSettings, Settings, WorkerSettings};
use crate::driver::SqliteDriver;
use crate::error::DbResult;
use crate::protocol::{Request, Response};
use crate::service::Dispatcher;
use crate::types::ConnectParams;

#[derive(Debug, Clone)]
enum Backend {
    Process(WorkerSettings),
    InProcess,
}

/// Starts one worker per connection and completes the `connect`
/// handshake.
///
/// A worker that cannot be started fails with [`WorkerError`]; a worker
/// that starts but cannot open the database fails with the driver error.
#[derive(Debug, Clone)]
pub struct ConnectionFactory {
    backend: Backend,
    runtime: Option<RuntimeHandle>,
}

impl ConnectionFactory {
    /// Spawn `dbrelay-worker` processes as described by `settings`.
    pub fn new(settings: WorkerSettings) -> Self {
        Self {
            backend: Backend::Process(settings),
            runtime: None,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.worker.clone())
    }

    /// Run each worker on a dedicated thread of this process instead.
    pub fn in_process() -> Self {
        Self {
            backend: Backend::InProcess,
            runtime: None,
        }
    }

    /// Runtime that connections spawn their background cleanup on. Defaults
    /// to the runtime `connect` is called from.
    pub fn with_runtime(mut self, runtime: RuntimeHandle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub async fn connect(&self, params: ConnectParams) -> DbResult<Connection> {
        let runtime = self.runtime.clone().unwrap_or_else(RuntimeHandle::current);
        let channel: ClientChannel = match &self.backend {
            Backend::Process(settings) => Box::new(WorkerProcess::spawn(settings)?),
            Backend::InProcess => Box::new(spawn_in_process()?),
        };
        Connection::connect(channel, params, runtime).await
    }

    /// Connect using a named `[connections.<name>]` entry.
    pub async fn connect_with(&self, settings: &ConnectionSettings) -> DbResult<Connection> {
        let params = settings.to_params().map_err(WorkerError::Config)?;
        self.connect(params).await
    }
}

/// Serve one session on a new thread with its own current-thread runtime,
/// so the blocking driver never runs on the caller's executor.
fn spawn_in_process() -> WorkerResult<MemoryChannel<Request, Response>> {
    let (client, mut server) = pair::<Request, Response>();

    thread::Builder::new()
        .name("dbrelay-worker".to_string())
        .spawn(move || {
            let runtime = match Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(err) => {
                    error!(error = %err, "failed to start worker runtime");
                    return;
                }
            };

            let mut dispatcher = Dispatcher::new(SqliteDriver::new());
            match runtime.block_on(dispatcher.serve(&mut server)) {
                Ok(()) => debug!("in-process worker finished"),
                Err(err) => warn!(error = %err, "in-process worker stopped"),
            }
        })?;

    Ok(client)
}
