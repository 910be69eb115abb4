//! The worker as a child process.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

use super::error::{WorkerError, WorkerResult};
use crate::channel::{Channel, ChannelError, StreamChannel};
use crate::config::WorkerSettings;
use crate::protocol::{Request, Response};

/// How long `close` waits for the worker to exit on its own.
const EXIT_GRACE: Duration = Duration::from_secs(5);

/// A spawned `dbrelay-worker` and the NDJSON channel over its stdio.
///
/// The process is killed if this is dropped while it is still running.
pub struct WorkerProcess {
    child: Child,
    channel: StreamChannel<ChildStdout, ChildStdin, Request, Response>,
}

impl WorkerProcess {
    /// Spawn the worker described by `settings`.
    pub fn spawn(settings: &WorkerSettings) -> WorkerResult<Self> {
        let path = settings.worker_path()?;
        Self::spawn_with_args(&path, &settings.to_worker_args())
    }

    /// Spawn the worker binary at `path` with command-line arguments.
    pub fn spawn_with_args(path: &Path, args: &[String]) -> WorkerResult<Self> {
        let mut child = Command::new(path)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(WorkerError::SpawnFailed)?;

        let stdin = child.stdin.take().ok_or(WorkerError::MissingPipe("stdin"))?;
        let stdout = child.stdout.take().ok_or(WorkerError::MissingPipe("stdout"))?;

        info!(pid = child.id(), path = %path.display(), "spawned worker");
        Ok(Self {
            child,
            channel: StreamChannel::new(stdout, stdin),
        })
    }

    /// OS process id, `None` once the process has been reaped.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for the worker to exit, killing it after `grace`.
    pub async fn wait(&mut self, grace: Duration) -> WorkerResult<ExitStatus> {
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(status) => status.map_err(WorkerError::WaitFailed),
            Err(_) => {
                warn!(pid = self.child.id(), "worker did not exit in time, killing it");
                self.child.kill().await.map_err(WorkerError::WaitFailed)?;
                self.child.wait().await.map_err(WorkerError::WaitFailed)
            }
        }
    }
}

#[async_trait]
impl Channel<Request, Response> for WorkerProcess {
    async fn write(&mut self, message: Request) -> Result<(), ChannelError> {
        self.channel.write(message).await
    }

    async fn read(&mut self) -> Result<Option<Response>, ChannelError> {
        self.channel.read().await
    }

    fn is_closed(&self) -> bool {
        self.channel.is_closed()
    }

    /// Close the worker's stdin, then reap it.
    async fn close(&mut self) -> Result<(), ChannelError> {
        let closed = self.channel.close().await;
        match self.wait(EXIT_GRACE).await {
            Ok(status) if status.success() => debug!(%status, "worker exited"),
            Ok(status) => warn!(%status, "worker exited abnormally"),
            Err(err) => warn!(error = %err, "failed to reap worker"),
        }
        closed
    }
}
