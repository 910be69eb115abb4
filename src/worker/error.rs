//! Worker startup error types.

use std::io;

use thiserror::Error;

use crate::config::SettingsError;

/// Result type for worker operations.
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors that can occur while starting a worker.
///
/// These are all failures to get a worker running at all. Anything the
/// worker reports once it is up arrives as a driver or generic error.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Failed to spawn the worker process or thread.
    #[error("failed to spawn worker: {0}")]
    SpawnFailed(#[source] io::Error),

    /// The worker started without the pipes the protocol runs over.
    #[error("worker {0} was not captured")]
    MissingPipe(&'static str),

    /// Worker settings could not be resolved.
    #[error(transparent)]
    Config(#[from] SettingsError),

    /// Failed to wait for the worker to exit.
    #[error("failed to wait for worker exit: {0}")]
    WaitFailed(#[source] io::Error),
}

impl WorkerError {
    /// Check if the worker never started.
    pub fn is_spawn_failure(&self) -> bool {
        matches!(self, Self::SpawnFailed(_) | Self::MissingPipe(_))
    }
}

impl From<io::Error> for WorkerError {
    fn from(err: io::Error) -> Self {
        Self::SpawnFailed(err)
    }
}
