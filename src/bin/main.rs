//! dbrelay-worker - serve one database connection over stdin/stdout
//!
//! Usage:
//!   dbrelay-worker [--log-filter <filter>]
//!
//! Requests arrive as NDJSON on stdin and responses leave as NDJSON on
//! stdout, so logs go to stderr. The filter comes from `--log-filter`, else
//! `DBRELAY_LOG`, else `info`.
//!
//! Exits 0 after a clean `disconnect`, 1 otherwise.

use clap::Parser;
use dbrelay::channel::StreamChannel;
use dbrelay::driver::SqliteDriver;
use dbrelay::protocol::{Request, Response};
use dbrelay::service::Dispatcher;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dbrelay-worker")]
#[command(about = "dbrelay worker - owns a blocking SQLite connection and serves it over stdio")]
#[command(version)]
struct Cli {
    /// Log filter directive, e.g. `debug` or `dbrelay=trace`
    #[arg(long)]
    log_filter: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_filter.as_deref());

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to start runtime");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(serve())
}

async fn serve() -> ExitCode {
    let mut channel: StreamChannel<_, _, Response, Request> =
        StreamChannel::new(tokio::io::stdin(), tokio::io::stdout());
    let mut dispatcher = Dispatcher::new(SqliteDriver::new());

    info!(pid = std::process::id(), "worker ready");
    match dispatcher.serve(&mut channel).await {
        Ok(()) => {
            info!("session ended");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "session aborted");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(filter: Option<&str>) {
    let filter = match filter {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_env("DBRELAY_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
