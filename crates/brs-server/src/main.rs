//! `brs-server`: websocket front for the battle results stream

mod cli;
mod host;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use brs_core::{
    Codec, ResultFetcher, ResultLog, ResultStreamService, SingleFlight, WebSocketServer,
};
use clap::Parser;
use tokio::io::BufReader;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::host::{StagedUpstream, run_host_bridge};

const HOST_EVENT_BUFFER: usize = 256;

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "Failed to listen for Ctrl-C");
        return;
    }
    info!("Shutdown requested");
}

async fn run(cli: Cli) -> brs_core::Result<()> {
    let config = cli.load_config()?;
    info!(bind = %config.bind, flavor = %config.default_flavor, "Starting brs-server");

    let codec = Codec::new(config.default_flavor);
    let log = Arc::new(ResultLog::with_system_clock(codec.clone()));
    let service = Arc::new(
        ResultStreamService::new(Arc::clone(&log), codec)
            .with_command_announcement(config.announce_commands),
    );

    let upstream = StagedUpstream::default();
    let flight = Arc::new(SingleFlight::new(upstream.clone()));
    let (events, events_rx) = mpsc::channel(HOST_EVENT_BUFFER);
    let fetcher = tokio::spawn(ResultFetcher::new(flight, Arc::clone(&log)).run(events_rx));
    let bridge = tokio::spawn(run_host_bridge(
        BufReader::new(tokio::io::stdin()),
        upstream,
        events,
    ));

    let listener = TcpListener::bind(config.bind).await?;
    let served = WebSocketServer::new(service, &config)?
        .serve(listener, shutdown_signal())
        .await;

    bridge.abort();
    if let Err(err) = fetcher.await {
        error!(error = %err, "Result fetcher task failed");
    }
    info!(records = log.len(), "brs-server stopped");
    served
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(error = %err, "Failed to start runtime");
            return ExitCode::FAILURE;
        }
    };

    let outcome = runtime.block_on(run(cli));
    // stdin reads park a blocking thread that never sees EOF on Ctrl-C
    runtime.shutdown_timeout(Duration::from_millis(500));

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "brs-server failed");
            ExitCode::FAILURE
        }
    }
}
