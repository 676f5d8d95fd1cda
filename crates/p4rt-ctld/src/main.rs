//! P4Runtime controller daemon
//!
//! Main entry point for p4rt-ctld.
//! Claims mastership over one device, installs the pipeline and forwarding
//! rules, then holds the session until interrupted.
//!
//! # NIST 800-53 Rev 5 Control Mappings
//! - AU-3: Content of Audit Records - Structured logging
//! - AU-12: Audit Record Generation - Log daemon lifecycle
//! - CM-6: Configuration Settings - Validated before connecting
//! - SC-8: Transmission Confidentiality - gRPC channel to the device

use clap::Parser;
use p4rt_ctld::{Controller, ControllerArgs, ControllerConfig, P4rtError, Result, RunOutcome};
use p4rt_proto::P4RuntimeClient;
use std::process::ExitCode;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = ControllerArgs::parse();

    // Initialize logging
    // NIST: AU-3, AU-12 - Audit logging setup
    if let Err(e) = init_logging(args.verbose) {
        eprintln!("p4rt-ctld: {}", e);
        return ExitCode::FAILURE;
    }

    info!("p4rt-ctld: Starting P4Runtime controller");

    match run_daemon(&args).await {
        Ok(()) => {
            info!("p4rt-ctld: Exiting normally");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "p4rt-ctld: Exiting with error");
            ExitCode::FAILURE
        }
    }
}

/// Initialize structured logging
///
/// `RUST_LOG` takes precedence; otherwise `info`, or `debug` with `--verbose`.
///
/// # NIST Controls
/// - AU-3: Content of Audit Records - Structured format
fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .compact()
        .try_init()
        .map_err(|e| P4rtError::Config(format!("Failed to set logger: {}", e)))
}

async fn run_daemon(args: &ControllerArgs) -> Result<()> {
    let config = ControllerConfig::from_args(args)?;
    config.validate()?;

    let endpoint = config.endpoint();
    info!(endpoint = %endpoint, "p4rt-ctld: Connecting to device");
    let client = P4RuntimeClient::connect(endpoint.clone())
        .await
        .map_err(|e| P4rtError::Connection(format!("{}: {}", endpoint, e)))?;

    // NIST: AU-12 - Log shutdown events
    let shutdown = setup_signal_handlers();

    let mut controller = Controller::new(client, config);
    match controller.run(shutdown).await? {
        RunOutcome::Shutdown => {
            info!("p4rt-ctld: Shutting down, mastership released");
        }
        RunOutcome::NotPrimary(status) => {
            warn!(code = status.code, message = %status.message, "p4rt-ctld: Not primary, exiting");
        }
        RunOutcome::Demoted(status) => {
            warn!(code = status.code, message = %status.message, "p4rt-ctld: Demoted by device, exiting");
        }
    }
    Ok(())
}

/// Cancels the returned token on SIGINT or SIGTERM.
///
/// # NIST Controls
/// - AU-12: Audit Record Generation - Log shutdown signals
fn setup_signal_handlers() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();

    tokio::spawn(async move {
        wait_for_signal().await;
        info!("p4rt-ctld: Received SIGINT/SIGTERM");
        cancel.cancel();
    });

    token
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal as unix_signal};

    match unix_signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            warn!(error = %e, "p4rt-ctld: SIGTERM handler unavailable");
            let _ = signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = signal::ctrl_c().await;
}
