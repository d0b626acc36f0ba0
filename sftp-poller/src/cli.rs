/// # sftp-poller CLI Interface (Module)
///
/// Command parsing, startup wiring and exit-code mapping for the `sftp-poller` binary.
///
/// All polling, transfer and rotation logic lives in the [`sftp-poller-core`] crate. This
/// module only turns a config file into a running [`PollingLoop`]:
///
/// 1. load and validate the config (exit code 2 on failure);
/// 2. attach the rotating log file;
/// 3. look up the credential (exit code 3 when missing);
/// 4. run the loop with an SFTP client until Ctrl+C / SIGTERM, or until connection
///    retries run out (exit code 4).
///
/// For integration tests, call [`run`] with a constructed [`Cli`] and `None` for the log
/// handle; events then only reach whatever subscriber the test installed.
///
/// [`sftp-poller-core`]: ../../sftp-poller-core/
use crate::credentials::store_for;
use crate::load_config::{load_config, DEFAULT_CONFIG_FILE};
use crate::logging::{attach_log_file, FileLayerHandle};
use crate::sftp::SftpTransferClient;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sftp_poller_core::contract::SessionOptions;
use sftp_poller_core::error::FatalError;
use sftp_poller_core::polling::PollingLoop;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// CLI for sftp-poller: move files from a remote SFTP directory into a local one.
#[derive(Parser)]
#[command(
    name = "sftp-poller",
    version,
    about = "Poll a remote SFTP directory and move every file into a local directory"
)]
pub struct Cli {
    /// Path to the YAML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the polling agent until interrupted (default)
    Run,
    /// Validate the config file and print the effective configuration
    CheckConfig,
}

/// Async CLI entrypoint for integration tests and main()
pub async fn run(cli: Cli, logs: Option<&FileLayerHandle>) -> Result<()> {
    tracing::info!("trace_initialised");

    let config_path = cli
        .config
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    match cli.command.unwrap_or(Commands::Run) {
        Commands::CheckConfig => check_config(&config_path),
        Commands::Run => run_agent(&config_path, logs).await,
    }
}

fn check_config(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    config.trace_loaded();
    let rendered = serde_yaml::to_string(&config).context("Failed to render configuration")?;
    print!("{rendered}");
    Ok(())
}

async fn run_agent(config_path: &Path, logs: Option<&FileLayerHandle>) -> Result<()> {
    let config = load_config(config_path)?;
    if let Some(handle) = logs {
        attach_log_file(handle, &config)?;
    }
    config.trace_loaded();

    if let Err(e) = std::fs::create_dir_all(&config.local_directory) {
        tracing::error!(
            error = %e,
            path = %config.local_directory.display(),
            "Failed to create LocalDirectory"
        );
        return Err(FatalError::Config(format!(
            "LocalDirectory {} cannot be created: {e}",
            config.local_directory.display()
        ))
        .into());
    }

    let credentials = store_for(config.credential_store)
        .lookup(&config.credential_name)
        .map_err(|e| FatalError::Credential(e.to_string()))?;

    let options = SessionOptions {
        host_name: config.host_name.clone(),
        port: config.port,
        credentials,
        fingerprint: config.fingerprint.clone(),
    };

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    tracing::info!(command = "run", host = %config.host_name, "Starting polling agent");
    let mut poller = PollingLoop::from_config(&config, SftpTransferClient::new(), options);
    poller.run(&shutdown).await?;
    tracing::info!(command = "run", "Polling agent stopped");
    Ok(())
}

/// Cancels `shutdown` on Ctrl+C, or SIGTERM on Unix.
async fn cancel_on_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable, listening for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}

/// Process exit code for the outcome of [`run`].
pub fn exit_code(result: &Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => e
            .downcast_ref::<FatalError>()
            .map(FatalError::exit_code)
            .unwrap_or(1),
    }
}
