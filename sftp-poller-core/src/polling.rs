//! Top-level driver: poll, transfer, sleep, repeat until shutdown.
//!
//! The loop owns the connection-retry counter. A failed session open and a
//! failed directory listing are both connection-level errors: the session is
//! dropped, the counter goes up, and the loop backs off. When the counter
//! reaches the configured maximum the loop stops with
//! [`FatalError::ConnectionRetriesExhausted`] without trying again. Any cycle
//! that gets through listing and per-file work resets the counter, whatever
//! happened to individual files.

use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{FileRetryPolicy, PollerConfig, RetryPolicy};
use crate::contract::{SessionOptions, TransferClient};
use crate::error::{FatalError, TransferError};
use crate::supervisor::ConnectionSupervisor;
use crate::transfer::TransferSequencer;

/// Outcome of one successful poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Non-directory entries found in the listing.
    pub files_seen: usize,
    pub transferred: usize,
    pub failed: usize,
    /// Files not attempted because the session dropped earlier in the cycle.
    pub skipped: usize,
}

pub struct PollingLoop<C> {
    supervisor: ConnectionSupervisor<C>,
    sequencer: TransferSequencer,
    remote_directory: String,
    local_directory: PathBuf,
    polling_interval: Duration,
    retry: RetryPolicy,
    connection_retries: u32,
}

impl<C: TransferClient> PollingLoop<C> {
    pub fn new(
        supervisor: ConnectionSupervisor<C>,
        sequencer: TransferSequencer,
        remote_directory: impl Into<String>,
        local_directory: impl Into<PathBuf>,
        polling_interval: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            supervisor,
            sequencer,
            remote_directory: remote_directory.into(),
            local_directory: local_directory.into(),
            polling_interval,
            retry,
            connection_retries: 0,
        }
    }

    /// Wires a loop with the default retry policies from a loaded config.
    pub fn from_config(config: &PollerConfig, client: C, options: SessionOptions) -> Self {
        Self::new(
            ConnectionSupervisor::new(client, options),
            TransferSequencer::new(FileRetryPolicy::default(), config.staging_directory.clone()),
            config.remote_directory.clone(),
            config.local_directory.clone(),
            config.polling_interval(),
            RetryPolicy::default(),
        )
    }

    pub fn connection_retries(&self) -> u32 {
        self.connection_retries
    }

    /// Runs until `shutdown` is cancelled, or until connection retries run out.
    pub async fn run(&mut self, shutdown: &CancellationToken) -> Result<(), FatalError> {
        info!(
            remote_directory = %self.remote_directory,
            local_directory = %self.local_directory.display(),
            interval_secs = self.polling_interval.as_secs(),
            "[POLL] Polling started"
        );

        while !shutdown.is_cancelled() {
            let wait = match self.poll_once().await {
                Ok(report) => {
                    if self.connection_retries > 0 {
                        info!(
                            previous_failures = self.connection_retries,
                            "[POLL] Connection recovered, retry counter reset"
                        );
                    }
                    self.connection_retries = 0;
                    info!(
                        files_seen = report.files_seen,
                        transferred = report.transferred,
                        failed = report.failed,
                        skipped = report.skipped,
                        "[POLL] Cycle complete"
                    );
                    self.polling_interval
                }
                Err(e) => {
                    self.supervisor.invalidate().await;
                    self.connection_retries += 1;
                    error!(
                        message = %e.message,
                        code = %e.code,
                        category = %e.category,
                        target = %e.target,
                        retry = self.connection_retries,
                        max_retries = self.retry.max_connection_retries,
                        "[POLL] Connection error"
                    );
                    if self.connection_retries >= self.retry.max_connection_retries {
                        error!(
                            attempts = self.connection_retries,
                            "[POLL] Connection retries exhausted, shutting down"
                        );
                        return Err(FatalError::ConnectionRetriesExhausted {
                            attempts: self.connection_retries,
                            last_error: e,
                        });
                    }
                    self.retry.connection_backoff
                }
            };

            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(wait) => {}
            }
        }

        info!("[POLL] Shutdown requested");
        self.supervisor.close().await;
        Ok(())
    }

    /// One cycle: make sure a session is open, list, transfer every file.
    ///
    /// Only opening and listing errors are returned; per-file failures are
    /// counted in the report.
    pub async fn poll_once(&mut self) -> Result<CycleReport, TransferError> {
        let session = self.supervisor.ensure_open().await?;
        let entries = session.list_directory(&self.remote_directory).await?;

        let files: Vec<&str> = entries
            .iter()
            .filter(|entry| !entry.is_directory)
            .map(|entry| entry.name.as_str())
            .collect();

        let mut report = CycleReport {
            files_seen: files.len(),
            ..CycleReport::default()
        };
        for (index, file_name) in files.iter().enumerate() {
            info!(file = %file_name, "[POLL] Found remote file");
            let done = self
                .sequencer
                .transfer(
                    &mut *session,
                    &self.remote_directory,
                    file_name,
                    &self.local_directory,
                )
                .await;
            if done {
                report.transferred += 1;
                continue;
            }
            report.failed += 1;
            warn!(file = %file_name, "[POLL] File left for the next cycle");

            // A dead session would fail every remaining file the same way.
            // The next cycle's ensure_open reopens it.
            if !session.is_open() {
                report.skipped = files.len() - index - 1;
                warn!(
                    skipped = report.skipped,
                    "[POLL] Session lost mid-cycle, skipping remaining files"
                );
                break;
            }
        }
        Ok(report)
    }
}
