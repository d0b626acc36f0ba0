use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_PORT: u16 = 22;
pub const DEFAULT_POLLING_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_LOG_FILE_SIZE_LIMIT_MB: u64 = 5;
pub const DEFAULT_MAX_LOG_ARCHIVES: usize = 3;
pub const DEFAULT_LOG_FILE: &str = "sftp-poller.log";

/// Where the credential for `credential_name` is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialStoreKind {
    #[default]
    Keyring,
    Env,
}

/// Immutable agent configuration, built once at startup.
#[derive(Debug, Clone, Serialize)]
pub struct PollerConfig {
    pub host_name: String,
    pub port: u16,
    pub remote_directory: String,
    /// Always ends with a path separator.
    pub local_directory: PathBuf,
    pub staging_directory: PathBuf,
    pub credential_name: String,
    pub credential_store: CredentialStoreKind,
    pub fingerprint: String,
    pub polling_interval_secs: u64,
    pub log_file: PathBuf,
    pub log_file_size_limit_mb: u64,
    pub max_log_archives: usize,
    /// Numeric fields that were invalid in the file and fell back to defaults.
    #[serde(skip)]
    pub defaulted_fields: Vec<String>,
}

impl PollerConfig {
    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.polling_interval_secs)
    }

    pub fn log_file_size_limit_bytes(&self) -> u64 {
        self.log_file_size_limit_mb.saturating_mul(1024 * 1024)
    }

    pub fn trace_loaded(&self) {
        info!(
            host = %self.host_name,
            port = self.port,
            remote_directory = %self.remote_directory,
            local_directory = %self.local_directory.display(),
            polling_interval_secs = self.polling_interval_secs,
            log_file_size_limit_mb = self.log_file_size_limit_mb,
            max_log_archives = self.max_log_archives,
            "Loaded Config"
        );
        for field in &self.defaulted_fields {
            warn!(field = %field, "Config field was invalid, default in effect");
        }
        debug!(?self, "Config loaded (full debug)");
    }
}

/// Connection-level retry policy applied by the polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_connection_retries: u32,
    pub connection_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_connection_retries: 5,
            connection_backoff: Duration::from_secs(10),
        }
    }
}

/// Per-file retry policy applied by the transfer sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileRetryPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
    /// Wait between a finished download and the remote existence re-check.
    pub grace_period: Duration,
}

impl Default for FileRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(10),
            grace_period: Duration::from_secs(2),
        }
    }
}
