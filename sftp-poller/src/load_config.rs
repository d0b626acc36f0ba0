/// `load_config` module: Loads a YAML config file into the immutable [`PollerConfig`].
///
/// This module is the only place where the user-supplied YAML is parsed and mapped to
/// strongly-typed configuration.
///
/// # Responsibilities
/// - Parse the PascalCase YAML keys (`HostName`, `PollingInterval`, ...) into Rust structs
/// - Reject missing required fields and a missing `StagingDirectory` as fatal configuration errors
/// - Fall back to documented defaults (with a warning) for invalid numeric tuning fields
/// - Normalize `LocalDirectory` to end with a path separator
///
/// # Errors
/// Fatal problems are returned as [`FatalError::Config`] wrapped in `anyhow::Error`, so the
/// CLI boundary can map them to the configuration exit code.
use anyhow::Result;
use serde::Deserialize;
use serde_yaml::Value;
use sftp_poller_core::config::{
    CredentialStoreKind, PollerConfig, DEFAULT_LOG_FILE, DEFAULT_LOG_FILE_SIZE_LIMIT_MB,
    DEFAULT_MAX_LOG_ARCHIVES, DEFAULT_POLLING_INTERVAL_SECS, DEFAULT_PORT,
};
use sftp_poller_core::error::FatalError;
use std::fs;
use std::path::{Path, PathBuf, MAIN_SEPARATOR, MAIN_SEPARATOR_STR};
use tracing::{error, info, warn};

pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawConfig {
    host_name: Option<String>,
    port: Option<Value>,
    remote_directory: Option<String>,
    local_directory: Option<PathBuf>,
    staging_directory: Option<PathBuf>,
    credential_name: Option<String>,
    credential_store: Option<String>,
    fingerprint: Option<String>,
    polling_interval: Option<Value>,
    log_file: Option<PathBuf>,
    #[serde(rename = "LogFileSizeLimitMB")]
    log_file_size_limit_mb: Option<Value>,
    max_log_archives: Option<Value>,
}

fn config_error(msg: impl Into<String>) -> anyhow::Error {
    FatalError::Config(msg.into()).into()
}

/// Loads and validates the config file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PollerConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(config_error(format!(
                "Failed to read config file {:?}: {}",
                path_ref, e
            )));
        }
    };

    let raw: RawConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(config_error(format!("Failed to parse config YAML: {e}")));
        }
    };

    let host_name = required("HostName", raw.host_name)?;
    let remote_directory = required("RemoteDirectory", raw.remote_directory)?;
    let credential_name = required("CredentialName", raw.credential_name)?;
    let fingerprint = required("Fingerprint", raw.fingerprint)?;
    let local_directory = raw
        .local_directory
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| missing("LocalDirectory"))?;
    let staging_directory = raw
        .staging_directory
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| missing("StagingDirectory"))?;

    if !staging_directory.is_dir() {
        error!(path = %staging_directory.display(), "StagingDirectory does not exist");
        return Err(config_error(format!(
            "StagingDirectory {} does not exist",
            staging_directory.display()
        )));
    }

    let credential_store = match raw.credential_store.as_deref().map(str::to_ascii_lowercase) {
        None => CredentialStoreKind::default(),
        Some(kind) if kind == "keyring" => CredentialStoreKind::Keyring,
        Some(kind) if kind == "env" => CredentialStoreKind::Env,
        Some(other) => {
            error!(kind = %other, "Unsupported CredentialStore in config");
            return Err(config_error(format!("Unsupported CredentialStore: {other}")));
        }
    };

    let mut defaulted_fields = Vec::new();
    let port = positive_or_default("Port", raw.port.as_ref(), DEFAULT_PORT as u64, &mut defaulted_fields);
    let port = match u16::try_from(port) {
        Ok(port) => port,
        Err(_) => {
            warn!(field = "Port", value = port, default = DEFAULT_PORT, "Port out of range, using default");
            defaulted_fields.push("Port".to_string());
            DEFAULT_PORT
        }
    };
    let polling_interval_secs = positive_or_default(
        "PollingInterval",
        raw.polling_interval.as_ref(),
        DEFAULT_POLLING_INTERVAL_SECS,
        &mut defaulted_fields,
    );
    let log_file_size_limit_mb = positive_or_default(
        "LogFileSizeLimitMB",
        raw.log_file_size_limit_mb.as_ref(),
        DEFAULT_LOG_FILE_SIZE_LIMIT_MB,
        &mut defaulted_fields,
    );
    let max_log_archives = positive_or_default(
        "MaxLogArchives",
        raw.max_log_archives.as_ref(),
        DEFAULT_MAX_LOG_ARCHIVES as u64,
        &mut defaulted_fields,
    ) as usize;

    let config = PollerConfig {
        host_name,
        port,
        remote_directory,
        local_directory: with_trailing_separator(local_directory),
        staging_directory,
        credential_name,
        credential_store,
        fingerprint,
        polling_interval_secs,
        log_file: raw
            .log_file
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
        log_file_size_limit_mb,
        max_log_archives,
        defaulted_fields,
    };

    info!(
        host = %config.host_name,
        local_directory = %config.local_directory.display(),
        "Config loaded and validated successfully"
    );
    Ok(config)
}

fn missing(field: &str) -> anyhow::Error {
    error!(field, "Required config field missing");
    config_error(format!("Required config field {field} is missing"))
}

fn required(field: &str, value: Option<String>) -> Result<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(missing(field)),
    }
}

/// Missing fields take the default silently; present but invalid ones warn.
fn positive_or_default(
    field: &str,
    value: Option<&Value>,
    default: u64,
    defaulted: &mut Vec<String>,
) -> u64 {
    let Some(value) = value else {
        return default;
    };
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    match parsed.filter(|n| *n > 0) {
        Some(n) => n,
        None => {
            warn!(field, value = ?value, default, "Invalid config value, using default");
            defaulted.push(field.to_string());
            default
        }
    }
}

fn with_trailing_separator(dir: PathBuf) -> PathBuf {
    let text = dir.to_string_lossy();
    if text.ends_with(MAIN_SEPARATOR) || text.ends_with('/') {
        return dir;
    }
    let mut os = dir.into_os_string();
    os.push(MAIN_SEPARATOR_STR);
    PathBuf::from(os)
}
