use std::fs::write;
use std::path::{Path, MAIN_SEPARATOR};
use std::sync::{Arc, Mutex};

use sftp_poller::load_config::load_config;
use sftp_poller_core::config::CredentialStoreKind;
use sftp_poller_core::error::FatalError;
use tempfile::{tempdir, NamedTempFile, TempDir};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let msg = format!("{:?}", event);
        self.events.lock().unwrap().push(msg);
    }
}

struct Fixture {
    staging: TempDir,
    local: TempDir,
    file: NamedTempFile,
}

/// Writes a complete config plus `extra` YAML lines.
fn fixture(extra: &str) -> Fixture {
    let staging = tempdir().expect("staging dir");
    let local = tempdir().expect("local dir");
    let yaml = format!(
        "HostName: sftp.example.com\n\
         RemoteDirectory: /outbox\n\
         LocalDirectory: {local}\n\
         StagingDirectory: {staging}\n\
         CredentialName: partner-sftp\n\
         Fingerprint: \"SHA256:nThbg6kXUpJWGl7E1IGOCspRomTxdCARLviKw6E5SY8\"\n\
         {extra}",
        local = local.path().display(),
        staging = staging.path().display(),
    );
    let file = NamedTempFile::new().expect("temp config file");
    write(file.path(), yaml).expect("write config");
    Fixture {
        staging,
        local,
        file,
    }
}

fn load_collecting(path: &Path) -> (anyhow::Result<sftp_poller_core::config::PollerConfig>, Vec<String>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let subscriber = Registry::default().with(EventCollector {
        events: events.clone(),
    });
    let result = tracing::subscriber::with_default(subscriber, || load_config(path));
    let collected = events.lock().unwrap().clone();
    (result, collected)
}

#[test]
fn test_load_config_success_with_defaults() {
    let fx = fixture("");
    let config = load_config(fx.file.path()).expect("Config should load");

    assert_eq!(config.host_name, "sftp.example.com");
    assert_eq!(config.port, 22);
    assert_eq!(config.remote_directory, "/outbox");
    assert_eq!(config.staging_directory, fx.staging.path());
    assert_eq!(config.credential_name, "partner-sftp");
    assert_eq!(config.credential_store, CredentialStoreKind::Keyring);
    assert_eq!(config.polling_interval_secs, 30);
    assert_eq!(config.log_file_size_limit_mb, 5);
    assert_eq!(config.max_log_archives, 3);
    assert!(config.defaulted_fields.is_empty());
}

#[test]
fn test_load_config_reads_tuning_fields() {
    let fx = fixture(
        "Port: 2222\nPollingInterval: 5\nLogFileSizeLimitMB: 1\nMaxLogArchives: 7\nCredentialStore: env\nLogFile: agent.log\n",
    );
    let config = load_config(fx.file.path()).expect("Config should load");

    assert_eq!(config.port, 2222);
    assert_eq!(config.polling_interval_secs, 5);
    assert_eq!(config.log_file_size_limit_bytes(), 1024 * 1024);
    assert_eq!(config.max_log_archives, 7);
    assert_eq!(config.credential_store, CredentialStoreKind::Env);
    assert_eq!(config.log_file, Path::new("agent.log"));
}

#[test]
fn test_local_directory_gets_trailing_separator() {
    let fx = fixture("");
    let config = load_config(fx.file.path()).expect("Config should load");

    let local = config.local_directory.to_string_lossy().into_owned();
    assert!(local.ends_with(MAIN_SEPARATOR), "got {local}");
    assert!(local.starts_with(&*fx.local.path().to_string_lossy()));
}

#[test]
fn test_invalid_polling_interval_falls_back_with_warning() {
    for bad in ["0", "-5", "abc"] {
        let fx = fixture(&format!("PollingInterval: {bad}\n"));
        let (result, events) = load_collecting(fx.file.path());
        let config = result.expect("Invalid tuning fields are not fatal");

        assert_eq!(config.polling_interval_secs, 30, "PollingInterval: {bad}");
        assert_eq!(config.defaulted_fields, vec!["PollingInterval".to_string()]);
        assert!(
            events
                .iter()
                .any(|e| e.contains("Invalid config value") && e.contains("PollingInterval")),
            "Expected a warning for PollingInterval: {bad}, got: {events:?}"
        );
    }
}

#[test]
fn test_missing_staging_directory_is_a_config_error() {
    let staging = tempdir().unwrap();
    let gone = staging.path().join("does-not-exist");
    let file = NamedTempFile::new().unwrap();
    write(
        file.path(),
        format!(
            "HostName: h\nRemoteDirectory: /r\nLocalDirectory: ./in\nStagingDirectory: {}\nCredentialName: c\nFingerprint: f\n",
            gone.display()
        ),
    )
    .unwrap();

    let err = load_config(file.path()).unwrap_err();
    let fatal = err.downcast_ref::<FatalError>().expect("typed config error");
    assert_eq!(fatal.exit_code(), 2);
    assert!(err.to_string().contains("StagingDirectory"));
}

#[test]
fn test_missing_required_field_is_named() {
    let file = NamedTempFile::new().unwrap();
    write(file.path(), "HostName: h\nRemoteDirectory: /r\n").unwrap();

    let err = load_config(file.path()).unwrap_err();
    assert!(matches!(err.downcast_ref::<FatalError>(), Some(FatalError::Config(_))));
    assert!(err.to_string().contains("CredentialName"), "got {err}");
}

#[test]
fn test_invalid_yaml_is_a_parse_error() {
    let file = NamedTempFile::new().unwrap();
    write(file.path(), "HostName: [unclosed\n").unwrap();

    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("parse"), "got {err}");
}

#[test]
fn test_unknown_credential_store_is_rejected() {
    let fx = fixture("CredentialStore: vault\n");
    let err = load_config(fx.file.path()).unwrap_err();
    assert!(err.to_string().contains("vault"), "got {err}");
}
