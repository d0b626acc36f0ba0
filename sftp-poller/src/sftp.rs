#![doc = "SFTP implementation of the core `TransferClient` contract, built on russh and russh-sftp."]
//
//! # SFTP client (CLI <-> Core)
//!
//! [`SftpTransferClient`] wires the [`TransferClient`] trait from `sftp-poller-core` to a
//! real SSH session:
//!
//! - the server host key is checked against the pinned fingerprint during the handshake,
//!   and a mismatch aborts `open`;
//! - authentication is username/password;
//! - every russh / russh-sftp failure is mapped to a [`TransferError`] with a category the
//!   polling loop and the sequencer can log uniformly.

use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::keys::{HashAlg, PublicKey};
use russh::Disconnect;
use russh_sftp::client::error::Error as SftpError;
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::StatusCode;
use sftp_poller_core::contract::{RemoteFileEntry, SessionOptions, TransferClient};
use sftp_poller_core::error::{ErrorCategory, TransferError};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(120);

/// russh handler that only accepts the pinned host key.
struct PinnedHostKey {
    expected: String,
}

impl client::Handler for PinnedHostKey {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let actual = server_public_key.fingerprint(HashAlg::Sha256).to_string();
        let matches = fingerprint_matches(&self.expected, &actual);
        if matches {
            debug!(fingerprint = %actual, "[CONN] Host key matches pinned fingerprint");
        } else {
            warn!(
                expected = %self.expected,
                actual = %actual,
                "[CONN] Host key fingerprint mismatch"
            );
        }
        Ok(matches)
    }
}

/// Compares a configured fingerprint with the server's `SHA256:<base64>` one.
///
/// The configured value may carry a key-type prefix (`ssh-ed25519 255 ...`), the
/// `SHA256:` tag, and base64 padding; all of those are ignored.
pub fn fingerprint_matches(expected: &str, actual: &str) -> bool {
    fn normalize(value: &str) -> &str {
        let last = value.split_whitespace().last().unwrap_or("");
        last.strip_prefix("SHA256:")
            .unwrap_or(last)
            .trim_end_matches('=')
    }
    let expected = normalize(expected);
    !expected.is_empty() && expected == normalize(actual)
}

struct LiveSession {
    handle: Handle<PinnedHostKey>,
    sftp: SftpSession,
}

/// A [`TransferClient`] holding at most one SSH connection with one SFTP channel.
#[derive(Default)]
pub struct SftpTransferClient {
    session: Option<LiveSession>,
}

impl SftpTransferClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn sftp(&self, target: &str) -> Result<&SftpSession, TransferError> {
        self.session.as_ref().map(|s| &s.sftp).ok_or_else(|| {
            TransferError::new(
                ErrorCategory::Connection,
                "NotConnected",
                target,
                "no open SFTP session",
            )
        })
    }
}

#[async_trait]
impl TransferClient for SftpTransferClient {
    async fn open(&mut self, options: &SessionOptions) -> Result<(), TransferError> {
        if let Some(old) = self.session.take() {
            let _ = old.sftp.close().await;
        }
        let target = format!("{}:{}", options.host_name, options.port);

        let config = Arc::new(client::Config {
            inactivity_timeout: Some(INACTIVITY_TIMEOUT),
            ..Default::default()
        });
        let handler = PinnedHostKey {
            expected: options.fingerprint.clone(),
        };

        let mut handle = client::connect(config, (options.host_name.as_str(), options.port), handler)
            .await
            .map_err(|e| ssh_error(&target, e))?;

        let auth = handle
            .authenticate_password(
                options.credentials.username.clone(),
                options.credentials.password.clone(),
            )
            .await
            .map_err(|e| ssh_error(&target, e))?;
        if !auth.success() {
            return Err(TransferError::new(
                ErrorCategory::Authentication,
                "AuthenticationFailed",
                &target,
                format!(
                    "password authentication rejected for user {}",
                    options.credentials.username
                ),
            ));
        }

        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| ssh_error(&target, e))?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| ssh_error(&target, e))?;
        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| sftp_error(&target, e))?;

        self.session = Some(LiveSession { handle, sftp });
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.session
            .as_ref()
            .map(|s| !s.handle.is_closed())
            .unwrap_or(false)
    }

    async fn list_directory(&mut self, path: &str) -> Result<Vec<RemoteFileEntry>, TransferError> {
        let sftp = self.sftp(path)?;
        let entries = sftp.read_dir(path).await.map_err(|e| sftp_error(path, e))?;
        Ok(entries
            .map(|entry| {
                let name = entry.file_name();
                let is_directory = entry.file_type().is_dir() || name == "." || name == "..";
                RemoteFileEntry { name, is_directory }
            })
            .collect())
    }

    async fn get_file(&mut self, remote_path: &str, local_path: &Path) -> Result<(), TransferError> {
        let sftp = self.sftp(remote_path)?;
        let mut remote = sftp
            .open(remote_path)
            .await
            .map_err(|e| sftp_error(remote_path, e))?;

        let local_target = local_path.display().to_string();
        let mut local = tokio::fs::File::create(local_path)
            .await
            .map_err(|e| TransferError::local_io(&local_target, &e))?;

        let bytes = tokio::io::copy(&mut remote, &mut local)
            .await
            .map_err(|e| {
                TransferError::new(
                    ErrorCategory::Connection,
                    format!("{:?}", e.kind()),
                    remote_path,
                    format!("copy interrupted: {e}"),
                )
            })?;
        local
            .flush()
            .await
            .map_err(|e| TransferError::local_io(&local_target, &e))?;
        local
            .sync_all()
            .await
            .map_err(|e| TransferError::local_io(&local_target, &e))?;

        debug!(remote = remote_path, bytes, "[XFER] Copied remote file");
        Ok(())
    }

    async fn remove_file(&mut self, remote_path: &str) -> Result<(), TransferError> {
        self.sftp(remote_path)?
            .remove_file(remote_path)
            .await
            .map_err(|e| sftp_error(remote_path, e))
    }

    async fn close(&mut self) -> Result<(), TransferError> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        if let Err(e) = session.sftp.close().await {
            debug!(error = ?e, "[CONN] SFTP channel close failed");
        }
        session
            .handle
            .disconnect(Disconnect::ByApplication, "shutting down", "en")
            .await
            .map_err(|e| ssh_error("session", e))
    }
}

/// First token of a Debug rendering: the enum variant name.
fn variant_name(value: &dyn Debug) -> String {
    let rendered = format!("{value:?}");
    rendered
        .split(|c: char| c == '(' || c == ' ' || c == '{')
        .next()
        .unwrap_or("Unknown")
        .to_string()
}

fn ssh_error(target: &str, e: russh::Error) -> TransferError {
    let category = match &e {
        russh::Error::UnknownKey | russh::Error::WrongServerSig => ErrorCategory::HostKey,
        russh::Error::NotAuthenticated => ErrorCategory::Authentication,
        _ => ErrorCategory::Connection,
    };
    TransferError::new(category, variant_name(&e), target, e.to_string())
}

fn sftp_error(target: &str, e: SftpError) -> TransferError {
    match &e {
        SftpError::Status(status) => {
            let category = match status.status_code {
                StatusCode::NoSuchFile => ErrorCategory::NotFound,
                StatusCode::PermissionDenied => ErrorCategory::Permission,
                StatusCode::NoConnection | StatusCode::ConnectionLost => ErrorCategory::Connection,
                _ => ErrorCategory::Protocol,
            };
            TransferError::new(
                category,
                variant_name(&status.status_code),
                target,
                status.error_message.clone(),
            )
        }
        SftpError::Timeout => {
            TransferError::new(ErrorCategory::Connection, "Timeout", target, e.to_string())
        }
        _ => TransferError::new(ErrorCategory::Protocol, variant_name(&e), target, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACTUAL: &str = "SHA256:nThbg6kXUpJWGl7E1IGOCspRomTxdCARLviKw6E5SY8";

    #[test]
    fn fingerprint_accepts_plain_and_prefixed_forms() {
        assert!(fingerprint_matches(ACTUAL, ACTUAL));
        assert!(fingerprint_matches(
            "nThbg6kXUpJWGl7E1IGOCspRomTxdCARLviKw6E5SY8=",
            ACTUAL
        ));
        assert!(fingerprint_matches(
            "ssh-ed25519 255 nThbg6kXUpJWGl7E1IGOCspRomTxdCARLviKw6E5SY8",
            ACTUAL
        ));
        assert!(fingerprint_matches(
            "ssh-ed25519 255 SHA256:nThbg6kXUpJWGl7E1IGOCspRomTxdCARLviKw6E5SY8",
            ACTUAL
        ));
    }

    #[test]
    fn fingerprint_rejects_mismatch_and_empty() {
        assert!(!fingerprint_matches(
            "SHA256:AAAAg6kXUpJWGl7E1IGOCspRomTxdCARLviKw6E5SY8",
            ACTUAL
        ));
        assert!(!fingerprint_matches("", ACTUAL));
        assert!(!fingerprint_matches("   ", ACTUAL));
    }

    #[test]
    fn variant_name_takes_first_token() {
        assert_eq!(variant_name(&StatusCode::NoSuchFile), "NoSuchFile");
        assert_eq!(variant_name(&Some(3)), "Some");
    }

    #[test]
    fn ssh_unknown_key_is_a_host_key_error() {
        let err = ssh_error("sftp.example.com:22", russh::Error::UnknownKey);
        assert_eq!(err.category, ErrorCategory::HostKey);
        assert_eq!(err.code, "UnknownKey");
        assert_eq!(err.target, "sftp.example.com:22");
    }

    #[tokio::test]
    async fn operations_without_session_fail_as_connection_errors() {
        let mut client = SftpTransferClient::new();
        assert!(!client.is_open());
        let err = client.list_directory("/outbox").await.unwrap_err();
        assert_eq!(err.category, ErrorCategory::Connection);
        assert_eq!(err.code, "NotConnected");
        client.close().await.expect("closing a closed client is fine");
    }
}
