//! # contract: the transfer-protocol seam
//!
//! The resilience core never talks SSH directly. It drives a [`TransferClient`],
//! a narrow session-oriented interface implemented by the real SFTP client in
//! the `sftp-poller` crate and by `mockall` mocks in tests.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall`; with the default `test-export-mocks`
//!   feature, `MockTransferClient` is exported for integration tests.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::error::TransferError;

/// Username/password pair returned by a credential store.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything needed to open an authenticated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub host_name: String,
    pub port: u16,
    pub credentials: Credentials,
    /// Expected host-key fingerprint; a mismatch must fail `open`.
    pub fingerprint: String,
}

/// One entry of a remote directory listing. Lives for a single poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFileEntry {
    pub name: String,
    pub is_directory: bool,
}

impl RemoteFileEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_directory: false,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_directory: true,
        }
    }
}

/// Session-oriented SFTP operations.
///
/// Implementations own at most one underlying session. All methods take
/// `&mut self`: the supervisor is the only owner and lends the session to the
/// sequencer one file at a time.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait TransferClient: Send {
    /// Connect, verify the host key against `options.fingerprint` and authenticate.
    async fn open(&mut self, options: &SessionOptions) -> Result<(), TransferError>;

    /// Whether the underlying session is still usable.
    fn is_open(&self) -> bool;

    /// List `path`. Entries `.` and `..` may be included and are reported as directories.
    async fn list_directory(&mut self, path: &str) -> Result<Vec<RemoteFileEntry>, TransferError>;

    /// Copy `remote_path` to the local file `local_path`, overwriting it.
    async fn get_file(&mut self, remote_path: &str, local_path: &Path)
        -> Result<(), TransferError>;

    async fn remove_file(&mut self, remote_path: &str) -> Result<(), TransferError>;

    async fn close(&mut self) -> Result<(), TransferError>;
}

/// Joins a remote directory and an entry name with exactly one `/`.
pub fn remote_path(remote_dir: &str, file_name: &str) -> String {
    if remote_dir.is_empty() {
        return file_name.to_string();
    }
    format!("{}/{}", remote_dir.trim_end_matches('/'), file_name)
}
