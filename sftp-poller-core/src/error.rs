//! Error types shared by the supervisor, the sequencer and the polling loop.
//!
//! Every failure that crosses a collaborator boundary is a [`TransferError`]
//! carrying the same four fields, so each catch site can log them uniformly.
//! Conditions that must stop the process are a [`FatalError`].

use std::fmt;

/// Coarse classification of a [`TransferError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// TCP connect, session loss, channel failures.
    Connection,
    /// Username/password rejected.
    Authentication,
    /// Host key did not match the pinned fingerprint.
    HostKey,
    /// Unexpected SFTP status or malformed reply.
    Protocol,
    /// Remote or local permission denied.
    Permission,
    /// Remote path does not exist (vacated between listing and download).
    NotFound,
    /// Local filesystem failure (staging, move into the local directory).
    LocalIo,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Connection => "connection",
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::HostKey => "host_key",
            ErrorCategory::Protocol => "protocol",
            ErrorCategory::Permission => "permission",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::LocalIo => "local_io",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed collaborator call: what went wrong, an implementation-defined
/// code, its category, and the object the operation targeted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (code={code}, category={category}, target={target})")]
pub struct TransferError {
    pub message: String,
    pub code: String,
    pub category: ErrorCategory,
    pub target: String,
}

impl TransferError {
    pub fn new(
        category: ErrorCategory,
        code: impl Into<String>,
        target: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            category,
            target: target.into(),
        }
    }

    /// Wraps a local filesystem error; the code is the io error kind.
    pub fn local_io(target: impl Into<String>, err: &std::io::Error) -> Self {
        let category = match err.kind() {
            std::io::ErrorKind::PermissionDenied => ErrorCategory::Permission,
            _ => ErrorCategory::LocalIo,
        };
        Self::new(category, format!("{:?}", err.kind()), target, err.to_string())
    }
}

/// Conditions that terminate the agent.
#[derive(Debug, thiserror::Error)]
pub enum FatalError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("credential error: {0}")]
    Credential(String),

    #[error("connection retries exhausted after {attempts} attempts: {last_error}")]
    ConnectionRetriesExhausted {
        attempts: u32,
        last_error: TransferError,
    },
}

impl FatalError {
    /// Process exit code for this fatal category.
    pub fn exit_code(&self) -> i32 {
        match self {
            FatalError::Config(_) => 2,
            FatalError::Credential(_) => 3,
            FatalError::ConnectionRetriesExhausted { .. } => 4,
        }
    }
}
