//! Per-file download → grace wait → existence re-check → remote delete.
//!
//! One [`TransferSequencer::transfer`] call owns its attempt counter. A failure
//! anywhere in the sequence (download, move into the local directory,
//! re-listing, delete) consumes one attempt. After the last attempt fails the
//! file is left on the remote side, where the next poll cycle finds it again.
//! Names that are not a single path component are refused without an attempt.

use std::path::{Component, Path, PathBuf};

use tracing::{error, info, warn};

use crate::config::FileRetryPolicy;
use crate::contract::{remote_path, TransferClient};
use crate::error::{ErrorCategory, TransferError};

/// How a successful sequence ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The file was still present after the grace period and was deleted.
    Deleted,
    /// Another actor removed the file before the re-check.
    AlreadyRemoved,
}

pub struct TransferSequencer {
    policy: FileRetryPolicy,
    staging_dir: PathBuf,
}

impl TransferSequencer {
    /// Downloads land in `staging_dir` and are moved into the local directory
    /// once complete.
    pub fn new(policy: FileRetryPolicy, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            policy,
            staging_dir: staging_dir.into(),
        }
    }

    /// Returns `true` once the file is downloaded and gone from the remote
    /// side, `false` after every attempt failed.
    pub async fn transfer<C>(
        &self,
        session: &mut C,
        remote_dir: &str,
        file_name: &str,
        local_dir: &Path,
    ) -> bool
    where
        C: TransferClient + ?Sized,
    {
        let remote = remote_path(remote_dir, file_name);
        if let Err(e) = check_file_name(file_name) {
            error!(
                message = %e.message,
                code = %e.code,
                category = %e.category,
                target = %e.target,
                "[XFER] Refusing remote file name"
            );
            return false;
        }
        let mut attempt = 0;

        while attempt < self.policy.max_attempts {
            attempt += 1;
            match self
                .attempt(session, remote_dir, file_name, &remote, local_dir)
                .await
            {
                Ok(completion) => {
                    info!(remote = %remote, attempt, ?completion, "[XFER] Transfer complete");
                    return true;
                }
                Err(e) => {
                    warn!(
                        message = %e.message,
                        code = %e.code,
                        category = %e.category,
                        target = %e.target,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        "[XFER] Attempt failed"
                    );
                    if attempt < self.policy.max_attempts {
                        tokio::time::sleep(self.policy.retry_delay).await;
                    }
                }
            }
        }

        error!(
            remote = %remote,
            attempts = attempt,
            "[XFER] Giving up on file for this cycle; it stays on the server"
        );
        false
    }

    async fn attempt<C>(
        &self,
        session: &mut C,
        remote_dir: &str,
        file_name: &str,
        remote: &str,
        local_dir: &Path,
    ) -> Result<Completion, TransferError>
    where
        C: TransferClient + ?Sized,
    {
        let staged = self.staging_dir.join(file_name);
        let destination = local_dir.join(file_name);

        session.get_file(remote, &staged).await?;
        move_into_place(&staged, &destination).await?;
        info!(remote = %remote, local = %destination.display(), "[XFER] Downloaded");

        tokio::time::sleep(self.policy.grace_period).await;

        let listing = session.list_directory(remote_dir).await?;
        let still_present = listing
            .iter()
            .any(|entry| !entry.is_directory && entry.name == file_name);

        if still_present {
            session.remove_file(remote).await?;
            info!(remote = %remote, "[XFER] Deleted from server");
            Ok(Completion::Deleted)
        } else {
            info!(remote = %remote, "[XFER] Already removed from server, nothing to delete");
            Ok(Completion::AlreadyRemoved)
        }
    }
}

/// A remote name must be one plain path component, so joining it onto the
/// staging and local directories cannot leave them.
pub fn check_file_name(file_name: &str) -> Result<(), TransferError> {
    let mut components = Path::new(file_name).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if single_normal && !file_name.contains(['/', '\\']) {
        Ok(())
    } else {
        Err(TransferError::new(
            ErrorCategory::Protocol,
            "UnsafeFileName",
            file_name,
            "remote file name is not a single path component",
        ))
    }
}

/// Renames `from` to `to`, falling back to copy + remove across filesystems.
async fn move_into_place(from: &Path, to: &Path) -> Result<(), TransferError> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    let target = to.display().to_string();
    tokio::fs::copy(from, to)
        .await
        .map_err(|e| TransferError::local_io(target.clone(), &e))?;
    tokio::fs::remove_file(from)
        .await
        .map_err(|e| TransferError::local_io(from.display().to_string(), &e))?;
    Ok(())
}
