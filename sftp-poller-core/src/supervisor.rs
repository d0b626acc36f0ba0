//! Lifecycle of the single transfer session.
//!
//! `Closed → Opening → Open`; any error observed while `Open` sends the session
//! back to `Closed` through [`ConnectionSupervisor::invalidate`]. Retrying and
//! giving up are the polling loop's decisions, not the supervisor's.

use tracing::{info, warn};

use crate::contract::{SessionOptions, TransferClient};
use crate::error::TransferError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Opening,
    Open,
}

pub struct ConnectionSupervisor<C> {
    client: C,
    options: SessionOptions,
    state: SessionState,
}

impl<C: TransferClient> ConnectionSupervisor<C> {
    pub fn new(client: C, options: SessionOptions) -> Self {
        Self {
            client,
            options,
            state: SessionState::Closed,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the live session, opening one first if needed.
    ///
    /// A failed open leaves the supervisor `Closed` and is returned as-is.
    pub async fn ensure_open(&mut self) -> Result<&mut C, TransferError> {
        if self.state == SessionState::Open && !self.client.is_open() {
            warn!(host = %self.options.host_name, "[CONN] Session lost, reopening");
            self.state = SessionState::Closed;
        }

        if self.state != SessionState::Open {
            self.state = SessionState::Opening;
            info!(
                host = %self.options.host_name,
                port = self.options.port,
                "[CONN] Opening session"
            );
            match self.client.open(&self.options).await {
                Ok(()) => {
                    self.state = SessionState::Open;
                    info!(host = %self.options.host_name, "[CONN] Connected");
                }
                Err(e) => {
                    self.state = SessionState::Closed;
                    return Err(e);
                }
            }
        }

        Ok(&mut self.client)
    }

    /// Drops the current session after an error so the next
    /// [`ensure_open`](Self::ensure_open) starts over.
    pub async fn invalidate(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        if let Err(e) = self.client.close().await {
            warn!(
                message = %e.message,
                code = %e.code,
                category = %e.category,
                target = %e.target,
                "[CONN] Close after failure did not complete cleanly"
            );
        }
        self.state = SessionState::Closed;
    }

    /// Closes the session if one is open and logs the disconnection.
    pub async fn close(&mut self) {
        if self.state != SessionState::Open {
            return;
        }
        match self.client.close().await {
            Ok(()) => info!(host = %self.options.host_name, "[CONN] Disconnected"),
            Err(e) => warn!(
                message = %e.message,
                code = %e.code,
                category = %e.category,
                target = %e.target,
                "[CONN] Disconnected with error"
            ),
        }
        self.state = SessionState::Closed;
    }
}
