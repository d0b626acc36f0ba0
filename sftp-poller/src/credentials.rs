//! Credential lookup by name.
//!
//! The OS credential store is the default backend. An environment backend
//! (`<NAME>_USERNAME` / `<NAME>_PASSWORD`, `.env` honoured) exists for
//! containers and tests.

use serde::Deserialize;
use sftp_poller_core::config::CredentialStoreKind;
use sftp_poller_core::contract::Credentials;
use tracing::{error, info};

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("credential '{0}' not found")]
    NotFound(String),

    #[error("credential '{name}' is malformed: {reason}")]
    Malformed { name: String, reason: String },

    #[error("credential store unavailable: {0}")]
    Store(String),
}

pub trait CredentialStore {
    fn lookup(&self, name: &str) -> Result<Credentials, CredentialError>;
}

pub fn store_for(kind: CredentialStoreKind) -> Box<dyn CredentialStore> {
    match kind {
        CredentialStoreKind::Keyring => Box::new(KeyringCredentialStore),
        CredentialStoreKind::Env => Box::new(EnvCredentialStore),
    }
}

/// Secret payload stored in the OS keyring entry.
#[derive(Deserialize)]
struct StoredSecret {
    username: String,
    password: String,
}

/// Reads the entry with service and user both set to the credential name.
/// The secret is JSON: `{"username": "...", "password": "..."}`.
pub struct KeyringCredentialStore;

impl CredentialStore for KeyringCredentialStore {
    fn lookup(&self, name: &str) -> Result<Credentials, CredentialError> {
        let entry = keyring::Entry::new(name, name).map_err(|e| {
            error!(error = %e, credential = name, "Failed to open keyring entry");
            CredentialError::Store(e.to_string())
        })?;

        let secret = match entry.get_password() {
            Ok(secret) => secret,
            Err(keyring::Error::NoEntry) => {
                error!(credential = name, "Credential not found in keyring");
                return Err(CredentialError::NotFound(name.to_string()));
            }
            Err(e) => {
                error!(error = %e, credential = name, "Keyring lookup failed");
                return Err(CredentialError::Store(e.to_string()));
            }
        };

        let stored: StoredSecret =
            serde_json::from_str(&secret).map_err(|e| CredentialError::Malformed {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        info!(credential = name, username = %stored.username, "Credential loaded from keyring");
        Ok(Credentials {
            username: stored.username,
            password: stored.password,
        })
    }
}

pub struct EnvCredentialStore;

impl EnvCredentialStore {
    /// `sftp-prod` → `SFTP_PROD`
    pub fn env_prefix(name: &str) -> String {
        name.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl CredentialStore for EnvCredentialStore {
    fn lookup(&self, name: &str) -> Result<Credentials, CredentialError> {
        dotenvy::dotenv().ok();
        let prefix = Self::env_prefix(name);
        let user_var = format!("{prefix}_USERNAME");
        let pass_var = format!("{prefix}_PASSWORD");

        match (std::env::var(&user_var), std::env::var(&pass_var)) {
            (Ok(username), Ok(password)) if !username.is_empty() => {
                info!(credential = name, username = %username, "Credential loaded from environment");
                Ok(Credentials { username, password })
            }
            _ => {
                error!(credential = name, user_var = %user_var, pass_var = %pass_var, "Credential not found in environment");
                Err(CredentialError::NotFound(name.to_string()))
            }
        }
    }
}
