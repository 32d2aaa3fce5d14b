//! Client secret storage in the system keychain.
//!
//! - macOS: Keychain Services
//! - Windows: Credential Manager
//! - Linux: Secret Service (GNOME Keyring, KDE Wallet)
//!
//! Secrets are stored under the `tikresearch` service, with the client key
//! as the account name.

use keyring::Entry;
use tracing::{debug, warn};

use crate::error::StoreError;

/// Keychain service name.
pub const SERVICE: &str = "tikresearch";

fn entry(client_key: &str) -> Result<Entry, StoreError> {
    Entry::new(SERVICE, client_key)
        .map_err(|e| StoreError::Keychain(format!("Failed to create keychain entry: {e}")))
}

/// Stores the secret for `client_key`.
///
/// # Errors
///
/// Returns `StoreError::Keychain` if the keychain refuses the write.
pub fn store_client_secret(client_key: &str, secret: &str) -> Result<(), StoreError> {
    if client_key.trim().is_empty() {
        return Err(StoreError::MissingCredential("client key".into()));
    }
    entry(client_key)?
        .set_password(secret)
        .map_err(|e| StoreError::Keychain(format!("Failed to store client secret: {e}")))?;
    debug!(client_key, "Client secret stored in keychain");
    Ok(())
}

/// Looks up the secret for `client_key`. Missing or empty entries and
/// keychain failures all read as `None`.
pub fn get_client_secret(client_key: &str) -> Option<String> {
    let entry = entry(client_key).ok()?;
    match entry.get_password() {
        Ok(secret) if !secret.is_empty() => {
            debug!(client_key, "Client secret retrieved from keychain");
            Some(secret)
        }
        Ok(_) | Err(keyring::Error::NoEntry) => None,
        Err(e) => {
            warn!(client_key, error = %e, "Keychain lookup failed");
            None
        }
    }
}

/// Deletes the secret for `client_key`. Deleting a missing entry succeeds.
///
/// # Errors
///
/// Returns `StoreError::Keychain` if the keychain refuses the deletion.
pub fn delete_client_secret(client_key: &str) -> Result<(), StoreError> {
    match entry(client_key)?.delete_credential() {
        Ok(()) => {
            debug!(client_key, "Client secret deleted from keychain");
            Ok(())
        }
        Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(StoreError::Keychain(format!(
            "Failed to delete client secret: {e}"
        ))),
    }
}
