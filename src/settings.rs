//! Credential settings: where the Gemini API key lives between runs.
//!
//! - OS keychain via the keyring crate (production)
//! - in-memory store (tests)
//! - `GEMINI_API_KEY` in the environment wins over anything stored

use crate::error::SessionError;
use std::sync::{Mutex, PoisonError};

/// Keychain service name.
pub const SERVICE: &str = "healthiswealth";
/// Key under which the credential is stored.
pub const CREDENTIAL_KEY: &str = "gemini_api_key";
pub const CREDENTIAL_ENV: &str = "GEMINI_API_KEY";

/// Key-value persistence for the credential.
pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Result<Option<String>, SessionError>;
    fn set(&self, value: &str) -> Result<(), SessionError>;
    fn delete(&self) -> Result<(), SessionError>;
}

pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self {
            service: SERVICE.to_string(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, SessionError> {
        Ok(keyring::Entry::new(&self.service, CREDENTIAL_KEY)?)
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeyringStore {
    fn get(&self) -> Result<Option<String>, SessionError> {
        match self.entry()?.get_password() {
            Ok(key) if !key.is_empty() => {
                log::info!("[SETTINGS] Loaded API key from OS keychain");
                Ok(Some(key))
            }
            Ok(_) | Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, value: &str) -> Result<(), SessionError> {
        self.entry()?.set_password(value)?;
        log::info!("[SETTINGS] API key saved to OS keychain");
        Ok(())
    }

    fn delete(&self) -> Result<(), SessionError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => {
                log::info!("[SETTINGS] API key removed from OS keychain");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    value: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Mutex::new(Some(value.into())),
        }
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self) -> Result<Option<String>, SessionError> {
        Ok(self.value.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn set(&self, value: &str) -> Result<(), SessionError> {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(value.to_string());
        Ok(())
    }

    fn delete(&self) -> Result<(), SessionError> {
        self.value.lock().unwrap_or_else(PoisonError::into_inner).take();
        Ok(())
    }
}

/// The credential to use: env var first, then the store.
///
/// A store error is logged and treated as "nothing stored", so a broken
/// keychain sends the user to setup instead of failing startup.
pub fn resolve_credential(store: &dyn CredentialStore) -> Option<String> {
    if let Some(key) = std::env::var(CREDENTIAL_ENV)
        .ok()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
    {
        log::info!("[SETTINGS] Using API key from {}", CREDENTIAL_ENV);
        return Some(key);
    }
    match store.get() {
        Ok(key) => key.filter(|k| !k.trim().is_empty()),
        Err(e) => {
            log::warn!("[SETTINGS] Credential store unavailable: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::default();
        assert_eq!(store.get().unwrap(), None);
        store.set("abc").unwrap();
        assert_eq!(store.get().unwrap().as_deref(), Some("abc"));
        store.delete().unwrap();
        store.delete().unwrap();
        assert_eq!(store.get().unwrap(), None);
    }

    #[test]
    fn blank_stored_key_is_ignored() {
        // Only meaningful when the env var is not set on the test host.
        if std::env::var(CREDENTIAL_ENV).is_ok() {
            eprintln!("SKIP: {} set in environment", CREDENTIAL_ENV);
            return;
        }
        assert_eq!(resolve_credential(&MemoryStore::with_value("  ")), None);
        assert_eq!(
            resolve_credential(&MemoryStore::with_value("stored")).as_deref(),
            Some("stored")
        );
    }
}
