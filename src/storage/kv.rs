//! Key/value persistence behind a small async trait.
//!
//! The dashboard kept campaign selection in browser storage. Here the same
//! keys live in one of three backends: memory (tests, throwaway shells), the
//! SQLite `settings` table, or the OS keychain.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use tokio::sync::Mutex;

use crate::error::AppError;
use crate::storage::Database;

/// The service name used for all keychain entries.
const KEYCHAIN_SERVICE: &str = "outbound-console";

// ─────────────────────────────────────────────────────────────────────────────
// KeyValueStore Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Async string key/value store.
///
/// `remove` is idempotent: removing a missing key succeeds.
pub trait KeyValueStore: Send + Sync {
    fn get<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, AppError>> + Send + 'a>>;

    fn set<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'a>>;

    fn remove<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'a>>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Memory
// ─────────────────────────────────────────────────────────────────────────────

/// In-process store. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, AppError>> + Send + 'a>> {
        Box::pin(async move { Ok(self.entries.lock().await.get(key).cloned()) })
    }

    fn set<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'a>> {
        Box::pin(async move {
            self.entries
                .lock()
                .await
                .insert(key.to_string(), value.to_string());
            Ok(())
        })
    }

    fn remove<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'a>> {
        Box::pin(async move {
            self.entries.lock().await.remove(key);
            Ok(())
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SQLite settings table
// ─────────────────────────────────────────────────────────────────────────────

impl KeyValueStore for Database {
    fn get<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, AppError>> + Send + 'a>> {
        Box::pin(self.get_setting(key))
    }

    fn set<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'a>> {
        Box::pin(self.set_setting(key, value))
    }

    fn remove<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'a>> {
        Box::pin(self.delete_setting(key))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// OS keychain
// ─────────────────────────────────────────────────────────────────────────────

/// Stores each key as its own keychain entry under a shared service name.
///
/// Keychain errors are mapped to opaque messages so that stored values never
/// reach logs or the UI.
#[derive(Debug, Clone)]
pub struct KeychainStore {
    service: String,
}

impl Default for KeychainStore {
    fn default() -> Self {
        Self::new(KEYCHAIN_SERVICE)
    }
}

impl KeychainStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }
}

impl KeyValueStore for KeychainStore {
    fn get<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, AppError>> + Send + 'a>> {
        let service = self.service.clone();
        let key = key.to_string();

        Box::pin(async move {
            tokio::task::spawn_blocking(move || {
                let entry = keyring::Entry::new(&service, &key)
                    .map_err(|_| AppError::Internal("Failed to access keychain.".into()))?;

                match entry.get_password() {
                    Ok(value) => Ok(Some(value)),
                    Err(keyring::Error::NoEntry) => Ok(None),
                    Err(_) => Err(AppError::Internal("Failed to retrieve credentials.".into())),
                }
            })
            .await
            .map_err(|_| AppError::Internal("Keychain task failed.".into()))?
        })
    }

    fn set<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'a>> {
        let service = self.service.clone();
        let key = key.to_string();
        let value = value.to_string();

        Box::pin(async move {
            tokio::task::spawn_blocking(move || {
                let entry = keyring::Entry::new(&service, &key)
                    .map_err(|_| AppError::Internal("Failed to access keychain.".into()))?;

                entry
                    .set_password(&value)
                    .map_err(|_| AppError::Internal("Failed to store credentials.".into()))
            })
            .await
            .map_err(|_| AppError::Internal("Keychain task failed.".into()))?
        })
    }

    fn remove<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'a>> {
        let service = self.service.clone();
        let key = key.to_string();

        Box::pin(async move {
            tokio::task::spawn_blocking(move || {
                let entry = keyring::Entry::new(&service, &key)
                    .map_err(|_| AppError::Internal("Failed to access keychain.".into()))?;

                match entry.delete_credential() {
                    Ok(()) => Ok(()),
                    Err(keyring::Error::NoEntry) => Ok(()), // Idempotent: already deleted
                    Err(_) => Err(AppError::Internal("Failed to delete credentials.".into())),
                }
            })
            .await
            .map_err(|_| AppError::Internal("Keychain task failed.".into()))?
        })
    }
}
