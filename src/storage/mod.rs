//! Storage module for the local SQLite database, key/value backends and
//! campaign credentials.

mod database;
pub mod credentials;
pub mod history;
pub mod kv;

pub use credentials::{CampaignCredentials, CredentialStore};
pub use database::{CallRecord, Database};
pub use history::{CallHistorySink, MemoryHistory};
pub use kv::{KeychainStore, KeyValueStore, MemoryStore};
