//! Outbound calling console for Pearl voice-AI campaigns.
//!
//! Leads are imported from CSV and dialed one at a time, either directly or
//! through a pausable bulk session. Campaign credentials come from the
//! white-label registry or are entered by hand. The [`proxy`] module exposes
//! the same upstream calls over HTTP for a browser dashboard.

pub mod analytics;
pub mod commands;
pub mod config;
pub mod dialer;
pub mod error;
pub mod http;
pub mod leads;
pub mod notify;
pub mod pearl;
pub mod proxy;
pub mod state;
pub mod storage;
pub mod whitelabel;

pub use crate::config::Settings;
pub use crate::error::AppError;
pub use crate::state::AppState;
