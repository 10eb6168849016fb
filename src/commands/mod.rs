//! Command handlers.
//!
//! The in-process surface a UI shell calls. Every command takes the shared
//! [`AppState`](crate::state::AppState) and reports outcomes through its
//! notifier.

pub mod campaigns;
pub mod dialer;
pub mod leads;

pub use campaigns::*;
pub use dialer::*;
pub use leads::*;
