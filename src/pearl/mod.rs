//! Pearl calling API: client and wire types.

pub mod client;
pub mod types;

pub use client::{normalize_bearer, PearlClient};
pub use types::{
    AnalyticsData, CallDetails, CallPersonalization, CallSummary, CallsFilters, CallsResponse,
    CampaignActivity, DateRange, PlacedCall,
};
