//! Shipment tracking lookup.
//!
//! The production carrier integration is not wired yet; `MockTracking`
//! returns deterministic data per tracking id so status replies stay
//! stable across repeated customer queries.

use async_trait::async_trait;

/// Carrier-reported shipment state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingInfo {
    pub tracking_id: String,
    pub carrier: String,
    pub status: String,
    pub location: String,
    pub eta: String,
}

#[async_trait]
pub trait Tracking: Send + Sync {
    /// Look up a shipment. `None` when the tracking id is empty or unknown.
    async fn get_tracking_info(
        &self,
        tracking_id: &str,
        carrier: Option<&str>,
    ) -> Option<TrackingInfo>;
}

const MOCK_STATUSES: [&str; 4] = [
    "In Transit",
    "Out for Delivery",
    "Arrived at Facility",
    "Picked Up",
];
const MOCK_LOCATIONS: [&str; 4] = [
    "Mumbai Hub",
    "Delhi Gateway",
    "Bangalore Center",
    "Local Delivery Facility",
];

#[derive(Debug, Default)]
pub struct MockTracking;

#[async_trait]
impl Tracking for MockTracking {
    async fn get_tracking_info(
        &self,
        tracking_id: &str,
        carrier: Option<&str>,
    ) -> Option<TrackingInfo> {
        if tracking_id.is_empty() {
            return None;
        }

        // Keyed on id length so the same id always reports the same state.
        let idx = tracking_id.len() % 4;

        Some(TrackingInfo {
            tracking_id: tracking_id.to_string(),
            carrier: carrier.unwrap_or("Standard Shipping").to_string(),
            status: MOCK_STATUSES[idx].to_string(),
            location: MOCK_LOCATIONS[idx].to_string(),
            eta: "2 days".to_string(),
        })
    }
}
