//! Order Assist: order lifecycle automation over WhatsApp.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod orders;
pub mod policy;
pub mod store;
pub mod tracking;
pub mod transport;
