//! Outbound messaging transports.
//!
//! The engine talks to customers through the `Transport` trait; the real
//! backend is Twilio's WhatsApp API, with a console transport for local
//! development when no credentials are configured.

pub mod console;
pub mod twilio;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::TransportError;

pub use console::ConsoleTransport;
pub use twilio::TwilioTransport;

/// What to send: free text, or a pre-approved content template with
/// substitution variables.
#[derive(Debug, Clone)]
pub enum OutboundBody {
    Text(String),
    Template { content_sid: String, variables: Value },
}

impl OutboundBody {
    pub fn text(s: impl Into<String>) -> Self {
        OutboundBody::Text(s.into())
    }

    /// Human-readable rendering for logging. Templates log their SID since
    /// the provider owns the actual copy.
    pub fn log_content(&self) -> String {
        match self {
            OutboundBody::Text(s) => s.clone(),
            OutboundBody::Template { content_sid, variables } => {
                format!("[template {content_sid}] {variables}")
            }
        }
    }
}

/// One message as reported by the provider's history API.
#[derive(Debug, Clone)]
pub struct ProviderMessage {
    pub sid: String,
    pub from: String,
    pub to: String,
    pub body: String,
    pub is_incoming: bool,
    pub sent_at: Option<DateTime<Utc>>,
}

/// A message channel to a customer. `send` returns the provider message
/// id on success; failures never panic the caller. `fetch_recent` reads
/// provider-side history, used to recover log rows missed while the
/// service was down.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, to: &str, body: &OutboundBody) -> Result<String, TransportError>;

    async fn fetch_recent(&self, limit: usize) -> Result<Vec<ProviderMessage>, TransportError>;
}

/// Twilio addresses WhatsApp recipients as `whatsapp:+E164`.
pub fn whatsapp_address(number: &str) -> String {
    if number.starts_with("whatsapp:") {
        number.to_string()
    } else {
        format!("whatsapp:{number}")
    }
}
