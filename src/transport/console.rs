//! Console transport for local development.
//!
//! Used when no Twilio credentials are configured: prints each message to
//! the log and fabricates a provider id so the rest of the pipeline
//! behaves exactly as in production.

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::error::TransportError;
use crate::transport::{OutboundBody, ProviderMessage, Transport};

#[derive(Debug, Default)]
pub struct ConsoleTransport;

#[async_trait]
impl Transport for ConsoleTransport {
    async fn send(&self, to: &str, body: &OutboundBody) -> Result<String, TransportError> {
        let sid = format!("console-{}", Uuid::new_v4());
        info!(to, sid, content = body.log_content(), "Console send");
        Ok(sid)
    }

    async fn fetch_recent(&self, _limit: usize) -> Result<Vec<ProviderMessage>, TransportError> {
        // The console keeps no history.
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn console_send_returns_unique_sids() {
        let transport = ConsoleTransport;
        let a = transport
            .send("+123", &OutboundBody::text("hi"))
            .await
            .unwrap();
        let b = transport
            .send("+123", &OutboundBody::text("hi"))
            .await
            .unwrap();
        assert!(a.starts_with("console-"));
        assert_ne!(a, b);
    }
}
