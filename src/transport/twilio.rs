//! Twilio WhatsApp transport.
//!
//! Sends through the Messages API with HTTP basic auth. Template sends use
//! `ContentSid`/`ContentVariables`; everything else is a plain `Body`.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, warn};

use chrono::{DateTime, Utc};

use crate::config::TwilioConfig;
use crate::error::TransportError;
use crate::transport::{OutboundBody, ProviderMessage, Transport, whatsapp_address};

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

pub struct TwilioTransport {
    client: reqwest::Client,
    account_sid: String,
    auth_token: SecretString,
    from: String,
    messages_url: String,
}

#[derive(Deserialize)]
struct MessageResponse {
    sid: String,
}

#[derive(Deserialize)]
struct TwilioError {
    message: Option<String>,
}

#[derive(Deserialize)]
struct MessageListResponse {
    messages: Vec<MessageListEntry>,
}

#[derive(Deserialize)]
struct MessageListEntry {
    sid: String,
    from: Option<String>,
    to: Option<String>,
    body: Option<String>,
    direction: Option<String>,
    date_sent: Option<String>,
}

/// Twilio's JSON API reports `date_sent` in RFC 2822.
fn parse_twilio_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

impl TwilioTransport {
    pub fn new(config: TwilioConfig, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Http(format!("Failed to build HTTP client: {e}")))?;

        let messages_url = format!(
            "{TWILIO_API_BASE}/Accounts/{}/Messages.json",
            config.account_sid
        );

        Ok(Self {
            client,
            account_sid: config.account_sid,
            auth_token: config.auth_token,
            from: whatsapp_address(&config.whatsapp_number),
            messages_url,
        })
    }

    fn build_form(&self, to: &str, body: &OutboundBody) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("To", whatsapp_address(to)),
            ("From", self.from.clone()),
        ];
        match body {
            OutboundBody::Text(text) => form.push(("Body", text.clone())),
            OutboundBody::Template { content_sid, variables } => {
                form.push(("ContentSid", content_sid.clone()));
                form.push(("ContentVariables", variables.to_string()));
            }
        }
        form
    }
}

#[async_trait]
impl Transport for TwilioTransport {
    async fn send(&self, to: &str, body: &OutboundBody) -> Result<String, TransportError> {
        if let OutboundBody::Text(text) = body {
            if text.trim().is_empty() {
                return Err(TransportError::InvalidMessage(
                    "Empty message body".to_string(),
                ));
            }
        }

        let form = self.build_form(to, body);

        let response = self
            .client
            .post(&self.messages_url)
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout { seconds: 30 }
                } else {
                    TransportError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let reason = response
                .json::<TwilioError>()
                .await
                .ok()
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("HTTP {status}"));
            warn!(to, %status, reason, "Twilio send failed");
            return Err(TransportError::SendFailed {
                to: to.to_string(),
                reason,
            });
        }

        let message: MessageResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Http(format!("Invalid Twilio response: {e}")))?;

        debug!(to, sid = message.sid, "Message sent via Twilio");
        Ok(message.sid)
    }

    async fn fetch_recent(&self, limit: usize) -> Result<Vec<ProviderMessage>, TransportError> {
        let response = self
            .client
            .get(&self.messages_url)
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .query(&[("PageSize", limit)])
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Http(format!(
                "Message list request failed: HTTP {status}"
            )));
        }

        let list: MessageListResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Http(format!("Invalid Twilio response: {e}")))?;

        Ok(list
            .messages
            .into_iter()
            .map(|m| ProviderMessage {
                sid: m.sid,
                from: m.from.unwrap_or_default(),
                to: m.to.unwrap_or_default(),
                body: m.body.unwrap_or_default(),
                is_incoming: m.direction.as_deref() == Some("inbound"),
                sent_at: m.date_sent.as_deref().and_then(parse_twilio_date),
            })
            .collect())
    }
}
