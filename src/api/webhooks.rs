//! Twilio inbound webhook.
//!
//! Twilio POSTs form data for each customer message and retries on any
//! non-2xx, so this handler always returns 200; dispositions and errors
//! are logged, never surfaced.

use axum::Form;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::api::AppState;
use crate::engine::InboundMessage;

/// Twilio webhook form fields (capitalized per their convention).
#[derive(Debug, Deserialize)]
pub struct TwilioWebhook {
    #[serde(rename = "From", default)]
    pub from: String,
    #[serde(rename = "Body", default)]
    pub body: String,
    #[serde(rename = "ButtonPayload")]
    pub button_payload: Option<String>,
    #[serde(rename = "ListId")]
    pub list_id: Option<String>,
    #[serde(rename = "MessageSid")]
    pub message_sid: Option<String>,
}

pub async fn handle_whatsapp(
    State(state): State<AppState>,
    Form(webhook): Form<TwilioWebhook>,
) -> StatusCode {
    let inbound = InboundMessage {
        from: webhook.from,
        body: webhook.body,
        button_payload: webhook.button_payload,
        list_id: webhook.list_id,
        provider_message_id: webhook.message_sid,
    };

    let disposition = state.engine.handle_inbound(&inbound).await;
    info!(?disposition, "Webhook processed");

    StatusCode::OK
}

/// Verification endpoint for initial Twilio setup.
pub async fn verify_whatsapp() -> axum::Json<Value> {
    axum::Json(json!({ "status": "Webhook endpoint is active" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twilio_form_parses_interactive_fields() {
        let form = "From=whatsapp%3A%2B15550001&Body=hello&ButtonPayload=2&MessageSid=SM1";
        let webhook: TwilioWebhook = serde_urlencoded::from_str(form).unwrap();
        assert_eq!(webhook.from, "whatsapp:+15550001");
        assert_eq!(webhook.button_payload.as_deref(), Some("2"));
        assert_eq!(webhook.message_sid.as_deref(), Some("SM1"));
        assert!(webhook.list_id.is_none());
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let webhook: TwilioWebhook = serde_urlencoded::from_str("").unwrap();
        assert!(webhook.from.is_empty());
        assert!(webhook.body.is_empty());
    }
}
