//! Configuration types.
//!
//! All settings come from the environment with sensible defaults; secrets
//! are held in `secrecy::SecretString` so they never hit debug output.

use std::time::Duration;

use secrecy::SecretString;

/// Engine timing configuration: reminder windows, scan cadences, and the
/// escalation threshold.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Delay after order creation before the first payment reminder fires.
    pub reminder1_delay: Duration,
    /// Lookback window width for the first reminder scan.
    pub reminder1_window: Duration,
    /// Delay before the final payment reminder fires.
    pub reminder2_delay: Duration,
    /// Lookback window width for the final reminder scan.
    pub reminder2_window: Duration,
    /// Silence threshold after which an uncontacted-by-reply order escalates.
    pub escalation_threshold: Duration,
    /// Cadence of the first-reminder scan. Must be <= reminder1_window.
    pub fast_scan_interval: Duration,
    /// Cadence of the final-reminder scan. Must be <= reminder2_window.
    pub slow_scan_interval: Duration,
    /// Cadence of the escalation scan.
    pub escalation_scan_interval: Duration,
    /// Timeout for a single transport send.
    pub transport_timeout: Duration,
    /// Timeout for a single policy (LLM) call.
    pub policy_timeout: Duration,
    /// Max characters of customer text quoted in alert descriptions.
    pub alert_excerpt_len: usize,
    /// Max attempts for a conditional order save before giving up.
    pub save_retry_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reminder1_delay: Duration::from_secs(5 * 60),
            reminder1_window: Duration::from_secs(5 * 60),
            reminder2_delay: Duration::from_secs(24 * 3600),
            reminder2_window: Duration::from_secs(3600),
            escalation_threshold: Duration::from_secs(48 * 3600),
            fast_scan_interval: Duration::from_secs(60),
            slow_scan_interval: Duration::from_secs(3600),
            escalation_scan_interval: Duration::from_secs(4 * 3600),
            transport_timeout: Duration::from_secs(30),
            policy_timeout: Duration::from_secs(10),
            alert_excerpt_len: 100,
            save_retry_attempts: 3,
        }
    }
}

impl EngineConfig {
    /// Build from environment, falling back to defaults per field.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            fast_scan_interval: env_secs("ORDER_ASSIST_FAST_SCAN_SECS")
                .unwrap_or(defaults.fast_scan_interval),
            slow_scan_interval: env_secs("ORDER_ASSIST_SLOW_SCAN_SECS")
                .unwrap_or(defaults.slow_scan_interval),
            escalation_scan_interval: env_secs("ORDER_ASSIST_ESCALATION_SCAN_SECS")
                .unwrap_or(defaults.escalation_scan_interval),
            escalation_threshold: env_secs("ORDER_ASSIST_ESCALATION_THRESHOLD_SECS")
                .unwrap_or(defaults.escalation_threshold),
            ..defaults
        }
    }
}

fn env_secs(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Twilio WhatsApp transport configuration.
#[derive(Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: SecretString,
    /// Sender number in Twilio's `whatsapp:+14155238886` format.
    pub whatsapp_number: String,
    /// Optional content template SID for order confirmations.
    pub order_confirmation_template: Option<String>,
    /// Optional content template SID for delivery/feedback messages.
    pub delivery_feedback_template: Option<String>,
}

impl TwilioConfig {
    /// Read Twilio credentials from the environment. Returns `None` when the
    /// required variables are absent, in which case the caller falls back to
    /// the console transport.
    pub fn from_env() -> Option<Self> {
        let account_sid = std::env::var("TWILIO_ACCOUNT_SID").ok()?;
        let auth_token = std::env::var("TWILIO_AUTH_TOKEN").ok()?;
        let whatsapp_number = std::env::var("TWILIO_WHATSAPP_NUMBER").ok()?;

        Some(Self {
            account_sid,
            auth_token: SecretString::from(auth_token),
            whatsapp_number,
            order_confirmation_template: std::env::var("TWILIO_ORDER_CONFIRMATION_SID").ok(),
            delivery_feedback_template: std::env::var("TWILIO_DELIVERY_FEEDBACK_SID").ok(),
        })
    }
}

/// LLM policy provider configuration (OpenAI-compatible chat completions).
#[derive(Clone)]
pub struct PolicyConfig {
    pub api_key: SecretString,
    pub api_url: String,
    pub model: String,
}

impl PolicyConfig {
    /// Read LLM settings from the environment. `None` means the static
    /// fallback policy is used instead.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").ok()?;
        Some(Self {
            api_key: SecretString::from(api_key),
            api_url: std::env::var("OPENAI_API_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".to_string()),
            model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
        })
    }
}
