//! Message policy: copy personalization, sentiment classification, and
//! feedback-rating extraction.
//!
//! The trait is infallible. Messaging must keep working when the
//! LLM is down, so every implementation resolves to *some* answer: the
//! static fallback copy, a `neutral` sentiment, or no rating.

pub mod llm;

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::orders::model::{OrderStatus, Sentiment};

pub use llm::LlmPolicy;

#[async_trait]
pub trait Policy: Send + Sync {
    /// A customer-facing message for the given status change.
    async fn personalize(
        &self,
        customer_name: &str,
        status: OrderStatus,
        product_name: Option<&str>,
    ) -> String;

    /// Classify an inbound reply. Unclassifiable text is `Neutral`.
    async fn classify_sentiment(&self, reply: &str) -> Sentiment;

    /// Extract a 1-5 rating from feedback text, if one is present.
    async fn extract_rating(&self, feedback: &str) -> Option<u8>;
}

static RATING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-5]").expect("valid regex"));

/// First digit 0-5 found in the text; 0 means "no rating given".
pub(crate) fn first_rating_digit(text: &str) -> Option<u8> {
    let digit = RATING_RE.find(text)?.as_str().parse::<u8>().ok()?;
    (digit > 0).then_some(digit)
}

/// Template-based policy used when no LLM is configured, and as the
/// fallback path when an LLM call fails.
#[derive(Debug, Default)]
pub struct StaticPolicy;

impl StaticPolicy {
    pub fn message_for(
        customer_name: &str,
        status: OrderStatus,
        product_name: Option<&str>,
    ) -> String {
        let product_info = product_name
            .map(|p| format!(" ({p})"))
            .unwrap_or_default();

        match status {
            OrderStatus::Created => format!(
                "Hi {customer_name}, your catch{product_info} has been confirmed. \
                 We'll have it swimming your way soon."
            ),
            OrderStatus::PaymentPending => format!(
                "Hi {customer_name}, just a friendly nudge that payment for your \
                 order{product_info} is pending. Please settle the bill so we can get fishing."
            ),
            OrderStatus::Paid => format!(
                "Payment received. Thanks {customer_name}, we're getting your fresh \
                 catch{product_info} ready for the journey."
            ),
            OrderStatus::InProcess => format!(
                "Hi {customer_name}, your order{product_info} is currently being packed \
                 with ice and care."
            ),
            OrderStatus::Shipped => format!(
                "Great news {customer_name}, your order{product_info} has been shipped \
                 and is sailing your way."
            ),
            OrderStatus::OutForDelivery => format!(
                "Heads up {customer_name}, your fresh order{product_info} is out for \
                 delivery today. Get the grill ready."
            ),
            OrderStatus::Delivered => format!(
                "Hi {customer_name}, your order{product_info} has been delivered. It's \
                 the catch of the day. Please give your feedback."
            ),
            OrderStatus::Cancelled => {
                format!("Hi {customer_name}, update on your order{product_info}.")
            }
        }
    }
}

#[async_trait]
impl Policy for StaticPolicy {
    async fn personalize(
        &self,
        customer_name: &str,
        status: OrderStatus,
        product_name: Option<&str>,
    ) -> String {
        Self::message_for(customer_name, status, product_name)
    }

    async fn classify_sentiment(&self, _reply: &str) -> Sentiment {
        Sentiment::Neutral
    }

    async fn extract_rating(&self, feedback: &str) -> Option<u8> {
        first_rating_digit(feedback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_messages_include_name_and_product() {
        let msg = StaticPolicy
            .personalize("John", OrderStatus::Shipped, Some("Atlantic Salmon"))
            .await;
        assert!(msg.contains("John"));
        assert!(msg.contains("(Atlantic Salmon)"));
        assert!(msg.contains("sailing your way"));
    }

    #[tokio::test]
    async fn static_message_without_product() {
        let msg = StaticPolicy
            .personalize("John", OrderStatus::Created, None)
            .await;
        assert!(!msg.contains('('));
        assert!(msg.contains("confirmed"));
    }

    #[test]
    fn rating_extraction() {
        assert_eq!(first_rating_digit("5"), Some(5));
        assert_eq!(first_rating_digit("I'd say 4 out of 5"), Some(4));
        assert_eq!(first_rating_digit("0"), None);
        assert_eq!(first_rating_digit("loved it"), None);
    }

    #[tokio::test]
    async fn static_sentiment_is_neutral() {
        assert_eq!(
            StaticPolicy.classify_sentiment("anything").await,
            Sentiment::Neutral
        );
    }
}
