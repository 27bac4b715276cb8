//! LLM-backed policy over an OpenAI-compatible chat completions API.
//!
//! Every call is wrapped in a timeout and falls back to the static policy
//! on any failure; customers never wait on, or see errors from, the model.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::config::PolicyConfig;
use crate::orders::model::{OrderStatus, Sentiment};
use crate::policy::{Policy, StaticPolicy, first_rating_digit};

pub struct LlmPolicy {
    client: reqwest::Client,
    config: PolicyConfig,
    timeout: Duration,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

impl LlmPolicy {
    pub fn new(config: PolicyConfig, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            timeout,
        }
    }

    /// One chat completion; `None` on timeout, transport failure, or a
    /// malformed response.
    async fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Option<String> {
        let body = json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": temperature,
            "max_tokens": max_tokens,
        });

        let request = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&body)
            .send();

        let response = match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!(error = %e, "LLM request failed");
                return None;
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "LLM request timed out");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(status = %response.status(), "LLM request rejected");
            return None;
        }

        let parsed: ChatResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "LLM response unparseable");
                return None;
            }
        };

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
    }

    fn personalization_prompt(
        customer_name: &str,
        status: OrderStatus,
        product_name: Option<&str>,
    ) -> String {
        let product_info = product_name
            .map(|p| format!(" for {p}"))
            .unwrap_or_default();
        let theme = "Please use fish-themed puns, nautical language, and a friendly \
                     'fresh catch' personality. Avoid being generic.";

        match status {
            OrderStatus::Created => format!(
                "Write a friendly WhatsApp order confirmation message for \
                 {customer_name}{product_info}. {theme}"
            ),
            OrderStatus::PaymentPending => format!(
                "Write a gentle payment reminder for {customer_name}{product_info}. {theme}"
            ),
            OrderStatus::Paid => format!(
                "Write a celebratory message for {customer_name} confirming that we received \
                 their payment{product_info}. Be enthusiastic and use nautical themes! {theme}"
            ),
            OrderStatus::InProcess => format!(
                "Write a short update for {customer_name} that their order{product_info} is \
                 being prepared. {theme}"
            ),
            OrderStatus::Shipped => format!(
                "Write an exciting shipping notification for {customer_name}{product_info}. \
                 Use nautical terms like 'sailing your way' or 'anchors aweigh'. {theme}"
            ),
            OrderStatus::OutForDelivery => format!(
                "Write a quick alert for {customer_name} that their order{product_info} is out \
                 for delivery today. Use terms like 'splashing down soon'. {theme}"
            ),
            OrderStatus::Delivered => format!(
                "Write a warm thank you message for {customer_name} for their \
                 order{product_info} that has just been delivered. Mention it's the catch of \
                 the day! {theme}"
            ),
            OrderStatus::Cancelled => format!(
                "Write a friendly fish-themed message to {customer_name} about their \
                 order{product_info}."
            ),
        }
    }
}

#[async_trait]
impl Policy for LlmPolicy {
    async fn personalize(
        &self,
        customer_name: &str,
        status: OrderStatus,
        product_name: Option<&str>,
    ) -> String {
        let prompt = Self::personalization_prompt(customer_name, status, product_name);
        match self
            .complete(
                "You are a friendly customer service assistant. Generate short, warm \
                 WhatsApp messages (max 2-3 sentences).",
                &prompt,
                0.7,
                100,
            )
            .await
        {
            Some(text) if !text.is_empty() => text,
            _ => StaticPolicy::message_for(customer_name, status, product_name),
        }
    }

    async fn classify_sentiment(&self, reply: &str) -> Sentiment {
        let prompt = format!(
            "Classify the sentiment of this customer message as exactly one word: \
             positive, neutral, or negative.\n\nCustomer message: \"{reply}\"\n\n\
             Respond with only one word: positive, neutral, or negative."
        );
        let answer = self
            .complete(
                "You are a sentiment classifier. Respond with exactly one word: \
                 positive, neutral, or negative.",
                &prompt,
                0.3,
                10,
            )
            .await;

        match answer.as_deref().map(str::to_lowercase).as_deref() {
            Some("positive") => Sentiment::Positive,
            Some("negative") => Sentiment::Negative,
            // Anything unexpected from the model is treated as neutral.
            _ => Sentiment::Neutral,
        }
    }

    async fn extract_rating(&self, feedback: &str) -> Option<u8> {
        let prompt = format!(
            "Extract a numerical rating from 1 to 5 from this customer feedback.\n\
             If no clear rating is found, return 0.\nReturn ONLY a single number.\n\n\
             Customer feedback: \"{feedback}\"\n\nRating (1-5):"
        );
        let answer = self
            .complete(
                "You are a data extractor. Respond with only a single digit from 0 to 5.",
                &prompt,
                0.1,
                5,
            )
            .await?;
        first_rating_digit(&answer)
    }
}
