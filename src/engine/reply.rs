//! Inbound reply interpretation.
//!
//! Priority order: explicit commands first (status, cancel, feedback
//! prompt), then delivered-order feedback, then the default sentiment
//! path. The interpreter never returns an error to the webhook; every
//! inbound message resolves to a `ReplyDisposition`.

use chrono::Utc;
use tracing::{info, warn};

use crate::engine::Engine;
use crate::error::Error;
use crate::orders::model::{
    Alert, AlertReason, MessageLog, MessageType, Order, Sentiment, User,
};
use crate::store::Storage;
use crate::transport::OutboundBody;

const STATUS_COMMANDS: [&str; 4] = ["1", "status", "check status", "track"];
const CANCEL_COMMANDS: [&str; 4] = ["2", "cancel", "cancel order", "cancel_order"];
const FEEDBACK_COMMAND: &str = "3";

/// An inbound customer message, as delivered by the provider webhook.
#[derive(Debug, Clone, Default)]
pub struct InboundMessage {
    pub from: String,
    pub body: String,
    /// Interactive button payload; overrides `body` when present.
    pub button_payload: Option<String>,
    /// Interactive list selection; overrides `body` when present.
    pub list_id: Option<String>,
    pub provider_message_id: Option<String>,
}

impl InboundMessage {
    /// Effective text: button payload, then list selection, then body.
    pub fn effective_text(&self) -> &str {
        self.button_payload
            .as_deref()
            .or(self.list_id.as_deref())
            .unwrap_or(&self.body)
    }
}

/// What the interpreter did with an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyDisposition {
    /// Redelivery of an already-processed provider message id.
    DuplicateDelivery,
    /// No user with the sender's phone number.
    UnknownSender,
    /// Known user but no orders to route the reply to.
    NoOrderForSender,
    StatusSent,
    /// Cancellation request accepted: alert raised for admin approval.
    CancellationAcknowledged,
    /// Cancellation refused because the order is too far along.
    CancellationRejected,
    FeedbackPromptSent,
    FeedbackRecorded {
        rating: Option<u8>,
        sentiment: Sentiment,
    },
    /// Default path: sentiment classified and recorded. `escalated` means
    /// negative sentiment stopped automation and raised an alert.
    Classified {
        sentiment: Sentiment,
        escalated: bool,
    },
}

/// Strip the provider `whatsapp:` prefix and normalize to E.164 `+`.
pub fn normalize_whatsapp_number(from: &str) -> String {
    let number = from.strip_prefix("whatsapp:").unwrap_or(from);
    if number.starts_with('+') {
        number.to_string()
    } else {
        format!("+{number}")
    }
}

impl Engine {
    /// Entry point for the provider webhook. Resolves the sender, routes
    /// the reply to their most recent order, and interprets it. Storage
    /// errors are logged and folded into the nearest "nothing happened"
    /// disposition so the webhook can always acknowledge.
    pub async fn handle_inbound(&self, inbound: &InboundMessage) -> ReplyDisposition {
        if let Some(sid) = &inbound.provider_message_id {
            match self.store.has_provider_message(sid).await {
                Ok(true) => {
                    info!(sid, "Duplicate webhook delivery ignored");
                    return ReplyDisposition::DuplicateDelivery;
                }
                Ok(false) => {}
                Err(e) => warn!(error = %e, "Dedup check failed, processing anyway"),
            }
        }

        let phone = normalize_whatsapp_number(&inbound.from);

        let user = match self.store.find_user_by_phone(&phone).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!(phone, "Inbound message from unknown number");
                return ReplyDisposition::UnknownSender;
            }
            Err(e) => {
                warn!(error = %e, "User lookup failed");
                return ReplyDisposition::UnknownSender;
            }
        };

        let order = match self.store.latest_order_for_user(user.id).await {
            Ok(Some(order)) => order,
            Ok(None) => {
                warn!(user_id = %user.id, "Inbound message but user has no orders");
                return ReplyDisposition::NoOrderForSender;
            }
            Err(e) => {
                warn!(error = %e, "Order lookup failed");
                return ReplyDisposition::NoOrderForSender;
            }
        };

        let text = inbound.effective_text();
        match self
            .process_reply(&order, &user, text, inbound.provider_message_id.clone())
            .await
        {
            Ok(disposition) => disposition,
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "Reply processing failed");
                ReplyDisposition::Classified {
                    sentiment: Sentiment::Unknown,
                    escalated: false,
                }
            }
        }
    }

    async fn process_reply(
        &self,
        order: &Order,
        user: &User,
        text: &str,
        provider_message_id: Option<String>,
    ) -> Result<ReplyDisposition, Error> {
        let clean = text.trim().to_lowercase();

        // Commands are answered even when automation is off: they are
        // direct questions, not proactive messaging.
        if STATUS_COMMANDS.contains(&clean.as_str()) {
            return self.handle_status_check(order, user).await;
        }
        if CANCEL_COMMANDS.contains(&clean.as_str()) {
            return self.handle_cancel_request(order, user).await;
        }
        if clean == FEEDBACK_COMMAND {
            self.send_reply(order, user, "Please type your feedback or experience with us!")
                .await;
            return Ok(ReplyDisposition::FeedbackPromptSent);
        }

        if order.status == crate::orders::model::OrderStatus::Delivered {
            return self.record_feedback(order, user, text, provider_message_id).await;
        }

        self.classify_and_record(order, text, provider_message_id).await
    }

    async fn handle_status_check(
        &self,
        order: &Order,
        user: &User,
    ) -> Result<ReplyDisposition, Error> {
        let mut message = format!("Order Status: {}\n", order.status);
        if let Some(product) = &order.product_name {
            message.push_str(&format!("Product: {product}\n"));
        }

        if let Some(tracking_id) = &order.tracking_id {
            if let Some(info) = self
                .tracking
                .get_tracking_info(tracking_id, order.carrier.as_deref())
                .await
            {
                message.push_str(&format!(
                    "\nTracking Update:\nStatus: {}\nLocation: {}\nETA: {}\n",
                    info.status, info.location, info.eta
                ));
            }
        }

        message.push_str(&format!("\nPayment: {}\n", order.payment_status));
        self.send_reply(order, user, &message).await;
        Ok(ReplyDisposition::StatusSent)
    }

    async fn handle_cancel_request(
        &self,
        order: &Order,
        user: &User,
    ) -> Result<ReplyDisposition, Error> {
        if !order.status.is_cancellable() {
            self.send_reply(
                order,
                user,
                &format!(
                    "Sorry, your order cannot be cancelled as it is already {}. \
                     Please contact support.",
                    order.status
                ),
            )
            .await;
            return Ok(ReplyDisposition::CancellationRejected);
        }

        self.send_reply(
            order,
            user,
            "Processing your cancellation request. We'll notify you once it's confirmed.",
        )
        .await;

        // The order itself is untouched: cancellation needs admin approval.
        if !self
            .store
            .has_open_alert(order.id, AlertReason::CancellationRequest)
            .await?
        {
            self.store
                .insert_alert(&Alert::new(
                    order.id,
                    AlertReason::CancellationRequest,
                    format!(
                        "Customer requested cancellation via WhatsApp (Current status: {})",
                        order.status
                    ),
                ))
                .await?;
            info!(order_id = %order.id, "Cancellation request alert created");
        }

        Ok(ReplyDisposition::CancellationAcknowledged)
    }

    async fn record_feedback(
        &self,
        order: &Order,
        user: &User,
        text: &str,
        provider_message_id: Option<String>,
    ) -> Result<ReplyDisposition, Error> {
        let rating = self.policy.extract_rating(text).await;
        let sentiment = self.policy.classify_sentiment(text).await;

        let feedback = text.to_string();
        self.save_with_retry(order.id, move |order| {
            order.feedback_rating = rating;
            order.feedback_text = Some(feedback.clone());
            order.sentiment = sentiment;
            Ok(())
        })
        .await?;

        self.store
            .insert_message_log(&MessageLog::inbound(
                order.id,
                text,
                sentiment,
                provider_message_id,
            ))
            .await?;

        self.send_reply(
            order,
            user,
            "Thank you so much for your feedback! It helps us improve.",
        )
        .await;

        info!(order_id = %order.id, ?rating, sentiment = sentiment.as_str(), "Feedback recorded");
        Ok(ReplyDisposition::FeedbackRecorded { rating, sentiment })
    }

    async fn classify_and_record(
        &self,
        order: &Order,
        text: &str,
        provider_message_id: Option<String>,
    ) -> Result<ReplyDisposition, Error> {
        let sentiment = self.policy.classify_sentiment(text).await;

        self.store
            .insert_message_log(&MessageLog::inbound(
                order.id,
                text,
                sentiment,
                provider_message_id,
            ))
            .await?;

        let escalate = sentiment == Sentiment::Negative;
        self.save_with_retry(order.id, move |order| {
            order.last_customer_reply_at = Some(Utc::now());
            order.sentiment = sentiment;
            if escalate {
                order.automation_enabled = false;
            }
            Ok(())
        })
        .await?;

        let mut escalated = false;
        if escalate {
            if !self
                .store
                .has_open_alert(order.id, AlertReason::NegativeSentiment)
                .await?
            {
                let excerpt: String = text.chars().take(self.config.alert_excerpt_len).collect();
                self.store
                    .insert_alert(&Alert::new(
                        order.id,
                        AlertReason::NegativeSentiment,
                        format!("Customer expressed negative sentiment: '{excerpt}...'"),
                    ))
                    .await?;
            }
            escalated = true;
            info!(order_id = %order.id, "Negative sentiment, automation stopped");
        }

        Ok(ReplyDisposition::Classified { sentiment, escalated })
    }

    /// Direct reply to the customer, logged as a system reply.
    async fn send_reply(&self, order: &Order, user: &User, text: &str) {
        self.dispatch(
            order,
            user,
            MessageType::CustomerReply,
            OutboundBody::text(text),
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::testing::{RecordingTransport, test_engine};
    use crate::engine::{Engine, MessageTemplates};
    use crate::orders::model::OrderStatus;
    use crate::policy::Policy;
    use crate::store::{LibsqlStorage, Storage};
    use crate::tracking::MockTracking;

    /// Policy with scripted sentiment keyed on the word "awful".
    struct KeywordPolicy;

    #[async_trait]
    impl Policy for KeywordPolicy {
        async fn personalize(
            &self,
            customer_name: &str,
            status: OrderStatus,
            product_name: Option<&str>,
        ) -> String {
            crate::policy::StaticPolicy::message_for(customer_name, status, product_name)
        }

        async fn classify_sentiment(&self, reply: &str) -> Sentiment {
            if reply.contains("awful") {
                Sentiment::Negative
            } else if reply.contains("great") {
                Sentiment::Positive
            } else {
                Sentiment::Neutral
            }
        }

        async fn extract_rating(&self, feedback: &str) -> Option<u8> {
            crate::policy::StaticPolicy.extract_rating(feedback).await
        }
    }

    async fn keyword_engine() -> (Engine, Arc<RecordingTransport>) {
        let store = Arc::new(LibsqlStorage::new_memory().await.unwrap());
        let transport = Arc::new(RecordingTransport::default());
        let engine = Engine::new(
            store,
            transport.clone(),
            Arc::new(KeywordPolicy),
            Arc::new(MockTracking),
            MessageTemplates::default(),
            EngineConfig::default(),
        );
        (engine, transport)
    }

    fn inbound(from: &str, body: &str) -> InboundMessage {
        InboundMessage {
            from: from.to_string(),
            body: body.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn phone_normalization() {
        assert_eq!(normalize_whatsapp_number("whatsapp:+123"), "+123");
        assert_eq!(normalize_whatsapp_number("whatsapp:123"), "+123");
        assert_eq!(normalize_whatsapp_number("+123"), "+123");
    }

    #[test]
    fn button_payload_overrides_body() {
        let msg = InboundMessage {
            body: "tapped a button".into(),
            button_payload: Some("2".into()),
            ..Default::default()
        };
        assert_eq!(msg.effective_text(), "2");
    }

    #[tokio::test]
    async fn unknown_sender_is_ignored() {
        let (engine, transport) = keyword_engine().await;
        let disposition = engine
            .handle_inbound(&inbound("whatsapp:+19999999", "hello"))
            .await;
        assert_eq!(disposition, ReplyDisposition::UnknownSender);
        assert!(transport.sent_bodies().is_empty());
    }

    #[tokio::test]
    async fn status_command_reports_order_and_tracking() {
        let (engine, transport) = keyword_engine().await;
        let (order, _) = engine
            .create_order("John", "+15550001", Some("Salmon".into()), None)
            .await
            .unwrap();
        engine
            .mark_shipped(order.id, Some("TRK12345".into()), None)
            .await
            .unwrap();

        let disposition = engine
            .handle_inbound(&inbound("whatsapp:+15550001", "status"))
            .await;
        assert_eq!(disposition, ReplyDisposition::StatusSent);

        let last = transport.sent_bodies().last().unwrap().clone();
        assert!(last.contains("SHIPPED"));
        assert!(last.contains("Salmon"));
        assert!(last.contains("Tracking Update"));
        assert!(last.contains("Payment: PENDING"));
    }

    #[tokio::test]
    async fn cancel_command_raises_alert_without_cancelling() {
        let (engine, transport) = keyword_engine().await;
        let (order, _) = engine
            .create_order("John", "+15550001", None, None)
            .await
            .unwrap();

        let disposition = engine
            .handle_inbound(&inbound("whatsapp:+15550001", "CANCEL"))
            .await;
        assert_eq!(disposition, ReplyDisposition::CancellationAcknowledged);

        let order = engine.store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Created);
        assert!(
            engine
                .store
                .has_open_alert(order.id, AlertReason::CancellationRequest)
                .await
                .unwrap()
        );
        assert!(
            transport
                .sent_bodies()
                .last()
                .unwrap()
                .contains("Processing your cancellation request")
        );

        // A second request does not stack another alert.
        engine
            .handle_inbound(&inbound("whatsapp:+15550001", "cancel order"))
            .await;
        let alerts = engine.store.list_alerts(Some(false), 10).await.unwrap();
        assert_eq!(alerts.len(), 1);
    }

    #[tokio::test]
    async fn cancel_rejected_after_shipment() {
        let (engine, transport) = keyword_engine().await;
        let (order, _) = engine
            .create_order("John", "+15550001", None, None)
            .await
            .unwrap();
        engine.mark_shipped(order.id, None, None).await.unwrap();

        let disposition = engine
            .handle_inbound(&inbound("whatsapp:+15550001", "2"))
            .await;
        assert_eq!(disposition, ReplyDisposition::CancellationRejected);
        assert!(
            transport
                .sent_bodies()
                .last()
                .unwrap()
                .contains("cannot be cancelled")
        );
        assert!(
            !engine
                .store
                .has_open_alert(order.id, AlertReason::CancellationRequest)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn negative_reply_stops_automation_and_alerts() {
        let (engine, _) = keyword_engine().await;
        let (order, _) = engine
            .create_order("John", "+15550001", None, None)
            .await
            .unwrap();

        let disposition = engine
            .handle_inbound(&inbound("whatsapp:+15550001", "this is awful service"))
            .await;
        assert_eq!(
            disposition,
            ReplyDisposition::Classified {
                sentiment: Sentiment::Negative,
                escalated: true
            }
        );

        let order = engine.store.get_order(order.id).await.unwrap().unwrap();
        assert!(!order.automation_enabled);
        assert_eq!(order.sentiment, Sentiment::Negative);
        assert!(order.last_customer_reply_at.is_some());

        let alerts = engine.store.list_alerts(Some(false), 10).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].reason, AlertReason::NegativeSentiment);
        assert!(alerts[0].description.contains("awful"));
    }

    #[tokio::test]
    async fn numeric_status_command_beats_classification() {
        let (engine, transport) = keyword_engine().await;
        engine
            .create_order("John", "+15550001", None, None)
            .await
            .unwrap();

        // "1" is the status command even though the classifier would run
        // on any other text.
        let disposition = engine
            .handle_inbound(&inbound("whatsapp:+15550001", " 1 "))
            .await;
        assert_eq!(disposition, ReplyDisposition::StatusSent);
        assert!(
            transport
                .sent_bodies()
                .last()
                .unwrap()
                .contains("Order Status: CREATED")
        );
    }

    #[tokio::test]
    async fn repeated_negative_replies_keep_one_alert() {
        let (engine, _) = keyword_engine().await;
        let (order, _) = engine
            .create_order("John", "+15550001", None, None)
            .await
            .unwrap();

        engine
            .handle_inbound(&inbound("whatsapp:+15550001", "awful, just awful"))
            .await;
        engine
            .handle_inbound(&inbound("whatsapp:+15550001", "still awful"))
            .await;

        let alerts = engine.store.list_alerts(Some(false), 10).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].order_id, order.id);
    }

    #[tokio::test]
    async fn positive_reply_just_records() {
        let (engine, _) = keyword_engine().await;
        let (order, _) = engine
            .create_order("John", "+15550001", None, None)
            .await
            .unwrap();

        let disposition = engine
            .handle_inbound(&inbound("whatsapp:+15550001", "great, thanks!"))
            .await;
        assert_eq!(
            disposition,
            ReplyDisposition::Classified {
                sentiment: Sentiment::Positive,
                escalated: false
            }
        );

        let order = engine.store.get_order(order.id).await.unwrap().unwrap();
        assert!(order.automation_enabled);
        assert_eq!(order.sentiment, Sentiment::Positive);
    }

    #[tokio::test]
    async fn delivered_order_reply_is_feedback() {
        let (engine, transport) = keyword_engine().await;
        let (order, _) = engine
            .create_order("John", "+15550001", None, None)
            .await
            .unwrap();
        engine.mark_delivered(order.id).await.unwrap();

        let disposition = engine
            .handle_inbound(&inbound("whatsapp:+15550001", "great fish, 5 out of 5"))
            .await;
        assert_eq!(
            disposition,
            ReplyDisposition::FeedbackRecorded {
                rating: Some(5),
                sentiment: Sentiment::Positive
            }
        );

        let order = engine.store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(order.feedback_rating, Some(5));
        assert_eq!(order.feedback_text.as_deref(), Some("great fish, 5 out of 5"));
        assert!(
            transport
                .sent_bodies()
                .last()
                .unwrap()
                .contains("Thank you so much for your feedback")
        );
    }

    #[tokio::test]
    async fn duplicate_provider_id_is_skipped() {
        let (engine, _) = keyword_engine().await;
        let (order, _) = engine
            .create_order("John", "+15550001", None, None)
            .await
            .unwrap();

        let msg = InboundMessage {
            from: "whatsapp:+15550001".into(),
            body: "hello there".into(),
            provider_message_id: Some("SMdup".into()),
            ..Default::default()
        };
        let first = engine.handle_inbound(&msg).await;
        assert!(matches!(first, ReplyDisposition::Classified { .. }));

        let second = engine.handle_inbound(&msg).await;
        assert_eq!(second, ReplyDisposition::DuplicateDelivery);

        let logs = engine
            .store
            .list_message_logs(Some(order.id), 50)
            .await
            .unwrap();
        let inbound_count = logs.iter().filter(|l| l.is_incoming).count();
        assert_eq!(inbound_count, 1);
    }

    #[tokio::test]
    async fn feedback_prompt_command() {
        let (engine, transport) = test_engine().await;
        engine
            .create_order("John", "+15550001", None, None)
            .await
            .unwrap();

        let disposition = engine
            .handle_inbound(&inbound("whatsapp:+15550001", "3"))
            .await;
        assert_eq!(disposition, ReplyDisposition::FeedbackPromptSent);
        assert!(
            transport
                .sent_bodies()
                .last()
                .unwrap()
                .contains("type your feedback")
        );
    }
}
