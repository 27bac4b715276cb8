//! Provider-history reconciliation.
//!
//! Pulls recent messages from the transport's history API and backfills
//! log rows that were missed while the service was down. Rows are matched
//! to the sender's (or recipient's) most recent order, the same routing
//! the live webhook uses.

use tracing::{debug, info};

use crate::engine::Engine;
use crate::engine::reply::normalize_whatsapp_number;
use crate::error::Error;
use crate::orders::model::{MessageLog, MessageType};
use crate::store::Storage;

impl Engine {
    /// Backfill up to `limit` recent provider messages into the log.
    /// Returns how many rows were inserted.
    pub async fn sync_provider_messages(&self, limit: usize) -> Result<usize, Error> {
        let messages = self.transport.fetch_recent(limit).await?;

        let mut synced = 0;
        for msg in messages {
            if self.store.has_provider_message(&msg.sid).await? {
                continue;
            }

            // Inbound: the customer is the sender. Outbound: the recipient.
            let customer = if msg.is_incoming { &msg.from } else { &msg.to };
            if customer.is_empty() {
                continue;
            }
            let phone = normalize_whatsapp_number(customer);

            let Some(user) = self.store.find_user_by_phone(&phone).await? else {
                debug!(sid = msg.sid, phone, "Sync skipped, unknown number");
                continue;
            };
            let Some(order) = self.store.latest_order_for_user(user.id).await? else {
                continue;
            };

            let body = if msg.body.is_empty() {
                "[No content]".to_string()
            } else {
                msg.body.clone()
            };

            let mut entry = if msg.is_incoming {
                let sentiment = self.policy.classify_sentiment(&body).await;
                MessageLog::inbound(order.id, body, sentiment, Some(msg.sid.clone()))
            } else {
                MessageLog::outbound(order.id, guess_outbound_type(&body), body, msg.sid.clone())
            };
            if let Some(sent_at) = msg.sent_at {
                entry.sent_at = sent_at;
            }

            self.store.insert_message_log(&entry).await?;
            synced += 1;
        }

        info!(synced, "Provider message sync complete");
        Ok(synced)
    }
}

/// Best-effort classification of a recovered outbound row by its copy.
fn guess_outbound_type(body: &str) -> MessageType {
    let lower = body.to_lowercase();
    if lower.contains("payment") && lower.contains("received") {
        MessageType::PaymentConfirmation
    } else if lower.contains("out for delivery") {
        MessageType::OutForDeliveryNotification
    } else if lower.contains("shipped") {
        MessageType::ShippingNotification
    } else if lower.contains("delivered") {
        MessageType::DeliveryNotification
    } else if lower.contains("confirmed") {
        MessageType::OrderConfirmation
    } else {
        MessageType::CustomerReply
    }
}
