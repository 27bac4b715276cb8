//! Time-based scans: payment reminders and the no-response escalation.
//!
//! Both scans are window queries over `created_at`, not per-order timers,
//! so a restart never loses scheduled work. Reminder markers are written
//! only after the provider confirms the send; a failed send is retried on
//! the next scan for as long as the order stays inside its window.

use chrono::{Duration as ChronoDuration, Utc};
use tracing::{info, warn};

use crate::engine::Engine;
use crate::orders::model::{Alert, AlertReason, MessageType, PaymentStatus};
use crate::store::{ReminderStage, Storage};
use crate::transport::OutboundBody;

const CANCEL_INSTRUCTION: &str = "\n\nTo cancel your order, reply with 'CANCEL'.";

impl Engine {
    /// One pass of a payment reminder scan. Returns how many reminders
    /// were dispatched.
    pub async fn run_reminder_scan(&self, stage: ReminderStage) -> usize {
        let (delay, width) = match stage {
            ReminderStage::First => (self.config.reminder1_delay, self.config.reminder1_window),
            ReminderStage::Second => (self.config.reminder2_delay, self.config.reminder2_window),
        };
        let now = Utc::now();
        let window_end = now - chrono_duration(delay);
        let window_start = window_end - chrono_duration(width);

        let candidates = match self
            .store
            .find_reminder_candidates(stage, window_start, window_end)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, ?stage, "Reminder candidate query failed");
                return 0;
            }
        };

        let mut sent = 0;
        for order in candidates {
            // Re-check: payment may have landed between query and send.
            if order.payment_status != PaymentStatus::Pending || !order.automation_enabled {
                continue;
            }

            let user = match self.order_user(&order).await {
                Ok(user) => user,
                Err(e) => {
                    warn!(order_id = %order.id, error = %e, "Reminder skipped, no user");
                    continue;
                }
            };

            let (mut message, message_type) = match stage {
                ReminderStage::First => (
                    self.policy
                        .personalize(
                            &user.name,
                            crate::orders::model::OrderStatus::PaymentPending,
                            order.product_name.as_deref(),
                        )
                        .await,
                    MessageType::PaymentReminder1,
                ),
                ReminderStage::Second => (
                    format!(
                        "Hi {}, this is a final reminder that payment for your order is \
                         still pending. Please complete it soon to avoid cancellation.",
                        user.name
                    ),
                    MessageType::PaymentReminder2,
                ),
            };
            message.push_str(CANCEL_INSTRUCTION);

            if !self
                .dispatch(&order, &user, message_type, OutboundBody::text(message))
                .await
            {
                // Marker stays unset so the next scan retries.
                continue;
            }

            let marked = self
                .save_with_retry(order.id, move |order| {
                    let ts = Some(Utc::now());
                    match stage {
                        ReminderStage::First => order.payment_reminder_1_sent_at = ts,
                        ReminderStage::Second => order.payment_reminder_2_sent_at = ts,
                    }
                    Ok(())
                })
                .await;
            if let Err(e) = marked {
                warn!(order_id = %order.id, error = %e, "Failed to record reminder marker");
            }
            sent += 1;
        }

        if sent > 0 {
            info!(?stage, sent, "Payment reminders sent");
        }
        sent
    }

    /// One pass of the no-response escalation scan. Orders past the
    /// threshold with at least one outbound message and no customer reply
    /// get automation stopped and an operator alert. Returns how many
    /// orders were escalated.
    pub async fn run_escalation_scan(&self) -> usize {
        let cutoff = Utc::now() - chrono_duration(self.config.escalation_threshold);

        let candidates = match self.store.find_escalation_candidates(cutoff).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, "Escalation candidate query failed");
                return 0;
            }
        };

        let mut escalated = 0;
        for order in candidates {
            let outbound = match self.store.count_outbound_messages(order.id).await {
                Ok(count) => count,
                Err(e) => {
                    warn!(order_id = %order.id, error = %e, "Outbound count failed");
                    continue;
                }
            };
            // Never contacted: nothing the customer could have ignored.
            if outbound == 0 {
                continue;
            }

            if let Err(e) = self
                .save_with_retry(order.id, |order| {
                    order.automation_enabled = false;
                    Ok(())
                })
                .await
            {
                warn!(order_id = %order.id, error = %e, "Failed to stop automation");
                continue;
            }

            let already_open = self
                .store
                .has_open_alert(order.id, AlertReason::NoCustomerResponse)
                .await
                .unwrap_or(true);
            if !already_open {
                let hours = self.config.escalation_threshold.as_secs() / 3600;
                if let Err(e) = self
                    .store
                    .insert_alert(&Alert::new(
                        order.id,
                        AlertReason::NoCustomerResponse,
                        format!("No customer response for {hours} hours"),
                    ))
                    .await
                {
                    warn!(order_id = %order.id, error = %e, "Failed to create alert");
                    continue;
                }
            }

            info!(order_id = %order.id, "No-response escalation, automation stopped");
            escalated += 1;
        }

        escalated
    }
}

fn chrono_duration(d: std::time::Duration) -> ChronoDuration {
    ChronoDuration::from_std(d).unwrap_or_else(|_| ChronoDuration::MAX)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::engine::testing::test_engine;
    use crate::orders::model::{MessageLog, Sentiment};
    use crate::store::Storage;

    // created_at is immutable after insert, so age the order at seed time.
    async fn seed_aged_order(
        engine: &crate::engine::Engine,
        phone: &str,
        age: Duration,
    ) -> crate::orders::model::Order {
        let user = crate::orders::model::User::new("John", phone);
        engine.store.insert_user(&user).await.unwrap();
        let mut order = crate::orders::model::Order::new(user.id, None, None);
        order.created_at = Utc::now() - age;
        engine.store.insert_order(&order).await.unwrap();
        order
    }

    #[tokio::test]
    async fn first_reminder_fires_inside_window() {
        let (engine, transport) = test_engine().await;
        let order = seed_aged_order(&engine, "+15550001", Duration::minutes(7)).await;

        let sent = engine.run_reminder_scan(ReminderStage::First).await;
        assert_eq!(sent, 1);

        let last = transport.sent_bodies().last().unwrap().clone();
        assert!(last.contains("payment"));
        assert!(last.contains("To cancel your order, reply with 'CANCEL'."));

        let order = engine.store.get_order(order.id).await.unwrap().unwrap();
        assert!(order.payment_reminder_1_sent_at.is_some());

        // Marker set: the next scan sends nothing.
        assert_eq!(engine.run_reminder_scan(ReminderStage::First).await, 0);
    }

    #[tokio::test]
    async fn fresh_order_gets_no_reminder() {
        let (engine, _) = test_engine().await;
        seed_aged_order(&engine, "+15550001", Duration::minutes(1)).await;
        assert_eq!(engine.run_reminder_scan(ReminderStage::First).await, 0);
    }

    #[tokio::test]
    async fn second_reminder_uses_final_copy() {
        let (engine, transport) = test_engine().await;
        let order = seed_aged_order(&engine, "+15550001", Duration::hours(24) + Duration::minutes(30)).await;

        let sent = engine.run_reminder_scan(ReminderStage::Second).await;
        assert_eq!(sent, 1);
        assert!(
            transport
                .sent_bodies()
                .last()
                .unwrap()
                .contains("final reminder")
        );
        let order = engine.store.get_order(order.id).await.unwrap().unwrap();
        assert!(order.payment_reminder_2_sent_at.is_some());
    }

    #[tokio::test]
    async fn failed_send_leaves_marker_unset() {
        let (engine, transport) = test_engine().await;
        let order = seed_aged_order(&engine, "+15550001", Duration::minutes(7)).await;

        transport.set_failing(true);
        assert_eq!(engine.run_reminder_scan(ReminderStage::First).await, 0);
        let loaded = engine.store.get_order(order.id).await.unwrap().unwrap();
        assert!(loaded.payment_reminder_1_sent_at.is_none());

        transport.set_failing(false);
        assert_eq!(engine.run_reminder_scan(ReminderStage::First).await, 1);
    }

    #[tokio::test]
    async fn paid_order_gets_no_reminder() {
        let (engine, _) = test_engine().await;
        let order = seed_aged_order(&engine, "+15550001", Duration::minutes(7)).await;
        engine.confirm_payment(order.id, true).await.unwrap();

        assert_eq!(engine.run_reminder_scan(ReminderStage::First).await, 0);
    }

    #[tokio::test]
    async fn escalation_requires_outbound_history() {
        let (engine, _) = test_engine().await;
        // 49 hours old but never contacted.
        let order = seed_aged_order(&engine, "+15550001", Duration::hours(49)).await;

        assert_eq!(engine.run_escalation_scan().await, 0);
        let loaded = engine.store.get_order(order.id).await.unwrap().unwrap();
        assert!(loaded.automation_enabled);
    }

    #[tokio::test]
    async fn silent_contacted_order_escalates_once() {
        let (engine, _) = test_engine().await;
        let order = seed_aged_order(&engine, "+15550001", Duration::hours(49)).await;
        engine
            .store
            .insert_message_log(&MessageLog::outbound(
                order.id,
                MessageType::OrderConfirmation,
                "hi",
                "SM1",
            ))
            .await
            .unwrap();

        assert_eq!(engine.run_escalation_scan().await, 1);

        let loaded = engine.store.get_order(order.id).await.unwrap().unwrap();
        assert!(!loaded.automation_enabled);
        let alerts = engine.store.list_alerts(Some(false), 10).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].reason, AlertReason::NoCustomerResponse);
        assert!(alerts[0].description.contains("48 hours"));

        // Automation is now off, so the next scan finds nothing.
        assert_eq!(engine.run_escalation_scan().await, 0);
        assert_eq!(engine.store.list_alerts(Some(false), 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn replied_order_never_escalates() {
        let (engine, _) = test_engine().await;
        let order = seed_aged_order(&engine, "+15550001", Duration::hours(49)).await;
        engine
            .store
            .insert_message_log(&MessageLog::outbound(
                order.id,
                MessageType::OrderConfirmation,
                "hi",
                "SM1",
            ))
            .await
            .unwrap();
        engine
            .store
            .insert_message_log(&MessageLog::inbound(
                order.id,
                "on my way",
                Sentiment::Neutral,
                None,
            ))
            .await
            .unwrap();
        engine
            .save_with_retry(order.id, |order| {
                order.last_customer_reply_at = Some(Utc::now());
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(engine.run_escalation_scan().await, 0);
    }
}
