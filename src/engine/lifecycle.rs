//! Order lifecycle transitions and their customer notifications.
//!
//! Every transition persists the state change first (with conflict retry),
//! then dispatches the notification. A failed send never rolls back the
//! transition; the order state is the source of truth.

use rust_decimal::Decimal;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::engine::Engine;
use crate::error::{EngineError, Error};
use crate::orders::model::{
    AlertReason, MessageType, Order, OrderStatus, PaymentStatus, User,
};
use crate::store::Storage;
use crate::transport::OutboundBody;

impl Engine {
    /// Create an order (upserting the customer by phone number) and send
    /// the confirmation message.
    pub async fn create_order(
        &self,
        name: &str,
        whatsapp_number: &str,
        product_name: Option<String>,
        amount: Option<Decimal>,
    ) -> Result<(Order, User), Error> {
        let user = match self.store.find_user_by_phone(whatsapp_number).await? {
            Some(mut user) => {
                if user.name != name {
                    user.name = name.to_string();
                    self.store.save_user(&user).await?;
                }
                user
            }
            None => {
                let user = User::new(name, whatsapp_number);
                self.store.insert_user(&user).await?;
                user
            }
        };

        let order = Order::new(user.id, product_name, amount);
        self.store.insert_order(&order).await?;
        info!(order_id = %order.id, user_id = %user.id, "Order created");

        let body = match &self.templates.order_confirmation {
            Some(content_sid) => OutboundBody::Template {
                content_sid: content_sid.clone(),
                variables: json!({
                    "1": user.name,
                    "2": order.product_name.as_deref().unwrap_or("your order"),
                }),
            },
            None => OutboundBody::text(
                self.policy
                    .personalize(&user.name, OrderStatus::Created, order.product_name.as_deref())
                    .await,
            ),
        };
        self.dispatch(&order, &user, MessageType::OrderConfirmation, body)
            .await;

        Ok((order, user))
    }

    /// Payment gateway callback. `paid = true` marks the payment received
    /// and advances pre-payment orders to `Paid`; `false` marks it failed.
    pub async fn confirm_payment(&self, order_id: Uuid, paid: bool) -> Result<Order, Error> {
        if !paid {
            let order = self
                .save_with_retry(order_id, |order| {
                    guard_not_cancelled(order, "payment update")?;
                    order.payment_status = PaymentStatus::Failed;
                    Ok(())
                })
                .await?;
            return Ok(order);
        }

        let order = self
            .save_with_retry(order_id, |order| {
                guard_not_cancelled(order, "payment confirmation")?;
                order.payment_status = PaymentStatus::Paid;
                if matches!(
                    order.status,
                    OrderStatus::Created | OrderStatus::PaymentPending
                ) {
                    order.status = OrderStatus::Paid;
                }
                Ok(())
            })
            .await?;

        let user = self.order_user(&order).await?;
        if order.automation_enabled {
            let message = self
                .policy
                .personalize(&user.name, OrderStatus::Paid, order.product_name.as_deref())
                .await;
            self.dispatch(
                &order,
                &user,
                MessageType::PaymentConfirmation,
                OutboundBody::text(message),
            )
            .await;
        }
        Ok(order)
    }

    /// Mark the order as being prepared and notify the customer.
    pub async fn mark_in_process(&self, order_id: Uuid) -> Result<Order, Error> {
        let order = self
            .save_with_retry(order_id, |order| {
                guard_not_cancelled(order, "mark in process")?;
                order.status = OrderStatus::InProcess;
                Ok(())
            })
            .await?;

        self.notify_status(&order, OrderStatus::InProcess, MessageType::InProcessNotification)
            .await?;
        Ok(order)
    }

    /// Mark shipped, recording tracking details, and notify.
    pub async fn mark_shipped(
        &self,
        order_id: Uuid,
        tracking_id: Option<String>,
        carrier: Option<String>,
    ) -> Result<Order, Error> {
        let order = self
            .save_with_retry(order_id, |order| {
                guard_not_cancelled(order, "ship")?;
                order.status = OrderStatus::Shipped;
                order.shipped_at = Some(chrono::Utc::now());
                if let Some(tracking_id) = &tracking_id {
                    order.tracking_id = Some(tracking_id.clone());
                }
                if let Some(carrier) = &carrier {
                    order.carrier = Some(carrier.clone());
                }
                Ok(())
            })
            .await?;

        let user = self.order_user(&order).await?;
        if order.automation_enabled {
            let mut message = self
                .policy
                .personalize(&user.name, OrderStatus::Shipped, order.product_name.as_deref())
                .await;
            if let Some(tracking_id) = &order.tracking_id {
                message.push_str(&format!(
                    "\n\nTracking Info:\nID: {tracking_id}\nCarrier: {}",
                    order.carrier.as_deref().unwrap_or("Standard")
                ));
            }
            self.dispatch(
                &order,
                &user,
                MessageType::ShippingNotification,
                OutboundBody::text(message),
            )
            .await;
        }
        Ok(order)
    }

    /// Mark out for delivery and notify.
    pub async fn mark_out_for_delivery(&self, order_id: Uuid) -> Result<Order, Error> {
        let order = self
            .save_with_retry(order_id, |order| {
                guard_not_cancelled(order, "mark out for delivery")?;
                order.status = OrderStatus::OutForDelivery;
                Ok(())
            })
            .await?;

        self.notify_status(
            &order,
            OrderStatus::OutForDelivery,
            MessageType::OutForDeliveryNotification,
        )
        .await?;
        Ok(order)
    }

    /// Mark delivered and send the feedback request.
    pub async fn mark_delivered(&self, order_id: Uuid) -> Result<Order, Error> {
        let order = self
            .save_with_retry(order_id, |order| {
                guard_not_cancelled(order, "deliver")?;
                order.status = OrderStatus::Delivered;
                order.delivered_at = Some(chrono::Utc::now());
                Ok(())
            })
            .await?;

        let user = self.order_user(&order).await?;
        if order.automation_enabled {
            let body = match &self.templates.delivery_feedback {
                Some(content_sid) => OutboundBody::Template {
                    content_sid: content_sid.clone(),
                    variables: json!({
                        "1": user.name,
                        "2": order.product_name.as_deref().unwrap_or("your order"),
                        "3": order.id.to_string(),
                    }),
                },
                None => {
                    let mut message = self
                        .policy
                        .personalize(
                            &user.name,
                            OrderStatus::Delivered,
                            order.product_name.as_deref(),
                        )
                        .await;
                    message.push_str("\n\nGive your feedback!");
                    OutboundBody::text(message)
                }
            };
            self.dispatch(&order, &user, MessageType::DeliveryNotification, body)
                .await;
        }
        Ok(order)
    }

    /// Admin-confirmed cancellation: cancel the order, stop automation,
    /// notify the customer, and auto-resolve open cancellation alerts.
    /// Returns the order and how many alerts were resolved.
    pub async fn admin_cancel(&self, order_id: Uuid) -> Result<(Order, usize), Error> {
        let order = self
            .save_with_retry(order_id, |order| {
                guard_not_cancelled(order, "cancel")?;
                order.status = OrderStatus::Cancelled;
                order.automation_enabled = false;
                Ok(())
            })
            .await?;

        // The cancellation confirmation goes out even though automation is
        // now off: it answers an explicit human action.
        let user = self.order_user(&order).await?;
        self.dispatch(
            &order,
            &user,
            MessageType::CustomerReply,
            OutboundBody::text(
                "Your order has been successfully cancelled. If you have any questions, \
                 feel free to reach out!",
            ),
        )
        .await;

        let resolved = self
            .store
            .resolve_alerts_for(order.id, AlertReason::CancellationRequest)
            .await?;
        info!(order_id = %order.id, alerts_resolved = resolved, "Order cancelled by admin");

        Ok((order, resolved))
    }

    pub(crate) async fn order_user(&self, order: &Order) -> Result<User, Error> {
        Ok(self
            .store
            .get_user(order.user_id)
            .await?
            .ok_or(EngineError::UserNotFound(order.user_id))?)
    }

    async fn notify_status(
        &self,
        order: &Order,
        status: OrderStatus,
        message_type: MessageType,
    ) -> Result<(), Error> {
        let user = self.order_user(order).await?;
        if order.automation_enabled {
            let message = self
                .policy
                .personalize(&user.name, status, order.product_name.as_deref())
                .await;
            self.dispatch(order, &user, message_type, OutboundBody::text(message))
                .await;
        }
        Ok(())
    }
}

fn guard_not_cancelled(order: &Order, event: &'static str) -> Result<(), EngineError> {
    if order.status == OrderStatus::Cancelled {
        return Err(EngineError::InvalidTransition {
            id: order.id,
            status: order.status,
            event,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::test_engine;
    use crate::error::Error;
    use crate::store::Storage;

    #[tokio::test]
    async fn create_order_sends_confirmation() {
        let (engine, transport) = test_engine().await;
        let (order, user) = engine
            .create_order("John", "+15550001", Some("Atlantic Salmon".into()), None)
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Created);
        assert_eq!(user.whatsapp_number, "+15550001");
        let bodies = transport.sent_bodies();
        assert_eq!(bodies.len(), 1);
        assert!(bodies[0].contains("confirmed"));
    }

    #[tokio::test]
    async fn create_order_reuses_user_and_updates_name() {
        let (engine, _) = test_engine().await;
        let (_, first) = engine
            .create_order("John", "+15550001", None, None)
            .await
            .unwrap();
        let (_, second) = engine
            .create_order("Johnny", "+15550001", None, None)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "Johnny");
    }

    #[tokio::test]
    async fn payment_advances_pre_payment_orders() {
        let (engine, transport) = test_engine().await;
        let (order, _) = engine
            .create_order("John", "+15550001", None, None)
            .await
            .unwrap();

        let order = engine.confirm_payment(order.id, true).await.unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.payment_status, PaymentStatus::Paid);

        let bodies = transport.sent_bodies();
        assert!(bodies.last().unwrap().contains("Payment received"));
    }

    #[tokio::test]
    async fn payment_does_not_regress_later_statuses() {
        let (engine, _) = test_engine().await;
        let (order, _) = engine
            .create_order("John", "+15550001", None, None)
            .await
            .unwrap();
        engine.mark_in_process(order.id).await.unwrap();

        let order = engine.confirm_payment(order.id, true).await.unwrap();
        assert_eq!(order.status, OrderStatus::InProcess);
        assert_eq!(order.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn failed_payment_keeps_status() {
        let (engine, _) = test_engine().await;
        let (order, _) = engine
            .create_order("John", "+15550001", None, None)
            .await
            .unwrap();

        let order = engine.confirm_payment(order.id, false).await.unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Failed);
        assert_eq!(order.status, OrderStatus::Created);
    }

    #[tokio::test]
    async fn shipping_records_tracking_and_mentions_it() {
        let (engine, transport) = test_engine().await;
        let (order, _) = engine
            .create_order("John", "+15550001", None, None)
            .await
            .unwrap();

        let order = engine
            .mark_shipped(order.id, Some("TRK123".into()), Some("BlueDart".into()))
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Shipped);
        assert_eq!(order.tracking_id.as_deref(), Some("TRK123"));
        assert!(order.shipped_at.is_some());

        let bodies = transport.sent_bodies();
        let last = bodies.last().unwrap();
        assert!(last.contains("TRK123"));
        assert!(last.contains("BlueDart"));
    }

    #[tokio::test]
    async fn delivery_requests_feedback() {
        let (engine, transport) = test_engine().await;
        let (order, _) = engine
            .create_order("John", "+15550001", None, None)
            .await
            .unwrap();

        let order = engine.mark_delivered(order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Delivered);
        assert!(order.delivered_at.is_some());
        assert!(transport.sent_bodies().last().unwrap().contains("feedback"));
    }

    #[tokio::test]
    async fn cancelled_orders_reject_transitions() {
        let (engine, _) = test_engine().await;
        let (order, _) = engine
            .create_order("John", "+15550001", None, None)
            .await
            .unwrap();
        engine.admin_cancel(order.id).await.unwrap();

        let err = engine.mark_in_process(order.id).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Engine(EngineError::InvalidTransition { .. })
        ));
        let err = engine.admin_cancel(order.id).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Engine(EngineError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn admin_cancel_resolves_cancellation_alerts() {
        let (engine, transport) = test_engine().await;
        let (order, _) = engine
            .create_order("John", "+15550001", None, None)
            .await
            .unwrap();
        engine
            .store
            .insert_alert(&crate::orders::model::Alert::new(
                order.id,
                AlertReason::CancellationRequest,
                "Customer requested cancellation",
            ))
            .await
            .unwrap();

        let (order, resolved) = engine.admin_cancel(order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert!(!order.automation_enabled);
        assert_eq!(resolved, 1);
        assert!(
            transport
                .sent_bodies()
                .last()
                .unwrap()
                .contains("cancelled")
        );
    }

    #[tokio::test]
    async fn automation_off_suppresses_status_notifications() {
        let (engine, transport) = test_engine().await;
        let (order, _) = engine
            .create_order("John", "+15550001", None, None)
            .await
            .unwrap();

        engine
            .save_with_retry(order.id, |order| {
                order.automation_enabled = false;
                Ok(())
            })
            .await
            .unwrap();

        let before = transport.sent_bodies().len();
        engine.mark_in_process(order.id).await.unwrap();
        assert_eq!(transport.sent_bodies().len(), before);
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let (engine, _) = test_engine().await;
        let err = engine.mark_delivered(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Engine(EngineError::OrderNotFound(_))
        ));
    }
}
