//! Outbound dispatch: send through the transport, then log.
//!
//! The message log row is written only after the provider has confirmed
//! the send, so the log never claims a message the customer did not get.

use tracing::{info, warn};

use crate::engine::Engine;
use crate::orders::model::{MessageLog, MessageType, Order, User};
use crate::store::Storage;
use crate::transport::OutboundBody;

impl Engine {
    /// Send to the order's customer and append a log row on success.
    /// Returns whether the message actually went out; send failures are
    /// logged and swallowed so lifecycle operations keep going.
    pub(crate) async fn dispatch(
        &self,
        order: &Order,
        user: &User,
        message_type: MessageType,
        body: OutboundBody,
    ) -> bool {
        let sid = match self.transport.send(&user.whatsapp_number, &body).await {
            Ok(sid) => sid,
            Err(e) => {
                warn!(
                    order_id = %order.id,
                    message_type = message_type.as_str(),
                    error = %e,
                    "Send failed"
                );
                return false;
            }
        };

        let entry = MessageLog::outbound(order.id, message_type, body.log_content(), sid);
        if let Err(e) = self.store.insert_message_log(&entry).await {
            // The customer got the message; losing the log row is an audit
            // gap, not a delivery failure.
            warn!(order_id = %order.id, error = %e, "Failed to log sent message");
        }

        info!(
            order_id = %order.id,
            message_type = message_type.as_str(),
            "Message dispatched"
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::testing::test_engine;
    use crate::orders::model::{MessageType, Order, User};
    use crate::store::Storage;
    use crate::transport::OutboundBody;

    #[tokio::test]
    async fn dispatch_logs_only_on_success() {
        let (engine, transport) = test_engine().await;
        let user = User::new("John", "+15550001");
        engine.store.insert_user(&user).await.unwrap();
        let order = Order::new(user.id, None, None);
        engine.store.insert_order(&order).await.unwrap();

        transport.set_failing(true);
        let sent = engine
            .dispatch(
                &order,
                &user,
                MessageType::OrderConfirmation,
                OutboundBody::text("hello"),
            )
            .await;
        assert!(!sent);
        assert_eq!(
            engine.store.count_outbound_messages(order.id).await.unwrap(),
            0
        );

        transport.set_failing(false);
        let sent = engine
            .dispatch(
                &order,
                &user,
                MessageType::OrderConfirmation,
                OutboundBody::text("hello"),
            )
            .await;
        assert!(sent);
        assert_eq!(
            engine.store.count_outbound_messages(order.id).await.unwrap(),
            1
        );
    }
}
