//! Domain types: orders, users, message logs, and operator alerts.
//!
//! Every status-like field is a closed enum so that adding a state forces
//! each consumer (dispatcher, interpreter, reminder predicates) to be
//! revisited at compile time.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order fulfillment status. Forward-moving except for `Cancelled`, which
/// is terminal and reachable from any pre-shipment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Created,
    PaymentPending,
    Paid,
    InProcess,
    Shipped,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::PaymentPending => "PAYMENT_PENDING",
            OrderStatus::Paid => "PAID",
            OrderStatus::InProcess => "IN_PROCESS",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::OutForDelivery => "OUT_FOR_DELIVERY",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREATED" => Some(OrderStatus::Created),
            "PAYMENT_PENDING" => Some(OrderStatus::PaymentPending),
            "PAID" => Some(OrderStatus::Paid),
            "IN_PROCESS" => Some(OrderStatus::InProcess),
            "SHIPPED" => Some(OrderStatus::Shipped),
            "OUT_FOR_DELIVERY" => Some(OrderStatus::OutForDelivery),
            "DELIVERED" => Some(OrderStatus::Delivered),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// States from which a customer may still request cancellation.
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            OrderStatus::Created | OrderStatus::PaymentPending | OrderStatus::Paid
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment status, an independent axis from `OrderStatus`; paying
/// advances the order from `Created`/`PaymentPending` to `Paid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(PaymentStatus::Pending),
            "PAID" => Some(PaymentStatus::Paid),
            "FAILED" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last-classified sentiment of the most recent relevant inbound reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
    Unknown,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
            Sentiment::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "positive" => Some(Sentiment::Positive),
            "neutral" => Some(Sentiment::Neutral),
            "negative" => Some(Sentiment::Negative),
            "unknown" => Some(Sentiment::Unknown),
            _ => None,
        }
    }
}

/// A customer. One user may own many orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub whatsapp_number: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: impl Into<String>, whatsapp_number: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            whatsapp_number: whatsapp_number.into(),
            created_at: Utc::now(),
        }
    }
}

/// The aggregate root of automation. Mutated in place through its status
/// machine until `Delivered` or `Cancelled`; never deleted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    /// Once false, the engine sends no further proactive messages for this
    /// order. Flipping back to true is a human action, not an engine one.
    pub automation_enabled: bool,
    pub sentiment: Sentiment,

    pub product_name: Option<String>,
    pub amount: Option<Decimal>,

    pub tracking_id: Option<String>,
    pub carrier: Option<String>,

    /// Populated only once the order is delivered.
    pub feedback_rating: Option<u8>,
    pub feedback_text: Option<String>,

    pub created_at: DateTime<Utc>,
    /// Reminder markers: presence means "do not resend".
    pub payment_reminder_1_sent_at: Option<DateTime<Utc>>,
    pub payment_reminder_2_sent_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub last_customer_reply_at: Option<DateTime<Utc>>,

    /// Optimistic-concurrency version, bumped on every conditional save.
    #[serde(default)]
    pub version: i64,
}

impl Order {
    pub fn new(user_id: Uuid, product_name: Option<String>, amount: Option<Decimal>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            status: OrderStatus::Created,
            payment_status: PaymentStatus::Pending,
            automation_enabled: true,
            sentiment: Sentiment::Unknown,
            product_name,
            amount,
            tracking_id: None,
            carrier: None,
            feedback_rating: None,
            feedback_text: None,
            created_at: Utc::now(),
            payment_reminder_1_sent_at: None,
            payment_reminder_2_sent_at: None,
            shipped_at: None,
            delivered_at: None,
            last_customer_reply_at: None,
            version: 0,
        }
    }
}

/// Enumerated kind of a logged message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    OrderConfirmation,
    PaymentReminder1,
    PaymentReminder2,
    InProcessNotification,
    ShippingNotification,
    OutForDeliveryNotification,
    DeliveryNotification,
    PaymentConfirmation,
    FeedbackRequest,
    CustomerReply,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::OrderConfirmation => "ORDER_CONFIRMATION",
            MessageType::PaymentReminder1 => "PAYMENT_REMINDER_1",
            MessageType::PaymentReminder2 => "PAYMENT_REMINDER_2",
            MessageType::InProcessNotification => "IN_PROCESS_NOTIFICATION",
            MessageType::ShippingNotification => "SHIPPING_NOTIFICATION",
            MessageType::OutForDeliveryNotification => "OUT_FOR_DELIVERY_NOTIFICATION",
            MessageType::DeliveryNotification => "DELIVERY_NOTIFICATION",
            MessageType::PaymentConfirmation => "PAYMENT_CONFIRMATION",
            MessageType::FeedbackRequest => "FEEDBACK_REQUEST",
            MessageType::CustomerReply => "CUSTOMER_REPLY",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ORDER_CONFIRMATION" => Some(MessageType::OrderConfirmation),
            "PAYMENT_REMINDER_1" => Some(MessageType::PaymentReminder1),
            "PAYMENT_REMINDER_2" => Some(MessageType::PaymentReminder2),
            "IN_PROCESS_NOTIFICATION" => Some(MessageType::InProcessNotification),
            "SHIPPING_NOTIFICATION" => Some(MessageType::ShippingNotification),
            "OUT_FOR_DELIVERY_NOTIFICATION" => Some(MessageType::OutForDeliveryNotification),
            "DELIVERY_NOTIFICATION" => Some(MessageType::DeliveryNotification),
            "PAYMENT_CONFIRMATION" => Some(MessageType::PaymentConfirmation),
            "FEEDBACK_REQUEST" => Some(MessageType::FeedbackRequest),
            "CUSTOMER_REPLY" => Some(MessageType::CustomerReply),
            _ => None,
        }
    }
}

/// Append-only record of one outbound or inbound message. Audit trail and
/// the source of truth for idempotency checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageLog {
    pub id: Uuid,
    pub order_id: Uuid,
    pub message_type: MessageType,
    pub content: String,
    pub is_incoming: bool,
    /// Classified sentiment, inbound messages only.
    pub sentiment: Option<Sentiment>,
    /// Provider (Twilio) message SID; also the webhook dedup key.
    pub provider_message_id: Option<String>,
    pub sent_at: DateTime<Utc>,
}

impl MessageLog {
    /// An outbound row, keyed by the transport-confirmed provider id.
    pub fn outbound(
        order_id: Uuid,
        message_type: MessageType,
        content: impl Into<String>,
        provider_message_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            message_type,
            content: content.into(),
            is_incoming: false,
            sentiment: None,
            provider_message_id: Some(provider_message_id.into()),
            sent_at: Utc::now(),
        }
    }

    /// An inbound customer message with its classified sentiment.
    pub fn inbound(
        order_id: Uuid,
        content: impl Into<String>,
        sentiment: Sentiment,
        provider_message_id: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            message_type: MessageType::CustomerReply,
            content: content.into(),
            is_incoming: true,
            sentiment: Some(sentiment),
            provider_message_id,
            sent_at: Utc::now(),
        }
    }
}

/// Why an alert was raised for human attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertReason {
    NegativeSentiment,
    NoCustomerResponse,
    PaymentOverdue,
    DeliveryDelayed,
    CancellationRequest,
}

impl AlertReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertReason::NegativeSentiment => "NEGATIVE_SENTIMENT",
            AlertReason::NoCustomerResponse => "NO_CUSTOMER_RESPONSE",
            AlertReason::PaymentOverdue => "PAYMENT_OVERDUE",
            AlertReason::DeliveryDelayed => "DELIVERY_DELAYED",
            AlertReason::CancellationRequest => "CANCELLATION_REQUEST",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NEGATIVE_SENTIMENT" => Some(AlertReason::NegativeSentiment),
            "NO_CUSTOMER_RESPONSE" => Some(AlertReason::NoCustomerResponse),
            "PAYMENT_OVERDUE" => Some(AlertReason::PaymentOverdue),
            "DELIVERY_DELAYED" => Some(AlertReason::DeliveryDelayed),
            "CANCELLATION_REQUEST" => Some(AlertReason::CancellationRequest),
            _ => None,
        }
    }
}

/// A work item for human operators. Created by the engine, resolved by an
/// operator (or auto-resolved by an admin-confirmed cancellation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub order_id: Uuid,
    pub reason: AlertReason,
    pub description: String,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn new(order_id: Uuid, reason: AlertReason, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            reason,
            description: description.into(),
            resolved: false,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }
}
