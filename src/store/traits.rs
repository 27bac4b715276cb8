//! `Storage`, the single async interface for all persistence.
//!
//! Typed per-entity operations instead of a generic predicate API: the
//! reminder and escalation scans get their own candidate queries so the
//! filtering runs in SQL, not in the engine.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::orders::model::{Alert, AlertReason, MessageLog, Order, User};

/// Which payment reminder a scan is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderStage {
    /// The 5-minute nudge.
    First,
    /// The 24-hour final reminder.
    Second,
}

/// Backend-agnostic storage trait covering users, orders, message logs,
/// and alerts.
#[async_trait]
pub trait Storage: Send + Sync {
    // ── Users ───────────────────────────────────────────────────────

    async fn insert_user(&self, user: &User) -> Result<(), DatabaseError>;

    async fn save_user(&self, user: &User) -> Result<(), DatabaseError>;

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError>;

    /// Look up a user by WhatsApp number (webhook sender resolution).
    async fn find_user_by_phone(&self, whatsapp_number: &str)
    -> Result<Option<User>, DatabaseError>;

    // ── Orders ──────────────────────────────────────────────────────

    async fn insert_order(&self, order: &Order) -> Result<(), DatabaseError>;

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, DatabaseError>;

    /// Conditional save keyed on `order.version`. A concurrent writer
    /// having bumped the row's version yields `DatabaseError::Conflict`;
    /// on success the in-memory version is advanced to match the row.
    async fn save_order(&self, order: &mut Order) -> Result<(), DatabaseError>;

    /// Most recently created order for a user (webhook reply routing).
    async fn latest_order_for_user(&self, user_id: Uuid) -> Result<Option<Order>, DatabaseError>;

    async fn list_orders(&self, skip: usize, limit: usize) -> Result<Vec<Order>, DatabaseError>;

    /// Orders eligible for the given reminder stage: payment pending,
    /// automation on, stage marker unset, `created_at` inside the window.
    async fn find_reminder_candidates(
        &self,
        stage: ReminderStage,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<Order>, DatabaseError>;

    /// Orders that may need escalation: automation on, older than the
    /// cutoff, and no customer reply ever recorded. The caller still has
    /// to verify at least one outbound message exists.
    async fn find_escalation_candidates(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Order>, DatabaseError>;

    // ── Message log ─────────────────────────────────────────────────

    async fn insert_message_log(&self, entry: &MessageLog) -> Result<(), DatabaseError>;

    /// Message logs, newest first, optionally scoped to one order.
    async fn list_message_logs(
        &self,
        order_id: Option<Uuid>,
        limit: usize,
    ) -> Result<Vec<MessageLog>, DatabaseError>;

    /// Number of outbound rows for an order ("has the customer ever been
    /// contacted" check for the escalation scan).
    async fn count_outbound_messages(&self, order_id: Uuid) -> Result<u64, DatabaseError>;

    /// Whether a provider message id has already been logged (webhook
    /// redelivery dedup).
    async fn has_provider_message(&self, provider_message_id: &str)
    -> Result<bool, DatabaseError>;

    // ── Alerts ──────────────────────────────────────────────────────

    async fn insert_alert(&self, alert: &Alert) -> Result<(), DatabaseError>;

    async fn get_alert(&self, id: Uuid) -> Result<Option<Alert>, DatabaseError>;

    /// Alerts, newest first, optionally filtered by resolution state.
    async fn list_alerts(
        &self,
        resolved: Option<bool>,
        limit: usize,
    ) -> Result<Vec<Alert>, DatabaseError>;

    /// Mark one alert resolved. Returns false when nothing changed (no
    /// such alert, or already resolved).
    async fn resolve_alert(&self, id: Uuid) -> Result<bool, DatabaseError>;

    /// Whether an unresolved alert with this reason exists for the order
    /// ("one open alert per reason per order" dedup).
    async fn has_open_alert(
        &self,
        order_id: Uuid,
        reason: AlertReason,
    ) -> Result<bool, DatabaseError>;

    /// Resolve every open alert with this reason for the order. Returns
    /// the number resolved.
    async fn resolve_alerts_for(
        &self,
        order_id: Uuid,
        reason: AlertReason,
    ) -> Result<usize, DatabaseError>;
}
