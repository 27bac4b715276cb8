//! libSQL backend for the async `Storage` trait.
//!
//! Supports local file and in-memory databases. Timestamps are stored as
//! fixed-width RFC 3339 text (microsecond precision, `Z` suffix) so SQL
//! string comparison orders them chronologically.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database as LibsqlDatabase, params};
use rust_decimal::Decimal;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::orders::model::{
    Alert, AlertReason, MessageLog, MessageType, Order, OrderStatus, PaymentStatus, Sentiment, User,
};
use crate::store::migrations;
use crate::store::traits::{ReminderStage, Storage};

/// libSQL storage backend.
///
/// Holds a single connection reused for all operations;
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibsqlStorage {
    #[allow(dead_code)]
    db: Arc<LibsqlDatabase>,
    conn: Connection,
}

impl LibsqlStorage {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        info!(path = %path.display(), "Database opened");

        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Create an in-memory database (for tests and local experimentation).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to create in-memory database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;

        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Canonical timestamp write format: fixed-width RFC 3339.
fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn opt_ts(ts: &Option<DateTime<Utc>>) -> libsql::Value {
    match ts {
        Some(ts) => libsql::Value::Text(fmt_ts(ts)),
        None => libsql::Value::Null,
    }
}

/// Parse an RFC 3339 string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| DateTime::<Utc>::MIN_UTC)
}

fn parse_optional_datetime(s: &Option<String>) -> Option<DateTime<Utc>> {
    s.as_ref().map(|s| parse_datetime(s))
}

fn parse_uuid(s: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::Query(format!("Invalid UUID in row: {e}")))
}

/// Convert `Option<&str>` to a libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn query_err(e: libsql::Error) -> DatabaseError {
    DatabaseError::Query(e.to_string())
}

// ── Row mappers ─────────────────────────────────────────────────────

const ORDER_COLUMNS: &str = "id, user_id, status, payment_status, automation_enabled, sentiment, \
     product_name, amount, tracking_id, carrier, feedback_rating, feedback_text, created_at, \
     payment_reminder_1_sent_at, payment_reminder_2_sent_at, shipped_at, delivered_at, \
     last_customer_reply_at, version";

const MESSAGE_LOG_COLUMNS: &str =
    "id, order_id, message_type, content, is_incoming, sentiment, provider_message_id, sent_at";

const ALERT_COLUMNS: &str = "id, order_id, reason, description, resolved, created_at, resolved_at";

fn row_to_user(row: &libsql::Row) -> Result<User, DatabaseError> {
    let id: String = row.get(0).map_err(query_err)?;
    let created_str: String = row.get(3).map_err(query_err)?;
    Ok(User {
        id: parse_uuid(&id)?,
        name: row.get(1).map_err(query_err)?,
        whatsapp_number: row.get(2).map_err(query_err)?,
        created_at: parse_datetime(&created_str),
    })
}

fn row_to_order(row: &libsql::Row) -> Result<Order, DatabaseError> {
    let id: String = row.get(0).map_err(query_err)?;
    let user_id: String = row.get(1).map_err(query_err)?;
    let status_str: String = row.get(2).map_err(query_err)?;
    let payment_str: String = row.get(3).map_err(query_err)?;
    let automation: i64 = row.get(4).map_err(query_err)?;
    let sentiment_str: String = row.get(5).map_err(query_err)?;
    let amount_str: Option<String> = row.get::<String>(7).ok();
    let rating: Option<i64> = row.get::<i64>(10).ok();
    let created_str: String = row.get(12).map_err(query_err)?;
    let reminder1_str: Option<String> = row.get::<String>(13).ok();
    let reminder2_str: Option<String> = row.get::<String>(14).ok();
    let shipped_str: Option<String> = row.get::<String>(15).ok();
    let delivered_str: Option<String> = row.get::<String>(16).ok();
    let last_reply_str: Option<String> = row.get::<String>(17).ok();

    Ok(Order {
        id: parse_uuid(&id)?,
        user_id: parse_uuid(&user_id)?,
        status: OrderStatus::parse(&status_str)
            .ok_or_else(|| DatabaseError::Query(format!("Unknown order status '{status_str}'")))?,
        payment_status: PaymentStatus::parse(&payment_str).ok_or_else(|| {
            DatabaseError::Query(format!("Unknown payment status '{payment_str}'"))
        })?,
        automation_enabled: automation != 0,
        sentiment: Sentiment::parse(&sentiment_str).unwrap_or(Sentiment::Unknown),
        product_name: row.get::<String>(6).ok(),
        amount: amount_str.and_then(|s| Decimal::from_str(&s).ok()),
        tracking_id: row.get::<String>(8).ok(),
        carrier: row.get::<String>(9).ok(),
        feedback_rating: rating.map(|r| r as u8),
        feedback_text: row.get::<String>(11).ok(),
        created_at: parse_datetime(&created_str),
        payment_reminder_1_sent_at: parse_optional_datetime(&reminder1_str),
        payment_reminder_2_sent_at: parse_optional_datetime(&reminder2_str),
        shipped_at: parse_optional_datetime(&shipped_str),
        delivered_at: parse_optional_datetime(&delivered_str),
        last_customer_reply_at: parse_optional_datetime(&last_reply_str),
        version: row.get(18).map_err(query_err)?,
    })
}

fn row_to_message_log(row: &libsql::Row) -> Result<MessageLog, DatabaseError> {
    let id: String = row.get(0).map_err(query_err)?;
    let order_id: String = row.get(1).map_err(query_err)?;
    let type_str: String = row.get(2).map_err(query_err)?;
    let is_incoming: i64 = row.get(4).map_err(query_err)?;
    let sentiment_str: Option<String> = row.get::<String>(5).ok();
    let sent_str: String = row.get(7).map_err(query_err)?;

    Ok(MessageLog {
        id: parse_uuid(&id)?,
        order_id: parse_uuid(&order_id)?,
        message_type: MessageType::parse(&type_str)
            .ok_or_else(|| DatabaseError::Query(format!("Unknown message type '{type_str}'")))?,
        content: row.get(3).map_err(query_err)?,
        is_incoming: is_incoming != 0,
        sentiment: sentiment_str.as_deref().and_then(Sentiment::parse),
        provider_message_id: row.get::<String>(6).ok(),
        sent_at: parse_datetime(&sent_str),
    })
}

fn row_to_alert(row: &libsql::Row) -> Result<Alert, DatabaseError> {
    let id: String = row.get(0).map_err(query_err)?;
    let order_id: String = row.get(1).map_err(query_err)?;
    let reason_str: String = row.get(2).map_err(query_err)?;
    let resolved: i64 = row.get(4).map_err(query_err)?;
    let created_str: String = row.get(5).map_err(query_err)?;
    let resolved_str: Option<String> = row.get::<String>(6).ok();

    Ok(Alert {
        id: parse_uuid(&id)?,
        order_id: parse_uuid(&order_id)?,
        reason: AlertReason::parse(&reason_str)
            .ok_or_else(|| DatabaseError::Query(format!("Unknown alert reason '{reason_str}'")))?,
        description: row.get(3).map_err(query_err)?,
        resolved: resolved != 0,
        created_at: parse_datetime(&created_str),
        resolved_at: parse_optional_datetime(&resolved_str),
    })
}

async fn collect_orders(mut rows: libsql::Rows) -> Result<Vec<Order>, DatabaseError> {
    let mut orders = Vec::new();
    while let Some(row) = rows.next().await.map_err(query_err)? {
        orders.push(row_to_order(&row)?);
    }
    Ok(orders)
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Storage for LibsqlStorage {
    async fn insert_user(&self, user: &User) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO users (id, name, whatsapp_number, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    user.id.to_string(),
                    user.name.clone(),
                    user.whatsapp_number.clone(),
                    fmt_ts(&user.created_at),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Constraint(e.to_string()))?;
        debug!(id = %user.id, "User inserted");
        Ok(())
    }

    async fn save_user(&self, user: &User) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE users SET name = ?1, whatsapp_number = ?2 WHERE id = ?3",
                params![
                    user.name.clone(),
                    user.whatsapp_number.clone(),
                    user.id.to_string(),
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, name, whatsapp_number, created_at FROM users WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(query_err)?;
        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_user(&row)?)),
            None => Ok(None),
        }
    }

    async fn find_user_by_phone(
        &self,
        whatsapp_number: &str,
    ) -> Result<Option<User>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, name, whatsapp_number, created_at FROM users WHERE whatsapp_number = ?1",
                params![whatsapp_number],
            )
            .await
            .map_err(query_err)?;
        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_user(&row)?)),
            None => Ok(None),
        }
    }

    async fn insert_order(&self, order: &Order) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO orders (id, user_id, status, payment_status, automation_enabled, \
                 sentiment, product_name, amount, tracking_id, carrier, feedback_rating, \
                 feedback_text, created_at, payment_reminder_1_sent_at, payment_reminder_2_sent_at, \
                 shipped_at, delivered_at, last_customer_reply_at, version) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
                params![
                    order.id.to_string(),
                    order.user_id.to_string(),
                    order.status.as_str(),
                    order.payment_status.as_str(),
                    order.automation_enabled as i64,
                    order.sentiment.as_str(),
                    opt_text(order.product_name.as_deref()),
                    opt_text(order.amount.map(|a| a.to_string()).as_deref()),
                    opt_text(order.tracking_id.as_deref()),
                    opt_text(order.carrier.as_deref()),
                    match order.feedback_rating {
                        Some(r) => libsql::Value::Integer(r as i64),
                        None => libsql::Value::Null,
                    },
                    opt_text(order.feedback_text.as_deref()),
                    fmt_ts(&order.created_at),
                    opt_ts(&order.payment_reminder_1_sent_at),
                    opt_ts(&order.payment_reminder_2_sent_at),
                    opt_ts(&order.shipped_at),
                    opt_ts(&order.delivered_at),
                    opt_ts(&order.last_customer_reply_at),
                    order.version,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Constraint(e.to_string()))?;
        debug!(id = %order.id, "Order inserted");
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, DatabaseError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
        let mut rows = self
            .conn()
            .query(&sql, params![id.to_string()])
            .await
            .map_err(query_err)?;
        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_order(&row)?)),
            None => Ok(None),
        }
    }

    async fn save_order(&self, order: &mut Order) -> Result<(), DatabaseError> {
        let expected = order.version;
        let affected = self
            .conn()
            .execute(
                "UPDATE orders SET status = ?1, payment_status = ?2, automation_enabled = ?3, \
                 sentiment = ?4, product_name = ?5, amount = ?6, tracking_id = ?7, carrier = ?8, \
                 feedback_rating = ?9, feedback_text = ?10, payment_reminder_1_sent_at = ?11, \
                 payment_reminder_2_sent_at = ?12, shipped_at = ?13, delivered_at = ?14, \
                 last_customer_reply_at = ?15, version = version + 1 \
                 WHERE id = ?16 AND version = ?17",
                params![
                    order.status.as_str(),
                    order.payment_status.as_str(),
                    order.automation_enabled as i64,
                    order.sentiment.as_str(),
                    opt_text(order.product_name.as_deref()),
                    opt_text(order.amount.map(|a| a.to_string()).as_deref()),
                    opt_text(order.tracking_id.as_deref()),
                    opt_text(order.carrier.as_deref()),
                    match order.feedback_rating {
                        Some(r) => libsql::Value::Integer(r as i64),
                        None => libsql::Value::Null,
                    },
                    opt_text(order.feedback_text.as_deref()),
                    opt_ts(&order.payment_reminder_1_sent_at),
                    opt_ts(&order.payment_reminder_2_sent_at),
                    opt_ts(&order.shipped_at),
                    opt_ts(&order.delivered_at),
                    opt_ts(&order.last_customer_reply_at),
                    order.id.to_string(),
                    expected,
                ],
            )
            .await
            .map_err(query_err)?;

        if affected == 0 {
            return Err(DatabaseError::Conflict {
                id: order.id,
                expected,
            });
        }

        order.version = expected + 1;
        debug!(id = %order.id, version = order.version, "Order saved");
        Ok(())
    }

    async fn latest_order_for_user(&self, user_id: Uuid) -> Result<Option<Order>, DatabaseError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = ?1 \
             ORDER BY created_at DESC LIMIT 1"
        );
        let mut rows = self
            .conn()
            .query(&sql, params![user_id.to_string()])
            .await
            .map_err(query_err)?;
        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_order(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_orders(&self, skip: usize, limit: usize) -> Result<Vec<Order>, DatabaseError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC LIMIT ?1 OFFSET ?2"
        );
        let rows = self
            .conn()
            .query(&sql, params![limit as i64, skip as i64])
            .await
            .map_err(query_err)?;
        collect_orders(rows).await
    }

    async fn find_reminder_candidates(
        &self,
        stage: ReminderStage,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<Order>, DatabaseError> {
        let marker_column = match stage {
            ReminderStage::First => "payment_reminder_1_sent_at",
            ReminderStage::Second => "payment_reminder_2_sent_at",
        };
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE payment_status = 'PENDING' AND automation_enabled = 1 \
               AND {marker_column} IS NULL \
               AND created_at >= ?1 AND created_at <= ?2 \
             ORDER BY created_at ASC"
        );
        let rows = self
            .conn()
            .query(&sql, params![fmt_ts(&window_start), fmt_ts(&window_end)])
            .await
            .map_err(query_err)?;
        collect_orders(rows).await
    }

    async fn find_escalation_candidates(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Order>, DatabaseError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE automation_enabled = 1 \
               AND created_at < ?1 \
               AND last_customer_reply_at IS NULL \
             ORDER BY created_at ASC"
        );
        let rows = self
            .conn()
            .query(&sql, params![fmt_ts(&cutoff)])
            .await
            .map_err(query_err)?;
        collect_orders(rows).await
    }

    async fn insert_message_log(&self, entry: &MessageLog) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO message_logs (id, order_id, message_type, content, is_incoming, \
                 sentiment, provider_message_id, sent_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    entry.id.to_string(),
                    entry.order_id.to_string(),
                    entry.message_type.as_str(),
                    entry.content.clone(),
                    entry.is_incoming as i64,
                    opt_text(entry.sentiment.map(|s| s.as_str())),
                    opt_text(entry.provider_message_id.as_deref()),
                    fmt_ts(&entry.sent_at),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Constraint(e.to_string()))?;
        debug!(id = %entry.id, order_id = %entry.order_id, "Message logged");
        Ok(())
    }

    async fn list_message_logs(
        &self,
        order_id: Option<Uuid>,
        limit: usize,
    ) -> Result<Vec<MessageLog>, DatabaseError> {
        let mut rows = match order_id {
            Some(order_id) => {
                let sql = format!(
                    "SELECT {MESSAGE_LOG_COLUMNS} FROM message_logs WHERE order_id = ?1 \
                     ORDER BY sent_at DESC LIMIT ?2"
                );
                self.conn()
                    .query(&sql, params![order_id.to_string(), limit as i64])
                    .await
                    .map_err(query_err)?
            }
            None => {
                let sql = format!(
                    "SELECT {MESSAGE_LOG_COLUMNS} FROM message_logs \
                     ORDER BY sent_at DESC LIMIT ?1"
                );
                self.conn()
                    .query(&sql, params![limit as i64])
                    .await
                    .map_err(query_err)?
            }
        };

        let mut logs = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            logs.push(row_to_message_log(&row)?);
        }
        Ok(logs)
    }

    async fn count_outbound_messages(&self, order_id: Uuid) -> Result<u64, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM message_logs WHERE order_id = ?1 AND is_incoming = 0",
                params![order_id.to_string()],
            )
            .await
            .map_err(query_err)?;
        match rows.next().await.map_err(query_err)? {
            Some(row) => {
                let count: i64 = row.get(0).map_err(query_err)?;
                Ok(count as u64)
            }
            None => Ok(0),
        }
    }

    async fn has_provider_message(
        &self,
        provider_message_id: &str,
    ) -> Result<bool, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM message_logs WHERE provider_message_id = ?1",
                params![provider_message_id],
            )
            .await
            .map_err(query_err)?;
        match rows.next().await.map_err(query_err)? {
            Some(row) => {
                let count: i64 = row.get(0).map_err(query_err)?;
                Ok(count > 0)
            }
            None => Ok(false),
        }
    }

    async fn insert_alert(&self, alert: &Alert) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO alerts (id, order_id, reason, description, resolved, created_at, \
                 resolved_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    alert.id.to_string(),
                    alert.order_id.to_string(),
                    alert.reason.as_str(),
                    alert.description.clone(),
                    alert.resolved as i64,
                    fmt_ts(&alert.created_at),
                    opt_ts(&alert.resolved_at),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Constraint(e.to_string()))?;
        debug!(id = %alert.id, reason = alert.reason.as_str(), "Alert inserted");
        Ok(())
    }

    async fn get_alert(&self, id: Uuid) -> Result<Option<Alert>, DatabaseError> {
        let sql = format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE id = ?1");
        let mut rows = self
            .conn()
            .query(&sql, params![id.to_string()])
            .await
            .map_err(query_err)?;
        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_alert(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_alerts(
        &self,
        resolved: Option<bool>,
        limit: usize,
    ) -> Result<Vec<Alert>, DatabaseError> {
        let mut rows = match resolved {
            Some(resolved) => {
                let sql = format!(
                    "SELECT {ALERT_COLUMNS} FROM alerts WHERE resolved = ?1 \
                     ORDER BY created_at DESC LIMIT ?2"
                );
                self.conn()
                    .query(&sql, params![resolved as i64, limit as i64])
                    .await
                    .map_err(query_err)?
            }
            None => {
                let sql = format!(
                    "SELECT {ALERT_COLUMNS} FROM alerts ORDER BY created_at DESC LIMIT ?1"
                );
                self.conn()
                    .query(&sql, params![limit as i64])
                    .await
                    .map_err(query_err)?
            }
        };

        let mut alerts = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            alerts.push(row_to_alert(&row)?);
        }
        Ok(alerts)
    }

    async fn resolve_alert(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE alerts SET resolved = 1, resolved_at = ?1 WHERE id = ?2 AND resolved = 0",
                params![fmt_ts(&Utc::now()), id.to_string()],
            )
            .await
            .map_err(query_err)?;
        Ok(affected > 0)
    }

    async fn has_open_alert(
        &self,
        order_id: Uuid,
        reason: AlertReason,
    ) -> Result<bool, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM alerts WHERE order_id = ?1 AND reason = ?2 AND resolved = 0",
                params![order_id.to_string(), reason.as_str()],
            )
            .await
            .map_err(query_err)?;
        match rows.next().await.map_err(query_err)? {
            Some(row) => {
                let count: i64 = row.get(0).map_err(query_err)?;
                Ok(count > 0)
            }
            None => Ok(false),
        }
    }

    async fn resolve_alerts_for(
        &self,
        order_id: Uuid,
        reason: AlertReason,
    ) -> Result<usize, DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE alerts SET resolved = 1, resolved_at = ?1 \
                 WHERE order_id = ?2 AND reason = ?3 AND resolved = 0",
                params![
                    fmt_ts(&Utc::now()),
                    order_id.to_string(),
                    reason.as_str()
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(affected as usize)
    }
}

// ── Tests ───────────────────────────────────────────────────────────
