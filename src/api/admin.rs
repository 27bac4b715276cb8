//! Admin dashboard endpoints: order overview, message logs, alert queue,
//! and the manual cancellation flow.

use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::api::orders::OrderResponse;
use crate::api::{ApiError, AppState};
use crate::error::DatabaseError;
use crate::store::Storage;

fn default_skip() -> usize {
    0
}
fn default_limit() -> usize {
    50
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_skip")]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

pub async fn list_orders(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.engine.store().list_orders(page.skip, page.limit).await?;

    let mut result = Vec::with_capacity(orders.len());
    for order in &orders {
        let user = state
            .engine
            .store()
            .get_user(order.user_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "user".to_string(),
                id: order.user_id.to_string(),
            })?;
        result.push(OrderResponse::from_parts(order, &user));
    }
    Ok(Json(result))
}

#[derive(Debug, Serialize)]
pub struct MessageLogResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub message_type: String,
    pub message_content: String,
    pub sent_at: DateTime<Utc>,
    pub is_incoming: bool,
    pub sentiment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub order_id: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

pub async fn list_messages(
    State(state): State<AppState>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<Vec<MessageLogResponse>>, ApiError> {
    let logs = state
        .engine
        .store()
        .list_message_logs(query.order_id, query.limit)
        .await?;

    Ok(Json(
        logs.into_iter()
            .map(|log| MessageLogResponse {
                id: log.id,
                order_id: log.order_id,
                message_type: log.message_type.as_str().to_string(),
                message_content: log.content,
                sent_at: log.sent_at,
                is_incoming: log.is_incoming,
                sentiment: log.sentiment.map(|s| s.as_str().to_string()),
            })
            .collect(),
    ))
}

#[derive(Debug, Serialize)]
pub struct AlertResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub reason: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub resolved: bool,
}

#[derive(Debug, Deserialize)]
pub struct AlertsQuery {
    pub resolved: Option<bool>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

pub async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<AlertsQuery>,
) -> Result<Json<Vec<AlertResponse>>, ApiError> {
    let alerts = state
        .engine
        .store()
        .list_alerts(query.resolved, query.limit)
        .await?;

    Ok(Json(
        alerts
            .into_iter()
            .map(|alert| AlertResponse {
                id: alert.id,
                order_id: alert.order_id,
                reason: alert.reason.as_str().to_string(),
                description: alert.description,
                created_at: alert.created_at,
                resolved: alert.resolved,
            })
            .collect(),
    ))
}

pub async fn resolve_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let resolved = state.engine.store().resolve_alert(id).await?;
    if !resolved && state.engine.store().get_alert(id).await?.is_none() {
        return Err(DatabaseError::NotFound {
            entity: "alert".to_string(),
            id: id.to_string(),
        }
        .into());
    }
    Ok(Json(json!({ "message": "Alert resolved", "alert_id": id })))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let (_, alerts_resolved) = state.engine.admin_cancel(id).await?;
    Ok(Json(json!({
        "message": "Order cancelled and customer notified",
        "order_id": id,
        "alerts_resolved": alerts_resolved,
    })))
}

/// Backfill message logs from the provider's history (recovery after
/// downtime).
pub async fn sync_messages(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let count = state.engine.sync_provider_messages(50).await?;
    Ok(Json(json!({
        "message": format!("Successfully synced {count} messages"),
        "count": count,
    })))
}
