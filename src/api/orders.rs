//! Order endpoints: creation and lifecycle transitions.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::api::{ApiError, AppState};
use crate::error::EngineError;
use crate::orders::model::{Order, User};
use crate::store::Storage;

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub name: String,
    /// WhatsApp number with country code, e.g. `+1234567890`.
    pub whatsapp_number: String,
    pub product_name: Option<String>,
    pub amount: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub user_name: String,
    pub whatsapp_number: String,
    pub status: String,
    pub payment_status: String,
    pub automation_enabled: bool,
    pub sentiment: String,
    pub product_name: Option<String>,
    pub amount: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub feedback_rating: Option<u8>,
    pub feedback_text: Option<String>,
}

impl OrderResponse {
    pub(crate) fn from_parts(order: &Order, user: &User) -> Self {
        Self {
            id: order.id,
            user_name: user.name.clone(),
            whatsapp_number: user.whatsapp_number.clone(),
            status: order.status.to_string(),
            payment_status: order.payment_status.to_string(),
            automation_enabled: order.automation_enabled,
            sentiment: order.sentiment.as_str().to_string(),
            product_name: order.product_name.clone(),
            amount: order.amount,
            created_at: order.created_at,
            feedback_rating: order.feedback_rating,
            feedback_text: order.feedback_text.clone(),
        }
    }
}

pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let (order, user) = state
        .engine
        .create_order(
            &request.name,
            &request.whatsapp_number,
            request.product_name,
            request.amount,
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(OrderResponse::from_parts(&order, &user)),
    ))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .engine
        .store()
        .get_order(id)
        .await?
        .ok_or(EngineError::OrderNotFound(id))?;
    let user = state
        .engine
        .store()
        .get_user(order.user_id)
        .await?
        .ok_or(EngineError::UserNotFound(order.user_id))?;
    Ok(Json(OrderResponse::from_parts(&order, &user)))
}

#[derive(Debug, Deserialize)]
pub struct PaymentQuery {
    pub paid: bool,
}

pub async fn update_payment_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<PaymentQuery>,
) -> Result<Json<Value>, ApiError> {
    state.engine.confirm_payment(id, query.paid).await?;
    let message = if query.paid {
        "Payment marked as paid"
    } else {
        "Payment marked as failed"
    };
    Ok(Json(json!({ "message": message, "order_id": id })))
}

pub async fn mark_in_process(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    state.engine.mark_in_process(id).await?;
    Ok(Json(
        json!({ "message": "Order marked as in process", "order_id": id }),
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct ShipQuery {
    pub tracking_id: Option<String>,
    pub carrier: Option<String>,
}

pub async fn mark_shipped(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ShipQuery>,
) -> Result<Json<Value>, ApiError> {
    state
        .engine
        .mark_shipped(id, query.tracking_id, query.carrier)
        .await?;
    Ok(Json(
        json!({ "message": "Order marked as shipped", "order_id": id }),
    ))
}

pub async fn mark_out_for_delivery(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    state.engine.mark_out_for_delivery(id).await?;
    Ok(Json(
        json!({ "message": "Order marked as out for delivery", "order_id": id }),
    ))
}

pub async fn mark_delivered(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    state.engine.mark_delivered(id).await?;
    Ok(Json(
        json!({ "message": "Order marked as delivered", "order_id": id }),
    ))
}
