//! HTTP surface: order operations, the provider webhook, and the admin
//! dashboard API.

pub mod admin;
pub mod orders;
pub mod webhooks;

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::engine::Engine;
use crate::error::{DatabaseError, EngineError, Error};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

pub fn router(engine: Arc<Engine>) -> Router {
    let state = AppState { engine };

    Router::new()
        .route("/api/orders", post(orders::create_order))
        .route("/api/orders/{id}", get(orders::get_order))
        .route(
            "/api/orders/{id}/payment-status",
            patch(orders::update_payment_status),
        )
        .route("/api/orders/{id}/process", patch(orders::mark_in_process))
        .route("/api/orders/{id}/ship", patch(orders::mark_shipped))
        .route(
            "/api/orders/{id}/out-for-delivery",
            patch(orders::mark_out_for_delivery),
        )
        .route("/api/orders/{id}/deliver", patch(orders::mark_delivered))
        .route(
            "/api/webhooks/whatsapp",
            post(webhooks::handle_whatsapp).get(webhooks::verify_whatsapp),
        )
        .route("/api/admin/orders", get(admin::list_orders))
        .route("/api/admin/messages", get(admin::list_messages))
        .route("/api/admin/alerts", get(admin::list_alerts))
        .route(
            "/api/admin/alerts/{id}/resolve",
            patch(admin::resolve_alert),
        )
        .route("/api/admin/orders/{id}/cancel", patch(admin::cancel_order))
        .route("/api/admin/sync-messages", post(admin::sync_messages))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Error wrapper mapping engine errors onto HTTP statuses.
pub struct ApiError(pub Error);

impl<E: Into<Error>> From<E> for ApiError {
    fn from(e: E) -> Self {
        ApiError(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Engine(EngineError::OrderNotFound(_))
            | Error::Engine(EngineError::UserNotFound(_))
            | Error::Database(DatabaseError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Error::Engine(EngineError::InvalidTransition { .. }) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = axum::Json(json!({ "detail": self.0.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn error_statuses() {
        let not_found: ApiError = EngineError::OrderNotFound(Uuid::new_v4()).into();
        assert_eq!(
            not_found.into_response().status(),
            StatusCode::NOT_FOUND
        );

        let bad: ApiError = EngineError::InvalidTransition {
            id: Uuid::new_v4(),
            status: crate::orders::model::OrderStatus::Cancelled,
            event: "ship",
        }
        .into();
        assert_eq!(bad.into_response().status(), StatusCode::BAD_REQUEST);

        let internal: ApiError = DatabaseError::Query("boom".into()).into();
        assert_eq!(
            internal.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
