//! Error types for Order Assist.

use uuid::Uuid;

use crate::orders::model::OrderStatus;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Version conflict saving order {id}: expected version {expected}")]
    Conflict { id: Uuid, expected: i64 },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Outbound messaging transport errors.
///
/// These never propagate past the dispatcher boundary as lifecycle
/// failures; a failed send is logged and the operation continues.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Send to {to} failed: {reason}")]
    SendFailed { to: String, reason: String },

    #[error("Transport request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Invalid outbound message: {0}")]
    InvalidMessage(String),
}

/// Order automation engine errors, surfaced to administrative callers.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Order {0} not found")]
    OrderNotFound(Uuid),

    #[error("User {0} not found")]
    UserNotFound(Uuid),

    #[error("Order {id} is {status}, cannot apply {event}")]
    InvalidTransition {
        id: Uuid,
        status: OrderStatus,
        event: &'static str,
    },
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
