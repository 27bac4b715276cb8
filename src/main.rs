use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use order_assist::api;
use order_assist::config::{EngineConfig, PolicyConfig, TwilioConfig};
use order_assist::engine::{Engine, MessageTemplates, spawn_scan_tasks};
use order_assist::policy::{LlmPolicy, Policy, StaticPolicy};
use order_assist::store::LibsqlStorage;
use order_assist::tracking::MockTracking;
use order_assist::transport::{ConsoleTransport, Transport, TwilioTransport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = EngineConfig::from_env();

    let db_path = std::env::var("ORDER_ASSIST_DB_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data/order_assist.db"));
    let store = Arc::new(
        LibsqlStorage::new_local(&db_path)
            .await
            .context("Failed to open database")?,
    );

    let twilio = TwilioConfig::from_env();
    let templates = twilio
        .as_ref()
        .map(|t| MessageTemplates {
            order_confirmation: t.order_confirmation_template.clone(),
            delivery_feedback: t.delivery_feedback_template.clone(),
        })
        .unwrap_or_default();
    let transport: Arc<dyn Transport> = match twilio {
        Some(twilio) => {
            info!("Using Twilio WhatsApp transport");
            Arc::new(
                TwilioTransport::new(twilio, config.transport_timeout)
                    .context("Failed to build Twilio transport")?,
            )
        }
        None => {
            info!("No Twilio credentials, using console transport");
            Arc::new(ConsoleTransport)
        }
    };

    let policy: Arc<dyn Policy> = match PolicyConfig::from_env() {
        Some(policy) => {
            info!(model = policy.model, "Using LLM message policy");
            Arc::new(LlmPolicy::new(policy, config.policy_timeout))
        }
        None => {
            info!("No LLM configured, using static message policy");
            Arc::new(StaticPolicy)
        }
    };

    let engine = Arc::new(Engine::new(
        store,
        transport,
        policy,
        Arc::new(MockTracking),
        templates,
        config,
    ));

    let scan_tasks = spawn_scan_tasks(engine.clone());

    let addr = std::env::var("ORDER_ASSIST_LISTEN").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr, "Order Assist listening");

    axum::serve(listener, api::router(engine))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
        .context("Server error")?;

    for task in scan_tasks {
        task.abort();
    }
    Ok(())
}
