//! The automation engine: status notifications, payment reminders, reply
//! interpretation, and human escalation.
//!
//! One `Engine` owns the trait objects for storage, transport, policy, and
//! tracking; the lifecycle, reply, and scan logic live in submodules as
//! `impl Engine` blocks.

pub mod dispatch;
pub mod lifecycle;
pub mod reminders;
pub mod reply;
pub mod scheduler;
pub mod sync;

use std::sync::Arc;

use rand::Rng;
use tracing::warn;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{DatabaseError, EngineError, Error};
use crate::orders::model::Order;
use crate::policy::Policy;
use crate::store::Storage;
use crate::tracking::Tracking;
use crate::transport::Transport;

pub use reply::{InboundMessage, ReplyDisposition};
pub use scheduler::spawn_scan_tasks;

/// Provider content template SIDs, when configured. Absent templates fall
/// back to personalized free text.
#[derive(Debug, Clone, Default)]
pub struct MessageTemplates {
    pub order_confirmation: Option<String>,
    pub delivery_feedback: Option<String>,
}

pub struct Engine {
    pub(crate) store: Arc<dyn Storage>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) policy: Arc<dyn Policy>,
    pub(crate) tracking: Arc<dyn Tracking>,
    pub(crate) templates: MessageTemplates,
    pub(crate) config: EngineConfig,
}

impl Engine {
    pub fn new(
        store: Arc<dyn Storage>,
        transport: Arc<dyn Transport>,
        policy: Arc<dyn Policy>,
        tracking: Arc<dyn Tracking>,
        templates: MessageTemplates,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            transport,
            policy,
            tracking,
            templates,
            config,
        }
    }

    pub fn store(&self) -> &dyn Storage {
        self.store.as_ref()
    }

    /// Load-mutate-save with bounded retry on version conflicts. The
    /// mutation closure runs against a fresh copy on every attempt.
    pub(crate) async fn save_with_retry<F>(&self, order_id: Uuid, mutate: F) -> Result<Order, Error>
    where
        F: Fn(&mut Order) -> Result<(), EngineError>,
    {
        let mut attempt = 0;
        loop {
            let mut order = self
                .store
                .get_order(order_id)
                .await?
                .ok_or(EngineError::OrderNotFound(order_id))?;

            mutate(&mut order)?;

            match self.store.save_order(&mut order).await {
                Ok(()) => return Ok(order),
                Err(DatabaseError::Conflict { .. }) if attempt + 1 < self.config.save_retry_attempts => {
                    attempt += 1;
                    let jitter = rand::thread_rng().gen_range(10..50);
                    warn!(order_id = %order_id, attempt, "Version conflict, retrying save");
                    tokio::time::sleep(std::time::Duration::from_millis(jitter)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
