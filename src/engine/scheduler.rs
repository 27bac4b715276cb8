//! Background scan loops.
//!
//! Three fixed-interval tasks: the fast first-reminder scan, the hourly
//! final-reminder scan, and the escalation scan. Each pass is independent
//! and idempotent, so a missed tick is just delayed work.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::engine::Engine;
use crate::store::ReminderStage;

/// Spawn the three periodic scan tasks. The handles are returned so the
/// caller can abort them on shutdown.
pub fn spawn_scan_tasks(engine: Arc<Engine>) -> Vec<JoinHandle<()>> {
    let config = &engine.config;
    info!(
        fast_secs = config.fast_scan_interval.as_secs(),
        slow_secs = config.slow_scan_interval.as_secs(),
        escalation_secs = config.escalation_scan_interval.as_secs(),
        "Starting scan tasks"
    );

    vec![
        spawn_loop(
            engine.clone(),
            config.fast_scan_interval,
            "reminder_1_scan",
            |engine| async move { engine.run_reminder_scan(ReminderStage::First).await },
        ),
        spawn_loop(
            engine.clone(),
            config.slow_scan_interval,
            "reminder_2_scan",
            |engine| async move { engine.run_reminder_scan(ReminderStage::Second).await },
        ),
        spawn_loop(
            engine.clone(),
            config.escalation_scan_interval,
            "escalation_scan",
            |engine| async move { engine.run_escalation_scan().await },
        ),
    ]
}

fn spawn_loop<F, Fut>(
    engine: Arc<Engine>,
    period: Duration,
    name: &'static str,
    scan: F,
) -> JoinHandle<()>
where
    F: Fn(Arc<Engine>) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = usize> + Send,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let acted_on = scan(engine.clone()).await;
            debug!(scan = name, acted_on, "Scan pass complete");
        }
    })
}
