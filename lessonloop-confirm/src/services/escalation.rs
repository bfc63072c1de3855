//! Auto-escalation scheduler
//!
//! Runs the sweep on a fixed interval in-process, alongside the external
//! POST /sweep trigger. Both paths share the same atomic select+update, so
//! overlapping runs claim disjoint lessons and a quiet run is a no-op.

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::services::ConfirmationService;

/// Periodic sweep loop, spawned from main
pub async fn run_scheduler(service: Arc<ConfirmationService>, interval_minutes: i64) {
    let period = Duration::from_secs((interval_minutes.max(1) as u64) * 60);
    info!(
        "Escalation scheduler running every {} minute(s)",
        interval_minutes.max(1)
    );

    let mut ticker = tokio::time::interval(period);
    // First tick fires immediately; sweep once at startup to catch lessons
    // that went stale while the service was down
    loop {
        ticker.tick().await;
        match service.run_sweep().await {
            Ok(outcome) if outcome.auto_acknowledged_count > 0 => {
                info!(
                    "Scheduled sweep auto-acknowledged {} lesson(s)",
                    outcome.auto_acknowledged_count
                );
            }
            Ok(_) => {}
            Err(e) => {
                error!("Scheduled sweep failed: {}", e);
            }
        }
    }
}
