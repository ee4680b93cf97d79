use std::sync::Arc;

use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::cycle::CaptureCycle;
use super::state::MonitorPhase;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Ticks until `cancel_token` fires. Each cycle is awaited before the next
/// tick, so a cycle in progress always completes before the loop exits.
pub async fn monitor_loop(
    cycle: Arc<CaptureCycle>,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let state = Arc::clone(cycle.state());
    state.set_phase(if state.monitoring_enabled() {
        MonitorPhase::Polling
    } else {
        MonitorPhase::Paused
    });
    log_info!("monitor loop started (every {}ms)", interval.as_millis());

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let worker = Arc::clone(&cycle);
                match tokio::task::spawn_blocking(move || worker.run()).await {
                    Ok(outcome) => log_debug!("cycle finished: {outcome:?}"),
                    Err(err) => log_error!("capture cycle worker failed: {err}"),
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("monitor loop shutting down");
                break;
            }
        }
    }

    state.set_phase(MonitorPhase::Idle);
}
