use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::cycle::CaptureCycle;
use super::loop_worker::monitor_loop;

/// Owns the background polling task.
pub struct MonitorController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl MonitorController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    /// Spawns the loop. Cancelling `cancel_token` (or calling [`stop`]) ends it.
    ///
    /// [`stop`]: MonitorController::stop
    pub fn start(
        &mut self,
        cycle: Arc<CaptureCycle>,
        interval: Duration,
        cancel_token: CancellationToken,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("monitor already running");
        }

        info!("starting clipboard monitor");
        let handle = tokio::spawn(monitor_loop(cycle, interval, cancel_token.clone()));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cancels the loop and waits for the in-flight cycle to drain. Stopping a
    /// controller that never started is a no-op.
    pub async fn stop(&mut self) -> Result<()> {
        let token = self.cancel_token.take();
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        token.unwrap_or_default().cancel();

        let was_running = !handle.is_finished();
        handle.await.context("monitor loop panicked")?;
        info!(
            "clipboard monitor stopped{}",
            if was_running { "" } else { " (loop had already exited)" }
        );
        Ok(())
    }
}

impl Default for MonitorController {
    fn default() -> Self {
        Self::new()
    }
}
