//! User operations over the history and toggles. None of them touches the
//! network; copies are served from the payload kept in each record.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::clipboard::{self, quote_path, SharedClipboard};
use crate::codec::decode_jpeg;
use crate::error::CommandError;
use crate::history::HistoryStore;
use crate::models::{RecordSummary, ScreenshotRecord};
use crate::monitor::{MonitorSnapshot, MonitorState};
use crate::{log_debug, log_info};

// Set to true to log every command
const ENABLE_LOGS: bool = true;

#[derive(Clone)]
pub struct Commands {
    state: Arc<MonitorState>,
    history: Arc<HistoryStore>,
    clipboard: SharedClipboard,
    shutdown: CancellationToken,
}

impl Commands {
    pub fn new(
        state: Arc<MonitorState>,
        history: Arc<HistoryStore>,
        clipboard: SharedClipboard,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            state,
            history,
            clipboard,
            shutdown,
        }
    }

    /// Returns whether monitoring is now on.
    pub fn toggle_monitoring(&self) -> bool {
        let enabled = self.state.toggle_monitoring();
        log_info!("monitoring {}", if enabled { "resumed" } else { "paused" });
        enabled
    }

    /// Returns whether auto-copy is now on.
    pub fn toggle_auto_copy(&self) -> bool {
        let enabled = self.state.toggle_auto_copy();
        log_info!("auto-copy {}", if enabled { "enabled" } else { "disabled" });
        enabled
    }

    /// Forgets the newest record. The remote file stays.
    pub fn delete_last(&self) -> Option<u64> {
        let removed = self.history.remove_last()?;
        log_info!("removed #{} from history", removed.id);
        Some(removed.id)
    }

    pub fn delete_all(&self) -> Vec<u64> {
        let ids: Vec<u64> = self.history.remove_all().iter().map(|r| r.id).collect();
        log_info!("cleared {} records from history", ids.len());
        ids
    }

    /// Copies the remote path, quoted when it has whitespace. Returns the text copied.
    pub fn copy_path(&self, id: u64) -> Result<String, CommandError> {
        let record = self.record(id)?;
        let text = quote_path(&record.remote_path);
        clipboard::lock(&self.clipboard).write_text(&text)?;
        log_debug!("copied path of #{}", id);
        Ok(text)
    }

    /// Copies the transferred JPEG as base64 text. Returns the text length.
    pub fn copy_base64(&self, id: u64) -> Result<usize, CommandError> {
        let record = self.record(id)?;
        let encoded = record.base64_payload();
        clipboard::lock(&self.clipboard).write_text(&encoded)?;
        log_debug!("copied base64 of #{} ({} chars)", id, encoded.len());
        Ok(encoded.len())
    }

    /// Puts the transferred image itself back on the clipboard.
    pub fn copy_image(&self, id: u64) -> Result<(), CommandError> {
        let record = self.record(id)?;
        let bitmap = decode_jpeg(record.payload())?;
        clipboard::lock(&self.clipboard).write_image(&bitmap)?;
        log_debug!("copied image of #{}", id);
        Ok(())
    }

    /// Every remote path, newest first, each quoted when needed, joined by spaces.
    pub fn copy_all_paths(&self) -> Result<usize, CommandError> {
        let records = self.history.list();
        if records.is_empty() {
            return Err(CommandError::Empty);
        }
        let text = records
            .iter()
            .rev()
            .map(|r| quote_path(&r.remote_path))
            .collect::<Vec<_>>()
            .join(" ");
        clipboard::lock(&self.clipboard).write_text(&text)?;
        log_debug!("copied {} paths", records.len());
        Ok(records.len())
    }

    pub fn list(&self) -> Vec<RecordSummary> {
        self.history.list().iter().map(|r| r.summary()).collect()
    }

    pub fn status(&self) -> MonitorSnapshot {
        self.state.snapshot()
    }

    pub fn last(&self) -> Option<RecordSummary> {
        self.history.last().map(|r| r.summary())
    }

    /// Stops the monitor loop after its current cycle.
    pub fn quit(&self) {
        log_info!("quit requested");
        self.shutdown.cancel();
    }

    pub fn is_quitting(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    fn record(&self, id: u64) -> Result<Arc<ScreenshotRecord>, CommandError> {
        self.history.get(id).ok_or(CommandError::NotFound(id))
    }
}
