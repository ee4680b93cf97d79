use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Local;

use crate::clipboard::{self, quote_path, Bitmap, ClipboardContent, SharedClipboard};
use crate::codec::{encode_jpeg, thumbnail, ImageCodec, DEFAULT_QUALITY, DEFAULT_THUMBNAIL_SIZE};
use crate::error::TransferError;
use crate::history::HistoryStore;
use crate::models::NewRecord;
use crate::notify::{FailureStage, Notice, Notifier};
use crate::transfer::Uploader;
use crate::{log_debug, log_error, log_info, log_warn};

use super::fingerprint::fingerprint;
use super::state::{MonitorPhase, MonitorState};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleConfig {
    pub quality: u8,
    pub thumbnail_size: u32,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Monitoring is off; the clipboard was not touched.
    Skipped,
    Unchanged,
    /// The clipboard changed to something that is not an image.
    Ignored,
    Uploaded(u64),
    Failed(FailureStage),
    ClipboardUnavailable,
    /// A connection-level failure switched monitoring off.
    Paused,
}

/// One poll of the clipboard and, when a new image shows up, its upload.
/// Blocking throughout; the loop runs it on the blocking pool.
pub struct CaptureCycle {
    state: Arc<MonitorState>,
    history: Arc<HistoryStore>,
    clipboard: SharedClipboard,
    uploader: Mutex<Box<dyn Uploader>>,
    notifier: Arc<dyn Notifier>,
    codec: ImageCodec,
    config: CycleConfig,
    clipboard_failing: AtomicBool,
}

impl CaptureCycle {
    pub fn new(
        state: Arc<MonitorState>,
        history: Arc<HistoryStore>,
        clipboard: SharedClipboard,
        uploader: Box<dyn Uploader>,
        notifier: Arc<dyn Notifier>,
        config: CycleConfig,
    ) -> Self {
        Self {
            state,
            history,
            clipboard,
            uploader: Mutex::new(uploader),
            notifier,
            codec: ImageCodec::new(),
            config,
            clipboard_failing: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> &Arc<MonitorState> {
        &self.state
    }

    pub fn run(&self) -> CycleOutcome {
        if !self.state.monitoring_enabled() {
            self.state.set_phase(MonitorPhase::Paused);
            return CycleOutcome::Skipped;
        }

        let outcome = self.poll();
        // A toggle made during the upload takes effect here.
        self.state.set_phase(if self.state.monitoring_enabled() {
            MonitorPhase::Polling
        } else {
            MonitorPhase::Paused
        });
        outcome
    }

    fn poll(&self) -> CycleOutcome {
        let read = clipboard::lock(&self.clipboard).read();
        let content = match read {
            Ok(content) => {
                if self.clipboard_failing.swap(false, Ordering::SeqCst) {
                    log_info!("clipboard is readable again");
                }
                content
            }
            Err(err) => {
                if !self.clipboard_failing.swap(true, Ordering::SeqCst) {
                    log_warn!("clipboard read failed: {err}");
                    self.notifier.notify(Notice::ClipboardUnavailable {
                        reason: err.to_string(),
                    });
                } else {
                    log_debug!("clipboard still unavailable: {err}");
                }
                return CycleOutcome::ClipboardUnavailable;
            }
        };

        let current = fingerprint(&content);
        if current == self.state.last_fingerprint() {
            return CycleOutcome::Unchanged;
        }
        // Advanced before uploading so a failed capture is not retried next tick.
        self.state.set_last_fingerprint(current);

        let ClipboardContent::Image(bitmap) = content else {
            log_debug!("clipboard changed to non-image content");
            return CycleOutcome::Ignored;
        };

        log_info!(
            "new clipboard image {} ({}x{})",
            current.short(),
            bitmap.width,
            bitmap.height
        );
        self.state.set_phase(MonitorPhase::Uploading);
        self.upload(&bitmap)
    }

    fn upload(&self, bitmap: &Bitmap) -> CycleOutcome {
        let captured_at = Local::now();
        let filename = self.codec.next_filename(captured_at);

        let encoded = encode_jpeg(bitmap, self.config.quality).and_then(|bytes| {
            let thumb = thumbnail(bitmap, self.config.thumbnail_size)?;
            Ok((bytes, thumb))
        });
        let (bytes, thumb) = match encoded {
            Ok(encoded) => encoded,
            Err(err) => return self.fail(FailureStage::Encode, filename, err.to_string()),
        };

        let put = self
            .uploader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put_atomic(&bytes, &filename);
        let remote_path = match put {
            Ok(path) => path,
            Err(err) if err.is_fatal() => return self.pause(&filename, err),
            Err(err) => return self.fail(FailureStage::Transfer, filename, err.to_string()),
        };

        let record = self.history.append(NewRecord {
            filename,
            thumbnail: thumb,
            remote_path,
            created_at: captured_at,
            payload: bytes,
        });

        let path_copied = self.state.auto_copy_enabled() && self.copy_path(&record.remote_path);
        log_info!(
            "#{} {} uploaded ({})",
            record.id,
            record.remote_path,
            record.size_label()
        );
        self.notifier.notify(Notice::Uploaded {
            id: record.id,
            filename: record.filename.clone(),
            remote_path: record.remote_path.clone(),
            size_bytes: record.size_bytes,
            path_copied,
        });
        CycleOutcome::Uploaded(record.id)
    }

    fn copy_path(&self, remote_path: &str) -> bool {
        match clipboard::lock(&self.clipboard).write_text(&quote_path(remote_path)) {
            Ok(()) => true,
            Err(err) => {
                log_warn!("could not copy {} to the clipboard: {err}", remote_path);
                false
            }
        }
    }

    fn fail(&self, stage: FailureStage, filename: String, reason: String) -> CycleOutcome {
        log_warn!("{stage} failed for {}: {reason}", filename);
        self.notifier.notify(Notice::UploadFailed {
            stage,
            filename,
            reason,
        });
        CycleOutcome::Failed(stage)
    }

    fn pause(&self, filename: &str, err: TransferError) -> CycleOutcome {
        log_error!("pausing monitoring, {} was not uploaded: {err}", filename);
        self.state.set_monitoring(false);
        self.notifier.notify(Notice::MonitoringPaused {
            reason: err.to_string(),
        });
        CycleOutcome::Paused
    }
}
