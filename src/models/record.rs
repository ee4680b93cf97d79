use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Local};
use image::RgbaImage;
use serde::Serialize;

/// Upload result as produced by the monitor, before the history assigns an id.
pub struct NewRecord {
    pub filename: String,
    pub thumbnail: RgbaImage,
    pub remote_path: String,
    pub created_at: DateTime<Local>,
    pub payload: Vec<u8>,
}

/// One uploaded screenshot. Immutable once appended to the history.
pub struct ScreenshotRecord {
    pub id: u64,
    pub filename: String,
    pub thumbnail: RgbaImage,
    pub remote_path: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Local>,
    /// Exact bytes that were transferred; kept so copies never touch the network.
    payload: Arc<[u8]>,
}

impl ScreenshotRecord {
    pub(crate) fn from_new(id: u64, new: NewRecord) -> Self {
        Self {
            id,
            filename: new.filename,
            thumbnail: new.thumbnail,
            remote_path: new.remote_path,
            size_bytes: new.payload.len() as u64,
            created_at: new.created_at,
            payload: Arc::from(new.payload),
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Base64 of the transferred JPEG, computed on every call.
    pub fn base64_payload(&self) -> String {
        STANDARD.encode(&self.payload)
    }

    pub fn size_label(&self) -> String {
        format!("{:.1} KB", self.size_bytes as f64 / 1024.0)
    }

    pub fn summary(&self) -> RecordSummary {
        RecordSummary {
            id: self.id,
            filename: self.filename.clone(),
            remote_path: self.remote_path.clone(),
            size_bytes: self.size_bytes,
            size_label: self.size_label(),
            created_at: self.created_at,
        }
    }
}

impl fmt::Debug for ScreenshotRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScreenshotRecord")
            .field("id", &self.id)
            .field("filename", &self.filename)
            .field("remote_path", &self.remote_path)
            .field("size_bytes", &self.size_bytes)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Serializable view of a record for surfaces that only need text.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecordSummary {
    pub id: u64,
    pub filename: String,
    pub remote_path: String,
    pub size_bytes: u64,
    pub size_label: String,
    pub created_at: DateTime<Local>,
}
