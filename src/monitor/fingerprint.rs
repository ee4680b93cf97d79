use std::fmt;

use sha2::{Digest, Sha256};

use crate::clipboard::{Bitmap, ClipboardContent};

/// Identity of a clipboard sample, used only to notice changes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Fingerprint {
    /// No image on the clipboard (nothing at all, or text and the like).
    #[default]
    Empty,
    Image([u8; 32]),
}

impl Fingerprint {
    pub fn is_empty(&self) -> bool {
        matches!(self, Fingerprint::Empty)
    }

    /// First 12 hex digits, enough to tell captures apart in logs.
    pub fn short(&self) -> String {
        match self {
            Fingerprint::Empty => "empty".to_string(),
            Fingerprint::Image(digest) => hex::encode(&digest[..6]),
        }
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}

pub fn fingerprint(content: &ClipboardContent) -> Fingerprint {
    match content {
        ClipboardContent::Image(bitmap) => fingerprint_bitmap(bitmap),
        ClipboardContent::Empty | ClipboardContent::Other => Fingerprint::Empty,
    }
}

/// Dimensions are hashed too so that a 2x8 and a 4x4 bitmap with the same
/// bytes do not collide.
pub fn fingerprint_bitmap(bitmap: &Bitmap) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(bitmap.width.to_le_bytes());
    hasher.update(bitmap.height.to_le_bytes());
    hasher.update(&bitmap.rgba);
    Fingerprint::Image(hasher.finalize().into())
}
