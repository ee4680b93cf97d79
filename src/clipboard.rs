use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use image::RgbaImage;

use crate::error::{ClipboardError, CodecError};

/// Raw RGBA8 pixels as handed over by the platform clipboard.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl Bitmap {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Self {
        Self {
            width,
            height,
            rgba,
        }
    }

    /// Checks the buffer against the dimensions and wraps it for the `image` crate.
    pub fn to_image(&self) -> Result<RgbaImage, CodecError> {
        if self.width == 0 || self.height == 0 {
            return Err(CodecError::Malformed(format!(
                "empty bitmap ({}x{})",
                self.width, self.height
            )));
        }
        let expected = self.width as usize * self.height as usize * 4;
        if self.rgba.len() != expected {
            return Err(CodecError::Malformed(format!(
                "{}x{} bitmap carries {} bytes, expected {}",
                self.width,
                self.height,
                self.rgba.len(),
                expected
            )));
        }
        RgbaImage::from_raw(self.width, self.height, self.rgba.clone())
            .ok_or_else(|| CodecError::Malformed("pixel buffer rejected".into()))
    }
}

impl From<RgbaImage> for Bitmap {
    fn from(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(width, height, image.into_raw())
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.rgba.len())
            .finish()
    }
}

/// What a single clipboard sample contained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardContent {
    Empty,
    /// Text, file lists or anything else that is not a bitmap.
    Other,
    Image(Bitmap),
}

/// Platform clipboard capability used by the monitor and the copy commands.
pub trait Clipboard: Send {
    fn read(&mut self) -> Result<ClipboardContent, ClipboardError>;
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError>;
    fn write_image(&mut self, bitmap: &Bitmap) -> Result<(), ClipboardError>;
}

pub type SharedClipboard = Arc<Mutex<dyn Clipboard>>;

/// Locks the shared clipboard; a panic in another holder does not make it unusable.
pub fn lock(clipboard: &SharedClipboard) -> MutexGuard<'_, dyn Clipboard + 'static> {
    clipboard.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Wraps a path in double quotes when it contains whitespace, for pasting into shells.
pub fn quote_path(path: &str) -> String {
    if path.chars().any(char::is_whitespace) {
        format!("\"{path}\"")
    } else {
        path.to_string()
    }
}

/// System clipboard through `arboard`. The handle is kept for the lifetime of
/// the process so text we place on the clipboard stays owned on X11.
pub struct ArboardClipboard {
    inner: arboard::Clipboard,
}

impl ArboardClipboard {
    pub fn new() -> Result<Self, ClipboardError> {
        let inner = arboard::Clipboard::new().map_err(|e| ClipboardError::Access(e.to_string()))?;
        Ok(Self { inner })
    }

    pub fn shared(self) -> SharedClipboard {
        Arc::new(Mutex::new(self))
    }
}

impl Clipboard for ArboardClipboard {
    fn read(&mut self) -> Result<ClipboardContent, ClipboardError> {
        match self.inner.get_image() {
            Ok(image) => Ok(ClipboardContent::Image(Bitmap::new(
                image.width as u32,
                image.height as u32,
                image.bytes.into_owned(),
            ))),
            // Something is there but it is not a bitmap we can use.
            Err(arboard::Error::ConversionFailure) => Ok(ClipboardContent::Other),
            Err(arboard::Error::ContentNotAvailable) => match self.inner.get_text() {
                Ok(_) => Ok(ClipboardContent::Other),
                Err(arboard::Error::ContentNotAvailable) => Ok(ClipboardContent::Empty),
                Err(arboard::Error::ConversionFailure) => Ok(ClipboardContent::Other),
                Err(err) => Err(ClipboardError::Access(err.to_string())),
            },
            Err(err) => Err(ClipboardError::Access(err.to_string())),
        }
    }

    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        self.inner
            .set_text(text.to_string())
            .map_err(|e| ClipboardError::Write(e.to_string()))
    }

    fn write_image(&mut self, bitmap: &Bitmap) -> Result<(), ClipboardError> {
        let data = arboard::ImageData {
            width: bitmap.width as usize,
            height: bitmap.height as usize,
            bytes: Cow::Borrowed(&bitmap.rgba),
        };
        self.inner
            .set_image(data)
            .map_err(|e| ClipboardError::Write(e.to_string()))
    }
}
