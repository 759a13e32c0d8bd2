//! Binary attachments (one image or one audio clip per request)

use std::path::Path;

use crate::{KotobaError, Result};

/// Mime type used for every recorded clip.
pub const AUDIO_WAV: &str = "audio/wav";

/// What an attachment contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaKind {
    /// A photo or screenshot with its declared image mime type.
    Image { mime: String },
    /// A recorded clip, always WAV.
    Audio,
}

/// A single binary payload embedded in a generation request.
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    pub kind: MediaKind,
    pub bytes: Vec<u8>,
}

impl Attachment {
    /// An image with an explicit mime type (`image/png`, `image/jpeg`, ...).
    pub fn image(bytes: impl Into<Vec<u8>>, mime: impl Into<String>) -> Self {
        Self {
            kind: MediaKind::Image { mime: mime.into() },
            bytes: bytes.into(),
        }
    }

    /// A WAV recording.
    pub fn wav(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: MediaKind::Audio,
            bytes: bytes.into(),
        }
    }

    /// Read an image from disk, deriving the mime type from the extension.
    pub fn image_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mime = image_mime_for(path).ok_or_else(|| {
            KotobaError::InvalidInput(format!("unsupported image type: {}", path.display()))
        })?;
        let bytes = std::fs::read(path)?;
        Ok(Self::image(bytes, mime))
    }

    /// Read a WAV recording from disk.
    pub fn wav_from_path(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::wav(std::fs::read(path)?))
    }

    /// Declared mime type sent alongside the bytes.
    pub fn mime_type(&self) -> &str {
        match &self.kind {
            MediaKind::Image { mime } => mime,
            MediaKind::Audio => AUDIO_WAV,
        }
    }

    pub fn is_audio(&self) -> bool {
        self.kind == MediaKind::Audio
    }
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("mime", &self.mime_type())
            .field("len", &self.bytes.len())
            .finish()
    }
}

fn image_mime_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        _ => None,
    }
}
