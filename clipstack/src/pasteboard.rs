//! Pasteboard access behind a trait seam.
//!
//! [`SystemPasteboard`] wraps `arboard`. The OS pasteboard has no portable
//! change counter, so one is derived from a fingerprint of the current
//! content; the poller only cares that the counter changes when the content
//! does. [`MemoryPasteboard`] is the in-process fake the tests drive.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::Cursor;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::trace;

#[derive(Error, Debug)]
pub enum PasteboardError {
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),
    #[error("image codec error: {0}")]
    ImageCodec(String),
}

pub type PasteboardResult<T> = Result<T, PasteboardError>;

/// What the pasteboard holds. Images are normalized to PNG bytes so the
/// payload stays self-describing in storage and backups; file items carry
/// their `file://` URL rather than the display path.
#[derive(Debug, Clone, PartialEq)]
pub enum CapturedContent {
    Text(String),
    Image(Vec<u8>),
    FileUrl(String),
}

/// The pasteboard surface the poller and paste injector share.
pub trait Pasteboard: Send + Sync {
    /// Monotonically observable change marker. Two calls return different
    /// values iff the pasteboard content changed between them.
    fn change_count(&self) -> u64;

    /// Read the current content, image first then text. `None` when the
    /// pasteboard holds neither.
    fn read(&self) -> PasteboardResult<Option<CapturedContent>>;

    /// Replace the pasteboard content.
    fn write(&self, content: &CapturedContent) -> PasteboardResult<()>;
}

/// Fingerprint of the raw pasteboard state. Hashes the image bytes as the
/// OS hands them over, without transcoding, so the poller tick stays cheap.
fn raw_fingerprint(image: Option<&arboard::ImageData<'_>>, text: Option<&str>) -> u64 {
    let mut hasher = DefaultHasher::new();
    if let Some(image) = image {
        2u8.hash(&mut hasher);
        image.width.hash(&mut hasher);
        image.height.hash(&mut hasher);
        image.bytes.hash(&mut hasher);
    } else if let Some(text) = text {
        1u8.hash(&mut hasher);
        text.hash(&mut hasher);
    } else {
        0u8.hash(&mut hasher);
    }
    hasher.finish()
}

/// Real pasteboard backed by `arboard`.
///
/// `arboard::Clipboard` is not `Sync`, so the handle sits behind a mutex.
pub struct SystemPasteboard {
    inner: Mutex<arboard::Clipboard>,
}

impl SystemPasteboard {
    pub fn new() -> PasteboardResult<Self> {
        let clipboard =
            arboard::Clipboard::new().map_err(|e| PasteboardError::Unavailable(e.to_string()))?;
        Ok(Self {
            inner: Mutex::new(clipboard),
        })
    }

    fn read_locked(
        clipboard: &mut arboard::Clipboard,
    ) -> PasteboardResult<Option<CapturedContent>> {
        // Image takes precedence: a copied image often carries a text
        // representation too.
        if let Ok(image) = clipboard.get_image() {
            let png = encode_png(&image)?;
            return Ok(Some(CapturedContent::Image(png)));
        }
        match clipboard.get_text() {
            Ok(text) if !text.is_empty() => Ok(Some(CapturedContent::Text(text))),
            _ => Ok(None),
        }
    }
}

impl Pasteboard for SystemPasteboard {
    fn change_count(&self) -> u64 {
        let mut clipboard = self.inner.lock();
        if let Ok(image) = clipboard.get_image() {
            return raw_fingerprint(Some(&image), None);
        }
        match clipboard.get_text() {
            Ok(text) if !text.is_empty() => raw_fingerprint(None, Some(&text)),
            _ => raw_fingerprint(None, None),
        }
    }

    fn read(&self) -> PasteboardResult<Option<CapturedContent>> {
        let mut clipboard = self.inner.lock();
        Self::read_locked(&mut clipboard)
    }

    fn write(&self, content: &CapturedContent) -> PasteboardResult<()> {
        let mut clipboard = self.inner.lock();
        match content {
            CapturedContent::Text(text) => clipboard
                .set_text(text.clone())
                .map_err(|e| PasteboardError::Unavailable(e.to_string()))?,
            CapturedContent::Image(png) => {
                let image = decode_png(png)?;
                clipboard
                    .set_image(image)
                    .map_err(|e| PasteboardError::Unavailable(e.to_string()))?;
            }
            // The backing crate has no file-URL representation; the URL
            // string is the closest it can carry.
            CapturedContent::FileUrl(url) => clipboard
                .set_text(url.clone())
                .map_err(|e| PasteboardError::Unavailable(e.to_string()))?,
        }
        trace!("pasteboard written");
        Ok(())
    }
}

fn encode_png(image: &arboard::ImageData<'_>) -> PasteboardResult<Vec<u8>> {
    let mut png = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(Cursor::new(&mut png));
    image::ImageEncoder::write_image(
        encoder,
        &image.bytes,
        image.width as u32,
        image.height as u32,
        image::ExtendedColorType::Rgba8,
    )
    .map_err(|e| PasteboardError::ImageCodec(e.to_string()))?;
    Ok(png)
}

fn decode_png(png: &[u8]) -> PasteboardResult<arboard::ImageData<'static>> {
    let decoded = image::load_from_memory_with_format(png, image::ImageFormat::Png)
        .map_err(|e| PasteboardError::ImageCodec(e.to_string()))?
        .into_rgba8();
    let (width, height) = decoded.dimensions();
    Ok(arboard::ImageData {
        width: width as usize,
        height: height as usize,
        bytes: decoded.into_raw().into(),
    })
}

/// In-process pasteboard for tests: real change counter, no OS involved.
#[derive(Default)]
pub struct MemoryPasteboard {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    content: Option<CapturedContent>,
    change_count: u64,
}

impl MemoryPasteboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate another application writing to the pasteboard.
    pub fn set_external(&self, content: CapturedContent) {
        let mut state = self.state.lock();
        state.content = Some(content);
        state.change_count += 1;
    }
}

impl Pasteboard for MemoryPasteboard {
    fn change_count(&self) -> u64 {
        self.state.lock().change_count
    }

    fn read(&self) -> PasteboardResult<Option<CapturedContent>> {
        Ok(self.state.lock().content.clone())
    }

    fn write(&self, content: &CapturedContent) -> PasteboardResult<()> {
        let mut state = self.state.lock();
        state.content = Some(content.clone());
        state.change_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_pasteboard_counts_changes() {
        let pasteboard = MemoryPasteboard::new();
        let start = pasteboard.change_count();

        pasteboard.set_external(CapturedContent::Text("one".to_string()));
        assert_eq!(pasteboard.change_count(), start + 1);

        pasteboard
            .write(&CapturedContent::Text("two".to_string()))
            .expect("write");
        assert_eq!(pasteboard.change_count(), start + 2);
        assert_eq!(
            pasteboard.read().expect("read"),
            Some(CapturedContent::Text("two".to_string()))
        );
    }

    #[test]
    fn test_raw_fingerprint_tracks_unencoded_state() {
        let image = arboard::ImageData {
            width: 2,
            height: 2,
            bytes: vec![7u8; 16].into(),
        };
        let wider = arboard::ImageData {
            width: 4,
            height: 1,
            bytes: vec![7u8; 16].into(),
        };

        let empty = raw_fingerprint(None, None);
        let text = raw_fingerprint(None, Some("hello"));
        let img = raw_fingerprint(Some(&image), None);

        assert_ne!(empty, text);
        assert_ne!(text, img);
        // Same pixel bytes laid out differently is different content.
        assert_ne!(img, raw_fingerprint(Some(&wider), None));
        // Stable for identical state, so unchanged content never looks new.
        assert_eq!(img, raw_fingerprint(Some(&image), None));
        assert_eq!(text, raw_fingerprint(None, Some("hello")));
    }

    #[test]
    fn test_png_roundtrip() {
        let image = arboard::ImageData {
            width: 2,
            height: 2,
            bytes: vec![255u8; 16].into(),
        };
        let png = encode_png(&image).expect("encode");
        let back = decode_png(&png).expect("decode");
        assert_eq!(back.width, 2);
        assert_eq!(back.height, 2);
        assert_eq!(back.bytes.as_ref(), &[255u8; 16][..]);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_png(&[0, 1, 2, 3]).is_err());
    }
}
