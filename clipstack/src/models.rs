//! Core data model for captured clipboard items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::content_detection::classify;
use crate::interface::ContentType;

/// One captured clipboard entry.
///
/// Everything except `is_pinned`, `tags` and `use_count` is fixed at capture
/// time. `content` carries the raw payload (UTF-8 bytes for text-likes, PNG
/// bytes for images, the URL string for files) and is the dedup identity for
/// non-text items; `plain_text` is the dedup key for everything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipboardItem {
    pub id: Uuid,
    #[serde(with = "base64_bytes")]
    pub content: Vec<u8>,
    pub plain_text: Option<String>,
    pub content_type: ContentType,
    pub source_app: String,
    pub timestamp: DateTime<Utc>,
    pub is_pinned: bool,
    pub tags: Vec<String>,
    pub use_count: u32,
}

impl ClipboardItem {
    /// Create a text item; the content type is classified once, here.
    pub fn from_text(text: impl Into<String>, source_app: impl Into<String>) -> Self {
        let text = text.into();
        let content_type = classify(&text);
        Self {
            id: Uuid::new_v4(),
            content: text.as_bytes().to_vec(),
            plain_text: Some(text),
            content_type,
            source_app: source_app.into(),
            timestamp: Utc::now(),
            is_pinned: false,
            tags: Vec::new(),
            use_count: 0,
        }
    }

    /// Create an image item from encoded (PNG) bytes.
    pub fn from_image(png_bytes: Vec<u8>, source_app: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: png_bytes,
            plain_text: None,
            content_type: ContentType::Image,
            source_app: source_app.into(),
            timestamp: Utc::now(),
            is_pinned: false,
            tags: Vec::new(),
            use_count: 0,
        }
    }

    /// Create a file item from a file URL string and its display path.
    pub fn from_file(url: impl Into<String>, path: impl Into<String>, source_app: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            id: Uuid::new_v4(),
            content: url.into_bytes(),
            plain_text: Some(path.into()),
            content_type: ContentType::File,
            source_app: source_app.into(),
            timestamp: Utc::now(),
            is_pinned: false,
            tags: Vec::new(),
            use_count: 0,
        }
    }

    /// The dedup predicate: same content type, and byte-exact content for
    /// images or exact non-null `plain_text` for everything else. An item
    /// whose `plain_text` is `None` (malformed file capture) never matches.
    pub fn is_duplicate_of(&self, other: &ClipboardItem) -> bool {
        if self.content_type != other.content_type {
            return false;
        }
        match self.content_type {
            ContentType::Image => self.content == other.content,
            _ => other.plain_text.is_some() && self.plain_text == other.plain_text,
        }
    }

    /// Build the folded replacement for a duplicate capture: identity and
    /// payload kept, recency and use count refreshed, source app taken from
    /// the new capture.
    pub fn folded_with(&self, new_capture: &ClipboardItem) -> ClipboardItem {
        let mut updated = self.clone();
        updated.use_count += 1;
        updated.timestamp = new_capture.timestamp;
        updated.source_app = new_capture.source_app.clone();
        updated
    }

    /// Text shown in the picker row.
    pub fn display_text(&self) -> String {
        if let Some(text) = &self.plain_text {
            return text.clone();
        }
        match self.content_type {
            ContentType::Image => "[Image]".to_string(),
            ContentType::File => "[File]".to_string(),
            _ => "[Unknown content]".to_string(),
        }
    }

    /// Preview capped at `max_chars`, whitespace collapsed.
    pub fn preview(&self, max_chars: usize) -> String {
        normalize_preview(&self.display_text(), max_chars)
    }
}

/// Normalize text for preview display: skip leading whitespace, fold
/// newlines/tabs into single spaces, collapse runs of spaces, truncate at
/// `max_chars` with an ellipsis, trim trailing spaces.
pub fn normalize_preview(text: &str, max_chars: usize) -> String {
    let mut result = String::with_capacity(max_chars + 1);
    let mut chars = text.chars().peekable();

    while chars.peek().map(|c| c.is_whitespace()).unwrap_or(false) {
        chars.next();
    }

    let mut last_was_space = false;
    let mut count = 0;

    for ch in chars {
        if count >= max_chars {
            result.push('…');
            return result;
        }

        let ch = match ch {
            '\n' | '\t' | '\r' => ' ',
            c => c,
        };

        if ch == ' ' {
            if last_was_space {
                continue;
            }
            last_was_space = true;
        } else {
            last_was_space = false;
        }

        result.push(ch);
        count += 1;
    }

    while result.ends_with(' ') {
        result.pop();
    }

    result
}

/// Serde adapter storing binary payloads as base64 strings, matching the
/// layout the original exporter produced for raw data fields.
pub(crate) mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_item_classified_once() {
        let item = ClipboardItem::from_text("https://example.com", "Safari");
        assert_eq!(item.content_type, ContentType::Url);
        assert_eq!(item.plain_text.as_deref(), Some("https://example.com"));
        assert_eq!(item.use_count, 0);
        assert!(!item.is_pinned);
    }

    #[test]
    fn test_dedup_predicate_text() {
        let a = ClipboardItem::from_text("hello", "A");
        let b = ClipboardItem::from_text("hello", "B");
        let c = ClipboardItem::from_text("other", "A");
        assert!(a.is_duplicate_of(&b));
        assert!(!a.is_duplicate_of(&c));
    }

    #[test]
    fn test_dedup_predicate_image_bytes() {
        let a = ClipboardItem::from_image(vec![1, 2, 3], "A");
        let b = ClipboardItem::from_image(vec![1, 2, 3], "B");
        let c = ClipboardItem::from_image(vec![9, 9], "A");
        assert!(a.is_duplicate_of(&b));
        assert!(!a.is_duplicate_of(&c));
    }

    #[test]
    fn test_dedup_requires_plain_text() {
        let mut a = ClipboardItem::from_file("file:///tmp/x", "/tmp/x", "Finder");
        let mut b = a.clone();
        a.plain_text = None;
        b.plain_text = None;
        // Null plain_text on a non-image item never folds.
        assert!(!a.is_duplicate_of(&b));
    }

    #[test]
    fn test_folded_with_bumps_use_and_recency() {
        let old = ClipboardItem::from_text("hello", "A");
        let new_capture = ClipboardItem::from_text("hello", "B");
        let folded = old.folded_with(&new_capture);
        assert_eq!(folded.id, old.id);
        assert_eq!(folded.use_count, 1);
        assert_eq!(folded.timestamp, new_capture.timestamp);
        assert_eq!(folded.source_app, "B");
    }

    #[test]
    fn test_preview_truncation_and_whitespace() {
        let item = ClipboardItem::from_text("  hello\n\nworld  ", "A");
        assert_eq!(item.preview(200), "hello world");

        let long = ClipboardItem::from_text("a".repeat(300), "A");
        let preview = long.preview(200);
        assert_eq!(preview.chars().count(), 201);
        assert!(preview.ends_with('…'));
    }

    #[test]
    fn test_serde_roundtrip_base64_content() {
        let item = ClipboardItem::from_image(vec![0, 159, 146, 150], "Preview");
        let json = serde_json::to_string(&item).expect("encode");
        assert!(json.contains("\"content\""));
        let back: ClipboardItem = serde_json::from_str(&json).expect("decode");
        assert_eq!(back, item);
    }
}
