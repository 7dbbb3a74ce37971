//! ClipStack public interface definition
//!
//! This file defines the types and the service trait the menu-bar UI layer
//! consumes. It acts as the source of truth for shared types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::ClipboardItem;

// ═══════════════════════════════════════════════════════════════════════════════
// ENUMS
// ═══════════════════════════════════════════════════════════════════════════════

/// Semantic tag assigned to a capture exactly once, at capture time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    #[serde(rename = "text")]
    PlainText,
    #[serde(rename = "rich_text")]
    RichText,
    #[serde(rename = "image")]
    Image,
    #[serde(rename = "file")]
    File,
    #[serde(rename = "url")]
    Url,
    #[serde(rename = "code")]
    Code,
    #[serde(rename = "color")]
    Color,
    #[serde(rename = "json")]
    Json,
    #[serde(rename = "markdown")]
    Markdown,
}

impl ContentType {
    /// Short label used for previews and log lines.
    pub fn label(&self) -> &'static str {
        match self {
            ContentType::PlainText => "text",
            ContentType::RichText => "rich_text",
            ContentType::Image => "image",
            ContentType::File => "file",
            ContentType::Url => "url",
            ContentType::Code => "code",
            ContentType::Color => "color",
            ContentType::Json => "json",
            ContentType::Markdown => "markdown",
        }
    }
}

/// Category filter applied by the picker sidebar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    All,
    Text,
    Link,
    Image,
    Code,
    File,
}

impl Category {
    /// Whether an item of the given content type belongs to this category.
    pub fn matches(&self, content_type: ContentType) -> bool {
        match self {
            Category::All => true,
            Category::Text => matches!(
                content_type,
                ContentType::PlainText | ContentType::RichText
            ),
            Category::Link => content_type == ContentType::Url,
            Category::Image => content_type == ContentType::Image,
            Category::Code => content_type == ContentType::Code,
            Category::File => content_type == ContentType::File,
        }
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::All
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SHORTCUTS
// ═══════════════════════════════════════════════════════════════════════════════

/// A keyboard modifier, stored in user-chosen order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    Command,
    Option,
    Control,
    Shift,
}

impl Modifier {
    pub fn symbol(&self) -> &'static str {
        match self {
            Modifier::Command => "⌘",
            Modifier::Option => "⌥",
            Modifier::Control => "⌃",
            Modifier::Shift => "⇧",
        }
    }

    /// Settings-key spelling, e.g. `"command"`.
    pub fn key_name(&self) -> &'static str {
        match self {
            Modifier::Command => "command",
            Modifier::Option => "option",
            Modifier::Control => "control",
            Modifier::Shift => "shift",
        }
    }

    pub fn from_key_name(name: &str) -> Option<Self> {
        match name {
            "command" => Some(Modifier::Command),
            "option" => Some(Modifier::Option),
            "control" => Some(Modifier::Control),
            "shift" => Some(Modifier::Shift),
            _ => None,
        }
    }
}

/// A modifier-set plus key combination, e.g. ⌥V.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortcutSpec {
    pub modifiers: Vec<Modifier>,
    pub key: String,
}

impl ShortcutSpec {
    pub fn new(modifiers: Vec<Modifier>, key: impl Into<String>) -> Self {
        Self {
            modifiers,
            key: key.into(),
        }
    }

    /// Human-readable form: modifier symbols followed by the key cap name.
    pub fn display_string(&self) -> String {
        let mut parts: Vec<String> = self
            .modifiers
            .iter()
            .map(|m| m.symbol().to_string())
            .collect();
        let key = match self.key.to_lowercase().as_str() {
            "return" => "↩".to_string(),
            "tab" => "⇥".to_string(),
            "space" => "Space".to_string(),
            "escape" => "⎋".to_string(),
            "delete" => "⌫".to_string(),
            "forwarddelete" => "⌦".to_string(),
            "up" => "↑".to_string(),
            "down" => "↓".to_string(),
            "left" => "←".to_string(),
            "right" => "→".to_string(),
            other => other.to_uppercase(),
        };
        parts.push(key);
        parts.join("")
    }
}

impl Default for ShortcutSpec {
    fn default() -> Self {
        Self::new(vec![Modifier::Option], "v")
    }
}

/// Outcome of a dry-run registration of a candidate combination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShortcutConflict {
    None,
    OccupiedByOtherApp,
    InvalidCombination,
    Unknown(String),
}

impl ShortcutConflict {
    pub fn has_conflict(&self) -> bool {
        !matches!(self, ShortcutConflict::None)
    }

    /// User-facing description, `None` when the combination is free.
    pub fn describe(&self) -> Option<String> {
        match self {
            ShortcutConflict::None => None,
            ShortcutConflict::OccupiedByOtherApp => {
                Some("shortcut is already taken by another application".to_string())
            }
            ShortcutConflict::InvalidCombination => {
                Some("invalid shortcut combination".to_string())
            }
            ShortcutConflict::Unknown(detail) => Some(format!("unknown error ({detail})")),
        }
    }
}

/// A conflict-free candidate produced by the suggestion search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcutSuggestion {
    pub spec: ShortcutSpec,
    pub display_name: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// OBSERVABLE STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Where the hotkey registration state machine currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    Idle,
    Registering,
    Registered,
    Failed,
}

/// A snapshot of the accessibility-permission gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionStatus {
    pub granted: bool,
    pub prompt_pending: bool,
}

/// Events published to the UI layer.
#[derive(Debug, Clone)]
pub enum UiEvent {
    /// History contents changed (add/fold/delete/pin/clear/import).
    HistoryChanged,
    /// The global hotkey fired; the picker should be shown.
    HotkeyFired { target_app: Option<String> },
    /// Accessibility permission was granted or revoked.
    PermissionChanged { granted: bool },
    /// The one-shot permission prompt should be shown.
    PermissionPromptNeeded,
    /// Hotkey registration reached a terminal state.
    RegistrationChanged { state: RegistrationState },
    /// An item was pasted (used for the image-paste notification).
    ItemPasted { id: Uuid, content_type: ContentType },
}

// ═══════════════════════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Error type for ClipStack operations crossing the service boundary.
#[derive(Debug, Error)]
pub enum ClipStackError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("hotkey error: {0}")]
    Hotkey(String),
    #[error("pasteboard error: {0}")]
    Pasteboard(String),
    #[error("paste injection error: {0}")]
    Injection(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("no item with id {0}")]
    ItemNotFound(Uuid),
}

impl From<crate::storage::StorageError> for ClipStackError {
    fn from(e: crate::storage::StorageError) -> Self {
        ClipStackError::Storage(e.to_string())
    }
}

impl From<crate::hotkey::HotkeyError> for ClipStackError {
    fn from(e: crate::hotkey::HotkeyError) -> Self {
        ClipStackError::Hotkey(e.to_string())
    }
}

impl From<crate::paste::InjectionError> for ClipStackError {
    fn from(e: crate::paste::InjectionError) -> Self {
        ClipStackError::Injection(e.to_string())
    }
}

impl From<crate::pasteboard::PasteboardError> for ClipStackError {
    fn from(e: crate::pasteboard::PasteboardError) -> Self {
        ClipStackError::Pasteboard(e.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERVICE INTERFACE
// ═══════════════════════════════════════════════════════════════════════════════

/// The surface the UI layer programs against. `ClipboardService` is the only
/// implementation shipped here; the trait exists so view-model tests can
/// substitute their own.
pub trait ClipboardServiceApi: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // History
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a captured item, applying dedup, expiry and the count limit.
    fn add_item(&self, item: ClipboardItem);

    /// Remove an item unconditionally (pinned items included).
    fn delete_item(&self, id: Uuid) -> Result<(), ClipStackError>;

    /// Flip an item's pinned flag.
    fn toggle_pin(&self, id: Uuid) -> Result<(), ClipStackError>;

    /// Remove all unpinned items.
    fn clear_history(&self);

    /// Category-filtered projection, pinned first then newest first.
    fn filtered_items(&self, category: Category) -> Vec<ClipboardItem>;

    /// First `n` of the filtered view for the current category.
    fn recent_items(&self, n: usize) -> Vec<ClipboardItem>;

    /// Every item in storage order.
    fn items(&self) -> Vec<ClipboardItem>;

    // ─────────────────────────────────────────────────────────────────────────
    // Paste
    // ─────────────────────────────────────────────────────────────────────────

    /// Copy the item to the pasteboard and re-paste it into the target
    /// application recorded when the hotkey fired.
    fn paste_item(&self, id: Uuid) -> Result<(), ClipStackError>;

    // ─────────────────────────────────────────────────────────────────────────
    // Picker state
    // ─────────────────────────────────────────────────────────────────────────

    fn selected_category(&self) -> Category;
    fn set_selected_category(&self, category: Category);
    fn is_window_visible(&self) -> bool;
    fn set_window_visible(&self, visible: bool);

    // ─────────────────────────────────────────────────────────────────────────
    // Hotkey & permissions
    // ─────────────────────────────────────────────────────────────────────────

    fn check_shortcut_conflict(&self, spec: &ShortcutSpec) -> ShortcutConflict;
    fn suggest_alternative_shortcuts(&self, original: &ShortcutSpec) -> Vec<ShortcutSuggestion>;
    fn get_accessibility_permission_status(&self) -> PermissionStatus;
    fn check_permission_immediately(&self) -> bool;

    // ─────────────────────────────────────────────────────────────────────────
    // Backup
    // ─────────────────────────────────────────────────────────────────────────

    fn export_backup(&self, path: &std::path::Path) -> Result<(), ClipStackError>;

    /// Replace the current history wholesale. The confirmation dialog is the
    /// UI's responsibility; by the time this is called the user has agreed.
    fn import_backup(&self, path: &std::path::Path) -> Result<usize, ClipStackError>;
}

/// Timestamp helper shared by export and tests.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}
