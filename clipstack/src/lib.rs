//! ClipStack Core - Rust business logic for a menu-bar clipboard manager
//!
//! This library implements clipboard capture, deduplicating history with
//! pinning and retention, global hotkey registration with conflict
//! detection, paste injection, and accessibility permission monitoring.
//! The menu-bar UI layer programs against [`ClipboardServiceApi`].

pub mod content_detection;
pub mod history;
pub mod hotkey;
pub mod interface;
pub mod models;
pub mod paste;
pub mod pasteboard;
pub mod permission;
pub mod poller;
pub mod service;
pub mod settings;
pub mod storage;

pub use interface::*;
pub use service::ClipboardService;
