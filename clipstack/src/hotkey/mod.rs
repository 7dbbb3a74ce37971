//! Global hotkey registration: key mapping, the two capture backends, and
//! the router/state machine that drives them.

mod backend;
mod keymap;
mod router;

pub use backend::{
    BackendKind, HotkeyBackend, InterceptingBackend, ObservingBackend, select_backend,
};
pub use keymap::{code_to_rdev_key, key_to_code, modifiers_to_flags};
pub use router::{HotkeyRouter, RetryPolicy, Sleeper, TokioSleeper};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HotkeyError {
    #[error("shortcut is already taken by another application")]
    Occupied,
    #[error("invalid shortcut combination")]
    InvalidCombination,
    #[error("accessibility permission denied")]
    PermissionDenied,
    #[error("backend error: {0}")]
    Backend(String),
}

pub type HotkeyResult<T> = Result<T, HotkeyError>;
