//! Accessibility permission gate and its polling monitor.
//!
//! Registration of an intercepting hotkey and keystroke synthesis both need
//! the accessibility permission. The gate answers the instantaneous
//! question; the monitor polls it once a second and publishes transitions
//! on a watch channel so the hotkey router can re-register after a grant.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// How often the monitor re-checks the permission.
pub const MONITOR_INTERVAL: Duration = Duration::from_secs(1);

/// How long a cached permission answer stays valid on the paste path.
pub const PERMISSION_CACHE_TTL: Duration = Duration::from_secs(10);

/// The permission check itself, behind a seam so tests can script grants
/// and revocations.
pub trait AccessibilityGate: Send + Sync {
    fn is_trusted(&self) -> bool;
}

/// Real gate probing the OS.
///
/// On macOS the probe asks System Events for the frontmost process, which
/// fails without the accessibility permission. Elsewhere the gate is
/// always open.
pub struct SystemAccessibilityGate;

impl AccessibilityGate for SystemAccessibilityGate {
    #[cfg(target_os = "macos")]
    fn is_trusted(&self) -> bool {
        std::process::Command::new("osascript")
            .args([
                "-e",
                "tell application \"System Events\" to get name of first process whose frontmost is true",
            ])
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    #[cfg(not(target_os = "macos"))]
    fn is_trusted(&self) -> bool {
        true
    }
}

/// Cached permission answer with a staleness window. Pure over its inputs
/// so the TTL logic is testable without a clock.
#[derive(Debug, Clone, Copy)]
pub struct PermissionCache {
    pub value: bool,
    pub checked_at: DateTime<Utc>,
}

impl PermissionCache {
    pub fn new(value: bool, checked_at: DateTime<Utc>) -> Self {
        Self { value, checked_at }
    }

    pub fn is_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let age = now.signed_duration_since(self.checked_at);
        age < chrono::Duration::zero()
            || age
                > chrono::Duration::from_std(ttl)
                    .unwrap_or_else(|_| chrono::Duration::seconds(10))
    }
}

/// Polls the gate once per [`MONITOR_INTERVAL`] and publishes the current
/// value on a watch channel. Subscribers see only transitions; the channel
/// deduplicates repeats via `send_if_modified`.
pub struct PermissionMonitor {
    gate: Arc<dyn AccessibilityGate>,
    tx: watch::Sender<bool>,
    token: CancellationToken,
}

impl PermissionMonitor {
    pub fn new(gate: Arc<dyn AccessibilityGate>) -> Self {
        let initial = gate.is_trusted();
        let (tx, _) = watch::channel(initial);
        Self {
            gate,
            tx,
            token: CancellationToken::new(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Last value the monitor published.
    pub fn current(&self) -> bool {
        *self.tx.borrow()
    }

    /// Probe the gate right now, bypassing the interval, and publish the
    /// result.
    pub fn check_immediately(&self) -> bool {
        let granted = self.gate.is_trusted();
        self.publish(granted);
        granted
    }

    fn publish(&self, granted: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current != granted {
                *current = granted;
                true
            } else {
                false
            }
        });
        if changed {
            info!(granted, "accessibility permission changed");
        }
    }

    pub fn start(self: &Arc<Self>) {
        let monitor = Arc::clone(self);
        let token = self.token.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(MONITOR_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }
                let granted = monitor.gate.is_trusted();
                monitor.publish(granted);
            }
            debug!("permission monitor stopped");
        });
    }

    pub fn stop(&self) {
        self.token.cancel();
    }
}
