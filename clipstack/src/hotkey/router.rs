//! Registration state machine over the two backends.
//!
//! Registration is not fire-and-forget: the OS can refuse or silently drop
//! a registration right after login or a permission grant. The router
//! therefore settles, attempts, verifies, and retries with backoff before
//! declaring failure, and re-runs the whole sequence when the
//! accessibility permission flips from denied to granted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::backend::{select_backend, BackendKind, HotkeyBackend};
use super::keymap::key_to_code;
use crate::interface::{
    RegistrationState, ShortcutConflict, ShortcutSpec, ShortcutSuggestion, UiEvent,
};
use crate::permission::AccessibilityGate;

/// Timing constants of the registration sequence.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Wait after a permission grant before the first attempt; the OS
    /// needs a moment to propagate the grant to the hotkey API.
    pub settle: Duration,
    /// Wait between a successful register call and the is-active check.
    pub verify_delay: Duration,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            settle: Duration::from_secs(2),
            verify_delay: Duration::from_secs(1),
            backoff: Duration::from_secs(1),
        }
    }
}

/// Clock seam so the retry sequence is testable without real waits.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Modifier combinations tried by the suggestion search, most conventional
/// first.
const SUGGESTION_MODIFIER_SETS: &[&[&str]] = &[
    &["option"],
    &["command"],
    &["control"],
    &["command", "option"],
    &["control", "option"],
    &["command", "control"],
    &["shift", "option"],
];

/// Keys tried by the suggestion search.
const SUGGESTION_KEYS: &[&str] = &[
    "v", "c", "x", "z", "b", "n", "m", "k", "j", "h", "g", "f1", "f2", "f3", "f4",
];

const MAX_SUGGESTIONS: usize = 5;

pub struct HotkeyRouter {
    intercepting: Arc<dyn HotkeyBackend>,
    observing: Arc<dyn HotkeyBackend>,
    gate: Arc<dyn AccessibilityGate>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
    events: broadcast::Sender<UiEvent>,
    os_major: u32,

    spec: Mutex<ShortcutSpec>,
    state: Mutex<RegistrationState>,
    /// Re-entrancy guard: permission flips during an in-flight sequence
    /// must not start a second one.
    is_registering: AtomicBool,
    /// Sticky within a session: once the intercepting backend fails, stay
    /// on the observing one.
    intercepting_failed: AtomicBool,
    /// One-shot: the permission prompt is surfaced once per denial.
    prompt_shown: AtomicBool,
    token: CancellationToken,
}

impl HotkeyRouter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        intercepting: Arc<dyn HotkeyBackend>,
        observing: Arc<dyn HotkeyBackend>,
        gate: Arc<dyn AccessibilityGate>,
        sleeper: Arc<dyn Sleeper>,
        policy: RetryPolicy,
        events: broadcast::Sender<UiEvent>,
        os_major: u32,
        spec: ShortcutSpec,
    ) -> Self {
        Self {
            intercepting,
            observing,
            gate,
            sleeper,
            policy,
            events,
            os_major,
            spec: Mutex::new(spec),
            state: Mutex::new(RegistrationState::Idle),
            is_registering: AtomicBool::new(false),
            intercepting_failed: AtomicBool::new(false),
            prompt_shown: AtomicBool::new(false),
            token: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> RegistrationState {
        *self.state.lock()
    }

    pub fn current_spec(&self) -> ShortcutSpec {
        self.spec.lock().clone()
    }

    pub fn is_registering(&self) -> bool {
        self.is_registering.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: RegistrationState) {
        *self.state.lock() = state;
        let _ = self.events.send(UiEvent::RegistrationChanged { state });
    }

    /// Run the full registration sequence for the current shortcut.
    /// Re-entrant calls while a sequence is in flight are dropped.
    pub async fn register(&self) {
        if self.is_registering.swap(true, Ordering::SeqCst) {
            debug!("registration already in flight, ignoring");
            return;
        }
        self.run_sequence().await;
        self.is_registering.store(false, Ordering::SeqCst);
    }

    async fn run_sequence(&self) {
        let spec = self.current_spec();
        self.set_state(RegistrationState::Registering);

        if !self.gate.is_trusted() {
            self.surface_prompt_once();
            self.set_state(RegistrationState::Failed);
            return;
        }

        self.sleeper.sleep(self.policy.settle).await;

        for attempt in 1..=self.policy.max_attempts {
            if self.token.is_cancelled() {
                self.set_state(RegistrationState::Idle);
                return;
            }
            // The permission can be revoked while we were sleeping.
            if !self.gate.is_trusted() {
                self.surface_prompt_once();
                self.set_state(RegistrationState::Failed);
                return;
            }

            // Clean slate: drop anything a previous attempt left behind.
            self.intercepting.unregister();
            self.observing.unregister();

            if self.try_attempt(&spec).await {
                info!(shortcut = %spec.display_string(), attempt, "hotkey registered");
                self.set_state(RegistrationState::Registered);
                return;
            }

            if attempt < self.policy.max_attempts {
                warn!(attempt, "hotkey registration attempt failed, retrying");
                self.sleeper.sleep(self.policy.backoff).await;
            }
        }

        warn!(shortcut = %spec.display_string(), "hotkey registration failed");
        self.set_state(RegistrationState::Failed);
    }

    /// One attempt: intercepting backend first (when selected), observing
    /// fallback, then a delayed verification that the registration stuck.
    async fn try_attempt(&self, spec: &ShortcutSpec) -> bool {
        let preferred = select_backend(
            self.os_major,
            self.intercepting_failed.load(Ordering::SeqCst),
        );

        let backend: &Arc<dyn HotkeyBackend> = if preferred == BackendKind::Intercepting {
            match self.intercepting.register(spec) {
                Ok(()) => &self.intercepting,
                Err(e) => {
                    debug!(error = %e, "intercepting backend refused, falling back");
                    self.intercepting_failed.store(true, Ordering::SeqCst);
                    match self.observing.register(spec) {
                        Ok(()) => &self.observing,
                        Err(e) => {
                            debug!(error = %e, "observing backend refused");
                            return false;
                        }
                    }
                }
            }
        } else {
            match self.observing.register(spec) {
                Ok(()) => &self.observing,
                Err(e) => {
                    debug!(error = %e, "observing backend refused");
                    return false;
                }
            }
        };

        self.sleeper.sleep(self.policy.verify_delay).await;
        backend.is_active()
    }

    fn surface_prompt_once(&self) {
        if !self.prompt_shown.swap(true, Ordering::SeqCst) {
            let _ = self.events.send(UiEvent::PermissionPromptNeeded);
        }
    }

    /// Tear everything down. Idempotent and terminal for the current
    /// shortcut; a later `register` starts fresh.
    pub fn unregister(&self) {
        self.intercepting.unregister();
        self.observing.unregister();
        self.set_state(RegistrationState::Idle);
    }

    /// Swap the shortcut: tear down the old registration, store the new
    /// spec and run the sequence for it.
    pub async fn shortcut_changed(&self, new_spec: ShortcutSpec) {
        self.unregister();
        *self.spec.lock() = new_spec;
        self.register().await;
    }

    /// Dry-run a candidate combination.
    pub fn check_conflict(&self, spec: &ShortcutSpec) -> ShortcutConflict {
        if spec.modifiers.is_empty() || key_to_code(&spec.key).is_none() {
            return ShortcutConflict::InvalidCombination;
        }
        // Our own active registration would read as occupied.
        if self.state() == RegistrationState::Registered && *spec == self.current_spec() {
            return ShortcutConflict::None;
        }
        self.intercepting.probe(spec)
    }

    /// Search the fixed candidate grid for free combinations, skipping the
    /// one that conflicted, capped at [`MAX_SUGGESTIONS`].
    pub fn suggest_alternatives(&self, original: &ShortcutSpec) -> Vec<ShortcutSuggestion> {
        let mut suggestions = Vec::new();
        for modifier_names in SUGGESTION_MODIFIER_SETS {
            for key in SUGGESTION_KEYS {
                if suggestions.len() >= MAX_SUGGESTIONS {
                    return suggestions;
                }
                let modifiers = modifier_names
                    .iter()
                    .filter_map(|name| crate::interface::Modifier::from_key_name(name))
                    .collect::<Vec<_>>();
                let candidate = ShortcutSpec::new(modifiers, *key);
                if candidate == *original {
                    continue;
                }
                if self.check_conflict(&candidate) == ShortcutConflict::None {
                    let display_name = candidate.display_string();
                    suggestions.push(ShortcutSuggestion {
                        spec: candidate,
                        display_name,
                    });
                }
            }
        }
        suggestions
    }

    /// Watch permission transitions. A grant re-runs registration unless a
    /// sequence is already in flight; a revocation tears the registration
    /// down and surfaces the one-shot permission prompt again.
    pub fn spawn_permission_watch(
        self: &Arc<Self>,
        mut rx: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let router = Arc::clone(self);
        let token = self.token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                }
                let granted = *rx.borrow_and_update();
                let _ = router.events.send(UiEvent::PermissionChanged { granted });

                if granted {
                    if router.is_registering() {
                        debug!("permission granted mid-registration, sequence continues");
                        continue;
                    }
                    info!("permission granted, re-registering hotkey");
                    router.register().await;
                } else {
                    info!("permission revoked, tearing down hotkey");
                    // Re-arm first so this denial surfaces its own prompt.
                    router.prompt_shown.store(false, Ordering::SeqCst);
                    router.unregister();
                    router.set_state(RegistrationState::Failed);
                    router.surface_prompt_once();
                }
            }
        })
    }

    pub fn shutdown(&self) {
        self.token.cancel();
        self.intercepting.unregister();
        self.observing.unregister();
    }
}
