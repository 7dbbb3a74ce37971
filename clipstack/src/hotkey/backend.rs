//! The two hotkey capture backends.
//!
//! [`InterceptingBackend`] registers through the OS hotkey API: the
//! keystroke is consumed and never reaches the frontmost application. The
//! manager must live on one thread, so a dedicated worker owns it and
//! serves commands over a channel.
//!
//! [`ObservingBackend`] is the degraded fallback: a global event tap that
//! sees keystrokes without consuming them. It cannot probe for conflicts
//! and the tap cannot be torn down once installed, only disarmed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use global_hotkey::hotkey::HotKey;
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::keymap::{code_to_rdev_key, key_to_code, modifiers_to_flags};
use super::{HotkeyError, HotkeyResult};
use crate::interface::{Modifier, ShortcutConflict, ShortcutSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// OS-level registration; the keystroke is swallowed.
    Intercepting,
    /// Passive event tap; the keystroke also reaches the frontmost app.
    Observing,
    /// Neither backend could be brought up.
    Unavailable,
}

/// Backend choice given the OS generation and whether the intercepting
/// path already failed this session.
pub fn select_backend(os_major: u32, intercepting_failed: bool) -> BackendKind {
    if intercepting_failed {
        BackendKind::Observing
    } else if os_major >= 12 {
        BackendKind::Intercepting
    } else {
        BackendKind::Observing
    }
}

pub trait HotkeyBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn register(&self, spec: &ShortcutSpec) -> HotkeyResult<()>;

    /// Tear down the current registration. Idempotent.
    fn unregister(&self);

    fn is_active(&self) -> bool;

    /// Dry-run a candidate combination without keeping it registered.
    fn probe(&self, spec: &ShortcutSpec) -> ShortcutConflict;
}

fn spec_to_hotkey(spec: &ShortcutSpec) -> HotkeyResult<HotKey> {
    if spec.modifiers.is_empty() {
        return Err(HotkeyError::InvalidCombination);
    }
    let code = key_to_code(&spec.key).ok_or(HotkeyError::InvalidCombination)?;
    Ok(HotKey::new(Some(modifiers_to_flags(&spec.modifiers)), code))
}

fn classify_register_error(err: &global_hotkey::Error) -> ShortcutConflict {
    match err {
        global_hotkey::Error::AlreadyRegistered(_) => ShortcutConflict::OccupiedByOtherApp,
        global_hotkey::Error::FailedToRegister(_) => ShortcutConflict::OccupiedByOtherApp,
        global_hotkey::Error::HotKeyParseError(_) => ShortcutConflict::InvalidCombination,
        other => ShortcutConflict::Unknown(other.to_string()),
    }
}

fn register_error_to_hotkey_error(err: global_hotkey::Error) -> HotkeyError {
    match classify_register_error(&err) {
        ShortcutConflict::OccupiedByOtherApp => HotkeyError::Occupied,
        ShortcutConflict::InvalidCombination => HotkeyError::InvalidCombination,
        _ => HotkeyError::Backend(err.to_string()),
    }
}

enum Command {
    Register(HotKey, mpsc::Sender<Result<(), global_hotkey::Error>>),
    Unregister(mpsc::Sender<()>),
    Probe(HotKey, mpsc::Sender<Result<(), global_hotkey::Error>>),
}

/// Registration backend built on the OS hotkey manager.
pub struct InterceptingBackend {
    handler: Arc<dyn Fn() + Send + Sync>,
    worker: Mutex<Option<mpsc::Sender<Command>>>,
    active: AtomicBool,
}

impl InterceptingBackend {
    pub fn new(handler: Arc<dyn Fn() + Send + Sync>) -> Self {
        Self {
            handler,
            worker: Mutex::new(None),
            active: AtomicBool::new(false),
        }
    }

    /// Start (or reuse) the worker thread owning the manager. The manager
    /// type is not movable across threads, so it is created on the worker
    /// and a handshake reports whether creation succeeded.
    fn worker_sender(&self) -> HotkeyResult<mpsc::Sender<Command>> {
        let mut worker = self.worker.lock();
        if let Some(tx) = worker.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<Command>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();
        let handler = Arc::clone(&self.handler);

        std::thread::Builder::new()
            .name("clipstack-hotkey".to_string())
            .spawn(move || worker_loop(rx, ready_tx, handler))
            .map_err(|e| HotkeyError::Backend(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                *worker = Some(tx.clone());
                Ok(tx)
            }
            Ok(Err(e)) => Err(HotkeyError::Backend(e)),
            Err(_) => Err(HotkeyError::Backend("hotkey worker died during startup".to_string())),
        }
    }

    fn roundtrip<T>(
        &self,
        build: impl FnOnce(mpsc::Sender<T>) -> Command,
    ) -> HotkeyResult<T> {
        let worker = self.worker_sender()?;
        let (reply_tx, reply_rx) = mpsc::channel();
        worker
            .send(build(reply_tx))
            .map_err(|_| HotkeyError::Backend("hotkey worker gone".to_string()))?;
        reply_rx
            .recv()
            .map_err(|_| HotkeyError::Backend("hotkey worker gone".to_string()))
    }
}

impl HotkeyBackend for InterceptingBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Intercepting
    }

    fn register(&self, spec: &ShortcutSpec) -> HotkeyResult<()> {
        let hotkey = spec_to_hotkey(spec)?;
        self.roundtrip(|reply| Command::Register(hotkey, reply))?
            .map_err(register_error_to_hotkey_error)?;
        self.active.store(true, Ordering::SeqCst);
        debug!(shortcut = %spec.display_string(), "intercepting hotkey registered");
        Ok(())
    }

    fn unregister(&self) {
        if self.roundtrip(Command::Unregister).is_ok() {
            self.active.store(false, Ordering::SeqCst);
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn probe(&self, spec: &ShortcutSpec) -> ShortcutConflict {
        let hotkey = match spec_to_hotkey(spec) {
            Ok(hotkey) => hotkey,
            Err(_) => return ShortcutConflict::InvalidCombination,
        };
        match self.roundtrip(|reply| Command::Probe(hotkey, reply)) {
            Ok(Ok(())) => ShortcutConflict::None,
            Ok(Err(e)) => classify_register_error(&e),
            Err(e) => ShortcutConflict::Unknown(e.to_string()),
        }
    }
}

fn worker_loop(
    rx: mpsc::Receiver<Command>,
    ready_tx: mpsc::Sender<Result<(), String>>,
    handler: Arc<dyn Fn() + Send + Sync>,
) {
    let manager = match GlobalHotKeyManager::new() {
        Ok(manager) => {
            let _ = ready_tx.send(Ok(()));
            manager
        }
        Err(e) => {
            let _ = ready_tx.send(Err(e.to_string()));
            return;
        }
    };

    let events = GlobalHotKeyEvent::receiver();
    let mut current: Option<HotKey> = None;

    loop {
        match rx.recv_timeout(Duration::from_millis(50)) {
            Ok(Command::Register(hotkey, reply)) => {
                let result = manager.register(hotkey);
                if result.is_ok() {
                    current = Some(hotkey);
                }
                let _ = reply.send(result);
            }
            Ok(Command::Unregister(reply)) => {
                if let Some(hotkey) = current.take() {
                    if let Err(e) = manager.unregister(hotkey) {
                        warn!(error = %e, "hotkey unregister failed");
                    }
                }
                let _ = reply.send(());
            }
            Ok(Command::Probe(hotkey, reply)) => {
                let result = manager.register(hotkey);
                if result.is_ok() {
                    if let Err(e) = manager.unregister(hotkey) {
                        warn!(error = %e, "probe cleanup failed");
                    }
                }
                let _ = reply.send(result);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        while let Ok(event) = events.try_recv() {
            let registered = current.map(|hotkey| hotkey.id());
            if Some(event.id) == registered && event.state == HotKeyState::Pressed {
                handler();
            }
        }
    }
    debug!("hotkey worker stopped");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ArmedShortcut {
    key: rdev::Key,
    meta: bool,
    alt: bool,
    ctrl: bool,
    shift: bool,
}

impl ArmedShortcut {
    fn from_spec(spec: &ShortcutSpec) -> HotkeyResult<Self> {
        if spec.modifiers.is_empty() {
            return Err(HotkeyError::InvalidCombination);
        }
        let code = key_to_code(&spec.key).ok_or(HotkeyError::InvalidCombination)?;
        let key = code_to_rdev_key(code).ok_or(HotkeyError::InvalidCombination)?;
        Ok(Self {
            key,
            meta: spec.modifiers.contains(&Modifier::Command),
            alt: spec.modifiers.contains(&Modifier::Option),
            ctrl: spec.modifiers.contains(&Modifier::Control),
            shift: spec.modifiers.contains(&Modifier::Shift),
        })
    }
}

#[derive(Default, Clone, Copy)]
struct ModifierState {
    meta: bool,
    alt: bool,
    ctrl: bool,
    shift: bool,
}

impl ModifierState {
    fn apply(&mut self, key: rdev::Key, pressed: bool) {
        match key {
            rdev::Key::MetaLeft | rdev::Key::MetaRight => self.meta = pressed,
            rdev::Key::Alt | rdev::Key::AltGr => self.alt = pressed,
            rdev::Key::ControlLeft | rdev::Key::ControlRight => self.ctrl = pressed,
            rdev::Key::ShiftLeft | rdev::Key::ShiftRight => self.shift = pressed,
            _ => {}
        }
    }

    /// Exact match, so an armed ⌥V does not fire on ⌘⌥V.
    fn matches(&self, armed: &ArmedShortcut) -> bool {
        self.meta == armed.meta
            && self.alt == armed.alt
            && self.ctrl == armed.ctrl
            && self.shift == armed.shift
    }
}

/// Passive fallback backend built on a global event tap.
pub struct ObservingBackend {
    handler: Arc<dyn Fn() + Send + Sync>,
    armed: Arc<Mutex<Option<ArmedShortcut>>>,
    listener_started: AtomicBool,
    active: AtomicBool,
}

impl ObservingBackend {
    pub fn new(handler: Arc<dyn Fn() + Send + Sync>) -> Self {
        Self {
            handler,
            armed: Arc::new(Mutex::new(None)),
            listener_started: AtomicBool::new(false),
            active: AtomicBool::new(false),
        }
    }

    /// The tap thread is started once and never joined; the tap API has no
    /// teardown. Disarming is done through the shared slot instead.
    fn ensure_listener(&self) {
        if self.listener_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let armed = Arc::clone(&self.armed);
        let handler = Arc::clone(&self.handler);
        std::thread::Builder::new()
            .name("clipstack-eventtap".to_string())
            .spawn(move || {
                let mut state = ModifierState::default();
                let result = rdev::listen(move |event| match event.event_type {
                    rdev::EventType::KeyPress(key) => {
                        state.apply(key, true);
                        let matched = match *armed.lock() {
                            Some(shortcut) => key == shortcut.key && state.matches(&shortcut),
                            None => false,
                        };
                        if matched {
                            handler();
                        }
                    }
                    rdev::EventType::KeyRelease(key) => {
                        state.apply(key, false);
                    }
                    _ => {}
                });
                if let Err(e) = result {
                    warn!(error = ?e, "event tap listener failed");
                }
            })
            .map(|_| ())
            .unwrap_or_else(|e| warn!(error = %e, "event tap thread failed to start"));
    }
}

impl HotkeyBackend for ObservingBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Observing
    }

    fn register(&self, spec: &ShortcutSpec) -> HotkeyResult<()> {
        let shortcut = ArmedShortcut::from_spec(spec)?;
        *self.armed.lock() = Some(shortcut);
        self.ensure_listener();
        self.active.store(true, Ordering::SeqCst);
        debug!(shortcut = %spec.display_string(), "observing hotkey armed");
        Ok(())
    }

    fn unregister(&self) {
        *self.armed.lock() = None;
        self.active.store(false, Ordering::SeqCst);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// The tap cannot dry-run a registration; conflicts are unknowable
    /// here.
    fn probe(&self, _spec: &ShortcutSpec) -> ShortcutConflict {
        ShortcutConflict::Unknown("observing backend cannot probe for conflicts".to_string())
    }
}
