//! Paste injection: put an item back on the pasteboard and synthesize the
//! paste chord into the target application.
//!
//! The delay between activation and the synthesized keystroke is the load
//! bearing part: too short and the keystroke lands in the wrong app, too
//! long and the paste feels sluggish. Images get longer delays because the
//! pasteboard write itself is slower.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::interface::ContentType;
use crate::models::ClipboardItem;
use crate::pasteboard::{CapturedContent, Pasteboard, PasteboardError};
use crate::permission::{AccessibilityGate, PermissionCache, PERMISSION_CACHE_TTL};

#[derive(Error, Debug)]
pub enum InjectionError {
    #[error("keystroke synthesis failed: {0}")]
    Synthesis(String),
    #[error("app activation failed: {0}")]
    Activation(String),
    #[error("accessibility permission denied")]
    PermissionDenied,
    #[error(transparent)]
    Pasteboard(#[from] PasteboardError),
}

pub type InjectionResult<T> = Result<T, InjectionError>;

/// The application a paste is aimed at, captured when the hotkey fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppHandle {
    pub name: String,
}

/// Frontmost-app queries and activation, behind a seam for tests.
pub trait AppActivator: Send + Sync {
    fn frontmost(&self) -> Option<AppHandle>;
    fn activate(&self, app: &AppHandle) -> InjectionResult<()>;
}

/// Real activator speaking AppleScript through `osascript`.
pub struct SystemAppActivator;

impl AppActivator for SystemAppActivator {
    #[cfg(target_os = "macos")]
    fn frontmost(&self) -> Option<AppHandle> {
        let output = std::process::Command::new("osascript")
            .args([
                "-e",
                "tell application \"System Events\" to get name of first process whose frontmost is true",
            ])
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if name.is_empty() {
            None
        } else {
            Some(AppHandle { name })
        }
    }

    #[cfg(not(target_os = "macos"))]
    fn frontmost(&self) -> Option<AppHandle> {
        None
    }

    #[cfg(target_os = "macos")]
    fn activate(&self, app: &AppHandle) -> InjectionResult<()> {
        let script = format!("tell application \"{}\" to activate", app.name);
        let output = std::process::Command::new("osascript")
            .args(["-e", &script])
            .output()
            .map_err(|e| InjectionError::Activation(e.to_string()))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(InjectionError::Activation(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }

    #[cfg(not(target_os = "macos"))]
    fn activate(&self, _app: &AppHandle) -> InjectionResult<()> {
        Ok(())
    }
}

/// Sends the actual paste chord.
pub trait KeystrokeInjector: Send + Sync {
    fn send_paste_chord(&self) -> InjectionResult<()>;
}

/// Synthesizes ⌘V. The synthesis handle is created per call; it is cheap
/// and not shareable across threads.
pub struct EnigoInjector;

impl KeystrokeInjector for EnigoInjector {
    fn send_paste_chord(&self) -> InjectionResult<()> {
        let mut enigo = Enigo::new(&Settings::default())
            .map_err(|e| InjectionError::Synthesis(e.to_string()))?;
        enigo
            .key(Key::Meta, Direction::Press)
            .map_err(|e| InjectionError::Synthesis(e.to_string()))?;
        enigo
            .key(Key::Unicode('v'), Direction::Click)
            .map_err(|e| InjectionError::Synthesis(e.to_string()))?;
        enigo
            .key(Key::Meta, Direction::Release)
            .map_err(|e| InjectionError::Synthesis(e.to_string()))?;
        Ok(())
    }
}

/// Where the target app was relative to us when the paste started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    /// Target was already frontmost; short delay.
    Frontmost,
    /// We had to activate the target; give it time to take focus.
    Activated,
    /// No target recorded; paste lands wherever focus is.
    NoTarget,
}

/// Delay between pasteboard write (and activation) and the keystroke.
#[derive(Debug, Clone, Copy)]
pub struct DelayTable {
    pub frontmost_text: Duration,
    pub frontmost_image: Duration,
    pub activated_text: Duration,
    pub activated_image: Duration,
    pub no_target: Duration,
}

impl Default for DelayTable {
    fn default() -> Self {
        Self {
            frontmost_text: Duration::from_millis(20),
            frontmost_image: Duration::from_millis(50),
            activated_text: Duration::from_millis(100),
            activated_image: Duration::from_millis(150),
            no_target: Duration::from_millis(50),
        }
    }
}

impl DelayTable {
    pub fn delay_for(&self, state: TargetState, is_image: bool) -> Duration {
        match (state, is_image) {
            (TargetState::Frontmost, false) => self.frontmost_text,
            (TargetState::Frontmost, true) => self.frontmost_image,
            (TargetState::Activated, false) => self.activated_text,
            (TargetState::Activated, true) => self.activated_image,
            (TargetState::NoTarget, _) => self.no_target,
        }
    }
}

/// The paste pipeline. Runs on a blocking thread; every step is
/// synchronous.
pub struct PasteInjector {
    pasteboard: Arc<dyn Pasteboard>,
    activator: Arc<dyn AppActivator>,
    injector: Arc<dyn KeystrokeInjector>,
    gate: Arc<dyn AccessibilityGate>,
    delays: DelayTable,
    permission_cache: Mutex<Option<PermissionCache>>,
}

impl PasteInjector {
    pub fn new(
        pasteboard: Arc<dyn Pasteboard>,
        activator: Arc<dyn AppActivator>,
        injector: Arc<dyn KeystrokeInjector>,
        gate: Arc<dyn AccessibilityGate>,
    ) -> Self {
        Self::with_delays(pasteboard, activator, injector, gate, DelayTable::default())
    }

    pub fn with_delays(
        pasteboard: Arc<dyn Pasteboard>,
        activator: Arc<dyn AppActivator>,
        injector: Arc<dyn KeystrokeInjector>,
        gate: Arc<dyn AccessibilityGate>,
        delays: DelayTable,
    ) -> Self {
        Self {
            pasteboard,
            activator,
            injector,
            gate,
            delays,
            permission_cache: Mutex::new(None),
        }
    }

    /// Drop the cached permission answer. Called on observed permission
    /// transitions so a fresh grant takes effect before the TTL runs out.
    pub fn invalidate_permission_cache(&self) {
        *self.permission_cache.lock() = None;
    }

    /// Permission answer with a 10s cache so rapid consecutive pastes do
    /// not re-probe the OS every time.
    fn permission_granted(&self) -> bool {
        let now = Utc::now();
        let mut cache = self.permission_cache.lock();
        if let Some(cached) = *cache {
            if !cached.is_stale(now, PERMISSION_CACHE_TTL) {
                return cached.value;
            }
        }
        let granted = self.gate.is_trusted();
        *cache = Some(PermissionCache::new(granted, now));
        granted
    }

    /// Write the item to the pasteboard, bring the target forward if
    /// needed, wait out the focus delay, then synthesize the paste chord.
    /// A permission denial skips synthesis; the content stays on the
    /// pasteboard for a manual paste.
    pub fn paste(&self, item: &ClipboardItem, target: Option<&AppHandle>) -> InjectionResult<()> {
        let is_image = item.content_type == ContentType::Image;
        let content = match item.content_type {
            ContentType::Image => CapturedContent::Image(item.content.clone()),
            // File items carry the file URL in `content`; the display path
            // in `plain_text` is for the picker, not the pasteboard.
            ContentType::File => {
                CapturedContent::FileUrl(String::from_utf8_lossy(&item.content).to_string())
            }
            _ => {
                let text = item
                    .plain_text
                    .clone()
                    .unwrap_or_else(|| String::from_utf8_lossy(&item.content).to_string());
                CapturedContent::Text(text)
            }
        };
        self.pasteboard.write(&content)?;

        let state = match target {
            None => TargetState::NoTarget,
            Some(app) => {
                let already_front = self
                    .activator
                    .frontmost()
                    .map(|front| front.name == app.name)
                    .unwrap_or(false);
                if already_front {
                    TargetState::Frontmost
                } else {
                    self.activator.activate(app)?;
                    TargetState::Activated
                }
            }
        };

        std::thread::sleep(self.delays.delay_for(state, is_image));

        // Re-validate right before synthesis: the permission can have been
        // revoked since the hotkey fired.
        if !self.permission_granted() {
            warn!("paste skipped, accessibility permission denied");
            return Err(InjectionError::PermissionDenied);
        }

        self.injector.send_paste_chord()?;
        debug!(content_type = item.content_type.label(), ?state, "paste injected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pasteboard::MemoryPasteboard;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    struct ScriptedActivator {
        front: Mutex<Option<String>>,
        activations: AtomicU32,
    }

    impl ScriptedActivator {
        fn new(front: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                front: Mutex::new(front.map(str::to_string)),
                activations: AtomicU32::new(0),
            })
        }
    }

    impl AppActivator for ScriptedActivator {
        fn frontmost(&self) -> Option<AppHandle> {
            self.front
                .lock()
                .clone()
                .map(|name| AppHandle { name })
        }

        fn activate(&self, app: &AppHandle) -> InjectionResult<()> {
            self.activations.fetch_add(1, Ordering::SeqCst);
            *self.front.lock() = Some(app.name.clone());
            Ok(())
        }
    }

    struct CountingInjector {
        sent: AtomicU32,
    }

    impl CountingInjector {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: AtomicU32::new(0),
            })
        }
    }

    impl KeystrokeInjector for CountingInjector {
        fn send_paste_chord(&self) -> InjectionResult<()> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct CountingGate {
        granted: AtomicBool,
        probes: AtomicU32,
    }

    impl CountingGate {
        fn new(granted: bool) -> Arc<Self> {
            Arc::new(Self {
                granted: AtomicBool::new(granted),
                probes: AtomicU32::new(0),
            })
        }
    }

    impl AccessibilityGate for CountingGate {
        fn is_trusted(&self) -> bool {
            self.probes.fetch_add(1, Ordering::SeqCst);
            self.granted.load(Ordering::SeqCst)
        }
    }

    fn zero_delays() -> DelayTable {
        DelayTable {
            frontmost_text: Duration::ZERO,
            frontmost_image: Duration::ZERO,
            activated_text: Duration::ZERO,
            activated_image: Duration::ZERO,
            no_target: Duration::ZERO,
        }
    }

    #[test]
    fn test_delay_table_defaults() {
        let delays = DelayTable::default();
        assert_eq!(
            delays.delay_for(TargetState::Frontmost, false),
            Duration::from_millis(20)
        );
        assert_eq!(
            delays.delay_for(TargetState::Frontmost, true),
            Duration::from_millis(50)
        );
        assert_eq!(
            delays.delay_for(TargetState::Activated, false),
            Duration::from_millis(100)
        );
        assert_eq!(
            delays.delay_for(TargetState::Activated, true),
            Duration::from_millis(150)
        );
        assert_eq!(
            delays.delay_for(TargetState::NoTarget, true),
            Duration::from_millis(50)
        );
    }

    #[test]
    fn test_paste_to_frontmost_target_skips_activation() {
        let pasteboard = Arc::new(MemoryPasteboard::new());
        let activator = ScriptedActivator::new(Some("Mail"));
        let injector = CountingInjector::new();
        let paste = PasteInjector::with_delays(
            pasteboard.clone(),
            activator.clone(),
            injector.clone(),
            CountingGate::new(true),
            zero_delays(),
        );

        let item = ClipboardItem::from_text("hello", "Notes");
        let target = AppHandle {
            name: "Mail".to_string(),
        };
        paste.paste(&item, Some(&target)).expect("paste");

        assert_eq!(activator.activations.load(Ordering::SeqCst), 0);
        assert_eq!(injector.sent.load(Ordering::SeqCst), 1);
        assert_eq!(
            pasteboard.read().expect("read"),
            Some(CapturedContent::Text("hello".to_string()))
        );
    }

    #[test]
    fn test_paste_activates_background_target() {
        let pasteboard = Arc::new(MemoryPasteboard::new());
        let activator = ScriptedActivator::new(Some("Safari"));
        let injector = CountingInjector::new();
        let paste = PasteInjector::with_delays(
            pasteboard,
            activator.clone(),
            injector.clone(),
            CountingGate::new(true),
            zero_delays(),
        );

        let item = ClipboardItem::from_text("hello", "Notes");
        let target = AppHandle {
            name: "Mail".to_string(),
        };
        paste.paste(&item, Some(&target)).expect("paste");

        assert_eq!(activator.activations.load(Ordering::SeqCst), 1);
        assert_eq!(injector.sent.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_denied_permission_skips_synthesis_but_keeps_content() {
        let pasteboard = Arc::new(MemoryPasteboard::new());
        let injector = CountingInjector::new();
        let paste = PasteInjector::with_delays(
            pasteboard.clone(),
            ScriptedActivator::new(None),
            injector.clone(),
            CountingGate::new(false),
            zero_delays(),
        );

        let item = ClipboardItem::from_text("manual paste", "Notes");
        let result = paste.paste(&item, None);

        assert!(matches!(result, Err(InjectionError::PermissionDenied)));
        assert_eq!(injector.sent.load(Ordering::SeqCst), 0);
        // Content stays available for a manual ⌘V.
        assert_eq!(
            pasteboard.read().expect("read"),
            Some(CapturedContent::Text("manual paste".to_string()))
        );
    }

    #[test]
    fn test_permission_probe_is_cached() {
        let gate = CountingGate::new(true);
        let injector = CountingInjector::new();
        let paste = PasteInjector::with_delays(
            Arc::new(MemoryPasteboard::new()),
            ScriptedActivator::new(None),
            injector,
            gate.clone(),
            zero_delays(),
        );

        let item = ClipboardItem::from_text("x", "A");
        paste.paste(&item, None).expect("paste");
        paste.paste(&item, None).expect("paste");
        paste.paste(&item, None).expect("paste");

        // Within the cache TTL the gate is probed once.
        assert_eq!(gate.probes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_file_item_pastes_file_url_not_display_path() {
        let pasteboard = Arc::new(MemoryPasteboard::new());
        let paste = PasteInjector::with_delays(
            pasteboard.clone(),
            ScriptedActivator::new(None),
            CountingInjector::new(),
            CountingGate::new(true),
            zero_delays(),
        );

        let item = ClipboardItem::from_file("file:///tmp/report.pdf", "/tmp/report.pdf", "Finder");
        paste.paste(&item, None).expect("paste");

        // The pasteboard gets the URL; the display path is picker-only.
        assert_eq!(
            pasteboard.read().expect("read"),
            Some(CapturedContent::FileUrl("file:///tmp/report.pdf".to_string()))
        );
    }

    #[test]
    fn test_invalidation_drops_cached_permission_answer() {
        let gate = CountingGate::new(false);
        let injector = CountingInjector::new();
        let paste = PasteInjector::with_delays(
            Arc::new(MemoryPasteboard::new()),
            ScriptedActivator::new(None),
            injector.clone(),
            gate.clone(),
            zero_delays(),
        );

        let item = ClipboardItem::from_text("x", "A");
        assert!(paste.paste(&item, None).is_err());

        // The grant arrives inside the TTL; without invalidation the stale
        // denial would keep winning.
        gate.granted.store(true, Ordering::SeqCst);
        assert!(paste.paste(&item, None).is_err());

        paste.invalidate_permission_cache();
        paste.paste(&item, None).expect("paste after grant");
        assert_eq!(injector.sent.load(Ordering::SeqCst), 1);
        assert_eq!(gate.probes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_image_item_written_as_image() {
        let pasteboard = Arc::new(MemoryPasteboard::new());
        let paste = PasteInjector::with_delays(
            pasteboard.clone(),
            ScriptedActivator::new(None),
            CountingInjector::new(),
            CountingGate::new(true),
            zero_delays(),
        );

        let item = ClipboardItem::from_image(vec![9, 8, 7], "Preview");
        paste.paste(&item, None).expect("paste");

        assert_eq!(
            pasteboard.read().expect("read"),
            Some(CapturedContent::Image(vec![9, 8, 7]))
        );
    }
}
