//! ClipboardService - the composition root the UI layer talks to.
//!
//! Owns the history, the poller, the hotkey router, the paste injector and
//! the permission monitor, and wires their channels together. All mutation
//! funnels through here so persistence and change events stay consistent.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::history::HistoryStore;
use crate::hotkey::{
    HotkeyBackend, HotkeyRouter, InterceptingBackend, ObservingBackend, RetryPolicy, Sleeper,
    TokioSleeper,
};
use crate::interface::{
    Category, ClipStackError, ClipboardServiceApi, PermissionStatus, ShortcutConflict,
    ShortcutSpec, ShortcutSuggestion, UiEvent,
};
use crate::models::ClipboardItem;
use crate::paste::{
    AppActivator, AppHandle, EnigoInjector, KeystrokeInjector, PasteInjector, SystemAppActivator,
};
use crate::pasteboard::{Pasteboard, SystemPasteboard};
use crate::permission::{AccessibilityGate, PermissionMonitor, SystemAccessibilityGate};
use crate::poller::{CaptureEvent, ClipboardPoller};
use crate::settings::Settings;
use crate::storage::{self, SettingsStore};

/// Fallback runtime for callers outside any runtime context (the UI layer
/// calls in from its own threads). Shared across all service instances and
/// never dropped.
static FALLBACK_RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to create fallback tokio runtime")
});

fn runtime_handle() -> tokio::runtime::Handle {
    tokio::runtime::Handle::try_current().unwrap_or_else(|_| FALLBACK_RUNTIME.handle().clone())
}

/// Major version of the host OS, used for backend selection.
#[cfg(target_os = "macos")]
fn os_major_version() -> u32 {
    std::process::Command::new("sw_vers")
        .arg("-productVersion")
        .output()
        .ok()
        .and_then(|output| {
            String::from_utf8_lossy(&output.stdout)
                .trim()
                .split('.')
                .next()
                .and_then(|major| major.parse().ok())
        })
        .unwrap_or(12)
}

#[cfg(not(target_os = "macos"))]
fn os_major_version() -> u32 {
    12
}

/// Build the fired-hotkey handler backends call from their capture
/// threads, paired with the receiver the service drains.
pub fn hotkey_fire_channel() -> (Arc<dyn Fn() + Send + Sync>, mpsc::UnboundedReceiver<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handler: Arc<dyn Fn() + Send + Sync> = Arc::new(move || {
        let _ = tx.send(());
    });
    (handler, rx)
}

/// Everything the service composes over, behind trait seams so tests can
/// substitute in-process fakes for each OS surface.
pub struct ServiceComponents {
    pub pasteboard: Arc<dyn Pasteboard>,
    pub activator: Arc<dyn AppActivator>,
    pub keystrokes: Arc<dyn KeystrokeInjector>,
    pub gate: Arc<dyn AccessibilityGate>,
    pub intercepting: Arc<dyn HotkeyBackend>,
    pub observing: Arc<dyn HotkeyBackend>,
    pub fire_rx: mpsc::UnboundedReceiver<()>,
    pub sleeper: Arc<dyn Sleeper>,
    pub policy: RetryPolicy,
    pub os_major: u32,
}

pub struct ClipboardService {
    history: Arc<RwLock<HistoryStore>>,
    store: Arc<SettingsStore>,
    settings: Mutex<Settings>,
    poller: ClipboardPoller,
    router: Arc<HotkeyRouter>,
    injector: Arc<PasteInjector>,
    monitor: Arc<PermissionMonitor>,
    activator: Arc<dyn AppActivator>,
    events: broadcast::Sender<UiEvent>,
    selected_category: RwLock<Category>,
    window_visible: AtomicBool,
    last_target: Arc<Mutex<Option<AppHandle>>>,
    save_tx: mpsc::Sender<()>,
    save_rx: Mutex<Option<mpsc::Receiver<()>>>,
    capture_rx: Mutex<Option<mpsc::Receiver<CaptureEvent>>>,
    fire_rx: Mutex<Option<mpsc::UnboundedReceiver<()>>>,
    token: CancellationToken,
}

impl ClipboardService {
    /// Create a service against the real OS surfaces.
    pub fn new<P: AsRef<Path>>(storage_path: P) -> Result<Arc<Self>, ClipStackError> {
        let store = SettingsStore::open(storage_path)?;
        let pasteboard: Arc<dyn Pasteboard> = Arc::new(SystemPasteboard::new()?);
        let (handler, fire_rx) = hotkey_fire_channel();
        let components = ServiceComponents {
            pasteboard,
            activator: Arc::new(SystemAppActivator),
            keystrokes: Arc::new(EnigoInjector),
            gate: Arc::new(SystemAccessibilityGate),
            intercepting: Arc::new(InterceptingBackend::new(Arc::clone(&handler))),
            observing: Arc::new(ObservingBackend::new(handler)),
            fire_rx,
            sleeper: Arc::new(TokioSleeper),
            policy: RetryPolicy::default(),
            os_major: os_major_version(),
        };
        Ok(Self::with_components(store, components))
    }

    /// Create a service from explicit components. The entry point tests
    /// and the UI harness share.
    pub fn with_components(store: SettingsStore, components: ServiceComponents) -> Arc<Self> {
        let store = Arc::new(store);
        let settings = Settings::load(&store);
        // Materialize defaults so a first run writes a complete file.
        settings.save(&store);

        let history = Arc::new(RwLock::new(HistoryStore::with_items(
            store.load_history(),
            settings.max_history_items,
            settings.max_history_days,
        )));

        let (events, _) = broadcast::channel(256);
        let (capture_tx, capture_rx) = mpsc::channel(64);
        let (save_tx, save_rx) = mpsc::channel(32);

        let poller = ClipboardPoller::new(
            Arc::clone(&components.pasteboard),
            Arc::clone(&components.activator),
            capture_tx,
        );
        let monitor = Arc::new(PermissionMonitor::new(Arc::clone(&components.gate)));
        let router = Arc::new(HotkeyRouter::new(
            components.intercepting,
            components.observing,
            Arc::clone(&components.gate),
            components.sleeper,
            components.policy,
            events.clone(),
            components.os_major,
            settings.shortcut.clone(),
        ));
        let injector = Arc::new(PasteInjector::new(
            Arc::clone(&components.pasteboard),
            Arc::clone(&components.activator),
            components.keystrokes,
            components.gate,
        ));

        Arc::new(Self {
            history,
            store,
            settings: Mutex::new(settings),
            poller,
            router,
            injector,
            monitor,
            activator: components.activator,
            events,
            selected_category: RwLock::new(Category::All),
            window_visible: AtomicBool::new(false),
            last_target: Arc::new(Mutex::new(None)),
            save_tx,
            save_rx: Mutex::new(Some(save_rx)),
            capture_rx: Mutex::new(Some(capture_rx)),
            fire_rx: Mutex::new(Some(components.fire_rx)),
            token: CancellationToken::new(),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.events.subscribe()
    }

    /// Start the background machinery: autosave, capture loop, permission
    /// monitor, hotkey registration. Idempotent per channel; the receivers
    /// are taken once.
    pub fn start(self: &Arc<Self>) {
        let handle = runtime_handle();
        let _guard = handle.enter();

        if let Some(save_rx) = self.save_rx.lock().take() {
            storage::spawn_autosave(
                Arc::clone(&self.store),
                save_rx,
                self.token.child_token(),
            );
        }

        if let Some(mut capture_rx) = self.capture_rx.lock().take() {
            let service = Arc::clone(self);
            tokio::spawn(async move {
                while let Some(CaptureEvent::NewItem(item)) = capture_rx.recv().await {
                    service.add_item(item);
                }
            });
        }

        if let Some(mut fire_rx) = self.fire_rx.lock().take() {
            let service = Arc::clone(self);
            tokio::spawn(async move {
                while fire_rx.recv().await.is_some() {
                    service.on_hotkey_fired();
                }
            });
        }

        self.poller.start();
        self.monitor.start();
        self.router.spawn_permission_watch(self.monitor.subscribe());

        // A permission transition outdates the paste path's cached answer
        // before its TTL does.
        {
            let injector = Arc::clone(&self.injector);
            let mut permission_rx = self.monitor.subscribe();
            let token = self.token.child_token();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        changed = permission_rx.changed() => {
                            if changed.is_err() {
                                break;
                            }
                            injector.invalidate_permission_cache();
                        }
                    }
                }
            });
        }

        let router = Arc::clone(&self.router);
        tokio::spawn(async move {
            router.register().await;
        });

        info!("clipboard service started");
    }

    /// Stop everything and flush pending state. Safe to call more than
    /// once.
    pub fn shutdown(&self) {
        self.token.cancel();
        self.poller.stop();
        self.monitor.stop();
        self.router.shutdown();
        if let Err(e) = self.store.flush() {
            warn!(error = %e, "final flush failed during shutdown");
        }
        info!("clipboard service stopped");
    }

    /// Apply changed settings: history limits take effect immediately, a
    /// changed shortcut re-runs the registration sequence.
    pub fn update_settings(&self, new_settings: Settings) {
        let shortcut_changed = {
            let mut current = self.settings.lock();
            let changed = current.shortcut != new_settings.shortcut;
            *current = new_settings.clone();
            changed
        };

        {
            let mut history = self.history.write();
            history.set_limits(
                new_settings.max_history_items,
                new_settings.max_history_days,
            );
            history.sweep_expired(crate::interface::now_utc());
            history.enforce_limit();
        }
        new_settings.save(&self.store);
        self.persist();
        let _ = self.events.send(UiEvent::HistoryChanged);

        if shortcut_changed {
            let router = Arc::clone(&self.router);
            let spec = new_settings.shortcut;
            let handle = runtime_handle();
            handle.spawn(async move {
                router.shortcut_changed(spec).await;
            });
        }
    }

    pub fn settings(&self) -> Settings {
        self.settings.lock().clone()
    }

    pub fn registration_state(&self) -> crate::interface::RegistrationState {
        self.router.state()
    }

    fn persist(&self) {
        let items = self.history.read().items().to_vec();
        self.store.save_history(&items);
        // A full debounce queue means a save is already pending.
        let _ = self.save_tx.try_send(());
    }

    fn on_hotkey_fired(&self) {
        let target = self.activator.frontmost();
        *self.last_target.lock() = target.clone();
        let _ = self.events.send(UiEvent::HotkeyFired {
            target_app: target.map(|app| app.name),
        });
    }
}

impl ClipboardServiceApi for ClipboardService {
    fn add_item(&self, item: ClipboardItem) {
        self.history.write().add_item(item);
        self.persist();
        let _ = self.events.send(UiEvent::HistoryChanged);
    }

    fn delete_item(&self, id: Uuid) -> Result<(), ClipStackError> {
        if !self.history.write().delete_item(&id) {
            return Err(ClipStackError::ItemNotFound(id));
        }
        self.persist();
        let _ = self.events.send(UiEvent::HistoryChanged);
        Ok(())
    }

    fn toggle_pin(&self, id: Uuid) -> Result<(), ClipStackError> {
        if self.history.write().toggle_pin(&id).is_none() {
            return Err(ClipStackError::ItemNotFound(id));
        }
        self.persist();
        let _ = self.events.send(UiEvent::HistoryChanged);
        Ok(())
    }

    fn clear_history(&self) {
        self.history.write().clear_history();
        self.persist();
        let _ = self.events.send(UiEvent::HistoryChanged);
    }

    fn filtered_items(&self, category: Category) -> Vec<ClipboardItem> {
        self.history.read().filtered(category)
    }

    fn recent_items(&self, n: usize) -> Vec<ClipboardItem> {
        let category = *self.selected_category.read();
        self.history.read().recent(category, n)
    }

    fn items(&self) -> Vec<ClipboardItem> {
        self.history.read().items().to_vec()
    }

    fn paste_item(&self, id: Uuid) -> Result<(), ClipStackError> {
        let item = self
            .history
            .read()
            .get(&id)
            .cloned()
            .ok_or(ClipStackError::ItemNotFound(id))?;

        self.history.write().touch_use(&id);
        self.persist();

        // Our own pasteboard write must not come back as a capture.
        self.poller.ignore_next_change();

        let target = self.last_target.lock().clone();
        self.injector.paste(&item, target.as_ref())?;

        let _ = self.events.send(UiEvent::ItemPasted {
            id,
            content_type: item.content_type,
        });
        self.set_window_visible(false);
        Ok(())
    }

    fn selected_category(&self) -> Category {
        *self.selected_category.read()
    }

    fn set_selected_category(&self, category: Category) {
        *self.selected_category.write() = category;
    }

    fn is_window_visible(&self) -> bool {
        self.window_visible.load(Ordering::SeqCst)
    }

    fn set_window_visible(&self, visible: bool) {
        self.window_visible.store(visible, Ordering::SeqCst);
    }

    fn check_shortcut_conflict(&self, spec: &ShortcutSpec) -> ShortcutConflict {
        self.router.check_conflict(spec)
    }

    fn suggest_alternative_shortcuts(&self, original: &ShortcutSpec) -> Vec<ShortcutSuggestion> {
        self.router.suggest_alternatives(original)
    }

    fn get_accessibility_permission_status(&self) -> PermissionStatus {
        let granted = self.monitor.current();
        PermissionStatus {
            granted,
            prompt_pending: !granted,
        }
    }

    fn check_permission_immediately(&self) -> bool {
        self.monitor.check_immediately()
    }

    fn export_backup(&self, path: &Path) -> Result<(), ClipStackError> {
        let items = self.history.read().items().to_vec();
        storage::export_backup(path, &items, self.store.settings_snapshot())?;
        info!(path = %path.display(), count = items.len(), "backup exported");
        Ok(())
    }

    fn import_backup(&self, path: &Path) -> Result<usize, ClipStackError> {
        let backup = storage::import_backup(path)?;
        let count = backup.items.len();

        self.store.merge_settings(backup.settings);
        let new_settings = Settings::load(&self.store);
        {
            let mut history = self.history.write();
            history.set_limits(
                new_settings.max_history_items,
                new_settings.max_history_days,
            );
            history.replace_all(backup.items);
        }
        *self.settings.lock() = new_settings;

        self.persist();
        let _ = self.events.send(UiEvent::HistoryChanged);
        info!(count, "backup imported");
        Ok(count)
    }
}
