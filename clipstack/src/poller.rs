//! Clipboard polling loop.
//!
//! The OS pasteboard has no change notification, so a 500ms tick compares
//! the change counter and reads content only when it moved. Self-captures
//! (the paste path writing an item back to the pasteboard) are suppressed
//! with a one-shot ignore flag armed before the write.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::models::ClipboardItem;
use crate::paste::AppActivator;
use crate::pasteboard::{CapturedContent, Pasteboard};

pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// What the polling loop emits.
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    NewItem(ClipboardItem),
}

pub struct ClipboardPoller {
    pasteboard: Arc<dyn Pasteboard>,
    activator: Arc<dyn AppActivator>,
    tx: mpsc::Sender<CaptureEvent>,
    token: CancellationToken,
    ignore_next: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ClipboardPoller {
    pub fn new(
        pasteboard: Arc<dyn Pasteboard>,
        activator: Arc<dyn AppActivator>,
        tx: mpsc::Sender<CaptureEvent>,
    ) -> Self {
        Self {
            pasteboard,
            activator,
            tx,
            token: CancellationToken::new(),
            ignore_next: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }

    /// Arm the one-shot suppression flag. The next observed change is
    /// swallowed (its counter still recorded) instead of captured.
    pub fn ignore_next_change(&self) {
        self.ignore_next.store(true, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the polling task. Idempotent; a second call while running is a
    /// no-op.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let pasteboard = Arc::clone(&self.pasteboard);
        let activator = Arc::clone(&self.activator);
        let tx = self.tx.clone();
        let token = self.token.clone();
        let ignore_next = Arc::clone(&self.ignore_next);
        let running = Arc::clone(&self.running);

        let task = tokio::spawn(async move {
            // Baseline: whatever is on the pasteboard at startup is not a
            // new capture.
            let mut last_seen = pasteboard.change_count();
            let mut interval = tokio::time::interval(POLL_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }

                let current = pasteboard.change_count();
                if current == last_seen {
                    continue;
                }
                last_seen = current;

                if ignore_next.swap(false, Ordering::SeqCst) {
                    debug!("self-capture suppressed");
                    continue;
                }

                let content = match pasteboard.read() {
                    Ok(Some(content)) => content,
                    Ok(None) => continue,
                    Err(e) => {
                        warn!(error = %e, "pasteboard read failed");
                        continue;
                    }
                };

                let source_app = activator
                    .frontmost()
                    .map(|app| app.name)
                    .unwrap_or_else(|| "Unknown".to_string());

                let item = match content {
                    CapturedContent::Text(text) => ClipboardItem::from_text(text, source_app),
                    CapturedContent::Image(png) => ClipboardItem::from_image(png, source_app),
                    CapturedContent::FileUrl(url) => {
                        let path = url::Url::parse(&url)
                            .ok()
                            .and_then(|parsed| parsed.to_file_path().ok())
                            .map(|path| path.display().to_string())
                            .unwrap_or_else(|| url.clone());
                        ClipboardItem::from_file(url, path, source_app)
                    }
                };

                if tx.send(CaptureEvent::NewItem(item)).await.is_err() {
                    // Receiver gone means the service is shutting down.
                    break;
                }
            }

            running.store(false, Ordering::SeqCst);
            debug!("clipboard poller stopped");
        });
        *self.task.lock() = Some(task);
    }

    /// Stop the polling task. The task is aborted, so no capture is
    /// emitted after this returns and `is_running` reads false right away.
    pub fn stop(&self) {
        self.token.cancel();
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paste::{AppActivator, AppHandle, InjectionResult};
    use crate::pasteboard::MemoryPasteboard;

    struct FixedFrontmost(&'static str);

    impl AppActivator for FixedFrontmost {
        fn frontmost(&self) -> Option<AppHandle> {
            Some(AppHandle {
                name: self.0.to_string(),
            })
        }

        fn activate(&self, _app: &AppHandle) -> InjectionResult<()> {
            Ok(())
        }
    }

    fn poller_fixture() -> (
        Arc<MemoryPasteboard>,
        ClipboardPoller,
        mpsc::Receiver<CaptureEvent>,
    ) {
        let pasteboard = Arc::new(MemoryPasteboard::new());
        let (tx, rx) = mpsc::channel(16);
        let poller = ClipboardPoller::new(
            pasteboard.clone() as Arc<dyn Pasteboard>,
            Arc::new(FixedFrontmost("Safari")),
            tx,
        );
        (pasteboard, poller, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_after_external_change() {
        let (pasteboard, poller, mut rx) = poller_fixture();
        poller.start();
        tokio::task::yield_now().await;

        pasteboard.set_external(CapturedContent::Text("copied".to_string()));
        tokio::time::advance(POLL_INTERVAL).await;

        let CaptureEvent::NewItem(item) = rx.recv().await.expect("captured item");
        assert_eq!(item.plain_text.as_deref(), Some("copied"));
        assert_eq!(item.source_app, "Safari");
        poller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_counter_produces_nothing() {
        let (pasteboard, poller, mut rx) = poller_fixture();
        pasteboard.set_external(CapturedContent::Text("pre-existing".to_string()));
        poller.start();
        tokio::task::yield_now().await;

        // Content never changes after the baseline snapshot.
        for _ in 0..4 {
            tokio::time::advance(POLL_INTERVAL).await;
        }
        assert!(rx.try_recv().is_err());
        poller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_ignore_next_suppresses_one_change() {
        let (pasteboard, poller, mut rx) = poller_fixture();
        poller.start();
        tokio::task::yield_now().await;

        poller.ignore_next_change();
        pasteboard.set_external(CapturedContent::Text("self paste".to_string()));
        tokio::time::advance(POLL_INTERVAL).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());

        // The flag is one-shot: the following change is captured.
        pasteboard.set_external(CapturedContent::Text("real copy".to_string()));
        tokio::time::advance(POLL_INTERVAL).await;
        let CaptureEvent::NewItem(item) = rx.recv().await.expect("captured item");
        assert_eq!(item.plain_text.as_deref(), Some("real copy"));
        poller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_ends_polling() {
        let (pasteboard, poller, mut rx) = poller_fixture();
        poller.start();
        tokio::task::yield_now().await;
        assert!(poller.is_running());

        // No yield between stop and the assertion: teardown is synchronous.
        poller.stop();
        assert!(!poller.is_running());

        pasteboard.set_external(CapturedContent::Text("after stop".to_string()));
        tokio::time::advance(POLL_INTERVAL).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }
}
