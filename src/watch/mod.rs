use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info};

/// Which pipeline a watcher fire should re-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Playlists,
    Convert,
}

/// Watches one directory (non-recursive) for file creations and debounces
/// bursts into a single trigger.
///
/// State machine: idle until a creation event arms a deadline `delay` ahead;
/// every further event re-arms it; when the deadline passes, one trigger is
/// sent and the watcher returns to idle. A burst of N events therefore fires
/// exactly once, `delay` after the last event, so files still being written
/// are not picked up.
pub struct DebouncedWatcher {
    // Dropping the notify watcher stops event delivery.
    _watcher: RecommendedWatcher,
    task: tokio::task::JoinHandle<()>,
}

impl DebouncedWatcher {
    pub fn spawn(
        dir: &Path,
        delay: Duration,
        trigger: Trigger,
        trigger_tx: mpsc::Sender<Trigger>,
        name: &'static str,
    ) -> Result<Self> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| match res {
                Ok(event) => {
                    // Only creations count; modify/remove/access are noise here.
                    if matches!(event.kind, EventKind::Create(_)) {
                        let _ = event_tx.send(());
                    }
                }
                Err(e) => error!("Watch error: {}", e),
            },
            notify::Config::default(),
        )
        .context("failed to create filesystem watcher")?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("failed to watch {dir:?}"))?;
        info!("{}: watching {:?} (delay {:?})", name, dir, delay);

        let task = tokio::spawn(debounce_loop(event_rx, delay, trigger, trigger_tx, name));

        Ok(Self {
            _watcher: watcher,
            task,
        })
    }
}

impl Drop for DebouncedWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Collapse bursts of events into one trigger per quiet period.
async fn debounce_loop(
    mut events: mpsc::UnboundedReceiver<()>,
    delay: Duration,
    trigger: Trigger,
    trigger_tx: mpsc::Sender<Trigger>,
    name: &str,
) {
    loop {
        // Idle: wait for the first event of a burst.
        if events.recv().await.is_none() {
            return;
        }
        debug!("{}: change detected, debouncing for {:?}", name, delay);

        // Pending: every further event pushes the deadline out again.
        let mut deadline = Instant::now() + delay;
        loop {
            match timeout_at(deadline, events.recv()).await {
                Ok(Some(())) => {
                    debug!("{}: another change, rescheduling", name);
                    deadline = Instant::now() + delay;
                }
                Ok(None) => return,
                Err(_) => {
                    info!("{}: quiet period elapsed, triggering {:?}", name, trigger);
                    if trigger_tx.send(trigger).await.is_err() {
                        return;
                    }
                    break;
                }
            }
        }
    }
}
