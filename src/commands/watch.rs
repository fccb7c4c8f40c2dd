use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::commands::convert::ConvertCommand;
use crate::commands::playlists::PlaylistsCommand;
use crate::config::{Config, ConvertOptions, PlaylistOptions};
use crate::watch::{DebouncedWatcher, Trigger};

/// Command that runs the configured pipelines once, then keeps watching
/// their input directories and re-runs a pipeline after each debounced burst
/// of changes, until interrupted.
pub struct WatchCommand {
    playlists: Option<PlaylistOptions>,
    convert: Option<ConvertOptions>,
    config: Config,
}

impl WatchCommand {
    pub fn new(
        playlists: Option<PlaylistOptions>,
        convert: Option<ConvertOptions>,
        config: Config,
    ) -> Self {
        Self {
            playlists,
            convert,
            config,
        }
    }

    pub async fn execute(&self) -> Result<()> {
        if self.playlists.is_none() && self.convert.is_none() {
            return Err(anyhow!(
                "Nothing to watch: pass --m3u-dir and/or --flac-dir"
            ));
        }

        let cancel = Arc::new(AtomicBool::new(false));
        {
            let cancel = Arc::clone(&cancel);
            tokio::spawn(async move {
                if signal::ctrl_c().await.is_ok() {
                    info!("Interrupt received, shutting down watchers");
                    cancel.store(true, Ordering::Relaxed);
                }
            });
        }

        // One full pass up front, then watch for changes.
        self.run_trigger(Trigger::Playlists, &cancel).await;
        self.run_trigger(Trigger::Convert, &cancel).await;

        let (trigger_tx, mut trigger_rx) = mpsc::channel(8);
        let mut watchers = Vec::new();

        if let Some(opts) = &self.playlists {
            watchers.push(DebouncedWatcher::spawn(
                &opts.input_dir,
                self.config.playlist_delay,
                Trigger::Playlists,
                trigger_tx.clone(),
                "playlist watcher",
            )?);
        }
        if let Some(opts) = &self.convert {
            watchers.push(DebouncedWatcher::spawn(
                &opts.source_dir,
                self.config.convert_delay,
                Trigger::Convert,
                trigger_tx.clone(),
                "source watcher",
            )?);
        }
        drop(trigger_tx);

        // Triggers are handled one at a time, so a pipeline never overlaps
        // itself or the other one.
        loop {
            if cancel.load(Ordering::Relaxed) {
                break;
            }
            tokio::select! {
                trigger = trigger_rx.recv() => {
                    match trigger {
                        Some(trigger) => self.run_trigger(trigger, &cancel).await,
                        None => break,
                    }
                }
                _ = tokio::time::sleep(self.config.watch_sleep) => {
                    debug!("Observing changes...");
                }
            }
        }

        drop(watchers);
        info!("Watch loop stopped");
        Ok(())
    }

    /// Run one pipeline; its failure is logged and does not stop watching.
    async fn run_trigger(&self, trigger: Trigger, cancel: &Arc<AtomicBool>) {
        if cancel.load(Ordering::Relaxed) {
            return;
        }
        match trigger {
            Trigger::Playlists => {
                if let Some(opts) = &self.playlists {
                    let cmd = PlaylistsCommand::new(opts.clone(), self.config.clone());
                    if let Err(e) = cmd.execute().await {
                        error!("Playlist rewrite failed: {:#}", e);
                    }
                }
            }
            Trigger::Convert => {
                if let Some(opts) = &self.convert {
                    let cmd = ConvertCommand::new(opts.clone(), self.config.clone());
                    if let Err(e) = cmd.run(Arc::clone(cancel)).await {
                        error!("Conversion run failed: {:#}", e);
                    }
                }
            }
        }
    }
}
