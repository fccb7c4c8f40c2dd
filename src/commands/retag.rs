use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal;
use tracing::{debug, info};

use crate::config::Config;
use crate::discover::find_music_files;
use crate::queue::JobQueue;
use crate::tags::{RetagOutcome, Retagger};
use crate::worker::WorkerPool;

/// Command to normalize genre tags across every music file under a
/// directory.
pub struct RetagCommand {
    dir: PathBuf,
    threads: usize,
    config: Config,
}

impl RetagCommand {
    pub fn new(dir: PathBuf, threads: usize, config: Config) -> Self {
        Self {
            dir,
            threads,
            config,
        }
    }

    pub async fn execute(&self) -> Result<()> {
        if !self.dir.exists() {
            return Err(anyhow!("Music directory does not exist: {:?}", self.dir));
        }
        if !self.dir.is_dir() {
            return Err(anyhow!("Path is not a directory: {:?}", self.dir));
        }
        which::which("ffprobe")
            .map_err(|_| anyhow!("ffprobe not found on the execution path, cannot read tags"))?;

        let cancel = Arc::new(AtomicBool::new(false));
        {
            let cancel = Arc::clone(&cancel);
            tokio::spawn(async move {
                if signal::ctrl_c().await.is_ok() {
                    info!("Interrupt received, letting in-flight jobs finish");
                    cancel.store(true, Ordering::Relaxed);
                }
            });
        }

        let mut queue = JobQueue::new();
        for path in find_music_files(&self.dir) {
            queue.enqueue(path);
        }
        info!("Queued {} files for genre normalization", queue.len());

        let retagger = Retagger::new(self.config.dry_run);
        let pool = WorkerPool::with_cancel_flag(self.threads, cancel);
        pool.run(queue, "retag", move |path| async move {
            match retagger.retag_file(&path).await? {
                RetagOutcome::Updated { from, to } => {
                    debug!("{:?}: genre {:?} -> {:?}", path, from, to);
                }
                outcome => debug!("{:?}: {:?}", path, outcome),
            }
            Ok(())
        })
        .await;

        info!("Genre normalization complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn nonexistent_directory_is_an_error() {
        let cmd = RetagCommand::new(PathBuf::from("/nonexistent/path"), 2, Config::default());
        assert!(cmd.execute().await.is_err());
    }
}
