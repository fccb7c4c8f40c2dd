use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal;
use tracing::{debug, error, info, warn};

use crate::config::{Config, ConvertOptions};
use crate::discover::{find_flac_files, find_music_files, remove_trash_files};
use crate::encode::Encoder;
use crate::job::TranscodeJob;
use crate::queue::JobQueue;
use crate::sync::SyncClient;
use crate::tags::{Retagger, RetagOutcome};
use crate::worker::WorkerPool;

/// Command sequencing one conversion run: trash cleanup, discovery, the
/// transcode pool, an optional retag pool, and an optional move of processed
/// directories.
pub struct ConvertCommand {
    opts: ConvertOptions,
    config: Config,
}

impl ConvertCommand {
    pub fn new(opts: ConvertOptions, config: Config) -> Self {
        Self { opts, config }
    }

    /// Run standalone: installs a Ctrl-C handler that flips the shared
    /// cancellation flag.
    pub async fn execute(&self) -> Result<()> {
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
        self.run(cancel).await
    }

    /// Run with an externally owned cancellation flag (used by `watch`).
    pub async fn run(&self, cancel: Arc<AtomicBool>) -> Result<()> {
        let source_dir = &self.opts.source_dir;
        if !source_dir.exists() {
            return Err(anyhow!("Source directory does not exist: {:?}", source_dir));
        }
        if !source_dir.is_dir() {
            return Err(anyhow!("Path is not a directory: {:?}", source_dir));
        }

        if self.syncing() {
            info!("Sync in progress, skipping conversion for this run");
            return Ok(());
        }

        // Each phase fails on its own; a missing encoder must not stop the
        // retag or move phases.
        if let Err(e) = self.convert_phase(&cancel).await {
            error!("Convert phase failed: {:#}", e);
        }

        if self.opts.retag && !cancel.load(Ordering::Relaxed) {
            // Retag failures must not abort the move phase.
            if let Err(e) = self.retag_phase(&cancel).await {
                error!("Retag phase failed: {:#}", e);
            }
        }

        if self.opts.move_to.is_some() && !cancel.load(Ordering::Relaxed) {
            if self.syncing() {
                info!("Sync in progress, skipping move for this run");
            } else if let Err(e) = self.move_phase().await {
                error!("Move phase failed: {:#}", e);
            }
        }

        Ok(())
    }

    fn syncing(&self) -> bool {
        self.opts
            .sync_dir
            .as_ref()
            .is_some_and(|dir| SyncClient::new(dir).is_syncing())
    }

    async fn convert_phase(&self, cancel: &Arc<AtomicBool>) -> Result<()> {
        // Tool missing is fatal to this phase only.
        let encoder = Encoder::resolve()?;

        remove_trash_files(&self.opts.source_dir, self.config.dry_run)?;

        let mut queue = JobQueue::new();
        for source in find_flac_files(&self.opts.source_dir) {
            queue.enqueue(TranscodeJob::for_source(source));
        }
        info!("Queued {} conversion jobs", queue.len());

        let overwrite = self.opts.overwrite_existing;
        let delete_source = self.opts.delete_source;
        let dry_run = self.config.dry_run;

        let pool = WorkerPool::with_cancel_flag(self.opts.threads, Arc::clone(cancel));
        pool.run(queue, "convert", move |job| async move {
            process_job(encoder, job, overwrite, delete_source, dry_run).await
        })
        .await;

        info!("Conversion pool finished");
        Ok(())
    }

    async fn retag_phase(&self, cancel: &Arc<AtomicBool>) -> Result<()> {
        let mut queue = JobQueue::new();
        for path in find_music_files(&self.opts.source_dir) {
            queue.enqueue(path);
        }
        info!("Queued {} files for genre normalization", queue.len());

        let retagger = Retagger::new(self.config.dry_run);
        let pool = WorkerPool::with_cancel_flag(self.opts.threads, Arc::clone(cancel));
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

        info!("Retag pool finished");
        Ok(())
    }

    /// Move processed top-level subdirectories into the holding directory,
    /// skipping hidden and system entries.
    async fn move_phase(&self) -> Result<()> {
        let Some(move_to) = &self.opts.move_to else {
            return Ok(());
        };

        let mut moved = 0;
        let mut entries = tokio::fs::read_dir(&self.opts.source_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.starts_with('.') || !path.is_dir() {
                continue;
            }

            let target = move_to.join(name);
            if self.config.dry_run {
                info!("[dry-run] Would move {:?} -> {:?}", path, target);
                moved += 1;
                continue;
            }
            tokio::fs::create_dir_all(move_to).await?;
            match tokio::fs::rename(&path, &target).await {
                Ok(()) => {
                    info!("Moved {:?} -> {:?}", path, target);
                    moved += 1;
                }
                Err(e) => warn!("Failed to move {:?} -> {:?}: {}", path, target, e),
            }
        }

        if moved == 0 {
            debug!("No processed directories to move");
        }
        Ok(())
    }
}

/// Handle one transcode job according to the overwrite/delete policy.
///
/// The source is deleted after an attempt even when the encoder failed, so a
/// corrupt input is not reprocessed forever (best effort, no retry). A job
/// skipped because the destination already exists leaves the source alone.
async fn process_job(
    encoder: Encoder,
    job: TranscodeJob,
    overwrite_existing: bool,
    delete_source: bool,
    dry_run: bool,
) -> Result<()> {
    if job.destination_exists() {
        if overwrite_existing {
            info!("{:?} exists, deleting before conversion", job.destination);
            if !dry_run {
                tokio::fs::remove_file(&job.destination).await?;
            }
        } else {
            debug!("{:?} already exists, skipping", job.destination);
            return Ok(());
        }
    }

    info!("Converting {:?} -> {:?}", job.source, job.destination);
    if dry_run {
        return Ok(());
    }

    let result = encoder.transcode(&job.source, &job.destination).await;

    if delete_source {
        debug!("Deleting source {:?}", job.source);
        if let Err(e) = tokio::fs::remove_file(&job.source).await {
            warn!("Failed to delete source {:?}: {}", job.source, e);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn options(source_dir: PathBuf) -> ConvertOptions {
        ConvertOptions {
            source_dir,
            overwrite_existing: false,
            delete_source: false,
            threads: 2,
            retag: false,
            sync_dir: None,
            move_to: None,
        }
    }

    #[tokio::test]
    async fn nonexistent_directory_is_an_error() {
        let cmd = ConvertCommand::new(
            options(PathBuf::from("/nonexistent/path")),
            Config::default(),
        );
        assert!(cmd.execute().await.is_err());
    }

    #[tokio::test]
    async fn sync_in_progress_skips_the_whole_run() {
        let dir = TempDir::new().unwrap();
        let sync_temp = dir.path().join(".sync");
        fs::create_dir(&sync_temp).unwrap();
        fs::write(sync_temp.join("album.!.sync"), "x").unwrap();
        fs::write(dir.path().join("track.flac"), "x").unwrap();

        let mut opts = options(dir.path().to_path_buf());
        opts.sync_dir = Some(dir.path().to_path_buf());

        // Succeeds as a clean skip even though no encoder may be installed.
        let cmd = ConvertCommand::new(opts, Config::default());
        cmd.execute().await.unwrap();
        assert!(dir.path().join("track.flac").exists());
        assert!(!dir.path().join("track.m4a").exists());
    }

    #[tokio::test]
    async fn existing_destination_without_overwrite_skips_and_keeps_source() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("track.flac");
        let destination = dir.path().join("track.m4a");
        fs::write(&source, "flac bytes").unwrap();
        fs::write(&destination, "existing output").unwrap();

        // The job skips before the encoder is invoked, so the concrete
        // backend is irrelevant.
        let encoder = Encoder::fixed(crate::encode::EncoderKind::Ffmpeg);

        let job = TranscodeJob::for_source(source.clone());
        process_job(encoder, job, false, true, false).await.unwrap();

        assert!(source.exists(), "skip must leave the source untouched");
        assert_eq!(
            fs::read_to_string(&destination).unwrap(),
            "existing output"
        );
    }

    #[tokio::test]
    async fn move_phase_relocates_visible_subdirectories() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("sync");
        let holding = dir.path().join("_TO_PROCESS");
        fs::create_dir_all(source.join("Album A")).unwrap();
        fs::create_dir_all(source.join(".hidden")).unwrap();
        fs::write(source.join("Album A/track.m4a"), "x").unwrap();
        fs::write(source.join("loose-file.txt"), "x").unwrap();

        let mut opts = options(source.clone());
        opts.move_to = Some(holding.clone());
        let cmd = ConvertCommand::new(opts, Config::default());
        cmd.move_phase().await.unwrap();

        assert!(holding.join("Album A/track.m4a").exists());
        assert!(!source.join("Album A").exists());
        assert!(source.join(".hidden").exists());
        assert!(source.join("loose-file.txt").exists());
    }
}
