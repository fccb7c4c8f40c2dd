use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for application behavior, built once in `main`
/// and passed immutably into every command.
#[derive(Debug, Clone)]
pub struct Config {
    /// Log intended changes without touching the filesystem.
    pub dry_run: bool,
    /// Quiet period after the last playlist-directory event before rewriting.
    pub playlist_delay: Duration,
    /// Quiet period after the last source-directory event before converting.
    pub convert_delay: Duration,
    /// Idle heartbeat interval of the watch loop.
    pub watch_sleep: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dry_run: false,
            playlist_delay: Duration::from_secs(20),
            convert_delay: Duration::from_secs(120),
            watch_sleep: Duration::from_secs(30),
        }
    }
}

/// Options for one playlist-rewrite pass.
#[derive(Debug, Clone)]
pub struct PlaylistOptions {
    pub input_dir: PathBuf,
    /// Rewritten playlists land here; next to the originals when `None`.
    pub output_dir: Option<PathBuf>,
    /// Rewrite `.flac` entries to `.m4a`.
    pub flac_to_alac: bool,
    /// Rewrite Windows path separators to Posix.
    pub windows_to_posix: bool,
    /// Literal from -> to substring replacement applied to every entry.
    pub substitute: Option<(String, String)>,
    /// Prepended to output playlist filenames.
    pub prefix: Option<String>,
}

/// Options for one FLAC -> ALAC conversion pass.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub source_dir: PathBuf,
    /// Delete an already-present destination before converting; skip the job
    /// when false.
    pub overwrite_existing: bool,
    /// Remove the source file after a conversion attempt, successful or not.
    pub delete_source: bool,
    pub threads: usize,
    /// Run the genre normalizer over the source dir after converting.
    pub retag: bool,
    /// Sync-client root; conversion and move are skipped while it reports a
    /// transfer in progress.
    pub sync_dir: Option<PathBuf>,
    /// Holding directory for processed top-level subdirectories.
    pub move_to: Option<PathBuf>,
}
