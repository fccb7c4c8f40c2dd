//! # footunes - Music Library Maintenance CLI
//!
//! Keeps a Foobar2000-managed music library usable from other players:
//! rewrites `.m3u8` playlists for other platforms, batch-converts FLAC to
//! ALAC through external encoders, normalizes genre tags to a common set,
//! and can watch directories to re-run those pipelines after changes settle.
//!
//! ## Usage
//!
//! ```bash
//! # Rewrite playlists for an ALAC library
//! footunes playlists /playlists/windows -o /playlists/alac --flac-to-alac
//!
//! # Convert .flac files to .m4a with 4 workers
//! footunes convert /sync/flacs --threads 4 --delete-original --retag
//!
//! # Normalize genre tags only
//! footunes retag /music
//!
//! # Keep watching both directories
//! footunes watch --m3u-dir /playlists/windows --flac-dir /sync/flacs
//!
//! # Delete sync litter (._* and .DS_Store files)
//! footunes clean /sync/flacs
//! ```

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use footunes::commands::{
    clean::CleanCommand, convert::ConvertCommand, playlists::PlaylistsCommand,
    retag::RetagCommand, watch::WatchCommand,
};
use footunes::config::{Config, ConvertOptions, PlaylistOptions};

/// footunes - Foobar2000 music library maintenance CLI
#[derive(Parser)]
#[command(
    name = "footunes",
    about = "Playlist rewriting, FLAC to ALAC conversion and genre tag normalization",
    version
)]
struct Cli {
    /// Log intended changes without writing anything
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Playlist transform flags shared by `playlists` and `watch`.
#[derive(Args, Debug, Clone)]
struct PlaylistFlags {
    /// Directory to write rewritten playlists into (defaults to in place)
    #[arg(long, short = 'o')]
    output_dir: Option<PathBuf>,
    /// Rewrite .flac entries to .m4a
    #[arg(long)]
    flac_to_alac: bool,
    /// Rewrite Windows path separators to Posix
    #[arg(long)]
    windows_to_posix: bool,
    /// Substring to replace in every playlist entry
    #[arg(long, requires = "to_str")]
    from_str: Option<String>,
    /// Replacement for --from-str
    #[arg(long, requires = "from_str")]
    to_str: Option<String>,
    /// Prefix for output playlist filenames (e.g. "_" to sort them first)
    #[arg(long)]
    prefix: Option<String>,
}

impl PlaylistFlags {
    fn into_options(self, input_dir: PathBuf) -> PlaylistOptions {
        PlaylistOptions {
            input_dir,
            output_dir: self.output_dir,
            flac_to_alac: self.flac_to_alac,
            windows_to_posix: self.windows_to_posix,
            substitute: self.from_str.zip(self.to_str),
            prefix: self.prefix,
        }
    }
}

/// Conversion policy flags shared by `convert` and `watch`.
#[derive(Args, Debug, Clone)]
struct ConvertFlags {
    /// Overwrite destination files that already exist
    #[arg(long)]
    overwrite: bool,
    /// Delete the source file after a conversion attempt
    #[arg(long)]
    delete_original: bool,
    /// Number of concurrent conversion workers
    #[arg(long, short = 't', default_value_t = 4, env = "FOOTUNES_THREADS")]
    threads: usize,
    /// Normalize genre tags after converting
    #[arg(long)]
    retag: bool,
    /// Sync-client root; skip converting/moving while a transfer is running
    #[arg(long)]
    sync_dir: Option<PathBuf>,
    /// Move processed top-level subdirectories into this holding directory
    #[arg(long)]
    move_to: Option<PathBuf>,
}

impl ConvertFlags {
    fn into_options(self, source_dir: PathBuf) -> ConvertOptions {
        ConvertOptions {
            source_dir,
            overwrite_existing: self.overwrite,
            delete_source: self.delete_original,
            threads: self.threads,
            retag: self.retag,
            sync_dir: self.sync_dir,
            move_to: self.move_to,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite managed .m3u8 playlists for another platform or library
    Playlists {
        /// Directory containing the playlists to rewrite
        input_dir: PathBuf,
        #[command(flatten)]
        flags: PlaylistFlags,
    },
    /// Convert .flac files under a directory to ALAC (.m4a)
    Convert {
        /// Directory scanned recursively for .flac sources
        source_dir: PathBuf,
        #[command(flatten)]
        flags: ConvertFlags,
    },
    /// Normalize genre tags of every music file under a directory
    Retag {
        /// Directory scanned recursively for .flac/.mp3/.m4a files
        dir: PathBuf,
        /// Number of concurrent tagging workers
        #[arg(long, short = 't', default_value_t = 4, env = "FOOTUNES_THREADS")]
        threads: usize,
    },
    /// Watch directories and re-run the pipelines after changes settle
    Watch {
        /// Playlist directory to watch and rewrite
        #[arg(long)]
        m3u_dir: Option<PathBuf>,
        #[command(flatten)]
        playlist_flags: PlaylistFlags,
        /// FLAC source directory to watch and convert
        #[arg(long)]
        flac_dir: Option<PathBuf>,
        #[command(flatten)]
        convert_flags: ConvertFlags,
        /// Seconds of quiet before rewriting playlists
        #[arg(long, default_value_t = 20)]
        playlist_delay: u64,
        /// Seconds of quiet before converting; keep this generous so files
        /// still being copied in are not picked up
        #[arg(long, default_value_t = 120)]
        convert_delay: u64,
        /// Seconds between idle heartbeats of the watch loop
        #[arg(long, default_value_t = 30, env = "FOOTUNES_WATCH_SLEEP")]
        watch_sleep: u64,
    },
    /// Delete sync-client litter (._* and .DS_Store files)
    Clean {
        /// Directory to clean recursively
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "footunes=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = Config {
        dry_run: cli.dry_run,
        ..Config::default()
    };

    let result = match cli.command {
        Commands::Playlists { input_dir, flags } => {
            info!("Starting playlists command for: {:?}", input_dir);
            PlaylistsCommand::new(flags.into_options(input_dir), config)
                .execute()
                .await
        }
        Commands::Convert { source_dir, flags } => {
            info!("Starting convert command for: {:?}", source_dir);
            ConvertCommand::new(flags.into_options(source_dir), config)
                .execute()
                .await
        }
        Commands::Retag { dir, threads } => {
            info!("Starting retag command for: {:?}", dir);
            RetagCommand::new(dir, threads, config).execute().await
        }
        Commands::Watch {
            m3u_dir,
            playlist_flags,
            flac_dir,
            convert_flags,
            playlist_delay,
            convert_delay,
            watch_sleep,
        } => {
            config.playlist_delay = Duration::from_secs(playlist_delay);
            config.convert_delay = Duration::from_secs(convert_delay);
            config.watch_sleep = Duration::from_secs(watch_sleep);
            info!(
                "Starting watch command (playlists: {:?}, flacs: {:?})",
                m3u_dir, flac_dir
            );
            let playlists = m3u_dir.map(|dir| playlist_flags.into_options(dir));
            let convert = flac_dir.map(|dir| convert_flags.into_options(dir));
            WatchCommand::new(playlists, convert, config).execute().await
        }
        Commands::Clean { dir } => {
            info!("Starting clean command for: {:?}", dir);
            CleanCommand::new(dir, config).execute().await
        }
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
