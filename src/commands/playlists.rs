use anyhow::{anyhow, Result};
use tracing::info;

use crate::config::{Config, PlaylistOptions};
use crate::playlist::{flac_to_alac, substitute, windows_to_posix, PlaylistManager};

/// Command to rewrite managed `.m3u8` playlists for another platform or
/// library layout.
pub struct PlaylistsCommand {
    opts: PlaylistOptions,
    config: Config,
}

impl PlaylistsCommand {
    pub fn new(opts: PlaylistOptions, config: Config) -> Self {
        Self { opts, config }
    }

    pub async fn execute(&self) -> Result<()> {
        let input_dir = &self.opts.input_dir;
        if !input_dir.exists() {
            return Err(anyhow!("Playlist directory does not exist: {:?}", input_dir));
        }
        if !input_dir.is_dir() {
            return Err(anyhow!("Path is not a directory: {:?}", input_dir));
        }

        if !self.opts.flac_to_alac
            && !self.opts.windows_to_posix
            && self.opts.substitute.is_none()
        {
            return Err(anyhow!(
                "No playlist transform selected (try --flac-to-alac, --windows-to-posix or --from-str/--to-str)"
            ));
        }

        let mut manager =
            PlaylistManager::new(input_dir.clone(), self.opts.output_dir.clone())?;
        manager.read()?;

        if self.opts.flac_to_alac {
            info!("Rewriting playlist entries from .flac to .m4a");
            manager.apply(flac_to_alac);
        }
        if self.opts.windows_to_posix {
            info!("Rewriting playlist paths from Windows to Posix");
            manager.apply(windows_to_posix);
        }
        if let Some((from, to)) = &self.opts.substitute {
            info!("Rewriting playlist entries from {:?} to {:?}", from, to);
            manager.apply(|entry| substitute(entry, from, to));
        }

        manager.write(self.opts.prefix.as_deref(), self.config.dry_run)?;
        info!("Playlist rewrite complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn options(input_dir: PathBuf, output_dir: Option<PathBuf>) -> PlaylistOptions {
        PlaylistOptions {
            input_dir,
            output_dir,
            flac_to_alac: true,
            windows_to_posix: false,
            substitute: None,
            prefix: None,
        }
    }

    #[tokio::test]
    async fn nonexistent_directory_is_an_error() {
        let cmd = PlaylistsCommand::new(
            options(PathBuf::from("/nonexistent/path"), None),
            Config::default(),
        );
        assert!(cmd.execute().await.is_err());
    }

    #[tokio::test]
    async fn no_transform_selected_is_an_error() {
        let dir = TempDir::new().unwrap();
        let mut opts = options(dir.path().to_path_buf(), None);
        opts.flac_to_alac = false;
        let cmd = PlaylistsCommand::new(opts, Config::default());
        assert!(cmd.execute().await.is_err());
    }

    #[tokio::test]
    async fn rewrites_playlists_into_output_dir() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("alac");
        fs::write(dir.path().join("Mix.m3u8"), "a.flac\nb.FLAC\n").unwrap();

        let cmd = PlaylistsCommand::new(
            options(dir.path().to_path_buf(), Some(output.clone())),
            Config::default(),
        );
        cmd.execute().await.unwrap();

        let written = fs::read_to_string(output.join("Mix.m3u8")).unwrap();
        assert_eq!(written, "a.m4a\nb.m4a\n");
    }

    #[tokio::test]
    async fn dry_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("alac");
        fs::write(dir.path().join("Mix.m3u8"), "a.flac\n").unwrap();

        let config = Config {
            dry_run: true,
            ..Config::default()
        };
        let cmd = PlaylistsCommand::new(
            options(dir.path().to_path_buf(), Some(output.clone())),
            config,
        );
        cmd.execute().await.unwrap();

        assert!(!output.exists());
    }
}
