use anyhow::{anyhow, Result};
use std::path::PathBuf;
use tracing::info;

use crate::config::Config;
use crate::discover::remove_trash_files;

/// Command to delete sync-client litter (AppleDouble `._*` files,
/// `.DS_Store`) that would otherwise trip up conversion runs.
pub struct CleanCommand {
    dir: PathBuf,
    config: Config,
}

impl CleanCommand {
    pub fn new(dir: PathBuf, config: Config) -> Self {
        Self { dir, config }
    }

    pub async fn execute(&self) -> Result<()> {
        if !self.dir.exists() {
            return Err(anyhow!("Directory does not exist: {:?}", self.dir));
        }
        if !self.dir.is_dir() {
            return Err(anyhow!("Path is not a directory: {:?}", self.dir));
        }

        info!("Cleaning up trash files under {:?}", self.dir);
        let removed = remove_trash_files(&self.dir, self.config.dry_run)?;
        info!("Cleanup complete, {} files removed", removed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn cleans_trash_and_keeps_music() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("._track.flac"), "x").unwrap();
        fs::write(dir.path().join("track.flac"), "x").unwrap();

        let cmd = CleanCommand::new(dir.path().to_path_buf(), Config::default());
        cmd.execute().await.unwrap();

        assert!(!dir.path().join("._track.flac").exists());
        assert!(dir.path().join("track.flac").exists());
    }

    #[tokio::test]
    async fn nonexistent_directory_is_an_error() {
        let cmd = CleanCommand::new(PathBuf::from("/nonexistent/path"), Config::default());
        assert!(cmd.execute().await.is_err());
    }
}
