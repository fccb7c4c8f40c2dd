use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Marker suffix a sync client gives files it is still transferring.
const SYNC_IN_PROGRESS_SUFFIX: &str = "!.sync";

/// Reads the on-disk convention of a file-sync client: transfers in flight
/// live under `<root>/.sync` with a marker suffix on their names. Used to
/// gate conversion and move phases so half-transferred files are not picked
/// up.
#[derive(Debug, Clone)]
pub struct SyncClient {
    sync_dir: PathBuf,
}

impl SyncClient {
    pub fn new(sync_dir: impl Into<PathBuf>) -> Self {
        Self {
            sync_dir: sync_dir.into(),
        }
    }

    /// The client's temporary download directory.
    pub fn temp_dir(&self) -> PathBuf {
        self.sync_dir.join(".sync")
    }

    /// Whether a transfer is currently in progress. A missing temp directory
    /// means no client is active, which counts as not syncing.
    pub fn is_syncing(&self) -> bool {
        let temp_dir = self.temp_dir();
        let entries = match fs::read_dir(&temp_dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("No sync temp dir at {:?}: {}", temp_dir, e);
                return false;
            }
        };

        for entry in entries.filter_map(|e| e.ok()) {
            let name = entry.file_name();
            if name.to_string_lossy().ends_with(SYNC_IN_PROGRESS_SUFFIX) {
                debug!("Sync in progress: {:?}", entry.path());
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    #[test]
    fn temp_dir_is_dot_sync_under_root() {
        let client = SyncClient::new("/bebe/sync");
        assert_eq!(client.temp_dir(), Path::new("/bebe/sync/.sync"));
    }

    #[test]
    fn missing_temp_dir_means_not_syncing() {
        let dir = TempDir::new().unwrap();
        assert!(!SyncClient::new(dir.path()).is_syncing());
    }

    #[test]
    fn only_marker_suffixed_files_signal_syncing() {
        let dir = TempDir::new().unwrap();
        let temp = dir.path().join(".sync");
        fs::create_dir(&temp).unwrap();

        let client = SyncClient::new(dir.path());
        assert!(!client.is_syncing());

        fs::write(temp.join("abc.sync"), "x").unwrap();
        assert!(!client.is_syncing());

        fs::write(temp.join("abc.!.sync"), "x").unwrap();
        assert!(client.is_syncing());
    }
}
