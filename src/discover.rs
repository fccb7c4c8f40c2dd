use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

static FLAC_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.flac$").expect("static pattern"));
static MUSIC_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(flac|mp3|m4a)$").expect("static pattern"));

/// Recursively find lossless source files under `root`. Enumeration order is
/// deterministic (sorted by file name) so repeated runs queue jobs in the
/// same order.
pub fn find_flac_files(root: &Path) -> Vec<PathBuf> {
    find_matching(root, &FLAC_FILE)
}

/// Recursively find every taggable music file (.flac, .mp3, .m4a) under
/// `root`.
pub fn find_music_files(root: &Path) -> Vec<PathBuf> {
    find_matching(root, &MUSIC_FILE)
}

fn find_matching(root: &Path, pattern: &Regex) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_file() && pattern.is_match(&path.to_string_lossy()) {
            files.push(path.to_path_buf());
        }
    }
    debug!("Found {} matching files under {:?}", files.len(), root);
    files
}

/// Whether a file name is sync-client or Finder litter that can corrupt a
/// conversion run (AppleDouble `._*` files, `.DS_Store`).
fn is_trash_name(name: &str) -> bool {
    name.starts_with("._") || name == ".DS_Store"
}

/// Delete trash files under `root` before converting. Returns how many files
/// were removed.
pub fn remove_trash_files(root: &Path, dry_run: bool) -> Result<usize> {
    let mut removed = 0;
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if path.is_file() && is_trash_name(name) {
            if dry_run {
                info!("[dry-run] Would delete trash file: {:?}", path);
            } else {
                debug!("Deleting trash file: {:?}", path);
                fs::remove_file(path)?;
            }
            removed += 1;
        }
    }
    if removed > 0 {
        info!("Removed {} trash files under {:?}", removed, root);
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::write(path, "x").unwrap();
    }

    #[test]
    fn finds_only_flac_files() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a.mp3"));
        touch(&dir.path().join("a.flac"));
        touch(&dir.path().join("b.FLAC"));
        touch(&dir.path().join("a.m4a"));
        touch(&dir.path().join("a.not"));

        let flacs = find_flac_files(dir.path());
        assert_eq!(flacs.len(), 2);
    }

    #[test]
    fn finds_music_files_recursively() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("album");
        fs::create_dir(&sub).unwrap();
        touch(&dir.path().join("a.mp3"));
        touch(&sub.join("b.flac"));
        touch(&sub.join("c.m4a"));
        touch(&sub.join("d.txt"));

        assert_eq!(find_music_files(dir.path()).len(), 3);
    }

    #[test]
    fn discovery_order_is_deterministic() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("c.flac"));
        touch(&dir.path().join("a.flac"));
        touch(&dir.path().join("b.flac"));

        let first = find_flac_files(dir.path());
        let second = find_flac_files(dir.path());
        assert_eq!(first, second);
    }

    #[test]
    fn removes_appledouble_and_ds_store() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("._01 Next Level.flac"));
        touch(&dir.path().join(".DS_Store"));
        touch(&dir.path().join("01 Next Level.flac"));

        let removed = remove_trash_files(dir.path(), false).unwrap();
        assert_eq!(removed, 2);
        assert!(dir.path().join("01 Next Level.flac").exists());
        assert!(!dir.path().join(".DS_Store").exists());
    }

    #[test]
    fn dry_run_leaves_trash_in_place() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join(".DS_Store"));

        let removed = remove_trash_files(dir.path(), true).unwrap();
        assert_eq!(removed, 1);
        assert!(dir.path().join(".DS_Store").exists());
    }
}
