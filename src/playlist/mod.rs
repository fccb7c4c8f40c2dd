use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default substrings marking playlists this tool must not rewrite
/// (auto-generated views, already-processed outputs, scratch lists).
pub const DEFAULT_DENY_LIST: &[&str] = &[
    "ALAC",
    "Auto -",
    "Filter Results",
    "FLAC",
    "Library",
    "LOSSLESS",
    "LOSSY",
    "TODO",
    "TO_PROCESS",
    "i_1",
    "i_2",
];

static FLAC_EXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\.flac").expect("static pattern"));

/// Rewrite a playlist entry's `.flac` extension (any case) to `.m4a`.
/// Applying it to an already-rewritten entry is a no-op.
pub fn flac_to_alac(entry: &str) -> String {
    FLAC_EXT.replace_all(entry, ".m4a").into_owned()
}

/// Rewrite Windows path separators to Posix.
pub fn windows_to_posix(entry: &str) -> String {
    entry.replace('\\', "/")
}

/// Literal substring replacement, e.g. remapping a drive-letter music root
/// to the local library location.
pub fn substitute(entry: &str, from: &str, to: &str) -> String {
    entry.replace(from, to)
}

/// One `.m3u8` playlist: its location and its non-blank lines. Comment and
/// header lines pass through as plain entries.
#[derive(Debug, Clone)]
pub struct Playlist {
    pub path: PathBuf,
    pub entries: Vec<String>,
}

impl Playlist {
    /// Read a playlist, dropping blank lines and keeping everything else
    /// verbatim.
    pub fn read(path: &Path) -> Result<Self> {
        debug!("Reading playlist: {:?}", path);
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read playlist {path:?}"))?;
        let entries = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    /// Apply a line transform to every entry.
    pub fn apply<F: Fn(&str) -> String>(&mut self, transform: F) {
        for entry in &mut self.entries {
            *entry = transform(entry);
        }
    }

    /// Where this playlist would be written for the given output directory
    /// and filename prefix.
    pub fn write_path(&self, output_dir: Option<&Path>, prefix: Option<&str>) -> Result<PathBuf> {
        let base_name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("playlist has no filename: {:?}", self.path))?;
        let name = match prefix {
            Some(prefix) => format!("{prefix}{base_name}"),
            None => base_name.to_string(),
        };
        let dir = match output_dir {
            Some(dir) => dir.to_path_buf(),
            None => self
                .path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        };
        Ok(dir.join(name))
    }

    /// Write the playlist with newline-normalized line endings, creating
    /// parent directories as needed.
    pub fn write_to(
        &self,
        output_dir: Option<&Path>,
        prefix: Option<&str>,
        dry_run: bool,
    ) -> Result<PathBuf> {
        let target = self.write_path(output_dir, prefix)?;
        if dry_run {
            info!("[dry-run] Would write playlist: {:?}", target);
            return Ok(target);
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create playlist dir {parent:?}"))?;
        }
        let mut content = self.entries.join("\n");
        content.push('\n');
        fs::write(&target, content)
            .with_context(|| format!("failed to write playlist {target:?}"))?;
        debug!("Wrote playlist: {:?}", target);
        Ok(target)
    }
}

/// Reads, transforms, and writes the set of managed playlists under an
/// input directory, honoring a deny list of auto-generated names.
pub struct PlaylistManager {
    input_dir: PathBuf,
    output_dir: Option<PathBuf>,
    deny_list: Vec<Regex>,
    pub playlists: Vec<Playlist>,
}

impl PlaylistManager {
    pub fn new(input_dir: PathBuf, output_dir: Option<PathBuf>) -> Result<Self> {
        Self::with_deny_list(input_dir, output_dir, DEFAULT_DENY_LIST)
    }

    pub fn with_deny_list(
        input_dir: PathBuf,
        output_dir: Option<PathBuf>,
        deny_list: &[&str],
    ) -> Result<Self> {
        let deny_list = deny_list
            .iter()
            .map(|pattern| {
                Regex::new(pattern)
                    .with_context(|| format!("invalid deny-list pattern: {pattern}"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            input_dir,
            output_dir,
            deny_list,
            playlists: Vec::new(),
        })
    }

    /// Whether this playlist path is eligible for rewriting.
    pub fn is_managed(&self, path: &Path) -> bool {
        let text = path.to_string_lossy();
        !self.deny_list.iter().any(|deny| deny.is_match(&text))
    }

    /// Glob `*.m3u8` under the input directory (non-recursive) and read every
    /// managed playlist.
    pub fn read(&mut self) -> Result<()> {
        let pattern = self.input_dir.join("*.m3u8");
        let pattern = pattern
            .to_str()
            .ok_or_else(|| anyhow!("non-UTF8 input dir: {:?}", self.input_dir))?;
        debug!("Globbing for playlists: {}", pattern);

        for entry in glob::glob(pattern).context("invalid playlist glob")? {
            let path = entry.context("failed to read playlist glob entry")?;
            if self.is_managed(&path) {
                self.playlists.push(Playlist::read(&path)?);
            } else {
                debug!("Skipping deny-listed playlist: {:?}", path);
            }
        }

        info!(
            "Read {} managed playlists from {:?}",
            self.playlists.len(),
            self.input_dir
        );
        Ok(())
    }

    /// Apply a line transform to every managed playlist.
    pub fn apply<F: Fn(&str) -> String>(&mut self, transform: F) {
        for playlist in &mut self.playlists {
            playlist.apply(&transform);
        }
    }

    /// Write all managed playlists to the output directory.
    pub fn write(&self, prefix: Option<&str>, dry_run: bool) -> Result<()> {
        for playlist in &self.playlists {
            playlist.write_to(self.output_dir.as_deref(), prefix, dry_run)?;
        }
        Ok(())
    }
}
