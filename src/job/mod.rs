use std::path::{Path, PathBuf};

/// A single source file queued for transcoding, paired with where its
/// converted output should land.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeJob {
    pub source: PathBuf,
    pub destination: PathBuf,
}

impl TranscodeJob {
    /// Create a job for a lossless source file; the destination sits next to
    /// it with the ALAC container extension.
    pub fn for_source(source: PathBuf) -> Self {
        let destination = source.with_extension("m4a");
        Self {
            source,
            destination,
        }
    }

    pub fn destination_exists(&self) -> bool {
        self.destination.exists()
    }
}

/// Sibling path used when a tag editor cannot rewrite in place:
/// `a/b/song.mp3` -> `a/b/song_temp.mp3`.
pub fn temp_sibling(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}_temp.{ext}"),
        None => format!("{stem}_temp"),
    };
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_replaces_extension() {
        let job = TranscodeJob::for_source(PathBuf::from("/music/a/track.flac"));
        assert_eq!(job.destination, PathBuf::from("/music/a/track.m4a"));
    }

    #[test]
    fn destination_handles_uppercase_extension() {
        let job = TranscodeJob::for_source(PathBuf::from("/music/08 TT.FLAC"));
        assert_eq!(job.destination, PathBuf::from("/music/08 TT.m4a"));
    }

    #[test]
    fn temp_sibling_suffixes_stem() {
        assert_eq!(
            temp_sibling(Path::new("/a/b/c/abc.mp3")),
            PathBuf::from("/a/b/c/abc_temp.mp3")
        );
    }
}
