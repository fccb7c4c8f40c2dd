use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

use crate::encode::{probe_file, run_tool};
use crate::job::temp_sibling;

/// Maps a raw genre substring to its canonical display name. First matching
/// rule wins.
struct GenreRule {
    pattern: Regex,
    canonical: &'static str,
}

/// Ordered rule table. There is deliberately no bare "rock" rule: it would
/// clobber "alternative rock", which the title-case fallback already handles.
static GENRE_RULES: Lazy<Vec<GenreRule>> = Lazy::new(|| {
    [
        ("alternrock", "Alternative Rock"),
        ("kpop|korean", "K-Pop"),
        ("cpop|chinese|cantonese|mandarin", "C-Pop"),
        ("jpop|japanese", "J-Pop"),
        ("rap", "Hip-Hop"),
        ("soundtrack", "OST"),
        ("vpop|vietnamese", "V-Pop"),
    ]
    .into_iter()
    .map(|(pattern, canonical)| GenreRule {
        pattern: Regex::new(pattern).expect("static pattern"),
        canonical,
    })
    .collect()
});

/// Uniform title-casing: first letter of every alphabetic run is
/// capitalized, the rest lowered. "hip-hop" -> "Hip-Hop".
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut word_start = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            word_start = false;
        } else {
            out.push(c);
            word_start = true;
        }
    }
    out
}

/// Map a raw genre string to its canonical form: first matching rule on the
/// lower-cased value wins, otherwise fall back to title-casing. Canonical
/// display names are fixed points, so a normalized file skips on the next
/// run ("OST" must not decay to "Ost").
pub fn canonical_genre(raw: &str) -> String {
    if GENRE_RULES.iter().any(|rule| rule.canonical == raw) {
        return raw.to_string();
    }
    let lowered = raw.to_lowercase();
    for rule in GENRE_RULES.iter() {
        if rule.pattern.is_match(&lowered) {
            return rule.canonical.to_string();
        }
    }
    title_case(&lowered)
}

/// Why a file was left untouched by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetagOutcome {
    /// No genre tag present.
    NoGenre,
    /// Genre already equals the canonical value.
    AlreadyCanonical(String),
    /// File type has no supported tag editor.
    UnsupportedExtension,
    /// Tag rewritten from the raw value to the canonical one.
    Updated { from: String, to: String },
}

/// Normalizes the genre tag of a single music file through external tag
/// editors, chosen by extension. In-place editors are preferred; otherwise
/// the stream is copied to a temp file which then replaces the original.
#[derive(Debug, Clone, Copy)]
pub struct Retagger {
    dry_run: bool,
}

impl Retagger {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    /// Probe, canonicalize, and rewrite one file's genre. Idempotent: a
    /// second run over the same file is a skip.
    pub async fn retag_file(&self, path: &Path) -> Result<RetagOutcome> {
        let report = probe_file(path).await?;
        let Some((key, raw)) = report.genre_tag() else {
            debug!("{:?}: no genre tag found, skipping", path);
            return Ok(RetagOutcome::NoGenre);
        };

        let canonical = canonical_genre(raw);
        if raw == canonical {
            debug!("{:?}: genre {:?} already canonical, skipping", path, raw);
            return Ok(RetagOutcome::AlreadyCanonical(canonical));
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        let key = key.to_string();
        let raw = raw.to_string();

        if self.dry_run {
            info!(
                "[dry-run] Would retag {:?}: {:?} -> {:?}",
                path, raw, canonical
            );
            return Ok(RetagOutcome::Updated {
                from: raw,
                to: canonical,
            });
        }

        match extension.as_str() {
            "m4a" if which::which("mp4tags").is_ok() => {
                self.retag_in_place_mp4(path, &canonical).await?;
            }
            "m4a" | "mp3" => {
                self.retag_via_stream_copy(path, &key, &canonical).await?;
            }
            "flac" => {
                self.retag_flac(path, &key, &canonical).await?;
            }
            _ => return Ok(RetagOutcome::UnsupportedExtension),
        }

        info!("Retagged {:?}: {:?} -> {:?}", path, raw, canonical);
        Ok(RetagOutcome::Updated {
            from: raw,
            to: canonical,
        })
    }

    /// mp4tags edits the container in place.
    async fn retag_in_place_mp4(&self, path: &Path, genre: &str) -> Result<()> {
        let mut cmd = Command::new("mp4tags");
        cmd.args(["-genre", genre]).arg(path);
        let output = run_tool(&mut cmd).await?;
        if !output.status.success() {
            return Err(anyhow!("mp4tags exited with {} for {:?}", output.status, path));
        }
        Ok(())
    }

    /// ffmpeg cannot edit in place: stream-copy to a temp sibling with the
    /// new metadata, then replace the original.
    async fn retag_via_stream_copy(&self, path: &Path, key: &str, genre: &str) -> Result<()> {
        which::which("ffmpeg").map_err(|_| anyhow!("ffmpeg not found on the execution path"))?;

        let temp = temp_sibling(path);
        let metadata = format!("{key}={genre}");
        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-y", "-v", "warning", "-i"])
            .arg(path)
            .args(["-metadata", metadata.as_str(), "-c", "copy"])
            .arg(&temp);

        let output = run_tool(&mut cmd).await?;
        if !output.status.success() {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(anyhow!("ffmpeg exited with {} for {:?}", output.status, path));
        }

        tokio::fs::remove_file(path).await?;
        tokio::fs::rename(&temp, path).await?;
        Ok(())
    }

    /// metaflac has no replace operation: remove the tag, then set it.
    async fn retag_flac(&self, path: &Path, key: &str, genre: &str) -> Result<()> {
        which::which("metaflac")
            .map_err(|_| anyhow!("metaflac not found on the execution path"))?;

        let mut remove = Command::new("metaflac");
        remove.arg(path).arg(format!("--remove-tag={key}"));
        let output = run_tool(&mut remove).await?;
        if !output.status.success() {
            return Err(anyhow!(
                "metaflac --remove-tag exited with {} for {:?}",
                output.status,
                path
            ));
        }

        let mut set = Command::new("metaflac");
        set.arg(path).arg(format!("--set-tag={key}={genre}"));
        let output = run_tool(&mut set).await?;
        if !output.status.success() {
            return Err(anyhow!(
                "metaflac --set-tag exited with {} for {:?}",
                output.status,
                path
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rules_map_known_aliases() {
        assert_eq!(canonical_genre("AlternRock"), "Alternative Rock");
        assert_eq!(canonical_genre("soundtrack"), "OST");
        assert_eq!(canonical_genre("k-pop"), "K-Pop");
        assert_eq!(canonical_genre("j-pop"), "J-Pop");
        assert_eq!(canonical_genre("Korean Pop"), "K-Pop");
        assert_eq!(canonical_genre("rap"), "Hip-Hop");
        assert_eq!(canonical_genre("vietnamese"), "V-Pop");
    }

    #[test]
    fn fallback_title_cases_unmatched_genres() {
        assert_eq!(canonical_genre("rock"), "Rock");
        assert_eq!(canonical_genre("Hip-hop"), "Hip-Hop");
        assert_eq!(canonical_genre("acid jazz"), "Acid Jazz");
    }

    #[test]
    fn alternative_rock_is_not_clobbered_by_fallback() {
        assert_eq!(canonical_genre("alternative rock"), "Alternative Rock");
        assert_eq!(canonical_genre("Alternative rock"), "Alternative Rock");
    }

    #[test]
    fn canonical_values_are_fixed_points() {
        // Idempotence: a canonical genre must map to itself so a second
        // normalizer run skips the file.
        for genre in [
            "Alternative Rock",
            "K-Pop",
            "C-Pop",
            "J-Pop",
            "Hip-Hop",
            "OST",
            "V-Pop",
            "Rock",
        ] {
            assert_eq!(canonical_genre(&canonical_genre(genre)), canonical_genre(genre));
        }
    }
}
