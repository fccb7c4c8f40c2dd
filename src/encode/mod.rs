use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// External tool backing the transcode phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderKind {
    /// X Lossless Decoder. Preferred when present (macOS only): carries over
    /// all metadata and cover art.
    Xld,
    /// ffmpeg fallback: `-acodec alac -vcodec copy` keeps embedded art as a
    /// copied stream, some exotic tags may be dropped.
    Ffmpeg,
}

/// Wraps one subprocess call to the codec tool per job. Availability is
/// resolved at the point of first use, not at startup.
#[derive(Debug, Clone, Copy)]
pub struct Encoder {
    kind: EncoderKind,
}

impl Encoder {
    /// Resolve an encoder from the execution path, preferring xld.
    pub fn resolve() -> Result<Self> {
        if which::which("xld").is_ok() {
            return Ok(Self {
                kind: EncoderKind::Xld,
            });
        }
        if which::which("ffmpeg").is_ok() {
            return Ok(Self {
                kind: EncoderKind::Ffmpeg,
            });
        }
        Err(anyhow!(
            "no encoder available: install xld or ffmpeg to convert audio"
        ))
    }

    pub fn kind(&self) -> EncoderKind {
        self.kind
    }

    /// Test constructor bypassing path resolution.
    #[cfg(test)]
    pub(crate) fn fixed(kind: EncoderKind) -> Self {
        Self { kind }
    }

    /// Synchronously (from the worker's point of view) convert one source
    /// file, blocking until the external tool exits. The destination file is
    /// created or overwritten by the tool; output correctness is not
    /// validated here and a failure is never retried.
    pub async fn transcode(&self, source: &Path, destination: &Path) -> Result<()> {
        let mut cmd = match self.kind {
            EncoderKind::Xld => {
                let mut c = Command::new("xld");
                c.arg(source).args(["-f", "alac", "-o"]).arg(destination);
                c
            }
            EncoderKind::Ffmpeg => {
                let mut c = Command::new("ffmpeg");
                c.args(["-v", "warning", "-i"])
                    .arg(source)
                    .args(["-acodec", "alac", "-vcodec", "copy"])
                    .arg(destination);
                c
            }
        };

        let output = run_tool(&mut cmd).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "encoder exited with {} for {:?}: {}",
                output.status,
                source,
                stderr.trim()
            ));
        }
        info!("Converted {:?} -> {:?}", source, destination);
        Ok(())
    }
}

/// Run an external tool to completion, capturing stdout and stderr. Launch
/// failures surface as errors; a non-zero exit is returned to the caller to
/// judge.
pub(crate) async fn run_tool(cmd: &mut Command) -> Result<std::process::Output> {
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    debug!("Executing: {:?}", cmd);

    let output = cmd
        .output()
        .await
        .with_context(|| format!("failed to launch {cmd:?}"))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stdout.trim().is_empty() {
        debug!("stdout: {}", stdout.trim());
    }
    if !stderr.trim().is_empty() {
        debug!("stderr: {}", stderr.trim());
    }
    Ok(output)
}

/// Structured `ffprobe -print_format json` output, reduced to the container
/// tag map this tool cares about.
#[derive(Debug, Default, Deserialize)]
pub struct ProbeReport {
    #[serde(default)]
    pub format: Option<ProbeFormat>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProbeFormat {
    #[serde(default)]
    pub tags: Option<HashMap<String, String>>,
}

impl ProbeReport {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("unparseable ffprobe output")
    }

    /// The genre tag as `(key, value)`, checking the key spellings files
    /// actually carry in preference order.
    pub fn genre_tag(&self) -> Option<(&str, &str)> {
        let tags = self.format.as_ref()?.tags.as_ref()?;
        for key in ["Genre", "GENRE", "genre"] {
            if let Some((k, v)) = tags.get_key_value(key) {
                return Some((k.as_str(), v.as_str()));
            }
        }
        None
    }
}

/// Probe a media file's container format and tags via ffprobe.
pub async fn probe_file(path: &Path) -> Result<ProbeReport> {
    which::which("ffprobe").map_err(|_| anyhow!("ffprobe not found on the execution path"))?;

    let mut cmd = Command::new("ffprobe");
    cmd.arg(path).args([
        "-v",
        "quiet",
        "-print_format",
        "json",
        "-show_format",
        "-show_streams",
        "-hide_banner",
    ]);

    let output = run_tool(&mut cmd).await?;
    if !output.status.success() {
        return Err(anyhow!("ffprobe exited with {} for {:?}", output.status, path));
    }
    ProbeReport::from_json(&String::from_utf8_lossy(&output.stdout))
}
