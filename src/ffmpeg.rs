use crate::error::{ComposeError, Result};
use crate::geometry::{CanonicalResolutions, CanvasGeometry};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Reads the displayed pixel size of the first video stream without decoding
/// it.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn dimensions(&self, path: &Path) -> Result<(u32, u32)>;
}

pub struct Ffprobe {
    pub program: String,
}

impl Default for Ffprobe {
    fn default() -> Self {
        Self {
            program: "ffprobe".into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    sample_aspect_ratio: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
    #[serde(default)]
    side_data_list: Vec<SideData>,
}

#[derive(Debug, Default, Deserialize)]
struct SideData {
    rotation: Option<f64>,
}

fn parse_ratio(text: &str) -> Option<(u32, u32)> {
    let (num, den) = text.split_once(':')?;
    let num = num.trim().parse::<u32>().ok()?;
    let den = den.trim().parse::<u32>().ok()?;
    (num > 0 && den > 0).then_some((num, den))
}

impl ProbeStream {
    fn rotation(&self) -> i64 {
        let from_side_data = self.side_data_list.iter().find_map(|d| d.rotation);
        let from_tag = self.tags.get("rotate").and_then(|r| r.trim().parse::<f64>().ok());
        from_side_data.or(from_tag).map(|r| r.round() as i64).unwrap_or(0)
    }

    /// Size of the frames as displayed: non-square pixels stretched out and
    /// quarter-turn rotations applied.
    fn display_size(&self) -> Option<(u32, u32)> {
        let (mut w, h) = (self.width?, self.height?);
        if let Some((num, den)) = self.sample_aspect_ratio.as_deref().and_then(parse_ratio) {
            if num != den {
                w = (w as u64 * num as u64 / den as u64) as u32;
            }
        }
        if self.rotation().rem_euclid(180) == 90 {
            Some((h, w))
        } else {
            Some((w, h))
        }
    }
}

fn parse_dimensions(text: &str) -> Option<(u32, u32)> {
    let output: ProbeOutput = serde_json::from_str(text).ok()?;
    output.streams.first()?.display_size()
}

#[async_trait]
impl MediaProbe for Ffprobe {
    async fn dimensions(&self, path: &Path) -> Result<(u32, u32)> {
        if !path.is_file() {
            return Err(ComposeError::probe(path, "file not found"));
        }

        let output = Command::new(&self.program)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height,sample_aspect_ratio:stream_tags=rotate:stream_side_data=rotation",
                "-of",
                "json",
            ])
            .arg(path)
            .output()
            .await
            .map_err(|err| ComposeError::probe(path, format!("ffprobe execution failed: {err}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ComposeError::probe(path, format!("ffprobe failed: {}", stderr.trim())));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        parse_dimensions(&text).ok_or_else(|| ComposeError::probe(path, format!("unreadable size {:?}", text.trim())))
    }
}

pub async fn probe_orientation(
    probe: &dyn MediaProbe,
    path: &Path,
    canonical: &CanonicalResolutions,
) -> Result<(CanvasGeometry, (u32, u32))> {
    let (w, h) = probe.dimensions(path).await?;
    if w == 0 || h == 0 {
        return Err(ComposeError::probe(path, format!("degenerate size {w}x{h}")));
    }
    Ok((CanvasGeometry::for_source(w, h, canonical), (w, h)))
}

/// One encoder invocation. The output path is appended as the final argument
/// by [`Encoder::run`].
#[derive(Debug, Clone)]
pub struct EncodeCommand {
    pub source: PathBuf,
    pub args: Vec<String>,
    pub output: PathBuf,
}

pub struct Encoder {
    pub program: String,
    pub timeout: Duration,
}

impl Encoder {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Runs the encoder into a temporary sibling of the output and renames it
    /// into place only after a clean exit. On failure or timeout the process
    /// is killed and nothing is left at the output path.
    pub async fn run(&self, cmd: &EncodeCommand) -> Result<()> {
        let dir = cmd
            .output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let suffix = cmd
            .output
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let temp = tempfile::Builder::new()
            .prefix(".encode-")
            .suffix(&suffix)
            .tempfile_in(dir)
            .map_err(|err| ComposeError::io(dir, err))?
            .into_temp_path();

        let mut child = Command::new(&self.program)
            .args(&cmd.args)
            .arg(&*temp)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| ComposeError::encode(&cmd.source, format!("spawn {}: {err}", self.program)))?;

        let waited = tokio::time::timeout(self.timeout, child.wait()).await;
        let status = match waited {
            Ok(Ok(status)) => status,
            Ok(Err(err)) => {
                return Err(ComposeError::encode(&cmd.source, format!("wait failed: {err}")));
            }
            Err(_) => {
                let _ = child.kill().await;
                return Err(ComposeError::encode(
                    &cmd.source,
                    format!("timed out after {}s", self.timeout.as_secs_f32()),
                ));
            }
        };

        if !status.success() {
            return Err(ComposeError::encode(&cmd.source, format!("exited with {status}")));
        }

        let size = std::fs::metadata(&temp).map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Err(ComposeError::encode(&cmd.source, "encoder produced an empty file"));
        }

        temp.persist(&cmd.output)
            .map_err(|err| ComposeError::io(&cmd.output, err.error))?;
        Ok(())
    }
}
