use crate::config::Config;
use crate::encoder::EncoderParams;
use crate::error::{ComposeError, Result};
use crate::ffmpeg::{EncodeCommand, Encoder, MediaProbe, probe_orientation};
use crate::filter_graph::{FilterGraph, TrackFiles, build_filter_graph};
use crate::geometry::CanvasGeometry;
use crate::srt::{SubtitleTrack, read_track, write_srt};
use crate::{logi, logok, logw};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const SIDECAR_SUFFIX: &str = ".trans_wrapped.srt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobStage {
    Probing,
    LayoutComputed,
    GraphBuilt,
    EncodeDispatched,
    Done,
    Failed,
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStage::Probing => "probing",
            JobStage::LayoutComputed => "layout-computed",
            JobStage::GraphBuilt => "graph-built",
            JobStage::EncodeDispatched => "encode-dispatched",
            JobStage::Done => "done",
            JobStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One video to burn. `source_srt` is optional; without it only the
/// translation track is burned.
#[derive(Debug, Clone, PartialEq)]
pub struct BurnJob {
    pub source_video: PathBuf,
    pub source_srt: Option<PathBuf>,
    pub translation_srt: PathBuf,
    pub output: PathBuf,
}

impl BurnJob {
    /// Wrapped translation track, written next to the output.
    pub fn sidecar_path(&self) -> PathBuf {
        let stem = self
            .output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".into());
        self.output.with_file_name(format!("{stem}{SIDECAR_SUFFIX}"))
    }
}

/// Everything decided before the encoder starts.
#[derive(Debug, Clone, Serialize)]
pub struct BurnPlan {
    pub source_size: (u32, u32),
    pub canvas: CanvasGeometry,
    pub sidecar: PathBuf,
    #[serde(skip)]
    pub wrapped: SubtitleTrack,
    pub graph: FilterGraph,
    pub codec: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ComposeReport {
    pub output: PathBuf,
    pub canvas: CanvasGeometry,
    pub codec: String,
    pub elapsed: Duration,
}

pub struct Composer {
    config: Arc<Config>,
    probe: Arc<dyn MediaProbe>,
    encoder: EncoderParams,
}

fn stage(job: &BurnJob, stage: JobStage) {
    tracing::debug!(video = %job.source_video.display(), %stage, "job stage");
}

impl Composer {
    pub fn new(config: Arc<Config>, probe: Arc<dyn MediaProbe>, encoder: EncoderParams) -> Self {
        Self {
            config,
            probe,
            encoder,
        }
    }

    pub fn encoder(&self) -> &EncoderParams {
        &self.encoder
    }

    /// Probes the video, wraps the translation track and builds the encoder
    /// invocation. Nothing is written.
    pub async fn plan(&self, job: &BurnJob) -> Result<BurnPlan> {
        stage(job, JobStage::Probing);
        let (canvas, source_size) = probe_orientation(
            self.probe.as_ref(),
            &job.source_video,
            &self.config.canonical_resolutions,
        )
        .await?;
        logi(format!(
            "{}: {}x{} -> {} {}x{}",
            job.source_video.display(),
            source_size.0,
            source_size.1,
            canvas.orientation,
            canvas.target_width,
            canvas.target_height
        ));

        let translation = read_track(&job.translation_srt).await?;
        if translation.is_empty() {
            logw(format!("No cues in {}", job.translation_srt.display()));
        }
        let wrapped = translation.wrapped(self.config.subtitles.wrap_limit(canvas.orientation));
        stage(job, JobStage::LayoutComputed);

        let source = match &job.source_srt {
            Some(path) if path.is_file() => Some(path.clone()),
            Some(path) => {
                logw(format!("Source subtitle missing: {}", path.display()));
                None
            }
            None => None,
        };
        let sidecar = job.sidecar_path();
        let tracks = TrackFiles {
            source,
            translation: sidecar.clone(),
        };
        let graph = build_filter_graph(
            source_size,
            canvas,
            &tracks,
            &self.config.subtitles,
            &self.config.logo,
        );
        let args = encode_args(&job.source_video, &graph, &self.encoder);
        stage(job, JobStage::GraphBuilt);

        Ok(BurnPlan {
            source_size,
            canvas,
            sidecar,
            wrapped,
            graph,
            codec: self.encoder.codec().to_string(),
            args,
        })
    }

    /// Plans and encodes one job. The output only appears on success.
    pub async fn run(&self, job: &BurnJob) -> Result<ComposeReport> {
        let started = Instant::now();
        let result = self.run_inner(job, started).await;
        if let Err(err) = &result {
            stage(job, JobStage::Failed);
            logw(format!("FAILED {}: {err}", job.source_video.display()));
        }
        result
    }

    async fn run_inner(&self, job: &BurnJob, started: Instant) -> Result<ComposeReport> {
        let plan = self.plan(job).await?;
        if let Some(dir) = plan.sidecar.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|err| ComposeError::io(dir, err))?;
        }
        write_srt(&plan.sidecar, &plan.wrapped)?;

        stage(job, JobStage::EncodeDispatched);
        logi(format!(
            "Encoding {} with {} -> {}",
            job.source_video.display(),
            plan.codec,
            job.output.display()
        ));
        let encoder = Encoder::new(self.config.ffmpeg_program.clone(), self.config.encode_timeout());
        encoder
            .run(&EncodeCommand {
                source: job.source_video.clone(),
                args: plan.args,
                output: job.output.clone(),
            })
            .await?;

        stage(job, JobStage::Done);
        let elapsed = started.elapsed();
        logok(format!("Done: {} ({:.1}s)", job.output.display(), elapsed.as_secs_f32()));
        Ok(ComposeReport {
            output: job.output.clone(),
            canvas: plan.canvas,
            codec: plan.codec,
            elapsed,
        })
    }
}

/// Full ffmpeg argument list except the output path.
pub fn encode_args(video: &Path, graph: &FilterGraph, encoder: &EncoderParams) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-y".into(),
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-i".into(),
        video.to_string_lossy().into_owned(),
    ];
    for input in graph.extra_inputs() {
        args.push("-i".into());
        args.push(input.to_string_lossy().into_owned());
    }
    args.push("-filter_complex".into());
    args.push(graph.to_filter_complex());
    args.extend(encoder.args());
    args.extend(["-movflags".into(), "+faststart".into()]);
    args
}
