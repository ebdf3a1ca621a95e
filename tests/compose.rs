use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use subtitle_composer::ComposeError;
use subtitle_composer::compose::{BurnJob, Composer};
use subtitle_composer::config::Config;
use subtitle_composer::encoder::{EncoderProfiles, select_encoder};
use subtitle_composer::error::Result;
use subtitle_composer::ffmpeg::MediaProbe;
use subtitle_composer::filter_graph::LogoPolicy;
use subtitle_composer::geometry::Orientation;
use subtitle_composer::style::TrackRole;

struct FakeProbe {
    width: u32,
    height: u32,
}

#[async_trait]
impl MediaProbe for FakeProbe {
    async fn dimensions(&self, _path: &Path) -> Result<(u32, u32)> {
        Ok((self.width, self.height))
    }
}

const TRANSLATION: &str = "1\n00:00:01,000 --> 00:00:03,500\n川普突然现身纽约马斯克紧急发声全场震惊\n\n2\n00:00:04,000 --> 00:00:05,000\n短句\n";
const SOURCE: &str = "1\n00:00:01,000 --> 00:00:03,500\nTrump shows up in New York\n";

struct Fixture {
    dir: tempfile::TempDir,
    job: BurnJob,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let trans = dir.path().join("trans.srt");
    let src = dir.path().join("src.srt");
    std::fs::write(&trans, TRANSLATION).unwrap();
    std::fs::write(&src, SOURCE).unwrap();
    let job = BurnJob {
        source_video: dir.path().join("clip.mp4"),
        source_srt: Some(src),
        translation_srt: trans,
        output: dir.path().join("clip_sub.mp4"),
    };
    Fixture { dir, job }
}

fn config_without_logo() -> Config {
    Config {
        logo: LogoPolicy {
            path: Some(PathBuf::from("/nonexistent/logo.png")),
            ..LogoPolicy::default()
        },
        ..Config::default()
    }
}

fn composer(config: Config, width: u32, height: u32, gpu: bool) -> Composer {
    let encoder = select_encoder(gpu, &EncoderProfiles::default());
    Composer::new(Arc::new(config), Arc::new(FakeProbe { width, height }), encoder)
}

#[tokio::test]
async fn portrait_plan_burns_wrapped_translation_only() {
    let fx = fixture();
    let plan = composer(config_without_logo(), 720, 1280, false)
        .plan(&fx.job)
        .await
        .unwrap();

    assert_eq!(plan.canvas.orientation, Orientation::Portrait);
    assert_eq!((plan.canvas.target_width, plan.canvas.target_height), (1080, 1920));
    assert_eq!(plan.graph.subtitles.len(), 1);
    assert_eq!(plan.graph.subtitles[0].role, TrackRole::Translation);
    assert_eq!(plan.graph.subtitles[0].path, plan.sidecar);
    assert_eq!(plan.wrapped.cues[0].text, "川普突然现身纽约马斯\\N克紧急发声全场震惊");
    assert_eq!(plan.wrapped.cues[1].text, "短句");
    assert!(plan.graph.logo.is_none());
    assert!(!plan.sidecar.exists());

    let fc_at = plan.args.iter().position(|a| a == "-filter_complex").unwrap();
    assert!(plan.args[fc_at + 1].starts_with("[0:v]scale=1080:1920:force_original_aspect_ratio=decrease,pad=1080:1920:"));
    assert!(plan.args.windows(2).any(|w| w == ["-c:v", "libx264"]));
    assert_eq!(plan.args.iter().filter(|a| *a == "-i").count(), 1);
}

#[tokio::test]
async fn landscape_plan_letterboxes_and_burns_both() {
    let fx = fixture();
    let plan = composer(config_without_logo(), 1920, 800, true)
        .plan(&fx.job)
        .await
        .unwrap();

    assert_eq!(plan.canvas.orientation, Orientation::Landscape);
    assert_eq!(plan.graph.fit.pad_y, 140);
    let roles: Vec<TrackRole> = plan.graph.subtitles.iter().map(|s| s.role).collect();
    assert_eq!(roles, vec![TrackRole::Source, TrackRole::Translation]);
    assert_eq!(plan.wrapped.cues[0].text, "川普突然现身纽约马斯克紧急发声全场震惊");
    assert_eq!(plan.codec, "h264_nvenc");
}

#[tokio::test]
async fn logo_adds_second_input() {
    let fx = fixture();
    let logo = fx.dir.path().join("logo.png");
    std::fs::write(&logo, b"png").unwrap();
    let config = Config {
        logo: LogoPolicy {
            path: Some(logo.clone()),
            ..LogoPolicy::default()
        },
        ..Config::default()
    };
    let plan = composer(config, 1920, 1080, false).plan(&fx.job).await.unwrap();
    let inputs: Vec<&String> = plan
        .args
        .windows(2)
        .filter(|w| w[0] == "-i")
        .map(|w| &w[1])
        .collect();
    assert_eq!(inputs.len(), 2);
    assert_eq!(*inputs[1], logo.to_string_lossy());
    let fc_at = plan.args.iter().position(|a| a == "-filter_complex").unwrap();
    assert!(plan.args[fc_at + 1].ends_with("overlay=W-w-25:25"));
}

#[tokio::test]
async fn missing_source_track_is_dropped() {
    let mut fx = fixture();
    fx.job.source_srt = Some(fx.dir.path().join("absent.srt"));
    let plan = composer(config_without_logo(), 1920, 1080, false)
        .plan(&fx.job)
        .await
        .unwrap();
    assert_eq!(plan.graph.subtitles.len(), 1);
}

#[tokio::test]
async fn missing_translation_is_an_io_error() {
    let mut fx = fixture();
    fx.job.translation_srt = fx.dir.path().join("absent.srt");
    let err = composer(config_without_logo(), 1920, 1080, false)
        .plan(&fx.job)
        .await
        .unwrap_err();
    assert!(matches!(err, ComposeError::Io { .. }));
}

#[cfg(unix)]
fn fake_ffmpeg(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("fake-ffmpeg.sh");
    std::fs::write(&path, format!("#!/bin/sh\nfor last; do :; done\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[cfg(unix)]
#[tokio::test]
async fn run_writes_sidecar_and_output() {
    let fx = fixture();
    let program = fake_ffmpeg(fx.dir.path(), "printf encoded > \"$last\"");
    let config = Config {
        ffmpeg_program: program.to_string_lossy().into_owned(),
        ..config_without_logo()
    };
    let report = composer(config, 1080, 1920, false).run(&fx.job).await.unwrap();
    assert_eq!(report.output, fx.job.output);
    assert_eq!(std::fs::read_to_string(&fx.job.output).unwrap(), "encoded");

    let sidecar = std::fs::read_to_string(fx.job.sidecar_path()).unwrap();
    assert!(sidecar.contains("00:00:01,000 --> 00:00:03,500"));
    assert!(sidecar.contains("川普突然现身纽约马斯\\N克紧急发声全场震惊"));
}

#[cfg(unix)]
#[tokio::test]
async fn run_creates_missing_output_folder() {
    let mut fx = fixture();
    fx.job.output = fx.dir.path().join("out/a/clip_sub.mp4");
    let program = fake_ffmpeg(fx.dir.path(), "printf encoded > \"$last\"");
    let config = Config {
        ffmpeg_program: program.to_string_lossy().into_owned(),
        ..config_without_logo()
    };
    composer(config, 1920, 1080, false).run(&fx.job).await.unwrap();
    assert_eq!(std::fs::read_to_string(&fx.job.output).unwrap(), "encoded");
    assert!(fx.dir.path().join("out/a/clip_sub.trans_wrapped.srt").is_file());
}

#[cfg(unix)]
#[tokio::test]
async fn timed_out_encode_leaves_no_output() {
    let fx = fixture();
    let program = fake_ffmpeg(fx.dir.path(), "printf partial > \"$last\"\nsleep 10");
    let config = Config {
        ffmpeg_program: program.to_string_lossy().into_owned(),
        encode_timeout_secs: 1,
        ..config_without_logo()
    };
    let err = composer(config, 1920, 1080, false).run(&fx.job).await.unwrap_err();
    match err {
        ComposeError::EncodeProcess { source_path, reason } => {
            assert_eq!(source_path, fx.job.source_video);
            assert!(reason.contains("timed out"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!fx.job.output.exists());
    let leftovers = std::fs::read_dir(fx.dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(".encode-"))
        .count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn zero_sized_video_is_a_probe_error() {
    let fx = fixture();
    let err = composer(config_without_logo(), 0, 0, false)
        .plan(&fx.job)
        .await
        .unwrap_err();
    assert!(matches!(err, ComposeError::MediaProbe { .. }));
}
