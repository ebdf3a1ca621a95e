use crate::geometry::{CanvasGeometry, Letterbox, Orientation, letterbox};
use crate::style::{StyleProfile, SubtitleStyles, TrackRole};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogoPolicy {
    pub path: Option<PathBuf>,
    pub landscape_fraction: f32,
    pub portrait_fraction: f32,
    pub margin: u32,
}

impl Default for LogoPolicy {
    fn default() -> Self {
        Self {
            path: Some(PathBuf::from("assets/logo.png")),
            landscape_fraction: 0.12,
            portrait_fraction: 0.18,
            margin: 25,
        }
    }
}

/// Subtitle files for one video. The translation file is the one actually
/// burned, so it should already be wrapped for the target orientation.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackFiles {
    pub source: Option<PathBuf>,
    pub translation: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubtitleBurn {
    pub role: TrackRole,
    pub path: PathBuf,
    pub style: StyleProfile,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogoOverlay {
    pub path: PathBuf,
    pub width: u32,
    pub margin: u32,
}

/// Video filter plan: fit, pad, burn subtitles, then overlay the logo.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterGraph {
    pub canvas: CanvasGeometry,
    pub fit: Letterbox,
    pub subtitles: Vec<SubtitleBurn>,
    pub logo: Option<LogoOverlay>,
}

pub fn build_filter_graph(
    source_size: (u32, u32),
    canvas: CanvasGeometry,
    tracks: &TrackFiles,
    styles: &SubtitleStyles,
    logo: &LogoPolicy,
) -> FilterGraph {
    let (src_w, src_h) = source_size;
    let fit = letterbox(src_w, src_h, canvas.target_width, canvas.target_height);

    let mut subtitles = Vec::new();
    for (role, style) in styles.active(canvas.orientation, canvas.target_height) {
        let path = match role {
            TrackRole::Translation => tracks.translation.clone(),
            TrackRole::Source => match &tracks.source {
                Some(path) => path.clone(),
                None => {
                    tracing::warn!("no source-language track; burning translation only");
                    continue;
                }
            },
        };
        subtitles.push(SubtitleBurn { role, path, style });
    }

    let logo = match &logo.path {
        Some(path) if path.is_file() => {
            let fraction = match canvas.orientation {
                Orientation::Landscape => logo.landscape_fraction,
                Orientation::Portrait => logo.portrait_fraction,
            };
            Some(LogoOverlay {
                path: path.clone(),
                width: (canvas.target_width as f32 * fraction) as u32,
                margin: logo.margin,
            })
        }
        Some(path) => {
            tracing::debug!(path = %path.display(), "logo asset missing, overlay omitted");
            None
        }
        None => None,
    };

    FilterGraph {
        canvas,
        fit,
        subtitles,
        logo,
    }
}

/// Escapes a value for use as a filter option inside a filter graph: first
/// the option level, then the graph level.
pub fn escape_filter_value(value: &str) -> String {
    let mut option_level = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '\'' | ':') {
            option_level.push('\\');
        }
        option_level.push(ch);
    }

    let mut graph_level = String::with_capacity(option_level.len());
    for ch in option_level.chars() {
        if matches!(ch, '\\' | '\'' | '[' | ']' | ',' | ';') {
            graph_level.push('\\');
        }
        graph_level.push(ch);
    }
    graph_level
}

fn path_arg(path: &Path) -> String {
    escape_filter_value(&path.to_string_lossy())
}

impl FilterGraph {
    /// Extra inputs after the source video, in `-i` order.
    pub fn extra_inputs(&self) -> Vec<&Path> {
        self.logo.iter().map(|logo| logo.path.as_path()).collect()
    }

    /// The scale never stretches: if the decoded frames differ from the
    /// probed size (an unreported rotation), ffmpeg still fits them inside
    /// the box and the pad re-centres them. For correctly probed input the
    /// pad expressions equal `fit.pad_x` and `fit.pad_y`.
    fn video_chain(&self) -> String {
        let mut chain = format!(
            "scale={}:{}:force_original_aspect_ratio=decrease,pad={}:{}:(ow-iw)/2:(oh-ih)/2:black",
            self.fit.scaled_width,
            self.fit.scaled_height,
            self.canvas.target_width,
            self.canvas.target_height,
        );
        for burn in &self.subtitles {
            chain.push_str(&format!(
                ",subtitles={}:force_style='{}'",
                path_arg(&burn.path),
                burn.style.to_force_style()
            ));
        }
        chain
    }

    /// `-filter_complex` argument.
    pub fn to_filter_complex(&self) -> String {
        let chain = self.video_chain();
        match &self.logo {
            Some(logo) => format!(
                "[0:v]{chain}[v_main];[1:v]scale={}:-1[logo];[v_main][logo]overlay=W-w-{m}:{m}",
                logo.width,
                m = logo.margin
            ),
            None => format!("[0:v]{chain}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::CanonicalResolutions;

    fn tracks() -> TrackFiles {
        TrackFiles {
            source: Some(PathBuf::from("output/src.srt")),
            translation: PathBuf::from("output/trans_wrapped.srt"),
        }
    }

    fn no_logo() -> LogoPolicy {
        LogoPolicy {
            path: Some(PathBuf::from("/nonexistent/logo.png")),
            ..LogoPolicy::default()
        }
    }

    #[test]
    fn portrait_burns_translation_only() {
        let canvas = CanvasGeometry::for_source(1080, 1920, &CanonicalResolutions::default());
        let graph = build_filter_graph(
            (1080, 1920),
            canvas,
            &tracks(),
            &SubtitleStyles::default(),
            &no_logo(),
        );
        assert_eq!(graph.subtitles.len(), 1);
        assert_eq!(graph.subtitles[0].role, TrackRole::Translation);
        let fc = graph.to_filter_complex();
        assert!(!fc.contains("src.srt"));
        assert!(fc.starts_with("[0:v]scale=1080:1920:force_original_aspect_ratio=decrease,pad=1080:1920:(ow-iw)/2:(oh-ih)/2:black,subtitles=output/trans_wrapped.srt:force_style='FontSize=12,"));
    }

    #[test]
    fn landscape_letterboxes_and_burns_both() {
        let canvas = CanvasGeometry::for_source(1920, 800, &CanonicalResolutions::default());
        let graph = build_filter_graph(
            (1920, 800),
            canvas,
            &tracks(),
            &SubtitleStyles::default(),
            &no_logo(),
        );
        assert_eq!(graph.fit.pad_y, 140);
        let fc = graph.to_filter_complex();
        assert!(fc.starts_with(
            "[0:v]scale=1920:800:force_original_aspect_ratio=decrease,pad=1920:1080:(ow-iw)/2:(oh-ih)/2:black,subtitles=output/src.srt:"
        ));
        let src = fc.find("src.srt").unwrap();
        let trans = fc.find("trans_wrapped.srt").unwrap();
        assert!(src < trans);
        assert!(graph.logo.is_none());
        assert!(!fc.contains("overlay"));
        assert!(graph.extra_inputs().is_empty());
    }

    #[test]
    fn missing_source_track_is_skipped() {
        let canvas = CanvasGeometry::for_source(1920, 1080, &CanonicalResolutions::default());
        let tracks = TrackFiles {
            source: None,
            ..tracks()
        };
        let graph = build_filter_graph((1920, 1080), canvas, &tracks, &SubtitleStyles::default(), &no_logo());
        assert_eq!(graph.subtitles.len(), 1);
    }

    #[test]
    fn logo_is_scaled_and_anchored_top_right() {
        let dir = tempfile::tempdir().unwrap();
        let logo_path = dir.path().join("logo.png");
        std::fs::write(&logo_path, b"png").unwrap();
        let policy = LogoPolicy {
            path: Some(logo_path.clone()),
            ..LogoPolicy::default()
        };

        let canvas = CanvasGeometry::for_source(1920, 1080, &CanonicalResolutions::default());
        let graph = build_filter_graph((1920, 1080), canvas, &tracks(), &SubtitleStyles::default(), &policy);
        let logo = graph.logo.as_ref().unwrap();
        assert_eq!(logo.width, 230);
        let fc = graph.to_filter_complex();
        assert!(fc.ends_with("[v_main];[1:v]scale=230:-1[logo];[v_main][logo]overlay=W-w-25:25"));
        assert_eq!(graph.extra_inputs(), vec![logo_path.as_path()]);

        let canvas = CanvasGeometry::for_source(720, 1280, &CanonicalResolutions::default());
        let graph = build_filter_graph((720, 1280), canvas, &tracks(), &SubtitleStyles::default(), &policy);
        assert_eq!(graph.logo.unwrap().width, 194);
    }

    #[test]
    fn escapes_special_characters() {
        assert_eq!(escape_filter_value("out/trans.srt"), "out/trans.srt");
        assert_eq!(escape_filter_value("C:\\a,b.srt"), "C\\\\:\\\\\\\\a\\,b.srt");
        assert_eq!(escape_filter_value("it's"), "it\\\\\\'s");
    }
}
