use crate::encoder::EncoderProfiles;
use crate::filter_graph::LogoPolicy;
use crate::geometry::{CanonicalResolutions, Resolution};
use crate::layout::FontSizeRange;
use crate::style::SubtitleStyles;
use anyhow::{Context, Result};
use image::Rgba;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tokio::fs;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// `#RRGGBB` or `#RRGGBBAA`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor(pub Rgba<u8>);

impl HexColor {
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        HexColor(Rgba([r, g, b, a]))
    }
}

impl FromStr for HexColor {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let hex = s
            .trim()
            .strip_prefix('#')
            .ok_or_else(|| format!("colour must start with #: {s}"))?;
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return Err(format!("colour must be #RRGGBB or #RRGGBBAA: {s}"));
        }
        let byte = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|err| format!("bad colour {s}: {err}"))
        };
        let alpha = if hex.len() == 8 { byte(6)? } else { 255 };
        Ok(HexColor(Rgba([byte(0)?, byte(2)?, byte(4)?, alpha])))
    }
}

impl TryFrom<String> for HexColor {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HexColor> for String {
    fn from(value: HexColor) -> Self {
        let [r, g, b, a] = value.0.0;
        if a == 255 {
            format!("#{r:02X}{g:02X}{b:02X}")
        } else {
            format!("#{r:02X}{g:02X}{b:02X}{a:02X}")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorPalette {
    pub normal: HexColor,
    pub highlight: HexColor,
    pub accent: HexColor,
    pub text_box: HexColor,
    pub shadow: HexColor,
    pub outline: HexColor,
    /// Title colours for the centred cover layout; one is picked per title.
    pub title_colors: Vec<HexColor>,
}

impl Default for ColorPalette {
    fn default() -> Self {
        let title = |hex: &str| hex.parse().unwrap_or(HexColor::rgba(255, 215, 0, 255));
        Self {
            normal: HexColor::rgba(0xFF, 0xFF, 0xFF, 0xFF),
            highlight: HexColor::rgba(0xFF, 0xD7, 0x00, 0xFF),
            accent: HexColor::rgba(0xE2, 0x19, 0x18, 0xFF),
            text_box: HexColor::rgba(0, 0, 0, 230),
            shadow: HexColor::rgba(0, 0, 0, 180),
            outline: HexColor::rgba(0, 0, 0, 0xFF),
            title_colors: [
                "#FF1493", "#FF69B4", "#FFD700", "#FF6347", "#00BFFF", "#32CD32", "#FF4500",
                "#9370DB", "#FF8C00", "#1E90FF",
            ]
            .into_iter()
            .map(title)
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverLayout {
    /// Centred title over a bottom gradient, with a corner badge.
    Centered,
    /// Left-aligned title lines in dark boxes under a top tag bar.
    Boxed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Gradient {
    pub start_alpha: u32,
    pub end_alpha: u32,
    pub height_fraction: f32,
}

impl Default for Gradient {
    fn default() -> Self {
        Self {
            start_alpha: 120,
            end_alpha: 300,
            height_fraction: 0.45,
        }
    }
}

/// Cover geometry. Pixel values are written against a 1080px-high canvas
/// and rescaled to `canvas`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverConfig {
    pub canvas: Resolution,
    pub layout: CoverLayout,
    pub sizes: FontSizeRange,
    pub max_lines: usize,
    pub line_gap: u32,
    pub safety_fraction: f32,
    pub text_start_fraction: f32,
    pub side_margin: u32,
    pub badge: Option<String>,
    pub tag: Option<String>,
    pub gradient: Gradient,
    pub seed: Option<u64>,
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self {
            canvas: Resolution::new(1920, 1080),
            layout: CoverLayout::Centered,
            sizes: FontSizeRange::default(),
            max_lines: 3,
            line_gap: 15,
            safety_fraction: 0.8,
            text_start_fraction: 0.5,
            side_margin: 50,
            badge: Some("中英双语".into()),
            tag: Some("GLOBAL NEWS • 深度直击".into()),
            gradient: Gradient::default(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpuMode {
    #[default]
    Auto,
    On,
    Off,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub font_path: Option<PathBuf>,
    /// Overrides the translation subtitle font family when set.
    pub font_family: Option<String>,
    pub fallback_fonts: Vec<PathBuf>,
    pub highlight_keywords: Vec<String>,
    pub color_palette: ColorPalette,
    pub canonical_resolutions: CanonicalResolutions,
    pub encoder_profiles: EncoderProfiles,
    pub gpu: GpuMode,
    pub encode_timeout_secs: u64,
    pub ffmpeg_program: String,
    pub ffprobe_program: String,
    pub logo: LogoPolicy,
    pub subtitles: SubtitleStyles,
    pub cover: CoverConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            font_path: None,
            font_family: None,
            fallback_fonts: Vec::new(),
            highlight_keywords: ["川普", "特朗普", "马斯克", "美方", "委内瑞拉", "中方", "危机", "内幕", "拜登"]
                .into_iter()
                .map(String::from)
                .collect(),
            color_palette: ColorPalette::default(),
            canonical_resolutions: CanonicalResolutions::default(),
            encoder_profiles: EncoderProfiles::default(),
            gpu: GpuMode::Auto,
            encode_timeout_secs: 3600,
            ffmpeg_program: "ffmpeg".into(),
            ffprobe_program: "ffprobe".into(),
            logo: LogoPolicy::default(),
            subtitles: SubtitleStyles::default(),
            cover: CoverConfig::default(),
        }
    }
}

impl Config {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
        let config = Self::from_json(&content)
            .with_context(|| format!("Invalid config: {}", path.as_ref().display()))?;
        Ok(config)
    }

    /// Loads `path` when given, else `config.json` if present, else defaults.
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path).await,
            None if Path::new(DEFAULT_CONFIG_PATH).is_file() => Self::load(DEFAULT_CONFIG_PATH).await,
            None => Ok(Self::default()),
        }
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let mut config: Config = serde_json::from_str(content)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    fn normalize(&mut self) {
        self.highlight_keywords = self
            .highlight_keywords
            .iter()
            .map(|kw| kw.trim().to_string())
            .filter(|kw| !kw.is_empty())
            .collect();
        if let Some(family) = &self.font_family {
            self.subtitles.landscape_translation.font_family = family.clone();
            self.subtitles.portrait_translation.font_family = family.clone();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.encode_timeout_secs == 0 {
            anyhow::bail!("encode_timeout_secs must be positive");
        }
        let cover = &self.cover;
        if !(cover.safety_fraction > 0.0 && cover.safety_fraction <= 1.0) {
            anyhow::bail!("cover.safety_fraction must be in (0, 1]");
        }
        if cover.sizes.min == 0 || cover.sizes.min > cover.sizes.max {
            anyhow::bail!("cover.sizes: need 0 < min <= max");
        }
        if cover.max_lines == 0 {
            anyhow::bail!("cover.max_lines must be at least 1");
        }
        let res = &self.canonical_resolutions;
        for r in [res.landscape, res.portrait] {
            if r.width == 0 || r.height == 0 || r.width % 2 == 1 || r.height % 2 == 1 {
                anyhow::bail!("canonical resolution {}x{} must be even and non-zero", r.width, r.height);
            }
        }
        if res.landscape.height > res.landscape.width || res.portrait.height <= res.portrait.width {
            anyhow::bail!("canonical resolutions do not match their orientation");
        }
        if self.color_palette.title_colors.is_empty() {
            anyhow::bail!("color_palette.title_colors must not be empty");
        }
        Ok(())
    }

    pub fn encode_timeout(&self) -> Duration {
        Duration::from_secs(self.encode_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_default() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_file_overrides_fields() {
        let config = Config::from_json(
            r##"{
                "highlight_keywords": ["特朗普", "  ", "特朗普政府"],
                "font_family": "Noto Sans CJK SC",
                "gpu": "off",
                "cover": { "layout": "boxed", "max_lines": 2 },
                "color_palette": { "highlight": "#00FF00" }
            }"##,
        )
        .unwrap();
        assert_eq!(config.highlight_keywords, vec!["特朗普", "特朗普政府"]);
        assert_eq!(config.gpu, GpuMode::Off);
        assert_eq!(config.cover.layout, CoverLayout::Boxed);
        assert_eq!(config.cover.max_lines, 2);
        assert_eq!(config.cover.sizes, FontSizeRange::default());
        assert_eq!(config.color_palette.highlight, HexColor::rgba(0, 255, 0, 255));
        assert_eq!(config.subtitles.portrait_translation.font_family, "Noto Sans CJK SC");
        assert_eq!(config.subtitles.landscape_source.font_family, "Arial");
    }

    #[test]
    fn nested_sections_accept_partial_objects() {
        let config = Config::from_json(r#"{"subtitles": {"portrait_wrap_limit": 12}}"#).unwrap();
        assert_eq!(config.subtitles.portrait_wrap_limit, 12);
        assert_eq!(config.subtitles.landscape_wrap_limit, 20);

        let config = Config::from_json(r#"{"logo": {"path": "brand.png"}}"#).unwrap();
        assert_eq!(config.logo.path, Some(PathBuf::from("brand.png")));
        assert_eq!(config.logo.margin, LogoPolicy::default().margin);

        let config = Config::from_json(r#"{"encoder_profiles": {"cpu": {"crf": 20}}}"#).unwrap();
        assert_eq!(config.encoder_profiles.cpu.crf, 20);
        assert_eq!(config.encoder_profiles.cpu.codec, "libx264");
        assert_eq!(config.encoder_profiles.cpu.bitrate_caps.max, "6M");
        assert_eq!(config.encoder_profiles.gpu, EncoderProfiles::default().gpu);

        let config = Config::from_json(r#"{"cover": {"sizes": {"max": 150}}}"#).unwrap();
        assert_eq!(config.cover.sizes.max, 150);
        assert_eq!(config.cover.sizes.min, FontSizeRange::default().min);

        let config = Config::from_json(r#"{"canonical_resolutions": {"portrait": {"width": 720, "height": 1280}}}"#).unwrap();
        assert_eq!(config.canonical_resolutions.portrait, Resolution::new(720, 1280));
        assert_eq!(config.canonical_resolutions.landscape, Resolution::new(1920, 1080));
    }

    #[test]
    fn style_overrides_keep_the_rest_of_their_profile() {
        let config = Config::from_json(
            r#"{"subtitles": {"landscape_source": {"font_size": 16}, "portrait_translation": {"vertical_margin": 80}}}"#,
        )
        .unwrap();
        let defaults = SubtitleStyles::default();
        let source = &config.subtitles.landscape_source;
        assert_eq!(source.font_size, 16);
        assert_eq!(source.vertical_margin, defaults.landscape_source.vertical_margin);
        assert_eq!(source.font_family, "Arial");
        assert_eq!(config.subtitles.portrait_translation.vertical_margin, 80);
        assert_eq!(config.subtitles.portrait_translation.reference_height, 1920);
        assert_eq!(config.subtitles.landscape_translation, defaults.landscape_translation);

        assert!(Config::from_json(r#"{"subtitles": {"landscape_source": 3}}"#).is_err());
        assert!(Config::from_json(r#"{"subtitles": {"landscape_source": {"font_size": "big"}}}"#).is_err());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Config::from_json(r#"{"encode_timeout_secs": 0}"#).is_err());
        assert!(Config::from_json(r#"{"cover": {"safety_fraction": 1.5}}"#).is_err());
        assert!(Config::from_json(r##"{"color_palette": {"normal": "white"}}"##).is_err());
        assert!(
            Config::from_json(
                r#"{"canonical_resolutions": {"landscape": {"width": 1080, "height": 1920}, "portrait": {"width": 1080, "height": 1920}}}"#
            )
            .is_err()
        );
    }

    #[test]
    fn hex_colour_notation() {
        assert_eq!("#E21918".parse::<HexColor>().unwrap(), HexColor::rgba(0xE2, 0x19, 0x18, 255));
        assert_eq!("#000000E6".parse::<HexColor>().unwrap(), HexColor::rgba(0, 0, 0, 230));
        assert_eq!(String::from(HexColor::rgba(0, 0, 0, 230)), "#000000E6");
        assert!("#12345".parse::<HexColor>().is_err());
    }

    #[tokio::test]
    async fn load_reports_missing_file() {
        let err = Config::load("/nonexistent/config.json").await.unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }
}
