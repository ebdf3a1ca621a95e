use crate::geometry::Orientation;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Colour in the subtitle renderer's `&HAABBGGRR` notation, where alpha 0 is
/// opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssColor {
    pub alpha: u8,
    pub blue: u8,
    pub green: u8,
    pub red: u8,
}

impl AssColor {
    pub const WHITE: AssColor = AssColor::rgba(0xFF, 0xFF, 0xFF, 0x00);
    pub const BLACK: AssColor = AssColor::rgba(0x00, 0x00, 0x00, 0x00);
    pub const ORANGE: AssColor = AssColor::rgba(0xFF, 0xA5, 0x00, 0x00);

    pub const fn rgba(red: u8, green: u8, blue: u8, alpha: u8) -> Self {
        Self {
            alpha,
            blue,
            green,
            red,
        }
    }
}

impl fmt::Display for AssColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "&H{:02X}{:02X}{:02X}{:02X}",
            self.alpha, self.blue, self.green, self.red
        )
    }
}

impl FromStr for AssColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_end_matches('&');
        let hex = trimmed
            .strip_prefix("&H")
            .or_else(|| trimmed.strip_prefix("&h"))
            .ok_or_else(|| format!("colour must start with &H: {s}"))?;
        if hex.is_empty() || hex.len() > 8 {
            return Err(format!("colour must have 1-8 hex digits: {s}"));
        }
        let value = u32::from_str_radix(hex, 16).map_err(|err| format!("bad colour {s}: {err}"))?;
        let [alpha, blue, green, red] = value.to_be_bytes();
        Ok(Self {
            alpha,
            blue,
            green,
            red,
        })
    }
}

impl TryFrom<String> for AssColor {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AssColor> for String {
    fn from(value: AssColor) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackRole {
    Source,
    Translation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleProfile {
    pub name: String,
    pub font_family: String,
    pub font_size: u32,
    pub primary_color: AssColor,
    pub outline_color: AssColor,
    pub outline_width: f32,
    pub background_color: AssColor,
    pub border_style: u8,
    pub alignment: u8,
    pub vertical_margin: u32,
    pub horizontal_margin: u32,
    pub bold: bool,
    pub spacing: f32,
    pub shadow: u32,
    /// Canvas height the sizes and vertical margin are written against.
    pub reference_height: u32,
}

impl StyleProfile {
    /// Font size and vertical margin rescaled to `target_height`, truncated.
    pub fn scaled_for(&self, target_height: u32) -> StyleProfile {
        let rescale = |value: u32| {
            (value as u64 * target_height as u64 / self.reference_height.max(1) as u64) as u32
        };
        StyleProfile {
            font_size: rescale(self.font_size),
            vertical_margin: rescale(self.vertical_margin),
            reference_height: target_height,
            ..self.clone()
        }
    }

    /// `force_style` value understood by the subtitles filter.
    pub fn to_force_style(&self) -> String {
        format!(
            "FontSize={},FontName={},PrimaryColour={},OutlineColour={},OutlineWidth={},\
             BackColour={},BorderStyle={},Alignment={},MarginV={},Bold={},Spacing={},\
             Shadow={},MarginL={},MarginR={}",
            self.font_size,
            self.font_family,
            self.primary_color,
            self.outline_color,
            self.outline_width,
            self.background_color,
            self.border_style,
            self.alignment,
            self.vertical_margin,
            u8::from(self.bold),
            self.spacing,
            self.shadow,
            self.horizontal_margin,
            self.horizontal_margin,
        )
    }
}

/// Style table for burned subtitles. Landscape shows both tracks, portrait
/// only the translation. A config file may name any subset of profile
/// fields; the rest keep the built-in value for that profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SubtitleStylesPatch")]
pub struct SubtitleStyles {
    pub landscape_source: StyleProfile,
    pub landscape_translation: StyleProfile,
    pub portrait_translation: StyleProfile,
    pub landscape_wrap_limit: usize,
    pub portrait_wrap_limit: usize,
}

impl Default for SubtitleStyles {
    fn default() -> Self {
        Self {
            landscape_source: StyleProfile {
                name: "landscape-source".into(),
                font_family: "Arial".into(),
                font_size: 14,
                primary_color: AssColor::WHITE,
                outline_color: AssColor::BLACK,
                outline_width: 2.5,
                background_color: AssColor::rgba(0, 0, 0, 0x66),
                border_style: 4,
                alignment: 2,
                vertical_margin: 20,
                horizontal_margin: 30,
                bold: true,
                spacing: 1.5,
                shadow: 0,
                reference_height: 1080,
            },
            landscape_translation: StyleProfile {
                name: "landscape-translation".into(),
                font_family: "HYWenHei".into(),
                font_size: 24,
                primary_color: AssColor::ORANGE,
                outline_color: AssColor::BLACK,
                outline_width: 3.5,
                background_color: AssColor::rgba(0, 0, 0, 0x80),
                border_style: 4,
                alignment: 2,
                vertical_margin: 65,
                horizontal_margin: 30,
                bold: true,
                spacing: 1.5,
                shadow: 0,
                reference_height: 1080,
            },
            portrait_translation: StyleProfile {
                name: "portrait-translation".into(),
                font_family: "HYWenHei".into(),
                font_size: 12,
                primary_color: AssColor::ORANGE,
                outline_color: AssColor::BLACK,
                outline_width: 0.0,
                background_color: AssColor::rgba(0, 0, 0, 0x99),
                border_style: 4,
                alignment: 2,
                vertical_margin: 55,
                horizontal_margin: 40,
                bold: true,
                spacing: 1.5,
                shadow: 0,
                reference_height: 1920,
            },
            landscape_wrap_limit: 20,
            portrait_wrap_limit: 10,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct SubtitleStylesPatch {
    landscape_source: Option<Value>,
    landscape_translation: Option<Value>,
    portrait_translation: Option<Value>,
    landscape_wrap_limit: Option<usize>,
    portrait_wrap_limit: Option<usize>,
}

/// `base` with the fields present in `patch` replaced.
fn overlay(base: &StyleProfile, patch: Option<Value>) -> Result<StyleProfile, String> {
    let Some(patch) = patch else {
        return Ok(base.clone());
    };
    let Value::Object(fields) = patch else {
        return Err(format!("style {} must be an object", base.name));
    };
    let mut merged = serde_json::to_value(base).map_err(|err| err.to_string())?;
    if let Value::Object(target) = &mut merged {
        target.extend(fields);
    }
    serde_json::from_value(merged).map_err(|err| format!("style {}: {err}", base.name))
}

impl TryFrom<SubtitleStylesPatch> for SubtitleStyles {
    type Error = String;

    fn try_from(patch: SubtitleStylesPatch) -> Result<Self, Self::Error> {
        let base = SubtitleStyles::default();
        Ok(Self {
            landscape_source: overlay(&base.landscape_source, patch.landscape_source)?,
            landscape_translation: overlay(&base.landscape_translation, patch.landscape_translation)?,
            portrait_translation: overlay(&base.portrait_translation, patch.portrait_translation)?,
            landscape_wrap_limit: patch.landscape_wrap_limit.unwrap_or(base.landscape_wrap_limit),
            portrait_wrap_limit: patch.portrait_wrap_limit.unwrap_or(base.portrait_wrap_limit),
        })
    }
}

impl SubtitleStyles {
    /// Profiles to burn for `orientation`, scaled to `target_height`, in
    /// burn order.
    pub fn active(&self, orientation: Orientation, target_height: u32) -> Vec<(TrackRole, StyleProfile)> {
        match orientation {
            Orientation::Landscape => vec![
                (
                    TrackRole::Source,
                    self.landscape_source.scaled_for(target_height),
                ),
                (
                    TrackRole::Translation,
                    self.landscape_translation.scaled_for(target_height),
                ),
            ],
            Orientation::Portrait => vec![(
                TrackRole::Translation,
                self.portrait_translation.scaled_for(target_height),
            )],
        }
    }

    pub fn wrap_limit(&self, orientation: Orientation) -> usize {
        match orientation {
            Orientation::Landscape => self.landscape_wrap_limit,
            Orientation::Portrait => self.portrait_wrap_limit,
        }
    }
}
