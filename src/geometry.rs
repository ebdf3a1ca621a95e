use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Landscape,
    Portrait,
}

impl Orientation {
    pub fn of(width: u32, height: u32) -> Self {
        if height > width {
            Orientation::Portrait
        } else {
            Orientation::Landscape
        }
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Orientation::Landscape => write!(f, "landscape"),
            Orientation::Portrait => write!(f, "portrait"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanonicalResolutions {
    pub landscape: Resolution,
    pub portrait: Resolution,
}

impl Default for CanonicalResolutions {
    fn default() -> Self {
        Self {
            landscape: Resolution::new(1920, 1080),
            portrait: Resolution::new(1080, 1920),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CanvasGeometry {
    pub target_width: u32,
    pub target_height: u32,
    pub orientation: Orientation,
}

impl CanvasGeometry {
    /// Picks the canonical pair for the source orientation; the source size
    /// never scales the target.
    pub fn for_source(width: u32, height: u32, canonical: &CanonicalResolutions) -> Self {
        let orientation = Orientation::of(width, height);
        let target = match orientation {
            Orientation::Landscape => canonical.landscape,
            Orientation::Portrait => canonical.portrait,
        };
        Self {
            target_width: target.width,
            target_height: target.height,
            orientation,
        }
    }
}

/// Aspect-preserving fit of a source into a canvas plus the centred padding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Letterbox {
    pub scale: f64,
    pub scaled_width: u32,
    pub scaled_height: u32,
    pub pad_x: u32,
    pub pad_y: u32,
}

fn even_floor(value: f64, limit: u32) -> u32 {
    let v = (value.floor() as u32).min(limit);
    (v & !1).max(2).min(limit)
}

/// Fits `src` into `canvas` without cropping. Scaled sides are kept even so
/// that the padding on both sides is identical for even canvases.
pub fn letterbox(src_w: u32, src_h: u32, canvas_w: u32, canvas_h: u32) -> Letterbox {
    let scale = f64::min(
        canvas_w as f64 / src_w.max(1) as f64,
        canvas_h as f64 / src_h.max(1) as f64,
    );
    let scaled_width = even_floor(src_w as f64 * scale, canvas_w);
    let scaled_height = even_floor(src_h as f64 * scale, canvas_h);
    Letterbox {
        scale,
        scaled_width,
        scaled_height,
        pad_x: (canvas_w - scaled_width) / 2,
        pad_y: (canvas_h - scaled_height) / 2,
    }
}
