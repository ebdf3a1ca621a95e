use crate::error::{ComposeError, Result};
use crate::logw;
use crate::metrics::{GlyphMetrics, InkBounds};
use ab_glyph::{Font, FontArc, PxScale, ScaleFont, point};
use image::{Rgba, RgbaImage};
use std::path::{Path, PathBuf};

/// Bold CJK-capable faces tried, in order, when the configured font is missing.
pub const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Bold.ttc",
    "/usr/share/fonts/google-noto-cjk/NotoSansCJK-Bold.ttc",
    "/usr/share/fonts/noto-cjk/NotoSansCJK-Bold.ttc",
    "/usr/share/fonts/truetype/wqy/wqy-microhei.ttc",
    "/System/Library/Fonts/PingFang.ttc",
    "/System/Library/Fonts/STHeiti Medium.ttc",
    "C:\\Windows\\Fonts\\msyhbd.ttc",
    "C:\\Windows\\Fonts\\simhei.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
];

/// An outline font loaded from disk. Sizes are em sizes in pixels.
#[derive(Clone)]
pub struct FontFace {
    font: FontArc,
    path: PathBuf,
}

impl std::fmt::Debug for FontFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontFace").field("path", &self.path).finish()
    }
}

impl FontFace {
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|err| ComposeError::FontLoad {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        let font = FontArc::try_from_vec(bytes).map_err(|err| ComposeError::FontLoad {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        Ok(Self {
            font,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn scale(&self, px: f32) -> PxScale {
        let upem = self.font.units_per_em().unwrap_or(1000.0).max(1.0);
        PxScale::from(px * self.font.height_unscaled() / upem)
    }

    /// Draws `text` with its line box top-left at (`x`, `y`) and returns the
    /// advance consumed.
    pub fn draw(
        &self,
        canvas: &mut RgbaImage,
        x: f32,
        y: f32,
        text: &str,
        px: f32,
        color: Rgba<u8>,
    ) -> f32 {
        let scale = self.scale(px);
        let scaled = self.font.as_scaled(scale);
        let baseline = y + scaled.ascent();
        let (width, height) = canvas.dimensions();
        let mut caret = x;

        for ch in text.chars() {
            let id = self.font.glyph_id(ch);
            let glyph = id.with_scale_and_position(scale, point(caret, baseline));
            caret += scaled.h_advance(id);
            let Some(outlined) = self.font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let px_x = bounds.min.x as i64 + gx as i64;
                let px_y = bounds.min.y as i64 + gy as i64;
                if px_x < 0 || px_y < 0 || px_x >= width as i64 || px_y >= height as i64 {
                    return;
                }
                let pixel = canvas.get_pixel_mut(px_x as u32, px_y as u32);
                crate::cover::blend(pixel, color, coverage);
            });
        }

        caret - x
    }
}

impl GlyphMetrics for FontFace {
    fn advance(&self, text: &str, px: f32) -> f32 {
        let scaled = self.font.as_scaled(self.scale(px));
        text.chars()
            .map(|ch| scaled.h_advance(self.font.glyph_id(ch)))
            .sum()
    }

    fn ink_bounds(&self, text: &str, px: f32) -> InkBounds {
        let scale = self.scale(px);
        let scaled = self.font.as_scaled(scale);
        let mut caret = 0.0;
        let mut bounds: Option<InkBounds> = None;

        for ch in text.chars() {
            let id = self.font.glyph_id(ch);
            let glyph = id.with_scale_and_position(scale, point(caret, scaled.ascent()));
            caret += scaled.h_advance(id);
            if let Some(outlined) = self.font.outline_glyph(glyph) {
                let b = outlined.px_bounds();
                bounds = Some(match bounds {
                    Some(acc) => InkBounds {
                        top: acc.top.min(b.min.y),
                        bottom: acc.bottom.max(b.max.y),
                    },
                    None => InkBounds {
                        top: b.min.y,
                        bottom: b.max.y,
                    },
                });
            }
        }

        bounds.unwrap_or_default()
    }
}

/// Loads the configured font, falling back through `fallbacks` and then the
/// system candidates. Each miss is logged as a warning; only running out of
/// candidates is an error.
pub fn resolve_font(preferred: Option<&Path>, fallbacks: &[PathBuf]) -> Result<FontFace> {
    let system = SYSTEM_FONT_CANDIDATES.iter().map(PathBuf::from);
    let candidates = preferred
        .map(Path::to_path_buf)
        .into_iter()
        .chain(fallbacks.iter().cloned())
        .chain(system);

    let mut tried = Vec::new();
    for path in candidates {
        if tried.contains(&path) {
            continue;
        }
        match FontFace::from_path(&path) {
            Ok(face) => {
                if !tried.is_empty() {
                    logw(format!("Falling back to font {}", path.display()));
                }
                return Ok(face);
            }
            Err(err) => {
                if preferred == Some(path.as_path()) {
                    logw(format!("{err}; trying fallback fonts"));
                }
                tried.push(path);
            }
        }
    }

    Err(ComposeError::FontLoad {
        path: preferred.map(Path::to_path_buf).unwrap_or_default(),
        reason: format!("no usable font among {} candidates", tried.len()),
    })
}
