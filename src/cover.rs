use crate::config::{ColorPalette, Config, CoverConfig, CoverLayout, Gradient, HexColor};
use crate::error::{ComposeError, Result};
use crate::font::{FontFace, resolve_font};
use crate::geometry::letterbox;
use crate::highlight::{ColorRole, StyledLine};
use crate::layout::{FitRequest, LayoutResult, center_vertical, layout_text};
use crate::logok;
use crate::metrics::GlyphMetrics;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use rand::seq::SliceRandom;
use rand::{SeedableRng, rngs::StdRng};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

const REFERENCE_HEIGHT: f32 = 1080.0;
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Alpha-blends `color` over `dst` with the given coverage in `[0, 1]`.
pub(crate) fn blend(dst: &mut Rgba<u8>, color: Rgba<u8>, coverage: f32) {
    let a = coverage.clamp(0.0, 1.0) * color.0[3] as f32 / 255.0;
    if a <= 0.0 {
        return;
    }
    for c in 0..3 {
        let mixed = dst.0[c] as f32 * (1.0 - a) + color.0[c] as f32 * a;
        dst.0[c] = mixed.round().clamp(0.0, 255.0) as u8;
    }
    let alpha = dst.0[3] as f32 + (255.0 - dst.0[3] as f32) * a;
    dst.0[3] = alpha.round().clamp(0.0, 255.0) as u8;
}

/// Fills `[x0, x1) x [y0, y1)`, clipped to the canvas.
pub(crate) fn fill_rect(canvas: &mut RgbaImage, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgba<u8>) {
    let (w, h) = canvas.dimensions();
    let (x0, x1) = (x0.clamp(0, w as i64), x1.clamp(0, w as i64));
    let (y0, y1) = (y0.clamp(0, h as i64), y1.clamp(0, h as i64));
    for y in y0..y1 {
        for x in x0..x1 {
            blend(canvas.get_pixel_mut(x as u32, y as u32), color, 1.0);
        }
    }
}

/// Alpha of gradient row `y`, clamped to 255. Rows above the band are 0.
pub(crate) fn gradient_alpha(gradient: &Gradient, height: u32, y: u32) -> u8 {
    let band = (height as f32 * gradient.height_fraction).round() as u32;
    if band == 0 {
        return 0;
    }
    let start = height - band.min(height);
    if y < start {
        return 0;
    }
    let progress = (y - start) as f32 / band as f32;
    let alpha = gradient.start_alpha as f32
        + (gradient.end_alpha as f32 - gradient.start_alpha as f32) * progress;
    alpha.clamp(0.0, 255.0) as u8
}

/// Drops any bracketed prefix (`[tag] title` becomes `title`) and flattens
/// newlines.
pub fn clean_title(text: &str) -> String {
    let tail = match text.rfind(']') {
        Some(idx) => &text[idx + ']'.len_utf8()..],
        None => text,
    };
    tail.replace(['\r', '\n'], " ").trim().to_string()
}

fn stable_hash(text: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in text.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

/// Picks the title colour. The same title and seed always give the same colour.
pub fn pick_title_color(palette: &ColorPalette, title: &str, seed: Option<u64>) -> HexColor {
    let mut rng = StdRng::seed_from_u64(seed.unwrap_or_else(|| stable_hash(title)));
    palette
        .title_colors
        .choose(&mut rng)
        .copied()
        .unwrap_or(palette.highlight)
}

#[derive(Debug, Clone)]
pub struct CoverReport {
    pub output: PathBuf,
    pub font_size: u32,
    pub lines: Vec<String>,
    pub overflowed: bool,
}

pub struct CoverRenderer {
    font: FontFace,
    config: CoverConfig,
    palette: ColorPalette,
    keywords: Vec<String>,
}

impl CoverRenderer {
    pub fn new(font: FontFace, config: CoverConfig, palette: ColorPalette, keywords: Vec<String>) -> Self {
        Self {
            font,
            config,
            palette,
            keywords,
        }
    }

    /// Resolves the configured font (with fallbacks) and takes the cover
    /// settings from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let font = resolve_font(config.font_path.as_deref(), &config.fallback_fonts)?;
        Ok(Self::new(
            font,
            config.cover.clone(),
            config.color_palette.clone(),
            config.highlight_keywords.clone(),
        ))
    }

    fn scale(&self) -> f32 {
        self.config.canvas.height as f32 / REFERENCE_HEIGHT
    }

    fn px(&self, value: u32) -> u32 {
        (value as f32 * self.scale()) as u32
    }

    /// Loads `image_path`, composes the cover for `title` and writes it to
    /// `output` atomically.
    pub fn render(&self, image_path: &Path, title: &str, output: &Path) -> Result<CoverReport> {
        let background = image::open(image_path)
            .map_err(|err| ComposeError::probe(image_path, err.to_string()))?;
        if background.width() == 0 || background.height() == 0 {
            return Err(ComposeError::probe(image_path, "image has zero size"));
        }

        let (canvas, layout) = self.compose(&background, title);
        write_rgb(&canvas, output)?;

        logok(format!("Cover saved: {}", output.display()));
        Ok(CoverReport {
            output: output.to_path_buf(),
            font_size: layout.font_size,
            lines: layout.lines.iter().map(StyledLine::text).collect(),
            overflowed: layout.overflowed,
        })
    }

    /// Builds the cover in memory.
    pub fn compose(&self, background: &DynamicImage, title: &str) -> (RgbaImage, LayoutResult) {
        let mut canvas = self.letterboxed(background);
        let title = clean_title(title);
        let layout = match self.config.layout {
            CoverLayout::Centered => self.draw_centered(&mut canvas, &title),
            CoverLayout::Boxed => self.draw_boxed(&mut canvas, &title),
        };
        (canvas, layout)
    }

    fn letterboxed(&self, background: &DynamicImage) -> RgbaImage {
        let (cw, ch) = (self.config.canvas.width, self.config.canvas.height);
        let fit = letterbox(background.width(), background.height(), cw, ch);
        let resized = imageops::resize(
            &background.to_rgba8(),
            fit.scaled_width,
            fit.scaled_height,
            FilterType::Lanczos3,
        );
        let mut canvas = RgbaImage::from_pixel(cw, ch, BLACK);
        imageops::overlay(&mut canvas, &resized, fit.pad_x as i64, fit.pad_y as i64);
        canvas
    }

    fn draw_centered(&self, canvas: &mut RgbaImage, title: &str) -> LayoutResult {
        let (cw, ch) = canvas.dimensions();
        for y in 0..ch {
            let alpha = gradient_alpha(&self.config.gradient, ch, y);
            if alpha > 0 {
                fill_rect(canvas, 0, y as i64, cw as i64, y as i64 + 1, Rgba([0, 0, 0, alpha]));
            }
        }

        if let Some(badge) = &self.config.badge {
            let px = self.px(50) as f32;
            let width = self.font.advance(badge, px);
            let x = cw as f32 - self.px(50) as f32 - width;
            let y = self.px(30) as f32;
            self.font.draw(canvas, x + 3.0, y + 3.0, badge, px, Rgba([0, 0, 0, 128]));
            self.font.draw(canvas, x, y, badge, px, WHITE);
        }

        let text_top = ch as f32 * self.config.text_start_fraction;
        let request = FitRequest {
            max_width: (cw - 2 * self.px(self.config.side_margin).min(cw / 2)) as f32,
            max_lines: self.config.max_lines,
            usable_height: ch as f32 - text_top,
            safety_fraction: self.config.safety_fraction,
            sizes: self.config.sizes.scaled(self.scale()),
            line_gap: self.px(self.config.line_gap),
        };
        let layout = layout_text(title, &self.font, &request, &self.keywords);

        let fill = pick_title_color(&self.palette, title, self.config.seed).0;
        let start_y = text_top + (request.usable_height - layout.total_height as f32) / 2.0;
        let px = layout.font_size as f32;
        for (i, line) in layout.lines.iter().enumerate() {
            let width = self.font.advance(&line.text(), px);
            let x = ((cw as f32 - width) / 2.0).floor();
            let y = (start_y + (i as u32 * layout.line_height) as f32).floor();
            self.draw_styled(canvas, line, x, y, px, fill, true);
        }
        layout
    }

    fn draw_boxed(&self, canvas: &mut RgbaImage, title: &str) -> LayoutResult {
        let (cw, ch) = canvas.dimensions();
        *canvas = imageops::blur(&*canvas, 2.0);
        fill_rect(canvas, 0, 0, cw as i64, ch as i64, Rgba([0, 0, 0, 50]));

        let accent = self.palette.accent.0;
        if let Some(tag) = &self.config.tag {
            let px = self.px(45) as f32;
            let width = self.font.advance(tag, px);
            fill_rect(
                canvas,
                0,
                self.px(60) as i64,
                (width + self.px(100) as f32) as i64,
                self.px(130) as i64,
                accent,
            );
            self.font.draw(canvas, self.px(50) as f32, self.px(72) as f32, tag, px, WHITE);
        }

        let box_left = self.px(60) as i64;
        let inner_pad = self.px(40);
        let spacing = self.px(25);
        let top_reserved = self.px(200);
        let bottom_margin = self.px(120);
        let request = FitRequest {
            max_width: cw.saturating_sub(self.px(300)) as f32,
            max_lines: self.config.max_lines.min(2),
            usable_height: ch.saturating_sub(top_reserved + bottom_margin) as f32,
            safety_fraction: self.config.safety_fraction,
            sizes: self.config.sizes.scaled(self.scale()),
            line_gap: inner_pad + spacing,
        };
        let layout = layout_text(title, &self.font, &request, &self.keywords);

        let px = layout.font_size as f32;
        let box_h = layout.font_size + inner_pad;
        let pitch = box_h + spacing;
        let total = layout.lines.len() as u32 * pitch;
        let mut current_y = (ch as i64 - total as i64 - bottom_margin as i64).max(top_reserved as i64);

        for line in &layout.lines {
            let text = line.text();
            let width = self.font.advance(&text, px);
            let box_right = box_left + width as i64 + 2 * inner_pad as i64;
            fill_rect(canvas, box_left, current_y, box_right, current_y + box_h as i64, self.palette.text_box.0);
            fill_rect(canvas, box_left, current_y, box_left + self.px(15) as i64, current_y + box_h as i64, accent);

            let ink = self.font.ink_bounds(&text, px);
            let offset = center_vertical(ink.height().round() as i32, box_h as i32, ink.top.round() as i32);
            let y = (current_y + offset as i64) as f32;
            let x = (box_left + inner_pad as i64) as f32;
            self.draw_styled(canvas, line, x, y, px, self.palette.normal.0, false);

            current_y += pitch as i64;
        }
        layout
    }

    fn draw_styled(&self, canvas: &mut RgbaImage, line: &StyledLine, x: f32, y: f32, px: f32, fill: Rgba<u8>, effects: bool) {
        if effects {
            let text = line.text();
            self.font.draw(canvas, x + 3.0, y + 3.0, &text, px, self.palette.shadow.0);
            for (ox, oy) in [(-1.0, -1.0), (-1.0, 0.0), (-1.0, 1.0), (0.0, -1.0), (0.0, 1.0), (1.0, -1.0), (1.0, 0.0), (1.0, 1.0)] {
                self.font.draw(canvas, x + ox, y + oy, &text, px, self.palette.outline.0);
            }
        }

        let mut caret = x;
        for run in &line.runs {
            let color = match run.role {
                ColorRole::Highlight => self.palette.highlight.0,
                ColorRole::Normal => fill,
            };
            caret += self.font.draw(canvas, caret, y, &run.text, px, color);
        }
    }
}

/// Drops alpha and writes through a temporary sibling file.
pub fn write_rgb(canvas: &RgbaImage, output: &Path) -> Result<()> {
    let format = ImageFormat::from_path(output).map_err(|source| ComposeError::Image {
        path: output.to_path_buf(),
        source,
    })?;
    let rgb = DynamicImage::ImageRgba8(canvas.clone()).to_rgb8();

    let dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir).map_err(|err| ComposeError::io(dir, err))?;
    let tmp = tempfile::Builder::new()
        .prefix(".cover-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|err| ComposeError::io(dir, err))?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        rgb.write_to(&mut writer, format).map_err(|source| ComposeError::Image {
            path: output.to_path_buf(),
            source,
        })?;
    }
    tmp.persist(output)
        .map_err(|err| ComposeError::io(output, err.error))?;
    Ok(())
}
