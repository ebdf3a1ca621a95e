use crate::highlight::{StyledLine, assign_highlights};
use crate::metrics::{GlyphMetrics, ScaledFont};
use serde::{Deserialize, Serialize};

pub const ELLIPSIS: &str = "…";

/// Glyph whose ink bottom defines the fixed line height.
pub const REFERENCE_GLYPH: &str = "测";

/// Greedy per-character line breaking. A character that is wider than
/// `max_width` on its own still gets a line of its own.
pub fn wrap(text: &str, font: &ScaledFont<'_>, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if !current.is_empty() {
            let mut candidate = current.clone();
            candidate.push(ch);
            if font.advance(&candidate) > max_width {
                lines.push(std::mem::take(&mut current));
            }
        }
        current.push(ch);
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Terminates `line` with an ellipsis, dropping trailing characters until it
/// fits. A line that already ends with the ellipsis and fits is returned as is.
pub fn ellipsize(line: &str, font: &ScaledFont<'_>, max_width: f32) -> String {
    if line.ends_with(ELLIPSIS) && font.advance(line) <= max_width {
        return line.to_string();
    }

    let mut base = line.strip_suffix(ELLIPSIS).unwrap_or(line).to_string();
    while !base.is_empty() && font.advance(&format!("{base}{ELLIPSIS}")) > max_width {
        base.pop();
    }
    base.push_str(ELLIPSIS);
    base
}

/// Keeps at most `max_lines`; the last kept line is ellipsized when anything
/// was cut. Returns whether truncation happened.
pub fn truncate_lines(
    mut lines: Vec<String>,
    max_lines: usize,
    font: &ScaledFont<'_>,
    max_width: f32,
) -> (Vec<String>, bool) {
    if lines.len() <= max_lines {
        return (lines, false);
    }
    lines.truncate(max_lines);
    if let Some(last) = lines.last_mut() {
        *last = ellipsize(last, font, max_width);
    }
    (lines, true)
}

/// Fixed line pitch for a font size: reference glyph ink bottom plus gap.
pub fn line_height(font: &ScaledFont<'_>, line_gap: u32) -> u32 {
    font.ink_bounds(REFERENCE_GLYPH).bottom.max(0.0).ceil() as u32 + line_gap
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontSizeRange {
    pub max: u32,
    pub min: u32,
    pub step: u32,
}

impl Default for FontSizeRange {
    fn default() -> Self {
        Self {
            max: 200,
            min: 65,
            step: 5,
        }
    }
}

impl FontSizeRange {
    /// Candidate sizes, largest first, always ending at `min`.
    pub fn candidates(&self) -> Vec<u32> {
        let step = self.step.max(1);
        let mut sizes = Vec::new();
        let mut size = self.max.max(self.min);
        while size > self.min {
            sizes.push(size);
            size = size.saturating_sub(step);
        }
        sizes.push(self.min);
        sizes
    }

    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            max: (self.max as f32 * factor) as u32,
            min: ((self.min as f32 * factor) as u32).max(1),
            step: self.step,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitRequest {
    pub max_width: f32,
    pub max_lines: usize,
    pub usable_height: f32,
    pub safety_fraction: f32,
    pub sizes: FontSizeRange,
    pub line_gap: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FitResult {
    pub font_size: u32,
    pub lines: Vec<String>,
    pub line_height: u32,
    pub overflowed: bool,
}

/// Searches font sizes from large to small and accepts the first one whose
/// full wrap fits in `max_lines` and in the height budget. When nothing fits
/// the smallest size is used with truncated, ellipsized lines.
pub fn fit_font(text: &str, metrics: &dyn GlyphMetrics, req: &FitRequest) -> FitResult {
    let budget = req.usable_height * req.safety_fraction;

    for size in req.sizes.candidates() {
        let font = ScaledFont::new(metrics, size as f32);
        let lines = wrap(text, &font, req.max_width);
        let pitch = line_height(&font, req.line_gap);
        let total = lines.len() as u32 * pitch;
        if lines.len() <= req.max_lines && total as f32 <= budget {
            return FitResult {
                font_size: size,
                lines,
                line_height: pitch,
                overflowed: false,
            };
        }
    }

    let size = req.sizes.min;
    let font = ScaledFont::new(metrics, size as f32);
    let (lines, truncated) = truncate_lines(
        wrap(text, &font, req.max_width),
        req.max_lines,
        &font,
        req.max_width,
    );
    tracing::warn!(
        font_size = size,
        truncated,
        "layout overflow: no font size fits {:.0}px, degrading",
        budget
    );
    FitResult {
        font_size: size,
        lines,
        line_height: line_height(&font, req.line_gap),
        overflowed: true,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutResult {
    pub lines: Vec<StyledLine>,
    pub font_size: u32,
    pub line_height: u32,
    pub total_height: u32,
    pub overflowed: bool,
}

/// Fits `text` and colours every line against `keywords`.
pub fn layout_text(
    text: &str,
    metrics: &dyn GlyphMetrics,
    req: &FitRequest,
    keywords: &[String],
) -> LayoutResult {
    let fit = fit_font(text, metrics, req);
    let lines: Vec<StyledLine> = fit
        .lines
        .iter()
        .map(|line| assign_highlights(line, keywords))
        .collect();
    LayoutResult {
        total_height: lines.len() as u32 * fit.line_height,
        lines,
        font_size: fit.font_size,
        line_height: fit.line_height,
        overflowed: fit.overflowed,
    }
}

/// Y offset that puts the ink centre of text on the box centre, for renderers
/// that place text by its ascender line.
pub fn center_vertical(text_height: i32, box_height: i32, font_ascent_offset: i32) -> i32 {
    (box_height - text_height).div_euclid(2) - font_ascent_offset
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::EstimatedMetrics;

    const HEADLINE: &str = "川普突然现身纽约，马斯克紧急发声！";

    fn font(px: f32) -> ScaledFont<'static> {
        ScaledFont::new(&EstimatedMetrics, px)
    }

    fn request(max_lines: usize, usable_height: f32) -> FitRequest {
        FitRequest {
            max_width: 1820.0,
            max_lines,
            usable_height,
            safety_fraction: 0.8,
            sizes: FontSizeRange::default(),
            line_gap: 15,
        }
    }

    #[test]
    fn wrap_reconstructs_input() {
        let texts = [HEADLINE, "mixed English 和中文 text!", "a", "   "];
        for width in [50.0, 180.0, 400.0, 5000.0] {
            for text in texts {
                let f = font(100.0);
                let lines = wrap(text, &f, width);
                assert_eq!(lines.concat(), text);
                for line in &lines {
                    assert!(line.chars().count() == 1 || f.advance(line) <= width);
                }
            }
        }
    }

    #[test]
    fn wrap_empty_is_no_lines() {
        assert!(wrap("", &font(40.0), 100.0).is_empty());
    }

    #[test]
    fn wide_char_gets_own_line() {
        let lines = wrap("川普", &font(100.0), 50.0);
        assert_eq!(lines, vec!["川", "普"]);
    }

    #[test]
    fn ellipsize_is_idempotent() {
        let f = font(100.0);
        let once = ellipsize("马斯克紧急发声", &f, 350.0);
        assert_eq!(once, "马斯…");
        assert_eq!(ellipsize(&once, &f, 350.0), once);

        let tiny = ellipsize("马斯克", &f, 10.0);
        assert_eq!(tiny, ELLIPSIS);
        assert_eq!(ellipsize(&tiny, &f, 10.0), tiny);
    }

    #[test]
    fn truncate_marks_last_line() {
        let f = font(100.0);
        let lines = vec!["一二三".to_string(), "四五六".into(), "七八九".into()];
        let (kept, truncated) = truncate_lines(lines.clone(), 2, &f, 300.0);
        assert!(truncated);
        assert_eq!(kept, vec!["一二三", "四五…"]);

        let (kept, truncated) = truncate_lines(lines.clone(), 3, &f, 300.0);
        assert!(!truncated);
        assert_eq!(kept, lines);
    }

    #[test]
    fn candidates_end_at_min() {
        let range = FontSizeRange { max: 20, min: 8, step: 5 };
        assert_eq!(range.candidates(), vec![20, 15, 10, 8]);
        let range = FontSizeRange { max: 20, min: 10, step: 5 };
        assert_eq!(range.candidates(), vec![20, 15, 10]);
    }

    #[test]
    fn headline_fit_is_deterministic() {
        let req = request(3, 495.0);
        let first = fit_font(HEADLINE, &EstimatedMetrics, &req);
        let second = fit_font(HEADLINE, &EstimatedMetrics, &req);
        assert_eq!(first, second);
        assert_eq!(first.font_size, 190);
        assert_eq!(first.lines, vec!["川普突然现身纽约，", "马斯克紧急发声！"]);
        assert!(!first.overflowed);
        assert!(first.lines.len() as u32 * first.line_height <= 396);
    }

    #[test]
    fn fit_is_monotone_in_constraints() {
        let text = "委内瑞拉危机内幕曝光，美方中方同时表态，拜登与特朗普隔空交锋";
        let mut previous = u32::MAX;
        for height in [900.0, 700.0, 495.0, 300.0, 150.0, 40.0] {
            let size = fit_font(text, &EstimatedMetrics, &request(3, height)).font_size;
            assert!(size <= previous, "height {height} raised size to {size}");
            previous = size;
        }

        let mut previous = u32::MAX;
        for lines in [6, 4, 3, 2, 1] {
            let size = fit_font(text, &EstimatedMetrics, &request(lines, 700.0)).font_size;
            assert!(size <= previous, "max_lines {lines} raised size to {size}");
            previous = size;
        }
    }

    #[test]
    fn overflow_degrades_to_min_size() {
        let text = "一".repeat(200);
        let fit = fit_font(&text, &EstimatedMetrics, &request(3, 300.0));
        assert!(fit.overflowed);
        assert_eq!(fit.font_size, 65);
        assert_eq!(fit.lines.len(), 3);
        assert!(fit.lines[2].ends_with(ELLIPSIS));
        let f = font(65.0);
        assert!(f.advance(&fit.lines[2]) <= 1820.0);
    }

    #[test]
    fn layout_total_height_is_line_multiple() {
        let keywords = vec!["川普".to_string(), "马斯克".to_string()];
        let result = layout_text(HEADLINE, &EstimatedMetrics, &request(3, 495.0), &keywords);
        assert_eq!(result.total_height, result.lines.len() as u32 * result.line_height);
        let joined: String = result.lines.iter().map(StyledLine::text).collect();
        assert_eq!(joined, HEADLINE);
    }

    #[test]
    fn empty_text_lays_out_to_nothing() {
        let result = layout_text("", &EstimatedMetrics, &request(3, 495.0), &[]);
        assert!(result.lines.is_empty());
        assert_eq!(result.total_height, 0);
    }

    #[test]
    fn centering_is_symmetric() {
        for (text_h, box_h, ascent) in [(95, 180, 10), (96, 180, 12), (40, 41, 3), (0, 10, 0)] {
            let offset = center_vertical(text_h, box_h, ascent);
            let centre = (offset + ascent) as f32 + text_h as f32 / 2.0;
            assert!((centre - box_h as f32 / 2.0).abs() <= 1.0);
        }
        assert_eq!(center_vertical(100, 180, 10), 30);
    }
}
