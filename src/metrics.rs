/// Vertical extent of rendered ink, in pixels, measured from the top of the
/// line box (the ascender line) downwards.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InkBounds {
    pub top: f32,
    pub bottom: f32,
}

impl InkBounds {
    pub fn height(&self) -> f32 {
        (self.bottom - self.top).max(0.0)
    }
}

/// Font measurement capability. One value represents one font identity;
/// the pixel size is passed per call.
///
/// `advance` must not decrease when characters are appended to `text`.
pub trait GlyphMetrics: Send + Sync {
    fn advance(&self, text: &str, px: f32) -> f32;

    fn ink_bounds(&self, text: &str, px: f32) -> InkBounds;
}

/// A font identity bound to a pixel size.
#[derive(Clone, Copy)]
pub struct ScaledFont<'a> {
    pub metrics: &'a dyn GlyphMetrics,
    pub px: f32,
}

impl<'a> ScaledFont<'a> {
    pub fn new(metrics: &'a dyn GlyphMetrics, px: f32) -> Self {
        Self { metrics, px }
    }

    pub fn advance(&self, text: &str) -> f32 {
        self.metrics.advance(text, self.px)
    }

    pub fn ink_bounds(&self, text: &str) -> InkBounds {
        self.metrics.ink_bounds(text, self.px)
    }
}

/// Width estimate in em units by character class. Used when no font file is
/// available and by tests that need deterministic numbers.
#[derive(Debug, Clone, Copy, Default)]
pub struct EstimatedMetrics;

fn estimate_char_units(ch: char) -> f32 {
    if ch.is_whitespace() {
        0.25
    } else if ch.is_ascii_alphanumeric() {
        0.55
    } else if ch.is_ascii() {
        0.35
    } else if matches!(
        ch as u32,
        0x4E00..=0x9FFF | 0x3000..=0x303F | 0x3040..=0x30FF | 0xFF00..=0xFFEF
    ) {
        1.0
    } else {
        0.9
    }
}

impl GlyphMetrics for EstimatedMetrics {
    fn advance(&self, text: &str, px: f32) -> f32 {
        text.chars().map(estimate_char_units).sum::<f32>() * px
    }

    fn ink_bounds(&self, text: &str, px: f32) -> InkBounds {
        if text.chars().all(char::is_whitespace) {
            return InkBounds::default();
        }
        InkBounds {
            top: (px * 0.1).round(),
            bottom: (px * 0.95).round(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_grows_with_text() {
        let m = EstimatedMetrics;
        let a = m.advance("川普", 100.0);
        let b = m.advance("川普a", 100.0);
        assert_eq!(a, 200.0);
        assert!(b > a);
    }

    #[test]
    fn blank_text_has_no_ink() {
        let m = EstimatedMetrics;
        assert_eq!(m.ink_bounds("  ", 50.0).height(), 0.0);
        assert_eq!(m.ink_bounds("测", 100.0), InkBounds { top: 10.0, bottom: 95.0 });
    }
}
