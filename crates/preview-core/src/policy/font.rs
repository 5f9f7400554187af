//! Font measurement seam
//!
//! Sizing only needs two numbers from a font: how wide a single line renders
//! and how tall a line is. Implementations must be deterministic.

use unicode_width::UnicodeWidthStr;

pub trait TextMeasure {
    /// Rendered width of `text`, which never contains a newline
    fn text_width(&self, text: &str) -> f64;

    fn line_height(&self) -> f64;
}

/// Fixed-advance font measured in unicode display columns.
///
/// Wide characters (CJK, most emoji) occupy two columns, zero-width marks none.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonospaceFont {
    pub advance: f64,
    pub line_height: f64,
}

impl MonospaceFont {
    pub fn new(advance: f64, line_height: f64) -> Self {
        Self {
            advance,
            line_height,
        }
    }

    /// Typical metrics for a monospace face at the given point size
    pub fn from_point_size(size: f64) -> Self {
        Self::new(size * 0.6, size * 1.2)
    }
}

impl TextMeasure for MonospaceFont {
    fn text_width(&self, text: &str) -> f64 {
        UnicodeWidthStr::width(text) as f64 * self.advance
    }

    fn line_height(&self) -> f64 {
        self.line_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_uses_display_columns() {
        let font = MonospaceFont::new(10.0, 20.0);
        assert_eq!(font.text_width("abc"), 30.0);
        assert_eq!(font.text_width("日本"), 40.0);
        assert_eq!(font.text_width(""), 0.0);
    }

    #[test]
    fn test_point_size_metrics() {
        let font = MonospaceFont::from_point_size(10.0);
        assert!((font.advance - 6.0).abs() < 1e-9);
        assert!((font.line_height() - 12.0).abs() < 1e-9);
    }
}
