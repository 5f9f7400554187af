//! Popover sizing for text and markdown previews
//!
//! Short content shrinks the popover; long content gets the stable maximum so
//! the box does not reflow while hovering. Large payloads skip measurement
//! entirely. Both functions are pure and deterministic for identical inputs.

use std::borrow::Cow;

use super::font::TextMeasure;

/// Tunables for popover sizing
#[derive(Debug, Clone, PartialEq)]
pub struct SizingPolicy {
    /// Payloads of at least this many UTF-16 units are not measured
    pub measure_limit_utf16: usize,
    /// Payloads with more lines than this are not measured for width
    pub max_measured_lines: usize,
    /// Desired widths at or above `snap_ratio × max_width` become `max_width`
    pub snap_ratio: f64,
    /// Room for clipped descenders and emoji, added to the padded line width
    pub slack: f64,
    /// Spaces per tab when measuring
    pub tab_width: usize,
}

impl Default for SizingPolicy {
    fn default() -> Self {
        Self {
            measure_limit_utf16: 1500,
            max_measured_lines: 80,
            snap_ratio: 0.92,
            slack: 8.0,
            tab_width: 4,
        }
    }
}

impl SizingPolicy {
    /// Preferred popover width for `text`, in `[1, max_width]`.
    ///
    /// Empty or oversized payloads get `max_width`. Otherwise the widest line
    /// plus `2 × padding` and slack, snapped to `max_width` when close to it.
    pub fn preferred_width<F>(&self, text: &str, font: &F, padding: f64, max_width: f64) -> f64
    where
        F: TextMeasure + ?Sized,
    {
        if text.is_empty()
            || max_width.is_nan()
            || max_width < 1.0
            || self.exceeds_measure_limit(text)
        {
            return max_width;
        }

        let lines: Vec<&str> = text
            .split('\n')
            .take(self.max_measured_lines + 1)
            .collect();
        if lines.len() > self.max_measured_lines {
            return max_width;
        }

        let widest = lines
            .iter()
            .map(|line| font.text_width(&self.expand_tabs(strip_cr(line))))
            .fold(0.0, f64::max);

        let desired = (widest + 2.0 * padding + self.slack).max(1.0).min(max_width);
        if desired >= max_width * self.snap_ratio {
            max_width
        } else {
            desired
        }
    }

    /// Height of `text` word-wrapped at `content_width`, clamped to `max_height`.
    ///
    /// Returns 0 for empty text or a non-positive width, and `max_height`
    /// without measuring for oversized payloads.
    pub fn preferred_text_height<F>(
        &self,
        text: &str,
        font: &F,
        content_width: f64,
        max_height: f64,
    ) -> f64
    where
        F: TextMeasure + ?Sized,
    {
        if text.is_empty() || content_width.is_nan() || content_width <= 0.0 {
            return 0.0;
        }
        if self.exceeds_measure_limit(text) {
            return max_height;
        }

        let lines: usize = text
            .split('\n')
            .map(|line| {
                wrapped_line_count(&self.expand_tabs(strip_cr(line)), font, content_width)
            })
            .sum();

        (lines as f64 * font.line_height()).min(max_height)
    }

    fn exceeds_measure_limit(&self, text: &str) -> bool {
        // Each UTF-16 unit takes at least one UTF-8 byte
        text.len() >= self.measure_limit_utf16
            && text.encode_utf16().take(self.measure_limit_utf16).count()
                >= self.measure_limit_utf16
    }

    fn expand_tabs<'a>(&self, line: &'a str) -> Cow<'a, str> {
        if line.contains('\t') {
            Cow::Owned(line.replace('\t', &" ".repeat(self.tab_width)))
        } else {
            Cow::Borrowed(line)
        }
    }
}

/// [`SizingPolicy::preferred_width`] with the default policy
pub fn preferred_width<F>(text: &str, font: &F, padding: f64, max_width: f64) -> f64
where
    F: TextMeasure + ?Sized,
{
    SizingPolicy::default().preferred_width(text, font, padding, max_width)
}

/// [`SizingPolicy::preferred_text_height`] with the default policy
pub fn preferred_text_height<F>(text: &str, font: &F, content_width: f64, max_height: f64) -> f64
where
    F: TextMeasure + ?Sized,
{
    SizingPolicy::default().preferred_text_height(text, font, content_width, max_height)
}

fn strip_cr(line: &str) -> &str {
    line.strip_suffix('\r').unwrap_or(line)
}

/// Number of visual lines a single logical line occupies when word-wrapped.
///
/// Words wider than `max_width` are broken by character. A blank line still
/// occupies one line.
fn wrapped_line_count<F>(line: &str, font: &F, max_width: f64) -> usize
where
    F: TextMeasure + ?Sized,
{
    if line.trim().is_empty() || font.text_width(line) <= max_width {
        return 1;
    }

    let space = font.text_width(" ");
    let mut count = 0usize;
    // Width of the line being filled; None while it is empty
    let mut current: Option<f64> = None;

    for word in line.split_whitespace() {
        let word_width = font.text_width(word);

        if word_width > max_width {
            if current.is_some() {
                count += 1;
            }
            let (full_lines, remainder) = break_word(word, font, max_width);
            count += full_lines;
            current = (remainder > 0.0).then_some(remainder);
            continue;
        }

        current = match current {
            None => Some(word_width),
            Some(width) if width + space + word_width <= max_width => {
                Some(width + space + word_width)
            }
            Some(_) => {
                count += 1;
                Some(word_width)
            }
        };
    }

    if current.is_some() {
        count += 1;
    }
    count.max(1)
}

/// Force-break a word by character. Returns the number of filled lines and
/// the width left over on the last, unfinished line.
fn break_word<F>(word: &str, font: &F, max_width: f64) -> (usize, f64)
where
    F: TextMeasure + ?Sized,
{
    let mut buf = [0u8; 4];
    let mut lines = 0usize;
    let mut width = 0.0;

    for ch in word.chars() {
        let char_width = font.text_width(ch.encode_utf8(&mut buf));
        if width + char_width > max_width && width > 0.0 {
            lines += 1;
            width = 0.0;
        }
        width += char_width;
    }

    (lines, width)
}
