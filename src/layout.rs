//! Caption wrapping with a character-width heuristic.
//!
//! Widths are estimated, not measured: CJK glyphs count as one em, everything
//! else as 0.55 em. The shrink loop trades font size for line count until the
//! block fits the height budget or the minimum font size is reached.

use crate::config::LayoutConfig;

const NARROW_GLYPH_RATIO: f64 = 0.55;

/// Wrapped lines and the font size they were wrapped at.
#[derive(Debug, Clone, PartialEq)]
pub struct LineLayout {
    pub lines: Vec<String>,
    pub font_size: f64,
}

impl LineLayout {
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn block_height(&self, line_height: f64) -> f64 {
        self.lines.len() as f64 * self.font_size * line_height
    }
}

/// Constraints for one shrink-to-fit run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutBounds {
    pub max_width: f64,
    pub max_text_height: f64,
    pub min_font_size: f64,
    pub font_step: f64,
    pub line_height: f64,
}

impl LayoutBounds {
    /// Bounds for a caption over an image of the given size.
    pub fn for_canvas(config: &LayoutConfig, width: u32, height: u32) -> Self {
        Self {
            max_width: width as f64 - config.padding * 2.0,
            max_text_height: height as f64 * config.max_text_ratio,
            min_font_size: config.min_font_size,
            font_step: config.font_step,
            line_height: config.line_height,
        }
    }
}

fn is_wide(c: char) -> bool {
    matches!(c, '\u{3000}'..='\u{9FFF}' | '\u{AC00}'..='\u{D7AF}')
}

pub fn estimate_width(text: &str, font_size: f64) -> f64 {
    text.chars()
        .map(|c| if is_wide(c) { font_size } else { font_size * NARROW_GLYPH_RATIO })
        .sum()
}

/// Greedy word wrap. Each `\n` starts a new paragraph; words longer than
/// `max_width` occupy a line of their own and are never split.
pub fn wrap_text(text: &str, max_width: f64, font_size: f64) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut words = paragraph.split_whitespace();
        let Some(first) = words.next() else {
            lines.push(String::new());
            continue;
        };
        let mut current = first.to_string();
        for word in words {
            let candidate = format!("{current} {word}");
            if estimate_width(&candidate, font_size) < max_width {
                current = candidate;
            } else {
                lines.push(std::mem::replace(&mut current, word.to_string()));
            }
        }
        lines.push(current);
    }
    lines
}

/// Wraps `text`, shrinking the font in fixed steps while the block is taller
/// than `bounds.max_text_height`. Overflow at the minimum size is accepted.
pub fn layout_text(text: &str, initial_font_size: f64, bounds: &LayoutBounds) -> LineLayout {
    let mut font_size = initial_font_size;
    let mut lines = wrap_text(text, bounds.max_width, font_size);
    while lines.len() as f64 * font_size * bounds.line_height > bounds.max_text_height
        && font_size > bounds.min_font_size
    {
        let next = (font_size - bounds.font_step).max(bounds.min_font_size);
        // A step below the float spacing at this size cannot make progress.
        if next >= font_size {
            break;
        }
        font_size = next;
        lines = wrap_text(text, bounds.max_width, font_size);
    }
    LineLayout { lines, font_size }
}

/// Initial font size for an image of `height` pixels, unless overridden.
/// Either way the result is capped at `max_font_size` and at the image
/// height, never going below the minimum font size.
pub fn initial_font_size(config: &LayoutConfig, height: u32, requested: Option<f64>) -> f64 {
    let size = match requested {
        Some(size) if size.is_finite() && size > 0.0 => size,
        _ => (height as f64 * config.font_ratio).max(config.initial_font_floor),
    };
    size.min(config.max_font_size)
        .min(height as f64)
        .max(config.min_font_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(max_width: f64, max_text_height: f64) -> LayoutBounds {
        LayoutBounds {
            max_width,
            max_text_height,
            min_font_size: 16.0,
            font_step: 2.0,
            line_height: 1.4,
        }
    }

    fn words_of(lines: &[String]) -> Vec<String> {
        lines
            .iter()
            .flat_map(|line| line.split_whitespace())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn cjk_counts_as_full_em() {
        assert_eq!(estimate_width("ab", 20.0), 22.0);
        assert_eq!(estimate_width("한글", 20.0), 40.0);
        assert_eq!(estimate_width("日本", 10.0), 20.0);
        assert_eq!(estimate_width("", 10.0), 0.0);
    }

    #[test]
    fn short_caption_stays_on_one_line() {
        let lines = wrap_text("Hello World", 1120.0, 25.2);
        assert_eq!(lines, vec!["Hello World".to_string()]);
    }

    #[test]
    fn wraps_greedily_at_the_width_limit() {
        // "aaaa bbbb" is 9 chars * 5.5 = 49.5 at font size 10.
        assert_eq!(wrap_text("aaaa bbbb cccc", 50.0, 10.0), vec!["aaaa bbbb", "cccc"]);
        // Equal to the limit does not fit.
        assert_eq!(wrap_text("aaaa bbbb", 49.5, 10.0), vec!["aaaa", "bbbb"]);
    }

    #[test]
    fn long_words_overflow_unsplit() {
        let lines = wrap_text("a supercalifragilistic b", 30.0, 10.0);
        assert_eq!(lines, vec!["a", "supercalifragilistic", "b"]);
    }

    #[test]
    fn empty_text_yields_one_empty_line() {
        assert_eq!(wrap_text("", 100.0, 10.0), vec![String::new()]);
        assert_eq!(wrap_text("   ", 100.0, 10.0), vec![String::new()]);
        let layout = layout_text("", 40.0, &bounds(100.0, 10.0));
        assert_eq!(layout.line_count(), 1);
    }

    #[test]
    fn newlines_are_hard_breaks() {
        assert_eq!(
            wrap_text("first line\n\nthird", 1000.0, 10.0),
            vec!["first line", "", "third"]
        );
    }

    #[test]
    fn wrapping_preserves_every_word_in_order() {
        let text = "The quick brown fox jumps over the lazy dog 다람쥐 헌 쳇바퀴에 타고파 \
                    and keeps   running through  an unreasonably-long-hyphenated-token";
        for width in [40.0, 120.0, 300.0, 5000.0] {
            let lines = wrap_text(text, width, 18.0);
            assert!(!lines.is_empty());
            let expected: Vec<String> = text.split_whitespace().map(str::to_string).collect();
            assert_eq!(words_of(&lines), expected, "width {width}");
        }
    }

    #[test]
    fn shrinks_until_the_block_fits() {
        let text = "one two three four five six seven eight nine ten eleven twelve";
        let initial = 40.0;
        let b = bounds(300.0, 120.0);
        let layout = layout_text(text, initial, &b);
        assert!(layout.font_size < initial);
        assert!(layout.font_size >= b.min_font_size);
        assert!(layout.block_height(b.line_height) <= b.max_text_height || layout.font_size == b.min_font_size);
        assert_eq!(layout.lines, wrap_text(text, b.max_width, layout.font_size));
    }

    #[test]
    fn stops_at_the_minimum_even_when_overflowing() {
        let text = "word ".repeat(200);
        let layout = layout_text(&text, 31.0, &bounds(200.0, 20.0));
        assert_eq!(layout.font_size, 16.0);
        assert!(layout.block_height(1.4) > 20.0);
    }

    #[test]
    fn starting_at_the_floor_never_shrinks() {
        let text = "word ".repeat(200);
        let layout = layout_text(&text, 16.0, &bounds(200.0, 20.0));
        assert_eq!(layout.font_size, 16.0);
        assert_eq!(layout.lines, wrap_text(&text, 200.0, 16.0));
    }

    #[test]
    fn fitting_text_keeps_its_initial_size() {
        let layout = layout_text("Hello World", 25.2, &bounds(1120.0, 283.5));
        assert_eq!(layout.font_size, 25.2);
        assert_eq!(layout.lines, vec!["Hello World".to_string()]);
    }

    #[test]
    fn initial_size_follows_height_with_a_floor() {
        let config = LayoutConfig::default();
        assert_eq!(initial_font_size(&config, 1000, None), 40.0);
        assert_eq!(initial_font_size(&config, 300, None), 20.0);
        assert_eq!(initial_font_size(&config, 1000, Some(64.0)), 64.0);
        assert_eq!(initial_font_size(&config, 1000, Some(-3.0)), 40.0);
        assert_eq!(initial_font_size(&config, 1000, Some(f64::NAN)), 40.0);
    }

    #[test]
    fn requested_sizes_are_capped() {
        let config = LayoutConfig::default();
        assert_eq!(initial_font_size(&config, 630, Some(1e20)), 512.0);
        assert_eq!(initial_font_size(&config, 630, Some(f64::MAX)), 512.0);
        assert_eq!(initial_font_size(&config, 100, Some(300.0)), 100.0);
        assert_eq!(initial_font_size(&config, 100_000, None), 512.0);
        assert_eq!(initial_font_size(&config, 8, Some(4.0)), 16.0);
    }

    #[test]
    fn step_below_float_spacing_still_terminates() {
        let b = bounds(1120.0, 283.5);
        let layout = layout_text("Hello World", 1e20, &b);
        assert_eq!(layout.font_size, 1e20);
        assert_eq!(layout.line_count(), 2);
    }

    #[test]
    fn huge_requested_size_shrinks_to_fit_the_canvas() {
        let config = LayoutConfig::default();
        let b = LayoutBounds::for_canvas(&config, 1200, 630);
        let initial = initial_font_size(&config, 630, Some(1e20));
        let layout = layout_text("Hello World", initial, &b);
        assert!(layout.font_size <= initial);
        assert!(layout.font_size >= config.min_font_size);
        assert!(layout.block_height(b.line_height) <= b.max_text_height);
    }

    #[test]
    fn canvas_bounds_use_padding_and_ratio() {
        let b = LayoutBounds::for_canvas(&LayoutConfig::default(), 1200, 630);
        assert_eq!(b.max_width, 1120.0);
        assert!((b.max_text_height - 283.5).abs() < 1e-9);
    }
}
