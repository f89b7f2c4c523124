//! Line breaking and measurement over font metrics.
//!
//! Text is handled as a `char` slice. Outside of `pre`, runs of whitespace
//! collapse to a single space and lines break between words; a word wider
//! than the box is placed on its own line rather than split.

use std::fmt;
use std::sync::Arc;

use crate::core::geometry::Size;
use crate::core::style::{OverflowWrap, TextAlign, TextOverflow, TextTransform, WhiteSpace};
use crate::resource::font::Font;

const SPACE: char = ' ';
const TAB: char = '\t';
const NEW_LINE: char = '\n';

/// Metrics of a face at its current size.
pub trait GlyphMetrics {
    fn line_height(&self) -> f32;

    fn ascent(&self) -> f32;

    fn advance(&self, codepoint: char) -> f32;

    fn kerning(&self, previous: char, codepoint: char) -> f32;

    fn advance_and_kerning(&self, codepoint: char, previous: Option<char>) -> f32 {
        self.advance(codepoint) + previous.map_or(0.0, |p| self.kerning(p, codepoint))
    }
}

#[derive(Clone)]
pub struct TextStyle {
    pub font: Option<Arc<Font>>,
    pub font_size_px: f32,
    pub max_lines: i32,
    pub context_box: Size,
    pub transform: TextTransform,
    pub align: TextAlign,
    pub overflow: TextOverflow,
    pub overflow_wrap: OverflowWrap,
    pub white_space: WhiteSpace,
    pub kerning_enabled: bool,
}

impl fmt::Debug for TextStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextStyle")
            .field("font", &self.font.as_ref().map(|font| font.info().family.clone()))
            .field("font_size_px", &self.font_size_px)
            .field("max_lines", &self.max_lines)
            .field("context_box", &self.context_box)
            .field("align", &self.align)
            .field("white_space", &self.white_space)
            .finish()
    }
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font: None,
            font_size_px: crate::core::style::compute::DEFAULT_FONT_SIZE_PX,
            max_lines: 0,
            context_box: Size::default(),
            transform: TextTransform::None,
            align: TextAlign::Left,
            overflow: TextOverflow::None,
            overflow_wrap: OverflowWrap::Normal,
            white_space: WhiteSpace::Normal,
            kerning_enabled: false,
        }
    }
}

/// A laid out line. `start..end` covers its visible characters and `next`
/// is where the following line begins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub start: usize,
    pub end: usize,
    pub next: usize,
    pub width: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Word {
    start: usize,
    end: usize,
    width: f32,
}

pub fn is_whitespace(codepoint: char) -> bool {
    matches!(codepoint, SPACE | TAB | NEW_LINE)
}

/// Applies the case transform to a single codepoint.
pub fn peek(codepoint: char, transform: TextTransform) -> char {
    match transform {
        TextTransform::Uppercase => codepoint.to_uppercase().next().unwrap_or(codepoint),
        TextTransform::Lowercase => codepoint.to_lowercase().next().unwrap_or(codepoint),
        TextTransform::None => codepoint,
    }
}

/// Index of the first non-whitespace character at or after `pos`.
pub fn skip_whitespace(text: &[char], pos: usize) -> usize {
    let mut cursor = pos;

    while cursor < text.len() && (is_whitespace(text[cursor]) || text[cursor] < SPACE) {
        cursor += 1;
    }

    cursor
}

fn run_width(text: &[char], style: &TextStyle, metrics: &dyn GlyphMetrics) -> f32 {
    let mut previous = None;
    let mut width = 0.0;

    for &c in text {
        let codepoint = peek(c, style.transform);

        width += metrics.advance_and_kerning(codepoint, previous);

        if style.kerning_enabled {
            previous = Some(codepoint);
        }
    }

    width
}

fn next_word(text: &[char], pos: usize, style: &TextStyle, metrics: &dyn GlyphMetrics) -> Word {
    let start = skip_whitespace(text, pos);
    let mut end = start;

    while end < text.len() && text[end] > SPACE {
        end += 1;
    }

    Word {
        start,
        end,
        width: run_width(&text[start..end], style, metrics),
    }
}

/// Lays out the line starting at `pos`.
pub fn next_line(text: &[char], pos: usize, style: &TextStyle, metrics: &dyn GlyphMetrics) -> Line {
    if style.white_space == WhiteSpace::Pre {
        let end = text[pos..].iter().position(|&c| c == NEW_LINE).map_or(text.len(), |i| pos + i);
        let next = if end < text.len() { end + 1 } else { end };

        return Line {
            start: pos,
            end,
            next,
            width: run_width(&text[pos..end], style, metrics),
        };
    }

    let start = skip_whitespace(text, pos);
    let space = metrics.advance(SPACE);
    let wrap = style.white_space != WhiteSpace::NoWrap;
    let mut cursor = start;
    let mut end = start;
    let mut width = 0.0;

    while cursor < text.len() {
        let word = next_word(text, cursor, style, metrics);

        if word.start == word.end {
            cursor = word.end;
            break;
        }

        if width > 0.0 {
            if wrap && width + space + word.width > style.context_box.width {
                break;
            }

            width += space + word.width;
        } else {
            width = word.width;

            if wrap && word.width > style.context_box.width {
                end = word.end;
                cursor = word.end;
                break;
            }
        }

        end = word.end;
        cursor = word.end;
    }

    Line {
        start,
        end,
        next: cursor,
        width,
    }
}

/// Number of lines the box and the maxLines property allow.
pub fn line_limit(style: &TextStyle, line_height: f32) -> usize {
    let mut limit = usize::MAX;

    if style.context_box.height > 0.0 && line_height > 0.0 {
        limit = (style.context_box.height / line_height).ceil() as usize;
    }

    if style.max_lines > 0 {
        limit = limit.min(style.max_lines as usize);
    }

    limit
}

pub fn lines(text: &[char], style: &TextStyle, metrics: &dyn GlyphMetrics) -> Vec<Line> {
    let limit = line_limit(style, metrics.line_height());
    let mut out = Vec::new();
    let mut cursor = 0;

    while cursor < text.len() && out.len() < limit {
        let line = next_line(text, cursor, style, metrics);

        if line.next < text.len() || line.width > 0.0 {
            out.push(line);
        }

        if line.next == cursor {
            break;
        }

        cursor = line.next;
    }

    out
}

pub fn measure(text: &[char], style: &TextStyle, metrics: &dyn GlyphMetrics) -> Size {
    let lines = lines(text, style, metrics);

    Size {
        width: lines.iter().fold(0.0, |longest, line| f32::max(longest, line.width)),
        height: lines.len() as f32 * metrics.line_height(),
    }
}

/// The characters a line draws, case transformed, with collapsed whitespace
/// outside of `pre`.
pub fn line_glyphs(text: &[char], line: &Line, style: &TextStyle) -> Vec<char> {
    let visible = &text[line.start..line.end];

    if style.white_space == WhiteSpace::Pre {
        return visible.iter().map(|&c| peek(c, style.transform)).collect();
    }

    let mut out = Vec::with_capacity(visible.len());
    let mut pending_space = false;

    for &c in visible {
        if is_whitespace(c) || c < SPACE {
            pending_space = !out.is_empty();
        } else {
            if pending_space {
                out.push(SPACE);
                pending_space = false;
            }
            out.push(peek(c, style.transform));
        }
    }

    out
}
