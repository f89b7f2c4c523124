use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use rusttype::{point, Scale};
use serde::{Deserialize, Serialize};

use crate::core::style::{FontStyle, FontWeight};
use crate::core::text::GlyphMetrics;
use crate::object::{Object, ObjectType};

use super::{Observer, Observers, ResourceError, ResourceEvent, ResourceId, ResourceState};

static NEXT_FONT_ID: AtomicU64 = AtomicU64::new(1);

// Synthetic face proportions, in em.
const SYNTHETIC_ADVANCE: f32 = 0.5;
const SYNTHETIC_ASCENT: f32 = 0.8;
const SYNTHETIC_LINE_HEIGHT: f32 = 1.2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontInfo {
    pub family: String,
    pub style: FontStyle,
    pub weight: FontWeight,
    pub uri: String,
    pub index: u32,
}

/// 8-bit coverage for one glyph. Offsets place the bitmap relative to the
/// pen position on the baseline; `y_offset` is the distance from the top
/// row up to the baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphSurface {
    pub width: u32,
    pub height: u32,
    pub pitch: u32,
    pub x_offset: i32,
    pub y_offset: i32,
    pub coverage: Vec<u8>,
}

/// A parsed face, produced off-thread.
pub enum FontFace {
    Synthetic,
    Outline {
        font: rusttype::Font<'static>,
        has_kerning: bool,
    },
}

impl FontFace {
    pub fn parse(data: Vec<u8>, index: u32) -> Result<FontFace, ResourceError> {
        let has_kerning = ttf_parser::Face::parse(&data, index)
            .map(|face| face.tables().kern.is_some())
            .map_err(|e| ResourceError::FontUnavailable(e.to_string()))?;
        let font = rusttype::Font::try_from_vec_and_index(data, index)
            .ok_or_else(|| ResourceError::FontUnavailable(format!("face {} is not usable", index)))?;

        Ok(FontFace::Outline { font, has_kerning })
    }
}

impl std::fmt::Debug for FontFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FontFace::Synthetic => write!(f, "Synthetic"),
            FontFace::Outline { has_kerning, .. } => write!(f, "Outline {{ has_kerning: {} }}", has_kerning),
        }
    }
}

#[derive(Debug)]
pub struct Font {
    id: u64,
    info: FontInfo,
    state: RwLock<ResourceState>,
    observers: Observers,
    face: RwLock<Option<FontFace>>,
    size: Mutex<f32>,
}

impl Font {
    pub(crate) fn new(info: FontInfo) -> Self {
        Self {
            id: NEXT_FONT_ID.fetch_add(1, Ordering::Relaxed),
            info,
            state: RwLock::new(ResourceState::Init),
            observers: Observers::default(),
            face: RwLock::new(None),
            size: Mutex::new(crate::core::style::compute::DEFAULT_FONT_SIZE_PX),
        }
    }

    /// Metric-only fallback face, ready immediately.
    pub fn synthetic(family: &str) -> Self {
        let font = Self::new(FontInfo {
            family: family.to_string(),
            style: FontStyle::Normal,
            weight: FontWeight::Normal,
            uri: String::new(),
            index: 0,
        });

        *font.face.write() = Some(FontFace::Synthetic);
        *font.state.write() = ResourceState::Ready;
        font
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn info(&self) -> &FontInfo {
        &self.info
    }

    pub fn state(&self) -> ResourceState {
        *self.state.read()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ResourceState::Ready
    }

    pub fn add_observer(&self, key: u64, observer: Observer) {
        self.observers.add(key, observer);
    }

    pub fn remove_observer(&self, key: u64) -> bool {
        self.observers.remove(key)
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn key_equals(&self, family: &str, style: FontStyle, weight: FontWeight) -> bool {
        self.info.family.eq_ignore_ascii_case(family) && self.info.style == style && self.info.weight == weight
    }

    /// Selects the pixel size used by the metric calls. Returns false when
    /// the face is not loaded.
    pub fn use_font_size(&self, px: f32) -> bool {
        if self.face.read().is_none() {
            return false;
        }

        *self.size.lock() = px.max(0.0);
        true
    }

    pub fn font_size(&self) -> f32 {
        *self.size.lock()
    }

    pub fn has_kerning(&self) -> bool {
        matches!(*self.face.read(), Some(FontFace::Outline { has_kerning: true, .. }))
    }

    pub fn glyph_surface(&self, codepoint: char) -> Option<GlyphSurface> {
        let size = self.font_size();
        let face = self.face.read();

        match face.as_ref()? {
            FontFace::Synthetic => {
                if codepoint.is_whitespace() || codepoint.is_control() {
                    return None;
                }

                let width = ((SYNTHETIC_ADVANCE * size * 0.8).round() as u32).max(1);
                let height = ((SYNTHETIC_ASCENT * size).round() as u32).max(1);

                Some(GlyphSurface {
                    width,
                    height,
                    pitch: width,
                    x_offset: (SYNTHETIC_ADVANCE * size * 0.1).round() as i32,
                    y_offset: height as i32,
                    coverage: vec![0xFF; (width * height) as usize],
                })
            }
            FontFace::Outline { font, .. } => {
                let glyph = font.glyph(codepoint).scaled(Scale::uniform(size)).positioned(point(0.0, 0.0));
                let bounds = glyph.pixel_bounding_box()?;
                let width = bounds.width().max(0) as u32;
                let height = bounds.height().max(0) as u32;
                let mut coverage = vec![0u8; (width * height) as usize];

                glyph.draw(|x, y, v| {
                    let index = (y * width + x) as usize;

                    if index < coverage.len() {
                        coverage[index] = (v * 255.0) as u8;
                    }
                });

                Some(GlyphSurface {
                    width,
                    height,
                    pitch: width,
                    x_offset: bounds.min.x,
                    y_offset: -bounds.min.y,
                    coverage,
                })
            }
        }
    }

    pub(crate) fn set_loading(&self) {
        self.transition(ResourceState::Loading);
    }

    /// Applies a load result. Ignored once the font is done.
    pub(crate) fn finish_load(&self, result: Result<FontFace, ResourceError>) {
        if self.state() >= ResourceState::Ready {
            return;
        }

        match result {
            Ok(face) => {
                *self.face.write() = Some(face);
                self.transition(ResourceState::Ready);
            }
            Err(e) => {
                tracing::warn!("font '{}' ({}) failed to load: {} [{:?}]", self.info.family, self.info.uri, e, e.status());
                self.transition(ResourceState::Error);
            }
        }
    }

    pub(crate) fn destroy(&self) {
        self.transition(ResourceState::Done);
        *self.face.write() = None;
    }

    fn transition(&self, next: ResourceState) {
        {
            let mut state = self.state.write();

            if next <= *state {
                return;
            }

            *state = next;
        }

        if next >= ResourceState::Ready {
            self.observers.dispatch(&ResourceEvent {
                state: next,
                resource: ResourceId::Font(self.id),
            });
        }

        if next == ResourceState::Done {
            self.observers.clear();
        }
    }

    fn scale(&self) -> Scale {
        Scale::uniform(self.font_size())
    }
}

impl GlyphMetrics for Font {
    fn line_height(&self) -> f32 {
        match self.face.read().as_ref() {
            Some(FontFace::Synthetic) => SYNTHETIC_LINE_HEIGHT * self.font_size(),
            Some(FontFace::Outline { font, .. }) => {
                let v = font.v_metrics(self.scale());
                v.ascent - v.descent + v.line_gap
            }
            None => 0.0,
        }
    }

    fn ascent(&self) -> f32 {
        match self.face.read().as_ref() {
            Some(FontFace::Synthetic) => SYNTHETIC_ASCENT * self.font_size(),
            Some(FontFace::Outline { font, .. }) => font.v_metrics(self.scale()).ascent,
            None => 0.0,
        }
    }

    fn advance(&self, codepoint: char) -> f32 {
        match self.face.read().as_ref() {
            Some(FontFace::Synthetic) => SYNTHETIC_ADVANCE * self.font_size(),
            Some(FontFace::Outline { font, .. }) => {
                font.glyph(codepoint).scaled(self.scale()).h_metrics().advance_width
            }
            None => 0.0,
        }
    }

    fn kerning(&self, previous: char, codepoint: char) -> f32 {
        match self.face.read().as_ref() {
            Some(FontFace::Outline {
                font,
                has_kerning: true,
            }) => font.pair_kerning(self.scale(), previous, codepoint),
            _ => 0.0,
        }
    }
}

impl Object for Font {
    fn object_type(&self) -> ObjectType {
        ObjectType::Font
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn synthetic_metrics_scale_with_size() {
        let font = Font::synthetic("builtin");

        assert!(font.use_font_size(20.0));
        assert_eq!(font.advance('a'), 10.0);
        assert_eq!(font.ascent(), 16.0);
        assert_eq!(font.line_height(), 24.0);
        assert!(!font.has_kerning());
        assert!(font.glyph_surface(' ').is_none());

        let glyph = font.glyph_surface('x').unwrap();
        assert_eq!((glyph.width, glyph.height), (8, 16));
        assert_eq!(glyph.coverage.len(), 128);
    }

    #[test]
    fn state_moves_forward_and_done_flushes_observers() {
        let font = Font::new(FontInfo {
            family: "Serif".into(),
            style: FontStyle::Italic,
            weight: FontWeight::Bold,
            uri: "missing.ttf".into(),
            index: 0,
        });
        let events = Arc::new(AtomicUsize::new(0));
        let e = events.clone();
        font.add_observer(1, Arc::new(move |_| {
            e.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }));

        font.set_loading();
        font.finish_load(Err(ResourceError::FileNotFound("missing.ttf".into())));
        font.finish_load(Ok(FontFace::Synthetic));
        assert_eq!(font.state(), ResourceState::Error);
        assert!(!font.use_font_size(12.0));

        font.destroy();
        assert_eq!(font.state(), ResourceState::Done);
        assert_eq!(events.load(std::sync::atomic::Ordering::SeqCst), 2);
        assert_eq!(font.observer_count(), 0);
        assert!(font.key_equals("serif", FontStyle::Italic, FontWeight::Bold));
    }
}
