//! tiny-skia rasterizer.
//!
//! Render objects are CPU surfaces composited onto a frame pixmap. Image
//! textures are shared per image id; the decoded source pixels are released
//! once a texture exists.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tiny_skia::{
    ColorU8, FillRule, IntRect, Mask, Paint, PathBuilder, Pixmap, PixmapPaint, PremultipliedColorU8, Stroke, Transform,
};
use tracing::{debug, warn};

use crate::config::{WindowFlags, WindowSettings};
use crate::core::color::Color;
use crate::core::geometry::{BorderRadius, BorderRect, Rect, RectF};
use crate::core::matrix::Matrix;
use crate::core::style::TextAlign;
use crate::core::text::{self, GlyphMetrics, TextStyle};
use crate::object::{Object, ObjectType};
use crate::resource::image::Image;

use super::{Graphics, GraphicsContainer, GraphicsError, GraphicsState, RenderCommand, RenderObject};

// Control point distance for a quarter circle drawn as one cubic.
const KAPPA: f32 = 0.552_284_8;

enum Surface {
    /// A single filled rect, drawn directly into the frame.
    Solid { rect: RectF, color: Color },
    /// A texture region scaled into `rect`.
    Image { image_id: u64, rect: RectF, src: Rect },
    /// Offscreen raster. Tintable surfaces are white coverage masks that
    /// take their color from the tint.
    Raster { pixmap: Pixmap, tintable: bool },
}

pub struct SoftwareGraphics {
    state: GraphicsState,
    frame: Option<Pixmap>,
    surfaces: HashMap<u64, Surface>,
    textures: HashMap<u64, Pixmap>,
    next_object: u64,
    destroyed: bool,
}

impl SoftwareGraphics {
    pub fn new() -> Self {
        Self {
            state: GraphicsState::new(),
            frame: None,
            surfaces: HashMap::new(),
            textures: HashMap::new(),
            next_object: 1,
            destroyed: false,
        }
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    /// Current frame as straight-alpha RGBA8.
    pub fn snapshot(&self) -> Option<Vec<u8>> {
        self.frame.as_ref().map(|frame| demultiply(frame))
    }

    pub fn frame_size(&self) -> (u32, u32) {
        self.frame.as_ref().map_or((0, 0), |f| (f.width(), f.height()))
    }

    fn upload_texture(&mut self, image: &Arc<Image>) -> bool {
        if self.textures.contains_key(&image.id()) {
            return true;
        }

        let Some(pixels) = image.pixels() else {
            return false;
        };
        let Some(mut texture) = Pixmap::new(image.width(), image.height()) else {
            return false;
        };

        for (dst, src) in texture.pixels_mut().iter_mut().zip(pixels.chunks_exact(4)) {
            *dst = ColorU8::from_rgba(src[0], src[1], src[2], src[3]).premultiply();
        }

        self.textures.insert(image.id(), texture);
        image.release_pixels();
        image.attach();

        debug!("uploaded texture for image {} ({}x{})", image.id(), image.width(), image.height());
        true
    }

    fn build_surface(&mut self, width: u32, height: u32) -> Option<Surface> {
        match self.state.queue().single().cloned() {
            Some(RenderCommand::FillRect { rect, color }) => return Some(Surface::Solid { rect, color }),
            Some(RenderCommand::DrawImage { rect, image, src_rect }) if self.upload_texture(&image) => {
                return Some(Surface::Image {
                    image_id: image.id(),
                    rect,
                    src: src_rect,
                });
            }
            Some(RenderCommand::DrawText { rect, text_style, text }) => {
                let mut pixmap = Pixmap::new(width, height)?;
                draw_text(&mut pixmap, &rect, &text_style, &text);

                return Some(Surface::Raster { pixmap, tintable: true });
            }
            _ => {}
        }

        let commands = self.state.queue().to_vec();
        let mut pixmap = Pixmap::new(width, height)?;

        for command in &commands {
            match command {
                RenderCommand::FillRect { rect, color } => fill_rect(&mut pixmap, rect, *color),
                RenderCommand::StrokeRect { rect, edges, color } => stroke_edges(&mut pixmap, rect, edges, *color),
                RenderCommand::RoundedRect {
                    rect,
                    radius,
                    fill,
                    stroke_width,
                    stroke_color,
                } => rounded_rect(&mut pixmap, rect, radius, *fill, *stroke_width, *stroke_color),
                RenderCommand::DrawImage { rect, image, src_rect } => {
                    if self.upload_texture(image) {
                        if let Some(texture) = self.textures.get(&image.id()) {
                            draw_texture(&mut pixmap, texture, rect, src_rect, Color::WHITE, 1.0, Transform::identity(), None);
                        }
                    }
                }
                RenderCommand::DrawText { rect, text_style, text } => draw_text(&mut pixmap, rect, text_style, text),
            }
        }

        Some(Surface::Raster { pixmap, tintable: false })
    }

    fn clip_mask(&self) -> Option<Mask> {
        let clip = self.state.current().clip?;
        let (width, height) = self.frame_size();
        let mut mask = Mask::new(width, height)?;

        if let Some(rect) = to_skia_rect(&clip) {
            mask.fill_path(&PathBuilder::from_rect(rect), FillRule::Winding, false, Transform::identity());
        }

        Some(mask)
    }
}

impl Default for SoftwareGraphics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SoftwareGraphics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftwareGraphics")
            .field("frame", &self.frame_size())
            .field("surfaces", &self.surfaces.len())
            .field("textures", &self.textures.len())
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

impl Object for SoftwareGraphics {
    fn object_type(&self) -> ObjectType {
        ObjectType::SoftwareGraphics
    }
}

impl Graphics for SoftwareGraphics {
    fn graphics_state(&self) -> &GraphicsState {
        &self.state
    }

    fn graphics_state_mut(&mut self) -> &mut GraphicsState {
        &mut self.state
    }

    fn configure(&mut self, width: u32, height: u32) -> Result<(), GraphicsError> {
        if self.destroyed {
            return Err(GraphicsError::EndOfLife);
        }

        let frame = Pixmap::new(width, height)
            .ok_or_else(|| GraphicsError::CreateRenderer(format!("cannot allocate {}x{} frame", width, height)))?;

        self.frame = Some(frame);
        Ok(())
    }

    fn destroy(&mut self) {
        self.destroyed = true;
        self.frame = None;
        self.surfaces.clear();
        self.textures.clear();
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn begin(&mut self) {
        self.state.reset();
    }

    fn end(&mut self) {}

    fn clear(&mut self, color: Color) {
        if let Some(frame) = self.frame.as_mut() {
            frame.fill(to_skia_color(color));
        }
    }

    fn draw_render_object(&mut self, object: &RenderObject, tint: Color) {
        let state = *self.state.current();
        let mask = self.clip_mask();
        let transform = to_transform(&state.matrix);

        let Some(surface) = self.surfaces.get(&object.id()) else {
            return;
        };
        let Some(frame) = self.frame.as_mut() else {
            return;
        };

        match surface {
            Surface::Solid { rect, color } => {
                if let Some(rect) = to_skia_rect(rect) {
                    let paint = solid_paint(*color, state.opacity);
                    frame.fill_rect(rect, &paint, transform, mask.as_ref());
                }
            }
            Surface::Image { image_id, rect, src } => {
                if let Some(texture) = self.textures.get(image_id) {
                    draw_texture(frame, texture, rect, src, tint, state.opacity, transform, mask.as_ref());
                }
            }
            Surface::Raster { pixmap, tintable } => {
                let paint = PixmapPaint {
                    opacity: state.opacity,
                    ..PixmapPaint::default()
                };

                if *tintable {
                    let tinted = tinted(pixmap, tint);
                    frame.draw_pixmap(0, 0, tinted.as_ref(), &paint, transform, mask.as_ref());
                } else {
                    frame.draw_pixmap(0, 0, pixmap.as_ref(), &paint, transform, mask.as_ref());
                }
            }
        }
    }

    fn destroy_render_object(&mut self, object: RenderObject) {
        self.surfaces.remove(&object.id());
    }

    fn end_queue(&mut self, width: u32, height: u32, previous: Option<RenderObject>) -> Option<RenderObject> {
        let id = match previous {
            Some(previous) => {
                self.surfaces.remove(&previous.id());
                previous.id()
            }
            None => {
                let id = self.next_object;
                self.next_object += 1;
                id
            }
        };

        if self.state.queue().is_empty() {
            return None;
        }

        let surface = self.build_surface(width, height)?;
        self.surfaces.insert(id, surface);

        Some(RenderObject::new(id, width, height))
    }

    fn remove_image(&mut self, image_id: u64) {
        if self.textures.remove(&image_id).is_some() {
            debug!("dropped texture for image {}", image_id);
        }
    }
}

#[derive(Debug)]
pub struct SoftwareGraphicsContainer {
    graphics: SoftwareGraphics,
    settings: Option<WindowSettings>,
    title: String,
    finished: Option<Vec<u8>>,
    destroyed: bool,
}

impl SoftwareGraphicsContainer {
    pub fn new() -> Self {
        Self {
            graphics: SoftwareGraphics::new(),
            settings: None,
            title: String::new(),
            finished: None,
            destroyed: false,
        }
    }

    pub fn software(&self) -> &SoftwareGraphics {
        &self.graphics
    }
}

impl Default for SoftwareGraphicsContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl Object for SoftwareGraphicsContainer {
    fn object_type(&self) -> ObjectType {
        ObjectType::SoftwareGraphicsContainer
    }
}

impl GraphicsContainer for SoftwareGraphicsContainer {
    fn configure(&mut self, settings: &WindowSettings) -> Result<(), GraphicsError> {
        if self.destroyed {
            return Err(GraphicsError::EndOfLife);
        }

        if self.settings.is_some() {
            return Err(GraphicsError::AlreadyConfigured);
        }

        if settings.width == 0 || settings.height == 0 {
            return Err(GraphicsError::CreateWindow(format!(
                "invalid size {}x{}",
                settings.width, settings.height
            )));
        }

        self.graphics.configure(settings.width, settings.height)?;
        self.title = settings.title.clone();
        self.settings = Some(settings.clone());

        debug!("software container configured {}x{}", settings.width, settings.height);
        Ok(())
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }

        self.destroyed = true;
        self.finished = None;
        self.graphics.destroy();
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn begin_frame(&mut self) -> &mut dyn Graphics {
        self.graphics.begin();
        &mut self.graphics
    }

    fn end_frame(&mut self) {
        self.graphics.end();
        self.finished = self.graphics.snapshot();
    }

    fn graphics(&mut self) -> &mut dyn Graphics {
        &mut self.graphics
    }

    fn width(&self) -> u32 {
        self.settings.as_ref().map_or(0, |s| s.width)
    }

    fn height(&self) -> u32 {
        self.settings.as_ref().map_or(0, |s| s.height)
    }

    fn refresh_rate(&self) -> u32 {
        self.settings.as_ref().map_or(0, |s| s.refresh_rate)
    }

    fn flags(&self) -> WindowFlags {
        self.settings.as_ref().map_or(WindowFlags::empty(), WindowSettings::flags)
    }

    fn frame(&self) -> Option<&[u8]> {
        self.finished.as_deref()
    }

    fn save_png(&self, path: &Path) -> Result<(), GraphicsError> {
        let pixels = self.finished.as_deref().ok_or(GraphicsError::Unsupported("no finished frame"))?;

        image::save_buffer(path, pixels, self.width(), self.height(), image::ColorType::Rgba8)
            .map_err(|e| GraphicsError::Io(format!("{}: {}", path.display(), e)))
    }
}

fn to_skia_color(color: Color) -> tiny_skia::Color {
    tiny_skia::Color::from_rgba8(color.r(), color.g(), color.b(), color.a())
}

fn to_skia_rect(rect: &RectF) -> Option<tiny_skia::Rect> {
    tiny_skia::Rect::from_xywh(rect.x, rect.y, rect.width, rect.height)
}

fn to_transform(m: &Matrix) -> Transform {
    Transform::from_row(m.a, m.c, m.b, m.d, m.x, m.y)
}

fn solid_paint(color: Color, opacity: f32) -> Paint<'static> {
    let mut paint = Paint::default();
    let alpha = (color.a() as f32 * opacity.clamp(0.0, 1.0)).round() as u8;

    paint.set_color_rgba8(color.r(), color.g(), color.b(), alpha);
    paint.anti_alias = true;
    paint
}

fn fill_rect(pixmap: &mut Pixmap, rect: &RectF, color: Color) {
    if let Some(rect) = to_skia_rect(rect) {
        pixmap.fill_rect(rect, &solid_paint(color, 1.0), Transform::identity(), None);
    }
}

/// Border drawn as four edge bands inside `rect`.
fn stroke_edges(pixmap: &mut Pixmap, rect: &RectF, edges: &BorderRect, color: Color) {
    let bands = [
        RectF::new(rect.x, rect.y, rect.width, edges.top),
        RectF::new(rect.x, rect.y + rect.height - edges.bottom, rect.width, edges.bottom),
        RectF::new(rect.x, rect.y + edges.top, edges.left, rect.height - edges.top - edges.bottom),
        RectF::new(
            rect.x + rect.width - edges.right,
            rect.y + edges.top,
            edges.right,
            rect.height - edges.top - edges.bottom,
        ),
    ];

    for band in bands.iter().filter(|b| !b.is_empty()) {
        fill_rect(pixmap, band, color);
    }
}

fn rounded_rect(
    pixmap: &mut Pixmap,
    rect: &RectF,
    radius: &BorderRadius,
    fill: Color,
    stroke_width: f32,
    stroke_color: Color,
) {
    if fill.a() > 0 {
        if let Some(path) = rounded_rect_path(rect, radius) {
            pixmap.fill_path(&path, &solid_paint(fill, 1.0), FillRule::Winding, Transform::identity(), None);
        }
    }

    if stroke_width > 0.0 && stroke_color.a() > 0 {
        let half = stroke_width / 2.0;
        let inset = RectF::new(rect.x + half, rect.y + half, rect.width - stroke_width, rect.height - stroke_width);
        let shrink = |r: f32| (r - half).max(0.0);
        let inner = BorderRadius {
            top_left: shrink(radius.top_left),
            top_right: shrink(radius.top_right),
            bottom_left: shrink(radius.bottom_left),
            bottom_right: shrink(radius.bottom_right),
        };

        if let Some(path) = rounded_rect_path(&inset, &inner) {
            let stroke = Stroke {
                width: stroke_width,
                ..Stroke::default()
            };
            pixmap.stroke_path(&path, &solid_paint(stroke_color, 1.0), &stroke, Transform::identity(), None);
        }
    }
}

fn rounded_rect_path(rect: &RectF, radius: &BorderRadius) -> Option<tiny_skia::Path> {
    if rect.is_empty() {
        return None;
    }

    let limit = rect.width.min(rect.height) / 2.0;
    let clamp = |r: f32| r.clamp(0.0, limit);
    let (tl, tr, br, bl) = (
        clamp(radius.top_left),
        clamp(radius.top_right),
        clamp(radius.bottom_right),
        clamp(radius.bottom_left),
    );
    let (x1, y1) = (rect.x, rect.y);
    let (x2, y2) = (rect.x + rect.width, rect.y + rect.height);
    let mut pb = PathBuilder::new();

    pb.move_to(x1 + tl, y1);
    pb.line_to(x2 - tr, y1);
    pb.cubic_to(x2 - tr + tr * KAPPA, y1, x2, y1 + tr - tr * KAPPA, x2, y1 + tr);
    pb.line_to(x2, y2 - br);
    pb.cubic_to(x2, y2 - br + br * KAPPA, x2 - br + br * KAPPA, y2, x2 - br, y2);
    pb.line_to(x1 + bl, y2);
    pb.cubic_to(x1 + bl - bl * KAPPA, y2, x1, y2 - bl + bl * KAPPA, x1, y2 - bl);
    pb.line_to(x1, y1 + tl);
    pb.cubic_to(x1, y1 + tl - tl * KAPPA, x1 + tl - tl * KAPPA, y1, x1 + tl, y1);
    pb.close();

    pb.finish()
}

#[allow(clippy::too_many_arguments)]
fn draw_texture(
    target: &mut Pixmap,
    texture: &Pixmap,
    rect: &RectF,
    src: &Rect,
    tint: Color,
    opacity: f32,
    transform: Transform,
    mask: Option<&Mask>,
) {
    if src.is_empty() || rect.is_empty() {
        return;
    }

    let Some(region) = IntRect::from_xywh(src.x, src.y, src.width as u32, src.height as u32) else {
        return;
    };
    let Some(mut region) = texture.clone_rect(region) else {
        return;
    };

    if !tint.is_opaque_white() {
        region = tinted(&region, tint);
    }

    let placement = Transform::from_row(
        rect.width / src.width as f32,
        0.0,
        0.0,
        rect.height / src.height as f32,
        rect.x,
        rect.y,
    );
    let paint = PixmapPaint {
        opacity,
        quality: tiny_skia::FilterQuality::Bilinear,
        ..PixmapPaint::default()
    };

    target.draw_pixmap(0, 0, region.as_ref(), &paint, transform.pre_concat(placement), mask);
}

/// Lays the text out inside `rect` and writes white glyph coverage.
fn draw_text(pixmap: &mut Pixmap, rect: &RectF, style: &TextStyle, chars: &[char]) {
    let Some(font) = style.font.as_ref() else {
        return;
    };

    if !font.use_font_size(style.font_size_px) {
        warn!("text skipped: font '{}' has no face", font.info().family);
        return;
    }

    let metrics: &dyn GlyphMetrics = font.as_ref();
    let line_height = metrics.line_height();
    let ascent = metrics.ascent();
    let width = pixmap.width() as i32;
    let height = pixmap.height() as i32;

    for (row, line) in text::lines(chars, style, metrics).iter().enumerate() {
        let offset = match style.align {
            TextAlign::Left => 0.0,
            TextAlign::Center => (rect.width - line.width) / 2.0,
            TextAlign::Right => rect.width - line.width,
        };
        let baseline = rect.y + row as f32 * line_height + ascent;
        let mut pen = rect.x + offset;
        let mut previous = None;

        for c in text::line_glyphs(chars, line, style) {
            if style.kerning_enabled {
                pen += previous.map_or(0.0, |p| metrics.kerning(p, c));
                previous = Some(c);
            }

            if let Some(glyph) = font.glyph_surface(c) {
                let left = pen.round() as i32 + glyph.x_offset;
                let top = baseline.round() as i32 - glyph.y_offset;
                let pixels = pixmap.pixels_mut();

                for gy in 0..glyph.height as i32 {
                    let y = top + gy;

                    if y < 0 || y >= height {
                        continue;
                    }

                    for gx in 0..glyph.width as i32 {
                        let x = left + gx;

                        if x < 0 || x >= width {
                            continue;
                        }

                        let v = glyph.coverage[(gy as u32 * glyph.pitch + gx as u32) as usize];
                        let dst = &mut pixels[(y * width + x) as usize];

                        if v > dst.alpha() {
                            *dst = PremultipliedColorU8::from_rgba(v, v, v, v).unwrap_or(*dst);
                        }
                    }
                }
            }

            pen += metrics.advance(c);
        }
    }
}

/// Copy of `pixmap` with every channel modulated by `tint`.
fn tinted(pixmap: &Pixmap, tint: Color) -> Pixmap {
    let mut out = pixmap.clone();
    let ta = tint.a() as u32;
    let scale = |c: u8, t: u8| ((c as u32 * t as u32 / 255) * ta / 255) as u8;

    for px in out.pixels_mut() {
        let alpha = (px.alpha() as u32 * ta / 255) as u8;

        *px = PremultipliedColorU8::from_rgba(
            scale(px.red(), tint.r()).min(alpha),
            scale(px.green(), tint.g()).min(alpha),
            scale(px.blue(), tint.b()).min(alpha),
            alpha,
        )
        .unwrap_or(PremultipliedColorU8::TRANSPARENT);
    }

    out
}

fn demultiply(pixmap: &Pixmap) -> Vec<u8> {
    pixmap
        .pixels()
        .iter()
        .flat_map(|px| {
            let c = px.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(graphics: &SoftwareGraphics, x: u32, y: u32) -> [u8; 4] {
        let frame = graphics.snapshot().unwrap();
        let (width, _) = graphics.frame_size();
        let i = ((y * width + x) * 4) as usize;

        [frame[i], frame[i + 1], frame[i + 2], frame[i + 3]]
    }

    #[test]
    fn solid_surface_draws_under_matrix_and_clip() {
        let mut graphics = SoftwareGraphics::new();
        graphics.configure(8, 8).unwrap();
        graphics.clear(Color::BLACK);

        graphics.begin_queue();
        graphics.queue_fill_rect(RectF::new(0.0, 0.0, 4.0, 4.0), Color::rgba(255, 0, 0, 255));
        let object = graphics.end_queue(4, 4, None).unwrap();

        graphics.push_state();
        graphics.set_matrix(&Matrix::translate(2.0, 2.0));
        graphics.set_clip_rect(&RectF::new(0.0, 0.0, 2.0, 4.0));
        graphics.draw_render_object(&object, Color::WHITE);
        graphics.pop_state();

        assert_eq!(pixel(&graphics, 2, 2), [255, 0, 0, 255]);
        assert_eq!(pixel(&graphics, 4, 2), [0, 0, 0, 255]);
        assert_eq!(pixel(&graphics, 0, 0), [0, 0, 0, 255]);
    }

    #[test]
    fn rounded_rect_rasterizes_offscreen() {
        let mut graphics = SoftwareGraphics::new();
        graphics.configure(10, 10).unwrap();

        graphics.begin_queue();
        graphics.queue_rounded_rect(
            RectF::new(0.0, 0.0, 10.0, 10.0),
            BorderRadius {
                top_left: 5.0,
                top_right: 5.0,
                bottom_left: 5.0,
                bottom_right: 5.0,
            },
            Color::WHITE,
            0.0,
            Color::TRANSPARENT,
        );
        let object = graphics.end_queue(10, 10, None).unwrap();
        graphics.draw_render_object(&object, Color::WHITE);

        assert_eq!(pixel(&graphics, 5, 5), [255, 255, 255, 255]);
        assert_eq!(pixel(&graphics, 0, 0)[3], 0);
    }

    #[test]
    fn tint_modulates_channels() {
        let mut pixmap = Pixmap::new(1, 1).unwrap();
        pixmap.fill(tiny_skia::Color::WHITE);

        let out = tinted(&pixmap, Color::rgba(255, 0, 0, 255));
        let px = out.pixels()[0];

        assert_eq!((px.red(), px.green(), px.blue(), px.alpha()), (255, 0, 0, 255));
    }
}
