pub mod mock;
pub mod render_queue;
pub mod software;

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::config::{WindowFlags, WindowSettings};
use crate::core::color::Color;
use crate::core::geometry::{BorderRadius, BorderRect, Rect, RectF};
use crate::core::matrix::Matrix;
use crate::core::text::TextStyle;
use crate::object::Object;
use crate::resource::image::Image;
use crate::Status;

pub use mock::{MockCall, MockGraphics, MockGraphicsContainer, MockRecorder};
pub use render_queue::{RenderCommand, RenderCommandKind, RenderQueue};
pub use software::{SoftwareGraphics, SoftwareGraphicsContainer};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphicsError {
    #[error("Graphics backend has been destroyed")]
    EndOfLife,
    #[error("Graphics backend is already configured")]
    AlreadyConfigured,
    #[error("Failed to create renderer: {0}")]
    CreateRenderer(String),
    #[error("Failed to create window: {0}")]
    CreateWindow(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("Unsupported by this backend: {0}")]
    Unsupported(&'static str),
}

impl GraphicsError {
    pub fn status(&self) -> Status {
        match self {
            GraphicsError::EndOfLife => Status::Eol,
            GraphicsError::AlreadyConfigured => Status::AlreadyConfigured,
            GraphicsError::CreateRenderer(_) => Status::GfxCreateRenderer,
            GraphicsError::CreateWindow(_) => Status::GfxCreateWindow,
            GraphicsError::Io(_) => Status::FileRead,
            GraphicsError::Unsupported(_) => Status::IllegalArgument,
        }
    }
}

/// Backend-owned cached drawable. Nodes hold it between paints and hand it
/// back through [`Graphics::destroy_render_object`] or `end_queue`.
#[derive(Debug, PartialEq, Eq)]
pub struct RenderObject {
    id: u64,
    width: u32,
    height: u32,
}

impl RenderObject {
    pub(crate) fn new(id: u64, width: u32, height: u32) -> Self {
        Self { id, width, height }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Transform, opacity and clip in effect for the next draw. The clip is in
/// device space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawState {
    pub matrix: Matrix,
    pub opacity: f32,
    pub clip: Option<RectF>,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            matrix: Matrix::identity(),
            opacity: 1.0,
            clip: None,
        }
    }
}

/// State stack and render queue shared by every backend.
#[derive(Debug)]
pub struct GraphicsState {
    stack: Vec<DrawState>,
    queue: RenderQueue,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            stack: vec![DrawState::default()],
            queue: RenderQueue::new(),
        }
    }
}

impl GraphicsState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &DrawState {
        // The stack always holds the base state.
        &self.stack[self.stack.len() - 1]
    }

    fn current_mut(&mut self) -> &mut DrawState {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn push(&mut self) {
        let top = *self.current();
        self.stack.push(top);
    }

    pub fn pop(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    pub fn reset(&mut self) {
        self.stack.clear();
        self.stack.push(DrawState::default());
    }

    pub fn set_matrix(&mut self, matrix: &Matrix) {
        let top = self.current_mut();
        top.matrix = top.matrix * *matrix;
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.current_mut().opacity *= opacity.clamp(0.0, 1.0);
    }

    /// Intersects the clip with `rect`, given in current local coordinates.
    pub fn set_clip_rect(&mut self, rect: &RectF) {
        let device = device_bounds(&self.current().matrix, rect);
        let top = self.current_mut();

        top.clip = Some(match top.clip {
            Some(clip) => clip.intersect(&device),
            None => device,
        });
    }

    pub fn queue(&self) -> &RenderQueue {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut RenderQueue {
        &mut self.queue
    }
}

/// Axis-aligned device-space bounds of a local rect.
pub fn device_bounds(matrix: &Matrix, rect: &RectF) -> RectF {
    let corners = [
        matrix.map_point(rect.x, rect.y),
        matrix.map_point(rect.x + rect.width, rect.y),
        matrix.map_point(rect.x, rect.y + rect.height),
        matrix.map_point(rect.x + rect.width, rect.y + rect.height),
    ];
    let (mut x1, mut y1) = corners[0];
    let (mut x2, mut y2) = corners[0];

    for &(x, y) in &corners[1..] {
        x1 = x1.min(x);
        y1 = y1.min(y);
        x2 = x2.max(x);
        y2 = y2.max(y);
    }

    RectF::new(x1, y1, x2 - x1, y2 - y1)
}

/// A 2D drawing backend bound to one output surface.
pub trait Graphics: Object {
    fn graphics_state(&self) -> &GraphicsState;

    fn graphics_state_mut(&mut self) -> &mut GraphicsState;

    fn configure(&mut self, width: u32, height: u32) -> Result<(), GraphicsError>;

    fn destroy(&mut self);

    fn is_destroyed(&self) -> bool;

    fn begin(&mut self);

    fn end(&mut self);

    fn clear(&mut self, color: Color);

    fn draw_render_object(&mut self, object: &RenderObject, tint: Color);

    fn destroy_render_object(&mut self, object: RenderObject);

    /// Consumes the current render queue into a drawable of `width` x
    /// `height`, reusing `previous` where possible. An empty queue yields
    /// nothing and releases `previous`.
    fn end_queue(&mut self, width: u32, height: u32, previous: Option<RenderObject>) -> Option<RenderObject>;

    /// Drops any texture cached for the image.
    fn remove_image(&mut self, image_id: u64);

    fn push_state(&mut self) {
        self.graphics_state_mut().push();
    }

    fn pop_state(&mut self) {
        self.graphics_state_mut().pop();
    }

    fn reset_state(&mut self) {
        self.graphics_state_mut().reset();
    }

    fn state(&self) -> DrawState {
        *self.graphics_state().current()
    }

    fn matrix(&self) -> Matrix {
        self.graphics_state().current().matrix
    }

    fn set_matrix(&mut self, matrix: &Matrix) {
        self.graphics_state_mut().set_matrix(matrix);
    }

    fn set_opacity(&mut self, opacity: f32) {
        self.graphics_state_mut().set_opacity(opacity);
    }

    fn set_clip_rect(&mut self, rect: &RectF) {
        self.graphics_state_mut().set_clip_rect(rect);
    }

    fn begin_queue(&mut self) {
        self.graphics_state_mut().queue_mut().clear();
    }

    fn queue_fill_rect(&mut self, rect: RectF, color: Color) {
        self.graphics_state_mut().queue_mut().push(RenderCommand::FillRect { rect, color });
    }

    fn queue_stroke_rect(&mut self, rect: RectF, edges: BorderRect, color: Color) {
        self.graphics_state_mut()
            .queue_mut()
            .push(RenderCommand::StrokeRect { rect, edges, color });
    }

    fn queue_rounded_rect(&mut self, rect: RectF, radius: BorderRadius, fill: Color, stroke_width: f32, stroke_color: Color) {
        self.graphics_state_mut().queue_mut().push(RenderCommand::RoundedRect {
            rect,
            radius,
            fill,
            stroke_width,
            stroke_color,
        });
    }

    fn queue_draw_image(&mut self, rect: RectF, image: Arc<Image>, src_rect: Rect) {
        self.graphics_state_mut()
            .queue_mut()
            .push(RenderCommand::DrawImage { rect, image, src_rect });
    }

    fn queue_draw_text(&mut self, rect: RectF, text_style: TextStyle, text: Arc<[char]>) {
        self.graphics_state_mut()
            .queue_mut()
            .push(RenderCommand::DrawText { rect, text_style, text });
    }

    fn render_queue(&self) -> &RenderQueue {
        self.graphics_state().queue()
    }
}

/// Owns a window-sized output and the [`Graphics`] that draws into it.
pub trait GraphicsContainer: Object {
    fn configure(&mut self, settings: &WindowSettings) -> Result<(), GraphicsError>;

    fn destroy(&mut self);

    fn is_destroyed(&self) -> bool;

    fn set_title(&mut self, title: &str);

    fn title(&self) -> &str;

    fn begin_frame(&mut self) -> &mut dyn Graphics;

    fn end_frame(&mut self);

    /// The graphics outside of a frame, for releasing render objects.
    fn graphics(&mut self) -> &mut dyn Graphics;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn refresh_rate(&self) -> u32;

    fn flags(&self) -> WindowFlags;

    /// Last finished frame as straight RGBA8, when the backend keeps one.
    fn frame(&self) -> Option<&[u8]> {
        None
    }

    fn save_png(&self, _path: &Path) -> Result<(), GraphicsError> {
        Err(GraphicsError::Unsupported("save_png"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_stack_composes_and_never_empties() {
        let mut state = GraphicsState::new();

        state.push();
        state.set_matrix(&Matrix::translate(10.0, 5.0));
        state.set_opacity(0.5);
        state.set_clip_rect(&RectF::new(0.0, 0.0, 20.0, 20.0));

        state.push();
        state.set_opacity(2.0);
        state.set_clip_rect(&RectF::new(10.0, 10.0, 20.0, 20.0));

        let top = *state.current();
        assert_eq!(top.opacity, 0.5);
        assert_eq!(top.clip, Some(RectF::new(20.0, 15.0, 10.0, 10.0)));

        state.pop();
        state.pop();
        state.pop();
        assert_eq!(state.depth(), 1);
        assert_eq!(*state.current(), DrawState::default());
    }

    #[test]
    fn errors_map_to_statuses() {
        assert_eq!(GraphicsError::CreateRenderer("x".into()).status(), Status::GfxCreateRenderer);
        assert_eq!(GraphicsError::AlreadyConfigured.status().code(), 6);
    }
}
