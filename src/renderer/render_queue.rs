use std::sync::Arc;

use crate::core::color::Color;
use crate::core::geometry::{BorderRadius, BorderRect, Rect, RectF};
use crate::core::text::TextStyle;
use crate::resource::image::Image;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RenderCommandKind {
    RoundedRect = 1,
    FillRect = 2,
    DrawImage = 3,
    StrokeRect = 4,
    DrawText = 5,
}

/// One draw call recorded during paint. Rects are in the node's local
/// coordinates; commands live until the next paint of the same node.
#[derive(Debug, Clone)]
pub enum RenderCommand {
    RoundedRect {
        rect: RectF,
        radius: BorderRadius,
        fill: Color,
        stroke_width: f32,
        stroke_color: Color,
    },
    FillRect {
        rect: RectF,
        color: Color,
    },
    DrawImage {
        rect: RectF,
        image: Arc<Image>,
        src_rect: Rect,
    },
    StrokeRect {
        rect: RectF,
        edges: BorderRect,
        color: Color,
    },
    DrawText {
        rect: RectF,
        text_style: TextStyle,
        text: Arc<[char]>,
    },
}

impl RenderCommand {
    pub fn kind(&self) -> RenderCommandKind {
        match self {
            RenderCommand::RoundedRect { .. } => RenderCommandKind::RoundedRect,
            RenderCommand::FillRect { .. } => RenderCommandKind::FillRect,
            RenderCommand::DrawImage { .. } => RenderCommandKind::DrawImage,
            RenderCommand::StrokeRect { .. } => RenderCommandKind::StrokeRect,
            RenderCommand::DrawText { .. } => RenderCommandKind::DrawText,
        }
    }

    pub fn rect(&self) -> RectF {
        match self {
            RenderCommand::RoundedRect { rect, .. }
            | RenderCommand::FillRect { rect, .. }
            | RenderCommand::DrawImage { rect, .. }
            | RenderCommand::StrokeRect { rect, .. }
            | RenderCommand::DrawText { rect, .. } => *rect,
        }
    }
}

#[derive(Debug, Default)]
pub struct RenderQueue {
    commands: Vec<RenderCommand>,
}

impl RenderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn push(&mut self, command: RenderCommand) {
        self.commands.push(command);
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&RenderCommand> {
        self.commands.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RenderCommand> {
        self.commands.iter()
    }

    /// The only command, when there is exactly one.
    pub fn single(&self) -> Option<&RenderCommand> {
        match self.commands.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    pub fn to_vec(&self) -> Vec<RenderCommand> {
        self.commands.clone()
    }
}

impl<'a> IntoIterator for &'a RenderQueue {
    type Item = &'a RenderCommand;
    type IntoIter = std::slice::Iter<'a, RenderCommand>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
