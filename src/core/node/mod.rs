//! Scene graph nodes.
//!
//! Nodes live in a per-window arena ([`SceneGraph`]) and are addressed by
//! [`NodeId`]. Ids are unique across the process, so an id from another
//! window is recognisable as foreign rather than silently aliasing.

mod box_node;
mod flags;
mod image_node;
mod pipeline;
mod scene;
mod text_node;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

use crate::core::geometry::{BorderRect, RectF};
use crate::core::layout::LayoutHandle;
use crate::core::style::Style;
use crate::object::{Object, ObjectType};
use crate::renderer::RenderObject;
use crate::resource::font::Font;
use crate::resource::image::Image;
use crate::Status;

pub use flags::NodeFlags;
pub use scene::{Resources, SceneGraph};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    pub(crate) fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Root,
    Box,
    Image,
    Text,
}

impl NodeKind {
    /// Kind for a host-facing tag name. The root is never created by tag.
    pub fn from_tag(tag: &str) -> Option<NodeKind> {
        if tag.eq_ignore_ascii_case("box") {
            Some(NodeKind::Box)
        } else if tag == "img" {
            Some(NodeKind::Image)
        } else if tag == "text" {
            Some(NodeKind::Text)
        } else {
            None
        }
    }

    pub fn is_leaf(self) -> bool {
        matches!(self, NodeKind::Image | NodeKind::Text)
    }

    pub fn object_type(self) -> ObjectType {
        match self {
            NodeKind::Root => ObjectType::RootNode,
            NodeKind::Box => ObjectType::BoxNode,
            NodeKind::Image => ObjectType::ImageNode,
            NodeKind::Text => ObjectType::TextNode,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeOp {
    Append,
    Insert,
    Remove,
    Query,
}

impl NodeOp {
    pub fn status(self) -> Status {
        match self {
            NodeOp::Append => Status::NodeAppendChild,
            NodeOp::Insert => Status::NodeInsertChild,
            NodeOp::Remove => Status::NodeRemoveChild,
            NodeOp::Query => Status::IllegalArgument,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("{0:?}: {1} has been destroyed")]
    Destroyed(NodeOp, NodeId),
    #[error("{0:?}: {1} belongs to another window")]
    WrongWindow(NodeOp, NodeId),
    #[error("{0:?}: {1} cannot have children")]
    LeafParent(NodeOp, NodeId),
    #[error("{0:?}: {1} already has a parent")]
    AlreadyParented(NodeOp, NodeId),
    #[error("{op:?}: {child} is not a child of {parent}")]
    NotAChild { op: NodeOp, child: NodeId, parent: NodeId },
    #[error("{0:?}: {1} cannot be placed under itself")]
    WouldCycle(NodeOp, NodeId),
    #[error("{0} does not support this operation")]
    WrongKind(NodeId),
    #[error("Layout engine: {0}")]
    Layout(String),
}

impl NodeError {
    pub fn status(&self) -> Status {
        match self {
            NodeError::Destroyed(op, _)
            | NodeError::WrongWindow(op, _)
            | NodeError::LeafParent(op, _)
            | NodeError::AlreadyParented(op, _)
            | NodeError::WouldCycle(op, _)
            | NodeError::NotAChild { op, .. } => op.status(),
            NodeError::WrongKind(_) => Status::IllegalArgument,
            NodeError::Layout(_) => Status::Generic,
        }
    }
}

impl From<crate::core::layout::LayoutError> for NodeError {
    fn from(e: crate::core::layout::LayoutError) -> Self {
        NodeError::Layout(e.to_string())
    }
}

/// Variant data. Resource references are strong; the stores keep the
/// canonical instance and count usages separately.
#[derive(Debug)]
pub(crate) enum Payload {
    Root,
    Box {
        background: Option<Arc<Image>>,
    },
    Image {
        src: Option<String>,
        image: Option<Arc<Image>>,
    },
    Text {
        text: String,
        chars: Arc<[char]>,
        font: Option<Arc<Font>>,
    },
}

impl Payload {
    fn for_kind(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Root => Payload::Root,
            NodeKind::Box => Payload::Box { background: None },
            NodeKind::Image => Payload::Image { src: None, image: None },
            NodeKind::Text => Payload::Text {
                text: String::new(),
                chars: Arc::from(Vec::new()),
                font: None,
            },
        }
    }
}

#[derive(Debug)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) kind: NodeKind,
    pub(crate) flags: NodeFlags,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: SmallVec<[NodeId; 4]>,
    pub(crate) layout: LayoutHandle,
    pub(crate) style: Style,
    pub(crate) bounds: RectF,
    pub(crate) border: BorderRect,
    pub(crate) padding: BorderRect,
    pub(crate) surface: Option<RenderObject>,
    pub(crate) payload: Payload,
}

impl Node {
    pub(crate) fn new(kind: NodeKind, layout: LayoutHandle) -> Self {
        let id = NodeId::next();
        let mut style = Style::new();
        style.bind(Some(id));

        let mut flags = NodeFlags::RESOLVE | NodeFlags::BOUNDS | NodeFlags::COLOR | NodeFlags::PAINT;

        if kind.is_leaf() {
            flags |= NodeFlags::LEAF;
        }

        if kind == NodeKind::Text {
            flags |= NodeFlags::FONT | NodeFlags::TEXT;
        }

        Self {
            id,
            kind,
            flags,
            parent: None,
            children: SmallVec::new(),
            layout,
            style,
            bounds: RectF::default(),
            border: BorderRect::default(),
            padding: BorderRect::default(),
            surface: None,
            payload: Payload::for_kind(kind),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    pub fn has_flag(&self, flag: NodeFlags) -> bool {
        self.flags.contains(flag)
    }

    pub fn is_leaf(&self) -> bool {
        self.flags.contains(NodeFlags::LEAF)
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn style(&self) -> &Style {
        &self.style
    }

    /// Border box relative to the parent's border box.
    pub fn bounds(&self) -> RectF {
        self.bounds
    }

    pub fn border(&self) -> BorderRect {
        self.border
    }

    pub fn padding(&self) -> BorderRect {
        self.padding
    }

    pub fn has_surface(&self) -> bool {
        self.surface.is_some()
    }

    /// Content box in the node's own coordinates.
    pub fn content_rect(&self) -> RectF {
        let left = self.border.left + self.padding.left;
        let top = self.border.top + self.padding.top;

        RectF::new(
            left,
            top,
            (self.bounds.width - left - self.border.right - self.padding.right).max(0.0),
            (self.bounds.height - top - self.border.bottom - self.padding.bottom).max(0.0),
        )
    }

    /// Whole border box in the node's own coordinates.
    pub fn local_rect(&self) -> RectF {
        RectF::new(0.0, 0.0, self.bounds.width, self.bounds.height)
    }

    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn src(&self) -> Option<&str> {
        match &self.payload {
            Payload::Image { src, .. } => src.as_deref(),
            _ => None,
        }
    }

    pub fn image(&self) -> Option<&Arc<Image>> {
        match &self.payload {
            Payload::Image { image, .. } => image.as_ref(),
            Payload::Box { background } => background.as_ref(),
            _ => None,
        }
    }

    pub fn font(&self) -> Option<&Arc<Font>> {
        match &self.payload {
            Payload::Text { font, .. } => font.as_ref(),
            _ => None,
        }
    }
}

impl Object for Node {
    fn object_type(&self) -> ObjectType {
        self.kind.object_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_map_to_kinds() {
        assert_eq!(NodeKind::from_tag("BOX"), Some(NodeKind::Box));
        assert_eq!(NodeKind::from_tag("img"), Some(NodeKind::Image));
        assert_eq!(NodeKind::from_tag("text"), Some(NodeKind::Text));
        assert_eq!(NodeKind::from_tag("root"), None);
        assert_eq!(NodeKind::from_tag("div"), None);
    }

    #[test]
    fn errors_carry_the_operation_status() {
        let a = NodeId(1);
        let b = NodeId(2);

        assert_eq!(NodeError::LeafParent(NodeOp::Append, a).status(), Status::NodeAppendChild);
        assert_eq!(NodeError::WrongWindow(NodeOp::Insert, a).status(), Status::NodeInsertChild);
        assert_eq!(
            NodeError::NotAChild {
                op: NodeOp::Remove,
                child: a,
                parent: b
            }
            .status(),
            Status::NodeRemoveChild
        );
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(NodeId::next(), NodeId::next());
    }
}
