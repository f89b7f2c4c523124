use ahash::{AHashMap, AHashSet};
use tracing::{debug, trace, warn};

use crate::core::geometry::RectF;
use crate::core::layout::{self, LayoutTree};
use crate::core::style::compute::compute_font_size_from_root;
use crate::core::style::{Style, StyleContext, StyleProperty};
use crate::renderer::Graphics;
use crate::resource::{EventInbox, FontStore, ImageStore, ResourceEvent};

use super::{box_node, image_node, text_node, Node, NodeError, NodeFlags, NodeId, NodeKind, NodeOp, Payload};

/// Stores and inbox a scene needs while it mutates nodes.
#[derive(Clone, Copy)]
pub struct Resources<'a> {
    pub fonts: &'a FontStore,
    pub images: &'a ImageStore,
    pub inbox: &'a EventInbox,
}

/// The node arena of one window.
#[derive(Debug)]
pub struct SceneGraph {
    pub(super) nodes: AHashMap<NodeId, Node>,
    tombstones: AHashSet<NodeId>,
    pub(super) taffy: LayoutTree,
    pub(super) root: NodeId,
    pub(super) ctx: StyleContext,
    pub(super) settle_iterations: u32,
}

impl SceneGraph {
    pub fn new(root_font_size: f32, settle_iterations: u32) -> Result<Self, NodeError> {
        let mut taffy = layout::new_tree();
        let handle = taffy.new_leaf(layout::base_style())?;
        let root = Node::new(NodeKind::Root, handle);
        let root_id = root.id;

        let mut nodes = AHashMap::new();
        nodes.insert(root_id, root);

        let mut scene = Self {
            nodes,
            tombstones: AHashSet::new(),
            taffy,
            root: root_id,
            ctx: StyleContext::new(0.0, 0.0, root_font_size),
            settle_iterations: settle_iterations.max(1),
        };
        scene.sync_layout_style(root_id);

        Ok(scene)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn context(&self) -> &StyleContext {
        &self.ctx
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn create_node(&mut self, kind: NodeKind) -> Result<NodeId, NodeError> {
        let handle = self.taffy.new_leaf(layout::base_style())?;
        let node = Node::new(kind, handle);
        let id = node.id;

        if kind.is_leaf() {
            self.taffy.set_node_context(handle, Some(id))?;
        }

        self.nodes.insert(id, node);

        if let Some(root) = self.nodes.get_mut(&self.root) {
            root.flags |= NodeFlags::RESOLVE;
        }

        trace!("created {:?} {}", kind, id);
        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub(super) fn check(&self, op: NodeOp, id: NodeId) -> Result<&Node, NodeError> {
        match self.nodes.get(&id) {
            Some(node) => Ok(node),
            None if self.tombstones.contains(&id) => Err(NodeError::Destroyed(op, id)),
            None => Err(NodeError::WrongWindow(op, id)),
        }
    }

    fn check_parent_child(&self, op: NodeOp, parent: NodeId, child: NodeId) -> Result<(), NodeError> {
        let parent_node = self.check(op, parent)?;
        let child_node = self.check(op, child)?;

        if parent_node.is_leaf() {
            return Err(NodeError::LeafParent(op, parent));
        }

        if child == self.root || child == parent || self.is_ancestor(child, parent) {
            return Err(NodeError::WouldCycle(op, child));
        }

        if child_node.parent.is_some() {
            return Err(NodeError::AlreadyParented(op, child));
        }

        Ok(())
    }

    fn is_ancestor(&self, ancestor: NodeId, mut id: NodeId) -> bool {
        while let Some(parent) = self.nodes.get(&id).and_then(|n| n.parent) {
            if parent == ancestor {
                return true;
            }
            id = parent;
        }

        false
    }

    pub fn append(&mut self, parent: NodeId, child: NodeId, res: &Resources) -> Result<(), NodeError> {
        self.check_parent_child(NodeOp::Append, parent, child)?;

        let (parent_layout, child_layout) = (self.nodes[&parent].layout, self.nodes[&child].layout);
        self.taffy.add_child(parent_layout, child_layout)?;

        self.link(parent, child, None);
        self.on_structure_changed(child, res)
    }

    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, before: NodeId, res: &Resources) -> Result<(), NodeError> {
        self.check_parent_child(NodeOp::Insert, parent, child)?;
        self.check(NodeOp::Insert, before)?;

        let index = self.nodes[&parent]
            .children
            .iter()
            .position(|c| *c == before)
            .ok_or(NodeError::NotAChild {
                op: NodeOp::Insert,
                child: before,
                parent,
            })?;

        let (parent_layout, child_layout) = (self.nodes[&parent].layout, self.nodes[&child].layout);
        self.taffy.insert_child_at_index(parent_layout, index, child_layout)?;

        self.link(parent, child, Some(index));
        self.on_structure_changed(child, res)
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId, res: &Resources) -> Result<(), NodeError> {
        self.check(NodeOp::Remove, parent)?;

        if self.check(NodeOp::Remove, child)?.parent != Some(parent) {
            return Err(NodeError::NotAChild {
                op: NodeOp::Remove,
                child,
                parent,
            });
        }

        let (parent_layout, child_layout) = (self.nodes[&parent].layout, self.nodes[&child].layout);
        self.taffy.remove_child(parent_layout, child_layout)?;

        self.unlink(child);
        self.request_composite();
        self.settle(res)
    }

    fn link(&mut self, parent: NodeId, child: NodeId, index: Option<usize>) {
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            match index {
                Some(index) => parent_node.children.insert(index, child),
                None => parent_node.children.push(child),
            }
        }

        if let Some(child_node) = self.nodes.get_mut(&child) {
            child_node.parent = Some(parent);
        }
    }

    fn unlink(&mut self, child: NodeId) {
        let parent = self.nodes.get_mut(&child).and_then(|n| n.parent.take());

        if let Some(parent_node) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent_node.children.retain(|c| *c != child);
        }
    }

    fn on_structure_changed(&mut self, child: NodeId, res: &Resources) -> Result<(), NodeError> {
        if let Some(root) = self.nodes.get_mut(&self.root) {
            root.flags |= NodeFlags::RESOLVE | NodeFlags::PAINT | NodeFlags::COMPOSITE;
        }

        self.request_style_resolve(child, NodeFlags::BOUNDS);
        self.settle(res)
    }

    /// Destroys `id` and its subtree: children first, then detach, unbind
    /// the style, release resources, surface and layout handle.
    pub fn destroy(&mut self, id: NodeId, res: &Resources, graphics: Option<&mut dyn Graphics>) -> Result<(), NodeError> {
        let mut graphics = graphics;
        self.destroy_subtree(id, res, &mut graphics)
    }

    /// Destroys every node, root included.
    pub fn destroy_all(&mut self, res: &Resources, graphics: Option<&mut dyn Graphics>) {
        let mut graphics = graphics;
        let detached: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| n.parent.is_none() && n.id != self.root)
            .map(|n| n.id)
            .collect();

        for id in detached.into_iter().chain(std::iter::once(self.root)) {
            if let Err(e) = self.destroy_subtree(id, res, &mut graphics) {
                debug!("skipping {}: {}", id, e);
            }
        }
    }

    fn destroy_subtree(&mut self, id: NodeId, res: &Resources, graphics: &mut Option<&mut dyn Graphics>) -> Result<(), NodeError> {
        self.check(NodeOp::Remove, id)?;

        let mut order = Vec::new();
        self.post_order(id, &mut order);

        let was_attached = self.nodes[&id].parent.is_some();

        for node_id in order {
            self.unlink(node_id);

            let Some(mut node) = self.nodes.remove(&node_id) else {
                continue;
            };

            node.style.bind(None);
            release_payload(&mut node, res);

            if let Some(surface) = node.surface.take() {
                if let Some(graphics) = graphics.as_mut() {
                    graphics.destroy_render_object(surface);
                }
            }

            if let Err(e) = self.taffy.remove(node.layout) {
                warn!("layout handle of {} already gone: {}", node_id, e);
            }

            self.tombstones.insert(node_id);
            trace!("destroyed {}", node_id);
        }

        if was_attached {
            self.request_composite();
        }

        Ok(())
    }

    pub(super) fn post_order(&self, id: NodeId, out: &mut Vec<NodeId>) {
        if let Some(node) = self.nodes.get(&id) {
            for child in &node.children {
                self.post_order(*child, out);
            }
            out.push(id);
        }
    }

    pub(super) fn pre_order(&self, id: NodeId, out: &mut Vec<NodeId>) {
        if let Some(node) = self.nodes.get(&id) {
            out.push(id);
            for child in &node.children {
                self.pre_order(*child, out);
            }
        }
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>, NodeError> {
        Ok(self.check(NodeOp::Query, id)?.parent)
    }

    pub fn child_count(&self, id: NodeId) -> Result<usize, NodeError> {
        Ok(self.check(NodeOp::Query, id)?.children.len())
    }

    pub fn child_at(&self, id: NodeId, index: usize) -> Result<Option<NodeId>, NodeError> {
        Ok(self.check(NodeOp::Query, id)?.children.get(index).copied())
    }

    pub fn bounds(&self, id: NodeId) -> Result<RectF, NodeError> {
        Ok(self.check(NodeOp::Query, id)?.bounds)
    }

    pub fn x(&self, id: NodeId) -> Result<f32, NodeError> {
        self.bounds(id).map(|b| b.x)
    }

    pub fn y(&self, id: NodeId) -> Result<f32, NodeError> {
        self.bounds(id).map(|b| b.y)
    }

    pub fn width(&self, id: NodeId) -> Result<f32, NodeError> {
        self.bounds(id).map(|b| b.width)
    }

    pub fn height(&self, id: NodeId) -> Result<f32, NodeError> {
        self.bounds(id).map(|b| b.height)
    }

    pub fn is_destroyed(&self, id: NodeId) -> bool {
        self.tombstones.contains(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn is_leaf(&self, id: NodeId) -> Result<bool, NodeError> {
        Ok(self.check(NodeOp::Query, id)?.is_leaf())
    }

    pub fn has_flag(&self, id: NodeId, flag: NodeFlags) -> Result<bool, NodeError> {
        Ok(self.check(NodeOp::Query, id)?.has_flag(flag))
    }

    pub fn style(&self, id: NodeId) -> Result<&Style, NodeError> {
        Ok(&self.check(NodeOp::Query, id)?.style)
    }

    /// Mutable style access. Follow every change with [`SceneGraph::flush_style`].
    pub fn style_mut(&mut self, id: NodeId) -> Result<&mut Style, NodeError> {
        self.check(NodeOp::Query, id)?;

        self.nodes
            .get_mut(&id)
            .map(|n| &mut n.style)
            .ok_or(NodeError::WrongWindow(NodeOp::Query, id))
    }

    /// Routes every property queued on the node's style since the last flush.
    pub fn flush_style(&mut self, id: NodeId, res: &Resources) {
        let pending = match self.nodes.get_mut(&id) {
            Some(node) => node.style.take_pending(),
            None => return,
        };

        for property in pending {
            self.on_style_property_change(id, property, res);
        }
    }

    pub(crate) fn on_style_property_change(&mut self, id: NodeId, property: StyleProperty, res: &Resources) {
        let Some(kind) = self.nodes.get(&id).map(|n| n.kind) else {
            return;
        };

        let handled = match kind {
            NodeKind::Root => self.on_root_property(property, res),
            NodeKind::Box => box_node::on_property(self, id, property, res),
            NodeKind::Image => image_node::on_property(self, id, property),
            NodeKind::Text => text_node::on_property(self, id, property),
        };

        if !handled {
            self.on_base_property(id, property);
        }
    }

    fn on_root_property(&mut self, property: StyleProperty, res: &Resources) -> bool {
        match property {
            StyleProperty::BackgroundColor | StyleProperty::Opacity => {
                self.request_composite();
                true
            }
            StyleProperty::FontSize => {
                let size = compute_font_size_from_root(&self.nodes[&self.root].style, &self.ctx);
                self.set_root_font_size(size, res);
                true
            }
            _ => false,
        }
    }

    fn on_base_property(&mut self, id: NodeId, property: StyleProperty) {
        if property.is_layout() {
            self.sync_layout_style(id);
            self.request_composite();
            return;
        }

        if matches!(
            property,
            StyleProperty::Opacity
                | StyleProperty::Transform
                | StyleProperty::TransformOriginX
                | StyleProperty::TransformOriginY
        ) {
            self.request_composite();
        }
    }

    /// Rebuilds the node's layout style. The root always spans the view.
    pub(super) fn sync_layout_style(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };

        let mut style = layout::to_layout_style(&node.style, &self.ctx);

        if node.kind == NodeKind::Root {
            style.size = taffy::Size {
                width: taffy::style_helpers::length(self.ctx.view_width),
                height: taffy::style_helpers::length(self.ctx.view_height),
            };
            style.position = taffy::Position::Relative;
            style.display = taffy::Display::Flex;
        }

        if let Err(e) = self.taffy.set_style(node.layout, style) {
            warn!("layout style for {} rejected: {}", id, e);
        }
    }

    pub fn set_root_font_size(&mut self, px: f32, res: &Resources) -> bool {
        if !px.is_finite() || px <= 0.0 || (px - self.ctx.root_font_size).abs() < f32::EPSILON {
            return false;
        }

        debug!("root font size {} -> {}", self.ctx.root_font_size, px);
        self.ctx.root_font_size = px;
        self.update_dynamic_units(false, true, res);
        true
    }

    pub fn set_view(&mut self, width: f32, height: f32, res: &Resources) {
        self.ctx.set_view(width, height);
        self.sync_layout_style(self.root);
        self.update_dynamic_units(true, false, res);
        self.request_composite();
    }

    /// Re-notifies every property whose value depends on the view size or
    /// the root font size. The root's own font size is skipped.
    fn update_dynamic_units(&mut self, view: bool, rem: bool, res: &Resources) {
        let ids: Vec<NodeId> = self.nodes.keys().copied().collect();

        for id in ids {
            let properties = match self.nodes.get(&id) {
                Some(node) => node.style.dynamic_unit_properties(view, rem),
                None => continue,
            };

            for property in properties {
                if id == self.root && property == StyleProperty::FontSize {
                    continue;
                }

                self.on_style_property_change(id, property, res);
            }
        }
    }

    pub(super) fn request_style_resolve(&mut self, id: NodeId, flag: NodeFlags) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.flags |= flag | NodeFlags::RESOLVE;
        }

        if let Some(root) = self.nodes.get_mut(&self.root) {
            root.flags |= NodeFlags::RESOLVE;
        }
    }

    pub(super) fn request_paint(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.flags |= NodeFlags::PAINT;
        }

        if let Some(root) = self.nodes.get_mut(&self.root) {
            root.flags |= NodeFlags::PAINT;
        }
    }

    pub(super) fn request_composite(&mut self) {
        if let Some(root) = self.nodes.get_mut(&self.root) {
            root.flags |= NodeFlags::COMPOSITE;
        }
    }

    pub(super) fn mark_layout_dirty(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get(&id) {
            if let Err(e) = self.taffy.mark_dirty(node.layout) {
                warn!("cannot mark {} dirty: {}", id, e);
            }
        }
    }

    pub fn set_src(&mut self, id: NodeId, src: Option<&str>, res: &Resources) -> Result<(), NodeError> {
        if self.check(NodeOp::Query, id)?.kind != NodeKind::Image {
            return Err(NodeError::WrongKind(id));
        }

        image_node::set_src(self, id, src, res);
        Ok(())
    }

    pub fn src(&self, id: NodeId) -> Result<Option<&str>, NodeError> {
        let node = self.check(NodeOp::Query, id)?;

        match node.kind {
            NodeKind::Image => Ok(node.src()),
            _ => Err(NodeError::WrongKind(id)),
        }
    }

    pub fn set_text(&mut self, id: NodeId, text: &str) -> Result<(), NodeError> {
        if self.check(NodeOp::Query, id)?.kind != NodeKind::Text {
            return Err(NodeError::WrongKind(id));
        }

        text_node::set_text(self, id, text);
        Ok(())
    }

    pub fn text(&self, id: NodeId) -> Result<&str, NodeError> {
        let node = self.check(NodeOp::Query, id)?;

        node.text().ok_or(NodeError::WrongKind(id))
    }

    /// Applies a resource event delivered to `id`. Events for destroyed
    /// nodes are dropped.
    pub fn on_resource_event(&mut self, id: NodeId, event: &ResourceEvent) {
        let Some(kind) = self.nodes.get(&id).map(|n| n.kind) else {
            return;
        };

        match kind {
            NodeKind::Box => box_node::on_resource_event(self, id, event),
            NodeKind::Image => image_node::on_resource_event(self, id, event),
            NodeKind::Text => text_node::on_resource_event(self, id, event),
            NodeKind::Root => {}
        }
    }
}

fn release_payload(node: &mut Node, res: &Resources) {
    let key = node.id.0;

    match &mut node.payload {
        Payload::Box { background: image } | Payload::Image { image, .. } => {
            if let Some(image) = image.take() {
                image.remove_observer(key);
                res.images.release_image(&image);
            }
        }
        Payload::Text { font, .. } => {
            if let Some(font) = font.take() {
                font.remove_observer(key);
                res.fonts.release_font(&font);
            }
        }
        Payload::Root => {}
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::BuiltinFont;
    use crate::resource::ThreadPool;
    use std::rc::Rc;

    pub(crate) struct Fixture {
        pub fonts: FontStore,
        pub images: ImageStore,
        pub inbox: EventInbox,
    }

    impl Fixture {
        pub fn new() -> Self {
            let pool = Rc::new(ThreadPool::inline());

            Self {
                fonts: FontStore::new(&BuiltinFont::Synthetic, pool.clone()),
                images: ImageStore::new(pool),
                inbox: EventInbox::new(),
            }
        }

        pub fn res(&self) -> Resources<'_> {
            Resources {
                fonts: &self.fonts,
                images: &self.images,
                inbox: &self.inbox,
            }
        }
    }

    #[test]
    fn append_validates_before_mutating() {
        let fx = Fixture::new();
        let res = fx.res();
        let mut scene = SceneGraph::new(16.0, 4).unwrap();
        let root = scene.root();
        let text = scene.create_node(NodeKind::Text).unwrap();
        let a = scene.create_node(NodeKind::Box).unwrap();

        assert!(matches!(scene.append(text, a, &res), Err(NodeError::LeafParent(NodeOp::Append, _))));
        scene.append(root, a, &res).unwrap();
        assert!(matches!(scene.append(root, a, &res), Err(NodeError::AlreadyParented(..))));
        assert!(matches!(scene.append(a, root, &res), Err(NodeError::WouldCycle(..))));
        assert!(matches!(scene.append(a, NodeId(u64::MAX), &res), Err(NodeError::WrongWindow(..))));
        assert_eq!(scene.child_count(root).unwrap(), 1);
    }

    #[test]
    fn insert_before_orders_children() {
        let fx = Fixture::new();
        let res = fx.res();
        let mut scene = SceneGraph::new(16.0, 4).unwrap();
        let root = scene.root();
        let a = scene.create_node(NodeKind::Box).unwrap();
        let b = scene.create_node(NodeKind::Box).unwrap();
        let stray = scene.create_node(NodeKind::Box).unwrap();

        scene.append(root, a, &res).unwrap();
        assert!(matches!(
            scene.insert_before(root, b, stray, &res),
            Err(NodeError::NotAChild { op: NodeOp::Insert, .. })
        ));
        scene.insert_before(root, b, a, &res).unwrap();

        assert_eq!(scene.child_at(root, 0).unwrap(), Some(b));
        assert_eq!(scene.child_at(root, 1).unwrap(), Some(a));
    }

    #[test]
    fn destroy_takes_the_subtree_and_leaves_tombstones() {
        let fx = Fixture::new();
        let res = fx.res();
        let mut scene = SceneGraph::new(16.0, 4).unwrap();
        let root = scene.root();
        let outer = scene.create_node(NodeKind::Box).unwrap();
        let inner = scene.create_node(NodeKind::Text).unwrap();

        scene.append(root, outer, &res).unwrap();
        scene.append(outer, inner, &res).unwrap();
        scene.destroy(outer, &res, None).unwrap();

        assert!(scene.is_destroyed(inner));
        assert_eq!(scene.child_count(root).unwrap(), 0);
        assert!(matches!(scene.parent(inner), Err(NodeError::Destroyed(NodeOp::Query, _))));
        assert!(matches!(scene.destroy(outer, &res, None), Err(NodeError::Destroyed(..))));
    }
}
