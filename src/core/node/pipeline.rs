//! Per-frame update of a scene: settle layout and style resolution, paint
//! dirty nodes into render objects, then composite the tree.

use taffy::AvailableSpace;
use tracing::{trace, warn};

use crate::core::color::Color;
use crate::core::matrix::Matrix;
use crate::core::style::compute::{compute_transform, has_transform, resolve_opacity};
use crate::core::style::{Display, Overflow, StyleProperty};
use crate::renderer::Graphics;

use super::{box_node, image_node, text_node, NodeError, NodeFlags, NodeId, NodeKind, Resources, SceneGraph};

impl SceneGraph {
    /// Runs one frame against `graphics`. Layout and resolution settle
    /// first; painting and compositing never fail.
    pub fn update(&mut self, res: &Resources, graphics: &mut dyn Graphics) -> Result<(), NodeError> {
        self.settle(res)?;

        let mut order = Vec::new();
        self.post_order(self.root, &mut order);

        for id in order {
            self.paint(id, graphics);
        }

        graphics.reset_state();

        let composite = self
            .nodes
            .get_mut(&self.root)
            .map(|root| {
                let dirty = root.flags.contains(NodeFlags::COMPOSITE);
                root.flags.remove(NodeFlags::COMPOSITE);
                dirty
            })
            .unwrap_or(false);

        if composite {
            self.composite(self.root, graphics);
            graphics.reset_state();
        }

        Ok(())
    }

    /// Whether the next update has layout, resolve or paint work queued.
    pub fn needs_update(&self) -> bool {
        let Some(root) = self.nodes.get(&self.root) else {
            return false;
        };

        root.flags
            .intersects(NodeFlags::RESOLVE | NodeFlags::PAINT | NodeFlags::COMPOSITE)
            || self.taffy.dirty(root.layout).unwrap_or(false)
    }

    /// Alternates layout and style resolution until neither has work left,
    /// at most `settle_iterations` times. Layout dirtied by the last
    /// resolve still gets one more layout pass.
    pub(super) fn settle(&mut self, res: &Resources) -> Result<(), NodeError> {
        for pass in 0..self.settle_iterations {
            let root_layout = self.nodes[&self.root].layout;
            let layout_dirty = self.taffy.dirty(root_layout)?;
            let resolve = self.nodes[&self.root].has_flag(NodeFlags::RESOLVE);

            if !layout_dirty && !resolve {
                return Ok(());
            }

            trace!("settle pass {} (layout: {}, resolve: {})", pass, layout_dirty, resolve);

            if layout_dirty {
                self.compute_layout()?;
                self.read_layout_back()?;
            }

            self.resolve(res);
        }

        let root_layout = self.nodes[&self.root].layout;

        if self.taffy.dirty(root_layout)? {
            self.compute_layout()?;
            self.read_layout_back()?;
            self.resolve(res);
        }

        if self.taffy.dirty(root_layout)? || self.nodes[&self.root].has_flag(NodeFlags::RESOLVE) {
            warn!("scene did not settle after {} passes", self.settle_iterations);
        }

        Ok(())
    }

    fn compute_layout(&mut self) -> Result<(), NodeError> {
        let root_layout = self.nodes[&self.root].layout;
        let nodes = &self.nodes;
        let ctx = &self.ctx;
        let available = taffy::Size {
            width: AvailableSpace::Definite(ctx.view_width),
            height: AvailableSpace::Definite(ctx.view_height),
        };

        self.taffy.compute_layout_with_measure(
            root_layout,
            available,
            |known: taffy::Size<Option<f32>>,
             space: taffy::Size<AvailableSpace>,
             _handle: taffy::NodeId,
             context: Option<&mut NodeId>,
             _style: &taffy::Style| {
                let Some(node) = context.and_then(|id| nodes.get(&*id)) else {
                    return taffy::Size::ZERO;
                };

                match node.kind {
                    NodeKind::Text => text_node::measure(node, ctx, known, space),
                    NodeKind::Image => image_node::measure(node, known),
                    NodeKind::Root | NodeKind::Box => taffy::Size::ZERO,
                }
            },
        )?;

        Ok(())
    }

    fn read_layout_back(&mut self) -> Result<(), NodeError> {
        let mut order = Vec::new();
        self.pre_order(self.root, &mut order);

        for id in order {
            let Some(node) = self.nodes.get_mut(&id) else {
                continue;
            };

            let (bounds, border, padding) = crate::core::layout::read_layout(self.taffy.layout(node.layout)?);

            if bounds != node.bounds || border != node.border || padding != node.padding {
                node.bounds = bounds;
                node.border = border;
                node.padding = padding;
                self.request_style_resolve(id, NodeFlags::BOUNDS);
            }
        }

        Ok(())
    }

    fn resolve(&mut self, res: &Resources) {
        if let Some(root) = self.nodes.get_mut(&self.root) {
            root.flags.remove(NodeFlags::RESOLVE);
        }

        let mut order = Vec::new();
        self.pre_order(self.root, &mut order);

        for id in order {
            let Some(node) = self.nodes.get_mut(&id) else {
                continue;
            };

            if !node.flags.contains(NodeFlags::RESOLVE) {
                continue;
            }

            let kind = node.kind;
            let inputs = node.flags & NodeFlags::RESOLVE_INPUTS;
            node.flags.remove(NodeFlags::RESOLVE | NodeFlags::RESOLVE_INPUTS);

            match kind {
                NodeKind::Root => {}
                NodeKind::Box => box_node::resolve(self, id, inputs),
                NodeKind::Image => image_node::resolve(self, id, inputs),
                NodeKind::Text => text_node::resolve(self, id, inputs, res),
            }
        }
    }

    fn paint(&mut self, id: NodeId, graphics: &mut dyn Graphics) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };

        if !node.has_flag(NodeFlags::PAINT) {
            return;
        }

        if node.kind != NodeKind::Root {
            graphics.begin_queue();

            match node.kind {
                NodeKind::Box => box_node::paint(node, &self.ctx, graphics),
                NodeKind::Image => image_node::paint(node, &self.ctx, graphics),
                NodeKind::Text => text_node::paint(node, &self.ctx, graphics),
                NodeKind::Root => {}
            }
        }

        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };

        node.flags.remove(NodeFlags::PAINT);

        if node.kind != NodeKind::Root {
            let width = node.bounds.width.max(0.0).ceil() as u32;
            let height = node.bounds.height.max(0.0).ceil() as u32;
            let previous = node.surface.take();

            node.surface = graphics.end_queue(width, height, previous);
        }

        self.request_composite();
    }

    fn composite(&self, id: NodeId, graphics: &mut dyn Graphics) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };

        if node.kind == NodeKind::Root {
            graphics.set_opacity(resolve_opacity(&node.style));
            graphics.clear(node.style.get_color(StyleProperty::BackgroundColor));

            for child in &node.children {
                self.composite(*child, graphics);
            }
            return;
        }

        if Display::from_i32(node.style.get_enum(StyleProperty::Display)) == Display::None {
            return;
        }

        let local = node.local_rect();

        graphics.push_state();
        graphics.set_opacity(resolve_opacity(&node.style));
        graphics.set_matrix(&Matrix::translate(node.bounds.x, node.bounds.y));

        if has_transform(&node.style) {
            graphics.set_matrix(&compute_transform(&node.style, &self.ctx, &local));
        }

        if Overflow::from_i32(node.style.get_enum(StyleProperty::Overflow)) == Overflow::Hidden {
            graphics.set_clip_rect(&local);
        }

        if let Some(surface) = &node.surface {
            match node.kind {
                NodeKind::Box => graphics.draw_render_object(surface, box_node::tint(node)),
                NodeKind::Text => graphics.draw_render_object(surface, text_node::tint(node)),
                NodeKind::Image => {
                    let (tint, flip) = image_node::tint_and_flip(node);

                    match flip {
                        Some(flip) => {
                            graphics.push_state();
                            graphics.set_matrix(&flip);
                            graphics.draw_render_object(surface, tint);
                            graphics.pop_state();
                        }
                        None => graphics.draw_render_object(surface, tint),
                    }
                }
                NodeKind::Root => graphics.draw_render_object(surface, Color::WHITE),
            }
        }

        for child in &node.children {
            self.composite(*child, graphics);
        }

        graphics.pop_state();
    }
}
