//! Box nodes: background color or image, border and rounded corners.

use tracing::debug;

use crate::core::color::Color;
use crate::core::geometry::clip_image_rect;
use crate::core::style::compute::{compute_background_fit, compute_border_only, compute_border_radius};
use crate::core::style::{StyleContext, StyleProperty};
use crate::renderer::Graphics;
use crate::resource::{ResourceEvent, ResourceId, ResourceState};

use super::{Node, NodeFlags, NodeId, Payload, Resources, SceneGraph};

pub(super) fn on_property(scene: &mut SceneGraph, id: NodeId, property: StyleProperty, res: &Resources) -> bool {
    use StyleProperty::*;

    match property {
        BackgroundImage => {
            sync_background(scene, id, res);
            true
        }
        BackgroundPositionX | BackgroundPositionY | BackgroundSize | BackgroundWidth | BackgroundHeight => {
            scene.request_style_resolve(id, NodeFlags::BOUNDS);
            true
        }
        BorderRadius | BorderRadiusTopLeft | BorderRadiusTopRight | BorderRadiusBottomLeft | BorderRadiusBottomRight => {
            scene.request_style_resolve(id, NodeFlags::SHAPE);
            true
        }
        BackgroundColor | BorderColor => {
            scene.request_style_resolve(id, NodeFlags::COLOR);
            true
        }
        _ => false,
    }
}

/// Swaps the background image for whatever `backgroundImage` now names.
fn sync_background(scene: &mut SceneGraph, id: NodeId, res: &Resources) {
    let Some(node) = scene.nodes.get_mut(&id) else {
        return;
    };

    let uri = node.style.get_string(StyleProperty::BackgroundImage);
    let Payload::Box { background } = &mut node.payload else {
        return;
    };

    if background.as_ref().map(|image| image.uri()) == uri.as_deref() {
        return;
    }

    if let Some(previous) = background.take() {
        previous.remove_observer(id.0);
        res.images.release_image(&previous);
    }

    if let Some(uri) = uri.as_deref().filter(|uri| !uri.is_empty()) {
        *background = res.images.acquire_image(uri, true);

        if let Some(image) = background.as_ref() {
            image.add_observer(id.0, res.inbox.observer(id));
            debug!("{} background {} ({:?})", id, uri, image.state());
        }
    }

    scene.request_style_resolve(id, NodeFlags::BOUNDS);
}

pub(super) fn on_resource_event(scene: &mut SceneGraph, id: NodeId, event: &ResourceEvent) {
    let ResourceId::Image(image_id) = event.resource else {
        return;
    };

    let current = scene.nodes.get(&id).and_then(Node::image).map(|image| image.id());

    if current == Some(image_id) && matches!(event.state, ResourceState::Ready | ResourceState::Error) {
        scene.request_style_resolve(id, NodeFlags::BOUNDS);
    }
}

pub(super) fn resolve(scene: &mut SceneGraph, id: NodeId, inputs: NodeFlags) {
    if inputs.intersects(NodeFlags::BOUNDS | NodeFlags::SHAPE | NodeFlags::COLOR) {
        scene.request_paint(id);
    }
}

pub(super) fn paint(node: &Node, ctx: &StyleContext, graphics: &mut dyn Graphics) {
    let rect = node.local_rect();
    let background = node.style.get_color(StyleProperty::BackgroundColor);
    let border_color = node.style.get_color(StyleProperty::BorderColor);

    if has_border_radius(node) {
        let style = &node.style;

        if style.has_property(StyleProperty::BackgroundColor) || style.has_property(StyleProperty::BorderColor) {
            let radius = compute_border_radius(style, ctx);
            graphics.queue_rounded_rect(rect, radius, background, compute_border_only(style, ctx), border_color);
        }
        return;
    }

    if background.a() > 0 {
        graphics.queue_fill_rect(rect, background);
    }

    if let Some(image) = node.image().filter(|image| image.can_render()) {
        let (width, height) = (image.width() as f32, image.height() as f32);
        let fitted = compute_background_fit(&node.style, ctx, &rect, width, height);
        let (dest, src) = clip_image_rect(&rect, &fitted, width, height);

        if !dest.is_empty() && !src.is_empty() {
            graphics.queue_draw_image(dest, image.clone(), src);
        }
    }

    paint_border(node, border_color, graphics);
}

// A set radius takes the rounded path even when it resolves to zero.
fn has_border_radius(node: &Node) -> bool {
    use StyleProperty::*;

    [BorderRadius, BorderRadiusTopLeft, BorderRadiusTopRight, BorderRadiusBottomLeft, BorderRadiusBottomRight]
        .into_iter()
        .any(|property| node.style.has_property(property))
}

/// Stroke along the laid out border edges.
pub(super) fn paint_border(node: &Node, color: Color, graphics: &mut dyn Graphics) {
    if color.a() > 0 && node.border.any() {
        graphics.queue_stroke_rect(node.local_rect(), node.border, color);
    }
}

pub(super) fn tint(node: &Node) -> Color {
    let background = node.style.get_color(StyleProperty::BackgroundColor);

    if background.a() > 0 {
        background
    } else {
        Color::WHITE
    }
}
