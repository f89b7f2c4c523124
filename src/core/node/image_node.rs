//! Image nodes: a leaf that shows one image from the window's image store,
//! sized to the image's natural dimensions unless the style says otherwise.

use tracing::debug;

use crate::core::color::Color;
use crate::core::geometry::clip_image_rect;
use crate::core::matrix::Matrix;
use crate::core::style::compute::compute_object_fit;
use crate::core::style::{StyleContext, StyleFilter, StyleProperty};
use crate::renderer::Graphics;
use crate::resource::{ResourceEvent, ResourceId, ResourceState};

use super::box_node::paint_border;
use super::{Node, NodeFlags, NodeId, Payload, Resources, SceneGraph};

pub(super) fn on_property(scene: &mut SceneGraph, id: NodeId, property: StyleProperty) -> bool {
    use StyleProperty::*;

    match property {
        ObjectFit | ObjectPositionX | ObjectPositionY => {
            scene.request_style_resolve(id, NodeFlags::BOUNDS);
            true
        }
        BackgroundColor | BorderColor => {
            scene.request_style_resolve(id, NodeFlags::COLOR);
            true
        }
        Filter => {
            scene.request_style_resolve(id, NodeFlags::COLOR);
            scene.request_composite();
            true
        }
        _ => false,
    }
}

pub(super) fn set_src(scene: &mut SceneGraph, id: NodeId, src: Option<&str>, res: &Resources) {
    let Some(node) = scene.nodes.get_mut(&id) else {
        return;
    };

    let Payload::Image { src: current, image } = &mut node.payload else {
        return;
    };

    let src = src.filter(|s| !s.is_empty());

    if current.as_deref() == src {
        return;
    }

    if let Some(previous) = image.take() {
        previous.remove_observer(id.0);
        res.images.release_image(&previous);
    }

    *current = src.map(str::to_string);

    if let Some(uri) = src {
        *image = res.images.acquire_image(uri, true);

        if let Some(image) = image.as_ref() {
            image.add_observer(id.0, res.inbox.observer(id));
            debug!("{} src {} ({:?})", id, uri, image.state());
        }
    }

    scene.mark_layout_dirty(id);
    scene.request_style_resolve(id, NodeFlags::BOUNDS);
}

pub(super) fn on_resource_event(scene: &mut SceneGraph, id: NodeId, event: &ResourceEvent) {
    let ResourceId::Image(image_id) = event.resource else {
        return;
    };

    let current = scene.nodes.get(&id).and_then(Node::image).map(|image| image.id());

    if current == Some(image_id) && matches!(event.state, ResourceState::Ready | ResourceState::Error) {
        scene.mark_layout_dirty(id);
        scene.request_style_resolve(id, NodeFlags::BOUNDS);
    }
}

/// Natural image size, scaled to keep the aspect ratio when only one
/// dimension is known.
pub(super) fn measure(node: &Node, known: taffy::Size<Option<f32>>) -> taffy::Size<f32> {
    let Some(image) = node.image().filter(|image| image.can_render()) else {
        return taffy::Size {
            width: known.width.unwrap_or(0.0),
            height: known.height.unwrap_or(0.0),
        };
    };

    let (natural_width, natural_height) = (image.width() as f32, image.height() as f32);

    let (width, height) = match (known.width, known.height) {
        (Some(width), Some(height)) => (width, height),
        (Some(width), None) => (width, width * natural_height / natural_width),
        (None, Some(height)) => (height * natural_width / natural_height, height),
        (None, None) => (natural_width, natural_height),
    };

    taffy::Size { width, height }
}

pub(super) fn resolve(scene: &mut SceneGraph, id: NodeId, inputs: NodeFlags) {
    if inputs.intersects(NodeFlags::BOUNDS | NodeFlags::COLOR) {
        scene.request_paint(id);
    }
}

pub(super) fn paint(node: &Node, ctx: &StyleContext, graphics: &mut dyn Graphics) {
    let background = node.style.get_color(StyleProperty::BackgroundColor);

    if background.a() > 0 {
        graphics.queue_fill_rect(node.local_rect(), background);
    }

    if let Some(image) = node.image().filter(|image| image.can_render()) {
        let content = node.content_rect();
        let (width, height) = (image.width() as f32, image.height() as f32);
        let fitted = compute_object_fit(&node.style, ctx, &content, width, height);
        let (dest, src) = clip_image_rect(&content, &fitted, width, height);

        if !dest.is_empty() && !src.is_empty() {
            graphics.queue_draw_image(dest, image.clone(), src);
        }
    }

    paint_border(node, node.style.get_color(StyleProperty::BorderColor), graphics);
}

/// Tint from a `tint()` filter, white otherwise, plus the mirror transform
/// for flip filters.
pub(super) fn tint_and_flip(node: &Node) -> (Color, Option<Matrix>) {
    let Some(filters) = node.style.get_filter(StyleProperty::Filter) else {
        return (Color::WHITE, None);
    };

    let mut tint = Color::WHITE;
    let (mut flip_x, mut flip_y) = (false, false);

    for filter in filters.iter() {
        match filter {
            StyleFilter::FlipH => flip_x = !flip_x,
            StyleFilter::FlipV => flip_y = !flip_y,
            StyleFilter::Tint(color) => tint = *color,
        }
    }

    if !flip_x && !flip_y {
        return (tint, None);
    }

    let (cx, cy) = (node.bounds.width / 2.0, node.bounds.height / 2.0);
    let scale = Matrix::scale(if flip_x { -1.0 } else { 1.0 }, if flip_y { -1.0 } else { 1.0 });

    (tint, Some(Matrix::translate(cx, cy) * scale * Matrix::translate(-cx, -cy)))
}
