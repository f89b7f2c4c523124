//! Text nodes: a leaf holding a string drawn with one font from the font
//! store. Measured by the line breaker during layout.

use std::sync::Arc;

use taffy::AvailableSpace;
use tracing::trace;

use crate::core::color::Color;
use crate::core::geometry::Size;
use crate::core::layout::available_width;
use crate::core::style::compute::as_text_style;
use crate::core::style::{FontStyle, FontWeight, StyleContext, StyleProperty};
use crate::core::text;
use crate::renderer::Graphics;
use crate::resource::{ResourceEvent, ResourceId, ResourceState};

use super::{Node, NodeFlags, NodeId, Payload, Resources, SceneGraph};

pub(super) fn on_property(scene: &mut SceneGraph, id: NodeId, property: StyleProperty) -> bool {
    match property {
        StyleProperty::FontFamily | StyleProperty::FontStyle | StyleProperty::FontWeight => {
            scene.request_style_resolve(id, NodeFlags::FONT);
            true
        }
        StyleProperty::FontSize
        | StyleProperty::TextAlign
        | StyleProperty::TextOverflow
        | StyleProperty::TextTransform
        | StyleProperty::OverflowWrap
        | StyleProperty::MaxLines
        | StyleProperty::WhiteSpace
        | StyleProperty::FontKerning => {
            scene.mark_layout_dirty(id);
            scene.request_style_resolve(id, NodeFlags::TEXT);
            true
        }
        StyleProperty::BackgroundColor | StyleProperty::BorderColor | StyleProperty::Color => {
            scene.request_style_resolve(id, NodeFlags::COLOR);
            true
        }
        _ => false,
    }
}

pub(super) fn set_text(scene: &mut SceneGraph, id: NodeId, value: &str) {
    let Some(node) = scene.nodes.get_mut(&id) else {
        return;
    };

    let Payload::Text { text, chars, .. } = &mut node.payload else {
        return;
    };

    if text.as_str() == value {
        return;
    }

    *text = value.to_string();
    *chars = value.chars().collect::<Vec<_>>().into();

    scene.mark_layout_dirty(id);
    scene.request_style_resolve(id, NodeFlags::TEXT);
}

/// Re-acquires the font the style names. A changed font that is already
/// usable relayouts and repaints right away; a loading one waits for its
/// ready event.
fn sync_font(scene: &mut SceneGraph, id: NodeId, res: &Resources) {
    let Some(node) = scene.nodes.get_mut(&id) else {
        return;
    };

    let family = node.style.get_string(StyleProperty::FontFamily);
    let style = FontStyle::from_i32(node.style.get_enum(StyleProperty::FontStyle));
    let weight = FontWeight::from_i32(node.style.get_enum(StyleProperty::FontWeight));

    let Payload::Text { font, .. } = &mut node.payload else {
        return;
    };

    let next = res.fonts.acquire_font(family.as_deref().unwrap_or(""), style, weight);

    match (font.as_ref(), next.as_ref()) {
        (Some(current), Some(next)) if Arc::ptr_eq(current, next) => {
            res.fonts.release_font(next);
            return;
        }
        (None, None) => return,
        _ => {}
    }

    if let Some(previous) = font.take() {
        previous.remove_observer(id.0);
        res.fonts.release_font(&previous);
    }

    *font = next;

    let loading = match font.as_ref() {
        Some(font) => {
            font.add_observer(id.0, res.inbox.observer(id));
            trace!("{} font '{}' ({:?})", id, font.info().family, font.state());
            font.state() == ResourceState::Loading
        }
        None => false,
    };

    if !loading {
        scene.mark_layout_dirty(id);
        scene.request_paint(id);
    }
}

pub(super) fn on_resource_event(scene: &mut SceneGraph, id: NodeId, event: &ResourceEvent) {
    let ResourceId::Font(font_id) = event.resource else {
        return;
    };

    if scene.nodes.get(&id).and_then(Node::font).map(|font| font.id()) != Some(font_id) {
        return;
    }

    match event.state {
        ResourceState::Ready => {
            scene.mark_layout_dirty(id);
            scene.request_style_resolve(id, NodeFlags::TEXT);
        }
        ResourceState::Error | ResourceState::Done => scene.request_style_resolve(id, NodeFlags::FONT),
        ResourceState::Init | ResourceState::Loading => {}
    }
}

pub(super) fn resolve(scene: &mut SceneGraph, id: NodeId, inputs: NodeFlags, res: &Resources) {
    if inputs.contains(NodeFlags::FONT) {
        sync_font(scene, id, res);
    }

    if inputs.intersects(NodeFlags::BOUNDS | NodeFlags::TEXT | NodeFlags::COLOR) {
        scene.request_paint(id);
    }
}

fn chars(node: &Node) -> Option<&Arc<[char]>> {
    match &node.payload {
        Payload::Text { chars, .. } if !chars.is_empty() => Some(chars),
        _ => None,
    }
}

pub(super) fn measure(
    node: &Node,
    ctx: &StyleContext,
    known: taffy::Size<Option<f32>>,
    available: taffy::Size<AvailableSpace>,
) -> taffy::Size<f32> {
    let fallback = taffy::Size {
        width: known.width.unwrap_or(0.0),
        height: known.height.unwrap_or(0.0),
    };

    let (Some(font), Some(chars)) = (node.font().filter(|font| font.is_ready()), chars(node)) else {
        return fallback;
    };

    let content_box = Size {
        width: available_width(known.width, available.width),
        height: 0.0,
    };
    let style = as_text_style(&node.style, ctx, Some(font.clone()), &content_box);

    if !font.use_font_size(style.font_size_px) {
        return fallback;
    }

    let size = text::measure(chars, &style, font.as_ref());

    taffy::Size {
        width: known.width.unwrap_or(size.width.ceil()),
        height: known.height.unwrap_or(size.height),
    }
}

pub(super) fn paint(node: &Node, ctx: &StyleContext, graphics: &mut dyn Graphics) {
    let (Some(font), Some(chars)) = (node.font().filter(|font| font.is_ready()), chars(node)) else {
        return;
    };

    let content = node.content_rect();
    let style = as_text_style(&node.style, ctx, Some(font.clone()), &content.size());

    graphics.queue_draw_text(content, style, chars.clone());
}

pub(super) fn tint(node: &Node) -> Color {
    node.style.get_color(StyleProperty::Color)
}
