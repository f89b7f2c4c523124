//! Bridge between node styles and the taffy flexbox engine.
//!
//! The whole taffy style of a node is rebuilt from its [`Style`] whenever a
//! layout property changes. Unset values follow the Yoga defaults the engine
//! was designed against: column direction, no shrink, flex-start content.

use taffy::style_helpers::{auto, length, percent, zero};
use taffy::{Dimension, LengthPercentage, LengthPercentageAuto, TaffyTree};

use crate::core::geometry::{BorderRect, RectF};
use crate::core::node::NodeId;
use crate::core::style::compute::resolve_numeric;
use crate::core::style::{
    Align, Display, FlexDirection, FlexWrap, Justify, Overflow, Position, Style, StyleContext, StyleProperty,
    StyleUnit, StyleValue,
};

pub use taffy::NodeId as LayoutHandle;
pub use taffy::TaffyError as LayoutError;

/// Layout tree whose measurable leaves carry the owning node's id.
pub type LayoutTree = TaffyTree<NodeId>;

pub fn new_tree() -> LayoutTree {
    TaffyTree::new()
}

/// Taffy style for a node with no layout properties set.
pub fn base_style() -> taffy::Style {
    taffy::Style {
        display: taffy::Display::Flex,
        flex_direction: taffy::FlexDirection::Column,
        flex_shrink: 0.0,
        align_content: Some(taffy::AlignContent::FlexStart),
        ..taffy::Style::default()
    }
}

pub fn to_layout_style(style: &Style, ctx: &StyleContext) -> taffy::Style {
    let enum_of = |p| style.get_enum(p);
    let flex = style.get_numeric(StyleProperty::Flex);
    let flex = if flex.unit.is_pixelish() { resolve_numeric(&flex, ctx) } else { 0.0 };
    let flex_grow = style.get_numeric(StyleProperty::FlexGrow);
    let flex_shrink = style.get_numeric(StyleProperty::FlexShrink);
    let flex_basis = style.get_numeric(StyleProperty::FlexBasis);

    let mut out = base_style();

    out.display = match Display::from_i32(enum_of(StyleProperty::Display)) {
        Display::Flex => taffy::Display::Flex,
        Display::None => taffy::Display::None,
    };
    out.position = match Position::from_i32(enum_of(StyleProperty::Position)) {
        Position::Absolute => taffy::Position::Absolute,
        Position::Static | Position::Relative => taffy::Position::Relative,
    };
    out.flex_direction = match FlexDirection::from_i32(enum_of(StyleProperty::FlexDirection)) {
        FlexDirection::Column => taffy::FlexDirection::Column,
        FlexDirection::ColumnReverse => taffy::FlexDirection::ColumnReverse,
        FlexDirection::Row => taffy::FlexDirection::Row,
        FlexDirection::RowReverse => taffy::FlexDirection::RowReverse,
    };
    out.flex_wrap = match FlexWrap::from_i32(enum_of(StyleProperty::FlexWrap)) {
        FlexWrap::NoWrap => taffy::FlexWrap::NoWrap,
        FlexWrap::Wrap => taffy::FlexWrap::Wrap,
        FlexWrap::WrapReverse => taffy::FlexWrap::WrapReverse,
    };

    let overflow = match Overflow::from_i32(enum_of(StyleProperty::Overflow)) {
        Overflow::Visible => taffy::Overflow::Visible,
        Overflow::Hidden => taffy::Overflow::Hidden,
        Overflow::Scroll => taffy::Overflow::Scroll,
    };
    out.overflow = taffy::Point { x: overflow, y: overflow };

    out.justify_content = Some(justify(Justify::from_i32(enum_of(StyleProperty::JustifyContent))));
    out.align_items = align_items(Align::from_i32(enum_of(StyleProperty::AlignItems)));
    out.align_self = align_items(Align::from_i32(enum_of(StyleProperty::AlignSelf)));
    out.align_content = Some(align_content(Align::from_i32(enum_of(StyleProperty::AlignContent))));

    out.flex_grow = if flex_grow.unit.is_pixelish() {
        resolve_numeric(&flex_grow, ctx)
    } else if flex > 0.0 {
        flex
    } else {
        0.0
    };
    out.flex_shrink = if flex_shrink.unit.is_pixelish() {
        resolve_numeric(&flex_shrink, ctx)
    } else if flex < 0.0 {
        -flex
    } else {
        0.0
    };
    out.flex_basis = if flex_basis.is_undefined() && flex > 0.0 {
        length(0.0)
    } else {
        dimension(&flex_basis, ctx)
    };

    out.size = taffy::Size {
        width: dimension(&style.get_numeric(StyleProperty::Width), ctx),
        height: dimension(&style.get_numeric(StyleProperty::Height), ctx),
    };
    out.min_size = taffy::Size {
        width: dimension(&style.get_numeric(StyleProperty::MinWidth), ctx),
        height: dimension(&style.get_numeric(StyleProperty::MinHeight), ctx),
    };
    out.max_size = taffy::Size {
        width: dimension(&style.get_numeric(StyleProperty::MaxWidth), ctx),
        height: dimension(&style.get_numeric(StyleProperty::MaxHeight), ctx),
    };

    let edge = |specific: StyleProperty, all: StyleProperty| {
        let value = style.get_numeric(specific);

        if value.is_undefined() {
            style.get_numeric(all)
        } else {
            value
        }
    };

    out.margin = taffy::Rect {
        top: margin(&edge(StyleProperty::MarginTop, StyleProperty::Margin), ctx),
        right: margin(&edge(StyleProperty::MarginRight, StyleProperty::Margin), ctx),
        bottom: margin(&edge(StyleProperty::MarginBottom, StyleProperty::Margin), ctx),
        left: margin(&edge(StyleProperty::MarginLeft, StyleProperty::Margin), ctx),
    };
    out.padding = taffy::Rect {
        top: length_percentage(&edge(StyleProperty::PaddingTop, StyleProperty::Padding), ctx),
        right: length_percentage(&edge(StyleProperty::PaddingRight, StyleProperty::Padding), ctx),
        bottom: length_percentage(&edge(StyleProperty::PaddingBottom, StyleProperty::Padding), ctx),
        left: length_percentage(&edge(StyleProperty::PaddingLeft, StyleProperty::Padding), ctx),
    };
    out.border = taffy::Rect {
        top: length_percentage(&edge(StyleProperty::BorderTop, StyleProperty::Border), ctx),
        right: length_percentage(&edge(StyleProperty::BorderRight, StyleProperty::Border), ctx),
        bottom: length_percentage(&edge(StyleProperty::BorderBottom, StyleProperty::Border), ctx),
        left: length_percentage(&edge(StyleProperty::BorderLeft, StyleProperty::Border), ctx),
    };
    out.inset = taffy::Rect {
        top: inset(&style.get_numeric(StyleProperty::Top), ctx),
        right: inset(&style.get_numeric(StyleProperty::Right), ctx),
        bottom: inset(&style.get_numeric(StyleProperty::Bottom), ctx),
        left: inset(&style.get_numeric(StyleProperty::Left), ctx),
    };

    out
}

/// Laid out border box relative to the parent, plus border and padding edges.
pub fn read_layout(layout: &taffy::Layout) -> (RectF, BorderRect, BorderRect) {
    let bounds = RectF::new(layout.location.x, layout.location.y, layout.size.width, layout.size.height);
    let edges = |r: &taffy::Rect<f32>| BorderRect {
        top: r.top,
        right: r.right,
        bottom: r.bottom,
        left: r.left,
    };

    (bounds, edges(&layout.border), edges(&layout.padding))
}

/// Available width handed to a measure function, as a wrapping limit.
pub fn available_width(known: Option<f32>, available: taffy::AvailableSpace) -> f32 {
    match (known, available) {
        (Some(width), _) => width,
        (None, taffy::AvailableSpace::Definite(width)) => width,
        (None, taffy::AvailableSpace::MinContent) => 0.0,
        (None, taffy::AvailableSpace::MaxContent) => f32::INFINITY,
    }
}

fn dimension(value: &StyleValue, ctx: &StyleContext) -> Dimension {
    match value.unit {
        StyleUnit::Percent => percent(value.value / 100.0),
        unit if unit.is_pixelish() => length(resolve_numeric(value, ctx)),
        _ => auto(),
    }
}

fn margin(value: &StyleValue, ctx: &StyleContext) -> LengthPercentageAuto {
    match value.unit {
        StyleUnit::Auto => auto(),
        StyleUnit::Percent => percent(value.value / 100.0),
        unit if unit.is_pixelish() => length(resolve_numeric(value, ctx)),
        _ => zero(),
    }
}

fn inset(value: &StyleValue, ctx: &StyleContext) -> LengthPercentageAuto {
    match value.unit {
        StyleUnit::Percent => percent(value.value / 100.0),
        unit if unit.is_pixelish() => length(resolve_numeric(value, ctx)),
        _ => auto(),
    }
}

fn length_percentage(value: &StyleValue, ctx: &StyleContext) -> LengthPercentage {
    match value.unit {
        StyleUnit::Percent => percent(value.value / 100.0),
        unit if unit.is_pixelish() => length(resolve_numeric(value, ctx)),
        _ => zero(),
    }
}

fn justify(value: Justify) -> taffy::JustifyContent {
    match value {
        Justify::FlexStart => taffy::JustifyContent::FlexStart,
        Justify::Center => taffy::JustifyContent::Center,
        Justify::FlexEnd => taffy::JustifyContent::FlexEnd,
        Justify::SpaceBetween => taffy::JustifyContent::SpaceBetween,
        Justify::SpaceAround => taffy::JustifyContent::SpaceAround,
        Justify::SpaceEvenly => taffy::JustifyContent::SpaceEvenly,
    }
}

// None lets taffy apply its own default: stretch for items, auto for self.
fn align_items(value: Align) -> Option<taffy::AlignItems> {
    match value {
        Align::FlexStart => Some(taffy::AlignItems::FlexStart),
        Align::Center => Some(taffy::AlignItems::Center),
        Align::FlexEnd => Some(taffy::AlignItems::FlexEnd),
        Align::Stretch => Some(taffy::AlignItems::Stretch),
        Align::Baseline => Some(taffy::AlignItems::Baseline),
        Align::Auto | Align::SpaceBetween | Align::SpaceAround => None,
    }
}

fn align_content(value: Align) -> taffy::AlignContent {
    match value {
        Align::Center => taffy::AlignContent::Center,
        Align::FlexEnd => taffy::AlignContent::FlexEnd,
        Align::Stretch => taffy::AlignContent::Stretch,
        Align::SpaceBetween => taffy::AlignContent::SpaceBetween,
        Align::SpaceAround => taffy::AlignContent::SpaceAround,
        Align::Auto | Align::FlexStart | Align::Baseline => taffy::AlignContent::FlexStart,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ctx() -> StyleContext {
        StyleContext::new(200.0, 100.0, 16.0)
    }

    #[test]
    fn unset_style_matches_yoga_defaults() {
        let out = to_layout_style(&Style::new(), &ctx());

        assert_eq!(out.flex_direction, taffy::FlexDirection::Column);
        assert_eq!(out.flex_shrink, 0.0);
        assert_eq!(out.flex_grow, 0.0);
        assert_eq!(out.position, taffy::Position::Relative);
        let auto_size: Dimension = auto();
        let zero_margin: LengthPercentageAuto = zero();
        let auto_inset: LengthPercentageAuto = auto();

        assert_eq!(out.size.width, auto_size);
        assert_eq!(out.margin.left, zero_margin);
        assert_eq!(out.inset.top, auto_inset);
    }

    #[test]
    fn units_resolve_before_reaching_taffy() {
        let mut style = Style::new();
        style.set_numeric(StyleProperty::Width, StyleValue::new(StyleUnit::Vw, 50.0)).unwrap();
        style.set_numeric(StyleProperty::Height, StyleValue::percent(25.0)).unwrap();
        style.set_numeric(StyleProperty::Margin, StyleValue::new(StyleUnit::Rem, 1.0)).unwrap();
        style.set_numeric(StyleProperty::MarginTop, StyleValue::AUTO).unwrap();

        let out = to_layout_style(&style, &ctx());

        let width: Dimension = length(100.0);
        let height: Dimension = percent(0.25);
        let side: LengthPercentageAuto = length(16.0);
        let top: LengthPercentageAuto = auto();

        assert_eq!(out.size.width, width);
        assert_eq!(out.size.height, height);
        assert_eq!(out.margin.left, side);
        assert_eq!(out.margin.top, top);
    }

    #[test]
    fn flex_shorthand_feeds_grow_and_basis() {
        let mut style = Style::new();
        style.set_numeric(StyleProperty::Flex, StyleValue::px(2.0)).unwrap();

        let out = to_layout_style(&style, &ctx());
        assert_eq!(out.flex_grow, 2.0);
        let basis: Dimension = length(0.0);
        assert_eq!(out.flex_basis, basis);

        style.set_numeric(StyleProperty::FlexGrow, StyleValue::px(1.0)).unwrap();
        assert_eq!(to_layout_style(&style, &ctx()).flex_grow, 1.0);
    }

    #[test]
    fn measure_width_limits() {
        assert_eq!(available_width(Some(5.0), taffy::AvailableSpace::MinContent), 5.0);
        assert_eq!(available_width(None, taffy::AvailableSpace::Definite(40.0)), 40.0);
        assert!(available_width(None, taffy::AvailableSpace::MaxContent).is_infinite());
    }
}
