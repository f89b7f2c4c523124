//! Unit resolution and derived values computed from a style.

use std::f32::consts::PI;
use std::sync::Arc;

use crate::core::geometry::{BorderRadius, PointF, RectF, Size};
use crate::core::matrix::Matrix;
use crate::core::text::TextStyle;
use crate::resource::font::Font;

use super::{
    BackgroundSize, FontKerning, ObjectFit, OverflowWrap, Style, StyleAnchor, StyleContext, StyleProperty,
    StyleTransform, StyleUnit, StyleValue, TextAlign, TextOverflow, TextTransform, WhiteSpace,
};

pub const PT_SCALE_FACTOR: f32 = 1.333_333;
pub const DEFAULT_FONT_SIZE_PX: f32 = 16.0;

#[derive(Clone, Copy, PartialEq)]
enum Axis {
    X,
    Y,
}

/// Resolves px-ish units to pixels. Percent, auto, anchors and angles are
/// NaN; the caller resolves those against its own reference.
pub fn resolve_numeric(value: &StyleValue, ctx: &StyleContext) -> f32 {
    resolve_numeric_or(value, ctx, f32::NAN)
}

pub fn resolve_numeric_or(value: &StyleValue, ctx: &StyleContext, fallback: f32) -> f32 {
    match value.unit {
        StyleUnit::Px => value.value,
        StyleUnit::Pt => value.value * PT_SCALE_FACTOR,
        StyleUnit::Rem => value.value * ctx.root_font_size,
        StyleUnit::Vw => value.value / 100.0 * ctx.view_width,
        StyleUnit::Vh => value.value / 100.0 * ctx.view_height,
        StyleUnit::Vmin => value.value / 100.0 * ctx.view_min,
        StyleUnit::Vmax => value.value / 100.0 * ctx.view_max,
        _ => fallback,
    }
}

pub fn resolve_opacity(style: &Style) -> f32 {
    let opacity = style.get_numeric(StyleProperty::Opacity);

    match opacity.unit {
        StyleUnit::Px => opacity.value.clamp(0.0, 1.0),
        StyleUnit::Percent => (opacity.value / 100.0).clamp(0.0, 1.0),
        _ => 1.0,
    }
}

pub fn compute_border_radius(style: &Style, ctx: &StyleContext) -> BorderRadius {
    let all = resolve_numeric_or(&style.get_numeric(StyleProperty::BorderRadius), ctx, 0.0);
    let corner = |p| resolve_numeric_or(&style.get_numeric(p), ctx, all);

    BorderRadius {
        top_left: corner(StyleProperty::BorderRadiusTopLeft),
        top_right: corner(StyleProperty::BorderRadiusTopRight),
        bottom_left: corner(StyleProperty::BorderRadiusBottomLeft),
        bottom_right: corner(StyleProperty::BorderRadiusBottomRight),
    }
}

pub fn compute_border_only(style: &Style, ctx: &StyleContext) -> f32 {
    resolve_numeric_or(&style.get_numeric(StyleProperty::Border), ctx, 0.0)
}

pub fn compute_font_size(style: &Style, ctx: &StyleContext) -> f32 {
    resolve_numeric_or(&style.get_numeric(StyleProperty::FontSize), ctx, DEFAULT_FONT_SIZE_PX)
}

pub fn compute_max_lines(style: &Style) -> i32 {
    let value = style.get_numeric(StyleProperty::MaxLines);

    if value.unit == StyleUnit::Px {
        value.value as i32
    } else {
        0
    }
}

/// Root font size as declared on the root node. rem on the root is relative
/// to the default size, not to itself.
pub fn compute_font_size_from_root(style: &Style, ctx: &StyleContext) -> f32 {
    let value = style.get_numeric(StyleProperty::FontSize);

    match value.unit {
        StyleUnit::Rem => value.value * DEFAULT_FONT_SIZE_PX,
        StyleUnit::Undefined => DEFAULT_FONT_SIZE_PX,
        _ => resolve_numeric_or(&value, ctx, 0.0),
    }
}

pub fn has_transform(style: &Style) -> bool {
    style.get_transform(StyleProperty::Transform).is_some_and(|t| !t.is_empty())
}

pub fn compute_transform_origin(style: &Style, ctx: &StyleContext, bounds: &RectF) -> PointF {
    PointF {
        x: transform_origin_axis(&style.get_numeric(StyleProperty::TransformOriginX), ctx, bounds.width),
        y: transform_origin_axis(&style.get_numeric(StyleProperty::TransformOriginY), ctx, bounds.height),
    }
}

/// `translate(origin) * op1 * ... * opN * translate(-origin)`
pub fn compute_transform(style: &Style, ctx: &StyleContext, bounds: &RectF) -> Matrix {
    let origin = compute_transform_origin(style, ctx, bounds);
    let mut result = Matrix::translate(origin.x, origin.y);

    if let Some(ops) = style.get_transform(StyleProperty::Transform) {
        for op in ops.iter() {
            let step = match op {
                StyleTransform::Identity => Matrix::identity(),
                StyleTransform::Translate { x, y } => Matrix::translate(
                    translate_axis(x, ctx, bounds.width),
                    translate_axis(y, ctx, bounds.height),
                ),
                StyleTransform::Scale { x, y } => Matrix::scale(scale_factor(x), scale_factor(y)),
                StyleTransform::Rotate { angle } => Matrix::rotate(angle_radians(angle)),
            };

            result = result * step;
        }
    }

    result * Matrix::translate(-origin.x, -origin.y)
}

pub fn compute_object_fit(style: &Style, ctx: &StyleContext, bounds: &RectF, image_width: f32, image_height: f32) -> RectF {
    let mut fit = ObjectFit::from_i32(style.get_enum(StyleProperty::ObjectFit));

    if fit == ObjectFit::ScaleDown {
        fit = if image_width > bounds.width || image_height > bounds.height {
            ObjectFit::Contain
        } else {
            ObjectFit::None
        };
    }

    let size = match fit {
        ObjectFit::Contain => contain(bounds, image_width, image_height),
        ObjectFit::Cover => cover(bounds, image_width, image_height),
        ObjectFit::None => Size {
            width: image_width,
            height: image_height,
        },
        _ => bounds.size(),
    };

    place(style, ctx, bounds, size, StyleProperty::ObjectPositionX, StyleProperty::ObjectPositionY, 0.5)
}

pub fn compute_background_fit(
    style: &Style,
    ctx: &StyleContext,
    bounds: &RectF,
    image_width: f32,
    image_height: f32,
) -> RectF {
    let size = match BackgroundSize::from_i32(style.get_enum(StyleProperty::BackgroundSize)) {
        BackgroundSize::Contain => contain(bounds, image_width, image_height),
        BackgroundSize::Cover => cover(bounds, image_width, image_height),
        BackgroundSize::None => Size {
            width: background_dimension(style, ctx, StyleProperty::BackgroundWidth, bounds.width, image_width),
            height: background_dimension(style, ctx, StyleProperty::BackgroundHeight, bounds.height, image_height),
        },
    };

    place(
        style,
        ctx,
        bounds,
        size,
        StyleProperty::BackgroundPositionX,
        StyleProperty::BackgroundPositionY,
        0.0,
    )
}

pub fn as_text_style(style: &Style, ctx: &StyleContext, font: Option<Arc<Font>>, content_box: &Size) -> TextStyle {
    let kerning = FontKerning::from_i32(style.get_enum(StyleProperty::FontKerning)) == FontKerning::Normal;
    let kerning_enabled = kerning && font.as_ref().is_some_and(|f| f.has_kerning());

    TextStyle {
        font,
        font_size_px: compute_font_size(style, ctx),
        max_lines: compute_max_lines(style),
        context_box: *content_box,
        transform: TextTransform::from_i32(style.get_enum(StyleProperty::TextTransform)),
        align: TextAlign::from_i32(style.get_enum(StyleProperty::TextAlign)),
        overflow: TextOverflow::from_i32(style.get_enum(StyleProperty::TextOverflow)),
        overflow_wrap: OverflowWrap::from_i32(style.get_enum(StyleProperty::OverflowWrap)),
        white_space: WhiteSpace::from_i32(style.get_enum(StyleProperty::WhiteSpace)),
        kerning_enabled,
    }
}

fn aspect_ratio(width: f32, height: f32) -> f32 {
    if height > 0.0 {
        width / height
    } else {
        0.0
    }
}

fn contain(bounds: &RectF, image_width: f32, image_height: f32) -> Size {
    let ratio = aspect_ratio(image_width, image_height);

    if ratio > bounds.width / bounds.height {
        Size {
            width: bounds.width,
            height: bounds.width / ratio,
        }
    } else {
        Size {
            width: bounds.height * ratio,
            height: bounds.height,
        }
    }
}

fn cover(bounds: &RectF, image_width: f32, image_height: f32) -> Size {
    let ratio = aspect_ratio(image_width, image_height);

    if ratio > bounds.width / bounds.height {
        Size {
            width: bounds.height * ratio,
            height: bounds.height,
        }
    } else {
        Size {
            width: bounds.width,
            height: bounds.width / ratio,
        }
    }
}

fn place(
    style: &Style,
    ctx: &StyleContext,
    bounds: &RectF,
    size: Size,
    x_property: StyleProperty,
    y_property: StyleProperty,
    default_percent: f32,
) -> RectF {
    let x = object_coordinate(style, ctx, x_property, Axis::X, bounds.width, size.width, default_percent);
    let y = object_coordinate(style, ctx, y_property, Axis::Y, bounds.height, size.height, default_percent);

    RectF::new(bounds.x + x, bounds.y + y, size.width, size.height)
}

fn object_coordinate(
    style: &Style,
    ctx: &StyleContext,
    property: StyleProperty,
    axis: Axis,
    box_length: f32,
    object_length: f32,
    default_percent: f32,
) -> f32 {
    let value = style.get_numeric(property);

    if value.unit.is_pixelish() {
        return resolve_numeric(&value, ctx);
    }

    match value.unit {
        StyleUnit::Anchor => match value.anchor() {
            Some(StyleAnchor::Right) if axis == Axis::X => box_length - object_length,
            Some(StyleAnchor::Bottom) if axis == Axis::Y => box_length - object_length,
            Some(StyleAnchor::Center) => (box_length - object_length) * 0.5,
            _ => 0.0,
        },
        StyleUnit::Percent => {
            let percent = value.value / 100.0;
            box_length * percent - object_length * percent
        }
        StyleUnit::Undefined => box_length * default_percent - object_length * default_percent,
        _ => 0.0,
    }
}

fn background_dimension(
    style: &Style,
    ctx: &StyleContext,
    property: StyleProperty,
    dimension: f32,
    auto_dimension: f32,
) -> f32 {
    let value = style.get_numeric(property);

    if value.unit.is_pixelish() {
        return resolve_numeric(&value, ctx);
    }

    match value.unit {
        StyleUnit::Percent => value.value / 100.0 * dimension,
        StyleUnit::Auto | StyleUnit::Undefined => auto_dimension,
        _ => 0.0,
    }
}

fn transform_origin_axis(value: &StyleValue, ctx: &StyleContext, extent: f32) -> f32 {
    if value.unit.is_pixelish() {
        return resolve_numeric(value, ctx);
    }

    match value.unit {
        StyleUnit::Percent => value.value / 100.0 * extent,
        StyleUnit::Anchor => match value.anchor() {
            Some(StyleAnchor::Right | StyleAnchor::Bottom) => extent,
            Some(StyleAnchor::Center) => extent * 0.5,
            _ => 0.0,
        },
        _ => extent * 0.5,
    }
}

fn translate_axis(value: &StyleValue, ctx: &StyleContext, extent: f32) -> f32 {
    if value.unit.is_pixelish() {
        return resolve_numeric(value, ctx);
    }

    match value.unit {
        StyleUnit::Percent => value.value / 100.0 * extent,
        _ => 0.0,
    }
}

// The parser tags bare numbers as px, so px is a plain factor here.
fn scale_factor(value: &StyleValue) -> f32 {
    match value.unit {
        StyleUnit::Px => value.value,
        StyleUnit::Percent => value.value / 100.0,
        _ => 1.0,
    }
}

fn angle_radians(value: &StyleValue) -> f32 {
    match value.unit {
        StyleUnit::Px | StyleUnit::Rad => value.value,
        StyleUnit::Deg => value.value * PI / 180.0,
        StyleUnit::Grad => value.value * PI / 200.0,
        StyleUnit::Turn => value.value * 2.0 * PI,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::style::parse::parse_transform;
    use pretty_assertions::assert_eq;

    fn ctx() -> StyleContext {
        StyleContext::new(1280.0, 720.0, 20.0)
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn unit_table() {
        let ctx = ctx();
        let r = |unit, v| resolve_numeric(&StyleValue::new(unit, v), &ctx);

        assert_eq!(r(StyleUnit::Px, 10.0), 10.0);
        assert!(approx(r(StyleUnit::Pt, 12.0), 16.0));
        assert_eq!(r(StyleUnit::Rem, 2.0), 40.0);
        assert_eq!(r(StyleUnit::Vw, 50.0), 640.0);
        assert_eq!(r(StyleUnit::Vh, 50.0), 360.0);
        assert_eq!(r(StyleUnit::Vmin, 10.0), 72.0);
        assert_eq!(r(StyleUnit::Vmax, 10.0), 128.0);
        assert!(r(StyleUnit::Percent, 10.0).is_nan());
        assert_eq!(resolve_numeric_or(&StyleValue::AUTO, &ctx, 3.0), 3.0);
    }

    #[test]
    fn opacity_is_clamped_and_defaults_to_one() {
        let mut style = Style::new();
        assert_eq!(resolve_opacity(&style), 1.0);

        style.set_numeric(StyleProperty::Opacity, StyleValue::percent(50.0)).unwrap();
        assert_eq!(resolve_opacity(&style), 0.5);
    }

    #[test]
    fn max_lines_reads_its_own_property() {
        let mut style = Style::new();
        style.set_numeric(StyleProperty::FontSize, StyleValue::px(30.0)).unwrap();
        assert_eq!(compute_max_lines(&style), 0);

        style.set_numeric(StyleProperty::MaxLines, StyleValue::px(2.0)).unwrap();
        assert_eq!(compute_max_lines(&style), 2);
    }

    #[test]
    fn corner_radius_falls_back_to_shorthand() {
        let mut style = Style::new();
        style.set_numeric(StyleProperty::BorderRadius, StyleValue::px(4.0)).unwrap();
        style.set_numeric(StyleProperty::BorderRadiusTopLeft, StyleValue::px(9.0)).unwrap();

        let radius = compute_border_radius(&style, &ctx());

        assert_eq!(radius.top_left, 9.0);
        assert_eq!(radius.bottom_right, 4.0);
    }

    #[test]
    fn root_font_size_handles_rem_and_unset() {
        let mut style = Style::new();
        assert_eq!(compute_font_size_from_root(&style, &ctx()), 16.0);

        style.set_numeric(StyleProperty::FontSize, StyleValue::new(StyleUnit::Rem, 2.0)).unwrap();
        assert_eq!(compute_font_size_from_root(&style, &ctx()), 32.0);

        style.set_numeric(StyleProperty::FontSize, StyleValue::px(24.0)).unwrap();
        assert_eq!(compute_font_size_from_root(&style, &ctx()), 24.0);
    }

    #[test]
    fn rotation_about_default_center() {
        let mut style = Style::new();
        style
            .set_transform(StyleProperty::Transform, parse_transform("rotate(180deg)").unwrap())
            .unwrap();

        let m = compute_transform(&style, &ctx(), &RectF::new(0.0, 0.0, 100.0, 50.0));
        let (x, y) = m.map_point(0.0, 0.0);

        assert!(approx(x, 100.0) && approx(y, 50.0), "{x} {y}");
    }

    #[test]
    fn contain_letterboxes_and_centers() {
        let mut style = Style::new();
        style.set_enum(StyleProperty::ObjectFit, ObjectFit::Contain as i32).unwrap();

        let rect = compute_object_fit(&style, &ctx(), &RectF::new(0.0, 0.0, 100.0, 100.0), 200.0, 100.0);

        assert_eq!(rect, RectF::new(0.0, 25.0, 100.0, 50.0));
    }

    #[test]
    fn object_position_anchor_right() {
        let mut style = Style::new();
        style.set_enum(StyleProperty::ObjectFit, ObjectFit::None as i32).unwrap();
        style
            .set_numeric(StyleProperty::ObjectPositionX, StyleValue::anchor_value(StyleAnchor::Right))
            .unwrap();
        style
            .set_numeric(StyleProperty::ObjectPositionY, StyleValue::anchor_value(StyleAnchor::Top))
            .unwrap();

        let rect = compute_object_fit(&style, &ctx(), &RectF::new(10.0, 10.0, 100.0, 100.0), 20.0, 20.0);

        assert_eq!(rect, RectF::new(90.0, 10.0, 20.0, 20.0));
    }

    #[test]
    fn background_defaults_to_natural_size_at_origin() {
        let style = Style::new();
        let rect = compute_background_fit(&style, &ctx(), &RectF::new(5.0, 5.0, 100.0, 100.0), 30.0, 40.0);

        assert_eq!(rect, RectF::new(5.0, 5.0, 30.0, 40.0));
    }
}
