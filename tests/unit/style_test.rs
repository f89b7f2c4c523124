use lse_engine::core::color::Color;
use lse_engine::core::geometry::RectF;
use lse_engine::core::style::compute::{
    compute_border_radius, compute_font_size, compute_font_size_from_root, compute_max_lines, compute_object_fit,
    resolve_numeric, resolve_opacity,
};
use lse_engine::core::style::parse::parse_numeric;
use lse_engine::core::style::{ObjectFit, WhiteSpace};
use lse_engine::{Status, Style, StyleContext, StyleError, StyleProperty, StyleUnit, StyleValue};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn ctx() -> StyleContext {
    StyleContext::new(800.0, 600.0, 16.0)
}

#[test]
fn test_units_resolve_against_context() {
    let ctx = ctx();

    assert_eq!(resolve_numeric(&StyleValue::px(12.0), &ctx), 12.0);
    assert_eq!(resolve_numeric(&StyleValue::new(StyleUnit::Rem, 2.0), &ctx), 32.0);
    assert_eq!(resolve_numeric(&StyleValue::new(StyleUnit::Vw, 50.0), &ctx), 400.0);
    assert_eq!(resolve_numeric(&StyleValue::new(StyleUnit::Vh, 10.0), &ctx), 60.0);
    assert_eq!(resolve_numeric(&StyleValue::new(StyleUnit::Vmin, 100.0), &ctx), 600.0);
    assert_eq!(resolve_numeric(&StyleValue::new(StyleUnit::Vmax, 100.0), &ctx), 800.0);
    assert!(resolve_numeric(&StyleValue::percent(50.0), &ctx).is_nan());
    assert!(resolve_numeric(&StyleValue::AUTO, &ctx).is_nan());
}

#[test]
fn test_invalid_values_are_rejected_with_status() {
    let mut style = Style::new();

    let err = style.set_numeric(StyleProperty::Width, StyleValue::px(-1.0)).unwrap_err();
    assert_eq!(err.status(), Status::StyleValue);

    let err = style.set_numeric(StyleProperty::Opacity, StyleValue::px(1.5)).unwrap_err();
    assert_eq!(err.status(), Status::StyleValue);

    let err = style.set_color(StyleProperty::Width, Color::WHITE).unwrap_err();
    assert_eq!(err.status(), Status::StyleProperty);

    let err = style.set_named_from_string("colour", "red").unwrap_err();
    assert_eq!(err, StyleError::UnknownProperty("colour".to_string()));

    // x anchors only on the x axis
    assert!(style.set_named_from_string("objectPositionX", "top").is_err());
    style.set_named_from_string("objectPositionX", "right").unwrap();
    style.set_named_from_string("objectPositionY", "bottom").unwrap();

    assert!(style.set_numeric(StyleProperty::Margin, StyleValue::AUTO).is_ok());
    assert!(style.set_numeric(StyleProperty::Padding, StyleValue::AUTO).is_err());
}

#[test]
fn test_class_chain_resolves_and_guards_cycles() {
    let mut base = Style::new_class();
    base.set_named_from_string("color", "#00ff00").unwrap();
    base.set_named_from_string("fontSize", "20px").unwrap();
    let base = base.into_ref();

    let mut theme = Style::new_class();
    theme.set_named_from_string("fontSize", "24px").unwrap();
    theme.set_parent(Some(base.clone())).unwrap();
    let theme = theme.into_ref();

    let mut style = Style::new();
    style.set_parent(Some(theme.clone())).unwrap();

    assert_eq!(style.get_color(StyleProperty::Color), Color(0x00FF_00FF));
    assert_eq!(style.get_numeric(StyleProperty::FontSize), StyleValue::px(24.0));
    assert!(style.has_property(StyleProperty::Color));
    assert!(!style.has_local_property(StyleProperty::Color));

    // instance styles cannot be parents
    let other = Style::new().into_ref();
    assert_eq!(style.set_parent(Some(other)), Err(StyleError::NotClass));

    // base -> theme -> base
    let err = base.borrow_mut().set_parent(Some(theme.clone())).unwrap_err();
    assert_eq!(err, StyleError::Cycle);
    assert_eq!(err.status(), Status::IllegalArgument);

    style.set_parent(None).unwrap();
    assert_eq!(style.get_color(StyleProperty::Color), Color::TRANSPARENT);
}

#[test]
fn test_locked_style_refuses_writes() {
    let mut style = Style::new_class();
    style.set_named_from_string("width", "10px").unwrap();
    style.lock();

    assert_eq!(style.set_named_from_string("width", "20px"), Err(StyleError::Locked));
    assert_eq!(style.unset(StyleProperty::Width), Err(StyleError::Locked));
    assert_eq!(style.reset(), Err(StyleError::Locked));
    assert_eq!(style.get_numeric(StyleProperty::Width), StyleValue::px(10.0));
}

#[test]
fn test_unset_and_reset() {
    let mut style = Style::new();
    style.set_named_from_string("width", "10px").unwrap();
    style.set_named_from_string("height", "10%").unwrap();

    assert_eq!(style.unset(StyleProperty::Width), Ok(true));
    assert_eq!(style.unset(StyleProperty::Width), Ok(false));
    assert!(style.get_numeric(StyleProperty::Width).is_undefined());

    style.reset().unwrap();
    assert_eq!(style.local_properties().count(), 0);
}

#[test]
fn test_font_size_from_root_uses_default_for_rem() {
    let ctx = StyleContext::new(100.0, 100.0, 30.0);
    let mut root = Style::new();

    assert_eq!(compute_font_size_from_root(&root, &ctx), 16.0);

    root.set_named_from_string("fontSize", "2rem").unwrap();
    assert_eq!(compute_font_size_from_root(&root, &ctx), 32.0);

    let mut text = Style::new();
    text.set_named_from_string("fontSize", "2rem").unwrap();
    assert_eq!(compute_font_size(&text, &ctx), 60.0);
}

#[test]
fn test_max_lines_reads_its_own_property() {
    let mut style = Style::new();
    style.set_named_from_string("fontSize", "40px").unwrap();

    assert_eq!(compute_max_lines(&style), 0);

    style.set_named_from_string("maxLines", "3").unwrap();
    assert_eq!(compute_max_lines(&style), 3);
}

#[test]
fn test_border_radius_corners_override_shorthand() {
    let mut style = Style::new();
    style.set_named_from_string("borderRadius", "8px").unwrap();
    style.set_named_from_string("borderRadiusTopLeft", "2px").unwrap();

    let radius = compute_border_radius(&style, &ctx());

    assert_eq!(radius.top_left, 2.0);
    assert_eq!(radius.top_right, 8.0);
    assert_eq!(radius.bottom_left, 8.0);
    assert_eq!(radius.bottom_right, 8.0);
    assert!(radius.any());
}

#[test]
fn test_opacity_accepts_fraction_and_percent() {
    let mut style = Style::new();
    assert_eq!(resolve_opacity(&style), 1.0);

    style.set_named_from_string("opacity", "0.25").unwrap();
    assert_eq!(resolve_opacity(&style), 0.25);

    style.set_named_from_string("opacity", "50%").unwrap();
    assert_eq!(resolve_opacity(&style), 0.5);
}

#[test]
fn test_object_fit_modes() {
    let bounds = RectF::new(10.0, 10.0, 100.0, 50.0);
    let ctx = ctx();
    let mut style = Style::new();

    assert_eq!(compute_object_fit(&style, &ctx, &bounds, 20.0, 20.0), bounds);

    style.set_named_from_string("objectFit", "contain").unwrap();
    assert_eq!(
        compute_object_fit(&style, &ctx, &bounds, 20.0, 20.0),
        RectF::new(35.0, 10.0, 50.0, 50.0)
    );

    style.set_named_from_string("objectFit", "cover").unwrap();
    assert_eq!(
        compute_object_fit(&style, &ctx, &bounds, 20.0, 20.0),
        RectF::new(10.0, -15.0, 100.0, 100.0)
    );

    style.set_named_from_string("objectFit", "scale-down").unwrap();
    assert_eq!(
        compute_object_fit(&style, &ctx, &bounds, 20.0, 20.0),
        RectF::new(50.0, 25.0, 20.0, 20.0)
    );

    style.set_named_from_string("objectPositionX", "left").unwrap();
    style.set_named_from_string("objectPositionY", "0px").unwrap();
    assert_eq!(
        compute_object_fit(&style, &ctx, &bounds, 20.0, 20.0),
        RectF::new(10.0, 10.0, 20.0, 20.0)
    );

    assert_eq!(ObjectFit::from_i32(style.get_enum(StyleProperty::ObjectFit)), ObjectFit::ScaleDown);
}

#[test]
fn test_white_space_keywords() {
    let mut style = Style::new();

    for (text, expected) in [("pre", WhiteSpace::Pre), ("no-wrap", WhiteSpace::NoWrap), ("normal", WhiteSpace::Normal)] {
        style.set_named_from_string("whiteSpace", text).unwrap();
        assert_eq!(WhiteSpace::from_i32(style.get_enum(StyleProperty::WhiteSpace)), expected);
    }

    assert!(style.set_named_from_string("whiteSpace", "nowrap").is_err());
}

proptest! {
    #[test]
    fn prop_px_values_parse_exactly(value in 0u32..100_000) {
        let text = format!("{}px", value);
        prop_assert_eq!(parse_numeric(&text), Some(StyleValue::px(value as f32)));
    }

    #[test]
    fn prop_non_negative_widths_are_accepted(value in 0.0f32..10_000.0) {
        let mut style = Style::new();
        prop_assert!(style.set_numeric(StyleProperty::Width, StyleValue::px(value)).is_ok());
        prop_assert_eq!(style.get_numeric(StyleProperty::Width), StyleValue::px(value));
    }
}
