//! String forms of style values.

use crate::core::color::Color;

use super::meta::{anchor_from_str, unit_from_postfix, PropertyKind};
use super::{Style, StyleError, StyleFilter, StyleProperty, StyleTransform, StyleUnit, StyleValue};

/// Parses `auto`, an anchor name, or a number with an optional unit suffix.
/// A bare number is px.
pub fn parse_numeric(text: &str) -> Option<StyleValue> {
    let text = text.trim();

    if text.eq_ignore_ascii_case("auto") {
        return Some(StyleValue::AUTO);
    }

    if let Some(anchor) = anchor_from_str(text) {
        return Some(StyleValue::new(StyleUnit::Anchor, anchor as f32));
    }

    let first = text.chars().next()?;

    if !(first == '-' || first == '+' || first == '.' || first.is_ascii_digit()) {
        return None;
    }

    let split = text
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E')))
        .unwrap_or(text.len());
    let (number, suffix) = text.split_at(split);
    let value: f32 = number.parse().ok()?;

    if suffix.is_empty() {
        return Some(StyleValue::px(value));
    }

    unit_from_postfix(suffix).map(|unit| StyleValue::new(unit, value))
}

pub fn parse_color(text: &str) -> Option<Color> {
    Color::parse(text.trim())
}

/// Splits `name(arg, arg) name2 name3()` into function names and raw arguments.
fn functions(text: &str) -> Option<Vec<(&str, Vec<&str>)>> {
    let mut out = Vec::new();
    let mut rest = text.trim_start();

    while !rest.is_empty() {
        let name_end = rest
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(rest.len());
        let (name, tail) = rest.split_at(name_end);

        if name.is_empty() {
            return None;
        }

        let tail = tail.trim_start();

        if let Some(args) = tail.strip_prefix('(') {
            let close = args.find(')')?;
            let inner = args[..close].trim();
            let args_list = if inner.is_empty() {
                Vec::new()
            } else {
                inner.split(',').map(str::trim).collect()
            };

            out.push((name, args_list));
            rest = args[close + 1..].trim_start();
        } else {
            out.push((name, Vec::new()));
            rest = tail;
        }
    }

    Some(out)
}

/// Parses a whitespace separated transform list. The empty string is an
/// empty list.
pub fn parse_transform(text: &str) -> Option<Vec<StyleTransform>> {
    let zero = StyleValue::px(0.0);
    let one = StyleValue::px(1.0);
    let mut out = Vec::new();

    for (name, args) in functions(text)? {
        let values = args.iter().map(|a| parse_numeric(a)).collect::<Option<Vec<_>>>()?;
        let op = match (name.to_ascii_lowercase().as_str(), values.as_slice()) {
            ("identity", []) => StyleTransform::Identity,
            ("translate", [x]) => StyleTransform::Translate { x: *x, y: zero },
            ("translate", [x, y]) => StyleTransform::Translate { x: *x, y: *y },
            ("translatex", [x]) => StyleTransform::Translate { x: *x, y: zero },
            ("translatey", [y]) => StyleTransform::Translate { x: zero, y: *y },
            ("scale", [s]) => StyleTransform::Scale { x: *s, y: *s },
            ("scale", [x, y]) => StyleTransform::Scale { x: *x, y: *y },
            ("scalex", [x]) => StyleTransform::Scale { x: *x, y: one },
            ("scaley", [y]) => StyleTransform::Scale { x: one, y: *y },
            ("rotate", [angle]) => StyleTransform::Rotate { angle: *angle },
            _ => return None,
        };

        out.push(op);
    }

    Some(out)
}

pub fn parse_filter(text: &str) -> Option<Vec<StyleFilter>> {
    let mut out = Vec::new();

    for (name, args) in functions(text)? {
        let filter = match (name.to_ascii_lowercase().as_str(), args.as_slice()) {
            ("fliph", []) => StyleFilter::FlipH,
            ("flipv", []) => StyleFilter::FlipV,
            ("tint", [color]) => StyleFilter::Tint(parse_color(color)?),
            _ => return None,
        };

        out.push(filter);
    }

    Some(out)
}

impl Style {
    /// Sets a property from its string form. On any failure the style is
    /// left untouched.
    pub fn set_from_string(&mut self, property: StyleProperty, text: &str) -> Result<(), StyleError> {
        match property.kind() {
            PropertyKind::Number => {
                let value = parse_numeric(text).ok_or_else(|| StyleError::value(property, text))?;
                self.set_numeric(property, value)
            }
            PropertyKind::Enum => {
                let value = property
                    .enum_from_str(text.trim())
                    .ok_or_else(|| StyleError::value(property, text))?;
                self.set_enum(property, value)
            }
            PropertyKind::Color => {
                let color = parse_color(text).ok_or_else(|| StyleError::value(property, text))?;
                self.set_color(property, color)
            }
            PropertyKind::String => self.set_string(property, text),
            PropertyKind::Transform => {
                let ops = parse_transform(text).ok_or_else(|| StyleError::value(property, text))?;
                self.set_transform(property, ops)
            }
            PropertyKind::Filter => {
                let ops = parse_filter(text).ok_or_else(|| StyleError::value(property, text))?;
                self.set_filter(property, ops)
            }
        }
    }

    /// Name based variant of [`Style::set_from_string`].
    pub fn set_named_from_string(&mut self, name: &str, text: &str) -> Result<(), StyleError> {
        let property = StyleProperty::from_name(name).ok_or_else(|| StyleError::UnknownProperty(name.to_string()))?;

        self.set_from_string(property, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn numeric_forms() {
        assert_eq!(parse_numeric("100px"), Some(StyleValue::px(100.0)));
        assert_eq!(parse_numeric("100"), Some(StyleValue::px(100.0)));
        assert_eq!(parse_numeric("100%"), Some(StyleValue::percent(100.0)));
        assert_eq!(parse_numeric("-.5REM"), Some(StyleValue::new(StyleUnit::Rem, -0.5)));
        assert_eq!(parse_numeric("center"), Some(StyleValue::new(StyleUnit::Anchor, 4.0)));
        assert_eq!(parse_numeric("AUTO").map(|v| v.unit), Some(StyleUnit::Auto));
        assert_eq!(parse_numeric("100uy"), None);
        assert_eq!(parse_numeric("autox"), None);
        assert_eq!(parse_numeric("px"), None);
        assert_eq!(parse_numeric(""), None);
    }

    #[test]
    fn failed_parse_leaves_style_untouched() {
        let mut style = Style::new();
        style.set_from_string(StyleProperty::Width, "10px").unwrap();

        assert!(style.set_from_string(StyleProperty::Width, "100uy").is_err());
        assert!(style.set_from_string(StyleProperty::Color, "#QIPOQII").is_err());
        assert!(style.set_from_string(StyleProperty::Display, "grid").is_err());
        assert_eq!(style.get_numeric(StyleProperty::Width), StyleValue::px(10.0));
        assert!(!style.has_property(StyleProperty::Color));
    }

    #[test]
    fn transform_lists() {
        let ops = parse_transform("translate(10px, 50%) rotate(90deg) scaleX(2)").unwrap();

        assert_eq!(
            ops,
            vec![
                StyleTransform::Translate {
                    x: StyleValue::px(10.0),
                    y: StyleValue::percent(50.0)
                },
                StyleTransform::Rotate {
                    angle: StyleValue::new(StyleUnit::Deg, 90.0)
                },
                StyleTransform::Scale {
                    x: StyleValue::px(2.0),
                    y: StyleValue::px(1.0)
                },
            ]
        );
        assert!(parse_transform("").unwrap().is_empty());
        assert_eq!(parse_transform("identity").unwrap(), vec![StyleTransform::Identity]);
        assert_eq!(parse_transform("skew(10deg)"), None);
        assert_eq!(parse_transform("rotate(10deg"), None);
    }

    #[test]
    fn filter_lists() {
        let filters = parse_filter("flipH tint(red) flipV()").unwrap();

        assert_eq!(
            filters,
            vec![StyleFilter::FlipH, StyleFilter::Tint(Color(0xFF00_00FF)), StyleFilter::FlipV]
        );
        assert_eq!(parse_filter("tint(nope)"), None);
    }

    #[test]
    fn named_setter_rejects_unknown_properties() {
        let mut style = Style::new();

        assert_eq!(
            style.set_named_from_string("colour", "red"),
            Err(StyleError::UnknownProperty("colour".to_string()))
        );
        style.set_named_from_string("objectFit", "cover").unwrap();
        assert_eq!(style.get_enum(StyleProperty::ObjectFit), 2);
    }

    proptest! {
        #[test]
        fn px_values_parse_back(v in -10_000i32..10_000) {
            let parsed = parse_numeric(&format!("{v}px")).unwrap();
            prop_assert_eq!(parsed, StyleValue::px(v as f32));
        }
    }
}
