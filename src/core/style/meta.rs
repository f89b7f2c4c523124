//! Static style property metadata: names, value kinds, enum string tables,
//! accepted units and numeric ranges. Generated table data; keep edits mechanical.

use serde::{Deserialize, Serialize};

use super::{StyleUnit, StyleValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyKind {
    Number,
    Enum,
    Color,
    String,
    Filter,
    Transform,
}

macro_rules! style_properties {
    ($( $variant:ident = $name:literal, $kind:ident, $layout:literal, $enums:expr; )*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[repr(u8)]
        pub enum StyleProperty {
            $( $variant, )*
        }

        impl StyleProperty {
            pub const ALL: &'static [StyleProperty] = &[ $( StyleProperty::$variant, )* ];
        }

        const PROPERTY_INFO: &[PropertyInfo] = &[
            $( PropertyInfo { name: $name, kind: PropertyKind::$kind, layout: $layout, enum_values: $enums }, )*
        ];
    };
}

#[derive(Debug, Clone, Copy)]
pub struct PropertyInfo {
    pub name: &'static str,
    pub kind: PropertyKind,
    pub layout: bool,
    pub enum_values: &'static [&'static str],
}

const NONE: &[&str] = &[];
const ALIGN: &[&str] = &[
    "auto", "flex-start", "center", "flex-end", "stretch", "baseline", "space-between", "space-around",
];
const DISPLAY: &[&str] = &["flex", "none"];
const FLEX_DIRECTION: &[&str] = &["column", "column-reverse", "row", "row-reverse"];
const OVERFLOW: &[&str] = &["visible", "hidden", "scroll"];
const OVERFLOW_WRAP: &[&str] = &["normal", "break-word"];
const POSITION: &[&str] = &["static", "relative", "absolute"];
const WRAP: &[&str] = &["no-wrap", "wrap", "wrap-reverse"];
const JUSTIFY: &[&str] = &["flex-start", "center", "flex-end", "space-between", "space-around", "space-evenly"];
const FONT_STYLE: &[&str] = &["normal", "italic", "oblique"];
const FONT_WEIGHT: &[&str] = &["normal", "bold"];
const TEXT_OVERFLOW: &[&str] = &["none", "clip", "ellipsis"];
const TEXT_ALIGN: &[&str] = &["left", "center", "right"];
const OBJECT_FIT: &[&str] = &["fill", "contain", "cover", "none", "scale-down"];
const BACKGROUND_SIZE: &[&str] = &["none", "cover", "contain"];
const TEXT_TRANSFORM: &[&str] = &["none", "uppercase", "lowercase"];
const WHITE_SPACE: &[&str] = &["normal", "pre", "no-wrap"];
const FONT_KERNING: &[&str] = &["normal", "none"];

pub const ANCHOR_NAMES: &[&str] = &["top", "right", "bottom", "left", "center"];

style_properties! {
    AlignItems = "alignItems", Enum, true, ALIGN;
    AlignContent = "alignContent", Enum, true, ALIGN;
    AlignSelf = "alignSelf", Enum, true, ALIGN;
    Border = "border", Number, true, NONE;
    BorderBottom = "borderBottom", Number, true, NONE;
    BorderLeft = "borderLeft", Number, true, NONE;
    BorderRight = "borderRight", Number, true, NONE;
    BorderTop = "borderTop", Number, true, NONE;
    Bottom = "bottom", Number, true, NONE;
    Display = "display", Enum, true, DISPLAY;
    Flex = "flex", Number, true, NONE;
    FlexBasis = "flexBasis", Number, true, NONE;
    FlexDirection = "flexDirection", Enum, true, FLEX_DIRECTION;
    FlexGrow = "flexGrow", Number, true, NONE;
    FlexShrink = "flexShrink", Number, true, NONE;
    FlexWrap = "flexWrap", Enum, true, WRAP;
    Height = "height", Number, true, NONE;
    JustifyContent = "justifyContent", Enum, true, JUSTIFY;
    Left = "left", Number, true, NONE;
    Margin = "margin", Number, true, NONE;
    MarginBottom = "marginBottom", Number, true, NONE;
    MarginLeft = "marginLeft", Number, true, NONE;
    MarginRight = "marginRight", Number, true, NONE;
    MarginTop = "marginTop", Number, true, NONE;
    MaxHeight = "maxHeight", Number, true, NONE;
    MaxWidth = "maxWidth", Number, true, NONE;
    MinHeight = "minHeight", Number, true, NONE;
    MinWidth = "minWidth", Number, true, NONE;
    Overflow = "overflow", Enum, true, OVERFLOW;
    Padding = "padding", Number, true, NONE;
    PaddingBottom = "paddingBottom", Number, true, NONE;
    PaddingLeft = "paddingLeft", Number, true, NONE;
    PaddingRight = "paddingRight", Number, true, NONE;
    PaddingTop = "paddingTop", Number, true, NONE;
    Position = "position", Enum, true, POSITION;
    Right = "right", Number, true, NONE;
    Top = "top", Number, true, NONE;
    Width = "width", Number, true, NONE;
    BackgroundColor = "backgroundColor", Color, false, NONE;
    BackgroundHeight = "backgroundHeight", Number, false, NONE;
    BackgroundImage = "backgroundImage", String, false, NONE;
    BackgroundPositionX = "backgroundPositionX", Number, false, NONE;
    BackgroundPositionY = "backgroundPositionY", Number, false, NONE;
    BackgroundSize = "backgroundSize", Enum, false, BACKGROUND_SIZE;
    BackgroundWidth = "backgroundWidth", Number, false, NONE;
    BorderColor = "borderColor", Color, false, NONE;
    BorderRadius = "borderRadius", Number, false, NONE;
    BorderRadiusTopLeft = "borderRadiusTopLeft", Number, false, NONE;
    BorderRadiusTopRight = "borderRadiusTopRight", Number, false, NONE;
    BorderRadiusBottomLeft = "borderRadiusBottomLeft", Number, false, NONE;
    BorderRadiusBottomRight = "borderRadiusBottomRight", Number, false, NONE;
    Color = "color", Color, false, NONE;
    Filter = "filter", Filter, false, NONE;
    FontFamily = "fontFamily", String, false, NONE;
    FontKerning = "fontKerning", Enum, false, FONT_KERNING;
    FontSize = "fontSize", Number, false, NONE;
    FontStyle = "fontStyle", Enum, false, FONT_STYLE;
    FontWeight = "fontWeight", Enum, false, FONT_WEIGHT;
    MaxLines = "maxLines", Number, false, NONE;
    ObjectFit = "objectFit", Enum, false, OBJECT_FIT;
    ObjectPositionX = "objectPositionX", Number, false, NONE;
    ObjectPositionY = "objectPositionY", Number, false, NONE;
    Opacity = "opacity", Number, false, NONE;
    OverflowWrap = "overflowWrap", Enum, false, OVERFLOW_WRAP;
    TextAlign = "textAlign", Enum, false, TEXT_ALIGN;
    TextOverflow = "textOverflow", Enum, false, TEXT_OVERFLOW;
    TextTransform = "textTransform", Enum, false, TEXT_TRANSFORM;
    Transform = "transform", Transform, false, NONE;
    TransformOriginX = "transformOriginX", Number, false, NONE;
    TransformOriginY = "transformOriginY", Number, false, NONE;
    WhiteSpace = "whiteSpace", Enum, false, WHITE_SPACE;
}

impl StyleProperty {
    pub fn from_index(index: i32) -> Option<StyleProperty> {
        usize::try_from(index).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn from_name(name: &str) -> Option<StyleProperty> {
        Self::ALL.iter().copied().find(|p| p.name() == name)
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn info(self) -> &'static PropertyInfo {
        &PROPERTY_INFO[self.index()]
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }

    pub fn kind(self) -> PropertyKind {
        self.info().kind
    }

    pub fn is_layout(self) -> bool {
        self.info().layout
    }

    pub fn is_enum_value(self, value: i32) -> bool {
        self.kind() == PropertyKind::Enum && value >= 0 && (value as usize) < self.info().enum_values.len()
    }

    pub fn enum_from_str(self, text: &str) -> Option<i32> {
        self.info()
            .enum_values
            .iter()
            .position(|v| v.eq_ignore_ascii_case(text))
            .map(|i| i as i32)
    }

    pub fn enum_to_str(self, value: i32) -> Option<&'static str> {
        if self.is_enum_value(value) {
            Some(self.info().enum_values[value as usize])
        } else {
            None
        }
    }

    /// Whether `value` has an accepted unit and magnitude for this property.
    pub fn is_valid_numeric(self, value: &StyleValue) -> bool {
        use StyleProperty::*;

        let unit = value.unit;

        match self {
            Border | BorderBottom | BorderLeft | BorderRight | BorderTop | Flex | FlexGrow | FlexShrink
            | BorderRadius | BorderRadiusTopLeft | BorderRadiusTopRight | BorderRadiusBottomLeft
            | BorderRadiusBottomRight | FontSize => has_unit(unit, PIXELISH) && is_gte0(value),
            Bottom | Left | Right | Top => has_unit(unit, PIXELISH | PERCENT),
            Margin | MarginBottom | MarginLeft | MarginRight | MarginTop => has_unit(unit, PIXELISH | PERCENT | AUTO),
            Padding | PaddingBottom | PaddingLeft | PaddingRight | PaddingTop => has_unit(unit, PIXELISH | PERCENT),
            Width | Height | FlexBasis | BackgroundWidth | BackgroundHeight => {
                has_unit(unit, PIXELISH | PERCENT | AUTO) && is_gte0(value)
            }
            MaxHeight | MaxWidth | MinHeight | MinWidth => has_unit(unit, PIXELISH | PERCENT) && is_gte0(value),
            MaxLines => has_unit(unit, PX) && is_gte0(value),
            Opacity => is_opacity(value),
            BackgroundPositionX | ObjectPositionX | TransformOriginX => {
                has_unit(unit, PIXELISH | PERCENT | AUTO | ANCHOR) && is_x_anchor(value)
            }
            BackgroundPositionY | ObjectPositionY | TransformOriginY => {
                has_unit(unit, PIXELISH | PERCENT | AUTO | ANCHOR) && is_y_anchor(value)
            }
            _ => false,
        }
    }
}

const fn bit(unit: StyleUnit) -> u32 {
    1 << unit as u32
}

const PX: u32 = bit(StyleUnit::Px);
const PERCENT: u32 = bit(StyleUnit::Percent);
const AUTO: u32 = bit(StyleUnit::Auto);
const ANCHOR: u32 = bit(StyleUnit::Anchor);
const PIXELISH: u32 = bit(StyleUnit::Px)
    | bit(StyleUnit::Pt)
    | bit(StyleUnit::Vmin)
    | bit(StyleUnit::Vmax)
    | bit(StyleUnit::Vw)
    | bit(StyleUnit::Vh)
    | bit(StyleUnit::Rem);

fn has_unit(unit: StyleUnit, mask: u32) -> bool {
    bit(unit) & mask != 0
}

fn is_gte0(value: &StyleValue) -> bool {
    value.unit == StyleUnit::Auto || value.value >= 0.0
}

fn is_x_anchor(value: &StyleValue) -> bool {
    if value.unit != StyleUnit::Anchor {
        return true;
    }

    matches!(value.anchor(), Some(super::StyleAnchor::Left | super::StyleAnchor::Right | super::StyleAnchor::Center))
}

fn is_y_anchor(value: &StyleValue) -> bool {
    if value.unit != StyleUnit::Anchor {
        return true;
    }

    matches!(value.anchor(), Some(super::StyleAnchor::Top | super::StyleAnchor::Bottom | super::StyleAnchor::Center))
}

fn is_opacity(value: &StyleValue) -> bool {
    match value.unit {
        StyleUnit::Px => (0.0..=1.0).contains(&value.value),
        StyleUnit::Percent => (0.0..=100.0).contains(&value.value),
        _ => false,
    }
}

pub fn unit_from_postfix(text: &str) -> Option<StyleUnit> {
    const POSTFIX: &[(&str, StyleUnit)] = &[
        ("px", StyleUnit::Px),
        ("pt", StyleUnit::Pt),
        ("%", StyleUnit::Percent),
        ("rem", StyleUnit::Rem),
        ("vmin", StyleUnit::Vmin),
        ("vmax", StyleUnit::Vmax),
        ("vw", StyleUnit::Vw),
        ("vh", StyleUnit::Vh),
        ("deg", StyleUnit::Deg),
        ("rad", StyleUnit::Rad),
        ("grad", StyleUnit::Grad),
        ("turn", StyleUnit::Turn),
    ];

    POSTFIX
        .iter()
        .find(|(postfix, _)| postfix.eq_ignore_ascii_case(text))
        .map(|&(_, unit)| unit)
}

pub fn anchor_from_str(text: &str) -> Option<i32> {
    ANCHOR_NAMES
        .iter()
        .position(|name| name.eq_ignore_ascii_case(text))
        .map(|i| i as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_matches_property_count() {
        assert_eq!(StyleProperty::ALL.len(), 71);
        assert_eq!(PROPERTY_INFO.len(), 71);
        assert_eq!(StyleProperty::WhiteSpace.index(), 70);
        assert_eq!(StyleProperty::from_index(37), Some(StyleProperty::Width));
        assert_eq!(StyleProperty::from_index(71), None);
    }

    #[test]
    fn layout_properties_are_the_leading_block() {
        for prop in StyleProperty::ALL {
            assert_eq!(prop.is_layout(), prop.index() <= 37, "{}", prop.name());
        }
    }

    #[test]
    fn enum_strings_are_case_insensitive() {
        assert_eq!(StyleProperty::ObjectFit.enum_from_str("Scale-Down"), Some(4));
        assert_eq!(StyleProperty::ObjectFit.enum_to_str(1), Some("contain"));
        assert_eq!(StyleProperty::Display.enum_from_str("grid"), None);
        assert!(!StyleProperty::Width.is_enum_value(0));
    }

    #[test]
    fn position_coordinates_accept_lengths_and_matching_anchors() {
        let right = StyleValue::new(StyleUnit::Anchor, 1.0);
        let top = StyleValue::new(StyleUnit::Anchor, 0.0);

        assert!(StyleProperty::ObjectPositionX.is_valid_numeric(&StyleValue::px(10.0)));
        assert!(StyleProperty::ObjectPositionX.is_valid_numeric(&right));
        assert!(!StyleProperty::ObjectPositionX.is_valid_numeric(&top));
        assert!(StyleProperty::ObjectPositionY.is_valid_numeric(&top));
    }

    #[test]
    fn ranges_are_enforced() {
        assert!(!StyleProperty::Width.is_valid_numeric(&StyleValue::px(-1.0)));
        assert!(StyleProperty::Left.is_valid_numeric(&StyleValue::px(-1.0)));
        assert!(!StyleProperty::Opacity.is_valid_numeric(&StyleValue::px(2.0)));
        assert!(StyleProperty::Opacity.is_valid_numeric(&StyleValue::new(StyleUnit::Percent, 50.0)));
        assert!(!StyleProperty::Border.is_valid_numeric(&StyleValue::new(StyleUnit::Percent, 5.0)));
        assert!(!StyleProperty::MaxLines.is_valid_numeric(&StyleValue::new(StyleUnit::Rem, 1.0)));
        assert!(!StyleProperty::BackgroundColor.is_valid_numeric(&StyleValue::px(1.0)));
    }
}
