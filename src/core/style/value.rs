use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::color::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum StyleUnit {
    Undefined = 0,
    Px = 1,
    Pt = 2,
    Percent = 3,
    Auto = 4,
    Anchor = 5,
    Rem = 6,
    Vmin = 7,
    Vmax = 8,
    Vw = 9,
    Vh = 10,
    Deg = 11,
    Rad = 12,
    Grad = 13,
    Turn = 14,
}

impl StyleUnit {
    pub fn is_viewport(self) -> bool {
        matches!(self, StyleUnit::Vw | StyleUnit::Vh | StyleUnit::Vmin | StyleUnit::Vmax)
    }

    /// Units that resolve to pixels without a reference box.
    pub fn is_pixelish(self) -> bool {
        matches!(self, StyleUnit::Px | StyleUnit::Pt | StyleUnit::Rem) || self.is_viewport()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StyleAnchor {
    Top = 0,
    Right = 1,
    Bottom = 2,
    Left = 3,
    Center = 4,
}

impl StyleAnchor {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(StyleAnchor::Top),
            1 => Some(StyleAnchor::Right),
            2 => Some(StyleAnchor::Bottom),
            3 => Some(StyleAnchor::Left),
            4 => Some(StyleAnchor::Center),
            _ => None,
        }
    }
}

/// A numeric style value: magnitude plus unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StyleValue {
    pub unit: StyleUnit,
    pub value: f32,
}

impl StyleValue {
    pub const UNDEFINED: StyleValue = StyleValue {
        unit: StyleUnit::Undefined,
        value: f32::NAN,
    };
    pub const AUTO: StyleValue = StyleValue {
        unit: StyleUnit::Auto,
        value: f32::NAN,
    };

    pub const fn new(unit: StyleUnit, value: f32) -> Self {
        Self { unit, value }
    }

    pub const fn px(value: f32) -> Self {
        Self::new(StyleUnit::Px, value)
    }

    pub const fn percent(value: f32) -> Self {
        Self::new(StyleUnit::Percent, value)
    }

    pub fn anchor_value(anchor: StyleAnchor) -> Self {
        Self::new(StyleUnit::Anchor, anchor as i32 as f32)
    }

    pub fn is_undefined(&self) -> bool {
        self.unit == StyleUnit::Undefined
    }

    pub fn anchor(&self) -> Option<StyleAnchor> {
        if self.unit == StyleUnit::Anchor {
            StyleAnchor::from_i32(self.value as i32)
        } else {
            None
        }
    }
}

impl Default for StyleValue {
    fn default() -> Self {
        Self::UNDEFINED
    }
}

impl fmt::Display for StyleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.unit {
            StyleUnit::Undefined => write!(f, "undefined"),
            StyleUnit::Auto => write!(f, "auto"),
            StyleUnit::Anchor => match self.anchor() {
                Some(anchor) => write!(f, "{}", super::meta::ANCHOR_NAMES[anchor as usize]),
                None => write!(f, "anchor({})", self.value),
            },
            StyleUnit::Px => write!(f, "{}px", self.value),
            StyleUnit::Pt => write!(f, "{}pt", self.value),
            StyleUnit::Percent => write!(f, "{}%", self.value),
            StyleUnit::Rem => write!(f, "{}rem", self.value),
            StyleUnit::Vmin => write!(f, "{}vmin", self.value),
            StyleUnit::Vmax => write!(f, "{}vmax", self.value),
            StyleUnit::Vw => write!(f, "{}vw", self.value),
            StyleUnit::Vh => write!(f, "{}vh", self.value),
            StyleUnit::Deg => write!(f, "{}deg", self.value),
            StyleUnit::Rad => write!(f, "{}rad", self.value),
            StyleUnit::Grad => write!(f, "{}grad", self.value),
            StyleUnit::Turn => write!(f, "{}turn", self.value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum StyleTransform {
    Identity,
    Translate { x: StyleValue, y: StyleValue },
    Scale { x: StyleValue, y: StyleValue },
    Rotate { angle: StyleValue },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StyleFilter {
    FlipH,
    FlipV,
    Tint(Color),
}

macro_rules! style_enum {
    ($name:ident, default $default:ident { $( $variant:ident = $value:literal ),* $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $variant = $value, )*
        }

        impl $name {
            /// Out-of-range values map to the property default.
            pub fn from_i32(value: i32) -> Self {
                match value {
                    $( $value => $name::$variant, )*
                    _ => $name::$default,
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }
    };
}

style_enum!(Align, default Auto {
    Auto = 0, FlexStart = 1, Center = 2, FlexEnd = 3, Stretch = 4, Baseline = 5, SpaceBetween = 6, SpaceAround = 7,
});
style_enum!(Display, default Flex { Flex = 0, None = 1 });
style_enum!(FlexDirection, default Column { Column = 0, ColumnReverse = 1, Row = 2, RowReverse = 3 });
style_enum!(Overflow, default Visible { Visible = 0, Hidden = 1, Scroll = 2 });
style_enum!(OverflowWrap, default Normal { Normal = 0, BreakWord = 1 });
style_enum!(Position, default Static { Static = 0, Relative = 1, Absolute = 2 });
style_enum!(FlexWrap, default NoWrap { NoWrap = 0, Wrap = 1, WrapReverse = 2 });
style_enum!(Justify, default FlexStart {
    FlexStart = 0, Center = 1, FlexEnd = 2, SpaceBetween = 3, SpaceAround = 4, SpaceEvenly = 5,
});
style_enum!(FontStyle, default Normal { Normal = 0, Italic = 1, Oblique = 2 });
style_enum!(FontWeight, default Normal { Normal = 0, Bold = 1 });
style_enum!(TextOverflow, default None { None = 0, Clip = 1, Ellipsis = 2 });
style_enum!(TextAlign, default Left { Left = 0, Center = 1, Right = 2 });
style_enum!(ObjectFit, default Fill { Fill = 0, Contain = 1, Cover = 2, None = 3, ScaleDown = 4 });
style_enum!(BackgroundSize, default None { None = 0, Cover = 1, Contain = 2 });
style_enum!(TextTransform, default None { None = 0, Uppercase = 1, Lowercase = 2 });
style_enum!(WhiteSpace, default Normal { Normal = 0, Pre = 1, NoWrap = 2 });
style_enum!(FontKerning, default Normal { Normal = 0, None = 1 });
