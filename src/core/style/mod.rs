//! Style storage and cascade.
//!
//! A [`Style`] is a sparse property table. Instance styles belong to exactly
//! one node and may delegate unset properties to a chain of class styles.
//! Mutations on a bound style queue the changed property; the owning window
//! drains the queue and routes each entry to the node.

pub mod compute;
pub mod meta;
pub mod parse;
pub mod value;

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use crate::core::color::Color;
use crate::core::node::NodeId;
use crate::object::{Object, ObjectType};
use crate::Status;

pub use meta::{PropertyKind, StyleProperty};
pub use value::*;

pub type StyleRef = Rc<RefCell<Style>>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StyleError {
    #[error("Style is locked")]
    Locked,
    #[error("Property {property} does not accept {kind:?} values")]
    PropertyType {
        property: &'static str,
        kind: PropertyKind,
    },
    #[error("Invalid value for {property}: {value}")]
    Value { property: &'static str, value: String },
    #[error("Unknown style property: {0}")]
    UnknownProperty(String),
    #[error("Parent must be a class style")]
    NotClass,
    #[error("Parent chain would contain the style itself")]
    Cycle,
}

impl StyleError {
    pub fn status(&self) -> Status {
        match self {
            StyleError::Locked | StyleError::PropertyType { .. } | StyleError::UnknownProperty(_) => {
                Status::StyleProperty
            }
            StyleError::Value { .. } => Status::StyleValue,
            StyleError::NotClass | StyleError::Cycle => Status::IllegalArgument,
        }
    }

    pub(crate) fn value(property: StyleProperty, value: impl ToString) -> Self {
        StyleError::Value {
            property: property.name(),
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Numeric(StyleValue),
    Enum(i32),
    Color(Color),
    String(Rc<str>),
    Transform(Rc<[StyleTransform]>),
    Filter(Rc<[StyleFilter]>),
}

impl PropertyValue {
    fn kind(&self) -> PropertyKind {
        match self {
            PropertyValue::Numeric(_) => PropertyKind::Number,
            PropertyValue::Enum(_) => PropertyKind::Enum,
            PropertyValue::Color(_) => PropertyKind::Color,
            PropertyValue::String(_) => PropertyKind::String,
            PropertyValue::Transform(_) => PropertyKind::Transform,
            PropertyValue::Filter(_) => PropertyKind::Filter,
        }
    }
}

/// View and root-relative inputs for unit resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyleContext {
    pub view_width: f32,
    pub view_height: f32,
    pub view_min: f32,
    pub view_max: f32,
    pub root_font_size: f32,
}

impl StyleContext {
    pub fn new(view_width: f32, view_height: f32, root_font_size: f32) -> Self {
        let mut ctx = Self {
            root_font_size,
            ..Self::default()
        };
        ctx.set_view(view_width, view_height);
        ctx
    }

    pub fn set_view(&mut self, width: f32, height: f32) {
        self.view_width = width;
        self.view_height = height;
        self.view_min = width.min(height);
        self.view_max = width.max(height);
    }
}

impl Default for StyleContext {
    fn default() -> Self {
        Self {
            view_width: 0.0,
            view_height: 0.0,
            view_min: 0.0,
            view_max: 0.0,
            root_font_size: crate::config::DEFAULT_ROOT_FONT_SIZE_PX,
        }
    }
}

static NEXT_STYLE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
pub struct Style {
    id: u64,
    parent: Option<StyleRef>,
    properties: BTreeMap<StyleProperty, PropertyValue>,
    class: bool,
    locked: bool,
    // non-owning
    bound: Option<NodeId>,
    pending: Vec<StyleProperty>,
}

impl Default for Style {
    fn default() -> Self {
        Self::new()
    }
}

impl Object for Style {
    fn object_type(&self) -> ObjectType {
        ObjectType::Style
    }
}

impl Style {
    pub fn new() -> Self {
        Self {
            id: NEXT_STYLE_ID.fetch_add(1, Ordering::Relaxed),
            parent: None,
            properties: BTreeMap::new(),
            class: false,
            locked: false,
            bound: None,
            pending: Vec::new(),
        }
    }

    /// A template style, usable only as a parent.
    pub fn new_class() -> Self {
        Self {
            class: true,
            ..Self::new()
        }
    }

    pub fn into_ref(self) -> StyleRef {
        Rc::new(RefCell::new(self))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_class(&self) -> bool {
        self.class
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn parent(&self) -> Option<&StyleRef> {
        self.parent.as_ref()
    }

    /// Effective value: local table first, then the parent chain.
    pub fn get(&self, property: StyleProperty) -> Option<PropertyValue> {
        match self.properties.get(&property) {
            Some(value) => Some(value.clone()),
            None => self.parent.as_ref().and_then(|p| p.borrow().get(property)),
        }
    }

    pub fn get_numeric(&self, property: StyleProperty) -> StyleValue {
        match self.get(property) {
            Some(PropertyValue::Numeric(v)) => v,
            _ => StyleValue::UNDEFINED,
        }
    }

    pub fn get_enum(&self, property: StyleProperty) -> i32 {
        match self.get(property) {
            Some(PropertyValue::Enum(v)) => v,
            _ => 0,
        }
    }

    pub fn get_color(&self, property: StyleProperty) -> Color {
        match self.get(property) {
            Some(PropertyValue::Color(c)) => c,
            _ => Color::TRANSPARENT,
        }
    }

    pub fn get_string(&self, property: StyleProperty) -> Option<Rc<str>> {
        match self.get(property) {
            Some(PropertyValue::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn get_transform(&self, property: StyleProperty) -> Option<Rc<[StyleTransform]>> {
        match self.get(property) {
            Some(PropertyValue::Transform(t)) => Some(t),
            _ => None,
        }
    }

    pub fn get_filter(&self, property: StyleProperty) -> Option<Rc<[StyleFilter]>> {
        match self.get(property) {
            Some(PropertyValue::Filter(f)) => Some(f),
            _ => None,
        }
    }

    pub fn has_property(&self, property: StyleProperty) -> bool {
        self.properties.contains_key(&property)
            || self.parent.as_ref().is_some_and(|p| p.borrow().has_property(property))
    }

    pub fn has_local_property(&self, property: StyleProperty) -> bool {
        self.properties.contains_key(&property)
    }

    pub fn local_properties(&self) -> impl Iterator<Item = (StyleProperty, &PropertyValue)> {
        self.properties.iter().map(|(p, v)| (*p, v))
    }

    pub fn set_numeric(&mut self, property: StyleProperty, value: StyleValue) -> Result<(), StyleError> {
        self.check_writable(property, PropertyKind::Number)?;

        if !property.is_valid_numeric(&value) {
            return Err(StyleError::value(property, value));
        }

        self.store(property, PropertyValue::Numeric(value));
        Ok(())
    }

    pub fn set_enum(&mut self, property: StyleProperty, value: i32) -> Result<(), StyleError> {
        self.check_writable(property, PropertyKind::Enum)?;

        if !property.is_enum_value(value) {
            return Err(StyleError::value(property, value));
        }

        self.store(property, PropertyValue::Enum(value));
        Ok(())
    }

    pub fn set_color(&mut self, property: StyleProperty, color: Color) -> Result<(), StyleError> {
        self.check_writable(property, PropertyKind::Color)?;
        self.store(property, PropertyValue::Color(color));
        Ok(())
    }

    pub fn set_string(&mut self, property: StyleProperty, value: &str) -> Result<(), StyleError> {
        self.check_writable(property, PropertyKind::String)?;
        self.store(property, PropertyValue::String(Rc::from(value)));
        Ok(())
    }

    pub fn set_transform(&mut self, property: StyleProperty, ops: Vec<StyleTransform>) -> Result<(), StyleError> {
        self.check_writable(property, PropertyKind::Transform)?;

        if ops.is_empty() {
            if self.properties.remove(&property).is_some() {
                self.notify(property);
            }
        } else {
            self.store(property, PropertyValue::Transform(ops.into()));
        }

        Ok(())
    }

    pub fn set_filter(&mut self, property: StyleProperty, ops: Vec<StyleFilter>) -> Result<(), StyleError> {
        self.check_writable(property, PropertyKind::Filter)?;

        if ops.is_empty() {
            if self.properties.remove(&property).is_some() {
                self.notify(property);
            }
        } else {
            self.store(property, PropertyValue::Filter(ops.into()));
        }

        Ok(())
    }

    /// Removes a local value. Returns whether one was present.
    pub fn unset(&mut self, property: StyleProperty) -> Result<bool, StyleError> {
        if self.locked {
            return Err(StyleError::Locked);
        }

        let removed = self.properties.remove(&property).is_some();

        if removed {
            self.notify(property);
        }

        Ok(removed)
    }

    pub fn reset(&mut self) -> Result<(), StyleError> {
        if self.locked {
            return Err(StyleError::Locked);
        }

        let properties = std::mem::take(&mut self.properties);

        for property in properties.into_keys() {
            self.notify(property);
        }

        Ok(())
    }

    /// Replaces the class parent.
    ///
    /// The bound node is notified of every property defined in either the old
    /// or the new chain and not shadowed by a local value.
    pub fn set_parent(&mut self, parent: Option<StyleRef>) -> Result<(), StyleError> {
        if let Some(p) = &parent {
            let candidate = p.try_borrow().map_err(|_| StyleError::Cycle)?;

            if !candidate.is_class() {
                return Err(StyleError::NotClass);
            }

            if candidate.chain_contains(self.id) {
                return Err(StyleError::Cycle);
            }
        }

        let mut changed = chain_properties(self.parent.as_ref());
        changed.extend(chain_properties(parent.as_ref()));

        self.parent = parent;

        for property in changed {
            if !self.properties.contains_key(&property) {
                self.notify(property);
            }
        }

        Ok(())
    }

    /// Local properties whose resolved value depends on the viewport or on the
    /// root font size, plus the transform.
    pub fn dynamic_unit_properties(&self, view: bool, rem: bool) -> Vec<StyleProperty> {
        self.properties
            .iter()
            .filter(|(_, value)| match value {
                PropertyValue::Numeric(v) => (view && v.unit.is_viewport()) || (rem && v.unit == StyleUnit::Rem),
                PropertyValue::Transform(_) => true,
                _ => false,
            })
            .map(|(p, _)| *p)
            .collect()
    }

    pub(crate) fn bind(&mut self, node: Option<NodeId>) {
        self.bound = node;
        self.pending.clear();
    }

    pub fn bound_node(&self) -> Option<NodeId> {
        self.bound
    }

    pub(crate) fn take_pending(&mut self) -> Vec<StyleProperty> {
        std::mem::take(&mut self.pending)
    }

    fn check_writable(&self, property: StyleProperty, kind: PropertyKind) -> Result<(), StyleError> {
        if self.locked {
            return Err(StyleError::Locked);
        }

        if property.kind() != kind {
            return Err(StyleError::PropertyType {
                property: property.name(),
                kind,
            });
        }

        Ok(())
    }

    fn store(&mut self, property: StyleProperty, value: PropertyValue) {
        debug_assert_eq!(value.kind(), property.kind());
        self.properties.insert(property, value);
        self.notify(property);
    }

    fn notify(&mut self, property: StyleProperty) {
        if self.bound.is_some() {
            self.pending.push(property);
        }
    }

    // A style already mutably borrowed up the chain is the one being reparented.
    fn chain_contains(&self, id: u64) -> bool {
        self.id == id
            || self.parent.as_ref().is_some_and(|p| match p.try_borrow() {
                Ok(parent) => parent.chain_contains(id),
                Err(_) => true,
            })
    }
}

fn chain_properties(start: Option<&StyleRef>) -> BTreeSet<StyleProperty> {
    let mut out = BTreeSet::new();
    let mut current = start.cloned();

    while let Some(style) = current {
        let style = style.borrow();
        out.extend(style.properties.keys().copied());
        current = style.parent.clone();
    }

    out
}
