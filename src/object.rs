//! Runtime type tags for engine objects.
//!
//! Ownership itself is plain `Rc`/`Arc`: cloning a handle is a reference
//! increment and dropping the last handle runs the type's `Drop` exactly once.
//! What this module adds is the type tag every engine object carries and the
//! process-wide registry that maps a tag to its name and interface.

use std::collections::HashMap;

use once_cell::sync::Lazy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Style,
    RootNode,
    BoxNode,
    ImageNode,
    TextNode,
    Font,
    FontStore,
    Image,
    ImageStore,
    Window,
    Env,
    ThreadPool,
    Task,
    MockGraphics,
    SoftwareGraphics,
    MockGraphicsContainer,
    SoftwareGraphicsContainer,
    MockVideo,
    HeadlessVideo,
    MockKeyboard,
    MockGamepad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterfaceType {
    None,
    Node,
    Graphics,
    GraphicsContainer,
    Video,
    Keyboard,
    Gamepad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeInfo {
    pub name: &'static str,
    pub object_type: ObjectType,
    pub interface: InterfaceType,
}

const TYPES: &[(ObjectType, &str, InterfaceType)] = &[
    (ObjectType::Style, "Style", InterfaceType::None),
    (ObjectType::RootNode, "RootNode", InterfaceType::Node),
    (ObjectType::BoxNode, "BoxNode", InterfaceType::Node),
    (ObjectType::ImageNode, "ImageNode", InterfaceType::Node),
    (ObjectType::TextNode, "TextNode", InterfaceType::Node),
    (ObjectType::Font, "Font", InterfaceType::None),
    (ObjectType::FontStore, "FontStore", InterfaceType::None),
    (ObjectType::Image, "Image", InterfaceType::None),
    (ObjectType::ImageStore, "ImageStore", InterfaceType::None),
    (ObjectType::Window, "Window", InterfaceType::None),
    (ObjectType::Env, "Env", InterfaceType::None),
    (ObjectType::ThreadPool, "ThreadPool", InterfaceType::None),
    (ObjectType::Task, "Task", InterfaceType::None),
    (ObjectType::MockGraphics, "MockGraphics", InterfaceType::Graphics),
    (ObjectType::SoftwareGraphics, "SoftwareGraphics", InterfaceType::Graphics),
    (ObjectType::MockGraphicsContainer, "MockGraphicsContainer", InterfaceType::GraphicsContainer),
    (ObjectType::SoftwareGraphicsContainer, "SoftwareGraphicsContainer", InterfaceType::GraphicsContainer),
    (ObjectType::MockVideo, "MockVideo", InterfaceType::Video),
    (ObjectType::HeadlessVideo, "HeadlessVideo", InterfaceType::Video),
    (ObjectType::MockKeyboard, "MockKeyboard", InterfaceType::Keyboard),
    (ObjectType::MockGamepad, "MockGamepad", InterfaceType::Gamepad),
];

static REGISTRY: Lazy<HashMap<ObjectType, TypeInfo>> = Lazy::new(|| {
    TYPES
        .iter()
        .map(|&(object_type, name, interface)| {
            (
                object_type,
                TypeInfo {
                    name,
                    object_type,
                    interface,
                },
            )
        })
        .collect()
});

/// Registry lookup. Every `ObjectType` variant is registered, so this never misses.
pub fn type_info(object_type: ObjectType) -> TypeInfo {
    REGISTRY.get(&object_type).copied().unwrap_or(TypeInfo {
        name: "Unknown",
        object_type,
        interface: InterfaceType::None,
    })
}

pub trait Object {
    fn object_type(&self) -> ObjectType;

    fn type_name(&self) -> &'static str {
        type_info(self.object_type()).name
    }

    fn interface_type(&self) -> InterfaceType {
        type_info(self.object_type()).interface
    }
}
