//! Light Source Engine core.
//!
//! A retained-mode UI engine: a scene graph of styled nodes, a CSS-like style
//! cascade, flexbox layout and a resolve → paint → composite pipeline that
//! emits to a pluggable 2D backend. Fonts and images load on a worker pool;
//! every engine-state mutation stays on the thread that owns the [`Env`].
//!
//! Notes for the host crate:
//!  - Drive the engine by calling [`Env::update`] once per frame from a single
//!    thread. The headless binary does this from a current-thread Tokio runtime.
//!  - Resource completions are delivered inside `update()`, never from workers.

use thiserror::Error;

pub mod config;
pub mod core;
pub mod env;
pub mod object;
pub mod platform;
pub mod renderer;
pub mod resource;
pub mod window;

pub use crate::config::{BuiltinFont, EngineConfig, ThreadPoolConfig, VideoBackend, WindowFlags, WindowSettings};
pub use crate::core::node::{NodeError, NodeFlags, NodeId, NodeKind};
pub use crate::core::style::{Style, StyleContext, StyleError, StyleProperty, StyleRef, StyleUnit, StyleValue};
pub use crate::env::{Env, EnvState, WindowId};
pub use crate::renderer::GraphicsError;
pub use crate::resource::{ResourceError, ResourceState};
pub use crate::platform::VideoError;
pub use crate::window::Window;

/// Stable numeric status codes surfaced to hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Status {
    Ok = 0,
    Generic = 1,
    FileNotFound = 2,
    OutOfMemory = 3,
    IllegalArgument = 4,
    Eol = 5,
    AlreadyConfigured = 6,
    FileRead = 7,
    ResSvgParse = 201,
    ResFontKey = 202,
    ResFontUnavailable = 203,
    UnsupportedImageFormat = 204,
    StyleProperty = 301,
    StyleValue = 302,
    NodeRemoveChild = 501,
    NodeAppendChild = 502,
    NodeInsertChild = 503,
    GfxCreateWindow = 601,
    GfxCreateRenderer = 602,
    SubsystemError = 901,
}

impl Status {
    pub fn code(self) -> i32 {
        self as i32
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Object has been destroyed")]
    EndOfLife,
    #[error("Already configured")]
    AlreadyConfigured,
    #[error("Illegal argument: {0}")]
    IllegalArgument(String),
    #[error("Out of memory: {0}")]
    OutOfMemory(String),
    #[error("Style error: {0}")]
    Style(String, Status),
    #[error("Node graph violation: {0}")]
    Node(String, Status),
    #[error("Resource error: {0}")]
    Resource(String, Status),
    #[error("Graphics error: {0}")]
    Graphics(String, Status),
    #[error("Subsystem error: {0}")]
    Subsystem(String),
}

impl EngineError {
    pub fn status(&self) -> Status {
        match self {
            EngineError::EndOfLife => Status::Eol,
            EngineError::AlreadyConfigured => Status::AlreadyConfigured,
            EngineError::IllegalArgument(_) => Status::IllegalArgument,
            EngineError::OutOfMemory(_) => Status::OutOfMemory,
            EngineError::Style(_, s)
            | EngineError::Node(_, s)
            | EngineError::Resource(_, s)
            | EngineError::Graphics(_, s) => *s,
            EngineError::Subsystem(_) => Status::SubsystemError,
        }
    }

    pub fn status_code(&self) -> i32 {
        self.status().code()
    }
}

impl From<StyleError> for EngineError {
    fn from(e: StyleError) -> Self {
        let status = e.status();
        EngineError::Style(e.to_string(), status)
    }
}

impl From<NodeError> for EngineError {
    fn from(e: NodeError) -> Self {
        let status = e.status();
        EngineError::Node(e.to_string(), status)
    }
}

impl From<ResourceError> for EngineError {
    fn from(e: ResourceError) -> Self {
        match e {
            ResourceError::EndOfLife => EngineError::EndOfLife,
            other => {
                let status = other.status();
                EngineError::Resource(other.to_string(), status)
            }
        }
    }
}

impl From<GraphicsError> for EngineError {
    fn from(e: GraphicsError) -> Self {
        match e {
            GraphicsError::EndOfLife => EngineError::EndOfLife,
            GraphicsError::AlreadyConfigured => EngineError::AlreadyConfigured,
            other => {
                let status = other.status();
                EngineError::Graphics(other.to_string(), status)
            }
        }
    }
}

impl From<VideoError> for EngineError {
    fn from(e: VideoError) -> Self {
        match e {
            VideoError::EndOfLife => EngineError::EndOfLife,
            VideoError::Graphics(e) => e.into(),
            other => EngineError::Subsystem(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
