//! Video, keyboard and gamepad interfaces.
//!
//! A [`Video`] backend owns the display and input devices. It hands out
//! graphics containers for windows and converts device activity into
//! [`InputEvent`]s that the env drains once per frame. Two backends ship:
//! [`mock::MockVideo`] records graphics calls, [`headless::HeadlessVideo`]
//! rasterizes into memory.

pub mod headless;
pub mod mock;

use std::path::{Path, PathBuf};

use ahash::AHashMap;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::object::Object;
use crate::renderer::{GraphicsContainer, GraphicsError};

pub use headless::HeadlessVideo;
pub use mock::{MockGamepad, MockKeyboard, MockVideo, MockVideoHandle};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VideoError {
    #[error("Video backend has been destroyed")]
    EndOfLife,
    #[error("Video backend is not attached")]
    NotAttached,
    #[error("Graphics: {0}")]
    Graphics(#[from] GraphicsError),
    #[error("Cannot read mappings from {path}: {reason}")]
    MappingFile { path: PathBuf, reason: String },
    #[error("Device: {0}")]
    Device(String),
}

/// Which numbering a key or axis value is reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum Keyspace {
    /// Standard gamepad layout, see [`Key`] and [`AnalogKey`].
    Mapped = 0,
    /// Raw device button, axis and hat indices.
    Hardware = 1,
    /// Keyboard scancodes, see [`Scancode`].
    Scancode = 2,
}

/// Buttons of the standard gamepad layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum Key {
    Unknown = -1,
    A = 0,
    B = 1,
    X = 2,
    Y = 3,
    Back = 4,
    Guide = 5,
    Start = 6,
    LeftStick = 7,
    RightStick = 8,
    LeftShoulder = 9,
    RightShoulder = 10,
    DpadUp = 11,
    DpadDown = 12,
    DpadLeft = 13,
    DpadRight = 14,
}

impl Key {
    pub const COUNT: usize = 15;

    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => Key::A,
            1 => Key::B,
            2 => Key::X,
            3 => Key::Y,
            4 => Key::Back,
            5 => Key::Guide,
            6 => Key::Start,
            7 => Key::LeftStick,
            8 => Key::RightStick,
            9 => Key::LeftShoulder,
            10 => Key::RightShoulder,
            11 => Key::DpadUp,
            12 => Key::DpadDown,
            13 => Key::DpadLeft,
            14 => Key::DpadRight,
            _ => Key::Unknown,
        }
    }
}

/// Axes of the standard gamepad layout. Numbered apart from [`Key`] so both
/// can share one value range in host code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum AnalogKey {
    LeftStickX = 1000,
    LeftStickY = 1001,
    RightStickX = 1002,
    RightStickY = 1003,
    LeftTrigger = 1004,
    RightTrigger = 1005,
}

impl AnalogKey {
    pub const COUNT: usize = 6;

    pub fn index(self) -> usize {
        (self as i32 - AnalogKey::LeftStickX as i32) as usize
    }
}

bitflags! {
    /// Hat switch position. The empty set is centered.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Hat: u8 {
        const UP = 1;
        const RIGHT = 2;
        const DOWN = 4;
        const LEFT = 8;
    }
}

impl Hat {
    pub const CENTERED: Hat = Hat::empty();
}

/// Keyboard scancodes, numbered like USB HID usage ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum Scancode {
    A = 4,
    B = 5,
    C = 6,
    D = 7,
    E = 8,
    F = 9,
    G = 10,
    H = 11,
    I = 12,
    J = 13,
    K = 14,
    L = 15,
    M = 16,
    N = 17,
    O = 18,
    P = 19,
    Q = 20,
    R = 21,
    S = 22,
    T = 23,
    U = 24,
    V = 25,
    W = 26,
    X = 27,
    Y = 28,
    Z = 29,
    Num1 = 30,
    Num2 = 31,
    Num3 = 32,
    Num4 = 33,
    Num5 = 34,
    Num6 = 35,
    Num7 = 36,
    Num8 = 37,
    Num9 = 38,
    Num0 = 39,
    Return = 40,
    Escape = 41,
    Backspace = 42,
    Tab = 43,
    Space = 44,
    F1 = 58,
    F2 = 59,
    F3 = 60,
    F4 = 61,
    F5 = 62,
    F6 = 63,
    F7 = 64,
    F8 = 65,
    F9 = 66,
    F10 = 67,
    F11 = 68,
    F12 = 69,
    Home = 74,
    PageUp = 75,
    Delete = 76,
    End = 77,
    PageDown = 78,
    Right = 79,
    Left = 80,
    Down = 81,
    Up = 82,
}

/// Highest scancode value plus one; sizes keyboard state tables.
pub const SCANCODE_LIMIT: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// A device appeared at `index`; the env creates the gamepad.
    GamepadAdded { index: usize },
    GamepadRemoved { id: i32 },
    GamepadButton {
        id: i32,
        keyspace: Keyspace,
        key: i32,
        pressed: bool,
        repeat: bool,
    },
    GamepadAxis {
        id: i32,
        keyspace: Keyspace,
        axis: i32,
        value: f32,
    },
    GamepadHat {
        id: i32,
        keyspace: Keyspace,
        hat: i32,
        value: Hat,
    },
    KeyboardButton {
        keyspace: Keyspace,
        key: i32,
        pressed: bool,
        repeat: bool,
    },
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DisplayMode {
    pub width: u32,
    pub height: u32,
    pub refresh_rate: u32,
}

impl DisplayMode {
    pub const fn new(width: u32, height: u32, refresh_rate: u32) -> Self {
        Self {
            width,
            height,
            refresh_rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RendererInfo {
    pub name: String,
    pub has_hardware_acceleration: bool,
    pub has_vsync: bool,
    pub has_render_to_texture: bool,
    pub max_texture_width: u32,
    pub max_texture_height: u32,
}

pub trait Keyboard: Object {
    fn id(&self) -> i32;

    fn name(&self) -> &str;

    fn uuid(&self) -> &str;

    fn is_connected(&self) -> bool;

    fn scancode_state(&self, scancode: i32) -> bool;

    fn destroy(&mut self);

    fn is_destroyed(&self) -> bool;
}

pub trait Gamepad: Object {
    /// Instance id; stable while the device stays connected.
    fn id(&self) -> i32;

    fn name(&self) -> &str;

    fn uuid(&self) -> &str;

    fn is_connected(&self) -> bool;

    fn button_state(&self, button: i32) -> bool;

    fn axis_state(&self, axis: i32) -> f32;

    fn hat_state(&self, hat: i32) -> Hat;

    fn key_state(&self, key: Key) -> bool;

    fn analog_state(&self, key: AnalogKey) -> f32;

    fn button_count(&self) -> usize;

    fn axis_count(&self) -> usize;

    fn hat_count(&self) -> usize;

    /// Switches the device at `index` to the standard layout after its
    /// mapping changed.
    fn enable_mapping(&mut self, index: usize);

    fn destroy(&mut self);

    fn is_destroyed(&self) -> bool;
}

pub trait Video: Object {
    fn attach(&mut self) -> Result<(), VideoError>;

    fn detach(&mut self);

    fn is_attached(&self) -> bool;

    fn destroy(&mut self);

    fn is_destroyed(&self) -> bool;

    fn platform_name(&self) -> &str;

    fn driver_count(&self) -> usize;

    fn driver(&self, index: usize) -> Option<&str>;

    fn display_count(&self) -> usize;

    fn display_name(&self, display: usize) -> Option<&str>;

    fn current_display_mode(&self, display: usize) -> Option<DisplayMode>;

    fn desktop_display_mode(&self, display: usize) -> Option<DisplayMode>;

    fn display_mode_count(&self, display: usize) -> usize;

    fn display_mode(&self, display: usize, mode: usize) -> Option<DisplayMode>;

    fn find_closest_display_mode(&self, display: usize, width: u32, height: u32) -> Option<DisplayMode>;

    fn renderer_count(&self) -> usize;

    fn renderer_info(&self, index: usize) -> Option<RendererInfo>;

    /// Appends pending input to `events`. Returns false once the platform
    /// asked to quit.
    fn poll_events(&mut self, events: &mut Vec<InputEvent>) -> bool;

    fn create_graphics_container(&mut self) -> Result<Box<dyn GraphicsContainer>, VideoError>;

    fn create_keyboard(&mut self) -> Result<Box<dyn Keyboard>, VideoError>;

    fn create_gamepad(&mut self, index: usize) -> Option<Box<dyn Gamepad>>;

    fn gamepad_count(&self) -> usize;

    fn gamepad_instance_id(&self, index: usize) -> Option<i32>;

    /// Adds every mapping in a gamecontroller database file; returns how
    /// many were read.
    fn load_mappings_from_file(&mut self, path: &Path) -> Result<usize, VideoError>;

    fn get_mapping(&self, uuid: &str) -> Option<String>;

    fn set_mapping(&mut self, uuid: &str, mapping: &str) -> bool;

    /// Mapping that reports every control in the hardware keyspace.
    fn create_stub_mapping(&self, uuid: &str) -> String {
        format!("{},Gamepad,platform:{},", uuid, self.platform_name())
    }
}

/// In-memory gamecontroller mapping table, keyed by lowercase device uuid.
///
/// Lines follow the SDL database format: `uuid,name,binding:value,...`.
/// Blank lines and `#` comments are skipped.
#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    entries: AHashMap<String, String>,
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, uuid: &str) -> Option<&str> {
        self.entries.get(&uuid.to_ascii_lowercase()).map(String::as_str)
    }

    /// Stores one mapping line. Rejected when it has no name field or when
    /// its uuid field names a different device.
    pub fn set(&mut self, uuid: &str, mapping: &str) -> bool {
        let mapping = mapping.trim();
        let mut fields = mapping.splitn(3, ',');

        let (Some(line_uuid), Some(_name)) = (fields.next(), fields.next()) else {
            return false;
        };

        if uuid.is_empty() || !line_uuid.eq_ignore_ascii_case(uuid) {
            return false;
        }

        self.entries.insert(uuid.to_ascii_lowercase(), mapping.to_string());
        true
    }

    /// Adds every well-formed line of `text`; returns how many were added.
    pub fn add_from_str(&mut self, text: &str) -> usize {
        let mut count = 0;

        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let uuid = line.split(',').next().unwrap_or_default();

            if self.set(uuid, line) {
                count += 1;
            } else {
                debug!("skipping mapping line '{}'", line);
            }
        }

        count
    }

    pub fn add_from_file(&mut self, path: &Path) -> Result<usize, VideoError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            warn!("not a mapping file {}", path.display());
            VideoError::MappingFile {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;

        Ok(self.add_from_str(&text))
    }
}

/// Mode from `modes` nearest to the requested size, preferring the higher
/// refresh rate on ties. None when `modes` is empty.
pub fn closest_display_mode(modes: &[DisplayMode], width: u32, height: u32) -> Option<DisplayMode> {
    modes.iter().copied().min_by_key(|mode| {
        let dw = (i64::from(mode.width) - i64::from(width)).abs();
        let dh = (i64::from(mode.height) - i64::from(height)).abs();

        (dw + dh, std::cmp::Reverse(mode.refresh_rate))
    })
}
