//! Scriptable video backend for tests and the headless binary.
//!
//! [`MockVideo`] exposes one display, one renderer, a system keyboard and a
//! single gamepad. Windows get [`MockGraphicsContainer`]s that share one
//! recorder. Input is injected through a cloneable [`MockVideoHandle`].

use std::path::Path;
use std::sync::Arc;

use ahash::AHashSet;
use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::object::{Object, ObjectType};
use crate::renderer::{GraphicsContainer, MockGraphicsContainer, MockRecorder};

use super::{
    AnalogKey, DisplayMode, Gamepad, Hat, InputEvent, Key, Keyboard, Keyspace, MappingTable, RendererInfo, Video,
    VideoError,
};

pub const MOCK_DISPLAY_NAME: &str = "mock_display";
pub const MOCK_DISPLAY_MODE: DisplayMode = DisplayMode::new(1280, 720, 60);
pub const MOCK_KEYBOARD_ID: i32 = -2;
pub const MOCK_KEYBOARD_UUID: &str = "00000000000000000000000000000001";

#[derive(Debug, Default)]
struct DeviceState {
    gamepad_count: usize,
    pressed: AHashSet<i32>,
}

/// Injects input into a [`MockVideo`] and reads what its windows drew.
#[derive(Debug, Clone)]
pub struct MockVideoHandle {
    events: Sender<InputEvent>,
    devices: Arc<Mutex<DeviceState>>,
    recorder: MockRecorder,
}

impl MockVideoHandle {
    pub fn recorder(&self) -> &MockRecorder {
        &self.recorder
    }

    pub fn push_event(&self, event: InputEvent) {
        // the receiver lives as long as the video; a send after that is moot
        let _ = self.events.send(event);
    }

    pub fn press_key(&self, scancode: i32, repeat: bool) {
        self.devices.lock().pressed.insert(scancode);
        self.push_event(InputEvent::KeyboardButton {
            keyspace: Keyspace::Scancode,
            key: scancode,
            pressed: true,
            repeat,
        });
    }

    pub fn release_key(&self, scancode: i32) {
        self.devices.lock().pressed.remove(&scancode);
        self.push_event(InputEvent::KeyboardButton {
            keyspace: Keyspace::Scancode,
            key: scancode,
            pressed: false,
            repeat: false,
        });
    }

    /// Plugs in another gamepad and returns its device index.
    pub fn connect_gamepad(&self) -> usize {
        let index = {
            let mut devices = self.devices.lock();
            devices.gamepad_count += 1;
            devices.gamepad_count - 1
        };

        self.push_event(InputEvent::GamepadAdded { index });
        index
    }

    pub fn disconnect_gamepad(&self, id: i32) {
        self.push_event(InputEvent::GamepadRemoved { id });
    }

    pub fn request_quit(&self) {
        self.push_event(InputEvent::Quit);
    }
}

#[derive(Debug)]
pub struct MockVideo {
    events: Receiver<InputEvent>,
    handle: MockVideoHandle,
    mappings: MappingTable,
    renderer: RendererInfo,
    attached: bool,
    destroyed: bool,
    quit: bool,
}

impl MockVideo {
    pub fn new() -> Self {
        Self::with_recorder(MockRecorder::new())
    }

    pub fn with_recorder(recorder: MockRecorder) -> Self {
        Self::with_devices(recorder, 1)
    }

    pub(super) fn with_devices(recorder: MockRecorder, gamepad_count: usize) -> Self {
        let (sender, receiver) = unbounded();
        let devices = DeviceState {
            gamepad_count,
            ..DeviceState::default()
        };

        Self {
            events: receiver,
            handle: MockVideoHandle {
                events: sender,
                devices: Arc::new(Mutex::new(devices)),
                recorder,
            },
            mappings: MappingTable::new(),
            renderer: RendererInfo {
                name: "mock renderer".to_string(),
                has_hardware_acceleration: true,
                has_vsync: true,
                has_render_to_texture: true,
                max_texture_width: 0xFFFF,
                max_texture_height: 0xFFFF,
            },
            attached: false,
            destroyed: false,
            quit: false,
        }
    }

    pub fn handle(&self) -> MockVideoHandle {
        self.handle.clone()
    }
}

impl Default for MockVideo {
    fn default() -> Self {
        Self::new()
    }
}

impl Object for MockVideo {
    fn object_type(&self) -> ObjectType {
        ObjectType::MockVideo
    }
}

impl Video for MockVideo {
    fn attach(&mut self) -> Result<(), VideoError> {
        if self.destroyed {
            return Err(VideoError::EndOfLife);
        }

        if !self.attached {
            self.attached = true;
            info!("mock video attached");
        }

        Ok(())
    }

    fn detach(&mut self) {
        self.attached = false;
    }

    fn is_attached(&self) -> bool {
        self.attached
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }

        self.detach();
        self.destroyed = true;
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn platform_name(&self) -> &str {
        "Mock"
    }

    fn driver_count(&self) -> usize {
        1
    }

    fn driver(&self, index: usize) -> Option<&str> {
        (index == 0).then_some("default")
    }

    fn display_count(&self) -> usize {
        1
    }

    fn display_name(&self, display: usize) -> Option<&str> {
        (display == 0).then_some(MOCK_DISPLAY_NAME)
    }

    fn current_display_mode(&self, display: usize) -> Option<DisplayMode> {
        (display == 0).then_some(MOCK_DISPLAY_MODE)
    }

    fn desktop_display_mode(&self, display: usize) -> Option<DisplayMode> {
        (display == 0).then_some(MOCK_DISPLAY_MODE)
    }

    fn display_mode_count(&self, display: usize) -> usize {
        usize::from(display == 0)
    }

    fn display_mode(&self, display: usize, mode: usize) -> Option<DisplayMode> {
        (display == 0 && mode == 0).then_some(MOCK_DISPLAY_MODE)
    }

    fn find_closest_display_mode(&self, display: usize, _width: u32, _height: u32) -> Option<DisplayMode> {
        (display == 0).then_some(MOCK_DISPLAY_MODE)
    }

    fn renderer_count(&self) -> usize {
        1
    }

    fn renderer_info(&self, index: usize) -> Option<RendererInfo> {
        (index == 0).then(|| self.renderer.clone())
    }

    fn poll_events(&mut self, events: &mut Vec<InputEvent>) -> bool {
        for event in self.events.try_iter() {
            if event == InputEvent::Quit {
                self.quit = true;
            }

            events.push(event);
        }

        !self.quit
    }

    fn create_graphics_container(&mut self) -> Result<Box<dyn GraphicsContainer>, VideoError> {
        if self.destroyed {
            return Err(VideoError::EndOfLife);
        }

        if !self.attached {
            return Err(VideoError::NotAttached);
        }

        Ok(Box::new(MockGraphicsContainer::new(self.handle.recorder.clone())))
    }

    fn create_keyboard(&mut self) -> Result<Box<dyn Keyboard>, VideoError> {
        if self.destroyed {
            return Err(VideoError::EndOfLife);
        }

        Ok(Box::new(MockKeyboard::new(Arc::clone(&self.handle.devices))))
    }

    fn create_gamepad(&mut self, index: usize) -> Option<Box<dyn Gamepad>> {
        if self.destroyed || index >= self.gamepad_count() {
            return None;
        }

        Some(Box::new(MockGamepad::new(index as i32)))
    }

    fn gamepad_count(&self) -> usize {
        self.handle.devices.lock().gamepad_count
    }

    fn gamepad_instance_id(&self, index: usize) -> Option<i32> {
        (index < self.gamepad_count()).then_some(index as i32)
    }

    fn load_mappings_from_file(&mut self, path: &Path) -> Result<usize, VideoError> {
        self.mappings.add_from_file(path)
    }

    fn get_mapping(&self, uuid: &str) -> Option<String> {
        self.mappings.get(uuid).map(str::to_string)
    }

    fn set_mapping(&mut self, uuid: &str, mapping: &str) -> bool {
        let added = self.mappings.set(uuid, mapping);
        debug!("set mapping {} -> {}", uuid, added);
        added
    }
}

/// The system keyboard. Key state follows presses injected through the
/// video handle.
#[derive(Debug)]
pub struct MockKeyboard {
    devices: Arc<Mutex<DeviceState>>,
    destroyed: bool,
}

impl MockKeyboard {
    fn new(devices: Arc<Mutex<DeviceState>>) -> Self {
        Self {
            devices,
            destroyed: false,
        }
    }
}

impl Object for MockKeyboard {
    fn object_type(&self) -> ObjectType {
        ObjectType::MockKeyboard
    }
}

impl Keyboard for MockKeyboard {
    fn id(&self) -> i32 {
        MOCK_KEYBOARD_ID
    }

    fn name(&self) -> &str {
        "System Keyboard"
    }

    fn uuid(&self) -> &str {
        MOCK_KEYBOARD_UUID
    }

    fn is_connected(&self) -> bool {
        !self.destroyed
    }

    fn scancode_state(&self, scancode: i32) -> bool {
        !self.destroyed && self.devices.lock().pressed.contains(&scancode)
    }

    fn destroy(&mut self) {
        self.destroyed = true;
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

/// A gamepad at rest: no buttons held, sticks centered.
#[derive(Debug)]
pub struct MockGamepad {
    id: i32,
    uuid: String,
    mapped: bool,
    destroyed: bool,
}

impl MockGamepad {
    pub fn new(id: i32) -> Self {
        Self {
            id,
            uuid: format!("{:032x}", 0x0300_0000_u32 + id as u32),
            mapped: false,
            destroyed: false,
        }
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped
    }
}

impl Object for MockGamepad {
    fn object_type(&self) -> ObjectType {
        ObjectType::MockGamepad
    }
}

impl Gamepad for MockGamepad {
    fn id(&self) -> i32 {
        self.id
    }

    fn name(&self) -> &str {
        "Mock Gamepad"
    }

    fn uuid(&self) -> &str {
        &self.uuid
    }

    fn is_connected(&self) -> bool {
        !self.destroyed
    }

    fn button_state(&self, _button: i32) -> bool {
        false
    }

    fn axis_state(&self, _axis: i32) -> f32 {
        0.0
    }

    fn hat_state(&self, _hat: i32) -> Hat {
        Hat::CENTERED
    }

    fn key_state(&self, _key: Key) -> bool {
        false
    }

    fn analog_state(&self, _key: AnalogKey) -> f32 {
        0.0
    }

    fn button_count(&self) -> usize {
        0
    }

    fn axis_count(&self) -> usize {
        0
    }

    fn hat_count(&self) -> usize {
        0
    }

    fn enable_mapping(&mut self, _index: usize) {
        self.mapped = true;
    }

    fn destroy(&mut self) {
        self.destroyed = true;
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}
