//! Windowless video backend that rasterizes every window into memory with
//! the software renderer. Input devices and mappings behave like the mock
//! backend; frames can be read back or saved as PNG.

use std::path::Path;

use tracing::info;

use crate::object::{Object, ObjectType};
use crate::renderer::{GraphicsContainer, MockRecorder, SoftwareGraphicsContainer};

use super::mock::MockVideo;
use super::{
    closest_display_mode, DisplayMode, Gamepad, InputEvent, Keyboard, MockVideoHandle, RendererInfo, Video, VideoError,
};

const DISPLAY_MODES: [DisplayMode; 4] = [
    DisplayMode::new(640, 480, 60),
    DisplayMode::new(1280, 720, 60),
    DisplayMode::new(1920, 1080, 60),
    DisplayMode::new(3840, 2160, 30),
];

const DESKTOP_MODE: DisplayMode = DisplayMode::new(1920, 1080, 60);

#[derive(Debug)]
pub struct HeadlessVideo {
    devices: MockVideo,
    renderer: RendererInfo,
}

impl HeadlessVideo {
    pub fn new() -> Self {
        Self {
            devices: MockVideo::with_devices(MockRecorder::new(), 0),
            renderer: RendererInfo {
                name: "tiny-skia".to_string(),
                has_hardware_acceleration: false,
                has_vsync: false,
                has_render_to_texture: true,
                max_texture_width: 16384,
                max_texture_height: 16384,
            },
        }
    }

    /// Input injection; same contract as the mock backend's handle.
    pub fn handle(&self) -> MockVideoHandle {
        self.devices.handle()
    }
}

impl Default for HeadlessVideo {
    fn default() -> Self {
        Self::new()
    }
}

impl Object for HeadlessVideo {
    fn object_type(&self) -> ObjectType {
        ObjectType::HeadlessVideo
    }
}

impl Video for HeadlessVideo {
    fn attach(&mut self) -> Result<(), VideoError> {
        let attached = self.devices.is_attached();

        self.devices.attach()?;

        if !attached {
            info!("headless video attached ({} display modes)", DISPLAY_MODES.len());
        }

        Ok(())
    }

    fn detach(&mut self) {
        self.devices.detach();
    }

    fn is_attached(&self) -> bool {
        self.devices.is_attached()
    }

    fn destroy(&mut self) {
        self.devices.destroy();
    }

    fn is_destroyed(&self) -> bool {
        self.devices.is_destroyed()
    }

    fn platform_name(&self) -> &str {
        "Headless"
    }

    fn driver_count(&self) -> usize {
        1
    }

    fn driver(&self, index: usize) -> Option<&str> {
        (index == 0).then_some("software")
    }

    fn display_count(&self) -> usize {
        1
    }

    fn display_name(&self, display: usize) -> Option<&str> {
        (display == 0).then_some("headless")
    }

    fn current_display_mode(&self, display: usize) -> Option<DisplayMode> {
        (display == 0).then_some(DESKTOP_MODE)
    }

    fn desktop_display_mode(&self, display: usize) -> Option<DisplayMode> {
        (display == 0).then_some(DESKTOP_MODE)
    }

    fn display_mode_count(&self, display: usize) -> usize {
        if display == 0 {
            DISPLAY_MODES.len()
        } else {
            0
        }
    }

    fn display_mode(&self, display: usize, mode: usize) -> Option<DisplayMode> {
        if display == 0 {
            DISPLAY_MODES.get(mode).copied()
        } else {
            None
        }
    }

    fn find_closest_display_mode(&self, display: usize, width: u32, height: u32) -> Option<DisplayMode> {
        if display == 0 {
            closest_display_mode(&DISPLAY_MODES, width, height)
        } else {
            None
        }
    }

    fn renderer_count(&self) -> usize {
        1
    }

    fn renderer_info(&self, index: usize) -> Option<RendererInfo> {
        (index == 0).then(|| self.renderer.clone())
    }

    fn poll_events(&mut self, events: &mut Vec<InputEvent>) -> bool {
        self.devices.poll_events(events)
    }

    fn create_graphics_container(&mut self) -> Result<Box<dyn GraphicsContainer>, VideoError> {
        if self.is_destroyed() {
            return Err(VideoError::EndOfLife);
        }

        if !self.is_attached() {
            return Err(VideoError::NotAttached);
        }

        Ok(Box::new(SoftwareGraphicsContainer::new()))
    }

    fn create_keyboard(&mut self) -> Result<Box<dyn Keyboard>, VideoError> {
        self.devices.create_keyboard()
    }

    fn create_gamepad(&mut self, index: usize) -> Option<Box<dyn Gamepad>> {
        self.devices.create_gamepad(index)
    }

    fn gamepad_count(&self) -> usize {
        self.devices.gamepad_count()
    }

    fn gamepad_instance_id(&self, index: usize) -> Option<i32> {
        self.devices.gamepad_instance_id(index)
    }

    fn load_mappings_from_file(&mut self, path: &Path) -> Result<usize, VideoError> {
        self.devices.load_mappings_from_file(path)
    }

    fn get_mapping(&self, uuid: &str) -> Option<String> {
        self.devices.get_mapping(uuid)
    }

    fn set_mapping(&mut self, uuid: &str, mapping: &str) -> bool {
        self.devices.set_mapping(uuid, mapping)
    }
}
