//! The engine environment: owns the video backend, input devices, the
//! shared font store and thread pool, and every window.
//!
//! An `Env` is single-threaded. The host calls [`Env::update`] once per frame
//! from the thread that created it; resource completions, input callbacks
//! and presents all happen inside that call.

use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::{EngineConfig, VideoBackend, WindowSettings, VAR_GAMECONTROLLER_DB};
use crate::core::style::{FontStyle, FontWeight};
use crate::object::{Object, ObjectType};
use crate::platform::{
    DisplayMode, Gamepad, Hat, HeadlessVideo, InputEvent, Keyboard, Keyspace, MockVideo, RendererInfo, Video,
};
use crate::resource::{Font, FontStore, ThreadPool};
use crate::window::Window;
use crate::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum EnvState {
    Init = 0,
    Done = 1,
    Error = 2,
    Running = 3,
    Paused = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub u64);

pub type GamepadStatusCallback = Box<dyn FnMut(&dyn Gamepad, bool)>;
pub type GamepadButtonCallback = Box<dyn FnMut(i32, Keyspace, i32, bool, bool)>;
pub type GamepadAxisCallback = Box<dyn FnMut(i32, Keyspace, i32, f32)>;
pub type GamepadHatCallback = Box<dyn FnMut(i32, Keyspace, i32, Hat)>;
pub type KeyboardButtonCallback = Box<dyn FnMut(Keyspace, i32, bool, bool)>;

struct Callbacks {
    gamepad_status: GamepadStatusCallback,
    gamepad_button: GamepadButtonCallback,
    gamepad_axis_motion: GamepadAxisCallback,
    gamepad_hat_motion: GamepadHatCallback,
    keyboard_button: KeyboardButtonCallback,
}

impl Default for Callbacks {
    fn default() -> Self {
        Self {
            gamepad_status: Box::new(|_, _| {}),
            gamepad_button: Box::new(|_, _, _, _, _| {}),
            gamepad_axis_motion: Box::new(|_, _, _, _| {}),
            gamepad_hat_motion: Box::new(|_, _, _, _| {}),
            keyboard_button: Box::new(|_, _, _, _| {}),
        }
    }
}

/// A user mapping plus whatever the backend had for the device before it,
/// so the mapping can be reset.
#[derive(Debug, Clone)]
struct MappingEntry {
    user: String,
    intrinsic: Option<String>,
}

pub struct Env {
    config: EngineConfig,
    state: EnvState,
    pool: Rc<ThreadPool>,
    fonts: Rc<FontStore>,
    video: Option<Box<dyn Video>>,
    keyboard: Option<Box<dyn Keyboard>>,
    gamepads: Vec<Box<dyn Gamepad>>,
    windows: Vec<(WindowId, Window)>,
    next_window: u64,
    mappings: AHashMap<String, MappingEntry>,
    callbacks: Callbacks,
    events: Vec<InputEvent>,
    quit_requested: bool,
}

impl std::fmt::Debug for Env {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Env")
            .field("state", &self.state)
            .field("windows", &self.windows.len())
            .field("gamepads", &self.gamepads.len())
            .field("mappings", &self.mappings.len())
            .field("quit_requested", &self.quit_requested)
            .finish()
    }
}

impl Object for Env {
    fn object_type(&self) -> ObjectType {
        ObjectType::Env
    }
}

impl Env {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let pool = Rc::new(ThreadPool::new(&config.thread_pool)?);
        let fonts = Rc::new(FontStore::new(&config.builtin_font, Rc::clone(&pool)));

        Ok(Self {
            config,
            state: EnvState::Init,
            pool,
            fonts,
            video: None,
            keyboard: None,
            gamepads: Vec::new(),
            windows: Vec::new(),
            next_window: 1,
            mappings: AHashMap::new(),
            callbacks: Callbacks::default(),
            events: Vec::new(),
            quit_requested: false,
        })
    }

    /// Uses `video` instead of the backend named by the config.
    pub fn with_video(mut self, video: Box<dyn Video>) -> Self {
        self.video = Some(video);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Attaches the video backend and opens the input devices.
    pub fn configure(&mut self) -> Result<()> {
        if self.is_destroyed() {
            return Err(EngineError::EndOfLife);
        }

        if self.is_configured() {
            return Err(EngineError::AlreadyConfigured);
        }

        match self.attach_devices() {
            Ok(()) => {
                self.state = EnvState::Running;
                info!("env running");
                Ok(())
            }
            Err(e) => {
                error!("env configure failed: {}", e);
                self.state = EnvState::Error;
                Err(e)
            }
        }
    }

    fn attach_devices(&mut self) -> Result<()> {
        let mut video = match self.video.take() {
            Some(video) => video,
            None => create_video(self.config.video_backend),
        };

        if let Err(e) = video.attach() {
            video.destroy();
            return Err(e.into());
        }

        self.load_mappings(video.as_mut());

        // created up front; added events for devices present at startup are
        // not reliably delivered
        for index in 0..video.gamepad_count() {
            match video.create_gamepad(index) {
                Some(gamepad) => self.gamepads.push(gamepad),
                None => error!("cannot create gamepad at index {}", index),
            }
        }

        match video.create_keyboard() {
            Ok(keyboard) => self.keyboard = Some(keyboard),
            Err(e) => {
                self.gamepads.clear();
                video.destroy();
                return Err(e.into());
            }
        }

        debug!("{} video attached with {} gamepads", video.platform_name(), self.gamepads.len());
        self.video = Some(video);
        Ok(())
    }

    fn load_mappings(&self, video: &mut dyn Video) {
        let path = self.config.gamecontroller_db.clone().or_else(|| {
            std::env::var_os(VAR_GAMECONTROLLER_DB)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        });

        let Some(path) = path else {
            return;
        };

        match video.load_mappings_from_file(&path) {
            Ok(count) => info!("found {} mappings in {}", count, path.display()),
            Err(e) => error!("not a mapping file {}: {}", path.display(), e),
        }
    }

    /// Destroys windows, fonts, devices, the video backend and the pool, in
    /// that order. Safe to call more than once.
    pub fn destroy(&mut self) {
        if self.is_destroyed() {
            return;
        }

        for (_, window) in self.windows.iter_mut() {
            window.destroy();
        }
        self.windows.clear();

        self.fonts.destroy();

        for gamepad in self.gamepads.iter_mut() {
            gamepad.destroy();
        }
        self.gamepads.clear();

        if let Some(keyboard) = self.keyboard.as_mut() {
            keyboard.destroy();
        }

        if let Some(video) = self.video.as_mut() {
            video.destroy();
        }

        self.pool.destroy();
        self.state = EnvState::Done;
        info!("env destroyed");
    }

    pub fn state(&self) -> EnvState {
        self.state
    }

    pub fn is_configured(&self) -> bool {
        matches!(self.state, EnvState::Running | EnvState::Paused)
    }

    pub fn is_running(&self) -> bool {
        self.state == EnvState::Running
    }

    pub fn is_destroyed(&self) -> bool {
        self.state == EnvState::Done
    }

    pub fn is_error(&self) -> bool {
        self.state == EnvState::Error
    }

    pub fn has_quit_request(&self) -> bool {
        self.quit_requested
    }

    /// Stops presenting windows. Input is still polled.
    pub fn pause(&mut self) -> bool {
        if self.state != EnvState::Running {
            return false;
        }

        self.state = EnvState::Paused;
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.state != EnvState::Paused {
            return false;
        }

        self.state = EnvState::Running;
        true
    }

    //
    // callbacks
    //

    pub fn set_on_gamepad_status(&mut self, callback: impl FnMut(&dyn Gamepad, bool) + 'static) {
        self.callbacks.gamepad_status = Box::new(callback);
    }

    pub fn set_on_gamepad_button(&mut self, callback: impl FnMut(i32, Keyspace, i32, bool, bool) + 'static) {
        self.callbacks.gamepad_button = Box::new(callback);
    }

    pub fn set_on_gamepad_axis_motion(&mut self, callback: impl FnMut(i32, Keyspace, i32, f32) + 'static) {
        self.callbacks.gamepad_axis_motion = Box::new(callback);
    }

    pub fn set_on_gamepad_hat_motion(&mut self, callback: impl FnMut(i32, Keyspace, i32, Hat) + 'static) {
        self.callbacks.gamepad_hat_motion = Box::new(callback);
    }

    pub fn set_on_keyboard_button(&mut self, callback: impl FnMut(Keyspace, i32, bool, bool) + 'static) {
        self.callbacks.keyboard_button = Box::new(callback);
    }

    pub fn reset_event_callbacks(&mut self) {
        self.callbacks = Callbacks::default();
    }

    //
    // frame
    //

    /// Runs one frame: input, resource completions, then every window's
    /// present. Returns false once the platform asked to quit.
    pub fn update(&mut self) -> bool {
        if !self.is_configured() {
            return !self.quit_requested;
        }

        let mut events = std::mem::take(&mut self.events);
        let keep_running = self.video.as_mut().is_some_and(|video| video.poll_events(&mut events));

        for event in events.drain(..) {
            self.dispatch_event(event);
        }

        self.events = events;

        if !keep_running {
            self.quit_requested = true;
            return false;
        }

        let completed = self.pool.process_completions();

        if completed > 0 {
            debug!("{} resource tasks completed", completed);
        }

        for (_, window) in self.windows.iter_mut() {
            window.dispatch_resource_events();
        }

        if self.state == EnvState::Running {
            for (id, window) in self.windows.iter_mut() {
                if let Err(e) = window.present() {
                    warn!("present of window {} failed: {}", id.0, e);
                }
            }
        }

        true
    }

    fn dispatch_event(&mut self, event: InputEvent) {
        match event {
            InputEvent::GamepadAdded { index } => self.on_gamepad_connected(index),
            InputEvent::GamepadRemoved { id } => self.on_gamepad_disconnected(id),
            InputEvent::GamepadButton {
                id,
                keyspace,
                key,
                pressed,
                repeat,
            } => (self.callbacks.gamepad_button)(id, keyspace, key, pressed, repeat),
            InputEvent::GamepadAxis {
                id,
                keyspace,
                axis,
                value,
            } => (self.callbacks.gamepad_axis_motion)(id, keyspace, axis, value),
            InputEvent::GamepadHat {
                id,
                keyspace,
                hat,
                value,
            } => (self.callbacks.gamepad_hat_motion)(id, keyspace, hat, value),
            InputEvent::KeyboardButton {
                keyspace,
                key,
                pressed,
                repeat,
            } => (self.callbacks.keyboard_button)(keyspace, key, pressed, repeat),
            InputEvent::Quit => self.quit_requested = true,
        }
    }

    fn on_gamepad_connected(&mut self, index: usize) {
        let Some(video) = self.video.as_mut() else {
            return;
        };

        let Some(instance_id) = video.gamepad_instance_id(index) else {
            error!("no id for gamepad index {}", index);
            return;
        };

        // devices opened at configure may be announced again
        if self.gamepads.iter().any(|g| g.id() == instance_id) {
            return;
        }

        let Some(gamepad) = video.create_gamepad(index) else {
            error!("cannot connect gamepad at index {}", index);
            return;
        };

        if !gamepad.is_connected() {
            error!("gamepad {} not connected", instance_id);
            return;
        }

        info!("gamepad {} '{}' connected", gamepad.id(), gamepad.name());
        self.gamepads.push(gamepad);

        if let Some(gamepad) = self.gamepads.last() {
            (self.callbacks.gamepad_status)(&**gamepad, true);
        }
    }

    fn on_gamepad_disconnected(&mut self, id: i32) {
        let Some(position) = self.gamepads.iter().position(|g| g.id() == id) else {
            return;
        };

        let mut gamepad = self.gamepads.remove(position);

        info!("gamepad {} disconnected", id);
        (self.callbacks.gamepad_status)(&*gamepad, false);
        gamepad.destroy();
    }

    //
    // windows
    //

    pub fn add_window(&mut self) -> Result<WindowId> {
        if self.is_destroyed() {
            return Err(EngineError::EndOfLife);
        }

        let window = Window::new(Rc::clone(&self.fonts), Rc::clone(&self.pool), &self.config)?;
        let id = WindowId(self.next_window);

        self.next_window += 1;
        self.windows.push((id, window));

        Ok(id)
    }

    /// Opens the window's graphics container on this env's video backend.
    pub fn configure_window(&mut self, id: WindowId, settings: &WindowSettings) -> Result<()> {
        if self.is_destroyed() {
            return Err(EngineError::EndOfLife);
        }

        if !self.is_configured() {
            return Err(EngineError::IllegalArgument("env is not configured".into()));
        }

        let Some(video) = self.video.as_mut() else {
            return Err(EngineError::IllegalArgument("env has no video backend".into()));
        };

        let window = self
            .windows
            .iter_mut()
            .find(|(window_id, _)| *window_id == id)
            .map(|(_, window)| window)
            .ok_or_else(|| EngineError::IllegalArgument(format!("no window {}", id.0)))?;

        window.configure(video.as_mut(), settings)
    }

    /// Destroys and forgets the window. False when the id is unknown.
    pub fn remove_window(&mut self, id: WindowId) -> bool {
        let Some(position) = self.windows.iter().position(|(window_id, _)| *window_id == id) else {
            return false;
        };

        let (_, mut window) = self.windows.remove(position);
        window.destroy();
        true
    }

    pub fn window(&self, id: WindowId) -> Option<&Window> {
        self.windows.iter().find(|(window_id, _)| *window_id == id).map(|(_, w)| w)
    }

    pub fn window_mut(&mut self, id: WindowId) -> Option<&mut Window> {
        self.windows.iter_mut().find(|(window_id, _)| *window_id == id).map(|(_, w)| w)
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    pub fn window_ids(&self) -> Vec<WindowId> {
        self.windows.iter().map(|(id, _)| *id).collect()
    }

    //
    // devices
    //

    pub fn keyboard(&self) -> Option<&dyn Keyboard> {
        self.keyboard.as_deref()
    }

    pub fn gamepad(&self, index: usize) -> Option<&dyn Gamepad> {
        self.gamepads.get(index).map(|g| &**g)
    }

    pub fn gamepad_count(&self) -> usize {
        self.gamepads.len()
    }

    pub fn video(&self) -> Option<&dyn Video> {
        self.video.as_deref()
    }

    //
    // mappings
    //

    /// The user mapping set for `uuid`, if any.
    pub fn get_mapping(&self, uuid: &str) -> Option<&str> {
        self.mappings.get(&uuid.to_ascii_lowercase()).map(|entry| entry.user.as_str())
    }

    /// Installs a user mapping and switches matching gamepads to it. The
    /// backend's previous mapping is remembered for [`Env::reset_mapping`].
    pub fn set_mapping(&mut self, uuid: &str, mapping: &str) -> bool {
        if !self.is_configured() {
            return false;
        }

        let Some(video) = self.video.as_mut() else {
            return false;
        };

        let key = uuid.to_ascii_lowercase();
        let intrinsic = match self.mappings.get(&key) {
            Some(entry) => entry.intrinsic.clone(),
            None => video.get_mapping(uuid),
        };

        if !video.set_mapping(uuid, mapping) {
            warn!("mapping for {} rejected", uuid);
            return false;
        }

        self.mappings.insert(
            key,
            MappingEntry {
                user: mapping.to_string(),
                intrinsic,
            },
        );

        self.update_gamepad_mapping(uuid);
        true
    }

    /// Restores the mapping the backend had before the user mapping, or a
    /// stub mapping when it had none.
    pub fn reset_mapping(&mut self, uuid: &str) -> bool {
        if !self.is_configured() {
            return false;
        }

        let Some(video) = self.video.as_mut() else {
            return false;
        };

        let Some(entry) = self.mappings.remove(&uuid.to_ascii_lowercase()) else {
            return false;
        };

        let intrinsic = entry.intrinsic.unwrap_or_else(|| video.create_stub_mapping(uuid));

        if !video.set_mapping(uuid, &intrinsic) {
            warn!("cannot restore mapping for {}", uuid);
        }

        true
    }

    fn update_gamepad_mapping(&mut self, uuid: &str) {
        let Some(video) = self.video.as_ref() else {
            return;
        };

        for index in 0..video.gamepad_count() {
            let Some(instance_id) = video.gamepad_instance_id(index) else {
                continue;
            };

            if let Some(gamepad) = self
                .gamepads
                .iter_mut()
                .find(|g| g.id() == instance_id && g.uuid().eq_ignore_ascii_case(uuid))
            {
                gamepad.enable_mapping(index);
            }
        }
    }

    //
    // video queries; empty until configured
    //

    fn configured_video(&self) -> Option<&dyn Video> {
        self.video.as_deref().filter(|_| self.is_configured())
    }

    pub fn video_driver_count(&self) -> usize {
        self.configured_video().map_or(0, |v| v.driver_count())
    }

    pub fn video_driver(&self, index: usize) -> Option<&str> {
        self.configured_video()?.driver(index)
    }

    pub fn display_count(&self) -> usize {
        self.configured_video().map_or(0, |v| v.display_count())
    }

    pub fn display_name(&self, display: usize) -> Option<&str> {
        self.configured_video()?.display_name(display)
    }

    pub fn current_display_mode(&self, display: usize) -> Option<DisplayMode> {
        self.configured_video()?.current_display_mode(display)
    }

    pub fn desktop_display_mode(&self, display: usize) -> Option<DisplayMode> {
        self.configured_video()?.desktop_display_mode(display)
    }

    pub fn display_mode_count(&self, display: usize) -> usize {
        self.configured_video().map_or(0, |v| v.display_mode_count(display))
    }

    pub fn display_mode(&self, display: usize, mode: usize) -> Option<DisplayMode> {
        self.configured_video()?.display_mode(display, mode)
    }

    pub fn find_closest_display_mode(&self, display: usize, width: u32, height: u32) -> Option<DisplayMode> {
        self.configured_video()?.find_closest_display_mode(display, width, height)
    }

    pub fn renderer_count(&self) -> usize {
        self.configured_video().map_or(0, |v| v.renderer_count())
    }

    pub fn renderer_info(&self, index: usize) -> Option<RendererInfo> {
        self.configured_video()?.renderer_info(index)
    }

    //
    // fonts
    //

    /// Registers a font file and starts loading it on the pool.
    pub fn add_font(&self, uri: &str, index: u32, family: &str, style: FontStyle, weight: FontWeight) -> Result<Arc<Font>> {
        if self.is_destroyed() {
            return Err(EngineError::EndOfLife);
        }

        Ok(self.fonts.add_font(uri, index, family, style, weight, true)?)
    }

    pub fn acquire_font(&self, family: &str, style: FontStyle, weight: FontWeight) -> Option<Arc<Font>> {
        if self.is_destroyed() {
            return None;
        }

        self.fonts.acquire_font(family, style, weight)
    }

    pub fn get_font(&self, family: &str, style: FontStyle, weight: FontWeight) -> Option<Arc<Font>> {
        if self.is_destroyed() {
            return None;
        }

        self.fonts.get_font(family, style, weight)
    }

    pub fn release_font(&self, font: &Arc<Font>) {
        if !self.is_destroyed() {
            self.fonts.release_font(font);
        }
    }

    pub fn font_store(&self) -> &FontStore {
        &self.fonts
    }

    pub fn thread_pool(&self) -> &ThreadPool {
        &self.pool
    }
}

impl Drop for Env {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn create_video(backend: VideoBackend) -> Box<dyn Video> {
    match backend {
        VideoBackend::Mock => Box::new(MockVideo::new()),
        VideoBackend::Software => Box::new(HeadlessVideo::new()),
    }
}
