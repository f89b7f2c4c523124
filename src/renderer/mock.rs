//! Recording backend for headless tests. Nothing is drawn; every call is
//! appended to a shared [`MockRecorder`].

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::config::{WindowFlags, WindowSettings};
use crate::core::color::Color;
use crate::object::{Object, ObjectType};

use super::{DrawState, Graphics, GraphicsContainer, GraphicsError, GraphicsState, RenderCommand, RenderObject};

#[derive(Debug, Clone)]
pub enum MockCall {
    Configure { width: u32, height: u32 },
    SetTitle(String),
    Begin,
    End,
    Clear(Color),
    Draw { object: u64, tint: Color, state: DrawState },
    DestroyObject(u64),
    EndQueue {
        width: u32,
        height: u32,
        commands: Vec<RenderCommand>,
        object: Option<u64>,
    },
    RemoveImage(u64),
    Destroy,
}

#[derive(Debug, Clone, Default)]
pub struct MockRecorder {
    calls: Arc<Mutex<Vec<MockCall>>>,
}

impl MockRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: MockCall) {
        self.calls.lock().push(call);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    /// Command lists of every `end_queue` that produced an object.
    pub fn painted_queues(&self) -> Vec<Vec<RenderCommand>> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                MockCall::EndQueue {
                    commands,
                    object: Some(_),
                    ..
                } => Some(commands.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn draws(&self) -> Vec<(u64, Color, DrawState)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                MockCall::Draw { object, tint, state } => Some((*object, *tint, *state)),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug)]
pub struct MockGraphics {
    state: GraphicsState,
    recorder: MockRecorder,
    next_object: u64,
    destroyed: bool,
}

impl MockGraphics {
    pub fn new(recorder: MockRecorder) -> Self {
        Self {
            state: GraphicsState::new(),
            recorder,
            next_object: 1,
            destroyed: false,
        }
    }

    pub fn recorder(&self) -> &MockRecorder {
        &self.recorder
    }
}

impl Object for MockGraphics {
    fn object_type(&self) -> ObjectType {
        ObjectType::MockGraphics
    }
}

impl Graphics for MockGraphics {
    fn graphics_state(&self) -> &GraphicsState {
        &self.state
    }

    fn graphics_state_mut(&mut self) -> &mut GraphicsState {
        &mut self.state
    }

    fn configure(&mut self, width: u32, height: u32) -> Result<(), GraphicsError> {
        if self.destroyed {
            return Err(GraphicsError::EndOfLife);
        }

        self.recorder.record(MockCall::Configure { width, height });
        Ok(())
    }

    fn destroy(&mut self) {
        if !self.destroyed {
            self.destroyed = true;
            self.recorder.record(MockCall::Destroy);
        }
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn begin(&mut self) {
        self.recorder.record(MockCall::Begin);
    }

    fn end(&mut self) {
        self.recorder.record(MockCall::End);
    }

    fn clear(&mut self, color: Color) {
        self.recorder.record(MockCall::Clear(color));
    }

    fn draw_render_object(&mut self, object: &RenderObject, tint: Color) {
        self.recorder.record(MockCall::Draw {
            object: object.id(),
            tint,
            state: *self.state.current(),
        });
    }

    fn destroy_render_object(&mut self, object: RenderObject) {
        self.recorder.record(MockCall::DestroyObject(object.id()));
    }

    fn end_queue(&mut self, width: u32, height: u32, previous: Option<RenderObject>) -> Option<RenderObject> {
        let commands = self.state.queue().to_vec();

        if commands.is_empty() {
            if let Some(previous) = previous {
                self.destroy_render_object(previous);
            }

            self.recorder.record(MockCall::EndQueue {
                width,
                height,
                commands,
                object: None,
            });
            return None;
        }

        let id = match previous {
            Some(previous) => previous.id(),
            None => {
                let id = self.next_object;
                self.next_object += 1;
                id
            }
        };

        self.recorder.record(MockCall::EndQueue {
            width,
            height,
            commands,
            object: Some(id),
        });

        Some(RenderObject::new(id, width, height))
    }

    fn remove_image(&mut self, image_id: u64) {
        self.recorder.record(MockCall::RemoveImage(image_id));
    }
}

#[derive(Debug)]
pub struct MockGraphicsContainer {
    graphics: MockGraphics,
    settings: Option<WindowSettings>,
    title: String,
    destroyed: bool,
}

impl MockGraphicsContainer {
    pub fn new(recorder: MockRecorder) -> Self {
        Self {
            graphics: MockGraphics::new(recorder),
            settings: None,
            title: String::new(),
            destroyed: false,
        }
    }

    pub fn recorder(&self) -> &MockRecorder {
        self.graphics.recorder()
    }
}

impl Object for MockGraphicsContainer {
    fn object_type(&self) -> ObjectType {
        ObjectType::MockGraphicsContainer
    }
}

impl GraphicsContainer for MockGraphicsContainer {
    fn configure(&mut self, settings: &WindowSettings) -> Result<(), GraphicsError> {
        if self.destroyed {
            return Err(GraphicsError::EndOfLife);
        }

        if self.settings.is_some() {
            return Err(GraphicsError::AlreadyConfigured);
        }

        if settings.width == 0 || settings.height == 0 {
            return Err(GraphicsError::CreateWindow(format!(
                "invalid size {}x{}",
                settings.width, settings.height
            )));
        }

        self.graphics.configure(settings.width, settings.height)?;
        self.title = settings.title.clone();
        self.settings = Some(settings.clone());

        debug!("mock container configured {}x{}", settings.width, settings.height);
        Ok(())
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }

        self.destroyed = true;
        self.graphics.destroy();
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
        self.graphics.recorder.record(MockCall::SetTitle(self.title.clone()));
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn begin_frame(&mut self) -> &mut dyn Graphics {
        self.graphics.begin();
        &mut self.graphics
    }

    fn end_frame(&mut self) {
        self.graphics.end();
    }

    fn graphics(&mut self) -> &mut dyn Graphics {
        &mut self.graphics
    }

    fn width(&self) -> u32 {
        self.settings.as_ref().map_or(0, |s| s.width)
    }

    fn height(&self) -> u32 {
        self.settings.as_ref().map_or(0, |s| s.height)
    }

    fn refresh_rate(&self) -> u32 {
        self.settings.as_ref().map_or(0, |s| s.refresh_rate)
    }

    fn flags(&self) -> WindowFlags {
        self.settings.as_ref().map_or(WindowFlags::empty(), WindowSettings::flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::RectF;

    #[test]
    fn end_queue_reuses_previous_and_empty_queue_releases() {
        let recorder = MockRecorder::new();
        let mut graphics = MockGraphics::new(recorder.clone());

        graphics.begin_queue();
        graphics.queue_fill_rect(RectF::new(0.0, 0.0, 2.0, 2.0), Color::WHITE);
        let first = graphics.end_queue(2, 2, None).unwrap();

        graphics.begin_queue();
        graphics.queue_fill_rect(RectF::new(0.0, 0.0, 3.0, 3.0), Color::BLACK);
        let second = graphics.end_queue(3, 3, Some(first)).unwrap();
        assert_eq!(second.width(), 3);

        let id = second.id();
        graphics.begin_queue();
        assert!(graphics.end_queue(3, 3, Some(second)).is_none());

        assert_eq!(recorder.painted_queues().len(), 2);
        assert!(recorder
            .calls()
            .iter()
            .any(|c| matches!(c, MockCall::DestroyObject(o) if *o == id)));
    }

    #[test]
    fn container_configures_once() {
        let mut container = MockGraphicsContainer::new(MockRecorder::new());

        assert!(container.configure(&WindowSettings::with_size(0, 10)).is_err());
        container.configure(&WindowSettings::with_size(64, 32)).unwrap();
        assert_eq!(
            container.configure(&WindowSettings::with_size(64, 32)),
            Err(GraphicsError::AlreadyConfigured)
        );
        assert_eq!((container.width(), container.height()), (64, 32));

        container.destroy();
        assert!(container.is_destroyed());
    }
}
