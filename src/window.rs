//! A window: one scene graph, its image cache and the graphics container it
//! presents into.

use std::rc::Rc;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::{EngineConfig, WindowFlags, WindowSettings};
use crate::core::color::Color;
use crate::core::node::{NodeKind, Resources, SceneGraph};
use crate::core::geometry::RectF;
use crate::core::style::{Style, StyleContext, StyleError, StyleProperty, StyleRef, StyleValue};
use crate::object::{Object, ObjectType};
use crate::platform::Video;
use crate::renderer::{Graphics, GraphicsContainer};
use crate::resource::{EventInbox, FontStore, ImageStore, ResourceId, ResourceState, ThreadPool};
use crate::{EngineError, NodeId, Result};

const EVICTION_OBSERVER_KEY: u64 = 0;

pub struct Window {
    scene: SceneGraph,
    images: ImageStore,
    inbox: EventInbox,
    fonts: Rc<FontStore>,
    // image ids the store dropped; their textures go at the next present
    evicted: Arc<Mutex<Vec<u64>>>,
    container: Option<Box<dyn GraphicsContainer>>,
    title: String,
    destroyed: bool,
}

impl std::fmt::Debug for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Window")
            .field("title", &self.title)
            .field("nodes", &self.scene.len())
            .field("images", &self.images.len())
            .field("configured", &self.container.is_some())
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

impl Object for Window {
    fn object_type(&self) -> ObjectType {
        ObjectType::Window
    }
}

/// Resource bundle from disjoint window fields, so the scene can be
/// borrowed mutably next to it.
macro_rules! resources {
    ($window:expr) => {
        Resources {
            fonts: &$window.fonts,
            images: &$window.images,
            inbox: &$window.inbox,
        }
    };
}

impl Window {
    pub fn new(fonts: Rc<FontStore>, pool: Rc<ThreadPool>, config: &EngineConfig) -> Result<Self> {
        let scene = SceneGraph::new(config.root_font_size_px, config.settle_iterations)?;
        let images = ImageStore::new(pool);
        let evicted = Arc::new(Mutex::new(Vec::new()));

        let queue = Arc::clone(&evicted);
        images.add_observer(
            EVICTION_OBSERVER_KEY,
            Arc::new(move |event| {
                if let (ResourceState::Done, ResourceId::Image(id)) = (event.state, event.resource) {
                    queue.lock().push(id);
                }
            }),
        );

        Ok(Self {
            scene,
            images,
            inbox: EventInbox::new(),
            fonts,
            evicted,
            container: None,
            title: String::new(),
            destroyed: false,
        })
    }

    /// Opens a graphics container on `video` and sizes the view to it.
    pub fn configure(&mut self, video: &mut dyn Video, settings: &WindowSettings) -> Result<()> {
        self.check_alive()?;

        if self.container.is_some() {
            return Err(EngineError::AlreadyConfigured);
        }

        let mut container = video.create_graphics_container()?;

        if let Err(e) = container.configure(settings) {
            warn!("window configure failed: {}", e);
            container.destroy();
            return Err(e.into());
        }

        let (width, height) = (container.width() as f32, container.height() as f32);

        self.title = container.title().to_string();
        self.container = Some(container);
        self.scene.set_view(width, height, &resources!(self));

        info!("window '{}' configured {}x{}", self.title, width, height);
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.container.is_some()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();

        if let Some(container) = self.container.as_mut() {
            container.set_title(title);
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn width(&self) -> u32 {
        self.container.as_ref().map_or(0, |c| c.width())
    }

    pub fn height(&self) -> u32 {
        self.container.as_ref().map_or(0, |c| c.height())
    }

    pub fn refresh_rate(&self) -> u32 {
        self.container.as_ref().map_or(0, |c| c.refresh_rate())
    }

    pub fn flags(&self) -> WindowFlags {
        self.container.as_ref().map_or(WindowFlags::empty(), |c| c.flags())
    }

    pub fn root(&self) -> NodeId {
        self.scene.root()
    }

    pub fn style_context(&self) -> &StyleContext {
        self.scene.context()
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn image_store(&self) -> &ImageStore {
        &self.images
    }

    pub fn graphics_container(&self) -> Option<&dyn GraphicsContainer> {
        self.container.as_deref()
    }

    pub fn graphics_container_mut(&mut self) -> Option<&mut (dyn GraphicsContainer + 'static)> {
        self.container.as_deref_mut()
    }

    pub fn needs_update(&self) -> bool {
        self.scene.needs_update()
    }

    //
    // nodes
    //

    pub fn create_node(&mut self, kind: NodeKind) -> Result<NodeId> {
        self.check_alive()?;

        if kind == NodeKind::Root {
            return Err(EngineError::IllegalArgument("the root node is created with the window".into()));
        }

        Ok(self.scene.create_node(kind)?)
    }

    /// Creates a node from its tag name: `box`, `img` or `text`.
    pub fn create_node_from_tag(&mut self, tag: &str) -> Result<NodeId> {
        let kind = NodeKind::from_tag(tag).ok_or_else(|| EngineError::IllegalArgument(format!("unknown tag '{}'", tag)))?;

        self.create_node(kind)
    }

    pub fn append(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.check_alive()?;
        Ok(self.scene.append(parent, child, &resources!(self))?)
    }

    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, before: NodeId) -> Result<()> {
        self.check_alive()?;
        Ok(self.scene.insert_before(parent, child, before, &resources!(self))?)
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.check_alive()?;
        Ok(self.scene.remove_child(parent, child, &resources!(self))?)
    }

    /// Destroys `node` and its subtree, releasing their resources and
    /// render objects.
    pub fn destroy_node(&mut self, node: NodeId) -> Result<()> {
        self.check_alive()?;

        if node == self.scene.root() {
            return Err(EngineError::IllegalArgument("the root node lives as long as the window".into()));
        }

        let graphics = self.container.as_mut().map(|c| c.graphics());
        Ok(self.scene.destroy(node, &resources!(self), graphics)?)
    }

    pub fn parent(&self, node: NodeId) -> Result<Option<NodeId>> {
        Ok(self.scene.parent(node)?)
    }

    pub fn child_count(&self, node: NodeId) -> Result<usize> {
        Ok(self.scene.child_count(node)?)
    }

    pub fn child_at(&self, node: NodeId, index: usize) -> Result<Option<NodeId>> {
        Ok(self.scene.child_at(node, index)?)
    }

    pub fn bounds(&self, node: NodeId) -> Result<RectF> {
        Ok(self.scene.bounds(node)?)
    }

    pub fn set_src(&mut self, node: NodeId, src: Option<&str>) -> Result<()> {
        self.check_alive()?;
        Ok(self.scene.set_src(node, src, &resources!(self))?)
    }

    pub fn src(&self, node: NodeId) -> Result<Option<&str>> {
        Ok(self.scene.src(node)?)
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) -> Result<()> {
        self.check_alive()?;
        Ok(self.scene.set_text(node, text)?)
    }

    pub fn text(&self, node: NodeId) -> Result<&str> {
        Ok(self.scene.text(node)?)
    }

    //
    // styles
    //

    pub fn style(&self, node: NodeId) -> Result<&Style> {
        Ok(self.scene.style(node)?)
    }

    /// Runs `edit` on the node's style, then routes every property it
    /// touched to the node.
    pub fn update_style<T>(
        &mut self,
        node: NodeId,
        edit: impl FnOnce(&mut Style) -> std::result::Result<T, StyleError>,
    ) -> Result<T> {
        self.check_alive()?;

        let result = edit(self.scene.style_mut(node)?);

        self.scene.flush_style(node, &resources!(self));
        Ok(result?)
    }

    pub fn set_style_numeric(&mut self, node: NodeId, property: StyleProperty, value: StyleValue) -> Result<()> {
        self.update_style(node, |style| style.set_numeric(property, value))
    }

    pub fn set_style_enum(&mut self, node: NodeId, property: StyleProperty, value: i32) -> Result<()> {
        self.update_style(node, |style| style.set_enum(property, value))
    }

    pub fn set_style_color(&mut self, node: NodeId, property: StyleProperty, color: Color) -> Result<()> {
        self.update_style(node, |style| style.set_color(property, color))
    }

    pub fn set_style_string(&mut self, node: NodeId, property: StyleProperty, value: &str) -> Result<()> {
        self.update_style(node, |style| style.set_string(property, value))
    }

    pub fn set_style_from_string(&mut self, node: NodeId, property: StyleProperty, text: &str) -> Result<()> {
        self.update_style(node, |style| style.set_from_string(property, text))
    }

    /// Like [`Window::set_style_from_string`], naming the property by its
    /// camelCase name.
    pub fn set_style_named(&mut self, node: NodeId, name: &str, text: &str) -> Result<()> {
        self.update_style(node, |style| style.set_named_from_string(name, text))
    }

    pub fn unset_style(&mut self, node: NodeId, property: StyleProperty) -> Result<bool> {
        self.update_style(node, |style| style.unset(property))
    }

    pub fn reset_style(&mut self, node: NodeId) -> Result<()> {
        self.update_style(node, Style::reset)
    }

    pub fn set_style_parent(&mut self, node: NodeId, parent: Option<StyleRef>) -> Result<()> {
        self.update_style(node, |style| style.set_parent(parent))
    }

    /// Root font size change requested by the host. Re-resolves every rem
    /// value when the size actually changed.
    pub fn dispatch_root_font_size_change(&mut self, px: f32) -> bool {
        if self.destroyed {
            return false;
        }

        self.scene.set_root_font_size(px, &resources!(self))
    }

    //
    // frame
    //

    /// Hands queued resource events to their nodes. Returns how many were
    /// delivered.
    pub fn dispatch_resource_events(&mut self) -> usize {
        let events = self.inbox.drain();

        for (node, event) in &events {
            self.scene.on_resource_event(*node, event);
        }

        events.len()
    }

    /// Renders one frame. A no-op until the window is configured.
    pub fn present(&mut self) -> Result<()> {
        self.check_alive()?;

        self.dispatch_resource_events();

        let Some(container) = self.container.as_mut() else {
            return Ok(());
        };

        let evicted = std::mem::take(&mut *self.evicted.lock());

        for image_id in evicted {
            container.graphics().remove_image(image_id);
        }

        let res = Resources {
            fonts: &self.fonts,
            images: &self.images,
            inbox: &self.inbox,
        };

        let graphics = container.begin_frame();
        let result = self.scene.update(&res, graphics);
        container.end_frame();

        result.map_err(EngineError::from)
    }

    /// Tears the window down: scene, image cache, then the container.
    /// Safe to call more than once.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }

        let mut container = self.container.take();

        {
            let graphics = container.as_mut().map(|c| c.graphics());
            self.scene.destroy_all(&resources!(self), graphics);
        }

        self.images.destroy();
        self.images.remove_observer(EVICTION_OBSERVER_KEY);

        let evicted = std::mem::take(&mut *self.evicted.lock());

        if let Some(mut container) = container {
            let graphics: &mut dyn Graphics = container.graphics();

            for image_id in evicted {
                graphics.remove_image(image_id);
            }

            container.destroy();
        }

        self.destroyed = true;
        debug!("window '{}' destroyed", self.title);
    }

    fn check_alive(&self) -> Result<()> {
        if self.destroyed {
            Err(EngineError::EndOfLife)
        } else {
            Ok(())
        }
    }
}

impl Drop for Window {
    fn drop(&mut self) {
        self.destroy();
    }
}
