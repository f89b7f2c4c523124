use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::color::ColorFormat;
use crate::object::{Object, ObjectType};

use super::decode::DecodedImage;
use super::{Observer, Observers, ResourceError, ResourceEvent, ResourceId, ResourceState};

static NEXT_IMAGE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct ImageData {
    state: ResourceState,
    width: u32,
    height: u32,
    pixels: Option<Arc<Vec<u8>>>,
    format: ColorFormat,
    error: Option<ResourceError>,
}

/// A decoded bitmap shared by every node that references the same uri.
#[derive(Debug)]
pub struct Image {
    id: u64,
    uri: String,
    data: RwLock<ImageData>,
    attached: AtomicBool,
    observers: Observers,
}

impl Image {
    pub(crate) fn new(uri: &str) -> Self {
        Self {
            id: NEXT_IMAGE_ID.fetch_add(1, Ordering::Relaxed),
            uri: uri.to_string(),
            data: RwLock::new(ImageData {
                state: ResourceState::Init,
                width: 0,
                height: 0,
                pixels: None,
                format: ColorFormat::Rgba,
                error: None,
            }),
            attached: AtomicBool::new(false),
            observers: Observers::default(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn state(&self) -> ResourceState {
        self.data.read().state
    }

    pub fn width(&self) -> u32 {
        self.data.read().width
    }

    pub fn height(&self) -> u32 {
        self.data.read().height
    }

    pub fn format(&self) -> ColorFormat {
        self.data.read().format
    }

    pub fn error(&self) -> Option<ResourceError> {
        self.data.read().error.clone()
    }

    /// Straight-alpha pixels in [`Image::format`] order, until released.
    pub fn pixels(&self) -> Option<Arc<Vec<u8>>> {
        self.data.read().pixels.clone()
    }

    /// Drops the source pixels once a backend holds its own copy.
    pub fn release_pixels(&self) {
        self.data.write().pixels = None;
    }

    pub fn can_render(&self) -> bool {
        let data = self.data.read();
        data.state == ResourceState::Ready && data.width > 0 && data.height > 0
    }

    pub fn attach(&self) {
        self.attached.store(true, Ordering::Release);
    }

    pub fn detach(&self) {
        self.attached.store(false, Ordering::Release);
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    pub fn add_observer(&self, key: u64, observer: Observer) {
        self.observers.add(key, observer);
    }

    pub fn remove_observer(&self, key: u64) -> bool {
        self.observers.remove(key)
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub(crate) fn set_loading(&self) {
        self.transition(ResourceState::Loading);
    }

    pub(crate) fn finish_load(&self, result: Result<DecodedImage, ResourceError>) {
        if self.state() >= ResourceState::Ready {
            return;
        }

        match result {
            Ok(decoded) => {
                {
                    let mut data = self.data.write();
                    data.width = decoded.width;
                    data.height = decoded.height;
                    data.pixels = Some(Arc::new(decoded.pixels));
                }
                self.transition(ResourceState::Ready);
            }
            Err(e) => {
                tracing::warn!("image {} failed to load: {} [{:?}]", self.uri, e, e.status());
                self.data.write().error = Some(e);
                self.transition(ResourceState::Error);
            }
        }
    }

    pub(crate) fn destroy(&self) {
        self.transition(ResourceState::Done);
        self.data.write().pixels = None;
    }

    fn transition(&self, next: ResourceState) {
        {
            let mut data = self.data.write();

            if next <= data.state {
                return;
            }

            data.state = next;
        }

        if next >= ResourceState::Ready {
            self.observers.dispatch(&ResourceEvent {
                state: next,
                resource: ResourceId::Image(self.id),
            });
        }

        if next == ResourceState::Done {
            self.observers.clear();
        }
    }
}

impl Object for Image {
    fn object_type(&self) -> ObjectType {
        ObjectType::Image
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_image_renders_until_done() {
        let image = Image::new("mem://a");
        image.set_loading();
        assert!(!image.can_render());

        image.finish_load(Ok(DecodedImage {
            width: 2,
            height: 1,
            pixels: vec![0; 8],
        }));
        assert!(image.can_render());
        assert_eq!(image.pixels().map(|p| p.len()), Some(8));

        image.release_pixels();
        assert!(image.pixels().is_none());
        assert!(image.can_render());

        image.destroy();
        assert_eq!(image.state(), ResourceState::Done);
        assert!(!image.can_render());
    }

    #[test]
    fn late_result_after_error_is_ignored() {
        let image = Image::new("missing.png");
        image.set_loading();
        image.finish_load(Err(ResourceError::FileNotFound("missing.png".into())));
        image.finish_load(Ok(DecodedImage {
            width: 1,
            height: 1,
            pixels: vec![0; 4],
        }));

        assert_eq!(image.state(), ResourceState::Error);
        assert_eq!(image.width(), 0);
        assert_eq!(image.error().map(|e| e.status()), Some(crate::Status::FileNotFound));
    }
}
