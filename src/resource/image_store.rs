use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use ahash::AHashMap;
use tracing::debug;

use crate::object::{Object, ObjectType};

use super::decode::load_image;
use super::image::Image;
use super::thread_pool::{TaskHandle, ThreadPool};
use super::{Observer, Observers, ResourceEvent, ResourceId, ResourceState};

#[derive(Debug)]
struct Entry {
    image: Arc<Image>,
    usages: usize,
    task: Option<TaskHandle>,
}

/// Reference-counted image cache keyed by uri.
#[derive(Debug)]
pub struct ImageStore {
    pool: Rc<ThreadPool>,
    entries: RefCell<AHashMap<String, Entry>>,
    observers: Observers,
    destroyed: Cell<bool>,
}

impl ImageStore {
    pub fn new(pool: Rc<ThreadPool>) -> Self {
        Self {
            pool,
            entries: RefCell::new(AHashMap::new()),
            observers: Observers::default(),
            destroyed: Cell::new(false),
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    /// Returns the shared image for `uri`, starting a load on first use.
    /// Every call counts one usage.
    pub fn acquire_image(&self, uri: &str, is_async: bool) -> Option<Arc<Image>> {
        if self.destroyed.get() || uri.is_empty() {
            return None;
        }

        if let Some(entry) = self.entries.borrow_mut().get_mut(uri) {
            entry.usages += 1;
            return Some(entry.image.clone());
        }

        let image = Arc::new(Image::new(uri));
        image.set_loading();

        self.entries.borrow_mut().insert(
            uri.to_string(),
            Entry {
                image: image.clone(),
                usages: 1,
                task: None,
            },
        );

        if is_async {
            let path = uri.to_string();
            let target = image.clone();
            let queued = self.pool.queue(
                "image",
                move || load_image(&path),
                move |outcome| {
                    if outcome.cancelled {
                        return;
                    }

                    if let Some(result) = outcome.result {
                        target.finish_load(result);
                    }
                },
            );

            match queued {
                Ok(task) => {
                    if let Some(entry) = self.entries.borrow_mut().get_mut(uri) {
                        if entry.image.state() == ResourceState::Loading {
                            entry.task = Some(task);
                        }
                    }
                }
                Err(e) => image.finish_load(Err(e)),
            }
        } else {
            image.finish_load(load_image(uri));
        }

        debug!("image {} acquired ({:?})", uri, image.state());
        Some(image)
    }

    /// Drops one usage. The last release cancels any load, marks the image
    /// done and notifies store observers. Returns whether the image was
    /// removed.
    pub fn release_image(&self, image: &Arc<Image>) -> bool {
        let removed = {
            let mut entries = self.entries.borrow_mut();

            let Some(entry) = entries.get_mut(image.uri()).filter(|e| Arc::ptr_eq(&e.image, image)) else {
                return false;
            };

            entry.usages = entry.usages.saturating_sub(1);

            if entry.usages > 0 {
                return false;
            }

            entries.remove(image.uri())
        };

        let Some(entry) = removed else {
            return false;
        };

        if let Some(task) = entry.task {
            self.pool.cancel(&task);
        }

        entry.image.destroy();
        self.observers.dispatch(&ResourceEvent {
            state: ResourceState::Done,
            resource: ResourceId::Image(entry.image.id()),
        });

        debug!("image {} released", entry.image.uri());
        true
    }

    pub fn get_image(&self, uri: &str) -> Option<Arc<Image>> {
        self.entries.borrow().get(uri).map(|e| e.image.clone())
    }

    pub fn usages(&self, uri: &str) -> usize {
        self.entries.borrow().get(uri).map_or(0, |e| e.usages)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store-level observers hear about images leaving the cache, which is
    /// how graphics backends drop their textures.
    pub fn add_observer(&self, key: u64, observer: Observer) {
        self.observers.add(key, observer);
    }

    pub fn remove_observer(&self, key: u64) -> bool {
        self.observers.remove(key)
    }

    pub fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }

        let entries = std::mem::take(&mut *self.entries.borrow_mut());

        for (_, entry) in entries {
            if let Some(task) = entry.task {
                self.pool.cancel(&task);
            }

            entry.image.destroy();
            self.observers.dispatch(&ResourceEvent {
                state: ResourceState::Done,
                resource: ResourceId::Image(entry.image.id()),
            });
        }

        self.observers.clear();
    }
}

impl Object for ImageStore {
    fn object_type(&self) -> ObjectType {
        ObjectType::ImageStore
    }
}
