//! Shared, asynchronously loaded assets.
//!
//! Fonts and images are owned by their store and handed out as `Arc`s. Loads
//! run on the [`ThreadPool`](thread_pool::ThreadPool); completions, state
//! changes and observer callbacks all happen on the thread that owns the
//! stores.

pub mod decode;
pub mod font;
pub mod font_store;
pub mod image;
pub mod image_store;
pub mod thread_pool;

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::core::node::NodeId;
use crate::Status;

pub use font::{Font, FontInfo};
pub use font_store::FontStore;
pub use image::Image;
pub use image_store::ImageStore;
pub use thread_pool::{TaskHandle, TaskOutcome, ThreadPool};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceState {
    Init,
    Loading,
    Ready,
    Error,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceId {
    Font(u64),
    Image(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceEvent {
    pub state: ResourceState,
    pub resource: ResourceId,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResourceError {
    #[error("Resource owner has been destroyed")]
    EndOfLife,
    #[error("File not found: {0}")]
    FileNotFound(String),
    #[error("Failed to read {0}")]
    FileRead(String),
    #[error("Failed to parse SVG: {0}")]
    SvgParse(String),
    #[error("Font slot already taken: {family} {style:?} {weight:?}")]
    FontKey {
        family: String,
        style: crate::core::style::FontStyle,
        weight: crate::core::style::FontWeight,
    },
    #[error("Font unavailable: {0}")]
    FontUnavailable(String),
    #[error("Unsupported image format: {0}")]
    UnsupportedImageFormat(String),
    #[error("Worker pool: {0}")]
    Pool(String),
}

impl ResourceError {
    pub fn status(&self) -> Status {
        match self {
            ResourceError::EndOfLife => Status::Eol,
            ResourceError::FileNotFound(_) => Status::FileNotFound,
            ResourceError::FileRead(_) => Status::FileRead,
            ResourceError::SvgParse(_) => Status::ResSvgParse,
            ResourceError::FontKey { .. } => Status::ResFontKey,
            ResourceError::FontUnavailable(_) => Status::ResFontUnavailable,
            ResourceError::UnsupportedImageFormat(_) => Status::UnsupportedImageFormat,
            ResourceError::Pool(_) => Status::SubsystemError,
        }
    }

    pub(crate) fn from_io(path: &str, e: &std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            ResourceError::FileNotFound(path.to_string())
        } else {
            ResourceError::FileRead(format!("{}: {}", path, e))
        }
    }
}

pub type Observer = Arc<dyn Fn(&ResourceEvent) + Send + Sync>;

/// Keyed observer list. Dispatch runs on a snapshot, so an observer may
/// add or remove observers while being called.
#[derive(Default)]
pub struct Observers {
    list: Mutex<Vec<(u64, Observer)>>,
}

impl Observers {
    /// Registers `observer` under `key`, replacing any previous one.
    pub fn add(&self, key: u64, observer: Observer) {
        let mut list = self.list.lock();

        match list.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = observer,
            None => list.push((key, observer)),
        }
    }

    pub fn remove(&self, key: u64) -> bool {
        let mut list = self.list.lock();
        let before = list.len();

        list.retain(|(k, _)| *k != key);
        list.len() != before
    }

    pub fn dispatch(&self, event: &ResourceEvent) {
        let snapshot: Vec<Observer> = self.list.lock().iter().map(|(_, o)| o.clone()).collect();

        for observer in snapshot {
            observer(event);
        }
    }

    pub fn clear(&self) {
        self.list.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.list.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Observers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers").field("len", &self.len()).finish()
    }
}

/// Resource events addressed to nodes, waiting for the owning window.
#[derive(Debug, Clone, Default)]
pub struct EventInbox {
    queue: Arc<Mutex<Vec<(NodeId, ResourceEvent)>>>,
}

impl EventInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observer that files every event under `node`.
    pub fn observer(&self, node: NodeId) -> Observer {
        let queue = Arc::clone(&self.queue);

        Arc::new(move |event: &ResourceEvent| queue.lock().push((node, *event)))
    }

    pub fn drain(&self) -> Vec<(NodeId, ResourceEvent)> {
        std::mem::take(&mut *self.queue.lock())
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn observers_replace_by_key_and_survive_removal_during_dispatch() {
        let observers = Arc::new(Observers::default());
        let hits = Arc::new(AtomicUsize::new(0));
        let event = ResourceEvent {
            state: ResourceState::Ready,
            resource: ResourceId::Image(1),
        };

        let h = hits.clone();
        observers.add(7, Arc::new(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        let h = hits.clone();
        observers.add(7, Arc::new(move |_| {
            h.fetch_add(10, Ordering::SeqCst);
        }));

        let weak = Arc::downgrade(&observers);
        observers.add(8, Arc::new(move |_| {
            if let Some(o) = weak.upgrade() {
                o.remove(8);
            }
        }));

        observers.dispatch(&event);

        assert_eq!(hits.load(Ordering::SeqCst), 10);
        assert_eq!(observers.len(), 1);
    }

    #[test]
    fn inbox_files_events_per_node() {
        let inbox = EventInbox::new();
        let observer = inbox.observer(NodeId(3));
        let event = ResourceEvent {
            state: ResourceState::Error,
            resource: ResourceId::Font(2),
        };

        observer(&event);

        assert_eq!(inbox.drain(), vec![(NodeId(3), event)]);
        assert!(inbox.is_empty());
    }

    #[test]
    fn io_errors_map_to_file_statuses() {
        let missing = std::io::Error::from(std::io::ErrorKind::NotFound);
        let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);

        assert_eq!(ResourceError::from_io("a", &missing).status(), Status::FileNotFound);
        assert_eq!(ResourceError::from_io("a", &denied).status(), Status::FileRead);
    }
}
