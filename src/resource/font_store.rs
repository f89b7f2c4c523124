use std::cell::{Cell, RefCell};
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use ahash::AHashMap;
use tracing::{debug, warn};

use crate::config::BuiltinFont;
use crate::core::style::{FontStyle, FontWeight};
use crate::object::{Object, ObjectType};

use super::font::{Font, FontFace, FontInfo};
use super::thread_pool::{TaskHandle, ThreadPool};
use super::{ResourceError, ResourceState};

const STYLES: usize = 3;
const WEIGHTS: usize = 2;

#[derive(Debug)]
struct FontSlot {
    font: Arc<Font>,
    task: Option<TaskHandle>,
    usages: usize,
}

#[derive(Debug, Default)]
struct Family {
    slots: [[Option<FontSlot>; WEIGHTS]; STYLES],
}

impl Family {
    fn slot(&self, style: FontStyle, weight: FontWeight) -> Option<&FontSlot> {
        self.slots[style as usize][weight as usize].as_ref()
    }

    fn slot_mut(&mut self, style: FontStyle, weight: FontWeight) -> &mut Option<FontSlot> {
        &mut self.slots[style as usize][weight as usize]
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut FontSlot> {
        self.slots.iter_mut().flatten().filter_map(Option::as_mut)
    }
}

/// Font registry keyed by family, style and weight, with a builtin fallback.
#[derive(Debug)]
pub struct FontStore {
    pool: Rc<ThreadPool>,
    builtin: RefCell<Option<Arc<Font>>>,
    families: RefCell<AHashMap<String, Family>>,
    destroyed: Cell<bool>,
}

impl FontStore {
    /// Creates the store and decodes the builtin font synchronously. A
    /// builtin that cannot be loaded falls back to the synthetic face.
    pub fn new(builtin: &BuiltinFont, pool: Rc<ThreadPool>) -> Self {
        let font = match load_builtin(builtin) {
            Ok(font) => font,
            Err(e) => {
                warn!("builtin font {:?} unavailable ({}), using synthetic face", builtin, e);
                Font::synthetic("builtin")
            }
        };

        Self {
            pool,
            builtin: RefCell::new(Some(Arc::new(font))),
            families: RefCell::new(AHashMap::new()),
            destroyed: Cell::new(false),
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    pub fn builtin(&self) -> Option<Arc<Font>> {
        self.builtin.borrow().clone()
    }

    /// Registers a font file under a family/style/weight key and starts
    /// loading it.
    pub fn add_font(
        &self,
        uri: &str,
        index: u32,
        family: &str,
        style: FontStyle,
        weight: FontWeight,
        is_async: bool,
    ) -> Result<Arc<Font>, ResourceError> {
        if self.destroyed.get() {
            return Err(ResourceError::EndOfLife);
        }

        let key = family.to_ascii_lowercase();

        if self.families.borrow().get(&key).is_some_and(|f| f.slot(style, weight).is_some()) {
            return Err(ResourceError::FontKey {
                family: family.to_string(),
                style,
                weight,
            });
        }

        let font = Arc::new(Font::new(FontInfo {
            family: family.to_string(),
            style,
            weight,
            uri: uri.to_string(),
            index,
        }));
        font.set_loading();

        *self.families.borrow_mut().entry(key.clone()).or_default().slot_mut(style, weight) = Some(FontSlot {
            font: font.clone(),
            task: None,
            usages: 0,
        });

        let path = uri.to_string();

        if is_async {
            let target = font.clone();
            let task = self.pool.queue(
                "font",
                move || read_face(&path, index),
                move |outcome| {
                    if outcome.cancelled {
                        return;
                    }

                    if let Some(result) = outcome.result {
                        target.finish_load(result);
                    }
                },
            )?;

            if let Some(slot) = self.families.borrow_mut().get_mut(&key).and_then(|f| f.slot_mut(style, weight).as_mut()) {
                if slot.font.state() == ResourceState::Loading {
                    slot.task = Some(task);
                }
            }
        } else {
            font.finish_load(read_face(&path, index));
        }

        debug!("font '{}' registered from {}", family, uri);
        Ok(font)
    }

    /// Best font for the key: the exact slot, else any usable font of the
    /// family, else the builtin.
    pub fn acquire_font(&self, family: &str, style: FontStyle, weight: FontWeight) -> Option<Arc<Font>> {
        if self.destroyed.get() {
            return None;
        }

        let usable = |slot: &FontSlot| matches!(slot.font.state(), ResourceState::Ready | ResourceState::Loading);
        let mut families = self.families.borrow_mut();

        if let Some(entry) = families.get_mut(&family.to_ascii_lowercase()) {
            let exact = entry.slot_mut(style, weight).as_mut().filter(|slot| usable(slot));

            if let Some(slot) = exact {
                slot.usages += 1;
                return Some(slot.font.clone());
            }

            if let Some(slot) = entry.iter_mut().find(|slot| usable(slot)) {
                slot.usages += 1;
                return Some(slot.font.clone());
            }
        }

        self.builtin()
    }

    pub fn release_font(&self, font: &Arc<Font>) {
        let info = font.info();
        let mut families = self.families.borrow_mut();

        if let Some(slot) = families
            .get_mut(&info.family.to_ascii_lowercase())
            .and_then(|f| f.slot_mut(info.style, info.weight).as_mut())
            .filter(|slot| Arc::ptr_eq(&slot.font, font))
        {
            slot.usages = slot.usages.saturating_sub(1);
        }
    }

    /// Exact lookup, no fallback.
    pub fn get_font(&self, family: &str, style: FontStyle, weight: FontWeight) -> Option<Arc<Font>> {
        self.families
            .borrow()
            .get(&family.to_ascii_lowercase())
            .and_then(|f| f.slot(style, weight))
            .map(|slot| slot.font.clone())
    }

    pub fn usages(&self, family: &str, style: FontStyle, weight: FontWeight) -> usize {
        self.families
            .borrow()
            .get(&family.to_ascii_lowercase())
            .and_then(|f| f.slot(style, weight))
            .map_or(0, |slot| slot.usages)
    }

    pub fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }

        let families = std::mem::take(&mut *self.families.borrow_mut());

        for (_, mut family) in families {
            for slot in family.iter_mut() {
                if let Some(task) = slot.task.take() {
                    self.pool.cancel(&task);
                }

                slot.font.destroy();
            }
        }

        if let Some(builtin) = self.builtin.borrow_mut().take() {
            builtin.destroy();
        }
    }
}

impl Object for FontStore {
    fn object_type(&self) -> ObjectType {
        ObjectType::FontStore
    }
}

fn read_face(path: &str, index: u32) -> Result<FontFace, ResourceError> {
    let data = std::fs::read(path).map_err(|e| ResourceError::from_io(path, &e))?;

    FontFace::parse(data, index)
}

fn load_builtin(builtin: &BuiltinFont) -> Result<Font, ResourceError> {
    let (family, uri, face) = match builtin {
        BuiltinFont::Synthetic => return Ok(Font::synthetic("builtin")),
        BuiltinFont::File { path, index } => {
            let uri = path.display().to_string();
            (builtin_family(path), uri.clone(), read_face(&uri, *index)?)
        }
        BuiltinFont::System { family } => {
            let mut db = fontdb::Database::new();
            db.load_system_fonts();

            let query = fontdb::Query {
                families: &[fontdb::Family::Name(family.as_str())],
                ..fontdb::Query::default()
            };
            let id = db
                .query(&query)
                .ok_or_else(|| ResourceError::FontUnavailable(family.clone()))?;
            let (data, index) = db
                .with_face_data(id, |data, index| (data.to_vec(), index))
                .ok_or_else(|| ResourceError::FontUnavailable(family.clone()))?;

            (family.clone(), family.clone(), FontFace::parse(data, index)?)
        }
    };

    let font = Font::new(FontInfo {
        family,
        style: FontStyle::Normal,
        weight: FontWeight::Normal,
        uri,
        index: 0,
    });
    font.set_loading();
    font.finish_load(Ok(face));

    Ok(font)
}

fn builtin_family(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "builtin".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> FontStore {
        FontStore::new(&BuiltinFont::Synthetic, Rc::new(ThreadPool::inline()))
    }

    #[test]
    fn missing_family_falls_back_to_builtin() {
        let store = store();
        let font = store.acquire_font("Nope", FontStyle::Normal, FontWeight::Normal).unwrap();

        assert!(Arc::ptr_eq(&font, &store.builtin().unwrap()));
        assert!(font.is_ready());
    }

    #[test]
    fn failed_font_is_skipped_and_slot_stays_taken() {
        let store = store();
        let font = store
            .add_font("/no/such/font.ttf", 0, "Sans", FontStyle::Normal, FontWeight::Bold, false)
            .unwrap();

        assert_eq!(font.state(), ResourceState::Error);
        assert_eq!(
            store
                .add_font("/other.ttf", 0, "sans", FontStyle::Normal, FontWeight::Bold, false)
                .unwrap_err()
                .status(),
            crate::Status::ResFontKey
        );

        let fallback = store.acquire_font("Sans", FontStyle::Normal, FontWeight::Bold).unwrap();
        assert!(Arc::ptr_eq(&fallback, &store.builtin().unwrap()));
    }

    #[test]
    fn destroyed_store_refuses_work() {
        let store = store();
        store.destroy();

        assert!(store.acquire_font("x", FontStyle::Normal, FontWeight::Normal).is_none());
        assert_eq!(
            store
                .add_font("a.ttf", 0, "x", FontStyle::Normal, FontWeight::Normal, true)
                .unwrap_err(),
            ResourceError::EndOfLife
        );
    }
}
