use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::bounded;
use lse_engine::config::{BuiltinFont, ThreadPoolConfig};
use lse_engine::core::style::{FontStyle, FontWeight};
use lse_engine::resource::decode::load_image;
use lse_engine::resource::thread_pool::TaskState;
use lse_engine::resource::{FontStore, ImageStore, ResourceEvent, ResourceId, ThreadPool};
use lse_engine::{ResourceError, ResourceState, Status};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const SVG_URI: &str = r#"data:image/svg+xml,<svg xmlns="http://www.w3.org/2000/svg" width="20" height="10"><rect width="20" height="10" fill="red"/></svg>"#;

fn write_png(dir: &TempDir, name: &str, width: u32, height: u32) -> String {
    let path = dir.path().join(name);
    let pixels = vec![0x80u8; (width * height * 4) as usize];

    image::save_buffer(&path, &pixels, width, height, image::ColorType::Rgba8).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn test_image_store_shares_and_counts_usages() {
    let dir = TempDir::new().unwrap();
    let uri = write_png(&dir, "a.png", 4, 3);
    let store = ImageStore::new(Rc::new(ThreadPool::inline()));

    let released = Arc::new(AtomicUsize::new(0));
    let counter = released.clone();
    store.add_observer(
        1,
        Arc::new(move |event: &ResourceEvent| {
            if event.state == ResourceState::Done {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }),
    );

    let first = store.acquire_image(&uri, true).unwrap();
    let second = store.acquire_image(&uri, true).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(store.usages(&uri), 2);
    assert_eq!(first.state(), ResourceState::Ready);
    assert_eq!((first.width(), first.height()), (4, 3));
    assert_eq!(first.pixels().map(|p| p.len()), Some(4 * 3 * 4));

    assert!(!store.release_image(&first));
    assert_eq!(store.usages(&uri), 1);
    assert_eq!(released.load(Ordering::SeqCst), 0);

    assert!(store.release_image(&second));
    assert!(!store.release_image(&second));
    assert_eq!(store.usages(&uri), 0);
    assert_eq!(released.load(Ordering::SeqCst), 1);
    assert!(store.get_image(&uri).is_none());
}

#[test]
fn test_missing_image_reports_file_not_found() {
    let dir = TempDir::new().unwrap();
    let uri = dir.path().join("missing.png").to_string_lossy().into_owned();
    let store = ImageStore::new(Rc::new(ThreadPool::inline()));

    let image = store.acquire_image(&uri, false).unwrap();

    assert_eq!(image.state(), ResourceState::Error);
    assert_eq!(image.error().map(|e| e.status()), Some(Status::FileNotFound));
    assert!(!image.can_render());
    assert!(store.acquire_image("", false).is_none());
}

#[test]
fn test_svg_data_uri_rasterizes_at_natural_size() {
    let decoded = load_image(SVG_URI).unwrap();

    assert_eq!((decoded.width, decoded.height), (20, 10));
    assert_eq!(decoded.pixels.len(), 20 * 10 * 4);
    // opaque red, straight alpha
    assert_eq!(&decoded.pixels[0..4], &[0xFF, 0x00, 0x00, 0xFF]);

    let err = load_image("data:image/svg+xml,<svg").unwrap_err();
    assert_eq!(err.status(), Status::ResSvgParse);
}

#[test]
fn test_destroyed_store_refuses_work() {
    let store = ImageStore::new(Rc::new(ThreadPool::inline()));
    let image = store.acquire_image(SVG_URI, false).unwrap();

    store.destroy();

    assert!(store.is_destroyed());
    assert_eq!(image.state(), ResourceState::Done);
    assert!(store.acquire_image(SVG_URI, false).is_none());
    assert!(store.is_empty());
}

#[test]
fn test_cancel_before_start_completes_once() {
    let pool = ThreadPool::new(&ThreadPoolConfig {
        workers: 1,
        ..ThreadPoolConfig::default()
    })
    .unwrap();

    let (release_tx, release_rx) = bounded::<()>(0);
    let blocker_done = Rc::new(std::cell::Cell::new(false));
    let cancelled_runs = Rc::new(std::cell::Cell::new(0));

    let flag = blocker_done.clone();
    let blocker = pool
        .queue(
            "blocker",
            move || release_rx.recv().is_ok(),
            move |outcome| flag.set(outcome.result == Some(true)),
        )
        .unwrap();

    let runs = cancelled_runs.clone();
    let victim = pool
        .queue("victim", || 42, move |outcome| {
            assert!(outcome.cancelled);
            assert_eq!(outcome.result, None);
            runs.set(runs.get() + 1);
        })
        .unwrap();

    // wait for the single worker to pick up the blocker
    let deadline = Instant::now() + Duration::from_secs(5);
    while blocker.state() == TaskState::Queued && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }

    pool.cancel(&victim);
    pool.cancel(&victim);

    assert_eq!(victim.state(), TaskState::Cancelled);
    assert_eq!(cancelled_runs.get(), 1);

    release_tx.send(()).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while !blocker_done.get() && Instant::now() < deadline {
        pool.process_completions();
        std::thread::sleep(Duration::from_millis(1));
    }

    assert!(blocker_done.get());
    assert_eq!(cancelled_runs.get(), 1);
    assert_eq!(pool.pending_count(), 0);
}

#[test]
fn test_last_release_cancels_pending_load() {
    let pool = Rc::new(
        ThreadPool::new(&ThreadPoolConfig {
            workers: 1,
            ..ThreadPoolConfig::default()
        })
        .unwrap(),
    );
    let store = ImageStore::new(pool.clone());

    let (release_tx, release_rx) = bounded::<()>(0);
    let blocker_done = Rc::new(std::cell::Cell::new(false));
    let flag = blocker_done.clone();
    let blocker = pool
        .queue("blocker", move || release_rx.recv().is_ok(), move |_| flag.set(true))
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while blocker.state() == TaskState::Queued && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }

    let store_events = Arc::new(AtomicUsize::new(0));
    let image_events = Arc::new(AtomicUsize::new(0));
    let counter = store_events.clone();
    store.add_observer(1, Arc::new(move |_: &ResourceEvent| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    // the only worker is busy, so the load stays queued
    let image = store.acquire_image(SVG_URI, true).unwrap();
    let counter = image_events.clone();
    image.add_observer(2, Arc::new(move |_: &ResourceEvent| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    assert_eq!(image.state(), ResourceState::Loading);

    assert!(store.release_image(&image));

    assert!(store.is_empty());
    assert_eq!(image.state(), ResourceState::Done);
    assert_eq!(store_events.load(Ordering::SeqCst), 1);
    assert_eq!(image_events.load(Ordering::SeqCst), 1);

    release_tx.send(()).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while !blocker_done.get() && Instant::now() < deadline {
        pool.process_completions();
        std::thread::sleep(Duration::from_millis(1));
    }
    pool.process_completions();

    assert!(blocker_done.get());
    assert_eq!(pool.pending_count(), 0);
    assert!(store.is_empty());
    assert!(store.get_image(SVG_URI).is_none());
    assert_eq!(image.state(), ResourceState::Done);
    assert_eq!((image.width(), image.height()), (0, 0));
    assert_eq!(store_events.load(Ordering::SeqCst), 1);
    assert_eq!(image_events.load(Ordering::SeqCst), 1);
}

#[test]
fn test_destroyed_pool_flushes_and_rejects() {
    let pool = ThreadPool::inline();
    pool.destroy();

    let err = pool.queue("late", || (), |_| {}).unwrap_err();
    assert_eq!(err, ResourceError::EndOfLife);
}

#[test]
fn test_font_store_keys_and_fallback() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("none.ttf").to_string_lossy().into_owned();
    let store = FontStore::new(&BuiltinFont::Synthetic, Rc::new(ThreadPool::inline()));
    let builtin = store.builtin().unwrap();

    let font = store
        .add_font(&missing, 0, "Body", FontStyle::Normal, FontWeight::Normal, false)
        .unwrap();
    assert_eq!(font.state(), ResourceState::Error);

    let err = store
        .add_font(&missing, 0, "body", FontStyle::Normal, FontWeight::Normal, false)
        .unwrap_err();
    assert_eq!(err.status(), Status::ResFontKey);

    // a failed face is never handed out
    let chosen = store.acquire_font("Body", FontStyle::Normal, FontWeight::Normal).unwrap();
    assert!(Arc::ptr_eq(&chosen, &builtin));
    assert_eq!(store.usages("Body", FontStyle::Normal, FontWeight::Normal), 0);

    assert!(store.get_font("BODY", FontStyle::Normal, FontWeight::Normal).is_some());
    assert!(store.get_font("Body", FontStyle::Italic, FontWeight::Bold).is_none());

    store.destroy();
    let err = store
        .add_font(&missing, 0, "Other", FontStyle::Normal, FontWeight::Bold, false)
        .unwrap_err();
    assert_eq!(err, ResourceError::EndOfLife);
}

#[test]
fn test_image_events_reach_node_observers() {
    let store = ImageStore::new(Rc::new(ThreadPool::inline()));
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = seen.clone();

    let image = store.acquire_image(SVG_URI, false).unwrap();
    image.add_observer(7, Arc::new(move |event: &ResourceEvent| sink.lock().push(*event)));

    store.release_image(&image);

    let events = seen.lock().clone();
    assert_eq!(
        events,
        vec![ResourceEvent {
            state: ResourceState::Done,
            resource: ResourceId::Image(image.id()),
        }]
    );
}
