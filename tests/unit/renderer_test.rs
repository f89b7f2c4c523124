use lse_engine::config::{EngineConfig, ThreadPoolConfig, WindowSettings};
use lse_engine::core::color::Color;
use lse_engine::core::geometry::RectF;
use lse_engine::core::matrix::Matrix;
use lse_engine::platform::HeadlessVideo;
use lse_engine::renderer::{
    Graphics, GraphicsContainer, GraphicsError, GraphicsState, MockCall, MockGraphics, MockRecorder, RenderCommandKind,
    SoftwareGraphicsContainer,
};
use lse_engine::{Env, Status, WindowId};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn headless_env(width: u32, height: u32) -> (Env, WindowId) {
    let config = EngineConfig {
        thread_pool: ThreadPoolConfig {
            workers: 0,
            ..ThreadPoolConfig::default()
        },
        ..EngineConfig::default()
    };
    let mut env = Env::new(config).unwrap().with_video(Box::new(HeadlessVideo::new()));

    env.configure().unwrap();
    let window = env.add_window().unwrap();
    env.configure_window(window, &WindowSettings::with_size(width, height)).unwrap();

    (env, window)
}

fn pixel(frame: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
    let i = ((y * width + x) * 4) as usize;
    [frame[i], frame[i + 1], frame[i + 2], frame[i + 3]]
}

#[test]
fn test_software_frame_composites_boxes() {
    let (mut env, id) = headless_env(20, 20);
    let window = env.window_mut(id).unwrap();
    let root = window.root();
    let node = window.create_node_from_tag("box").unwrap();

    window.set_style_named(root, "backgroundColor", "#0000ff").unwrap();
    window.set_style_named(node, "width", "10px").unwrap();
    window.set_style_named(node, "height", "10px").unwrap();
    window.set_style_named(node, "backgroundColor", "#ff0000").unwrap();
    window.append(root, node).unwrap();

    assert!(env.update());

    let frame = env.window(id).unwrap().graphics_container().unwrap().frame().unwrap().to_vec();

    assert_eq!(frame.len(), 20 * 20 * 4);
    assert_eq!(pixel(&frame, 20, 5, 5), [0xFF, 0x00, 0x00, 0xFF]);
    assert_eq!(pixel(&frame, 20, 15, 15), [0x00, 0x00, 0xFF, 0xFF]);

    // nothing dirty, same pixels
    assert!(env.update());
    let again = env.window(id).unwrap().graphics_container().unwrap().frame().unwrap();
    assert_eq!(again, frame.as_slice());
}

#[test]
fn test_software_frame_saves_png() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("frame.png");
    let (mut env, id) = headless_env(8, 4);
    let window = env.window_mut(id).unwrap();
    let root = window.root();

    window.set_style_named(root, "backgroundColor", "#00ff00").unwrap();
    env.update();

    let container = env.window(id).unwrap().graphics_container().unwrap();
    container.save_png(&path).unwrap();

    let saved = image::open(&path).unwrap().to_rgba8();
    assert_eq!(saved.dimensions(), (8, 4));
    assert_eq!(saved.get_pixel(3, 2).0, [0x00, 0xFF, 0x00, 0xFF]);
}

#[test]
fn test_container_without_frame_cannot_save() {
    let dir = TempDir::new().unwrap();
    let mut container = SoftwareGraphicsContainer::new();
    container.configure(&WindowSettings::with_size(4, 4)).unwrap();

    let err = container.save_png(&dir.path().join("x.png")).unwrap_err();
    assert_eq!(err.status(), Status::IllegalArgument);

    container.destroy();
    assert!(container.is_destroyed());
    assert_eq!(
        container.configure(&WindowSettings::with_size(4, 4)),
        Err(GraphicsError::EndOfLife)
    );
}

#[test]
fn test_state_stack_accumulates() {
    let mut state = GraphicsState::new();

    state.push();
    state.set_matrix(&Matrix::translate(10.0, 5.0));
    state.set_opacity(0.5);
    state.set_clip_rect(&RectF::new(0.0, 0.0, 20.0, 20.0));

    state.push();
    state.set_opacity(0.5);
    state.set_clip_rect(&RectF::new(5.0, 5.0, 40.0, 40.0));

    assert_eq!(state.depth(), 3);
    assert_eq!(state.current().opacity, 0.25);
    assert_eq!(state.current().clip, Some(RectF::new(15.0, 10.0, 15.0, 15.0)));

    state.pop();
    state.pop();
    state.pop();

    assert_eq!(state.depth(), 1);
    assert_eq!(state.current().opacity, 1.0);
    assert_eq!(state.current().clip, None);
    assert!(state.current().matrix.is_identity());
}

#[test]
fn test_empty_queue_releases_previous_object() {
    let recorder = MockRecorder::new();
    let mut graphics = MockGraphics::new(recorder.clone());

    graphics.begin_queue();
    graphics.queue_fill_rect(RectF::new(0.0, 0.0, 4.0, 4.0), Color::WHITE);
    assert_eq!(graphics.render_queue().single().map(|c| c.kind()), Some(RenderCommandKind::FillRect));

    let object = graphics.end_queue(4, 4, None).unwrap();
    let id = object.id();

    graphics.begin_queue();
    assert!(graphics.end_queue(4, 4, Some(object)).is_none());

    let calls = recorder.calls();
    assert!(calls.iter().any(|c| matches!(c, MockCall::DestroyObject(d) if *d == id)));
    assert_eq!(recorder.painted_queues().len(), 1);
}
