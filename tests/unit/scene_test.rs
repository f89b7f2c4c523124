use lse_engine::config::{EngineConfig, ThreadPoolConfig, WindowSettings};
use lse_engine::core::color::Color;
use lse_engine::core::geometry::RectF;
use lse_engine::core::style::Style;
use lse_engine::platform::MockVideo;
use lse_engine::renderer::{MockCall, MockRecorder, RenderCommand};
use lse_engine::{Env, NodeKind, Status, StyleProperty, WindowId};
use pretty_assertions::assert_eq;

const RED: Color = Color(0xFF00_00FF);

fn mock_env(width: u32, height: u32) -> (Env, WindowId, MockRecorder) {
    let config = EngineConfig {
        thread_pool: ThreadPoolConfig {
            workers: 0,
            ..ThreadPoolConfig::default()
        },
        ..EngineConfig::default()
    };
    let video = MockVideo::new();
    let recorder = video.handle().recorder().clone();
    let mut env = Env::new(config).unwrap().with_video(Box::new(video));

    env.configure().unwrap();
    let window = env.add_window().unwrap();
    env.configure_window(window, &WindowSettings::with_size(width, height)).unwrap();

    (env, window, recorder)
}

#[test]
fn test_red_box_paints_once() {
    let (mut env, id, recorder) = mock_env(320, 240);
    let window = env.window_mut(id).unwrap();
    let root = window.root();
    let node = window.create_node(NodeKind::Box).unwrap();

    window.set_style_named(node, "width", "100px").unwrap();
    window.set_style_named(node, "height", "100px").unwrap();
    window.set_style_color(node, StyleProperty::BackgroundColor, RED).unwrap();
    window.append(root, node).unwrap();

    assert!(env.update());

    let window = env.window(id).unwrap();
    assert_eq!(window.bounds(node).unwrap(), RectF::new(0.0, 0.0, 100.0, 100.0));
    assert!(!window.needs_update());

    let queues = recorder.painted_queues();
    assert_eq!(queues.len(), 1);
    assert_eq!(queues[0].len(), 1);
    assert!(matches!(queues[0][0], RenderCommand::FillRect { color, .. } if color == RED));
    assert_eq!(recorder.draws().len(), 1);

    recorder.clear();
    assert!(env.update());

    assert!(recorder.painted_queues().is_empty());
    assert!(!recorder.calls().iter().any(|c| matches!(c, MockCall::Clear(_))));
}

#[test]
fn test_rem_text_follows_root_font_size() {
    let (mut env, id, _recorder) = mock_env(320, 240);
    let window = env.window_mut(id).unwrap();
    let root = window.root();
    let text = window.create_node_from_tag("text").unwrap();

    window.set_text(text, "Hello").unwrap();
    window.set_style_named(text, "fontSize", "2rem").unwrap();
    window.append(root, text).unwrap();
    env.update();

    let before = env.window(id).unwrap().bounds(text).unwrap().height;
    assert!((before - 38.4).abs() <= 0.5, "height at 16px root: {}", before);

    let window = env.window_mut(id).unwrap();
    window.set_style_named(root, "fontSize", "20px").unwrap();
    assert_eq!(window.style_context().root_font_size, 20.0);
    env.update();

    let after = env.window(id).unwrap().bounds(text).unwrap().height;
    assert!(after > before);
    assert_eq!(after, 48.0);
}

#[test]
fn test_graph_violations_report_operation_status() {
    let (mut env, id, _recorder) = mock_env(100, 100);
    let other = env.add_window().unwrap();
    let foreign = env.window_mut(other).unwrap().create_node(NodeKind::Box).unwrap();

    let window = env.window_mut(id).unwrap();
    let root = window.root();
    let text = window.create_node(NodeKind::Text).unwrap();
    let child = window.create_node(NodeKind::Box).unwrap();
    let stray = window.create_node(NodeKind::Box).unwrap();

    let err = window.append(text, child).unwrap_err();
    assert_eq!(err.status(), Status::NodeAppendChild);

    let err = window.append(root, foreign).unwrap_err();
    assert_eq!(err.status(), Status::NodeAppendChild);

    window.append(root, child).unwrap();
    let err = window.remove_child(root, stray).unwrap_err();
    assert_eq!(err.status(), Status::NodeRemoveChild);

    let err = window.insert_before(root, stray, text).unwrap_err();
    assert_eq!(err.status(), Status::NodeInsertChild);

    assert_eq!(window.child_count(root).unwrap(), 1);
    assert_eq!(window.parent(child).unwrap(), Some(root));
}

#[test]
fn test_display_none_skips_draw() {
    let (mut env, id, recorder) = mock_env(200, 200);
    let window = env.window_mut(id).unwrap();
    let root = window.root();
    let node = window.create_node(NodeKind::Box).unwrap();

    window.set_style_named(node, "width", "50px").unwrap();
    window.set_style_named(node, "height", "50px").unwrap();
    window.set_style_named(node, "backgroundColor", "red").unwrap();
    window.set_style_named(node, "display", "none").unwrap();
    window.append(root, node).unwrap();
    env.update();

    assert!(recorder.draws().is_empty());
}

#[test]
fn test_class_parent_supplies_background() {
    let (mut env, id, recorder) = mock_env(200, 200);
    let mut class = Style::new_class();
    class.set_color(StyleProperty::BackgroundColor, RED).unwrap();
    class.set_named_from_string("width", "10px").unwrap();
    class.set_named_from_string("height", "10px").unwrap();
    let class = class.into_ref();

    let window = env.window_mut(id).unwrap();
    let root = window.root();
    let node = window.create_node(NodeKind::Box).unwrap();
    window.append(root, node).unwrap();
    window.set_style_parent(node, Some(class)).unwrap();
    env.update();

    assert_eq!(env.window(id).unwrap().bounds(node).unwrap().width, 10.0);
    assert!(recorder
        .painted_queues()
        .iter()
        .flatten()
        .any(|c| matches!(c, RenderCommand::FillRect { color, .. } if *color == RED)));
}

#[test]
fn test_image_node_sizes_to_svg_and_releases_on_destroy() {
    let uri = r#"data:image/svg+xml,<svg xmlns="http://www.w3.org/2000/svg" width="20" height="10"><rect width="20" height="10" fill="red"/></svg>"#;
    let (mut env, id, recorder) = mock_env(200, 200);
    let window = env.window_mut(id).unwrap();
    let root = window.root();
    let image = window.create_node_from_tag("img").unwrap();

    window.set_style_named(root, "alignItems", "flex-start").unwrap();
    window.set_src(image, Some(uri)).unwrap();
    window.append(root, image).unwrap();
    env.update();
    env.update();

    let window = env.window_mut(id).unwrap();
    assert_eq!(window.bounds(image).unwrap(), RectF::new(0.0, 0.0, 20.0, 10.0));
    assert_eq!(window.image_store().usages(uri), 1);

    window.destroy_node(image).unwrap();
    assert_eq!(window.image_store().usages(uri), 0);
    assert!(window.image_store().is_empty());

    env.update();
    assert!(recorder.calls().iter().any(|c| matches!(c, MockCall::RemoveImage(_))));
}
