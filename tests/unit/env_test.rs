use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;
use std::time::Duration;

use lse_engine::config::{EngineConfig, ThreadPoolConfig, WindowSettings};
use lse_engine::platform::{DisplayMode, Hat, InputEvent, Keyspace, MockVideo, MockVideoHandle, Scancode};
use lse_engine::renderer::{MockCall, MockRecorder};
use lse_engine::{Env, EnvState, Status};
use pretty_assertions::assert_eq;
use tempfile::NamedTempFile;

const PAD0_UUID: &str = "00000000000000000000000003000000";

fn inline_config() -> EngineConfig {
    EngineConfig {
        thread_pool: ThreadPoolConfig {
            workers: 0,
            ..ThreadPoolConfig::default()
        },
        ..EngineConfig::default()
    }
}

fn mock_env(config: EngineConfig) -> (Env, MockVideoHandle, MockRecorder) {
    let video = MockVideo::new();
    let handle = video.handle();
    let recorder = handle.recorder().clone();
    let mut env = Env::new(config).unwrap().with_video(Box::new(video));

    env.configure().unwrap();
    (env, handle, recorder)
}

#[test]
fn test_keyboard_events_reach_callback() {
    let (mut env, handle, _) = mock_env(inline_config());
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();

    env.set_on_keyboard_button(move |keyspace, key, pressed, repeat| {
        sink.borrow_mut().push((keyspace, key, pressed, repeat));
    });

    handle.press_key(Scancode::A as i32, false);
    assert!(env.keyboard().unwrap().scancode_state(Scancode::A as i32));

    handle.release_key(Scancode::A as i32);
    assert!(env.update());

    assert_eq!(
        *seen.borrow(),
        vec![
            (Keyspace::Scancode, Scancode::A as i32, true, false),
            (Keyspace::Scancode, Scancode::A as i32, false, false),
        ]
    );
    assert!(!env.keyboard().unwrap().scancode_state(Scancode::A as i32));

    env.reset_event_callbacks();
    handle.press_key(Scancode::B as i32, true);
    env.update();
    assert_eq!(seen.borrow().len(), 2);
}

#[test]
fn test_gamepad_hotplug_without_duplicates() {
    let (mut env, handle, _) = mock_env(inline_config());
    let status = Rc::new(RefCell::new(Vec::new()));
    let sink = status.clone();

    env.set_on_gamepad_status(move |gamepad, connected| sink.borrow_mut().push((gamepad.id(), connected)));
    assert_eq!(env.gamepad_count(), 1);

    // the gamepad opened at configure announces itself again
    handle.push_event(InputEvent::GamepadAdded { index: 0 });
    let index = handle.connect_gamepad();
    env.update();

    assert_eq!(index, 1);
    assert_eq!(env.gamepad_count(), 2);
    assert_eq!(*status.borrow(), vec![(1, true)]);

    handle.disconnect_gamepad(0);
    handle.disconnect_gamepad(0);
    env.update();

    assert_eq!(env.gamepad_count(), 1);
    assert_eq!(env.gamepad(0).map(|g| g.id()), Some(1));
    assert_eq!(*status.borrow(), vec![(1, true), (0, false)]);
}

#[test]
fn test_gamepad_motion_callbacks() {
    let (mut env, handle, _) = mock_env(inline_config());
    let axes = Rc::new(RefCell::new(Vec::new()));
    let hats = Rc::new(RefCell::new(Vec::new()));
    let axis_sink = axes.clone();
    let hat_sink = hats.clone();

    env.set_on_gamepad_axis_motion(move |id, _, axis, value| axis_sink.borrow_mut().push((id, axis, value)));
    env.set_on_gamepad_hat_motion(move |id, _, hat, value| hat_sink.borrow_mut().push((id, hat, value)));

    handle.push_event(InputEvent::GamepadAxis {
        id: 0,
        keyspace: Keyspace::Hardware,
        axis: 1,
        value: -0.5,
    });
    handle.push_event(InputEvent::GamepadHat {
        id: 0,
        keyspace: Keyspace::Hardware,
        hat: 0,
        value: Hat::UP | Hat::LEFT,
    });
    env.update();

    assert_eq!(*axes.borrow(), vec![(0, 1, -0.5)]);
    assert_eq!(*hats.borrow(), vec![(0, 0, Hat::UP | Hat::LEFT)]);
}

#[test]
fn test_quit_request_stops_update() {
    let (mut env, handle, recorder) = mock_env(inline_config());
    let window = env.add_window().unwrap();
    env.configure_window(window, &WindowSettings::with_size(64, 64)).unwrap();
    recorder.clear();

    handle.request_quit();

    assert!(!env.update());
    assert!(env.has_quit_request());
    assert!(!env.update());
    assert!(!recorder.calls().iter().any(|c| matches!(c, MockCall::Begin)));
}

#[test]
fn test_pause_skips_presents_but_polls_input() {
    let (mut env, handle, recorder) = mock_env(inline_config());
    let window = env.add_window().unwrap();
    env.configure_window(window, &WindowSettings::with_size(64, 64)).unwrap();

    let presses = Rc::new(RefCell::new(0));
    let sink = presses.clone();
    env.set_on_keyboard_button(move |_, _, _, _| *sink.borrow_mut() += 1);

    assert!(env.pause());
    assert_eq!(env.state(), EnvState::Paused);
    recorder.clear();

    handle.press_key(Scancode::Space as i32, false);
    assert!(env.update());

    assert_eq!(*presses.borrow(), 1);
    assert!(recorder.calls().is_empty());

    assert!(env.resume());
    env.update();
    assert!(recorder.calls().iter().any(|c| matches!(c, MockCall::Begin)));
}

#[test]
fn test_user_mapping_round_trip() {
    let (mut env, _, _) = mock_env(inline_config());
    let mapping = format!("{},Arcade Stick,a:b0,b:b1,", PAD0_UUID);

    assert_eq!(env.get_mapping(PAD0_UUID), None);
    assert!(env.set_mapping(PAD0_UUID, &mapping));
    assert_eq!(env.get_mapping(PAD0_UUID), Some(mapping.as_str()));
    assert_eq!(env.video().unwrap().get_mapping(PAD0_UUID), Some(mapping.clone()));

    // a line for another device is refused
    assert!(!env.set_mapping(PAD0_UUID, "ffff,Other,a:b0,"));

    assert!(env.reset_mapping(PAD0_UUID));
    assert_eq!(env.get_mapping(PAD0_UUID), None);
    assert_eq!(
        env.video().unwrap().get_mapping(PAD0_UUID),
        Some(format!("{},Gamepad,platform:Mock,", PAD0_UUID))
    );
    assert!(!env.reset_mapping(PAD0_UUID));
}

#[test]
fn test_mapping_file_loaded_at_configure() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "# controller db").unwrap();
    writeln!(file).unwrap();
    writeln!(file, "{},Fight Pad,a:b0,platform:Mock,", PAD0_UUID).unwrap();
    file.flush().unwrap();

    let config = EngineConfig {
        gamecontroller_db: Some(file.path().to_path_buf()),
        ..inline_config()
    };
    let (env, _, _) = mock_env(config);

    assert!(env
        .video()
        .unwrap()
        .get_mapping(PAD0_UUID)
        .is_some_and(|m| m.contains("Fight Pad")));
    // file mappings are not user mappings
    assert_eq!(env.get_mapping(PAD0_UUID), None);
}

#[test]
fn test_video_queries_follow_configuration() {
    let video = MockVideo::new();
    let mut env = Env::new(inline_config()).unwrap().with_video(Box::new(video));

    assert_eq!(env.display_count(), 0);
    assert_eq!(env.video_driver(0), None);

    env.configure().unwrap();

    assert_eq!(env.display_count(), 1);
    assert_eq!(env.display_name(0), Some("mock_display"));
    assert_eq!(env.desktop_display_mode(0), Some(DisplayMode::new(1280, 720, 60)));
    assert_eq!(env.find_closest_display_mode(0, 1, 1), Some(DisplayMode::new(1280, 720, 60)));
    assert_eq!(env.display_mode(0, 1), None);
    assert_eq!(env.renderer_count(), 1);
    assert_eq!(env.renderer_info(0).map(|r| r.name), Some("mock renderer".to_string()));

    let err = env.configure().unwrap_err();
    assert_eq!(err.status(), Status::AlreadyConfigured);
}

#[test]
fn test_windows_need_configured_env() {
    let mut env = Env::new(inline_config()).unwrap().with_video(Box::new(MockVideo::new()));
    let window = env.add_window().unwrap();

    let err = env.configure_window(window, &WindowSettings::with_size(10, 10)).unwrap_err();
    assert_eq!(err.status(), Status::IllegalArgument);

    env.configure().unwrap();
    env.configure_window(window, &WindowSettings::with_size(10, 10)).unwrap();

    assert_eq!(env.window(window).map(|w| (w.width(), w.height())), Some((10, 10)));
    assert!(env.remove_window(window));
    assert!(!env.remove_window(window));
    assert_eq!(env.window_count(), 0);
}

#[tokio::test]
async fn test_frame_loop_under_tokio() {
    let (mut env, handle, recorder) = mock_env(inline_config());
    let window = env.add_window().unwrap();
    env.configure_window(window, &WindowSettings::with_size(32, 32)).unwrap();

    let mut ticker = tokio::time::interval(Duration::from_millis(1));
    let mut frames = 0;

    loop {
        ticker.tick().await;

        if frames == 3 {
            handle.request_quit();
        }

        if !env.update() {
            break;
        }

        frames += 1;
    }

    assert_eq!(frames, 3);
    assert_eq!(recorder.calls().iter().filter(|c| matches!(c, MockCall::Begin)).count(), 3);

    env.destroy();
    assert!(env.is_destroyed());
    assert_eq!(env.state(), EnvState::Done);
    assert!(!env.update());
}
