use std::env;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use tokio::signal;
use tracing::{error, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use lse_engine::config::{EngineConfig, VideoBackend, WindowSettings};
use lse_engine::{Env, WindowId};

#[derive(Debug, Clone)]
struct AppConfig {
    config_file: Option<PathBuf>,
    backend: Option<VideoBackend>,
    width: u32,
    height: u32,
    frames: Option<u64>,
    png: Option<PathBuf>,
    image: Option<String>,
    text: String,
    log_level: Option<Level>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_file: None,
            backend: None,
            width: 640,
            height: 360,
            frames: None,
            png: None,
            image: None,
            text: "Light Source Engine".to_string(),
            log_level: None,
        }
    }
}

impl AppConfig {
    fn from_args() -> anyhow::Result<Self> {
        let args: Vec<String> = env::args().collect();
        let mut config = Self::default();

        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1).cloned();

            match args[i].as_str() {
                "--config" => config.config_file = value.map(PathBuf::from),
                "--backend" => {
                    config.backend = match value.as_deref() {
                        Some("mock") => Some(VideoBackend::Mock),
                        Some("software") => Some(VideoBackend::Software),
                        other => bail!("unknown backend {:?}", other),
                    }
                }
                "--size" => {
                    let size = value.context("--size needs WIDTHxHEIGHT")?;
                    let (w, h) = size.split_once('x').context("--size needs WIDTHxHEIGHT")?;
                    config.width = w.parse().context("bad width")?;
                    config.height = h.parse().context("bad height")?;
                }
                "--frames" => config.frames = Some(value.context("--frames needs a count")?.parse()?),
                "--png" => config.png = value.map(PathBuf::from),
                "--image" => config.image = value,
                "--text" => config.text = value.unwrap_or_default(),
                "--debug" => {
                    config.log_level = Some(Level::DEBUG);
                    i += 1;
                    continue;
                }
                "--trace" => {
                    config.log_level = Some(Level::TRACE);
                    i += 1;
                    continue;
                }
                other => bail!("unknown argument {}", other),
            }

            i += 2;
        }

        Ok(config)
    }

    fn engine_config(&self) -> anyhow::Result<EngineConfig> {
        let mut engine = match &self.config_file {
            Some(path) => EngineConfig::from_json_file(path)?,
            None => EngineConfig::default(),
        }
        .with_env_overrides();

        if let Some(backend) = self.backend {
            engine.video_backend = backend;
        }

        // saving a frame needs pixels
        if self.png.is_some() {
            engine.video_backend = VideoBackend::Software;
        }

        Ok(engine)
    }
}

fn setup_logging(level: Option<Level>, configured: &str) {
    let filter = match level {
        Some(level) => EnvFilter::new(level.as_str()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured)),
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("tracing subscriber already installed");
    }
}

/// A title bar box with a line of text, and an optional image under it.
fn build_scene(env: &mut Env, id: WindowId, app: &AppConfig) -> anyhow::Result<()> {
    let window = env.window_mut(id).context("window vanished")?;
    let root = window.root();

    window.set_style_named(root, "backgroundColor", "#202830")?;
    window.set_style_named(root, "padding", "16px")?;

    let header = window.create_node_from_tag("box")?;
    window.set_style_named(header, "backgroundColor", "#3070c0")?;
    window.set_style_named(header, "borderRadius", "8px")?;
    window.set_style_named(header, "padding", "12px")?;
    window.append(root, header)?;

    let title = window.create_node_from_tag("text")?;
    window.set_style_named(title, "color", "white")?;
    window.set_style_named(title, "fontSize", "2rem")?;
    window.set_text(title, &app.text)?;
    window.append(header, title)?;

    if let Some(uri) = &app.image {
        let image = window.create_node_from_tag("img")?;
        window.set_style_named(image, "marginTop", "16px")?;
        window.set_style_named(image, "objectFit", "contain")?;
        window.set_style_named(image, "flexGrow", "1")?;
        window.set_src(image, Some(uri))?;
        window.append(root, image)?;
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let app = AppConfig::from_args()?;
    let engine_config = app.engine_config()?;

    setup_logging(app.log_level, &engine_config.log_level);
    info!("Starting Light Source Engine ({:?} backend)", engine_config.video_backend);

    let startup = Instant::now();
    let mut env = Env::new(engine_config)?;
    env.configure()?;

    let window = env.add_window()?;
    let settings = WindowSettings {
        title: "lse-headless".to_string(),
        ..WindowSettings::with_size(app.width, app.height)
    };
    env.configure_window(window, &settings)?;
    build_scene(&mut env, window, &app)?;

    info!("Startup took {:?}", startup.elapsed());

    let refresh = env.window(window).map_or(60, |w| w.refresh_rate()).max(1);
    let mut ticker = tokio::time::interval(Duration::from_secs(1) / refresh);
    let mut frames = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = signal::ctrl_c() => {
                info!("Received SIGINT, shutting down");
                break;
            }
        }

        if !env.update() {
            info!("Quit requested");
            break;
        }

        frames += 1;

        if app.frames.is_some_and(|limit| frames >= limit) {
            break;
        }
    }

    info!("Presented {} frames", frames);

    if let Some(path) = &app.png {
        let container = env
            .window(window)
            .and_then(|w| w.graphics_container())
            .context("window has no graphics container")?;

        match container.save_png(path) {
            Ok(()) => info!("Saved frame to {}", path.display()),
            Err(e) => error!("Cannot save frame: {}", e),
        }
    }

    env.destroy();
    Ok(())
}
