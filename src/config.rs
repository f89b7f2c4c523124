use std::path::{Path, PathBuf};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::{EngineError, Result};

/// Environment variable naming an SDL-style gamecontroller mapping database.
pub const VAR_GAMECONTROLLER_DB: &str = "LSE_GAMECONTROLLER_DB";
/// Environment variable selecting the video backend ("mock" or "software").
pub const VAR_VIDEO_BACKEND: &str = "LSE_VIDEO_BACKEND";

pub const DEFAULT_ROOT_FONT_SIZE_PX: f32 = 16.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoBackend {
    /// No window, no pixels. Graphics calls are recorded for inspection.
    Mock,
    /// Headless tiny-skia rasterizer.
    Software,
}

/// Fallback font decoded synchronously when the font store is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BuiltinFont {
    /// Metric-only face with fixed proportions; needs no font file.
    Synthetic,
    /// First installed face matching the family, looked up through fontdb.
    System { family: String },
    File { path: PathBuf, index: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadPoolConfig {
    /// 0 runs every task inline on the calling thread.
    pub workers: usize,
    pub thread_name: String,
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            thread_name: "lse-worker".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub video_backend: VideoBackend,
    pub builtin_font: BuiltinFont,
    pub thread_pool: ThreadPoolConfig,
    pub gamecontroller_db: Option<PathBuf>,
    pub root_font_size_px: f32,
    // layout → resolve passes per frame before giving up on a settled tree
    pub settle_iterations: u32,
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            video_backend: VideoBackend::Mock,
            builtin_font: BuiltinFont::Synthetic,
            thread_pool: ThreadPoolConfig::default(),
            gamecontroller_db: None,
            root_font_size_px: DEFAULT_ROOT_FONT_SIZE_PX,
            settle_iterations: 4,
            log_level: "info".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::IllegalArgument(format!("{}: {}", path.display(), e)))?;

        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| EngineError::IllegalArgument(format!("config: {}", e)))
    }

    /// Applies `LSE_*` environment overrides on top of `self`.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(backend) = std::env::var(VAR_VIDEO_BACKEND) {
            match backend.to_ascii_lowercase().as_str() {
                "mock" => self.video_backend = VideoBackend::Mock,
                "software" => self.video_backend = VideoBackend::Software,
                other => tracing::warn!("ignoring unknown {}={}", VAR_VIDEO_BACKEND, other),
            }
        }

        if self.gamecontroller_db.is_none() {
            if let Ok(path) = std::env::var(VAR_GAMECONTROLLER_DB) {
                if !path.is_empty() {
                    self.gamecontroller_db = Some(PathBuf::from(path));
                }
            }
        }

        self
    }

    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct WindowFlags: u32 {
        const VSYNC = 1;
        const FULLSCREEN = 2;
        const FULLSCREEN_DESKTOP = 4;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub refresh_rate: u32,
    pub fullscreen: bool,
    pub fullscreen_desktop: bool,
    pub vsync: bool,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: "Light Source".to_string(),
            width: 1280,
            height: 720,
            refresh_rate: 60,
            fullscreen: false,
            fullscreen_desktop: false,
            vsync: true,
        }
    }
}

impl WindowSettings {
    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn flags(&self) -> WindowFlags {
        let mut flags = WindowFlags::empty();

        flags.set(WindowFlags::VSYNC, self.vsync);
        flags.set(WindowFlags::FULLSCREEN, self.fullscreen);
        flags.set(WindowFlags::FULLSCREEN_DESKTOP, self.fullscreen_desktop);

        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config = EngineConfig::from_json_str(r#"{ "video_backend": "software", "settle_iterations": 2 }"#).unwrap();

        assert_eq!(config.video_backend, VideoBackend::Software);
        assert_eq!(config.settle_iterations, 2);
        assert_eq!(config.builtin_font, BuiltinFont::Synthetic);
        assert_eq!(config.root_font_size_px, 16.0);
    }

    #[test]
    fn builtin_font_is_tagged() {
        let config = EngineConfig::from_json_str(r#"{ "builtin_font": { "kind": "system", "family": "DejaVu Sans" } }"#)
            .unwrap();

        assert_eq!(config.builtin_font, BuiltinFont::System { family: "DejaVu Sans".into() });
    }

    #[test]
    fn window_flags_from_settings() {
        let settings = WindowSettings {
            fullscreen: true,
            vsync: false,
            ..WindowSettings::default()
        };

        assert_eq!(settings.flags(), WindowFlags::FULLSCREEN);
        assert_eq!(WindowSettings::default().flags(), WindowFlags::VSYNC);
    }

    #[test]
    fn bad_json_is_illegal_argument() {
        let err = EngineConfig::from_json_str("{").unwrap_err();
        assert_eq!(err.status(), crate::Status::IllegalArgument);
    }
}
