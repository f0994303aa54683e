// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// Every section has defaults, so a missing file or a missing key is never an
// error. A file that exists but does not parse is logged and ignored.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub shaders: ShaderConfig,
    pub debug: DebugConfig,
}

/// Window settings
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Vulkan Triangle".to_string(),
            width: 1280,
            height: 780,
        }
    }
}

/// Which physical device the bootstrap takes.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DevicePolicyKind {
    /// First enumerated device, no scoring.
    #[default]
    First,
    /// Discrete over integrated over everything else.
    Discrete,
}

/// Graphics settings
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GraphicsConfig {
    /// Requested swapchain image count before clamping to the surface limits
    pub image_count: u32,
    pub clear_color: [f32; 4],
    pub device_policy: DevicePolicyKind,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            image_count: 3,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            device_policy: DevicePolicyKind::First,
        }
    }
}

/// Compiled SPIR-V locations, relative to the working directory
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ShaderConfig {
    pub vertex: PathBuf,
    pub fragment: PathBuf,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            vertex: PathBuf::from("shaders/vert.spv"),
            fragment: PathBuf::from("shaders/frag.spv"),
        }
    }
}

/// Debug settings
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DebugConfig {
    pub validation_layers: bool,
    pub log_to_file: bool,
    pub log_dir: PathBuf,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: true,
            log_to_file: true,
            log_dir: PathBuf::from("logs"),
        }
    }
}

/// Where the active configuration came from. `Config::load` runs before the
/// logger exists, so the caller reports this once logging is installed.
#[derive(Debug)]
pub enum ConfigSource {
    File(PathBuf),
    Missing(PathBuf),
    /// The file exists but could not be read or parsed; defaults are in use
    Fallback { path: PathBuf, error: anyhow::Error },
}

impl ConfigSource {
    pub fn error(&self) -> Option<&anyhow::Error> {
        match self {
            ConfigSource::Fallback { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn report(&self) {
        match self {
            ConfigSource::File(path) => log::info!("Loaded configuration from {:?}", path),
            ConfigSource::Missing(path) => {
                log::info!("Config file not found at {:?}, using defaults", path)
            }
            ConfigSource::Fallback { path, error } => {
                log::warn!("Failed to load {:?}: {:#}. Using defaults.", path, error)
            }
        }
    }
}

impl Config {
    /// Load configuration from a path, falling back to defaults on any error.
    /// The returned source carries the error, if there was one.
    pub fn load<P: AsRef<Path>>(path: P) -> (Self, ConfigSource) {
        let path = path.as_ref().to_path_buf();
        match Self::load_from_path(&path) {
            Ok(config) if path.exists() => (config, ConfigSource::File(path)),
            Ok(config) => (config, ConfigSource::Missing(path)),
            Err(error) => (Config::default(), ConfigSource::Fallback { path, error }),
        }
    }

    /// Load configuration from a specific path. A missing file gives defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Validation is a debug-build feature only
    pub fn validation_requested(&self) -> bool {
        cfg!(debug_assertions) && self.debug.validation_layers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.window.height, 780);
        assert_eq!(config.graphics.image_count, 3);
        assert_eq!(config.graphics.clear_color, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(config.graphics.device_policy, DevicePolicyKind::First);
        assert_eq!(config.shaders.vertex, PathBuf::from("shaders/vert.spv"));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml(
            r#"
            [window]
            width = 640

            [graphics]
            device_policy = "discrete"
            "#,
        )
        .unwrap();

        assert_eq!(config.window.width, 640);
        assert_eq!(config.window.height, 780);
        assert_eq!(config.window.title, "Vulkan Triangle");
        assert_eq!(config.graphics.device_policy, DevicePolicyKind::Discrete);
        assert_eq!(config.graphics.image_count, 3);
    }

    #[test]
    fn unknown_policy_is_a_parse_error() {
        let result = Config::from_toml("[graphics]\ndevice_policy = \"fastest\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let config = Config::load_from_path("definitely/not/here/config.toml").unwrap();
        assert_eq!(config.debug.log_dir, PathBuf::from("logs"));

        let (_, source) = Config::load("definitely/not/here/config.toml");
        assert!(matches!(source, ConfigSource::Missing(_)));
        assert!(source.error().is_none());
    }

    #[test]
    fn broken_file_falls_back_with_the_error() {
        let dir = std::env::temp_dir().join(format!("triangle-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("broken.toml");
        std::fs::write(&path, "[window\nwidth = \"wide\"\n").unwrap();

        let (config, source) = Config::load(&path);

        assert_eq!(config.window.width, 1280);
        let error = source.error().expect("fallback error");
        assert!(format!("{:#}", error).contains("broken.toml"));
        assert!(matches!(source, ConfigSource::Fallback { .. }));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn readable_file_reports_its_path() {
        let dir = std::env::temp_dir().join(format!("triangle-config-ok-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "[window]\nwidth = 800\n").unwrap();

        let (config, source) = Config::load(&path);

        assert_eq!(config.window.width, 800);
        assert!(matches!(source, ConfigSource::File(ref p) if p == &path));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
