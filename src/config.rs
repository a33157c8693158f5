use crate::render::ascii::{Palette, StylizationConfig, StylizeError, DEFAULT_CHARSET, DEFAULT_RESOLUTION};
use crate::render::camera::DEFAULT_FOV_DEGREES;
use crate::viewer::{Theme, ROTATION_RATE};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid stylization: {0}")]
    Stylize(#[from] StylizeError),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Command line for the viewer binary.
#[derive(Debug, Parser)]
#[command(name = "ascii-viewer", version, about = "ASCII-stylized glTF viewer")]
pub struct Cli {
    /// JSON settings file; missing fields keep their defaults.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Characters ordered dark to bright.
    #[arg(long)]
    pub palette: Option<String>,
    /// Grid cells per viewport pixel, in (0, 1].
    #[arg(long)]
    pub resolution: Option<f32>,
    /// Start with the light theme.
    #[arg(long)]
    pub light: bool,
    /// Start with the model spinning.
    #[arg(long)]
    pub rotate: bool,
    /// Model to open at startup: a path, file:// or http(s) URL.
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub palette: String,
    pub resolution: f32,
    pub invert: bool,
    pub theme: Theme,
    pub rotate: bool,
    pub rotation_rate: f32,
    pub fov_degrees: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            palette: DEFAULT_CHARSET.to_string(),
            resolution: DEFAULT_RESOLUTION,
            invert: true,
            theme: Theme::Dark,
            rotate: false,
            rotation_rate: ROTATION_RATE,
            fov_degrees: DEFAULT_FOV_DEGREES,
        }
    }
}

impl ViewerConfig {
    /// Defaults, then the `--config` file, then individual flags.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => load_config_from_file(path)?,
            None => Self::default(),
        };
        if let Some(palette) = &cli.palette {
            config.palette = palette.clone();
        }
        if let Some(resolution) = cli.resolution {
            config.resolution = resolution;
        }
        if cli.light {
            config.theme = Theme::Light;
        }
        if cli.rotate {
            config.rotate = true;
        }
        config.stylization()?;
        Ok(config)
    }

    pub fn stylization(&self) -> std::result::Result<StylizationConfig, StylizeError> {
        let (foreground, background) = self.theme.colors();
        let config = StylizationConfig {
            palette: Palette::new(&self.palette)?,
            resolution: self.resolution,
            foreground,
            background,
            invert: self.invert,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn fov_radians(&self) -> f32 {
        self.fov_degrees.to_radians()
    }
}

pub fn save_config_to_file(config: &ViewerConfig, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn load_config_from_file(path: &Path) -> Result<ViewerConfig> {
    let json = std::fs::read_to_string(path)?;
    let config: ViewerConfig = serde_json::from_str(&json)?;
    log::info!("Loaded viewer settings from {}", path.display());
    Ok(config)
}
