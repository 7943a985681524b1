use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use wavestrip::renderer::{CentralLine, RenderConfig, RenderPosition, RenderStyle, Size};
use wavestrip::sampler::{ExtractionRequest, SamplerOptions, DEFAULT_NOISE_FLOOR_DB};
use wavestrip::{TimeWindow, WaveColor};

/// Window length used when only a start offset is given; the source clamps it to the track end
const UNTIL_END_SECS: f64 = u32::MAX as f64;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sampler: SamplerConfig,
    pub render: RenderSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Envelope points; defaults to the output width in pixels
    pub resolution: Option<usize>,
    pub noise_floor_db: f32,
    pub window_start_secs: Option<f64>,
    pub window_duration_secs: Option<f64>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            resolution: None,
            noise_floor_db: DEFAULT_NOISE_FLOOR_DB,
            window_start_secs: None,
            window_duration_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSection {
    pub width: f32,
    pub height: f32,
    pub scale: f32,
    pub color: WaveColor,
    pub background_color: WaveColor,
    pub style: RenderStyle,
    pub position: RenderPosition,
    pub border_width: f32,
    pub border_color: WaveColor,
    pub border_radius: f32,
    pub padding_factor: Option<f32>,
    pub central_line: CentralLine,
}

impl Default for RenderSection {
    fn default() -> Self {
        let defaults = RenderConfig::new(800.0, 200.0);
        Self {
            width: defaults.size.width,
            height: defaults.size.height,
            scale: defaults.scale,
            color: defaults.color,
            background_color: defaults.background_color,
            style: defaults.style,
            position: defaults.position,
            border_width: defaults.border_width,
            border_color: defaults.border_color,
            border_radius: defaults.border_radius,
            padding_factor: defaults.padding_factor,
            central_line: defaults.central_line,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Get the default XDG config path (~/.config/wavestrip/config.toml)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("wavestrip").join("config.toml"))
    }

    /// Load config from the default XDG path if it exists
    /// Returns None if file doesn't exist, logs warning on parse errors
    pub fn load_from_default_path() -> Option<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            return None;
        }
        match Self::load(&path) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!(
                    "Failed to parse config at {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                None
            }
        }
    }

    /// Initialize default config file at XDG path, returns the path
    pub fn init_default_config() -> Result<PathBuf> {
        let path = Self::default_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, Self::generate_config_template())?;

        Ok(path)
    }

    /// Generate a commented TOML config template
    pub fn generate_config_template() -> String {
        r##"# Wavestrip Configuration
# This file is auto-generated. Edit as needed.

[sampler]
# Number of envelope points (default: output width in pixels)
# resolution = 800
# Everything quieter than this (dB relative to full scale) counts as silence
noise_floor_db = -50.0
# Only sample part of the track (seconds)
# window_start_secs = 0.0
# window_duration_secs = 30.0

[render]
# Image size in logical units; pixels are size * scale
width = 800.0
height = 200.0
scale = 1.0
# Colors: "#RRGGBB" or "#RRGGBBAA"
color = "#ff0000"
background_color = "#00000000"
# Style: "filled", "gradient" or "striped:<period>"
style = "gradient"
# Position of the waveform center: top, middle, bottom
position = "middle"
# Border (0 = none)
border_width = 0.0
border_color = "#ffffff"
border_radius = 0.0
# Height divisor; defaults to 2.5 in the middle and 1.5 at the top or bottom
# padding_factor = 2.5

[render.central_line]
enabled = false
width = 2.0
color = "#ff0000"
"##
        .to_string()
    }

    /// Merge CLI arguments into config (CLI takes priority)
    pub fn merge_args(&mut self, args: &crate::Args) {
        // Sampler settings
        if let Some(resolution) = args.resolution {
            self.sampler.resolution = Some(resolution);
        }
        if let Some(floor) = args.noise_floor {
            self.sampler.noise_floor_db = floor;
        }
        if let Some(start) = args.start {
            self.sampler.window_start_secs = Some(start);
        }
        if let Some(duration) = args.duration {
            self.sampler.window_duration_secs = Some(duration);
        }

        // Render settings
        if let Some(width) = args.width {
            self.render.width = width;
        }
        if let Some(height) = args.height {
            self.render.height = height;
        }
        if let Some(scale) = args.scale {
            self.render.scale = scale;
        }
        if let Some(style) = args.style {
            self.render.style = style;
        }
        if let Some(position) = args.position {
            self.render.position = position;
        }
        if let Some(color) = args.color {
            self.render.color = color;
        }
        if let Some(color) = args.background {
            self.render.background_color = color;
        }
        if let Some(width) = args.border_width {
            self.render.border_width = width.max(0.0);
        }
        if let Some(color) = args.border_color {
            self.render.border_color = color;
        }
        if let Some(padding) = args.padding_factor {
            self.render.padding_factor = Some(padding);
        }
        if args.central_line {
            self.render.central_line.enabled = true;
        }
    }

    pub fn render_config(&self) -> RenderConfig {
        let r = &self.render;
        RenderConfig {
            size: Size::new(r.width, r.height),
            scale: r.scale,
            color: r.color,
            background_color: r.background_color,
            style: r.style,
            position: r.position,
            border_width: r.border_width,
            border_color: r.border_color,
            border_radius: r.border_radius,
            padding_factor: r.padding_factor,
            central_line: r.central_line,
        }
    }

    pub fn window(&self) -> Option<TimeWindow> {
        match (self.sampler.window_start_secs, self.sampler.window_duration_secs) {
            (None, None) => None,
            (start, duration) => Some(TimeWindow::from_secs_f64(
                start.unwrap_or(0.0),
                duration.unwrap_or(UNTIL_END_SECS),
            )),
        }
    }

    /// One envelope point per output pixel unless a resolution is configured
    pub fn extraction_request(&self, render: &RenderConfig) -> ExtractionRequest {
        let resolution = self
            .sampler
            .resolution
            .unwrap_or(render.pixel_size().0 as usize)
            .max(1);
        let request = ExtractionRequest::new(resolution)
            .with_options(SamplerOptions::with_noise_floor(self.sampler.noise_floor_db));
        match self.window() {
            Some(window) => request.with_window(window),
            None => request,
        }
    }
}
