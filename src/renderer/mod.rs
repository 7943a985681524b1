//! Waveform renderer
//!
//! Draws an [`Envelope`] into an owned RGBA [`Canvas`] and hands the pixels
//! back as a [`WaveformImage`]. Rendering is synchronous and stateless; every
//! call owns its surface, so concurrent renders never interact.

pub mod canvas;
pub mod image;
pub mod layout;
pub mod styles;

pub use canvas::{Canvas, Rect, Segment, MAX_SURFACE_PIXELS};
pub use image::WaveformImage;
pub use layout::{compute_waveform_layout, WaveformLayout};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::color::WaveColor;
use crate::error::RenderError;
use crate::sampler::Envelope;

/// Logical image size; pixels are `round(size * scale)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// How the waveform path is painted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RenderStyle {
    /// Stroke every sample with the waveform color
    Filled,
    /// Every sample, painted with a vertical gradient
    #[default]
    Gradient,
    /// Only every `period`-th logical x position
    Striped { period: NonZeroU32 },
}

impl fmt::Display for RenderStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderStyle::Filled => write!(f, "filled"),
            RenderStyle::Gradient => write!(f, "gradient"),
            RenderStyle::Striped { period } => write!(f, "striped:{}", period),
        }
    }
}

impl FromStr for RenderStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "filled" => Ok(RenderStyle::Filled),
            "gradient" => Ok(RenderStyle::Gradient),
            other => {
                let period = other.strip_prefix("striped:").ok_or_else(|| {
                    format!(
                        "Unknown style '{}': expected filled, gradient or striped:<period>",
                        other
                    )
                })?;
                let period: NonZeroU32 = period
                    .trim()
                    .parse()
                    .map_err(|_| format!("Invalid stripe period '{}': expected a positive integer", period))?;
                Ok(RenderStyle::Striped { period })
            }
        }
    }
}

impl TryFrom<String> for RenderStyle {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<RenderStyle> for String {
    fn from(style: RenderStyle) -> Self {
        style.to_string()
    }
}

/// Vertical anchor of the waveform's center line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderPosition {
    Top,
    #[default]
    Middle,
    Bottom,
}

impl RenderPosition {
    /// Center offset in half-heights
    pub fn offset(&self) -> f32 {
        match self {
            RenderPosition::Top => -1.0,
            RenderPosition::Middle => 0.0,
            RenderPosition::Bottom => 1.0,
        }
    }
}

impl fmt::Display for RenderPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderPosition::Top => write!(f, "top"),
            RenderPosition::Middle => write!(f, "middle"),
            RenderPosition::Bottom => write!(f, "bottom"),
        }
    }
}

impl FromStr for RenderPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "top" => Ok(RenderPosition::Top),
            "middle" | "center" => Ok(RenderPosition::Middle),
            "bottom" => Ok(RenderPosition::Bottom),
            _ => Err(format!(
                "Invalid position '{}': expected top, middle or bottom",
                s
            )),
        }
    }
}

/// Optional vertical marker through the middle of the image
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CentralLine {
    pub enabled: bool,
    pub width: f32,
    pub color: WaveColor,
}

impl Default for CentralLine {
    fn default() -> Self {
        Self {
            enabled: false,
            width: 2.0,
            color: WaveColor::RED,
        }
    }
}

/// Everything that controls one render call.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub size: Size,
    /// Pixels per logical unit
    pub scale: f32,
    pub color: WaveColor,
    pub background_color: WaveColor,
    pub style: RenderStyle,
    pub position: RenderPosition,
    /// Zero disables the border
    pub border_width: f32,
    pub border_color: WaveColor,
    pub border_radius: f32,
    /// Overrides the height divisor (2.5 in the middle, 1.5 at the edges)
    pub padding_factor: Option<f32>,
    pub central_line: CentralLine,
}

impl RenderConfig {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            size: Size::new(width, height),
            scale: 1.0,
            color: WaveColor::RED,
            background_color: WaveColor::CLEAR,
            style: RenderStyle::default(),
            position: RenderPosition::default(),
            border_width: 0.0,
            border_color: WaveColor::WHITE,
            border_radius: 0.0,
            padding_factor: None,
            central_line: CentralLine::default(),
        }
    }

    /// Output size in pixels
    pub fn pixel_size(&self) -> (u32, u32) {
        let px = |v: f32| (v * self.scale).round().clamp(0.0, u32::MAX as f32) as u32;
        (px(self.size.width), px(self.size.height))
    }

    pub fn validate(&self) -> Result<(), RenderError> {
        let Size { width, height } = self.size;
        if !width.is_finite() || !height.is_finite() || width <= 0.0 || height <= 0.0 {
            return Err(RenderError::InvalidSize { width, height });
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(RenderError::InvalidScale(self.scale));
        }
        if let Some(padding) = self.padding_factor {
            if !padding.is_finite() || padding <= 0.0 {
                return Err(RenderError::InvalidPaddingFactor(padding));
            }
        }
        let (w, h) = self.pixel_size();
        if w == 0 || h == 0 {
            return Err(RenderError::InvalidSize { width, height });
        }
        Ok(())
    }
}

/// Render `envelope`, reporting why when no image can be produced.
pub fn try_render_waveform(
    envelope: &Envelope,
    config: &RenderConfig,
) -> Result<WaveformImage, RenderError> {
    config.validate()?;
    let (width, height) = config.pixel_size();
    let mut canvas = Canvas::try_new(width as usize, height as usize, config.scale)?;

    let layout = compute_waveform_layout(envelope.values(), envelope.peak(), config);
    debug!(
        "Rendering {} of {} points into {}x{} px ({}, {})",
        layout.segments.len(),
        envelope.len(),
        width,
        height,
        config.style,
        config.position
    );

    styles::draw_background(&mut canvas, config);
    canvas.save()?;
    styles::draw_graph(&mut canvas, &layout, config)?;
    canvas.restore();
    if config.border_width > 0.0 {
        styles::draw_border(&mut canvas, config);
    }
    if config.central_line.enabled {
        styles::draw_central_line(&mut canvas, config)?;
    }

    Ok(canvas.into_image())
}

/// Render `envelope`; `None` when the surface cannot be created
pub fn render_waveform(envelope: &Envelope, config: &RenderConfig) -> Option<WaveformImage> {
    match try_render_waveform(envelope, config) {
        Ok(image) => Some(image),
        Err(e) => {
            warn!("Waveform render skipped: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(value: f32, len: usize) -> Envelope {
        Envelope::from_normalized(vec![value; len], value)
    }

    fn filled(width: f32, height: f32) -> RenderConfig {
        RenderConfig {
            style: RenderStyle::Filled,
            color: WaveColor::WHITE,
            background_color: WaveColor::BLACK,
            ..RenderConfig::new(width, height)
        }
    }

    #[test]
    fn test_defaults() {
        let cfg = RenderConfig::new(200.0, 50.0);
        assert_eq!(cfg.scale, 1.0);
        assert_eq!(cfg.color, WaveColor::RED);
        assert_eq!(cfg.background_color, WaveColor::CLEAR);
        assert_eq!(cfg.style, RenderStyle::Gradient);
        assert_eq!(cfg.position, RenderPosition::Middle);
        assert_eq!(cfg.border_width, 0.0);
        assert_eq!(cfg.border_color, WaveColor::WHITE);
        assert_eq!(cfg.padding_factor, None);
        assert!(!cfg.central_line.enabled);
        assert_eq!(cfg.central_line.width, 2.0);
        assert_eq!(cfg.central_line.color, WaveColor::RED);
    }

    #[test]
    fn test_image_size_follows_scale() {
        let mut cfg = RenderConfig::new(100.0, 20.0);
        cfg.scale = 2.0;
        let img = render_waveform(&flat(0.5, 200), &cfg).unwrap();
        assert_eq!((img.width(), img.height()), (200, 40));
        assert_eq!(img.pixels().len(), 200 * 40 * 4);
    }

    #[test]
    fn test_filled_full_scale_block() {
        let img = render_waveform(&flat(0.0, 10), &filled(10.0, 10.0)).unwrap();
        // amplitude 4 around center 5 covers rows 1..9
        assert_eq!(img.pixel(5, 5), Some(WaveColor::WHITE));
        assert_eq!(img.pixel(5, 1), Some(WaveColor::WHITE));
        assert_eq!(img.pixel(5, 0), Some(WaveColor::BLACK));
        assert_eq!(img.pixel(5, 9), Some(WaveColor::BLACK));
    }

    #[test]
    fn test_silence_draws_hairline() {
        let img = render_waveform(&Envelope::silence(20), &filled(20.0, 20.0)).unwrap();
        assert_eq!(img.pixel(10, 9), Some(WaveColor::WHITE));
        assert_eq!(img.pixel(10, 10), Some(WaveColor::WHITE));
        assert_eq!(img.pixel(10, 7), Some(WaveColor::BLACK));
    }

    #[test]
    fn test_striped_leaves_gaps() {
        let mut cfg = filled(12.0, 10.0);
        cfg.style = RenderStyle::Striped {
            period: NonZeroU32::new(4).unwrap(),
        };
        let img = render_waveform(&flat(0.0, 12), &cfg).unwrap();
        // stripe at x = 4 straddles pixels 3 and 4
        assert_ne!(img.pixel(4, 5), Some(WaveColor::BLACK));
        assert_eq!(img.pixel(6, 5), Some(WaveColor::BLACK));
    }

    #[test]
    fn test_gradient_runs_from_color_to_highlight() {
        let cfg = RenderConfig {
            background_color: WaveColor::BLACK,
            ..RenderConfig::new(10.0, 100.0)
        };
        let img = render_waveform(&flat(0.0, 11), &cfg).unwrap();
        // segments span 10..90; top rows near the base color, bottom near the highlight
        let top = img.pixel(5, 11).unwrap();
        let bottom = img.pixel(5, 88).unwrap();
        assert!(top.r > 240, "{}", top);
        assert!(bottom.r < 140, "{}", bottom);
        assert_eq!(img.pixel(5, 5), Some(WaveColor::BLACK));
    }

    #[test]
    fn test_border_and_central_line() {
        let mut cfg = filled(20.0, 10.0);
        cfg.color = WaveColor::BLACK;
        cfg.border_width = 1.0;
        cfg.border_color = WaveColor::RED;
        cfg.central_line = CentralLine {
            enabled: true,
            width: 2.0,
            color: WaveColor::WHITE,
        };
        let img = render_waveform(&Envelope::silence(20), &cfg).unwrap();
        assert_eq!(img.pixel(0, 5), Some(WaveColor::RED));
        assert_eq!(img.pixel(19, 5), Some(WaveColor::RED));
        assert_eq!(img.pixel(5, 0), Some(WaveColor::RED));
        // central line drawn last, over the border
        assert_eq!(img.pixel(9, 0), Some(WaveColor::WHITE));
        assert_eq!(img.pixel(10, 5), Some(WaveColor::WHITE));
        assert_eq!(img.pixel(12, 5), Some(WaveColor::BLACK));
    }

    #[test]
    fn test_deterministic_pixels() {
        let values: Vec<f32> = (0..300).map(|i| ((i as f32) * 0.1).sin().abs()).collect();
        let envelope = Envelope::from_normalized(values, 0.0);
        let cfg = RenderConfig::new(300.0, 80.0);
        assert_eq!(render_waveform(&envelope, &cfg), render_waveform(&envelope, &cfg));
    }

    #[test]
    fn test_invalid_configs() {
        let envelope = flat(0.5, 10);
        let zero = RenderConfig::new(0.0, 10.0);
        assert!(matches!(
            try_render_waveform(&envelope, &zero),
            Err(RenderError::InvalidSize { .. })
        ));
        assert!(render_waveform(&envelope, &zero).is_none());

        let mut cfg = RenderConfig::new(10.0, 10.0);
        cfg.scale = 0.0;
        assert_eq!(try_render_waveform(&envelope, &cfg), Err(RenderError::InvalidScale(0.0)));

        let mut cfg = RenderConfig::new(10.0, 10.0);
        cfg.padding_factor = Some(-1.0);
        assert_eq!(
            try_render_waveform(&envelope, &cfg),
            Err(RenderError::InvalidPaddingFactor(-1.0))
        );

        let huge = RenderConfig::new(100_000.0, 100_000.0);
        assert!(matches!(
            try_render_waveform(&envelope, &huge),
            Err(RenderError::SurfaceAllocation { .. })
        ));
    }

    #[test]
    fn test_empty_envelope_draws_background_only() {
        let img = render_waveform(&Envelope::silence(0), &filled(4.0, 4.0)).unwrap();
        assert!(img.pixels().chunks_exact(4).all(|p| p == [0, 0, 0, 255]));
    }

    #[test]
    fn test_style_and_position_parsing() {
        assert_eq!("filled".parse::<RenderStyle>().unwrap(), RenderStyle::Filled);
        assert_eq!(
            "Striped:3".parse::<RenderStyle>().unwrap(),
            RenderStyle::Striped {
                period: NonZeroU32::new(3).unwrap()
            }
        );
        assert!("striped:0".parse::<RenderStyle>().is_err());
        assert!("wavy".parse::<RenderStyle>().is_err());
        assert_eq!("bottom".parse::<RenderPosition>().unwrap(), RenderPosition::Bottom);
        assert_eq!(RenderPosition::Top.offset(), -1.0);
    }
}
