//! Waveform geometry shared by all styles.

use super::canvas::Segment;
use super::{RenderConfig, RenderPosition, RenderStyle};

/// Thinnest half-height a drawn sample gets, so silence still shows a line
pub const MIN_AMPLITUDE: f32 = 2.0;

/// Pre-computed path every style renderer draws from.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformLayout {
    /// Vertical center line of the graph, logical units
    pub center: f32,
    pub segments: Vec<Segment>,
    /// Envelope index of every entry in `segments`
    pub indices: Vec<usize>,
    /// Largest half-height drawn, bounded below by the peak's
    pub max_amplitude: f32,
    pub line_width: f32,
}

pub fn compute_waveform_layout(values: &[f32], peak: f32, config: &RenderConfig) -> WaveformLayout {
    let height = config.size.height;
    let half = height / 2.0;
    let center = half + config.position.offset() * half;

    let divisor = config.padding_factor.unwrap_or(match config.position {
        RenderPosition::Middle => 2.5,
        RenderPosition::Top | RenderPosition::Bottom => 1.5,
    });
    let mapping = height / divisor;
    let amplitude = |v: f32| MIN_AMPLITUDE.max((1.0 - v) * mapping);

    let mut max_amplitude = amplitude(peak);
    let mut segments = Vec::with_capacity(values.len());
    let mut indices = Vec::with_capacity(values.len());

    for (i, &v) in values.iter().enumerate() {
        let x = i as f32 / config.scale;
        let drawn = match config.style {
            RenderStyle::Striped { period } => (x.floor() as u64) % period.get() as u64 == 0,
            RenderStyle::Filled | RenderStyle::Gradient => true,
        };
        if !drawn {
            continue;
        }

        let a = amplitude(v);
        max_amplitude = max_amplitude.max(a);
        segments.push(Segment {
            x,
            top: center - a,
            bottom: center + a,
        });
        indices.push(i);
    }

    WaveformLayout {
        center,
        segments,
        indices,
        max_amplitude,
        line_width: 1.0 / config.scale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroU32;

    fn config(width: f32, height: f32) -> RenderConfig {
        RenderConfig::new(width, height)
    }

    #[test]
    fn test_middle_geometry() {
        let cfg = config(4.0, 100.0);
        let layout = compute_waveform_layout(&[0.0, 0.5, 1.0], 0.0, &cfg);
        assert_eq!(layout.center, 50.0);
        // full scale: 100 / 2.5
        assert_eq!(layout.segments[0].top, 10.0);
        assert_eq!(layout.segments[0].bottom, 90.0);
        assert_eq!(layout.segments[1].top, 30.0);
        // silence keeps the hairline
        assert_eq!(layout.segments[2].top, 48.0);
        assert_eq!(layout.segments[2].bottom, 52.0);
        assert_eq!(layout.max_amplitude, 40.0);
    }

    #[test]
    fn test_top_and_bottom_use_edge_centers() {
        let mut cfg = config(4.0, 90.0);
        cfg.position = RenderPosition::Top;
        let top = compute_waveform_layout(&[0.0], 1.0, &cfg);
        assert_eq!(top.center, 0.0);
        assert_eq!(top.segments[0].bottom, 60.0);

        cfg.position = RenderPosition::Bottom;
        let bottom = compute_waveform_layout(&[0.0], 1.0, &cfg);
        assert_eq!(bottom.center, 90.0);
        assert_eq!(bottom.segments[0].top, 30.0);
    }

    #[test]
    fn test_padding_factor_overrides_divisor() {
        let mut cfg = config(4.0, 100.0);
        cfg.padding_factor = Some(4.0);
        let layout = compute_waveform_layout(&[0.0], 1.0, &cfg);
        assert_eq!(layout.segments[0].top, 25.0);
    }

    #[test]
    fn test_striped_every_third() {
        let mut cfg = config(12.0, 10.0);
        cfg.style = RenderStyle::Striped {
            period: NonZeroU32::new(3).unwrap(),
        };
        let layout = compute_waveform_layout(&[0.5; 12], 0.5, &cfg);
        assert_eq!(layout.indices, vec![0, 3, 6, 9]);
        assert!(layout.indices.iter().all(|i| i % 3 == 0));
    }

    #[test]
    fn test_scale_compresses_x_and_line_width() {
        let mut cfg = config(6.0, 10.0);
        cfg.scale = 2.0;
        cfg.style = RenderStyle::Striped {
            period: NonZeroU32::new(3).unwrap(),
        };
        let layout = compute_waveform_layout(&[0.5; 14], 0.5, &cfg);
        assert_eq!(layout.line_width, 0.5);
        assert_eq!(layout.indices, vec![0, 1, 6, 7, 12, 13]);
        assert_eq!(layout.segments[1].x, 0.5);
    }

    #[test]
    fn test_max_amplitude_bounded_by_peak() {
        let cfg = config(4.0, 100.0);
        // every value silent but the peak says full scale
        let layout = compute_waveform_layout(&[1.0, 1.0], 0.0, &cfg);
        assert_eq!(layout.max_amplitude, 40.0);
        assert!(layout.segments.iter().all(|s| s.bottom - s.top == 4.0));
    }

    #[test]
    fn test_identical_input_identical_geometry() {
        let cfg = config(50.0, 30.0);
        let values: Vec<f32> = (0..50).map(|i| (i as f32 / 50.0).sin().abs()).collect();
        assert_eq!(
            compute_waveform_layout(&values, 0.1, &cfg),
            compute_waveform_layout(&values, 0.1, &cfg)
        );
    }
}
