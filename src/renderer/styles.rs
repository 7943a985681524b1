//! Compositing passes for the waveform and its decorations.

use tracing::debug;

use super::canvas::{Canvas, Rect, Segment};
use crate::error::RenderError;
use super::layout::WaveformLayout;
use super::{RenderConfig, RenderStyle};

/// Brightness shift between the two gradient stops
const GRADIENT_HIGHLIGHT: f32 = 0.5;

pub fn draw_background(canvas: &mut Canvas, config: &RenderConfig) {
    let rect = Rect::new(0.0, 0.0, canvas.logical_width(), canvas.logical_height());
    canvas.fill_rect(rect, config.background_color);
}

/// Dispatch to the correct style renderer.
pub fn draw_graph(
    canvas: &mut Canvas,
    layout: &WaveformLayout,
    config: &RenderConfig,
) -> Result<(), RenderError> {
    if layout.segments.is_empty() {
        return Ok(());
    }
    match config.style {
        RenderStyle::Filled | RenderStyle::Striped { .. } => draw_stroked(canvas, layout, config),
        RenderStyle::Gradient => draw_gradient(canvas, layout, config),
    }
}

fn draw_stroked(
    canvas: &mut Canvas,
    layout: &WaveformLayout,
    config: &RenderConfig,
) -> Result<(), RenderError> {
    canvas.stroke_path(&layout.segments, layout.line_width, config.color)
}

/// Clip to the stroked path, then fill from `color` at the top extreme to its highlight at the bottom
fn draw_gradient(
    canvas: &mut Canvas,
    layout: &WaveformLayout,
    config: &RenderConfig,
) -> Result<(), RenderError> {
    let highlighted = config.color.highlight(GRADIENT_HIGHLIGHT);
    debug!("Gradient {} -> {}", config.color, highlighted);

    canvas.clip_to_stroke(&layout.segments, layout.line_width)?;
    canvas.fill_linear_gradient(
        layout.center - layout.max_amplitude,
        layout.center + layout.max_amplitude,
        config.color,
        highlighted,
    );
    Ok(())
}

pub fn draw_border(canvas: &mut Canvas, config: &RenderConfig) {
    let rect = Rect::new(0.0, 0.0, canvas.logical_width(), canvas.logical_height());
    canvas.stroke_rounded_rect(rect, config.border_radius, config.border_width, config.border_color);
}

pub fn draw_central_line(canvas: &mut Canvas, config: &RenderConfig) -> Result<(), RenderError> {
    let line = Segment {
        x: canvas.logical_width() / 2.0,
        top: 0.0,
        bottom: canvas.logical_height(),
    };
    canvas.stroke_path(&[line], config.central_line.width, config.central_line.color)
}
