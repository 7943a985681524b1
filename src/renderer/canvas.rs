//! Owned RGBA render surface.
//!
//! Drawing coordinates are logical units; the surface multiplies them by its
//! scale to reach pixels. Only the primitives the waveform needs exist here:
//! rectangles, vertical line paths, a vertical linear gradient and a rounded
//! rectangle outline. Edges are antialiased by exact area coverage.

use crate::color::WaveColor;
use crate::error::RenderError;

use super::image::WaveformImage;

/// Largest surface we agree to allocate, in pixels
pub const MAX_SURFACE_PIXELS: usize = 1 << 26;

/// One vertical line in a path, in logical units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub x: f32,
    pub top: f32,
    pub bottom: f32,
}

/// Axis-aligned rectangle in logical units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }
}

/// Straight-alpha RGBA8 pixel buffer with a clip mask stack.
///
/// Internal format is 4 bytes per pixel in **RGBA** order, not premultiplied.
pub struct Canvas {
    data: Vec<u8>,
    width: usize,
    height: usize,
    scale: f32,
    clip: Option<Vec<f32>>,
    saved: Vec<Option<Vec<f32>>>,
}

impl Canvas {
    /// Allocate a transparent `width` x `height` pixel surface.
    pub fn try_new(width: usize, height: usize, scale: f32) -> Result<Self, RenderError> {
        let too_big = || RenderError::SurfaceAllocation {
            width: width.min(u32::MAX as usize) as u32,
            height: height.min(u32::MAX as usize) as u32,
        };
        let pixels = width.checked_mul(height).ok_or_else(too_big)?;
        if pixels == 0 || pixels > MAX_SURFACE_PIXELS {
            return Err(too_big());
        }

        let mut data = Vec::new();
        data.try_reserve_exact(pixels * 4).map_err(|_| too_big())?;
        data.resize(pixels * 4, 0);

        Ok(Self {
            data,
            width,
            height,
            scale,
            clip: None,
            saved: Vec::new(),
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Width in logical units
    pub fn logical_width(&self) -> f32 {
        self.width as f32 / self.scale
    }

    /// Height in logical units
    pub fn logical_height(&self) -> f32 {
        self.height as f32 / self.scale
    }

    /// Read the RGBA values at pixel (x, y); transparent outside the surface
    #[inline]
    pub fn get_pixel(&self, x: usize, y: usize) -> WaveColor {
        if x >= self.width || y >= self.height {
            return WaveColor::CLEAR;
        }
        let idx = (y * self.width + x) * 4;
        WaveColor::rgba(
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        )
    }

    /// Source-over `color` onto pixel `idx` with the given coverage
    #[inline]
    fn blend(&mut self, pixel: usize, color: WaveColor, coverage: f32) {
        let coverage = match &self.clip {
            Some(mask) => coverage * mask[pixel],
            None => coverage,
        };
        let src_a = color.a as f32 / 255.0 * coverage.clamp(0.0, 1.0);
        if src_a <= 0.0 {
            return;
        }

        let idx = pixel * 4;
        let dst_a = self.data[idx + 3] as f32 / 255.0;
        let out_a = src_a + dst_a * (1.0 - src_a);
        let channel = |src: u8, dst: u8| {
            let mixed = (src as f32 * src_a + dst as f32 * dst_a * (1.0 - src_a)) / out_a;
            mixed.round().clamp(0.0, 255.0) as u8
        };

        self.data[idx] = channel(color.r, self.data[idx]);
        self.data[idx + 1] = channel(color.g, self.data[idx + 1]);
        self.data[idx + 2] = channel(color.b, self.data[idx + 2]);
        self.data[idx + 3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    }

    /// Pixel range touched by the logical span `[start, end)` along an axis of `limit` pixels
    fn pixel_span(&self, start: f32, end: f32, limit: usize) -> std::ops::Range<usize> {
        let lo = (start * self.scale).floor().max(0.0) as usize;
        let hi = (end * self.scale).ceil().max(0.0) as usize;
        lo.min(limit)..hi.min(limit)
    }

    /// Fraction of pixel `p` covered by the logical span `[start, end)`
    #[inline]
    fn overlap(&self, p: usize, start: f32, end: f32) -> f32 {
        let lo = (start * self.scale).max(p as f32);
        let hi = (end * self.scale).min(p as f32 + 1.0);
        (hi - lo).max(0.0)
    }

    pub fn fill_rect(&mut self, rect: Rect, color: WaveColor) {
        let (x0, x1) = (rect.x, rect.x + rect.width);
        let (y0, y1) = (rect.y, rect.y + rect.height);
        for py in self.pixel_span(y0, y1, self.height) {
            let cov_y = self.overlap(py, y0, y1);
            for px in self.pixel_span(x0, x1, self.width) {
                let cov = cov_y * self.overlap(px, x0, x1);
                self.blend(py * self.width + px, color, cov);
            }
        }
    }

    fn surface_error(&self) -> RenderError {
        RenderError::SurfaceAllocation {
            width: self.width.min(u32::MAX as usize) as u32,
            height: self.height.min(u32::MAX as usize) as u32,
        }
    }

    /// Coverage mask of `segments` stroked with `line_width` and butt caps.
    ///
    /// Neighbouring strokes that share a pixel add up, so a run of adjacent
    /// lines one pixel apart covers its interior fully.
    fn stroke_coverage(&self, segments: &[Segment], line_width: f32) -> Result<Vec<f32>, RenderError> {
        let mut mask = try_mask(self.width * self.height).map_err(|_| self.surface_error())?;
        let half = line_width / 2.0;
        for seg in segments {
            let (x0, x1) = (seg.x - half, seg.x + half);
            let (y0, y1) = (seg.top.min(seg.bottom), seg.top.max(seg.bottom));
            for py in self.pixel_span(y0, y1, self.height) {
                let cov_y = self.overlap(py, y0, y1);
                let row = py * self.width;
                for px in self.pixel_span(x0, x1, self.width) {
                    mask[row + px] += cov_y * self.overlap(px, x0, x1);
                }
            }
        }
        for cov in &mut mask {
            *cov = cov.min(1.0);
        }
        Ok(mask)
    }

    /// Stroke a path of vertical lines
    pub fn stroke_path(
        &mut self,
        segments: &[Segment],
        line_width: f32,
        color: WaveColor,
    ) -> Result<(), RenderError> {
        let mask = self.stroke_coverage(segments, line_width)?;
        for (pixel, &cov) in mask.iter().enumerate() {
            if cov > 0.0 {
                self.blend(pixel, color, cov);
            }
        }
        Ok(())
    }

    /// Intersect the clip with the area the stroked path would cover
    pub fn clip_to_stroke(&mut self, segments: &[Segment], line_width: f32) -> Result<(), RenderError> {
        let mut mask = self.stroke_coverage(segments, line_width)?;
        if let Some(current) = &self.clip {
            for (cov, clip) in mask.iter_mut().zip(current) {
                *cov *= clip;
            }
        }
        self.clip = Some(mask);
        Ok(())
    }

    pub fn reset_clip(&mut self) {
        self.clip = None;
    }

    /// Push the current clip state
    pub fn save(&mut self) -> Result<(), RenderError> {
        let copy = match &self.clip {
            Some(clip) => {
                let mut copy = try_mask(clip.len()).map_err(|_| self.surface_error())?;
                copy.copy_from_slice(clip);
                Some(copy)
            }
            None => None,
        };
        self.saved.push(copy);
        Ok(())
    }

    /// Pop back to the last saved clip state; no-op without a matching save
    pub fn restore(&mut self) {
        if let Some(clip) = self.saved.pop() {
            self.clip = clip;
        }
    }

    /// Fill the clip area with a vertical gradient from `start_y` to `end_y`.
    ///
    /// Nothing is drawn above `start_y`; below `end_y` the end color continues.
    pub fn fill_linear_gradient(
        &mut self,
        start_y: f32,
        end_y: f32,
        start_color: WaveColor,
        end_color: WaveColor,
    ) {
        let span = end_y - start_y;
        for py in 0..self.height {
            let y = (py as f32 + 0.5) / self.scale;
            let t = if span > 0.0 { (y - start_y) / span } else { 1.0 };
            if t < 0.0 {
                continue;
            }
            let color = start_color.lerp(end_color, t);
            let row = py * self.width;
            for px in 0..self.width {
                self.blend(row + px, color, 1.0);
            }
        }
    }

    /// Stroke a rounded rectangle outline whose band lies inside `rect`.
    pub fn stroke_rounded_rect(&mut self, rect: Rect, radius: f32, line_width: f32, color: WaveColor) {
        if line_width <= 0.0 {
            return;
        }
        let half_w = rect.width / 2.0;
        let half_h = rect.height / 2.0;
        let (cx, cy) = (rect.x + half_w, rect.y + half_h);
        let radius = radius.clamp(0.0, half_w.min(half_h));

        for py in 0..self.height {
            let y = (py as f32 + 0.5) / self.scale;
            for px in 0..self.width {
                let x = (px as f32 + 0.5) / self.scale;
                let d = rounded_rect_distance(x - cx, y - cy, half_w, half_h, radius);
                // depth inside the band, in pixels
                let depth = (-d).min(d + line_width) * self.scale;
                let cov = (depth + 0.5).clamp(0.0, 1.0);
                if cov > 0.0 {
                    self.blend(py * self.width + px, color, cov);
                }
            }
        }
    }

    pub fn into_image(self) -> WaveformImage {
        WaveformImage::new(self.width as u32, self.height as u32, self.data)
    }
}

/// Signed distance from a point (relative to the rectangle center) to a rounded rectangle; negative inside
fn rounded_rect_distance(x: f32, y: f32, half_w: f32, half_h: f32, radius: f32) -> f32 {
    let qx = x.abs() - half_w + radius;
    let qy = y.abs() - half_h + radius;
    let outside = (qx.max(0.0).powi(2) + qy.max(0.0).powi(2)).sqrt();
    outside + qx.max(qy).min(0.0) - radius
}

/// Zeroed coverage mask of `len` pixels, allocated without aborting on failure
fn try_mask(len: usize) -> Result<Vec<f32>, std::collections::TryReserveError> {
    let mut mask = Vec::new();
    mask.try_reserve_exact(len)?;
    mask.resize(len, 0.0);
    Ok(mask)
}
