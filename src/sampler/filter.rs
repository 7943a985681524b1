//! Per-sample dB conversion and box-filter downsampling.

/// 0 dB reference: the largest magnitude a signed 16-bit sample can hold
pub const FULL_SCALE: f32 = 32768.0;

/// Amplitude of `sample` in dB relative to full scale, clipped to `[noise_floor_db, 0]`
#[inline]
pub fn clipped_decibels(sample: i16, noise_floor_db: f32) -> f32 {
    let magnitude = (sample as f32).abs();
    let db = 20.0 * (magnitude / FULL_SCALE).log10();
    // log10(0) is -inf, which the clip maps onto the floor
    db.clamp(noise_floor_db, 0.0)
}

/// Unweighted averaging kernel: every tap weighs `1 / width`.
///
/// Windows are summed and divided by the width, so a constant input comes out
/// bit-exact.
#[derive(Debug, Clone, Copy)]
pub struct BoxFilter {
    width: usize,
}

impl BoxFilter {
    pub fn new(width: usize) -> Self {
        Self { width: width.max(1) }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Decimate `input` by the kernel width, one output point per full window.
    ///
    /// Trailing input that does not fill a window is ignored.
    pub fn downsample(&self, input: &[f32], output: &mut Vec<f32>) {
        output.reserve(input.len() / self.width);
        let width = self.width as f32;
        for window in input.chunks_exact(self.width) {
            let sum: f32 = window.iter().sum();
            output.push(sum / width);
        }
    }
}
