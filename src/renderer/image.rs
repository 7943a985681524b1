use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::color::WaveColor;

/// Rendered waveform: straight-alpha RGBA8 pixels, row-major, top row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveformImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl WaveformImage {
    pub(crate) fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<WaveColor> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        let p = &self.pixels[idx..idx + 4];
        Some(WaveColor::rgba(p[0], p[1], p[2], p[3]))
    }

    /// Encode as an 8-bit RGBA PNG
    pub fn to_png(&self) -> Result<Vec<u8>, png::EncodingError> {
        let mut out = Vec::new();
        self.encode(&mut out)?;
        Ok(out)
    }

    pub fn write_png(&self, path: impl AsRef<Path>) -> Result<(), png::EncodingError> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        self.encode(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    fn encode<W: Write>(&self, sink: W) -> Result<(), png::EncodingError> {
        let mut encoder = png::Encoder::new(sink, self.width, self.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&self.pixels)?;
        writer.finish()
    }
}
