use async_trait::async_trait;
use hound::{SampleFormat, WavReader, WavSpec};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use super::{AsyncPcmSource, PcmSource, ReaderStatus, TimeWindow, TrackMetadata};
use crate::error::{Result, SamplerError};

/// Interleaved samples handed out per `read_next`
const CHUNK_SAMPLES: usize = 4096;

/// PCM source backed by a WAV file.
///
/// Whatever the file's sample format, buffers come out as 16-bit little-endian
/// PCM. The file is opened on first use, or ahead of time by
/// [`AsyncPcmSource::metadata_ready`] on a blocking task.
pub struct WavSource {
    path: PathBuf,
    decoder: Option<Decoder>,
    window_applied: bool,
    status: ReaderStatus,
    failure: Option<String>,
}

struct Decoder {
    reader: WavReader<BufReader<File>>,
    spec: WavSpec,
    metadata: TrackMetadata,
    remaining: u64,
}

impl WavSource {
    /// Lazily opened source; nothing touches the filesystem yet
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            decoder: None,
            window_applied: false,
            status: ReaderStatus::Reading,
            failure: None,
        }
    }

    /// Open the file right away, failing with `AssetNotFound` if it cannot be decoded
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let mut source = Self::new(path);
        source.decoder = Some(open_decoder(&source.path)?);
        Ok(source)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn decoder(&mut self) -> Result<&mut Decoder> {
        if self.decoder.is_none() {
            self.decoder = Some(open_decoder(&self.path)?);
        }
        self.decoder
            .as_mut()
            .ok_or_else(|| SamplerError::AssetNotFound(self.path.display().to_string()))
    }

    fn fail(&mut self, message: String) {
        warn!("WAV decode error in {}: {}", self.path.display(), message);
        self.status = ReaderStatus::Failed;
        self.failure = Some(message);
    }
}

fn open_decoder(path: &Path) -> Result<Decoder> {
    let reader = WavReader::open(path)
        .map_err(|e| SamplerError::AssetNotFound(format!("{}: {}", path.display(), e)))?;
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(SamplerError::TrackNotFound);
    }

    let frames = reader.duration();
    let duration = Duration::from_secs_f64(frames as f64 / spec.sample_rate.max(1) as f64);
    debug!(
        "Opened {}: {} Hz, {} channels, {}-bit {:?}, {:.2}s",
        path.display(),
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample,
        spec.sample_format,
        duration.as_secs_f64()
    );

    Ok(Decoder {
        remaining: reader.len() as u64,
        metadata: TrackMetadata::audio(spec.sample_rate, spec.channels, duration),
        reader,
        spec,
    })
}

/// Rescale an integer sample of `bits` width to 16 bits
fn int_to_i16(sample: i32, bits: u16) -> i16 {
    if bits >= 16 {
        (sample >> (bits - 16)) as i16
    } else {
        (sample << (16 - bits)) as i16
    }
}

fn float_to_i16(sample: f32) -> i16 {
    (sample * 32768.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

impl Decoder {
    fn read_chunk(&mut self, out: &mut Vec<u8>) -> std::result::Result<(), hound::Error> {
        let wanted = (self.remaining as usize).min(CHUNK_SAMPLES);
        let before = out.len();
        match self.spec.sample_format {
            SampleFormat::Int => {
                let bits = self.spec.bits_per_sample;
                for sample in self.reader.samples::<i32>().take(wanted) {
                    out.extend_from_slice(&int_to_i16(sample?, bits).to_le_bytes());
                }
            }
            SampleFormat::Float => {
                for sample in self.reader.samples::<f32>().take(wanted) {
                    out.extend_from_slice(&float_to_i16(sample?).to_le_bytes());
                }
            }
        }
        let read = (out.len() - before) / 2;
        // A short read means the data chunk ended early
        self.remaining = if read < wanted { 0 } else { self.remaining - read as u64 };
        Ok(())
    }
}

impl PcmSource for WavSource {
    fn metadata(&mut self) -> Result<TrackMetadata> {
        Ok(self.decoder()?.metadata.clone())
    }

    fn restrict_to(&mut self, window: TimeWindow) -> Result<()> {
        if self.window_applied {
            return Err(SamplerError::WindowAlreadyApplied);
        }
        self.window_applied = true;

        let decoder = self.decoder()?;
        let rate = decoder.spec.sample_rate as f64;
        let total_frames = decoder.reader.duration();
        let start = ((window.start.as_secs_f64() * rate).round() as u64).min(total_frames as u64) as u32;
        let frames = (window.duration.as_secs_f64() * rate).round() as u64;

        let seek = decoder.reader.seek(start);
        let available = (total_frames - start) as u64;
        decoder.remaining = frames.min(available) * decoder.spec.channels as u64;

        if let Err(e) = seek {
            self.fail(format!("seek to frame {} failed: {}", start, e));
        }
        Ok(())
    }

    fn read_next(&mut self) -> Option<Vec<u8>> {
        if self.status != ReaderStatus::Reading {
            return None;
        }
        if let Err(e) = self.decoder() {
            self.fail(e.to_string());
            return None;
        }
        let decoder = self.decoder.as_mut()?;
        if decoder.remaining == 0 {
            self.status = ReaderStatus::Completed;
            return None;
        }

        let mut chunk = Vec::with_capacity(CHUNK_SAMPLES * 2);
        if let Err(e) = decoder.read_chunk(&mut chunk) {
            self.fail(e.to_string());
            return None;
        }
        if chunk.is_empty() {
            self.status = ReaderStatus::Completed;
            return None;
        }
        Some(chunk)
    }

    fn status(&self) -> ReaderStatus {
        self.status
    }

    fn failure_message(&self) -> Option<String> {
        self.failure.clone()
    }
}

#[async_trait]
impl AsyncPcmSource for WavSource {
    async fn metadata_ready(&mut self) -> Result<()> {
        if self.decoder.is_some() {
            return Ok(());
        }
        let path = self.path.clone();
        let decoder = tokio::task::spawn_blocking(move || open_decoder(&path))
            .await
            .map_err(|e| SamplerError::AssetNotFound(format!("{}: {}", self.path.display(), e)))??;
        self.decoder = Some(decoder);
        Ok(())
    }
}
