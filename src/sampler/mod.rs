//! Envelope extraction.
//!
//! Reduces an arbitrarily long PCM stream to one dB-normalized amplitude per
//! output pixel. Samples are converted to dB relative to full scale, clipped
//! to the noise floor, box-filtered down to `samples_per_pixel` resolution and
//! finally divided by the (negative) noise floor, so silence maps to 1.0 and
//! full scale to 0.0.

mod accumulator;
mod dispatch;
mod filter;

pub use dispatch::{
    extract_envelope_async, extract_when_ready, CompletionContext, CompletionJob, CompletionQueue,
    Immediate,
};
pub use filter::{clipped_decibels, BoxFilter, FULL_SCALE};

use std::time::Instant;
use tracing::{debug, info, warn};

use crate::audio::{MediaType, PcmSource, ReaderStatus, TimeWindow};
use crate::error::{Result, SamplerError};
use accumulator::Accumulator;

/// Default noise floor: everything below -50 dB is treated as silence
pub const DEFAULT_NOISE_FLOOR_DB: f32 = -50.0;

/// Normalized value of a point that saw no signal
pub const SILENCE: f32 = 1.0;

/// Per-call extraction settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerOptions {
    /// dB threshold below which signal counts as silence; also the normalization divisor
    pub noise_floor_db: f32,
}

impl Default for SamplerOptions {
    fn default() -> Self {
        Self {
            noise_floor_db: DEFAULT_NOISE_FLOOR_DB,
        }
    }
}

impl SamplerOptions {
    pub fn with_noise_floor(noise_floor_db: f32) -> Self {
        Self { noise_floor_db }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.noise_floor_db.is_finite() || self.noise_floor_db >= 0.0 {
            return Err(SamplerError::InvalidNoiseFloor(self.noise_floor_db));
        }
        Ok(())
    }
}

/// Normalized amplitude summary of a track, one value per output pixel.
///
/// Values lie in `[0, 1]` where 0 is full scale and 1 is at or below the
/// noise floor. `peak` is the loudest sample seen, in the same domain.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    values: Vec<f32>,
    peak: f32,
}

impl Envelope {
    /// Flat placeholder for when no waveform is available
    pub fn silence(len: usize) -> Self {
        Self {
            values: vec![SILENCE; len],
            peak: SILENCE,
        }
    }

    /// Build an envelope from already-normalized values, clamping into `[0, 1]`
    pub fn from_normalized(values: Vec<f32>, peak: f32) -> Self {
        Self {
            values: values.into_iter().map(|v| v.clamp(0.0, 1.0)).collect(),
            peak: peak.clamp(0.0, 1.0),
        }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn peak(&self) -> f32 {
        self.peak
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        self.values.iter().copied()
    }
}

/// Everything an extraction needs besides the source
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRequest {
    pub window: Option<TimeWindow>,
    pub resolution: usize,
    pub options: SamplerOptions,
    /// Handed back to the completion callbacks untouched
    pub correlation_id: Option<String>,
}

impl ExtractionRequest {
    pub fn new(resolution: usize) -> Self {
        Self {
            window: None,
            resolution,
            options: SamplerOptions::default(),
            correlation_id: None,
        }
    }

    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = Some(window);
        self
    }

    pub fn with_options(mut self, options: SamplerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }
}

/// `max(1, floor(total_samples / resolution))`
pub fn samples_per_pixel(total_samples: f64, resolution: usize) -> usize {
    let per_pixel = (total_samples / resolution.max(1) as f64).floor();
    if per_pixel >= 1.0 {
        per_pixel as usize
    } else {
        1
    }
}

/// Extract an envelope of roughly `resolution` points from `source`.
///
/// Blocks until the source is exhausted. Any read failure discards the points
/// accumulated so far. A source too short to fill `resolution` points is padded
/// with silence rather than rejected.
pub fn extract_envelope<S: PcmSource + ?Sized>(
    source: &mut S,
    window: Option<TimeWindow>,
    resolution: usize,
    options: &SamplerOptions,
) -> Result<Envelope> {
    options.validate()?;
    if resolution == 0 {
        return Err(SamplerError::InvalidResolution);
    }

    let started = Instant::now();
    let metadata = source.metadata()?;
    if metadata.media_type != MediaType::Audio {
        return Err(SamplerError::MediaTypeMismatch(metadata.media_type));
    }
    if metadata.channel_count == 0 {
        return Err(SamplerError::TrackNotFound);
    }
    if let Some(window) = window {
        source.restrict_to(window)?;
    }

    let total_samples = metadata.total_sample_count(window.as_ref());
    let per_pixel = samples_per_pixel(total_samples, resolution);
    debug!(
        "Extracting {} points: {} Hz x {} ch over {:.3}s, {} samples per pixel",
        resolution,
        metadata.sample_rate,
        metadata.channel_count,
        metadata.window_seconds(window.as_ref()),
        per_pixel
    );

    let mut accumulator = Accumulator::new(per_pixel, resolution, options.noise_floor_db);
    while source.status() == ReaderStatus::Reading {
        match source.read_next() {
            Some(buffer) => accumulator.push_bytes(&buffer),
            None => break,
        }
    }

    let status = source.status();
    if status != ReaderStatus::Completed {
        let message = source
            .failure_message()
            .unwrap_or_else(|| format!("reading waveform audio data has failed ({})", status));
        debug!("Extraction aborted, discarding accumulated points: {}", message);
        return Err(SamplerError::ReadFailure { status, message });
    }

    let accumulated = accumulator.finish();
    let floor = options.noise_floor_db;
    let mut values: Vec<f32> = accumulated
        .points
        .iter()
        .map(|db| (db / floor).clamp(0.0, 1.0))
        .collect();
    let peak = (accumulated.peak_db / floor).clamp(0.0, 1.0);

    if values.len() < resolution {
        warn!(
            "Source produced {} of {} points ({} samples), padding with silence",
            values.len(),
            resolution,
            accumulated.samples
        );
        values.resize(resolution, SILENCE);
    }

    info!(
        "Extracted {} points (peak {:.3}) from {} samples in {:.3}s",
        values.len(),
        peak,
        accumulated.samples,
        started.elapsed().as_secs_f64()
    );

    Ok(Envelope { values, peak })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{MemorySource, TrackMetadata};
    use std::time::Duration;

    fn extract(source: &mut MemorySource, resolution: usize) -> Result<Envelope> {
        extract_envelope(source, None, resolution, &SamplerOptions::default())
    }

    fn sine(len: usize, amplitude: f32) -> Vec<i16> {
        (0..len)
            .map(|i| ((i as f32 * 0.05).sin() * amplitude) as i16)
            .collect()
    }

    #[test]
    fn test_ten_seconds_mono_at_hundred_points() {
        let samples = sine(441_000, 12_000.0);
        let mut source = MemorySource::from_samples(&samples, 44100, 1);
        assert_eq!(samples_per_pixel(441_000.0, 100), 4410);

        let envelope = extract(&mut source, 100).unwrap();
        assert_eq!(envelope.len(), 100);
    }

    #[test]
    fn test_length_within_one_of_resolution() {
        for (len, resolution) in [(1000, 7), (999, 10), (44_100, 333), (12_345, 1), (5, 5)] {
            let mut source = MemorySource::from_samples(&sine(len, 8000.0), 44100, 1);
            let envelope = extract(&mut source, resolution).unwrap();
            let diff = envelope.len() as i64 - resolution as i64;
            assert!(diff.abs() <= 1, "len {} resolution {} got {}", len, resolution, envelope.len());
        }
    }

    #[test]
    fn test_values_within_unit_range() {
        let mut source = MemorySource::from_samples(&sine(20_000, 32767.0), 8000, 2);
        let envelope = extract(&mut source, 64).unwrap();
        assert!(envelope.iter().all(|v| (0.0..=1.0).contains(&v)));
        assert!((0.0..=1.0).contains(&envelope.peak()));
    }

    #[test]
    fn test_all_zero_input_is_silence() {
        let mut source = MemorySource::from_samples(&vec![0; 9000], 9000, 1);
        let envelope = extract(&mut source, 30).unwrap();
        assert_eq!(envelope.len(), 30);
        assert!(envelope.iter().all(|v| v == 1.0));
        assert_eq!(envelope.peak(), 1.0);
    }

    #[test]
    fn test_full_scale_input_is_near_zero() {
        let samples: Vec<i16> = (0..8000)
            .map(|i| if i % 2 == 0 { i16::MAX } else { i16::MIN })
            .collect();
        let mut source = MemorySource::from_samples(&samples, 8000, 1);
        let envelope = extract(&mut source, 16).unwrap();
        assert!(envelope.iter().all(|v| v < 1e-4), "{:?}", envelope.values());
        assert_eq!(envelope.peak(), 0.0);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let samples = sine(30_000, 20_000.0);
        let first = extract(&mut MemorySource::from_samples(&samples, 22050, 2), 120).unwrap();
        let second = extract(&mut MemorySource::from_samples(&samples, 22050, 2), 120).unwrap();
        let bits = |e: &Envelope| e.iter().map(f32::to_bits).collect::<Vec<_>>();
        assert_eq!(bits(&first), bits(&second));
        assert_eq!(first.peak().to_bits(), second.peak().to_bits());
    }

    #[test]
    fn test_short_input_padded_with_silence() {
        let mut source = MemorySource::from_samples(&[20_000, -20_000, 20_000], 44100, 1);
        let envelope = extract(&mut source, 10).unwrap();
        assert_eq!(envelope.len(), 10);
        assert!(envelope.values()[0] < 1.0);
        assert!(envelope.values()[3..].iter().all(|&v| v == SILENCE));
    }

    #[test]
    fn test_empty_input_is_all_silence() {
        let mut source = MemorySource::from_samples(&[], 44100, 1);
        let envelope = extract(&mut source, 4).unwrap();
        assert_eq!(envelope, Envelope::silence(4));
    }

    #[test]
    fn test_remainder_becomes_final_point() {
        // Metadata claims 1000 samples, stream carries 1005
        let samples = vec![16384i16; 1005];
        let mut source = MemorySource::from_samples(&samples, 1000, 1)
            .with_metadata(TrackMetadata::audio(1000, 1, Duration::from_secs(1)));
        let envelope = extract(&mut source, 10).unwrap();
        assert_eq!(envelope.len(), 11);
        let last = envelope.values()[10];
        assert!((last - envelope.values()[0]).abs() < 1e-6);
    }

    #[test]
    fn test_non_audio_track_is_mismatch() {
        let meta = TrackMetadata {
            media_type: MediaType::Video,
            ..TrackMetadata::audio(44100, 2, Duration::from_secs(10))
        };
        let mut source = MemorySource::from_samples(&[0; 100], 44100, 2).with_metadata(meta);
        assert_eq!(
            extract(&mut source, 10),
            Err(SamplerError::MediaTypeMismatch(MediaType::Video))
        );
    }

    #[test]
    fn test_missing_asset_and_track_propagate() {
        let mut source = MemorySource::unavailable(SamplerError::AssetNotFound("gone.wav".into()));
        assert!(matches!(extract(&mut source, 10), Err(SamplerError::AssetNotFound(_))));

        let mut source = MemorySource::unavailable(SamplerError::TrackNotFound);
        assert_eq!(extract(&mut source, 10), Err(SamplerError::TrackNotFound));
    }

    #[test]
    fn test_read_failure_discards_points() {
        let mut source = MemorySource::from_samples(&sine(10_000, 9000.0), 1000, 1)
            .with_chunk_bytes(1000)
            .fail_after(3, "corrupt packet");
        match extract(&mut source, 10) {
            Err(SamplerError::ReadFailure { status, message }) => {
                assert_eq!(status, ReaderStatus::Failed);
                assert_eq!(message, "corrupt packet");
            }
            other => panic!("expected read failure, got {:?}", other),
        }
    }

    #[test]
    fn test_cancellation_is_read_failure() {
        let mut source = MemorySource::from_samples(&[0; 100], 100, 1)
            .with_chunk_bytes(10)
            .cancel_after(1);
        assert!(matches!(
            extract(&mut source, 10),
            Err(SamplerError::ReadFailure {
                status: ReaderStatus::Cancelled,
                ..
            })
        ));
    }

    #[test]
    fn test_window_sets_samples_per_pixel() {
        // 10s at 1 kHz; only seconds 1..10 are read
        let samples = vec![8000i16; 10_000];
        let mut source = MemorySource::from_samples(&samples, 1000, 1);
        let window = TimeWindow::from_secs_f64(1.0, 9.0);
        let envelope =
            extract_envelope(&mut source, Some(window), 90, &SamplerOptions::default()).unwrap();
        // 9000 samples / 90 points = 100 per pixel, no remainder
        assert_eq!(envelope.len(), 90);
        // every point comes from audio; none is silence padding
        assert!(envelope.iter().all(|v| v < 1.0));
    }

    #[test]
    fn test_rejects_invalid_requests() {
        let mut source = MemorySource::from_samples(&[0; 10], 10, 1);
        assert_eq!(extract(&mut source, 0), Err(SamplerError::InvalidResolution));
        let result =
            extract_envelope(&mut source, None, 10, &SamplerOptions::with_noise_floor(3.0));
        assert_eq!(result, Err(SamplerError::InvalidNoiseFloor(3.0)));
    }

    #[test]
    fn test_custom_noise_floor_rescales() {
        let samples = vec![3277i16; 1000]; // about -20 dBFS
        let at_50 = extract(&mut MemorySource::from_samples(&samples, 1000, 1), 1).unwrap();
        let at_25 = extract_envelope(
            &mut MemorySource::from_samples(&samples, 1000, 1),
            None,
            1,
            &SamplerOptions::with_noise_floor(-25.0),
        )
        .unwrap();
        assert!((at_50.values()[0] - 0.4).abs() < 0.01);
        assert!((at_25.values()[0] - 0.8).abs() < 0.01);
    }

    #[test]
    fn test_samples_per_pixel_floor_of_one() {
        assert_eq!(samples_per_pixel(10.0, 100), 1);
        assert_eq!(samples_per_pixel(0.0, 1), 1);
        assert_eq!(samples_per_pixel(882_000.0, 1000), 882);
    }
}
