//! PCM source boundary.
//!
//! The sampler only ever sees a [`PcmSource`]: a sequential reader of
//! interleaved, little-endian, signed 16-bit PCM plus the metadata of the
//! track being read. Decoding lives behind that trait.

mod memory;
mod wav;

pub use memory::{MemorySource, MetadataPublisher};
pub use wav::WavSource;

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

use crate::error::Result;

/// Kind of media carried by a track
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaType {
    Audio,
    Video,
    Text,
    Other(String),
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaType::Audio => write!(f, "audio"),
            MediaType::Video => write!(f, "video"),
            MediaType::Text => write!(f, "text"),
            MediaType::Other(kind) => write!(f, "{}", kind),
        }
    }
}

/// Decoder state reported by a source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderStatus {
    Reading,
    Completed,
    Failed,
    Cancelled,
}

impl fmt::Display for ReaderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReaderStatus::Reading => write!(f, "reading"),
            ReaderStatus::Completed => write!(f, "completed"),
            ReaderStatus::Failed => write!(f, "failed"),
            ReaderStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Sub-range of a track to extract from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub start: Duration,
    pub duration: Duration,
}

impl TimeWindow {
    pub fn new(start: Duration, duration: Duration) -> Self {
        Self { start, duration }
    }

    /// Negative or NaN seconds become zero; values too large for a
    /// `Duration` saturate to `Duration::MAX`.
    pub fn from_secs_f64(start: f64, duration: f64) -> Self {
        Self {
            start: saturating_secs(start),
            duration: saturating_secs(duration),
        }
    }

    pub fn end(&self) -> Duration {
        self.start.saturating_add(self.duration)
    }
}

fn saturating_secs(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX)
}

/// Format and duration of the track behind a source
#[derive(Debug, Clone, PartialEq)]
pub struct TrackMetadata {
    pub sample_rate: u32,
    pub channel_count: u16,
    pub duration: Duration,
    pub media_type: MediaType,
}

impl TrackMetadata {
    pub fn audio(sample_rate: u32, channel_count: u16, duration: Duration) -> Self {
        Self {
            sample_rate,
            channel_count,
            duration,
            media_type: MediaType::Audio,
        }
    }

    /// Seconds covered by `window`, clamped to the end of the track.
    /// Without a window this is the whole track.
    pub fn window_seconds(&self, window: Option<&TimeWindow>) -> f64 {
        let track = self.duration.as_secs_f64();
        match window {
            Some(w) => {
                let start = w.start.as_secs_f64();
                let available = (track - start).max(0.0);
                w.duration.as_secs_f64().min(available)
            }
            None => track,
        }
    }

    /// Interleaved sample count (all channels) expected for `window`
    pub fn total_sample_count(&self, window: Option<&TimeWindow>) -> f64 {
        self.sample_rate as f64 * self.window_seconds(window) * self.channel_count as f64
    }
}

/// Sequential reader of interleaved little-endian i16 PCM.
///
/// A source is driven by exactly one extraction: the window (if any) is applied
/// before the first read, then buffers are pulled until `read_next` returns
/// `None`. At that point `status` tells whether the stream ended cleanly.
pub trait PcmSource: Send {
    /// Metadata of the track being read.
    ///
    /// Fails with [`SamplerError::AssetNotFound`] or
    /// [`SamplerError::TrackNotFound`] when there is nothing to read.
    ///
    /// [`SamplerError::AssetNotFound`]: crate::SamplerError::AssetNotFound
    /// [`SamplerError::TrackNotFound`]: crate::SamplerError::TrackNotFound
    fn metadata(&mut self) -> Result<TrackMetadata>;

    /// Restrict subsequent reads to `window`. Can only be applied once.
    fn restrict_to(&mut self, window: TimeWindow) -> Result<()>;

    /// Next buffer of raw PCM bytes, or `None` once the source stops producing.
    fn read_next(&mut self) -> Option<Vec<u8>>;

    fn status(&self) -> ReaderStatus;

    /// Decoder message accompanying a failed or cancelled status
    fn failure_message(&self) -> Option<String> {
        None
    }
}

/// A source whose metadata becomes available asynchronously.
#[async_trait]
pub trait AsyncPcmSource: PcmSource {
    /// Resolves once duration and format metadata can be read.
    async fn metadata_ready(&mut self) -> Result<()>;
}
