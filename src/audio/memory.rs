use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::watch;

use super::{AsyncPcmSource, PcmSource, ReaderStatus, TimeWindow, TrackMetadata};
use crate::error::{Result, SamplerError};

const BYTES_PER_SAMPLE: usize = 2;
const DEFAULT_CHUNK_BYTES: usize = 8192;

/// PCM source over an in-memory byte buffer.
///
/// Used for synthetic signals and for callers that already hold decoded PCM.
/// Buffers are handed out in fixed-size chunks so the extractor sees the same
/// streaming behavior it would from a decoder.
pub struct MemorySource {
    metadata: std::result::Result<TrackMetadata, SamplerError>,
    bytes: Vec<u8>,
    position: usize,
    end: usize,
    chunk_bytes: usize,
    window_applied: bool,
    status: ReaderStatus,
    interruption: Option<Interruption>,
    reads: usize,
    ready: Option<watch::Receiver<bool>>,
}

struct Interruption {
    after_reads: usize,
    status: ReaderStatus,
    message: String,
}

/// Marks the metadata of a deferred [`MemorySource`] as available.
pub struct MetadataPublisher {
    sender: watch::Sender<bool>,
}

impl MetadataPublisher {
    pub fn publish(&self) {
        let _ = self.sender.send(true);
    }
}

impl MemorySource {
    /// Source over interleaved samples; duration is derived from the sample count.
    pub fn from_samples(samples: &[i16], sample_rate: u32, channel_count: u16) -> Self {
        let frames = samples.len() / channel_count.max(1) as usize;
        let duration = Duration::from_secs_f64(frames as f64 / sample_rate.max(1) as f64);
        let bytes = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Self::from_bytes(bytes, TrackMetadata::audio(sample_rate, channel_count, duration))
    }

    /// Source over raw little-endian PCM bytes with explicit metadata.
    pub fn from_bytes(bytes: Vec<u8>, metadata: TrackMetadata) -> Self {
        let end = bytes.len();
        Self {
            metadata: Ok(metadata),
            bytes,
            position: 0,
            end,
            chunk_bytes: DEFAULT_CHUNK_BYTES,
            window_applied: false,
            status: ReaderStatus::Reading,
            interruption: None,
            reads: 0,
            ready: None,
        }
    }

    /// Source whose metadata lookup fails with `error`
    pub fn unavailable(error: SamplerError) -> Self {
        let mut source = Self::from_bytes(Vec::new(), TrackMetadata::audio(0, 0, Duration::ZERO));
        source.metadata = Err(error);
        source
    }

    /// Replace the advertised metadata, leaving the PCM data untouched
    pub fn with_metadata(mut self, metadata: TrackMetadata) -> Self {
        self.metadata = Ok(metadata);
        self
    }

    pub fn with_chunk_bytes(mut self, chunk_bytes: usize) -> Self {
        self.chunk_bytes = chunk_bytes.max(1);
        self
    }

    /// Report a decoder failure after `reads` buffers have been delivered
    pub fn fail_after(mut self, reads: usize, message: impl Into<String>) -> Self {
        self.interruption = Some(Interruption {
            after_reads: reads,
            status: ReaderStatus::Failed,
            message: message.into(),
        });
        self
    }

    /// Report a cancellation after `reads` buffers have been delivered
    pub fn cancel_after(mut self, reads: usize) -> Self {
        self.interruption = Some(Interruption {
            after_reads: reads,
            status: ReaderStatus::Cancelled,
            message: "reading was cancelled".to_string(),
        });
        self
    }

    /// Hold back async metadata readiness until the returned publisher fires.
    pub fn deferred(mut self) -> (Self, MetadataPublisher) {
        let (sender, receiver) = watch::channel(false);
        self.ready = Some(receiver);
        (self, MetadataPublisher { sender })
    }

    fn frame_bytes(&self) -> usize {
        match &self.metadata {
            Ok(meta) => meta.channel_count.max(1) as usize * BYTES_PER_SAMPLE,
            Err(_) => BYTES_PER_SAMPLE,
        }
    }
}

impl PcmSource for MemorySource {
    fn metadata(&mut self) -> Result<TrackMetadata> {
        self.metadata.clone()
    }

    fn restrict_to(&mut self, window: TimeWindow) -> Result<()> {
        if self.window_applied {
            return Err(SamplerError::WindowAlreadyApplied);
        }
        self.window_applied = true;

        let meta = self.metadata.clone()?;
        let frame_bytes = self.frame_bytes();
        let rate = meta.sample_rate as f64;
        let start_frames = (window.start.as_secs_f64() * rate).round() as usize;
        let window_frames = (window.duration.as_secs_f64() * rate).round() as usize;

        self.position = start_frames.saturating_mul(frame_bytes).min(self.bytes.len());
        self.end = self
            .position
            .saturating_add(window_frames.saturating_mul(frame_bytes))
            .min(self.bytes.len());
        Ok(())
    }

    fn read_next(&mut self) -> Option<Vec<u8>> {
        if self.status != ReaderStatus::Reading {
            return None;
        }
        if let Some(interruption) = &self.interruption {
            if self.reads >= interruption.after_reads {
                self.status = interruption.status;
                return None;
            }
        }
        if self.position >= self.end {
            self.status = ReaderStatus::Completed;
            return None;
        }

        let next = (self.position + self.chunk_bytes).min(self.end);
        let chunk = self.bytes[self.position..next].to_vec();
        self.position = next;
        self.reads += 1;
        Some(chunk)
    }

    fn status(&self) -> ReaderStatus {
        self.status
    }

    fn failure_message(&self) -> Option<String> {
        match self.status {
            ReaderStatus::Failed | ReaderStatus::Cancelled => {
                self.interruption.as_ref().map(|i| i.message.clone())
            }
            _ => None,
        }
    }
}

#[async_trait]
impl AsyncPcmSource for MemorySource {
    async fn metadata_ready(&mut self) -> Result<()> {
        if let Some(ready) = self.ready.as_mut() {
            let published = ready.wait_for(|published| *published).await.is_ok();
            if !published {
                return Err(SamplerError::AssetNotFound(
                    "metadata was never published".to_string(),
                ));
            }
        }
        self.metadata.clone().map(|_| ())
    }
}
