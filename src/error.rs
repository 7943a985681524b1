use thiserror::Error;

use crate::audio::{MediaType, ReaderStatus};

/// Errors raised while extracting an envelope from a PCM source.
///
/// Every variant is terminal: the extractor never hands back a partial
/// envelope alongside one of these.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SamplerError {
    /// No decodable asset backs the source
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    /// The asset has no track of the requested media type
    #[error("No audio track found")]
    TrackNotFound,

    /// A track exists but it is not audio
    #[error("Expected an audio track, found {0}")]
    MediaTypeMismatch(MediaType),

    /// The decoder failed or was cancelled mid-stream
    #[error("Reading waveform audio data failed ({status}): {message}")]
    ReadFailure { status: ReaderStatus, message: String },

    #[error("Resolution must be at least 1 point")]
    InvalidResolution,

    #[error("Noise floor must be a negative dB value, got {0}")]
    InvalidNoiseFloor(f32),

    /// The source already has a time window applied
    #[error("A time window can only be applied once per extraction")]
    WindowAlreadyApplied,
}

/// Errors raised while rendering a waveform image.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RenderError {
    #[error("Invalid image size {width}x{height}")]
    InvalidSize { width: f32, height: f32 },

    #[error("Scale must be positive, got {0}")]
    InvalidScale(f32),

    #[error("Padding factor must be positive, got {0}")]
    InvalidPaddingFactor(f32),

    /// The render surface could not be allocated
    #[error("Could not allocate a {width}x{height} render surface")]
    SurfaceAllocation { width: u32, height: u32 },
}

/// Result type for envelope extraction
pub type Result<T> = std::result::Result<T, SamplerError>;
