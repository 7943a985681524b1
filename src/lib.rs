//! Audio waveform envelopes and their rendering.
//!
//! A [`PcmSource`] is reduced by the sampler to an [`Envelope`]: one
//! dB-normalized amplitude per output pixel. The renderer turns an envelope
//! into a [`WaveformImage`].

pub mod audio;
pub mod color;
pub mod error;
pub mod renderer;
pub mod sampler;

pub use audio::{AsyncPcmSource, PcmSource, TimeWindow, TrackMetadata};
pub use color::WaveColor;
pub use error::{RenderError, SamplerError};
pub use renderer::{
    render_waveform, try_render_waveform, CentralLine, RenderConfig, RenderPosition, RenderStyle,
    Size, WaveformImage,
};
pub use sampler::{
    extract_envelope, extract_envelope_async, Envelope, ExtractionRequest, SamplerOptions,
};
