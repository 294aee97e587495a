//! Codec capabilities consumed by the benchmark.
//!
//! A capability is negotiated once before any frame flows and then called once per
//! frame. Output buffers belong to the capability and stay valid until its next call.

use crate::error::{BenchError, Result};
use crate::format::FormatDescriptor;
use crate::passthrough::PassthroughDecoder;

pub trait Decoder {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Fixes the output format for the rest of the run.
    ///
    /// `desired` requests a layout; `None` lets the decoder pick. `width` and
    /// `height` override the output size when non-zero.
    fn negotiate(
        &mut self,
        input: &FormatDescriptor,
        desired: Option<&FormatDescriptor>,
        width: i32,
        height: i32,
    ) -> Result<FormatDescriptor>;

    /// Decodes one frame into exactly `size_image` bytes of the negotiated output.
    fn decode(&mut self, data: &[u8]) -> Result<&[u8]>;
}

pub trait Encoder {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Returns the compressed output format, or `None` when no compression
    /// was selected and the encode stage should be dropped.
    fn negotiate(&mut self, input: &FormatDescriptor) -> Result<Option<FormatDescriptor>>;

    /// Encodes one frame of the negotiated input size.
    fn encode(&mut self, data: &[u8]) -> Result<&[u8]>;
}

/// Encoder name that explicitly selects no compression.
pub const NO_COMPRESSION: &str = "none";

/// Picks a decoder able to handle `input`.
pub fn find_decoder(input: &FormatDescriptor) -> Result<Box<dyn Decoder>> {
    if PassthroughDecoder::accepts(input) {
        return Ok(Box::new(PassthroughDecoder::new()));
    }

    #[cfg(feature = "ffmpeg")]
    if let Some(decoder) = crate::ffmpeg::FfmpegDecoder::find(input)? {
        return Ok(Box::new(decoder));
    }

    Err(BenchError::NegotiationFailed(format!(
        "could not find a decompressor for {}",
        input
    )))
}

/// Picks an encoder by name. `None` (or `"none"`) means no compression.
pub fn find_encoder(name: Option<&str>) -> Result<Option<Box<dyn Encoder>>> {
    let name = match name {
        None => return Ok(None),
        Some(name) if name == NO_COMPRESSION => return Ok(None),
        Some(name) => name,
    };

    #[cfg(feature = "ffmpeg")]
    if let Some(encoder) = crate::ffmpeg::FfmpegEncoder::find(name)? {
        return Ok(Some(Box::new(encoder)));
    }

    Err(BenchError::NegotiationFailed(format!(
        "compressor not found: {}",
        name
    )))
}

/// Names of the capability providers compiled into this build.
pub fn available() -> Vec<&'static str> {
    #[allow(unused_mut)]
    let mut providers = vec![PassthroughDecoder::NAME];
    #[cfg(feature = "ffmpeg")]
    providers.push(crate::ffmpeg::PROVIDER_NAME);
    providers
}
