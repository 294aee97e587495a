//! Container I/O, codec capabilities and the frame pipeline behind `codec-bench`.

/// Registers the codec providers. Call once at startup before looking up codecs.
pub fn init() -> Result<()> {
    #[cfg(feature = "ffmpeg")]
    ffmpeg::init()?;
    Ok(())
}

pub mod bench;
pub mod codec;
pub mod config;
pub mod error;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
pub mod format;
pub mod input;
pub mod layout;
pub mod output;
pub mod passthrough;
pub mod progress;
pub mod stats;
pub mod timer;

pub use bench::{Bench, BenchState, DecodeRequest, RunLimits};
pub use config::BenchConfig;
pub use error::{BenchError, Result};
pub use format::{FormatDescriptor, PixelFormat};
pub use stats::{RunStatistics, RunSummary};
