use std::path::PathBuf;

use clap::{ArgAction, Parser};
use codec_bus::BenchConfig;

/// Measures decode and encode throughput of video codecs.
#[derive(Debug, Parser)]
#[command(name = "codec-bench", version, disable_help_flag = true)]
pub struct Cli {
    /// Container file, or a raw capture with --rawin
    #[arg(short, long, required_unless_present = "list_codecs")]
    pub input: Option<PathBuf>,

    /// Write processed frames here
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Skip the decode stage
    #[arg(long = "nd")]
    pub no_decode: bool,

    /// Skip the compress stage
    #[arg(long = "nc")]
    pub no_compress: bool,

    /// Input has no header; needs -f, -w and -h (implies --nd)
    #[arg(long = "rawin")]
    pub raw_input: bool,

    /// Write output without a header (implies --nc)
    #[arg(long = "rawout")]
    pub raw_output: bool,

    /// Pixel format to decode to, or of the raw input
    #[arg(short, long)]
    pub format: Option<String>,

    #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
    pub width: i32,

    /// Negative for top-down RGB rows
    #[arg(short = 'h', long, default_value_t = 0, allow_negative_numbers = true)]
    pub height: i32,

    /// Frames per loop, 0 for all
    #[arg(long, default_value_t = 0)]
    pub frames: u32,

    #[arg(long = "loop", default_value_t = 1)]
    pub loops: u32,

    /// Compressor to benchmark; omitted or "none" disables compression
    #[arg(short, long)]
    pub codec: Option<String>,

    /// Save the final statistics as JSON
    #[arg(long)]
    pub summary_json: Option<PathBuf>,

    /// Print the codec providers in this build and exit
    #[arg(long)]
    pub list_codecs: bool,

    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,
}

impl Cli {
    pub fn to_config(&self) -> codec_bus::Result<BenchConfig> {
        BenchConfig {
            input: self.input.clone().unwrap_or_default(),
            output: self.output.clone(),
            decode: !self.no_decode,
            encode: !self.no_compress,
            raw_input: self.raw_input,
            raw_output: self.raw_output,
            format: self.format.clone(),
            width: self.width,
            height: self.height,
            frames: self.frames,
            loops: self.loops,
            codec: self.codec.clone(),
        }
        .validate()
    }
}
