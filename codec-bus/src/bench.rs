use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};

use tokio_util::sync::CancellationToken;

use crate::codec::{self, Decoder, Encoder};
use crate::config::BenchConfig;
use crate::error::{BenchError, Result};
use crate::format::{self, FormatDescriptor};
use crate::input::ContainerReader;
use crate::output::ContainerWriter;
use crate::progress::ProgressLine;
use crate::stats::{RunStatistics, RunSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BenchState {
    /// Stages may still be configured.
    Idle,
    Running,
    /// Input exhausted or interrupted; statistics are final.
    Draining,
    /// A stage failed; statistics are final.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLimits {
    /// Frames per loop, 0 for the whole stream.
    pub frames: u32,
    pub loops: u32,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            frames: 0,
            loops: 1,
        }
    }
}

/// Output requested from the decode stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeRequest {
    /// Layout name; `None` lets the decoder choose.
    pub format: Option<String>,
    /// 0 keeps the input width.
    pub width: i32,
    /// 0 keeps the input height.
    pub height: i32,
}

pub struct Bench<R = BufReader<File>, W: Write = BufWriter<File>> {
    state: BenchState,
    limits: RunLimits,
    reader: ContainerReader<R>,
    decoder: Option<Box<dyn Decoder>>,
    decoded_format: Option<FormatDescriptor>,
    encoder: Option<Box<dyn Encoder>>,
    encoded_format: Option<FormatDescriptor>,
    writer: Option<ContainerWriter<W>>,
    stats: RunStatistics,
    interrupted: bool,
}

impl Bench<BufReader<File>, BufWriter<File>> {
    /// Builds the whole pipeline from a validated config: opens the input, negotiates
    /// the stages and creates the output.
    pub fn open(config: &BenchConfig) -> Result<Self> {
        let reader = if config.raw_input {
            let format = config.format.as_deref().ok_or_else(|| {
                BenchError::Argument("raw input needs a pixel format".to_string())
            })?;
            ContainerReader::open_raw(&config.input, format, config.width, config.height)?
        } else {
            ContainerReader::open(&config.input)?
        };
        log::info!("Input file: {}", config.input.display());
        log::info!("Input format: {}", reader.format());

        let mut bench = Bench::new(
            reader,
            RunLimits {
                frames: config.frames,
                loops: config.loops,
            },
        );

        if config.decode {
            let decoder = codec::find_decoder(bench.input_format())?;
            log::info!(
                "Decompressor: {}",
                describe(decoder.name(), decoder.description())
            );
            let request = DecodeRequest {
                format: config.format.clone(),
                width: config.width,
                height: config.height,
            };
            let decoded = bench.set_decoder(decoder, &request)?;
            log::info!("Decompressed format: {}", decoded);
        }

        if config.encode {
            match codec::find_encoder(config.codec.as_deref())? {
                Some(encoder) => {
                    log::info!(
                        "Compressor: {}",
                        describe(encoder.name(), encoder.description())
                    );
                    if let Some(encoded) = bench.set_encoder(Some(encoder))? {
                        log::info!("Output format: {}", encoded);
                    }
                }
                None => log::info!("Compressor: none"),
            }
        }

        if let Some(path) = &config.output {
            let file = File::create(path).map_err(|e| BenchError::open(path, e))?;
            bench.set_output(BufWriter::new(file), config.raw_output)?;
            log::info!("Output file: {}", path.display());
        }

        Ok(bench)
    }
}

impl<R: Read + Seek, W: Write> Bench<R, W> {
    pub fn new(reader: ContainerReader<R>, limits: RunLimits) -> Self {
        Self {
            state: BenchState::Idle,
            limits,
            reader,
            decoder: None,
            decoded_format: None,
            encoder: None,
            encoded_format: None,
            writer: None,
            stats: RunStatistics::new(),
            interrupted: false,
        }
    }

    pub fn state(&self) -> BenchState {
        self.state
    }

    pub fn input_format(&self) -> &FormatDescriptor {
        self.reader.format()
    }

    /// Format of the frames leaving the last configured stage.
    pub fn current_format(&self) -> &FormatDescriptor {
        self.encoded_format
            .as_ref()
            .or(self.decoded_format.as_ref())
            .unwrap_or_else(|| self.reader.format())
    }

    pub fn statistics(&self) -> &RunStatistics {
        &self.stats
    }

    /// Negotiates `decoder` against the input and installs it.
    pub fn set_decoder(
        &mut self,
        mut decoder: Box<dyn Decoder>,
        request: &DecodeRequest,
    ) -> Result<&FormatDescriptor> {
        self.ensure_idle()?;
        if self.encoder.is_some() {
            return Err(BenchError::Argument(
                "the decoder must be configured before the encoder".to_string(),
            ));
        }

        let input = self.reader.format();
        let desired = match request.format.as_deref() {
            Some(name) => {
                let width = if request.width != 0 {
                    request.width
                } else {
                    input.width
                };
                let height = if request.height != 0 {
                    request.height
                } else {
                    input.height
                };
                Some(format::resolve(name, width, height)?)
            }
            None => None,
        };
        let decoded = decoder.negotiate(input, desired.as_ref(), request.width, request.height)?;

        self.decoder = Some(decoder);
        let decoded: &FormatDescriptor = self.decoded_format.insert(decoded);
        Ok(decoded)
    }

    /// Negotiates `encoder` against the current format. An encoder that selects no
    /// compression, or `None`, leaves the stage out.
    pub fn set_encoder(
        &mut self,
        encoder: Option<Box<dyn Encoder>>,
    ) -> Result<Option<&FormatDescriptor>> {
        self.ensure_idle()?;
        self.encoder = None;
        self.encoded_format = None;

        let Some(mut encoder) = encoder else {
            return Ok(None);
        };
        match encoder.negotiate(self.current_format())? {
            Some(encoded) => {
                self.encoder = Some(encoder);
                let encoded: &FormatDescriptor = self.encoded_format.insert(encoded);
                Ok(Some(encoded))
            }
            None => {
                log::info!("{} selected no compression", encoder.name());
                Ok(None)
            }
        }
    }

    /// Sends every processed frame to `sink`. The header describes the current
    /// format unless `raw` is set.
    pub fn set_output(&mut self, sink: W, raw: bool) -> Result<()> {
        self.ensure_idle()?;
        let format = (!raw).then(|| self.current_format().clone());
        self.writer = Some(ContainerWriter::from_writer(sink, format.as_ref())?);
        Ok(())
    }

    /// Processes frames until the limits are met, the stream ends or `cancel` fires.
    /// Progress goes to `progress_out`, ending with a newline.
    pub fn run<O: Write>(
        &mut self,
        cancel: &CancellationToken,
        progress_out: &mut O,
    ) -> Result<&RunStatistics> {
        self.ensure_idle()?;
        self.state = BenchState::Running;

        let mut progress = ProgressLine::new();
        let outcome = self.pump(cancel, progress_out, &mut progress);
        self.state = match outcome {
            Ok(state) => state,
            Err(_) => BenchState::Stopped,
        };

        progress.finish(progress_out)?;
        let flushed = match self.writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        };
        outcome?;
        flushed?;

        log::debug!(
            "run ended in {:?} after {} frames",
            self.state,
            self.stats.frames
        );
        Ok(&self.stats)
    }

    fn pump<O: Write>(
        &mut self,
        cancel: &CancellationToken,
        progress_out: &mut O,
        progress: &mut ProgressLine,
    ) -> Result<BenchState> {
        let mut loop_index = 0;
        let mut loop_frames = 0;

        loop {
            if cancel.is_cancelled() {
                log::debug!("run cancelled");
                self.interrupted = true;
                return Ok(BenchState::Draining);
            }
            if loop_index >= self.limits.loops {
                return Ok(BenchState::Draining);
            }

            let limit_reached = self.limits.frames != 0 && loop_frames >= self.limits.frames;
            let next = if limit_reached {
                None
            } else {
                self.reader.read_frame()?
            };
            let Some(frame) = next else {
                loop_index += 1;
                loop_frames = 0;
                if loop_index < self.limits.loops {
                    self.reader.rewind()?;
                }
                continue;
            };

            let input_len = frame.len();
            let mut data = frame;

            if let Some(decoder) = self.decoder.as_mut() {
                self.stats.decode_timer.begin();
                let decoded = decoder.decode(data);
                self.stats.decode_timer.end();
                data = decoded?;
            }
            let decoded_len = data.len();

            if let Some(encoder) = self.encoder.as_mut() {
                self.stats.encode_timer.begin();
                let encoded = encoder.encode(data);
                self.stats.encode_timer.end();
                data = encoded?;
            }

            if let Some(writer) = self.writer.as_mut() {
                writer.write_frame(data)?;
            }

            self.stats.record(input_len, decoded_len, data.len());
            loop_frames += 1;

            progress.render(
                progress_out,
                &self.stats,
                self.decoder.is_some(),
                self.encoder.is_some(),
            )?;
        }
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            frames: self.stats.frames,
            input_bytes: self.stats.input_bytes,
            decoded_bytes: self.stats.decoded_bytes,
            output_bytes: self.stats.output_bytes,
            decode: self.decoder.is_some().then(|| self.stats.decode_rate()),
            encode: self.encoder.is_some().then(|| self.stats.encode_rate()),
            interrupted: self.interrupted,
        }
    }

    /// Releases the output sink, flushed.
    pub fn finish(self) -> Result<Option<W>> {
        self.writer.map(ContainerWriter::finish).transpose()
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.state != BenchState::Idle {
            return Err(BenchError::Argument(format!(
                "benchmark cannot be reconfigured in state {:?}",
                self.state
            )));
        }
        Ok(())
    }
}

fn describe(name: &str, description: &str) -> String {
    if description.is_empty() {
        name.to_string()
    } else {
        format!("{} ({})", name, description)
    }
}

#[cfg(test)]
#[path = "bench_test.rs"]
mod bench_test;
