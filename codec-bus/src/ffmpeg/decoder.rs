use ffmpeg_next::ffi;
use ffmpeg_next::frame::Video;

use super::scaler::Scaler;
use super::{av_error, codec_for_tag, format_for, is_again, pack, pixel_for};
use crate::codec::Decoder;
use crate::error::{BenchError, Result};
use crate::format::{FormatDescriptor, PixelFormat};
use crate::layout::FrameLayout;

struct Target {
    layout: FrameLayout,
    scaler: Scaler,
}

/// Decodes one compressed frame per call and converts it to the negotiated layout.
pub struct FfmpegDecoder {
    codec: ffmpeg_next::Codec,
    decoder: Option<ffmpeg_next::codec::decoder::Video>,
    target: Option<Target>,
    decoded: Video,
    pending: Video,
    converted: Video,
    buf: Vec<u8>,
}

impl FfmpegDecoder {
    /// Looks up a decoder for the input's fourcc. `None` when libavcodec has none.
    pub fn find(input: &FormatDescriptor) -> Result<Option<Self>> {
        let id = codec_for_tag(input.compression);
        if id == ffmpeg_next::codec::Id::None {
            return Ok(None);
        }
        Ok(ffmpeg_next::decoder::find(id).map(Self::new))
    }

    pub fn new(codec: ffmpeg_next::Codec) -> Self {
        Self {
            codec,
            decoder: None,
            target: None,
            decoded: Video::empty(),
            pending: Video::empty(),
            converted: Video::empty(),
            buf: Vec::new(),
        }
    }

    fn open(&self, input: &FormatDescriptor) -> Result<ffmpeg_next::codec::decoder::Video> {
        let mut context = ffmpeg_next::codec::Context::new_with_codec(self.codec);
        unsafe {
            let raw = context.as_mut_ptr();
            (*raw).width = input.width;
            (*raw).height = input.height.abs();
            (*raw).codec_tag = input.compression;
            (*raw).bits_per_coded_sample = input.bit_count as i32;
            if !input.extra.is_empty() {
                let padded = input.extra.len() + ffi::AV_INPUT_BUFFER_PADDING_SIZE as usize;
                let extradata = ffi::av_mallocz(padded) as *mut u8;
                if extradata.is_null() {
                    return Err(BenchError::Codec("cannot allocate extradata".to_string()));
                }
                std::ptr::copy_nonoverlapping(input.extra.as_ptr(), extradata, input.extra.len());
                (*raw).extradata = extradata;
                (*raw).extradata_size = input.extra.len() as i32;
            }
        }
        context
            .decoder()
            .video()
            .map_err(av_error("opening decoder"))
    }
}

impl Decoder for FfmpegDecoder {
    fn name(&self) -> &str {
        self.codec.name()
    }

    fn description(&self) -> &str {
        self.codec.description()
    }

    fn negotiate(
        &mut self,
        input: &FormatDescriptor,
        desired: Option<&FormatDescriptor>,
        width: i32,
        height: i32,
    ) -> Result<FormatDescriptor> {
        let decoder = self.open(input)?;

        let output = match desired {
            Some(desired) => desired.with_dimensions(width, height)?,
            None => {
                let format = format_for(decoder.format()).unwrap_or(PixelFormat::Rgb24);
                FormatDescriptor::for_format(format, input.width, input.height.abs())?
                    .with_dimensions(width, height)?
            }
        };
        let layout = FrameLayout::of(&output).ok_or_else(|| {
            BenchError::NegotiationFailed(format!("{} cannot decode to {}", self.codec.name(), output))
        })?;
        let pixel = pixel_for(layout.format).ok_or_else(|| {
            BenchError::NegotiationFailed(format!(
                "{} has no libav equivalent",
                layout.format
            ))
        })?;

        log::debug!(
            "{} negotiated {} -> {} ({:?})",
            self.codec.name(),
            input,
            output,
            pixel
        );
        self.buf = vec![0u8; output.frame_size()];
        self.target = Some(Target {
            scaler: Scaler::new(pixel, layout.width as u32, layout.height as u32),
            layout,
        });
        self.decoder = Some(decoder);
        Ok(output)
    }

    /// While the codec holds frames back, the previous output is returned again.
    fn decode(&mut self, data: &[u8]) -> Result<&[u8]> {
        let (Some(decoder), Some(target)) = (self.decoder.as_mut(), self.target.as_mut()) else {
            return Err(BenchError::Codec(
                "decoder used before negotiation".to_string(),
            ));
        };

        let packet = ffmpeg_next::Packet::copy(data);
        decoder
            .send_packet(&packet)
            .map_err(av_error("sending packet"))?;

        // Drain everything the packet produced; only the newest frame is kept.
        let mut received = false;
        loop {
            match decoder.receive_frame(&mut self.pending) {
                Ok(()) => {
                    std::mem::swap(&mut self.decoded, &mut self.pending);
                    received = true;
                }
                Err(e) if is_again(&e) => break,
                Err(e) => return Err(av_error("receiving frame")(e)),
            }
        }
        if !received {
            return Ok(&self.buf);
        }

        if target.scaler.is_identity(&self.decoded) {
            pack(&self.decoded, &target.layout, &mut self.buf);
        } else {
            target.scaler.run(&self.decoded, &mut self.converted)?;
            pack(&self.converted, &target.layout, &mut self.buf);
        }
        Ok(&self.buf)
    }
}
