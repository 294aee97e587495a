use ffmpeg_next::format::Pixel;
use ffmpeg_next::frame::Video;
use ffmpeg_next::{Dictionary, Packet, Rational};

use super::scaler::Scaler;
use super::{av_error, is_again, pixel_for, tag_for_codec, unpack};
use crate::codec::Encoder;
use crate::error::{BenchError, Result};
use crate::format::{FormatDescriptor, fourcc};
use crate::layout::FrameLayout;

/// Nominal rate handed to encoders that need one; frames are never dropped or paced.
const FRAME_RATE: i32 = 25;

struct Session {
    encoder: ffmpeg_next::codec::encoder::Video,
    layout: FrameLayout,
    source: Video,
    converted: Option<(Scaler, Video)>,
}

/// Encodes every frame with a named libavcodec encoder.
pub struct FfmpegEncoder {
    codec: ffmpeg_next::Codec,
    session: Option<Session>,
    packet: Packet,
    buf: Vec<u8>,
    frame_index: i64,
}

impl FfmpegEncoder {
    /// Looks up an encoder by libavcodec name, e.g. `ffv1` or `libx264`.
    pub fn find(name: &str) -> Result<Option<Self>> {
        Ok(ffmpeg_next::encoder::find_by_name(name).map(Self::new))
    }

    pub fn new(codec: ffmpeg_next::Codec) -> Self {
        Self {
            codec,
            session: None,
            packet: Packet::empty(),
            buf: Vec::new(),
            frame_index: 0,
        }
    }

    /// Source format when the encoder takes it, otherwise the encoder's first choice.
    fn encoder_pixel(&self, source: Pixel) -> Result<Pixel> {
        let video = self.codec.video().map_err(av_error("querying encoder"))?;
        let Some(formats) = video.formats() else {
            return Ok(source);
        };
        let formats: Vec<Pixel> = formats.collect();
        if formats.contains(&source) {
            Ok(source)
        } else {
            Ok(formats.first().copied().unwrap_or(Pixel::YUV420P))
        }
    }
}

impl Encoder for FfmpegEncoder {
    fn name(&self) -> &str {
        self.codec.name()
    }

    fn description(&self) -> &str {
        self.codec.description()
    }

    fn negotiate(&mut self, input: &FormatDescriptor) -> Result<Option<FormatDescriptor>> {
        let layout = FrameLayout::of(input).ok_or_else(|| {
            BenchError::NegotiationFailed(format!(
                "{} needs uncompressed input, got {}",
                self.codec.name(),
                input
            ))
        })?;
        let source = pixel_for(layout.format).ok_or_else(|| {
            BenchError::NegotiationFailed(format!("{} has no libav equivalent", layout.format))
        })?;
        let target = self.encoder_pixel(source)?;
        let (width, height) = (layout.width as u32, layout.height as u32);

        let context = ffmpeg_next::codec::Context::new_with_codec(self.codec);
        let mut video = context
            .encoder()
            .video()
            .map_err(av_error("creating encoder"))?;
        video.set_width(width);
        video.set_height(height);
        video.set_format(target);
        video.set_frame_rate(Some(Rational(FRAME_RATE, 1)));
        video.set_time_base(Rational(1, FRAME_RATE));

        let mut options = Dictionary::new();
        options.set("preset", "ultrafast");
        options.set("tune", "zerolatency");
        let encoder = video.open_with(options).map_err(|e| {
            BenchError::NegotiationFailed(format!("cannot open {}: {}", self.codec.name(), e))
        })?;

        let mut output = input.clone();
        output.compression = match tag_for_codec(self.codec.id()) {
            0 => fallback_tag(self.codec.name()),
            tag => tag,
        };
        output.extra = unsafe {
            let raw = encoder.as_ptr();
            if (*raw).extradata.is_null() || (*raw).extradata_size <= 0 {
                Vec::new()
            } else {
                std::slice::from_raw_parts((*raw).extradata, (*raw).extradata_size as usize)
                    .to_vec()
            }
        };
        output.size = output.block_len() as u32;

        log::debug!(
            "{} negotiated {} ({:?} -> {:?}) -> {}",
            self.codec.name(),
            input,
            source,
            target,
            output
        );
        let converted = (target != source)
            .then(|| (Scaler::new(target, width, height), Video::new(target, width, height)));
        self.session = Some(Session {
            encoder,
            source: Video::new(source, width, height),
            converted,
            layout,
        });
        self.frame_index = 0;
        Ok(Some(output))
    }

    /// Returns all packets the frame produced, which may be none while the encoder buffers.
    fn encode(&mut self, data: &[u8]) -> Result<&[u8]> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| BenchError::Codec("encoder used before negotiation".to_string()))?;
        if data.len() < session.layout.len() {
            return Err(BenchError::Codec(format!(
                "frame of {} bytes is shorter than its layout ({} bytes)",
                data.len(),
                session.layout.len()
            )));
        }

        unpack(data, &session.layout, &mut session.source);
        let frame = match session.converted.as_mut() {
            Some((scaler, converted)) => {
                scaler.run(&session.source, converted)?;
                converted
            }
            None => &mut session.source,
        };
        frame.set_pts(Some(self.frame_index));
        self.frame_index += 1;
        session
            .encoder
            .send_frame(frame)
            .map_err(av_error("sending frame"))?;

        self.buf.clear();
        loop {
            match session.encoder.receive_packet(&mut self.packet) {
                Ok(()) => {
                    if let Some(bytes) = self.packet.data() {
                        self.buf.extend_from_slice(bytes);
                    }
                }
                Err(e) if is_again(&e) => break,
                Err(e) => return Err(av_error("receiving packet")(e)),
            }
        }
        Ok(&self.buf)
    }
}

/// Tag for encoders missing from the RIFF table: the first four name bytes, uppercased.
fn fallback_tag(name: &str) -> u32 {
    let mut code = [b' '; 4];
    for (slot, byte) in code.iter_mut().zip(name.bytes()) {
        *slot = byte.to_ascii_uppercase();
    }
    fourcc(&code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::resolve;

    #[test]
    fn test_fallback_tag() {
        assert_eq!(fallback_tag("vp9"), fourcc(b"VP9 "));
        assert_eq!(fallback_tag("libx264"), fourcc(b"LIBX"));
    }

    #[test]
    fn test_unknown_encoder_is_not_found() -> anyhow::Result<()> {
        super::super::init()?;
        assert!(FfmpegEncoder::find("definitely-not-a-codec")?.is_none());
        Ok(())
    }

    #[test]
    fn test_ffv1_round() -> anyhow::Result<()> {
        super::super::init()?;
        let Some(mut encoder) = FfmpegEncoder::find("ffv1")? else {
            return Ok(());
        };
        let input = resolve("YV12", 16, 16)?;
        let output = encoder
            .negotiate(&input)?
            .ok_or_else(|| anyhow::anyhow!("ffv1 declined"))?;
        assert_eq!(output.compression, fourcc(b"FFV1"));
        assert_eq!((output.width, output.height), (16, 16));

        let frame = vec![128u8; input.frame_size()];
        let mut total = 0;
        for _ in 0..3 {
            total += encoder.encode(&frame)?.len();
        }
        assert!(total > 0);
        Ok(())
    }
}
