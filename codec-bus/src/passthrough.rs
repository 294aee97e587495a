use crate::codec::Decoder;
use crate::error::{BenchError, Result};
use crate::format::FormatDescriptor;
use crate::layout::{self, FrameLayout};

/// Built-in decoder for uncompressed input.
///
/// Copies frames unchanged, or flips the row order when an RGB input is requested
/// with the opposite height sign. It never converts between layouts or scales.
#[derive(Default)]
pub struct PassthroughDecoder {
    layouts: Option<(FrameLayout, FrameLayout)>,
    flip: bool,
    buf: Vec<u8>,
}

impl PassthroughDecoder {
    pub const NAME: &'static str = "passthrough";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn accepts(input: &FormatDescriptor) -> bool {
        FrameLayout::of(input).is_some()
    }
}

impl Decoder for PassthroughDecoder {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "uncompressed copy"
    }

    fn negotiate(
        &mut self,
        input: &FormatDescriptor,
        desired: Option<&FormatDescriptor>,
        width: i32,
        height: i32,
    ) -> Result<FormatDescriptor> {
        let in_layout = FrameLayout::of(input).ok_or_else(|| {
            BenchError::NegotiationFailed(format!("{} is not an uncompressed layout", input))
        })?;

        let mut output = match desired {
            Some(desired) if !desired.same_layout(input) => {
                return Err(BenchError::NegotiationFailed(format!(
                    "{} cannot convert {} to {}",
                    Self::NAME,
                    input,
                    desired
                )));
            }
            Some(desired) => input.with_dimensions(desired.width, desired.height)?,
            None => input.clone(),
        };
        if width != 0 || height != 0 {
            output = output.with_dimensions(width, height)?;
        }

        if output.width != input.width || output.height.unsigned_abs() != input.height.unsigned_abs()
        {
            return Err(BenchError::NegotiationFailed(format!(
                "{} cannot scale {} to {} x {}",
                Self::NAME,
                input,
                output.width,
                output.height
            )));
        }

        let out_layout = FrameLayout::of(&output).ok_or_else(|| {
            BenchError::NegotiationFailed(format!("{} is not an uncompressed layout", output))
        })?;
        let flip = in_layout.bottom_up != out_layout.bottom_up;
        if output.height != input.height && !flip {
            return Err(BenchError::NegotiationFailed(format!(
                "row order of {} is fixed",
                in_layout.format
            )));
        }

        log::debug!(
            "{} negotiated {} -> {}{}",
            Self::NAME,
            input,
            output,
            if flip { " (flipped)" } else { "" }
        );
        self.buf = vec![0u8; output.frame_size()];
        self.flip = flip;
        self.layouts = Some((in_layout, out_layout));
        Ok(output)
    }

    fn decode(&mut self, data: &[u8]) -> Result<&[u8]> {
        let (in_layout, out_layout) = self
            .layouts
            .as_ref()
            .ok_or_else(|| BenchError::Codec(format!("{} used before negotiation", Self::NAME)))?;

        let needed = if self.flip {
            in_layout.len()
        } else {
            self.buf.len()
        };
        if data.len() < needed {
            return Err(BenchError::Codec(format!(
                "frame of {} bytes is shorter than its layout ({} bytes)",
                data.len(),
                needed
            )));
        }

        if self.flip {
            layout::copy_rows(in_layout, data, out_layout, &mut self.buf);
        } else {
            self.buf.copy_from_slice(&data[..needed]);
        }
        Ok(&self.buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::resolve;

    #[test]
    fn test_identity_copy() -> anyhow::Result<()> {
        let input = resolve("YUY2", 4, 2)?;
        let mut decoder = PassthroughDecoder::new();
        let output = decoder.negotiate(&input, None, 0, 0)?;
        assert_eq!(output, input);

        let frame: Vec<u8> = (0..16).collect();
        assert_eq!(decoder.decode(&frame)?, frame.as_slice());
        Ok(())
    }

    #[test]
    fn test_negative_height_flips_rgb() -> anyhow::Result<()> {
        let input = resolve("RGB32", 1, 2)?;
        let mut decoder = PassthroughDecoder::new();
        let output = decoder.negotiate(&input, Some(&resolve("RGB32", 1, 2)?), 0, -2)?;
        assert_eq!(output.height, -2);
        assert_eq!(output.size_image, 8);

        let frame = [1u8, 1, 1, 1, 2, 2, 2, 2];
        assert_eq!(decoder.decode(&frame)?, &[2, 2, 2, 2, 1, 1, 1, 1]);
        Ok(())
    }

    #[test]
    fn test_rejects_conversion_and_scaling() -> anyhow::Result<()> {
        let input = resolve("RGB24", 8, 8)?;
        let mut decoder = PassthroughDecoder::new();
        assert!(matches!(
            decoder.negotiate(&input, Some(&resolve("YUY2", 8, 8)?), 0, 0),
            Err(BenchError::NegotiationFailed(_))
        ));
        assert!(matches!(
            decoder.negotiate(&input, None, 16, 0),
            Err(BenchError::NegotiationFailed(_))
        ));
        Ok(())
    }

    #[test]
    fn test_row_order_fixed_for_yuv() -> anyhow::Result<()> {
        let input = resolve("YUY2", 8, 8)?;
        let mut decoder = PassthroughDecoder::new();
        assert!(matches!(
            decoder.negotiate(&input, None, 0, -8),
            Err(BenchError::NegotiationFailed(_))
        ));
        Ok(())
    }

    #[test]
    fn test_short_frame_is_rejected() -> anyhow::Result<()> {
        let input = resolve("Y8", 4, 4)?;
        let mut decoder = PassthroughDecoder::new();
        decoder.negotiate(&input, None, 0, 0)?;

        assert_eq!(decoder.decode(&[9u8; 16])?, &[9u8; 16]);
        assert!(matches!(decoder.decode(&[1u8; 3]), Err(BenchError::Codec(_))));
        Ok(())
    }

    #[test]
    fn test_decode_before_negotiate_fails() {
        let mut decoder = PassthroughDecoder::new();
        assert!(matches!(decoder.decode(&[0u8; 4]), Err(BenchError::Codec(_))));
    }
}
