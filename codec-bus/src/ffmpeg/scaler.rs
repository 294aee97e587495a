use ffmpeg_next::format::Pixel;
use ffmpeg_next::frame::Video;
use ffmpeg_next::software::scaling::{Context, flag::Flags};

use super::av_error;
use crate::error::Result;

/// Converts frames to one fixed target, rebuilt when the source geometry changes.
pub struct Scaler {
    context: Option<Context>,
    target: (Pixel, u32, u32),
}

impl Scaler {
    pub fn new(format: Pixel, width: u32, height: u32) -> Self {
        Self {
            context: None,
            target: (format, width, height),
        }
    }

    /// True when `frame` already has the target format and size.
    pub fn is_identity(&self, frame: &Video) -> bool {
        (frame.format(), frame.width(), frame.height()) == self.target
    }

    pub fn run(&mut self, frame: &Video, dst: &mut Video) -> Result<()> {
        let source = (frame.format(), frame.width(), frame.height());
        let stale = match &self.context {
            Some(context) => {
                let input = context.input();
                (input.format, input.width, input.height) != source
            }
            None => true,
        };
        if stale {
            let (format, width, height) = self.target;
            log::debug!(
                "scaler {:?} {}x{} -> {:?} {}x{}",
                source.0,
                source.1,
                source.2,
                format,
                width,
                height
            );
            self.context = Some(
                Context::get(
                    source.0,
                    source.1,
                    source.2,
                    format,
                    width,
                    height,
                    Flags::BILINEAR,
                )
                .map_err(av_error("creating scaler"))?,
            );
        }

        match self.context.as_mut() {
            Some(context) => context.run(frame, dst).map_err(av_error("scaling frame")),
            None => Ok(()),
        }
    }
}
