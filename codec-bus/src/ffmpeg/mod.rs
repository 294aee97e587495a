//! Codec capabilities backed by libavcodec.
//!
//! Compressed inputs are matched to a decoder through the RIFF fourcc table, the same
//! table AVI demuxing uses. Encoders are looked up by their libavcodec name.

mod decoder;
mod encoder;
mod scaler;

pub use decoder::FfmpegDecoder;
pub use encoder::FfmpegEncoder;

use ffmpeg_next::ffi;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::frame::Video;

use crate::error::{BenchError, Result};
use crate::format::PixelFormat;
use crate::layout::FrameLayout;

pub const PROVIDER_NAME: &str = "ffmpeg";

pub fn init() -> Result<()> {
    ffmpeg_next::init().map_err(av_error("initialising libav"))
}

pub(crate) fn av_error(context: &'static str) -> impl FnOnce(ffmpeg_next::Error) -> BenchError {
    move |e| BenchError::Codec(format!("{}: {}", context, e))
}

pub(crate) fn is_again(e: &ffmpeg_next::Error) -> bool {
    matches!(e, ffmpeg_next::Error::Other { errno } if *errno == ffmpeg_next::util::error::EAGAIN)
        || matches!(e, ffmpeg_next::Error::Eof)
}

/// Codec registered for a fourcc in the RIFF video tag table.
pub(crate) fn codec_for_tag(tag: u32) -> ffmpeg_next::codec::Id {
    let id = unsafe {
        let tables = [ffi::avformat_get_riff_video_tags(), std::ptr::null()];
        ffi::av_codec_get_id(tables.as_ptr(), tag)
    };
    ffmpeg_next::codec::Id::from(id)
}

/// Fourcc registered for a codec in the RIFF video tag table, 0 when there is none.
pub(crate) fn tag_for_codec(id: ffmpeg_next::codec::Id) -> u32 {
    unsafe {
        let tables = [ffi::avformat_get_riff_video_tags(), std::ptr::null()];
        ffi::av_codec_get_tag(tables.as_ptr(), id.into())
    }
}

/// libav pixel format with the same memory layout, if one exists.
pub(crate) fn pixel_for(format: PixelFormat) -> Option<Pixel> {
    match format {
        PixelFormat::Rgb24 => Some(Pixel::BGR24),
        PixelFormat::Rgb32 => Some(Pixel::BGRZ),
        PixelFormat::Bgra => Some(Pixel::BGRA),
        PixelFormat::Yuy2 => Some(Pixel::YUYV422),
        PixelFormat::Uyvy => Some(Pixel::UYVY422),
        PixelFormat::Yv12 => Some(Pixel::YUV420P),
        PixelFormat::Yv24 => Some(Pixel::YUV444P),
        PixelFormat::Y8 => Some(Pixel::GRAY8),
        PixelFormat::B48r => Some(Pixel::RGB48BE),
        PixelFormat::Ayuv
        | PixelFormat::B64a
        | PixelFormat::V210
        | PixelFormat::R210 => None,
    }
}

/// Reverse of [`pixel_for`], used to pick a default decode layout.
pub(crate) fn format_for(pixel: Pixel) -> Option<PixelFormat> {
    PixelFormat::ALL
        .iter()
        .copied()
        .find(|format| pixel_for(*format) == Some(pixel))
}

/// libav keeps planar chroma as U then V; the stored layouts keep V first.
fn av_plane(layout: &FrameLayout, index: usize) -> usize {
    if layout.planes.len() == 3 {
        [0, 2, 1][index]
    } else {
        index
    }
}

/// Copies a libav frame into `dst` in the stored layout.
pub(crate) fn pack(frame: &Video, layout: &FrameLayout, dst: &mut [u8]) {
    for (index, plane) in layout.planes.iter().enumerate() {
        let src_plane = av_plane(layout, index);
        let stride = frame.stride(src_plane);
        let data = frame.data(src_plane);
        for y in 0..plane.rows {
            let start = y * stride;
            layout
                .row_mut(dst, index, y)
                .copy_from_slice(&data[start..start + plane.row_bytes]);
        }
    }
}

/// Copies a frame in the stored layout into a libav frame of the same geometry.
pub(crate) fn unpack(src: &[u8], layout: &FrameLayout, frame: &mut Video) {
    for (index, plane) in layout.planes.iter().enumerate() {
        let dst_plane = av_plane(layout, index);
        let stride = frame.stride(dst_plane);
        let data = frame.data_mut(dst_plane);
        for y in 0..plane.rows {
            let start = y * stride;
            data[start..start + plane.row_bytes].copy_from_slice(layout.row(src, index, y));
        }
    }
}
