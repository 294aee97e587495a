//! Uncompressed frame layouts and the format descriptor carried by every stream.
//!
//! The descriptor mirrors a 40-byte bitmap info header. Codecs may append their own
//! extension bytes after the base record; those are kept as an opaque blob and copied
//! verbatim.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};

/// Size of the fixed base record in bytes.
pub const BASE_HEADER_SIZE: usize = 40;

/// Compression tag meaning "uncompressed RGB of `bit_count` bits".
pub const BI_RGB: u32 = 0;

/// Packs a four character code the same way it is laid out on disk.
pub const fn fourcc(code: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*code)
}

/// Renders a compression tag for humans: the four characters when printable,
/// `RGB{bpp}` for uncompressed RGB, hex otherwise.
pub fn fourcc_string(tag: u32, bit_count: u16) -> String {
    let bytes = tag.to_le_bytes();
    if bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
        bytes.iter().map(|b| *b as char).collect()
    } else if tag == BI_RGB {
        format!("RGB{}", bit_count)
    } else {
        format!("0x{:08X}", tag)
    }
}

/// Named uncompressed layouts accepted for raw input and as decode targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    Rgb24,
    Rgb32,
    Bgra,
    Ayuv,
    Yuy2,
    Uyvy,
    Yv12,
    Yv24,
    Y8,
    B64a,
    B48r,
    V210,
    R210,
}

impl PixelFormat {
    pub const ALL: [PixelFormat; 13] = [
        PixelFormat::Rgb24,
        PixelFormat::Rgb32,
        PixelFormat::Bgra,
        PixelFormat::Ayuv,
        PixelFormat::Yuy2,
        PixelFormat::Uyvy,
        PixelFormat::Yv12,
        PixelFormat::Yv24,
        PixelFormat::Y8,
        PixelFormat::B64a,
        PixelFormat::B48r,
        PixelFormat::V210,
        PixelFormat::R210,
    ];

    /// Looks up a layout by its command line name. Names are case sensitive.
    pub fn from_name(name: &str) -> Result<Self> {
        let format = match name {
            "RGB24" | "bgr24" => PixelFormat::Rgb24,
            "RGB32" | "bgr32" => PixelFormat::Rgb32,
            "BGRA" => PixelFormat::Bgra,
            "AYUV" => PixelFormat::Ayuv,
            "YUY2" => PixelFormat::Yuy2,
            "UYVY" => PixelFormat::Uyvy,
            "YV12" => PixelFormat::Yv12,
            "YV24" => PixelFormat::Yv24,
            "Y8" => PixelFormat::Y8,
            "b64a" => PixelFormat::B64a,
            "b48r" => PixelFormat::B48r,
            "v210" => PixelFormat::V210,
            "r210" => PixelFormat::R210,
            _ => return Err(BenchError::UnsupportedFormat(name.to_string())),
        };
        Ok(format)
    }

    pub fn name(self) -> &'static str {
        match self {
            PixelFormat::Rgb24 => "RGB24",
            PixelFormat::Rgb32 => "RGB32",
            PixelFormat::Bgra => "BGRA",
            PixelFormat::Ayuv => "AYUV",
            PixelFormat::Yuy2 => "YUY2",
            PixelFormat::Uyvy => "UYVY",
            PixelFormat::Yv12 => "YV12",
            PixelFormat::Yv24 => "YV24",
            PixelFormat::Y8 => "Y8",
            PixelFormat::B64a => "b64a",
            PixelFormat::B48r => "b48r",
            PixelFormat::V210 => "v210",
            PixelFormat::R210 => "r210",
        }
    }

    pub fn bit_count(self) -> u16 {
        match self {
            PixelFormat::Rgb24 => 24,
            PixelFormat::Rgb32 => 32,
            PixelFormat::Bgra => 32,
            PixelFormat::Ayuv => 32,
            PixelFormat::Yuy2 => 16,
            PixelFormat::Uyvy => 16,
            PixelFormat::Yv12 => 12,
            PixelFormat::Yv24 => 24,
            PixelFormat::Y8 => 8,
            PixelFormat::B64a => 64,
            PixelFormat::B48r => 48,
            PixelFormat::V210 => 20,
            PixelFormat::R210 => 30,
        }
    }

    pub fn tag(self) -> u32 {
        match self {
            PixelFormat::Rgb24 | PixelFormat::Rgb32 => BI_RGB,
            PixelFormat::Bgra => fourcc(b"BGRA"),
            PixelFormat::Ayuv => fourcc(b"AYUV"),
            PixelFormat::Yuy2 => fourcc(b"YUY2"),
            PixelFormat::Uyvy => fourcc(b"UYVY"),
            PixelFormat::Yv12 => fourcc(b"YV12"),
            PixelFormat::Yv24 => fourcc(b"YV24"),
            PixelFormat::Y8 => fourcc(b"Y8  "),
            PixelFormat::B64a => fourcc(b"b64a"),
            PixelFormat::B48r => fourcc(b"b48r"),
            PixelFormat::V210 => fourcc(b"v210"),
            PixelFormat::R210 => fourcc(b"r210"),
        }
    }

    /// Layouts whose row order follows the sign of the height.
    pub fn is_rgb(self) -> bool {
        matches!(
            self,
            PixelFormat::Rgb24 | PixelFormat::Rgb32 | PixelFormat::Bgra
        )
    }

    /// Byte size of one frame. Only the absolute height counts.
    ///
    /// RGB24 rows are padded to 4 bytes; v210 packs 48 pixels into 128 bytes and
    /// r210 packs 64 pixels into 256 bytes, both rounded up to whole blocks.
    pub fn image_size(self, width: i32, height: i32) -> Result<u32> {
        if width <= 0 {
            return Err(BenchError::Argument(format!(
                "width must be positive, got {}",
                width
            )));
        }
        if height == 0 {
            return Err(BenchError::Argument("height must not be zero".to_string()));
        }
        let w = width as u128;
        let h = height.unsigned_abs() as u128;
        let size = match self {
            PixelFormat::Rgb24 => align_to::<4>(w * 3) * h,
            PixelFormat::Rgb32 | PixelFormat::Bgra | PixelFormat::Ayuv => w * 4 * h,
            PixelFormat::Yuy2 | PixelFormat::Uyvy => w * 2 * h,
            PixelFormat::Yv12 => w * h * 3 / 2,
            PixelFormat::Yv24 => w * h * 3,
            PixelFormat::Y8 => w * h,
            PixelFormat::B64a => w * 8 * h,
            PixelFormat::B48r => w * 6 * h,
            PixelFormat::V210 => (w + 47) / 48 * 128 * h,
            PixelFormat::R210 => (w + 63) / 64 * 256 * h,
        };
        u32::try_from(size).map_err(|_| {
            BenchError::Argument(format!(
                "{} frame of {}x{} does not fit in 32 bits",
                self.name(),
                width,
                height
            ))
        })
    }

    /// Recognises the named layout a descriptor carries, if any.
    pub fn from_descriptor(desc: &FormatDescriptor) -> Option<Self> {
        if desc.compression == BI_RGB {
            return match desc.bit_count {
                24 => Some(PixelFormat::Rgb24),
                32 => Some(PixelFormat::Rgb32),
                _ => None,
            };
        }
        PixelFormat::ALL
            .into_iter()
            .find(|f| f.tag() == desc.compression && f.tag() != BI_RGB)
    }
}

impl FromStr for PixelFormat {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        PixelFormat::from_name(s)
    }
}

impl Display for PixelFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn align_to<const ALIGN: u128>(value: u128) -> u128 {
    value.div_ceil(ALIGN) * ALIGN
}

/// Resolves a named layout at the given dimensions into a full descriptor.
pub fn resolve(name: &str, width: i32, height: i32) -> Result<FormatDescriptor> {
    FormatDescriptor::for_format(PixelFormat::from_name(name)?, width, height)
}

/// Geometry and byte layout of one frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    /// Declared size of the record, kept verbatim.
    pub size: u32,
    pub width: i32,
    /// Positive is bottom-up, negative is top-down.
    pub height: i32,
    pub planes: u16,
    pub bit_count: u16,
    /// Four character code, or `BI_RGB`.
    pub compression: u32,
    /// Bytes in one full frame.
    pub size_image: u32,
    pub x_pels_per_meter: i32,
    pub y_pels_per_meter: i32,
    pub clr_used: u32,
    pub clr_important: u32,
    /// Codec specific extension data following the base record.
    pub extra: Vec<u8>,
}

impl FormatDescriptor {
    pub fn for_format(format: PixelFormat, width: i32, height: i32) -> Result<Self> {
        let size_image = format.image_size(width, height)?;
        Ok(Self {
            size: BASE_HEADER_SIZE as u32,
            width,
            height,
            planes: 1,
            bit_count: format.bit_count(),
            compression: format.tag(),
            size_image,
            x_pels_per_meter: 0,
            y_pels_per_meter: 0,
            clr_used: 0,
            clr_important: 0,
            extra: Vec::new(),
        })
    }

    /// Parses a format block. The block must hold at least the base record;
    /// whatever follows it becomes `extra`.
    pub fn from_bytes(block: &[u8]) -> Result<Self> {
        if block.len() < BASE_HEADER_SIZE {
            return Err(BenchError::FormatParse(format!(
                "format block is {} bytes, expected at least {}",
                block.len(),
                BASE_HEADER_SIZE
            )));
        }
        let mut buf = block;
        let desc = Self {
            size: buf.get_u32_le(),
            width: buf.get_i32_le(),
            height: buf.get_i32_le(),
            planes: buf.get_u16_le(),
            bit_count: buf.get_u16_le(),
            compression: buf.get_u32_le(),
            size_image: buf.get_u32_le(),
            x_pels_per_meter: buf.get_i32_le(),
            y_pels_per_meter: buf.get_i32_le(),
            clr_used: buf.get_u32_le(),
            clr_important: buf.get_u32_le(),
            extra: buf.to_vec(),
        };
        Ok(desc)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.block_len());
        buf.put_u32_le(self.size);
        buf.put_i32_le(self.width);
        buf.put_i32_le(self.height);
        buf.put_u16_le(self.planes);
        buf.put_u16_le(self.bit_count);
        buf.put_u32_le(self.compression);
        buf.put_u32_le(self.size_image);
        buf.put_i32_le(self.x_pels_per_meter);
        buf.put_i32_le(self.y_pels_per_meter);
        buf.put_u32_le(self.clr_used);
        buf.put_u32_le(self.clr_important);
        buf.put_slice(&self.extra);
        buf
    }

    /// Length of the serialized format block.
    pub fn block_len(&self) -> usize {
        BASE_HEADER_SIZE + self.extra.len()
    }

    pub fn frame_size(&self) -> usize {
        self.size_image as usize
    }

    pub fn pixel_format(&self) -> Option<PixelFormat> {
        PixelFormat::from_descriptor(self)
    }

    pub fn is_top_down(&self) -> bool {
        self.height < 0
    }

    /// True when both descriptors carry the same tag and bit depth.
    pub fn same_layout(&self, other: &FormatDescriptor) -> bool {
        self.compression == other.compression && self.bit_count == other.bit_count
    }

    /// Copy of this descriptor at new dimensions. Zero keeps the current value.
    /// Known layouts get their frame size recomputed; for anything else the
    /// size is left as declared.
    pub fn with_dimensions(&self, width: i32, height: i32) -> Result<Self> {
        let mut desc = self.clone();
        if width != 0 {
            desc.width = width;
        }
        if height != 0 {
            desc.height = height;
        }
        if let Some(format) = desc.pixel_format() {
            desc.size_image = format.image_size(desc.width, desc.height)?;
        }
        Ok(desc)
    }
}

impl Display for FormatDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} x {} [{}] {} bpp",
            self.width,
            self.height,
            fourcc_string(self.compression, self.bit_count),
            self.bit_count
        )
    }
}
