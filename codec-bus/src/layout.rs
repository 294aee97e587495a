//! Plane geometry of the uncompressed layouts.
//!
//! Rows are addressed top-down; bottom-up RGB frames are translated on access.

use crate::format::{FormatDescriptor, PixelFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plane {
    pub offset: usize,
    pub row_bytes: usize,
    pub rows: usize,
}

impl Plane {
    pub fn len(&self) -> usize {
        self.row_bytes * self.rows
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLayout {
    pub format: PixelFormat,
    pub width: usize,
    pub height: usize,
    pub planes: Vec<Plane>,
    /// Last row of the image is stored first.
    pub bottom_up: bool,
}

impl FrameLayout {
    /// Geometry of `desc`, or `None` if it is not a named uncompressed layout.
    pub fn of(desc: &FormatDescriptor) -> Option<Self> {
        let format = desc.pixel_format()?;
        if desc.width <= 0 || desc.height == 0 {
            return None;
        }
        let width = desc.width as usize;
        let height = desc.height.unsigned_abs() as usize;

        let packed = |row_bytes: usize| {
            vec![Plane {
                offset: 0,
                row_bytes,
                rows: height,
            }]
        };
        let planes = match format {
            PixelFormat::Rgb24 => packed((width * 3).div_ceil(4) * 4),
            PixelFormat::Rgb32 | PixelFormat::Bgra | PixelFormat::Ayuv => packed(width * 4),
            PixelFormat::Yuy2 | PixelFormat::Uyvy => packed(width * 2),
            PixelFormat::Y8 => packed(width),
            PixelFormat::B64a => packed(width * 8),
            PixelFormat::B48r => packed(width * 6),
            PixelFormat::V210 => packed(width.div_ceil(48) * 128),
            PixelFormat::R210 => packed(width.div_ceil(64) * 256),
            PixelFormat::Yv12 => planar(width, height, width / 2, height / 2),
            PixelFormat::Yv24 => planar(width, height, width, height),
        };

        Some(Self {
            format,
            width,
            height,
            planes,
            bottom_up: format.is_rgb() && desc.height > 0,
        })
    }

    /// Bytes covered by all planes.
    pub fn len(&self) -> usize {
        self.planes
            .last()
            .map(|p| p.offset + p.len())
            .unwrap_or_default()
    }

    fn row_range(&self, plane: usize, y: usize) -> std::ops::Range<usize> {
        let p = &self.planes[plane];
        let stored = if self.bottom_up { p.rows - 1 - y } else { y };
        let start = p.offset + stored * p.row_bytes;
        start..start + p.row_bytes
    }

    /// Row `y` (counted from the top of the image) of `plane`.
    pub fn row<'a>(&self, buf: &'a [u8], plane: usize, y: usize) -> &'a [u8] {
        &buf[self.row_range(plane, y)]
    }

    pub fn row_mut<'a>(&self, buf: &'a mut [u8], plane: usize, y: usize) -> &'a mut [u8] {
        &mut buf[self.row_range(plane, y)]
    }

    /// Same geometry, ignoring row order.
    pub fn same_geometry(&self, other: &FrameLayout) -> bool {
        self.format == other.format && self.planes == other.planes
    }
}

/// Y plane followed by V then U, the on-disk order of YV12 and YV24.
fn planar(width: usize, height: usize, chroma_width: usize, chroma_height: usize) -> Vec<Plane> {
    let luma = Plane {
        offset: 0,
        row_bytes: width,
        rows: height,
    };
    let v = Plane {
        offset: luma.len(),
        row_bytes: chroma_width,
        rows: chroma_height,
    };
    let u = Plane {
        offset: v.offset + v.len(),
        row_bytes: chroma_width,
        rows: chroma_height,
    };
    vec![luma, v, u]
}

/// Copies every row of `src` into `dst`, translating row order between the two
/// layouts. Both layouts must share the same geometry and both buffers must
/// cover their layout.
pub fn copy_rows(src_layout: &FrameLayout, src: &[u8], dst_layout: &FrameLayout, dst: &mut [u8]) {
    debug_assert!(src_layout.same_geometry(dst_layout));
    for (index, plane) in src_layout.planes.iter().enumerate() {
        for y in 0..plane.rows {
            dst_layout
                .row_mut(dst, index, y)
                .copy_from_slice(src_layout.row(src, index, y));
        }
    }
}
