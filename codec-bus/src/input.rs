use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{BenchError, Result};
use crate::format::{self, FormatDescriptor};

/// First four bytes of every container file.
pub const CONTAINER_MAGIC: u32 = 0xABCD_EF01;

/// Reads frames from a container stream or a headerless raw stream.
pub struct ContainerReader<R = BufReader<File>> {
    inner: R,
    format: FormatDescriptor,
    /// Offset of the first frame; `rewind` seeks back here.
    header_len: u64,
    raw: bool,
    frame_buf: Vec<u8>,
}

impl ContainerReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| BenchError::open(path, e))?;
        Self::from_reader(BufReader::new(file))
    }

    /// Opens a raw stream. The layout is resolved before the file is touched.
    pub fn open_raw(path: impl AsRef<Path>, format: &str, width: i32, height: i32) -> Result<Self> {
        let desc = format::resolve(format, width, height)?;
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| BenchError::open(path, e))?;
        Ok(Self::from_raw_reader(BufReader::new(file), desc))
    }
}

impl<R: Read + Seek> ContainerReader<R> {
    /// Parses the container header and leaves the stream at the first frame.
    pub fn from_reader(mut inner: R) -> Result<Self> {
        let magic = read_u32(&mut inner)?
            .ok_or_else(|| BenchError::FormatParse("stream ends before the file magic".into()))?;
        if magic != CONTAINER_MAGIC {
            return Err(BenchError::BadMagic(magic));
        }

        let block_len = read_u32(&mut inner)?.ok_or_else(|| {
            BenchError::FormatParse("stream ends before the format block size".into())
        })?;
        let mut block = Vec::new();
        let n = (&mut inner).take(block_len as u64).read_to_end(&mut block)?;
        if n < block_len as usize {
            return Err(BenchError::FormatParse(format!(
                "format block declares {} bytes but only {} are present",
                block_len, n
            )));
        }
        let format = FormatDescriptor::from_bytes(&block)?;
        log::debug!("container header parsed: {}, block {} bytes", format, block_len);

        Ok(Self {
            inner,
            format,
            header_len: 8 + block_len as u64,
            raw: false,
            frame_buf: Vec::new(),
        })
    }

    /// Wraps a headerless stream whose frames are all `format.size_image` bytes.
    pub fn from_raw_reader(inner: R, format: FormatDescriptor) -> Self {
        Self {
            inner,
            format,
            header_len: 0,
            raw: true,
            frame_buf: Vec::new(),
        }
    }

    pub fn format(&self) -> &FormatDescriptor {
        &self.format
    }

    pub fn is_raw(&self) -> bool {
        self.raw
    }

    pub fn header_len(&self) -> u64 {
        self.header_len
    }

    /// Capacity of the internal frame buffer. Grows with the largest frame and
    /// is never released while the reader lives.
    pub fn buffer_capacity(&self) -> usize {
        self.frame_buf.capacity()
    }

    /// Returns the next frame, or `None` once no complete frame is left.
    /// A truncated trailing frame counts as the end of the stream.
    pub fn read_frame(&mut self) -> Result<Option<&[u8]>> {
        let frame_len = if self.raw {
            self.format.frame_size() as u64
        } else {
            match read_u32(&mut self.inner)? {
                Some(len) => len as u64,
                None => return Ok(None),
            }
        };

        self.frame_buf.clear();
        let n = (&mut self.inner)
            .take(frame_len)
            .read_to_end(&mut self.frame_buf)?;
        if (n as u64) < frame_len {
            if n > 0 {
                log::debug!(
                    "dropping truncated trailing frame: {} of {} bytes",
                    n,
                    frame_len
                );
            }
            return Ok(None);
        }
        Ok(Some(self.frame_buf.as_slice()))
    }

    /// Seeks back to the first frame without parsing the header again.
    pub fn rewind(&mut self) -> Result<()> {
        self.inner.seek(SeekFrom::Start(self.header_len))?;
        Ok(())
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Reads a little-endian u32. `None` when the stream ends first.
fn read_u32<R: Read>(reader: &mut R) -> Result<Option<u32>> {
    let mut buf = [0u8; 4];
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => return Ok(None),
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(Some(u32::from_le_bytes(buf)))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::format::resolve;

    fn container_bytes(format: &FormatDescriptor, frames: &[&[u8]]) -> Vec<u8> {
        let block = format.to_bytes();
        let mut out = Vec::new();
        out.extend_from_slice(&CONTAINER_MAGIC.to_le_bytes());
        out.extend_from_slice(&(block.len() as u32).to_le_bytes());
        out.extend_from_slice(&block);
        for frame in frames {
            out.extend_from_slice(&(frame.len() as u32).to_le_bytes());
            out.extend_from_slice(frame);
        }
        out
    }

    #[test]
    fn test_reads_container_frames() -> anyhow::Result<()> {
        let format = resolve("Y8", 4, 2)?;
        let bytes = container_bytes(&format, &[b"abcd", b"", b"0123456789"]);
        let mut reader = ContainerReader::from_reader(Cursor::new(bytes))?;

        assert!(!reader.is_raw());
        assert_eq!(reader.header_len(), 48);
        assert_eq!(reader.format(), &format);
        assert_eq!(reader.read_frame()?, Some(&b"abcd"[..]));
        assert_eq!(reader.read_frame()?, Some(&b""[..]));
        assert_eq!(reader.read_frame()?, Some(&b"0123456789"[..]));
        assert_eq!(reader.read_frame()?, None);
        assert_eq!(reader.read_frame()?, None);
        Ok(())
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = container_bytes(&resolve("Y8", 4, 2).unwrap(), &[]);
        bytes[0] = 0x02;
        match ContainerReader::from_reader(Cursor::new(bytes)) {
            Err(BenchError::BadMagic(magic)) => assert_eq!(magic, 0xABCD_EF02),
            other => panic!("expected BadMagic, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_truncated_header_is_parse_error() {
        let bytes = container_bytes(&resolve("Y8", 4, 2).unwrap(), &[]);
        for len in [0, 3, 6, 20] {
            let result = ContainerReader::from_reader(Cursor::new(bytes[..len].to_vec()));
            assert!(
                matches!(result, Err(BenchError::FormatParse(_))),
                "header cut at {} bytes",
                len
            );
        }
    }

    #[test]
    fn test_short_format_block_is_parse_error() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&CONTAINER_MAGIC.to_le_bytes());
        bytes.extend_from_slice(&8u32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 8]);
        assert!(matches!(
            ContainerReader::from_reader(Cursor::new(bytes)),
            Err(BenchError::FormatParse(_))
        ));
    }

    #[test]
    fn test_truncated_frame_is_end_of_stream() -> anyhow::Result<()> {
        let mut format = resolve("RGB24", 4, 2)?;
        format.size_image = 100;
        let mut bytes = container_bytes(&format, &[]);
        bytes.extend_from_slice(&100u32.to_le_bytes());
        bytes.extend_from_slice(&[7u8; 50]);

        let mut reader = ContainerReader::from_reader(Cursor::new(bytes))?;
        assert_eq!(reader.format().size_image, 100);
        assert_eq!(reader.read_frame()?, None);
        Ok(())
    }

    #[test]
    fn test_truncated_length_prefix_is_end_of_stream() -> anyhow::Result<()> {
        let mut bytes = container_bytes(&resolve("Y8", 2, 2)?, &[b"wxyz"]);
        bytes.extend_from_slice(&[1, 0]);
        let mut reader = ContainerReader::from_reader(Cursor::new(bytes))?;
        assert_eq!(reader.read_frame()?, Some(&b"wxyz"[..]));
        assert_eq!(reader.read_frame()?, None);
        Ok(())
    }

    #[test]
    fn test_raw_frames_use_resolved_size() -> anyhow::Result<()> {
        let format = resolve("RGB24", 4, 2)?;
        assert_eq!(format.frame_size(), 24);
        let data: Vec<u8> = (0..48).collect();
        let mut reader = ContainerReader::from_raw_reader(Cursor::new(data.clone()), format);

        assert!(reader.is_raw());
        assert_eq!(reader.header_len(), 0);
        assert_eq!(reader.read_frame()?, Some(&data[..24]));
        assert_eq!(reader.read_frame()?, Some(&data[24..]));
        assert_eq!(reader.read_frame()?, None);
        Ok(())
    }

    #[test]
    fn test_raw_partial_frame_is_end_of_stream() -> anyhow::Result<()> {
        let format = resolve("RGB24", 4, 2)?;
        let mut reader = ContainerReader::from_raw_reader(Cursor::new(vec![1u8; 24 + 23]), format);
        assert!(reader.read_frame()?.is_some());
        assert_eq!(reader.read_frame()?, None);
        Ok(())
    }

    #[test]
    fn test_rewind_replays_first_frame() -> anyhow::Result<()> {
        let format = resolve("Y8", 2, 2)?;
        let bytes = container_bytes(&format, &[b"first", b"second"]);
        let mut reader = ContainerReader::from_reader(Cursor::new(bytes))?;
        let first = reader.read_frame()?.map(|f| f.to_vec());
        while reader.read_frame()?.is_some() {}
        reader.rewind()?;
        assert_eq!(reader.read_frame()?.map(|f| f.to_vec()), first);

        let raw: Vec<u8> = (0..16).collect();
        let mut reader = ContainerReader::from_raw_reader(Cursor::new(raw), format);
        let first = reader.read_frame()?.map(|f| f.to_vec());
        while reader.read_frame()?.is_some() {}
        reader.rewind()?;
        assert_eq!(reader.read_frame()?.map(|f| f.to_vec()), first);
        Ok(())
    }

    #[test]
    fn test_frame_buffer_never_shrinks() -> anyhow::Result<()> {
        let format = resolve("Y8", 2, 2)?;
        let big = vec![9u8; 4096];
        let bytes = container_bytes(&format, &[&big, b"tiny"]);
        let mut reader = ContainerReader::from_reader(Cursor::new(bytes))?;
        reader.read_frame()?;
        let capacity = reader.buffer_capacity();
        assert!(capacity >= 4096);
        assert_eq!(reader.read_frame()?, Some(&b"tiny"[..]));
        assert_eq!(reader.buffer_capacity(), capacity);
        Ok(())
    }
}
