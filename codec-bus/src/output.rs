use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::error::{BenchError, Result};
use crate::format::FormatDescriptor;
use crate::input::CONTAINER_MAGIC;

/// Writes frames as a container stream, or as a raw stream when no descriptor is given.
pub struct ContainerWriter<W: Write = BufWriter<File>> {
    inner: W,
    raw: bool,
    frames_written: u64,
    bytes_written: u64,
}

impl ContainerWriter<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>, format: Option<&FormatDescriptor>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| BenchError::open(path, e))?;
        Self::from_writer(BufWriter::new(file), format)
    }
}

impl<W: Write> ContainerWriter<W> {
    /// Writes the header immediately when `format` is given.
    pub fn from_writer(mut inner: W, format: Option<&FormatDescriptor>) -> Result<Self> {
        let mut bytes_written = 0;
        if let Some(format) = format {
            let block = format.to_bytes();
            inner.write_all(&CONTAINER_MAGIC.to_le_bytes())?;
            inner.write_all(&(block.len() as u32).to_le_bytes())?;
            inner.write_all(&block)?;
            bytes_written = 8 + block.len() as u64;
        }
        Ok(Self {
            inner,
            raw: format.is_none(),
            frames_written: 0,
            bytes_written,
        })
    }

    pub fn write_frame(&mut self, data: &[u8]) -> Result<()> {
        if !self.raw {
            let len = length_prefix(data.len())?;
            self.inner.write_all(&len.to_le_bytes())?;
            self.bytes_written += 4;
        }
        self.inner.write_all(data)?;
        self.frames_written += 1;
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    pub fn is_raw(&self) -> bool {
        self.raw
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Total bytes handed to the sink, header included.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// Flushes and returns the sink.
    pub fn finish(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

fn length_prefix(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| {
        BenchError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("frame of {} bytes does not fit a 32-bit length prefix", len),
        ))
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::format::resolve;
    use crate::input::ContainerReader;

    #[test]
    fn test_container_layout() -> anyhow::Result<()> {
        let format = resolve("Y8", 2, 2)?;
        let mut writer = ContainerWriter::from_writer(Vec::new(), Some(&format))?;
        writer.write_frame(b"abc")?;
        assert_eq!(writer.frames_written(), 1);
        assert_eq!(writer.bytes_written(), 8 + 40 + 4 + 3);
        let bytes = writer.finish()?;

        assert_eq!(&bytes[0..4], &[0x01, 0xEF, 0xCD, 0xAB]);
        assert_eq!(&bytes[4..8], &40u32.to_le_bytes());
        assert_eq!(&bytes[8..48], &format.to_bytes()[..]);
        assert_eq!(&bytes[48..52], &3u32.to_le_bytes());
        assert_eq!(&bytes[52..], b"abc");
        Ok(())
    }

    #[test]
    fn test_raw_writes_bytes_only() -> anyhow::Result<()> {
        let mut writer = ContainerWriter::from_writer(Vec::new(), None)?;
        assert!(writer.is_raw());
        writer.write_frame(b"abcd")?;
        writer.write_frame(b"efgh")?;
        assert_eq!(writer.finish()?, b"abcdefgh");
        Ok(())
    }

    #[test]
    fn test_container_round_trip() -> anyhow::Result<()> {
        let mut format = resolve("YUY2", 16, 8)?;
        format.extra = vec![0xAA; 12];
        format.size = format.block_len() as u32;

        let frames: Vec<Vec<u8>> = (0..5u8)
            .map(|i| (0..(i as usize * 37 + 1)).map(|b| b as u8 ^ i).collect())
            .collect();

        let mut writer = ContainerWriter::from_writer(Vec::new(), Some(&format))?;
        for frame in &frames {
            writer.write_frame(frame)?;
        }
        let bytes = writer.finish()?;

        let mut reader = ContainerReader::from_reader(Cursor::new(bytes))?;
        assert_eq!(reader.format().to_bytes(), format.to_bytes());
        for frame in &frames {
            assert_eq!(reader.read_frame()?, Some(frame.as_slice()));
        }
        assert_eq!(reader.read_frame()?, None);
        Ok(())
    }

    #[test]
    fn test_raw_round_trip() -> anyhow::Result<()> {
        let format = resolve("RGB24", 5, 3)?;
        let frames: Vec<Vec<u8>> = (0..3u8).map(|i| vec![i; format.frame_size()]).collect();

        let mut writer = ContainerWriter::from_writer(Vec::new(), None)?;
        for frame in &frames {
            writer.write_frame(frame)?;
        }
        // a trailing short frame must read back as end of stream
        writer.write_frame(&[9u8; 7])?;
        let bytes = writer.finish()?;

        let mut reader = ContainerReader::from_raw_reader(Cursor::new(bytes), format);
        for frame in &frames {
            assert_eq!(reader.read_frame()?, Some(frame.as_slice()));
        }
        assert_eq!(reader.read_frame()?, None);
        Ok(())
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_oversized_frame_is_invalid_input() -> anyhow::Result<()> {
        assert_eq!(length_prefix(u32::MAX as usize)?, u32::MAX);
        assert!(matches!(
            length_prefix(u32::MAX as usize + 1),
            Err(BenchError::Io(e)) if e.kind() == io::ErrorKind::InvalidInput
        ));
        Ok(())
    }
}
