use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};
use crate::format::PixelFormat;

/// Everything a benchmark run is built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    pub input: PathBuf,
    /// Output is discarded when unset.
    pub output: Option<PathBuf>,
    pub decode: bool,
    pub encode: bool,
    /// Input has no header; `format`, `width` and `height` describe it.
    pub raw_input: bool,
    /// Output is written without a header.
    pub raw_output: bool,
    /// Requested decode layout, or the raw input layout.
    pub format: Option<String>,
    pub width: i32,
    /// Negative requests top-down rows for RGB layouts.
    pub height: i32,
    /// Frames per loop, 0 for all.
    pub frames: u32,
    pub loops: u32,
    /// Encoder name; unset means no compression.
    pub codec: Option<String>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            output: None,
            decode: true,
            encode: true,
            raw_input: false,
            raw_output: false,
            format: None,
            width: 0,
            height: 0,
            frames: 0,
            loops: 1,
            codec: None,
        }
    }
}

impl BenchConfig {
    /// Applies the implied switches and rejects contradictory input.
    /// Touches no files.
    pub fn validate(mut self) -> Result<Self> {
        if self.input.as_os_str().is_empty() {
            return Err(BenchError::Argument("no input file given".to_string()));
        }

        if self.raw_input {
            self.decode = false;
            let format = match self.format.as_deref() {
                Some(format) if self.width != 0 && self.height != 0 => format,
                _ => {
                    return Err(BenchError::Argument(
                        "format, width and height must be given for raw inputs".to_string(),
                    ));
                }
            };
            PixelFormat::from_name(format)?;
        } else if !self.decode {
            if self.format.take().is_some() {
                log::warn!("ignoring format option because decoding is disabled");
            }
            if self.width != 0 {
                log::warn!("ignoring width option because decoding is disabled");
                self.width = 0;
            }
            if self.height != 0 {
                log::warn!("ignoring height option because decoding is disabled");
                self.height = 0;
            }
        } else if let Some(format) = self.format.as_deref() {
            PixelFormat::from_name(format)?;
        }

        if self.raw_output {
            self.encode = false;
        }
        if !self.encode && self.codec.take().is_some() {
            log::warn!("ignoring codec option because compression is disabled");
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(input: &str) -> BenchConfig {
        BenchConfig {
            input: PathBuf::from(input),
            ..Default::default()
        }
    }

    #[test]
    fn test_input_is_required() {
        assert!(matches!(
            BenchConfig::default().validate(),
            Err(BenchError::Argument(_))
        ));
    }

    #[test]
    fn test_raw_input_needs_geometry() -> anyhow::Result<()> {
        let mut cfg = config("in.raw");
        cfg.raw_input = true;
        cfg.format = Some("RGB24".into());
        cfg.width = 4;
        assert!(matches!(cfg.clone().validate(), Err(BenchError::Argument(_))));

        cfg.height = -2;
        let cfg = cfg.validate()?;
        assert!(!cfg.decode);
        assert_eq!(cfg.format.as_deref(), Some("RGB24"));
        Ok(())
    }

    #[test]
    fn test_raw_input_rejects_unknown_format() {
        let mut cfg = config("in.raw");
        cfg.raw_input = true;
        cfg.format = Some("NV12".into());
        cfg.width = 4;
        cfg.height = 4;
        assert!(matches!(cfg.validate(), Err(BenchError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_no_decode_drops_decode_options() -> anyhow::Result<()> {
        let mut cfg = config("in.cb");
        cfg.decode = false;
        cfg.format = Some("YUY2".into());
        cfg.width = 320;
        cfg.height = -240;
        let cfg = cfg.validate()?;
        assert_eq!(cfg.format, None);
        assert_eq!((cfg.width, cfg.height), (0, 0));
        Ok(())
    }

    #[test]
    fn test_raw_output_disables_compression() -> anyhow::Result<()> {
        let mut cfg = config("in.cb");
        cfg.raw_output = true;
        cfg.codec = Some("ffv1".into());
        let cfg = cfg.validate()?;
        assert!(!cfg.encode);
        assert_eq!(cfg.codec, None);
        Ok(())
    }

    #[test]
    fn test_deserialize_with_defaults() -> anyhow::Result<()> {
        let cfg: BenchConfig = serde_json::from_str(r#"{"input": "clip.cb", "frames": 10}"#)?;
        assert_eq!(cfg.input, PathBuf::from("clip.cb"));
        assert_eq!(cfg.frames, 10);
        assert_eq!(cfg.loops, 1);
        assert!(cfg.decode && cfg.encode);
        Ok(())
    }
}
