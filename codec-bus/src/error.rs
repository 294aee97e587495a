use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, BenchError>;

#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    /// Missing or contradictory configuration, reported before any I/O.
    #[error("invalid arguments: {0}")]
    Argument(String),

    #[error("failed to open file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid file magic: {0:#010x}")]
    BadMagic(u32),

    #[error("corrupt container header: {0}")]
    FormatParse(String),

    #[error("unsupported pixel format: {0}")]
    UnsupportedFormat(String),

    #[error("codec negotiation failed: {0}")]
    NegotiationFailed(String),

    /// A negotiated capability failed while processing a frame.
    #[error("codec error: {0}")]
    Codec(String),
}

impl BenchError {
    pub fn open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Open {
            path: path.into(),
            source,
        }
    }
}
