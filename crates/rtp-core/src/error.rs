use std::io;
use thiserror::Error;

/// Error type for RTP operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// Invalid packet format
    #[error("Invalid RTP packet format: {0}")]
    InvalidPacket(String),

    /// Buffer too small
    #[error("Buffer too small for RTP packet: need {required} but have {available}")]
    BufferTooSmall { required: usize, available: usize },

    /// IO error when binding or receiving
    #[error("IO error: {0}")]
    IoError(String),

    /// Every port of the media range was tried without success
    #[error("No free RTP port in range {start}-{end}")]
    NoPortAvailable { start: u16, end: u16 },
}

/// Result type for RTP operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::IoError(err.to_string())
    }
}
