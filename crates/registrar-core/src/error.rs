use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use crate::transport::Transport;

/// Registrar errors
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed SIP message
    #[error("Failed to parse SIP message: {0}")]
    Parse(String),

    /// A listening socket could not be bound
    #[error("Failed to bind {transport} listener on {addr}: {source}")]
    Bind {
        transport: Transport,
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// Certificate or key problem
    #[error("TLS error: {0}")]
    Tls(String),

    /// A stream frame grew past the configured limit
    #[error("SIP message exceeds {limit} bytes")]
    MessageTooLarge { limit: usize },

    /// RTP processor could not be set up
    #[error("Media error: {0}")]
    Media(#[from] voipmon_rtp_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn tls(msg: impl Into<String>) -> Self {
        Self::Tls(msg.into())
    }
}

/// Result type for registrar operations
pub type Result<T> = std::result::Result<T, Error>;
