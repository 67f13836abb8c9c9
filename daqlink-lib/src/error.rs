use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use strum_macros::Display;
use thiserror::Error;

/// Handshake stage a query was waiting in when it timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum QueryStage {
    Echo,
    Response,
}

/// Reasons a datagram was rejected by the packet codec.
///
/// These are never fatal for ingestion: the datagram is dropped and logged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("packet too short: expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },

    #[error("bad magic: expected 300, got {0}")]
    BadMagic(u16),

    #[error("size field mismatch: header declares {declared} payload bytes, datagram carries {actual}")]
    SizeMismatch { declared: usize, actual: usize },

    #[error("missing NUL terminator")]
    MissingTerminator,

    #[error("truncated data packet: {count} samples need {expected} bytes, got {actual}")]
    Truncated { count: u32, expected: usize, actual: usize },
}

/// The primary error type for the `daqlink-lib` library.
#[derive(Error, Debug)]
pub enum DaqError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed packet: {0}")]
    Decode(#[from] DecodeError),

    #[error("No {stage} from device within {timeout:?}")]
    CommunicationTimeout { stage: QueryStage, timeout: Duration },

    #[error("Invalid command {command:?}: {reason}")]
    InvalidCommand { command: String, reason: &'static str },

    #[error("Receive buffer too small: requested {requested} bytes, OS granted {actual}")]
    ReceiveBufferTooSmall { requested: usize, actual: usize },

    #[error("Connection closed")]
    Closed,

    #[error("Connection to {device} via {local} is already open with a different configuration")]
    ConfigMismatch { device: SocketAddr, local: SocketAddr },
}

impl DaqError {
    /// True for the timeout raised while waiting on the handshake.
    pub fn is_timeout(&self) -> bool {
        matches!(self, DaqError::CommunicationTimeout { .. })
    }
}
