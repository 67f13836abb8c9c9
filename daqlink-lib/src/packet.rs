//! Command channel framing.
//!
//! Commands, their echoes and the device responses share a 4-byte header:
//!
//! ```text
//! u16le magic (= 300) | u16le size | ascii payload | terminator
//! ```
//!
//! Commands and echoes end in `"\r\n\0"` and `size` counts payload plus terminator.
//! Responses end in a 4-byte trailer which is stripped without interpretation.

use crate::constants::{
    COMMAND_HEADER_SIZE, COMMAND_MAGIC, COMMAND_TERMINATOR, MIN_COMMAND_PACKET_SIZE, MIN_RESPONSE_PACKET_SIZE,
    RESPONSE_TERMINATOR,
};
use crate::error::{DaqError, DecodeError};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

/// A text command sent to (or echoed back by) the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPacket {
    pub command: String,
}

impl CommandPacket {
    /// Validate `command` and wrap it. The text must be ASCII without NUL bytes.
    pub fn new(command: impl Into<String>) -> Result<Self, DaqError> {
        let command = command.into();
        if !command.is_ascii() {
            return Err(DaqError::InvalidCommand {
                command,
                reason: "command must be ASCII",
            });
        }
        if command.contains('\0') {
            return Err(DaqError::InvalidCommand {
                command,
                reason: "command must not contain NUL",
            });
        }
        if command.len() + COMMAND_TERMINATOR.len() > u16::MAX as usize {
            return Err(DaqError::InvalidCommand {
                command,
                reason: "command too long for the size field",
            });
        }
        Ok(Self { command })
    }

    /// Serialize to the wire format.
    pub fn to_bytes(&self) -> Bytes {
        let payload = self.command.as_bytes();
        let mut buf = BytesMut::with_capacity(COMMAND_HEADER_SIZE + payload.len() + COMMAND_TERMINATOR.len());
        buf.put_u16_le(COMMAND_MAGIC);
        buf.put_u16_le((payload.len() + COMMAND_TERMINATOR.len()) as u16);
        buf.put_slice(payload);
        buf.put_slice(COMMAND_TERMINATOR);
        buf.freeze()
    }
}

impl TryFrom<&[u8]> for CommandPacket {
    type Error = DecodeError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() < MIN_COMMAND_PACKET_SIZE {
            return Err(DecodeError::TooShort {
                expected: MIN_COMMAND_PACKET_SIZE,
                actual: bytes.len(),
            });
        }

        let mut header = &bytes[..COMMAND_HEADER_SIZE];
        let magic = header.get_u16_le();
        if magic != COMMAND_MAGIC {
            return Err(DecodeError::BadMagic(magic));
        }

        let declared = header.get_u16_le() as usize;
        let actual = bytes.len() - COMMAND_HEADER_SIZE;
        if declared != actual {
            return Err(DecodeError::SizeMismatch { declared, actual });
        }

        if bytes.last() != Some(&0) {
            return Err(DecodeError::MissingTerminator);
        }

        // 5- and 6-byte datagrams carry only part of the terminator and no payload
        let end = bytes
            .len()
            .saturating_sub(COMMAND_TERMINATOR.len())
            .max(COMMAND_HEADER_SIZE);
        let payload = &bytes[COMMAND_HEADER_SIZE..end];
        Ok(Self {
            command: String::from_utf8_lossy(payload).into_owned(),
        })
    }
}

impl From<CommandPacket> for Bytes {
    fn from(packet: CommandPacket) -> Self {
        packet.to_bytes()
    }
}

impl fmt::Display for CommandPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command)
    }
}

/// Encode a command string into a command packet.
pub fn encode_command(command: &str) -> Result<Bytes, DaqError> {
    Ok(CommandPacket::new(command)?.to_bytes())
}

/// Decode a command packet (as sent by the host or echoed by the device).
pub fn decode_command(bytes: &[u8]) -> Result<CommandPacket, DecodeError> {
    CommandPacket::try_from(bytes)
}

/// Extract the response text from a device response datagram.
///
/// The header and the 4-byte trailer are stripped; the size field is not checked
/// since the device pads responses inconsistently.
pub fn decode_response(bytes: &[u8]) -> Result<String, DecodeError> {
    if bytes.len() < MIN_RESPONSE_PACKET_SIZE {
        return Err(DecodeError::TooShort {
            expected: MIN_RESPONSE_PACKET_SIZE,
            actual: bytes.len(),
        });
    }
    let text = &bytes[COMMAND_HEADER_SIZE..bytes.len() - RESPONSE_TERMINATOR.len()];
    Ok(String::from_utf8_lossy(text).into_owned())
}

/// Build a response datagram the way the device frames it.
pub fn encode_response(text: &str) -> Bytes {
    let payload = text.as_bytes();
    let mut buf = BytesMut::with_capacity(COMMAND_HEADER_SIZE + payload.len() + RESPONSE_TERMINATOR.len());
    buf.put_u16_le(COMMAND_MAGIC);
    buf.put_u16_le((payload.len() + RESPONSE_TERMINATOR.len()) as u16);
    buf.put_slice(payload);
    buf.put_slice(RESPONSE_TERMINATOR);
    buf.freeze()
}
