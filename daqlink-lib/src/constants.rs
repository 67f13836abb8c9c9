// Protocol constants for the acquisition chassis UDP link

use std::net::Ipv4Addr;

/// Magic value carried in the first two bytes of every command packet
pub const COMMAND_MAGIC: u16 = 300;

/// Size of the command/response header: u16 magic + u16 size (4 bytes)
pub const COMMAND_HEADER_SIZE: usize = 4;

/// Terminator appended to every command payload
pub const COMMAND_TERMINATOR: &[u8; 3] = b"\r\n\0";

/// Terminator appended to every response payload
pub const RESPONSE_TERMINATOR: &[u8; 4] = b"\r\n\0\0";

/// Smallest datagram accepted as a command: the header plus the trailing NUL
pub const MIN_COMMAND_PACKET_SIZE: usize = COMMAND_HEADER_SIZE + 1;

/// Smallest datagram that can hold a response header and its trailer
pub const MIN_RESPONSE_PACKET_SIZE: usize = COMMAND_HEADER_SIZE + RESPONSE_TERMINATOR.len();

/// Size of the data packet header (system, module, channel, type, u32 count)
pub const DATA_HEADER_SIZE: usize = 8;

/// Size of one sample on the wire (u64 tick + f32 value)
pub const DATA_SAMPLE_SIZE: usize = 12;

/// Device timestamp ticks per second (1 tick = 100 µs)
pub const TICKS_PER_SECOND: f64 = 10_000.0;

/// Receive buffer for a single datagram
pub const MAX_DATAGRAM_SIZE: usize = 65_536;

/// Prefix of a device error response
pub const DEVICE_ERROR_PREFIX: &str = "Err";

// Default endpoints. All of them can be overridden through `ConnectionConfig`.

pub const DEFAULT_DEVICE_ADDR: Ipv4Addr = Ipv4Addr::new(192, 168, 100, 2);
pub const DEFAULT_DEVICE_COMMAND_PORT: u16 = 8001;
pub const DEFAULT_COMMAND_PORT: u16 = 8002;
pub const DEFAULT_DATA_PORT: u16 = 8003;
pub const DEFAULT_MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 0, 0, 200);

/// Receive buffer requested for the telemetry socket (4 MiB)
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 4 * 1024 * 1024;

pub const DEFAULT_ECHO_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_DRAIN_TIMEOUT_MS: u64 = 300;
