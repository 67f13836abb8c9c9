use crate::constants::{
    DEFAULT_COMMAND_PORT, DEFAULT_DATA_PORT, DEFAULT_DEVICE_ADDR, DEFAULT_DEVICE_COMMAND_PORT,
    DEFAULT_DRAIN_TIMEOUT_MS, DEFAULT_ECHO_TIMEOUT_MS, DEFAULT_MULTICAST_GROUP, DEFAULT_RECV_BUFFER_SIZE,
    DEFAULT_RESPONSE_TIMEOUT_MS,
};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

/// Endpoints, buffer sizing and handshake timeouts for one device connection.
///
/// Deserializes with defaults for every missing field, so a config file only
/// needs to name what differs from the factory setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Device address and command port commands are sent to
    pub device_addr: SocketAddr,
    /// Local interface the receive sockets bind to
    pub local_addr: Ipv4Addr,
    /// Local port receiving echoes and responses (0 = ephemeral)
    pub command_port: u16,
    /// Local port receiving telemetry (0 = ephemeral)
    pub data_port: u16,
    /// Multicast group the telemetry socket joins, if any
    pub multicast_group: Option<Ipv4Addr>,
    /// Receive buffer requested for the telemetry socket, in bytes
    pub recv_buffer_size: usize,
    pub echo_timeout_ms: u64,
    pub response_timeout_ms: u64,
    pub drain_timeout_ms: u64,
    /// Log every datagram at info level instead of trace
    pub verbose: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            device_addr: SocketAddr::V4(SocketAddrV4::new(DEFAULT_DEVICE_ADDR, DEFAULT_DEVICE_COMMAND_PORT)),
            local_addr: Ipv4Addr::UNSPECIFIED,
            command_port: DEFAULT_COMMAND_PORT,
            data_port: DEFAULT_DATA_PORT,
            multicast_group: Some(DEFAULT_MULTICAST_GROUP),
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
            echo_timeout_ms: DEFAULT_ECHO_TIMEOUT_MS,
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
            drain_timeout_ms: DEFAULT_DRAIN_TIMEOUT_MS,
            verbose: false,
        }
    }
}

impl ConnectionConfig {
    /// Default configuration for a device at `device_addr`.
    pub fn new(device_addr: SocketAddr) -> Self {
        Self {
            device_addr,
            ..Self::default()
        }
    }

    pub fn with_local_addr(mut self, local_addr: Ipv4Addr) -> Self {
        self.local_addr = local_addr;
        self
    }

    pub fn with_command_port(mut self, port: u16) -> Self {
        self.command_port = port;
        self
    }

    pub fn with_data_port(mut self, port: u16) -> Self {
        self.data_port = port;
        self
    }

    pub fn with_multicast_group(mut self, group: Ipv4Addr) -> Self {
        self.multicast_group = Some(group);
        self
    }

    /// Receive telemetry by unicast only.
    pub fn without_multicast(mut self) -> Self {
        self.multicast_group = None;
        self
    }

    pub fn with_recv_buffer_size(mut self, bytes: usize) -> Self {
        self.recv_buffer_size = bytes;
        self
    }

    pub fn with_timeouts(mut self, echo: Duration, response: Duration, drain: Duration) -> Self {
        self.echo_timeout_ms = echo.as_millis() as u64;
        self.response_timeout_ms = response.as_millis() as u64;
        self.drain_timeout_ms = drain.as_millis() as u64;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Local address the command-receive socket binds to.
    pub fn command_bind_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.local_addr, self.command_port))
    }

    /// Local address the telemetry socket binds to.
    pub fn data_bind_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.local_addr, self.data_port))
    }

    /// Handshake options built from the configured timeouts.
    pub fn query_options(&self, multi_package: bool) -> QueryOptions {
        QueryOptions {
            multi_package,
            echo_timeout: Duration::from_millis(self.echo_timeout_ms),
            response_timeout: Duration::from_millis(self.response_timeout_ms),
            drain_timeout: Duration::from_millis(self.drain_timeout_ms),
        }
    }
}

/// Per-call handshake settings for [`Connection::query_with`](crate::Connection::query_with).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// Keep collecting echo/response pairs until the device goes quiet
    pub multi_package: bool,
    pub echo_timeout: Duration,
    pub response_timeout: Duration,
    /// Silence that ends a multi-package burst
    pub drain_timeout: Duration,
}

impl Default for QueryOptions {
    fn default() -> Self {
        ConnectionConfig::default().query_options(false)
    }
}

impl QueryOptions {
    pub fn multi_package(mut self) -> Self {
        self.multi_package = true;
        self
    }

    pub fn with_echo_timeout(mut self, timeout: Duration) -> Self {
        self.echo_timeout = timeout;
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }
}
