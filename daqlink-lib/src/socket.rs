//! UDP socket creation for the command and telemetry channels.
//!
//! The command-receive and telemetry sockets are created through `socket2` so that
//! address reuse and the receive buffer can be configured before binding.

use crate::config::ConnectionConfig;
use crate::error::DaqError;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use tracing::{debug, info, warn};

/// The three sockets of one device connection.
#[derive(Debug)]
pub(crate) struct Sockets {
    pub command_tx: tokio::net::UdpSocket,
    pub command_rx: tokio::net::UdpSocket,
    /// Polled without blocking by `read_data`, cloned for the reader task
    pub data_rx: UdpSocket,
}

impl Sockets {
    /// Open all sockets for `config`. Must run inside a tokio runtime.
    pub fn open(config: &ConnectionConfig) -> Result<Self, DaqError> {
        let command_tx = tokio::net::UdpSocket::from_std(create_command_send_socket()?)?;
        let command_rx = tokio::net::UdpSocket::from_std(create_command_receive_socket(config.command_bind_addr())?)?;
        let data_rx = create_data_socket(config)?;
        Ok(Self {
            command_tx,
            command_rx,
            data_rx,
        })
    }
}

/// Unbound (ephemeral port) socket used only to send commands.
fn create_command_send_socket() -> io::Result<UdpSocket> {
    let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0))?;
    socket.set_nonblocking(true)?;
    debug!(local_addr = %socket.local_addr()?, "[Command TX] socket ready");
    Ok(socket)
}

/// Socket receiving echoes and responses, with SO_REUSEADDR.
fn create_command_receive_socket(bind_addr: SocketAddr) -> io::Result<UdpSocket> {
    let socket2 = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket2.set_reuse_address(true)?;
    socket2.bind(&bind_addr.into())?;
    socket2.set_nonblocking(true)?;

    let socket: UdpSocket = socket2.into();
    debug!(local_addr = %socket.local_addr()?, "[Command RX] socket bound");
    Ok(socket)
}

/// Telemetry socket: enlarged receive buffer, optional multicast membership, non-blocking.
fn create_data_socket(config: &ConnectionConfig) -> Result<UdpSocket, DaqError> {
    let socket2 = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket2.set_reuse_address(true)?;

    let requested = config.recv_buffer_size;
    socket2.set_recv_buffer_size(requested)?;
    let actual = socket2.recv_buffer_size()?;
    if actual < requested {
        warn!(requested, actual, "[Data RX] OS refused to grow the receive buffer");
        return Err(DaqError::ReceiveBufferTooSmall { requested, actual });
    }

    // Binding to a unicast interface address filters out multicast traffic on Linux,
    // so a multicast receiver listens on all interfaces and selects the NIC on join.
    let bind_addr = match config.multicast_group {
        Some(_) => SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.data_port)),
        None => config.data_bind_addr(),
    };
    socket2.bind(&bind_addr.into())?;

    if let Some(group) = config.multicast_group {
        socket2.join_multicast_v4(&group, &config.local_addr)?;
        info!(group = %group, interface = %config.local_addr, "[Data RX] joined multicast group");
    }

    socket2.set_nonblocking(true)?;
    let socket: UdpSocket = socket2.into();
    debug!(local_addr = %socket.local_addr()?, recv_buffer = actual, "[Data RX] socket bound");
    Ok(socket)
}
