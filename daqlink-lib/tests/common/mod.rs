//! Common test utilities and shared imports

// Allow unused imports and dead code since this is a shared module
// used across multiple test files - not all items are used in every test file
#[allow(unused_imports)]
pub use bytes::Bytes;
#[allow(unused_imports)]
pub use daqlink_lib::{
    ChannelAddress, CommandPacket, Connection, ConnectionConfig, ConnectionRegistry, DaqError, DataPacket,
    DecodeError, QueryOptions, QueryStage, TickSample, decode_command, decode_data, encode_command, encode_data,
    encode_response,
};
#[allow(unused_imports)]
pub use std::sync::Arc;
#[allow(unused_imports)]
pub use std::time::{Duration, Instant};

use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use tokio::task::JoinHandle;

/// Decode hex string to bytes for testing
#[allow(dead_code)]
pub fn hex_to_bytes(hex_data: &str) -> Bytes {
    Bytes::from(hex::decode(hex_data).expect("Failed to decode hex"))
}

/// Route library logs to the test output
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Loopback configuration with ephemeral ports and a small receive buffer
#[allow(dead_code)]
pub fn loopback_config(device: SocketAddr) -> ConnectionConfig {
    ConnectionConfig::new(device)
        .with_local_addr(Ipv4Addr::LOCALHOST)
        .with_command_port(0)
        .with_data_port(0)
        .without_multicast()
        .with_recv_buffer_size(32 * 1024)
        .with_timeouts(Duration::from_secs(1), Duration::from_secs(1), Duration::from_millis(200))
}

/// What the simulated chassis does with one received command
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum Reply {
    /// Echo the command once per response and send each response after its echo
    Respond(Vec<String>),
    /// Echo the command, never answer
    EchoOnly,
    /// Swallow the command
    Silent,
    /// Send these datagrams verbatim
    Raw(Vec<Vec<u8>>),
}

#[allow(dead_code)]
impl Reply {
    pub fn text(response: &str) -> Self {
        Reply::Respond(vec![response.to_string()])
    }

    pub fn texts(responses: &[&str]) -> Self {
        Reply::Respond(responses.iter().map(|r| r.to_string()).collect())
    }
}

/// A chassis simulator answering on the loopback interface
#[allow(dead_code)]
pub struct MockDevice {
    socket: tokio::net::UdpSocket,
    addr: SocketAddr,
}

#[allow(dead_code)]
impl MockDevice {
    pub async fn bind() -> Self {
        let socket = tokio::net::UdpSocket::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind mock device");
        let addr = socket.local_addr().unwrap();
        Self { socket, addr }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Answer one command per script entry, sending replies to `reply_to`.
    ///
    /// Resolves to the commands received, decoded.
    pub fn serve(self, reply_to: SocketAddr, script: Vec<Reply>) -> JoinHandle<Vec<String>> {
        tokio::spawn(async move {
            let mut received = Vec::new();
            let mut buf = vec![0u8; 2048];
            for reply in script {
                let len = match tokio::time::timeout(Duration::from_secs(5), self.socket.recv(&mut buf)).await {
                    Ok(Ok(len)) => len,
                    _ => break,
                };
                let command = buf[..len].to_vec();
                received.push(decode_command(&command).expect("host sent a valid command").command);

                match reply {
                    Reply::Respond(responses) => {
                        for response in responses {
                            self.socket.send_to(&command, reply_to).await.unwrap();
                            self.socket
                                .send_to(&encode_response(&response), reply_to)
                                .await
                                .unwrap();
                        }
                    }
                    Reply::EchoOnly => {
                        self.socket.send_to(&command, reply_to).await.unwrap();
                    }
                    Reply::Silent => {}
                    Reply::Raw(datagrams) => {
                        for datagram in datagrams {
                            self.socket.send_to(&datagram, reply_to).await.unwrap();
                        }
                    }
                }
            }
            received
        })
    }
}

/// Streams telemetry datagrams at a connection's data socket
#[allow(dead_code)]
pub struct TelemetrySender {
    socket: UdpSocket,
    target: SocketAddr,
}

#[allow(dead_code)]
impl TelemetrySender {
    pub fn new(target: SocketAddr) -> Self {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind telemetry sender");
        Self { socket, target }
    }

    pub fn send(&self, packet: &DataPacket) {
        self.send_raw(&encode_data(packet));
    }

    pub fn send_raw(&self, bytes: &[u8]) {
        self.socket.send_to(bytes, self.target).expect("send telemetry");
    }
}

/// Build a packet with samples `(ticks, value)`
#[allow(dead_code)]
pub fn data_packet(system: u8, module: u8, channel: u8, samples: &[(u64, f32)]) -> DataPacket {
    DataPacket {
        system_id: system,
        module_id: module,
        channel_id: channel,
        data_type: 0,
        samples: samples.iter().map(|&(ticks, value)| TickSample::new(ticks, value)).collect(),
    }
}
