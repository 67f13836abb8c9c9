use crate::config::{ConnectionConfig, QueryOptions};
use crate::constants::MAX_DATAGRAM_SIZE;
use crate::data::decode_data;
use crate::error::{DaqError, QueryStage};
use crate::error_table::DeviceError;
use crate::packet::{CommandPacket, decode_command, decode_response};
use crate::socket::Sockets;
use crate::telemetry::{ChannelAddress, TelemetryStore};
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

/// A connection to one acquisition chassis.
///
/// Owns the command-send, command-receive and telemetry sockets plus the buffer of
/// streamed samples. Share it behind an `Arc` (see [`ConnectionRegistry`](crate::ConnectionRegistry));
/// queries are serialized internally because the protocol correlates responses by
/// arrival order only.
#[derive(Debug)]
pub struct Connection {
    config: ConnectionConfig,
    command_local_addr: SocketAddr,
    data_local_addr: SocketAddr,
    sockets: Mutex<Option<Arc<Sockets>>>,
    telemetry: Mutex<TelemetryStore>,
    query_lock: tokio::sync::Mutex<()>,
    shutdown: watch::Sender<bool>,
}

impl Connection {
    /// Open the sockets described by `config`.
    ///
    /// Fails if any socket cannot be bound or the telemetry receive buffer cannot be
    /// grown to `config.recv_buffer_size`.
    pub async fn open(config: ConnectionConfig) -> Result<Self, DaqError> {
        info!(device = %config.device_addr, "Opening connection to acquisition chassis...");
        let sockets = Sockets::open(&config)?;
        let command_local_addr = sockets.command_rx.local_addr()?;
        let data_local_addr = sockets.data_rx.local_addr()?;
        info!(
            command = %command_local_addr,
            data = %data_local_addr,
            "Connection ready"
        );

        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            config,
            command_local_addr,
            data_local_addr,
            sockets: Mutex::new(Some(Arc::new(sockets))),
            telemetry: Mutex::new(TelemetryStore::new()),
            query_lock: tokio::sync::Mutex::new(()),
            shutdown,
        })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Local address echoes and responses are received on
    pub fn command_local_addr(&self) -> SocketAddr {
        self.command_local_addr
    }

    /// Local address telemetry is received on
    pub fn data_local_addr(&self) -> SocketAddr {
        self.data_local_addr
    }

    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Send `command` and collect the device's response(s) using the configured timeouts.
    ///
    /// Device errors (`Err<code>`) are logged and returned as ordinary responses.
    pub async fn query(&self, command: &str, multi_package: bool) -> Result<Vec<String>, DaqError> {
        self.query_with(command, &self.config.query_options(multi_package)).await
    }

    /// Send `command` and collect the response(s) with explicit handshake settings.
    pub async fn query_with(&self, command: &str, options: &QueryOptions) -> Result<Vec<String>, DaqError> {
        let packet = CommandPacket::new(command)?;
        let _flight = self.query_lock.lock().await;
        let sockets = self.sockets()?;
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        self.discard_stale(&sockets, &mut buf);

        let bytes = packet.to_bytes();
        self.log_datagram("Command TX", self.config.device_addr, &bytes);
        sockets.command_tx.send_to(&bytes, self.config.device_addr).await?;

        self.await_echo(&sockets, &mut buf, &packet, options.echo_timeout).await?;
        let response = self.await_response(&sockets, &mut buf, options.response_timeout).await?;
        report_device_error(command, &response);
        let mut responses = vec![response];

        if options.multi_package {
            loop {
                match self.await_echo(&sockets, &mut buf, &packet, options.drain_timeout).await {
                    Ok(()) => {}
                    Err(e) if e.is_timeout() => break,
                    Err(e) => return Err(e),
                }
                match self.await_response(&sockets, &mut buf, options.drain_timeout).await {
                    Ok(response) => {
                        report_device_error(command, &response);
                        responses.push(response);
                    }
                    Err(e) if e.is_timeout() => {
                        warn!(command, "Echo without response while draining a multi-package reply");
                        break;
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        debug!(command, responses = responses.len(), "Query complete");
        Ok(responses)
    }

    /// Drain every pending telemetry datagram into the store without blocking.
    ///
    /// Returns the number of samples ingested. Malformed packets are dropped and logged.
    pub fn read_data(&self) -> Result<usize, DaqError> {
        let sockets = self.sockets()?;
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let mut ingested = 0;
        loop {
            match sockets.data_rx.recv_from(&mut buf) {
                Ok((len, src)) => ingested += self.ingest(&buf[..len], src),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(ingested)
    }

    /// Take the buffered samples of one channel as `(times_s, values)`.
    ///
    /// The channel's buffer is cleared; an unknown or already drained channel
    /// yields two empty vectors.
    pub fn get_data(&self, system: u8, module: u8, channel: u8) -> (Vec<f64>, Vec<f32>) {
        let address = ChannelAddress::new(system, module, channel);
        match lock(&self.telemetry).drain(address) {
            Some(series) => series.into_parts(),
            None => {
                debug!(%address, "No telemetry buffered for channel");
                (Vec::new(), Vec::new())
            }
        }
    }

    /// Channels currently holding undrained samples.
    pub fn buffered_channels(&self) -> Vec<ChannelAddress> {
        lock(&self.telemetry).channels().collect()
    }

    /// Start a background task that ingests telemetry as it arrives.
    ///
    /// The task runs until [`close`](Self::close) is called or the last `Arc` to the
    /// connection is dropped. It shares the store with `read_data`/`get_data`, so
    /// polling is unnecessary while it runs.
    pub fn spawn_reader(self: &Arc<Self>) -> Result<JoinHandle<()>, DaqError> {
        let socket = {
            let sockets = self.sockets()?;
            let clone = sockets.data_rx.try_clone()?;
            clone.set_nonblocking(true)?;
            tokio::net::UdpSocket::from_std(clone)?
        };
        let shutdown = self.shutdown.subscribe();
        info!(local_addr = %self.data_local_addr, "Telemetry reader started");
        Ok(tokio::spawn(run_reader(Arc::downgrade(self), socket, shutdown)))
    }

    /// Release all sockets. Pending receives fail with [`DaqError::Closed`].
    ///
    /// Buffered telemetry stays available through `get_data`.
    pub fn close(&self) {
        let sockets = lock(&self.sockets).take();
        self.shutdown.send_replace(true);
        if sockets.is_some() {
            info!(device = %self.config.device_addr, "Connection closed");
        }
    }

    fn sockets(&self) -> Result<Arc<Sockets>, DaqError> {
        lock(&self.sockets).as_ref().cloned().ok_or(DaqError::Closed)
    }

    fn ingest(&self, datagram: &[u8], src: SocketAddr) -> usize {
        self.log_datagram("Data RX", src, datagram);
        match decode_data(datagram) {
            Ok(packet) => lock(&self.telemetry).extend_from_packet(&packet),
            Err(e) => {
                warn!(%src, error = %e, "Dropping malformed data packet");
                0
            }
        }
    }

    /// Throw away datagrams left over from an earlier, abandoned query.
    fn discard_stale(&self, sockets: &Sockets, buf: &mut [u8]) {
        while let Ok((len, src)) = sockets.command_rx.try_recv_from(buf) {
            warn!(%src, bytes = hex::encode(&buf[..len]), "Discarding stale datagram on command socket");
        }
    }

    async fn await_echo(
        &self,
        sockets: &Sockets,
        buf: &mut [u8],
        sent: &CommandPacket,
        timeout: Duration,
    ) -> Result<(), DaqError> {
        let deadline = Instant::now() + timeout;
        let len = self
            .recv_command_datagram(sockets, buf, QueryStage::Echo, deadline, timeout)
            .await?;
        match decode_command(&buf[..len]) {
            Ok(echo) if echo == *sent => trace!("Echo confirmed"),
            Ok(echo) => debug!(sent = %sent, echoed = %echo, "Echo differs from the sent command"),
            Err(e) => warn!(error = %e, "Malformed echo, treating it as delivery confirmation"),
        }
        Ok(())
    }

    async fn await_response(&self, sockets: &Sockets, buf: &mut [u8], timeout: Duration) -> Result<String, DaqError> {
        let deadline = Instant::now() + timeout;
        loop {
            let len = self
                .recv_command_datagram(sockets, buf, QueryStage::Response, deadline, timeout)
                .await?;
            match decode_response(&buf[..len]) {
                Ok(text) => return Ok(text),
                Err(e) => warn!(error = %e, "Dropping malformed response datagram"),
            }
        }
    }

    /// Receive one datagram into `buf`, returning its length.
    async fn recv_command_datagram(
        &self,
        sockets: &Sockets,
        buf: &mut [u8],
        stage: QueryStage,
        deadline: Instant,
        timeout: Duration,
    ) -> Result<usize, DaqError> {
        let shutdown = self.shutdown.subscribe();
        if *shutdown.borrow() {
            return Err(DaqError::Closed);
        }

        let received = tokio::select! {
            biased;
            _ = wait_closed(shutdown) => return Err(DaqError::Closed),
            received = tokio::time::timeout_at(deadline, sockets.command_rx.recv_from(buf)) => received,
        };
        match received {
            Ok(Ok((len, src))) => {
                self.log_datagram("Command RX", src, &buf[..len]);
                Ok(len)
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(DaqError::CommunicationTimeout { stage, timeout }),
        }
    }

    fn log_datagram(&self, direction: &str, peer: SocketAddr, bytes: &[u8]) {
        if self.config.verbose {
            info!(direction, %peer, len = bytes.len(), bytes = hex::encode(bytes), "Datagram");
        } else {
            trace!(direction, %peer, len = bytes.len(), bytes = hex::encode(bytes), "Datagram");
        }
    }
}

fn report_device_error(command: &str, response: &str) {
    if let Some(error) = DeviceError::parse(response) {
        warn!(
            command,
            code = error.code,
            description = error.description.unwrap_or("unknown error code"),
            "Device reported an error"
        );
    }
}

/// Ingest telemetry until the connection is closed or dropped.
async fn run_reader(connection: Weak<Connection>, socket: tokio::net::UdpSocket, shutdown: watch::Receiver<bool>) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    // Dropping the connection drops the sender, which also resolves this.
    let closed = wait_closed(shutdown);
    tokio::pin!(closed);
    loop {
        tokio::select! {
            _ = &mut closed => break,
            received = socket.recv_from(&mut buf) => match received {
                Ok((len, src)) => match connection.upgrade() {
                    Some(connection) => {
                        connection.ingest(&buf[..len], src);
                    }
                    None => break,
                },
                Err(e) => {
                    warn!(error = %e, "Telemetry socket failed");
                    break;
                }
            },
        }
    }
    info!("Telemetry reader stopped");
}

async fn wait_closed(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|closed| *closed).await;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
