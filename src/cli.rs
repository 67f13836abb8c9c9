use anyhow::{Context, Result};
use clap::Args;
use daqlink_lib::{ChannelAddress, ConnectionConfig};
use std::fs;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

/// Connection settings shared by all tools. Flags override the config file.
#[derive(Args, Debug)]
pub struct ConnectionArgs {
    /// JSON file with connection settings
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Device command address, e.g. 192.168.100.2:8001
    #[arg(short, long)]
    pub device: Option<SocketAddr>,

    /// Local interface to bind and join multicast on
    #[arg(long)]
    pub local_addr: Option<Ipv4Addr>,

    /// Local port receiving echoes and responses
    #[arg(long)]
    pub command_port: Option<u16>,

    /// Local port receiving telemetry
    #[arg(long)]
    pub data_port: Option<u16>,

    /// Multicast group carrying telemetry
    #[arg(long, conflicts_with = "no_multicast")]
    pub multicast_group: Option<Ipv4Addr>,

    /// Receive telemetry by unicast only
    #[arg(long)]
    pub no_multicast: bool,

    /// Telemetry socket receive buffer in bytes
    #[arg(long)]
    pub recv_buffer: Option<usize>,

    /// Log every datagram (hex) at info level
    #[arg(long)]
    pub trace_datagrams: bool,
}

impl ConnectionArgs {
    /// Build the connection config: defaults, then the config file, then flags.
    pub fn load(&self) -> Result<ConnectionConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text =
                    fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path.display()))?;
                serde_json::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))?
            }
            None => ConnectionConfig::default(),
        };

        if let Some(device) = self.device {
            config.device_addr = device;
        }
        if let Some(local_addr) = self.local_addr {
            config.local_addr = local_addr;
        }
        if let Some(port) = self.command_port {
            config.command_port = port;
        }
        if let Some(port) = self.data_port {
            config.data_port = port;
        }
        if let Some(group) = self.multicast_group {
            config.multicast_group = Some(group);
        }
        if self.no_multicast {
            config.multicast_group = None;
        }
        if let Some(bytes) = self.recv_buffer {
            config.recv_buffer_size = bytes;
        }
        if self.trace_datagrams {
            config.verbose = true;
        }
        Ok(config)
    }
}

/// Install the tracing subscriber. `RUST_LOG` refines the level given on the command line.
///
/// With a log file, output goes through a non-blocking writer; keep the returned
/// guard alive until exit so buffered lines are flushed.
pub fn init_logging(level: LevelFilter, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    match log_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let file_name = path.file_name().context("Log file path has no file name")?;
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(directory, file_name));
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
            Ok(None)
        }
    }
}

/// Parse a `system/module/channel` triple.
pub fn parse_channel(s: &str) -> Result<ChannelAddress, String> {
    let parts: Vec<&str> = s.split('/').collect();
    let [system, module, channel] = parts.as_slice() else {
        return Err(format!("expected system/module/channel, got {s:?}"));
    };
    let parse = |part: &str| part.trim().parse::<u8>().map_err(|e| format!("{part:?}: {e}"));
    Ok(ChannelAddress::new(parse(*system)?, parse(*module)?, parse(*channel)?))
}
