use anyhow::{Context, Result};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use daqlink_lib::{ChannelAddress, ChannelSeries, Connection};
use daqlink_rs::cli::{ConnectionArgs, init_logging, parse_channel};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::{signal, time::sleep};
use tracing::{info, warn};

/// Stream telemetry from an acquisition chassis and print it per channel.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(flatten)]
    verbosity: Verbosity<InfoLevel>,

    /// Write logs to this file instead of the terminal
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Channels to print as system/module/channel (default: every channel seen)
    #[arg(short = 'C', long = "channel", value_parser = parse_channel)]
    channels: Vec<ChannelAddress>,

    /// Run continuously until Ctrl+C is pressed.
    #[arg(long)]
    continuous: bool,

    /// Number of polling rounds if not running continuously.
    #[arg(short, long, default_value_t = 10)]
    rounds: u32,

    /// Polling interval in milliseconds.
    #[arg(short, long, default_value_t = 500)]
    interval_ms: u64,

    /// Ingest with a background reader task instead of polling
    #[arg(long)]
    background: bool,

    /// Print full series as JSON lines instead of summaries
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.verbosity.tracing_level_filter(), cli.log_file.as_deref())?;

    let config = cli.connection.load()?;
    let connection = Arc::new(
        Connection::open(config)
            .await
            .context("Failed to open connection to the chassis")?,
    );

    let result = tokio::select! {
        res = run(&cli, &connection) => res,
        _ = signal::ctrl_c() => {
            info!("Ctrl+C received, shutting down gracefully.");
            Ok(())
        }
    };

    connection.close();
    result
}

async fn run(cli: &Cli, connection: &Arc<Connection>) -> Result<()> {
    if cli.background {
        let _reader = connection.spawn_reader()?;
    }

    info!(data = %connection.data_local_addr(), "--- Entering Telemetry Loop ---");
    let rounds = if cli.continuous { u32::MAX } else { cli.rounds };

    for _ in 0..rounds {
        sleep(Duration::from_millis(cli.interval_ms)).await;
        if !cli.background {
            connection.read_data()?;
        }

        let channels = if cli.channels.is_empty() {
            connection.buffered_channels()
        } else {
            cli.channels.clone()
        };

        for address in channels {
            let (times, values) = connection.get_data(address.system, address.module, address.channel);
            if times.is_empty() {
                warn!(%address, "No samples this round");
                continue;
            }
            let series = ChannelSeries { times, values };
            if cli.json {
                println!("{}", serde_json::json!({ "channel": address, "series": series }));
            } else {
                print_summary(address, &series);
            }
        }
    }

    info!("Finished logging.");
    Ok(())
}

fn print_summary(address: ChannelAddress, series: &ChannelSeries) {
    let first = series.times.first().copied().unwrap_or_default();
    let last = series.times.last().copied().unwrap_or_default();
    let (min, max) = series
        .values
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    println!(
        "[{address}] {} samples, t={first:.4}..{last:.4} s, min {min:.4}, max {max:.4}, last {:.4}",
        series.len(),
        series.values.last().copied().unwrap_or_default()
    );
}
