use anyhow::{Context, Result};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use daqlink_lib::{Connection, DeviceError};
use daqlink_rs::cli::{ConnectionArgs, init_logging};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Send commands to an acquisition chassis and print its responses.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(flatten)]
    verbosity: Verbosity<InfoLevel>,

    /// Write logs to this file instead of the terminal
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Keep collecting responses until the device goes quiet (fan-out commands)
    #[arg(short, long)]
    multi: bool,

    /// Echo and response timeout in milliseconds
    #[arg(short, long)]
    timeout_ms: Option<u64>,

    /// Commands to send, in order
    #[arg(required = true)]
    commands: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.verbosity.tracing_level_filter(), cli.log_file.as_deref())?;

    let config = cli.connection.load()?;
    let connection = Connection::open(config)
        .await
        .context("Failed to open connection to the chassis")?;

    let mut options = connection.config().query_options(cli.multi);
    if let Some(ms) = cli.timeout_ms {
        options = options
            .with_echo_timeout(Duration::from_millis(ms))
            .with_response_timeout(Duration::from_millis(ms));
    }

    for command in &cli.commands {
        let responses = connection
            .query_with(command, &options)
            .await
            .with_context(|| format!("Query {command:?} failed"))?;

        for response in responses {
            match DeviceError::parse(&response) {
                Some(error) => println!("{command} -> {response} ({error})"),
                None => println!("{command} -> {response}"),
            }
        }
    }

    connection.close();
    info!("Done.");
    Ok(())
}
