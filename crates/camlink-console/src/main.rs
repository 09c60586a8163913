//! camlink operator console.
//!
//! Connects to the inspection peer, mirrors every device it lists, and
//! accepts operator commands on stdin. Run `/help` for the command list.

use std::{
    io::{self, Write},
    time::Duration,
};

use camlink_client::{ClientConfig, Runtime, SystemEnv, TcpConnector, transport};
use camlink_console::{
    ConsoleError, PrintSink,
    commands::{self, Command, HELP},
};
use camlink_core::OperatorCommand;
use clap::Parser;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "camlink-console", about = "Operator console for inspection devices")]
struct Args {
    /// Websocket URL of the peer.
    #[arg(long, default_value = "ws://localhost:8080")]
    url: String,

    /// Delay before reconnecting after the connection drops, in milliseconds.
    #[arg(long, default_value_t = 2000)]
    reconnect_ms: u64,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "warn")]
    log_level: String,
}

impl Args {
    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig { url: self.url.clone(), ..ClientConfig::default() };
        config.link.reconnect_delay = Duration::from_millis(self.reconnect_ms);
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_writer(io::stderr)
        .init();

    let config = args.client_config();
    let connector = TcpConnector::from_url(&config.url)?;
    info!(url = %config.url, addr = connector.addr(), "starting console");

    let env = SystemEnv;
    let (handle, events, link) = transport(connector, env, config.url.clone(), config.link.clone());
    tokio::spawn(link.run());

    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        if let Err(e) = read_commands(commands_tx).await {
            tracing::error!(error = %e, "input closed");
        }
    });

    let runtime = Runtime::new(env, config.detection, handle, events, PrintSink::new(io::stdout()));
    runtime.run(commands_rx).await;
    Ok(())
}

/// Read operator lines until `/quit` or end of input.
async fn read_commands(commands: mpsc::UnboundedSender<OperatorCommand>) -> Result<(), ConsoleError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut out = io::stdout();

    while let Some(line) = lines.next_line().await? {
        match commands::parse(&line) {
            Command::Apply(batch) => {
                for command in batch {
                    if commands.send(command).is_err() {
                        return Ok(());
                    }
                }
            },
            Command::Help => writeln!(out, "{HELP}")?,
            Command::Quit => break,
            Command::Empty => {},
            Command::Unknown { input } => writeln!(out, "unknown command: {input} (try /help)")?,
            Command::InvalidArgs { command, error } => writeln!(out, "/{command}: {error}")?,
        }
    }
    Ok(())
}
