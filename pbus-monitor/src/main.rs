//! Pbus Monitor
//!
//! A command line tool for watching live bus traffic. It connects to a
//! serial or TCP bus interface from a JSON configuration file, prints
//! every decoded frame and can optionally poll a module's digital status
//! at a fixed interval.
//!
//! # Usage
//!
//! ```text
//! pbus-monitor <config.json> [--poll <address>]
//! pbus-monitor --simulate [--poll <address>]
//! ```
//!
//! Example configuration files:
//!
//! ```json
//! { "type": "serial", "port": "/dev/ttyUSB0", "baudrate": 9600 }
//! { "type": "network", "address": "10.0.0.12", "port": 8234 }
//! ```
//!
//! `--simulate` skips the configuration file and runs against a virtual
//! relay module at address 1 over an in-memory stream.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use pbus_link::{BusConfig, BusConnector, BusHandle, Connector, LinkError, LinkEvent};
use pbus_protocol::{command, Frame, MAX_ADDRESS, MIN_ADDRESS};
use pbus_sim::{run_module_io, VirtualModule};
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often `--poll` requests a digital status report
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Bus address of the simulated module behind `--simulate`
const SIM_ADDRESS: u8 = 1;

#[derive(Parser, Debug)]
#[command(name = "pbus-monitor", version, about = "Watch live Pbus frame traffic")]
struct Cli {
    /// JSON bus configuration file
    #[arg(value_name = "CONFIG", required_unless_present = "simulate", conflicts_with = "simulate")]
    config: Option<PathBuf>,

    /// Run against a simulated relay module instead of a real bus
    #[arg(long)]
    simulate: bool,

    /// Poll this module's digital status at a fixed interval
    #[arg(long, value_name = "ADDRESS", value_parser = clap::value_parser!(u8).range(MIN_ADDRESS as i64..=MAX_ADDRESS as i64))]
    poll: Option<u8>,
}

/// Hands out the single in-memory stream backing the simulated module
struct SimConnector {
    stream: Option<DuplexStream>,
}

impl Connector for SimConnector {
    type Stream = DuplexStream;

    async fn connect(&mut self) -> Result<DuplexStream, LinkError> {
        self.stream
            .take()
            .ok_or_else(|| LinkError::Config("simulated module is gone".to_string()))
    }
}

fn describe(frame: &Frame) -> String {
    match frame.command().and_then(command::name) {
        Some(name) => format!("{}  ({})", frame, name),
        None => frame.to_string(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "pbus_monitor=info,pbus_protocol=info,pbus_link=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let (handle, mut events, _task) = if cli.simulate {
        tracing::info!("running against a simulated module at address {}", SIM_ADDRESS);

        let (local, remote) = tokio::io::duplex(256);
        let module = VirtualModule::new(SIM_ADDRESS, command::module_type::M2Y10);
        tokio::spawn(run_module_io(module, remote));

        let connector = SimConnector {
            stream: Some(local),
        };
        BusHandle::spawn(connector, Duration::ZERO)
    } else {
        // clap guarantees a config path when --simulate is absent
        let Some(path) = cli.config.as_deref() else {
            bail!("a configuration file is required without --simulate");
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let config: BusConfig = serde_json::from_str(&raw)
            .with_context(|| format!("cannot parse {}", path.display()))?;

        tracing::info!("connecting to bus at {}", config.endpoint());

        let connector = BusConnector::from(&config);
        BusHandle::spawn(connector, config.reconnection_interval())
    };

    // Everything unclaimed lands on the catch-all, which is all traffic
    // for a monitor
    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel();
    handle.set_catch_all(Box::new(frame_tx)).await?;

    if let Some(address) = cli.poll {
        let poller = handle.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(POLL_INTERVAL);
            loop {
                tick.tick().await;
                match Frame::build(address, &[command::DIGITAL_STATUS_REQUEST]) {
                    Ok(frame) => {
                        if poller.send_frame(frame).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("cannot build poll frame: {}", e);
                        break;
                    }
                }
            }
        });
    }

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(LinkEvent::Online) => tracing::info!("bus online"),
                    Some(LinkEvent::Offline { reason }) => {
                        tracing::warn!("bus offline: {}", reason);
                    }
                    Some(LinkEvent::ConnectFailed { reason, terminal }) => {
                        tracing::warn!("connect failed: {}", reason);
                        if terminal {
                            bail!("bus configuration is unusable: {}", reason);
                        }
                    }
                    None => bail!("bus supervisor stopped unexpectedly"),
                }
            }
            frame = frame_rx.recv() => {
                let Some(frame) = frame else {
                    bail!("bus supervisor stopped unexpectedly");
                };
                println!("{}", describe(&frame));
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                handle.shutdown().await?;
                return Ok(());
            }
        }
    }
}
