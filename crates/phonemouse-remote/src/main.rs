//! PhoneMouse remote command-line entry point.
//!
//! A thin driver over [`RemoteControl`] for trying hosts out from a terminal.
//!
//! # Usage
//!
//! ```text
//! phonemouse [--config <PATH>] [--log-level <FILTER>] <COMMAND>
//!
//! Commands:
//!   discover  Probe the LAN and print hosts as they answer
//!   send      Connect to one host, emit events, disconnect
//! ```
//!
//! Examples:
//!
//! ```text
//! phonemouse discover --json
//! phonemouse send --host 192.168.1.20 --udp-port 40123 --mode touchpad --click left
//! phonemouse send --host 192.168.1.20 --udp-port 40123 --mode gravity --gravity 0.1,9.8,0
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable            | Description                          |
//! |---------------------|--------------------------------------|
//! | `PHONEMOUSE_CONFIG` | Path to `config.toml`                |
//! | `RUST_LOG`          | `tracing` filter, wins over config   |

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use phonemouse_core::{ControllerMode, GravitySample, MouseButton, PeerAddress};
use tracing::info;
use tracing_subscriber::EnvFilter;

use phonemouse_remote::application::{Dispatch, InputEvent, RemoteControl};
use phonemouse_remote::infrastructure::storage::config::{load_config, load_config_from};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// PhoneMouse remote: discover hosts and stream input events to them.
#[derive(Debug, Parser)]
#[command(name = "phonemouse", version)]
struct Cli {
    /// Configuration file.  Defaults to the platform config directory.
    #[arg(long, env = "PHONEMOUSE_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter used when `RUST_LOG` is unset (overrides the config file).
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Probe every interface and print hosts as they answer.
    Discover {
        /// Print one JSON object per host instead of a table row.
        #[arg(long)]
        json: bool,

        /// Number of probes per interface.
        #[arg(long)]
        probes: Option<u32>,

        /// Discovery port hosts listen on.
        #[arg(long)]
        port: Option<u16>,
    },

    /// Connect to a host, optionally switch mode, emit events, disconnect.
    Send {
        /// Host IP address.
        #[arg(long)]
        host: IpAddr,

        /// Reliable (TCP) port.
        #[arg(long, default_value_t = phonemouse_core::DEFAULT_RELIABLE_PORT)]
        port: u16,

        /// Unreliable (UDP) port, as reported by discovery.
        #[arg(long)]
        udp_port: u16,

        /// Mode to switch to after connecting.
        #[arg(long)]
        mode: Option<ControllerMode>,

        /// Button to click (`left` or `right`).
        #[arg(long)]
        click: Option<MouseButton>,

        /// Gravity sample as `x,y,z`.
        #[arg(long, value_parser = parse_gravity, allow_hyphen_values = true)]
        gravity: Option<GravitySample>,
    },
}

fn parse_gravity(text: &str) -> Result<GravitySample, String> {
    let parts: Vec<&str> = text.split(',').map(str::trim).collect();
    let [x, y, z] = parts.as_slice() else {
        return Err(format!("expected x,y,z, got {text:?}"));
    };
    let axis = |s: &str| s.parse::<f32>().map_err(|e| format!("{s:?}: {e}"));
    Ok(GravitySample::new(axis(*x)?, axis(*y)?, axis(*z)?))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config_from(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => load_config().context("loading config")?,
    };
    if let Some(level) = &cli.log_level {
        config.general.log_level = level.clone();
    }

    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level)),
        )
        .init();

    match cli.command {
        Command::Discover { json, probes, port } => {
            if let Some(probes) = probes {
                config.discovery.probe_count = probes;
            }
            if let Some(port) = port {
                config.discovery.port = port;
            }
            discover(&RemoteControl::from_config(&config), json).await
        }
        Command::Send {
            host,
            port,
            udp_port,
            mode,
            click,
            gravity,
        } => {
            let peer = PeerAddress::new(host, port, udp_port, host.to_string());
            let remote = RemoteControl::from_config(&config);
            send(&remote, peer, mode, click, gravity).await
        }
    }
}

async fn discover(remote: &RemoteControl, json: bool) -> anyhow::Result<()> {
    let mut run = remote.discover().await.context("starting discovery")?;
    info!(run = %run.id(), interfaces = run.interfaces().len(), "probing");

    let mut found = 0usize;
    loop {
        let next = tokio::select! {
            peer = run.next() => Some(peer),
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(peer) = next else {
            info!("interrupted");
            run.close().await;
            break;
        };
        let Some(peer) = peer else { break };
        found += 1;
        if json {
            println!("{}", serde_json::to_string(&peer)?);
        } else {
            println!(
                "{:<24} {:<15} tcp {:<5} udp {}",
                peer.name(),
                peer.address(),
                peer.reliable_port(),
                peer.unreliable_port()
            );
        }
    }

    if found == 0 && !json {
        println!("no hosts answered");
    }
    Ok(())
}

async fn send(
    remote: &RemoteControl,
    peer: PeerAddress,
    mode: Option<ControllerMode>,
    click: Option<MouseButton>,
    gravity: Option<GravitySample>,
) -> anyhow::Result<()> {
    remote
        .connect(peer.clone())
        .await
        .with_context(|| format!("connecting to {peer}"))?;

    let outcome = emit(remote, mode, click, gravity).await;
    let status = remote.status().await;
    remote.disconnect().await;
    outcome?;

    info!(
        mode = ?status.mode,
        connected_for = ?status.connected_for,
        "done"
    );
    Ok(())
}

async fn emit(
    remote: &RemoteControl,
    mode: Option<ControllerMode>,
    click: Option<MouseButton>,
    gravity: Option<GravitySample>,
) -> anyhow::Result<()> {
    if let Some(mode) = mode {
        ensure_sent(remote.set_mode(mode).await.context("switching mode")?)?;
    }
    if let Some(sample) = gravity {
        ensure_sent(
            remote
                .send(InputEvent::Gravity(sample))
                .await
                .context("sending gravity sample")?,
        )?;
    }
    if let Some(button) = click {
        ensure_sent(remote.click(button).await.context("clicking")?)?;
    }
    Ok(())
}

fn ensure_sent(dispatch: Dispatch) -> anyhow::Result<()> {
    if dispatch == Dispatch::NotConnected {
        bail!("connection dropped before the event was sent");
    }
    Ok(())
}
