//! Entry point for `selective-repeat`.
//!
//! Parses CLI arguments, runs one simulation and prints the report.  All
//! protocol work is delegated to library modules; `main.rs` owns only
//! process setup (logging, argument parsing, exit status).

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::LevelFilter;

use selective_repeat::{ChannelConfig, ProtocolConfig, Simulator};

/// Selective-Repeat ARQ over a simulated lossy channel.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Number of messages the application generates.
    #[arg(short, long, default_value_t = 20)]
    messages: usize,

    /// Probability that a packet is lost.
    #[arg(short, long, default_value_t = 0.0)]
    loss: f64,

    /// Probability that a packet is corrupted.
    #[arg(short, long, default_value_t = 0.0)]
    corrupt: f64,

    /// Mean time between application messages.
    #[arg(short, long, default_value_t = 10.0)]
    interarrival: f64,

    /// Seed for the channel's random number generator.
    #[arg(short, long, default_value_t = 0)]
    seed: u64,

    /// Trace level: 0 = warnings only, 1 = protocol events, 2 = buffer detail.
    #[arg(short, long, default_value_t = 0)]
    trace: u8,

    /// Send/receive window size.
    #[arg(long, default_value_t = 6)]
    window: usize,

    /// Sequence-number space; must be at least twice the window.
    #[arg(long, default_value_t = 13)]
    seq_space: u32,

    /// Retransmission timeout.
    #[arg(long, default_value_t = 16.0)]
    rtt: f64,

    /// Stop the simulation at this virtual time.
    #[arg(long, default_value_t = 1_000_000.0)]
    max_time: f64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --trace when set.
    let level = match cli.trace {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let protocol = ProtocolConfig::new(cli.window, cli.seq_space, cli.rtt)
        .context("invalid protocol parameters")?;
    let channel = ChannelConfig {
        messages: cli.messages,
        loss_prob: cli.loss,
        corrupt_prob: cli.corrupt,
        mean_interarrival: cli.interarrival,
        seed: cli.seed,
        max_time: cli.max_time,
    };

    log::info!(
        "window={} seq_space={} rtt={} messages={} loss={} corrupt={} seed={}",
        protocol.window_size,
        protocol.seq_space,
        protocol.rtt,
        channel.messages,
        channel.loss_prob,
        channel.corrupt_prob,
        channel.seed
    );

    let mut sim = Simulator::new(protocol, channel).context("invalid channel parameters")?;
    let report = sim.run();
    println!("{report}");

    if !report.is_complete() {
        bail!(
            "delivered {} of {} accepted messages (in order: {})",
            report.delivered,
            report.accepted,
            report.in_order
        );
    }
    Ok(())
}
