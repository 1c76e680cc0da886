//! `selective-repeat` — Selective-Repeat ARQ over a simulated lossy link.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────┐   data packets    ┌────────────┐
//!  │ SrSender │──────────────────▶│ SrReceiver │──▶ application
//!  └────┬─────┘                   └─────┬──────┘
//!       ▲        selective ACKs         │
//!       └───────────────────────────────┘
//!       │                               │
//!  ┌────▼───────────────────────────────▼────┐
//!  │          Channel (trait)                │
//!  │  to_network / to_application / timers   │
//!  └────┬────────────────────────────────────┘
//!       │ implemented by
//!  ┌────▼──────┐        ┌───────────┐
//!  │ Simulator │◀───────│ SrSession │ (tokio task, mpsc in/out)
//!  └───────────┘        └───────────┘
//! ```
//!
//! The endpoints never call each other and never look at the link; every
//! side effect goes through [`channel::Channel`].
//!
//! Each module has a single responsibility:
//! - [`packet`]       — packet/message layout, checksum, wire encoding
//! - [`window`]       — modular sequence arithmetic and the slot ring
//! - [`config`]       — protocol constants and channel parameters
//! - [`channel`]      — the endpoint ↔ environment contract
//! - [`sr_sender`]    — SR outbound window state machine
//! - [`sr_receiver`]  — SR inbound buffering and in-order release
//! - [`timer`]        — single-shot timer slots for the simulator
//! - [`simulator`]    — discrete-event lossy link driving both endpoints
//! - [`stats`]        — counters and the end-of-run report
//! - [`session`]      — async handle running a simulation in the background

pub mod channel;
pub mod config;
pub mod packet;
pub mod session;
pub mod simulator;
pub mod sr_receiver;
pub mod sr_sender;
pub mod stats;
pub mod timer;
pub mod window;

pub use channel::{Channel, EndpointId};
pub use config::{ChannelConfig, ConfigError, ProtocolConfig};
pub use packet::{Message, Packet, SeqNum};
pub use simulator::Simulator;
pub use sr_receiver::SrReceiver;
pub use sr_sender::{SendError, SrSender};
pub use stats::Report;
