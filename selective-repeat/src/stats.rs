//! End-of-run counters.
//!
//! Each endpoint keeps its own counters ([`SenderStats`], [`ReceiverStats`]);
//! the simulator keeps [`ChannelStats`].  A [`Report`] bundles the three
//! with the outcome of the run.

use std::fmt;

pub use crate::sr_receiver::ReceiverStats;
pub use crate::sr_sender::SenderStats;

/// Counters kept by the simulated channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Packets handed to the network by either endpoint.
    pub to_network: u64,
    pub lost: u64,
    pub corrupted: u64,
    /// Messages delivered to the receiving application.
    pub to_application: u64,
    /// Timer expiries that reached an endpoint.
    pub timeouts: u64,
    /// Attempts to start a timer that was already running.
    pub timer_warnings: u64,
}

/// Summary of a simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// Virtual time when the run stopped.
    pub end_time: f64,
    /// Messages the sender accepted into its window.
    pub accepted: usize,
    /// Messages delivered to the receiving application.
    pub delivered: usize,
    /// Whether the delivered messages are exactly a prefix of the accepted
    /// ones, in order.
    pub in_order: bool,
    pub sender: SenderStats,
    pub receiver: ReceiverStats,
    pub channel: ChannelStats,
}

impl Report {
    /// Every accepted message was delivered, once, in order.
    pub fn is_complete(&self) -> bool {
        self.in_order && self.delivered == self.accepted
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Simulator terminated at time {:.3}", self.end_time)?;
        writeln!(f, "Sender (A):")?;
        writeln!(f, "  messages accepted:          {}", self.accepted)?;
        writeln!(f, "  rejected, window full:      {}", self.sender.window_full)?;
        writeln!(f, "  packets resent:             {}", self.sender.packets_resent)?;
        writeln!(f, "  ACKs received:              {}", self.sender.acks_received)?;
        writeln!(f, "  new ACKs:                   {}", self.sender.new_acks)?;
        writeln!(f, "  corrupted ACKs:             {}", self.sender.corrupted)?;
        writeln!(f, "Receiver (B):")?;
        writeln!(f, "  packets received:           {}", self.receiver.packets_received)?;
        writeln!(f, "  duplicates:                 {}", self.receiver.duplicates)?;
        writeln!(f, "  ACKs sent:                  {}", self.receiver.acks_sent)?;
        writeln!(f, "  corrupted packets:          {}", self.receiver.corrupted)?;
        writeln!(f, "  out-of-window packets:      {}", self.receiver.out_of_window)?;
        writeln!(f, "  messages delivered:         {}", self.delivered)?;
        writeln!(f, "Channel:")?;
        writeln!(f, "  packets sent:               {}", self.channel.to_network)?;
        writeln!(f, "  packets lost:               {}", self.channel.lost)?;
        writeln!(f, "  packets corrupted:          {}", self.channel.corrupted)?;
        writeln!(f, "  timeouts:                   {}", self.channel.timeouts)?;
        write!(f, "  timer warnings:             {}", self.channel.timer_warnings)
    }
}
