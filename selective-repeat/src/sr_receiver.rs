//! Selective-Repeat receive-side state machine.
//!
//! [`SrReceiver`] implements the receiver side of Selective Repeat:
//!
//! - Packets inside the current window `[expected, expected + N)` are
//!   acknowledged individually and buffered, even when they arrive ahead of
//!   a gap.
//! - Buffered payloads are released to the application strictly in
//!   sequence order, as soon as the front of the window is filled.
//! - Packets from the previous window `[expected - N, expected)` were
//!   already delivered; they are re-acknowledged (the first ACK was
//!   presumably lost) but never re-delivered.
//! - Anything else, and every corrupted packet, is dropped without an ACK.

use log::{debug, trace};

use crate::channel::{Channel, EndpointId};
use crate::config::ProtocolConfig;
use crate::packet::{Message, Packet, SeqNum};
use crate::window::{in_window, next_seq, offset, previous_base, SlotRing};

const ME: EndpointId = EndpointId::Receiver;

/// How [`SrReceiver::accept`] classified an incoming packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    /// Checksum mismatch; dropped without acknowledgment.
    Corrupted,
    /// New packet in the current window; `delivered` payloads were released.
    Buffered { delivered: usize },
    /// Already buffered; acknowledged again, nothing else changed.
    Duplicate,
    /// Already delivered; acknowledged again.
    Reacked,
    /// Outside both windows; dropped without acknowledgment.
    OutOfWindow,
}

/// Receiver-side counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Packets newly stored in the receive window.
    pub packets_received: u64,
    /// In-window packets that were already buffered.
    pub duplicates: u64,
    pub acks_sent: u64,
    /// Payloads released to the application.
    pub delivered: u64,
    pub corrupted: u64,
    pub out_of_window: u64,
}

// ---------------------------------------------------------------------------
// SrReceiver
// ---------------------------------------------------------------------------

/// Selective-Repeat receive-side state.
#[derive(Debug)]
pub struct SrReceiver {
    /// Oldest sequence number not yet delivered to the application.
    pub expected: SeqNum,

    config: ProtocolConfig,

    /// Offset 0 is always `expected`; a present slot holds the packet.
    window: SlotRing<Packet>,

    pub stats: ReceiverStats,
}

impl SrReceiver {
    /// Create a receiver in its initial state.
    ///
    /// # Panics
    ///
    /// Panics if `config` fails [`ProtocolConfig::validate`].
    pub fn new(config: ProtocolConfig) -> Self {
        if let Err(e) = config.validate() {
            panic!("invalid protocol config: {e}");
        }
        Self {
            expected: 0,
            window: SlotRing::new(config.window_size),
            config,
            stats: ReceiverStats::default(),
        }
    }

    /// Reset to the initial state: `expected = 0`, empty buffer.
    pub fn init(&mut self) {
        self.expected = 0;
        self.window.clear();
        self.stats = ReceiverStats::default();
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Number of received packets waiting for a gap to be filled.
    pub fn buffered(&self) -> usize {
        self.window.occupied()
    }

    /// Process a packet arriving from the sender.
    pub fn accept(&mut self, channel: &mut dyn Channel, packet: &Packet) -> Arrival {
        if packet.is_corrupted() {
            self.stats.corrupted += 1;
            debug!("[sr:B] ← corrupted packet, ignored");
            return Arrival::Corrupted;
        }

        let space = self.config.seq_space;
        let size = self.config.window_size;
        let Some(seq) = packet.seq_num(space) else {
            self.stats.out_of_window += 1;
            debug!("[sr:B] ← packet with no usable seq ({}), ignored", packet.seq);
            return Arrival::OutOfWindow;
        };

        if in_window(seq, self.expected, size, space) {
            self.send_ack(channel, seq);

            let off = offset(seq, self.expected, space);
            if self.window.is_occupied(off) {
                self.stats.duplicates += 1;
                trace!("[sr:B] duplicate packet {seq}, already buffered");
                return Arrival::Duplicate;
            }

            self.window.insert(off, *packet);
            self.stats.packets_received += 1;
            trace!("[sr:B] buffered packet {seq} at offset {off}");

            let delivered = self.drain(channel);
            Arrival::Buffered { delivered }
        } else if in_window(seq, previous_base(self.expected, size, space), size, space) {
            debug!(
                "[sr:B] ← old packet {seq} (expected {}), re-acking",
                self.expected
            );
            self.send_ack(channel, seq);
            Arrival::Reacked
        } else {
            self.stats.out_of_window += 1;
            debug!(
                "[sr:B] ← out-of-window packet {seq} (expected {}), ignored",
                self.expected
            );
            Arrival::OutOfWindow
        }
    }

    /// The receiver never originates data.
    pub fn output(&mut self, _channel: &mut dyn Channel, _message: Message) {}

    /// The receiver never arms a timer.
    pub fn timeout(&mut self, _channel: &mut dyn Channel) {}

    fn send_ack(&mut self, channel: &mut dyn Channel, seq: SeqNum) {
        debug!("[sr:B] → ACK {seq}");
        channel.to_network(ME, Packet::ack(seq));
        self.stats.acks_sent += 1;
    }

    /// Release every contiguous packet at the front of the window.
    fn drain(&mut self, channel: &mut dyn Channel) -> usize {
        let mut delivered = 0;
        while let Some(packet) = self.window.get(0).copied() {
            self.window.advance();
            debug!("[sr:B] delivering packet {} to application", packet.seq);
            channel.to_application(ME, packet.message());
            self.expected = next_seq(self.expected, self.config.seq_space);
            self.stats.delivered += 1;
            delivered += 1;
        }
        if delivered > 0 {
            trace!("[sr:B] window base advanced to {}", self.expected);
        }
        delivered
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
