//! Selective-Repeat send-side state machine.
//!
//! [`SrSender`] maintains a sliding window of up to `window_size` in-flight
//! packets, each acknowledged individually.
//!
//! # Protocol contract
//!
//! - At most `window_size` packets may be unacknowledged at once.  A
//!   submission that would exceed this is rejected with
//!   [`SendError::WindowFull`]; nothing is queued.
//! - ACKs are **selective**: `ack = K` acknowledges the packet with sequence
//!   number `K` only.  The window base slides once the oldest packet is
//!   acknowledged, past every contiguously acknowledged slot.
//! - A single timer governs the base packet.  On timeout only that packet is
//!   retransmitted; the rest of the window may already be acknowledged.
//! - Sequence numbers wrap modulo `seq_space`.
//!
//! All side effects go through the [`Channel`] passed to each entry point.

use log::{debug, trace};
use thiserror::Error;

use crate::channel::{Channel, EndpointId};
use crate::config::ProtocolConfig;
use crate::packet::{Message, Packet, SeqNum};
use crate::window::{in_window, next_seq, offset, SlotRing};

const ME: EndpointId = EndpointId::Sender;

/// Errors returned to the application by [`SrSender::submit`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    #[error("send window full ({in_flight} packets awaiting acknowledgment)")]
    WindowFull { in_flight: usize },
}

/// What [`SrSender::acknowledge`] did with an incoming packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// Checksum mismatch; discarded.
    Corrupted,
    /// Already acknowledged, outside the window, or never sent.
    Duplicate,
    /// A new acknowledgment; `slid` is how far the window base advanced.
    Accepted { slid: usize },
}

/// Sender-side counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenderStats {
    /// Submissions rejected because the window was full.
    pub window_full: u64,
    /// Uncorrupted acknowledgments received, duplicates included.
    pub acks_received: u64,
    /// Acknowledgments that marked a packet for the first time.
    pub new_acks: u64,
    /// Timeout-driven retransmissions.
    pub packets_resent: u64,
    /// Corrupted packets discarded.
    pub corrupted: u64,
}

// ---------------------------------------------------------------------------
// SendSlot
// ---------------------------------------------------------------------------

/// A single in-flight packet occupying one slot of the send window.
#[derive(Debug, Clone)]
pub struct SendSlot {
    pub packet: Packet,
    pub acked: bool,
    /// Total number of times this packet has been transmitted.
    pub tx_count: u32,
}

// ---------------------------------------------------------------------------
// SrSender
// ---------------------------------------------------------------------------

/// Selective-Repeat send-side state.
///
/// # Sequence-number layout
///
/// ```text
///    base              next_seq          base + window_size
///      │                   │                    │
///  ────┼───────────────────┼────────────────────┼──────▶ seq space (mod N)
///      │ <── in flight ──▶ │ <──── usable ────▶ │
/// ```
#[derive(Debug)]
pub struct SrSender {
    /// Sequence number of the oldest unacknowledged packet.
    pub base: SeqNum,

    /// Sequence number for the next new packet.
    pub next_seq: SeqNum,

    config: ProtocolConfig,

    /// Offset 0 is always `base`.
    window: SlotRing<SendSlot>,

    in_flight: usize,

    timer_armed: bool,

    pub stats: SenderStats,
}

impl SrSender {
    /// Create a sender in its initial state.
    ///
    /// # Panics
    ///
    /// Panics if `config` fails [`ProtocolConfig::validate`].
    pub fn new(config: ProtocolConfig) -> Self {
        if let Err(e) = config.validate() {
            panic!("invalid protocol config: {e}");
        }
        Self {
            base: 0,
            next_seq: 0,
            window: SlotRing::new(config.window_size),
            config,
            in_flight: 0,
            timer_armed: false,
            stats: SenderStats::default(),
        }
    }

    /// Reset to the initial state: empty window, sequence numbers at 0.
    pub fn init(&mut self) {
        self.base = 0;
        self.next_seq = 0;
        self.window.clear();
        self.in_flight = 0;
        self.timer_armed = false;
        self.stats = SenderStats::default();
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// `true` when there is room for at least one more in-flight packet.
    pub fn can_send(&self) -> bool {
        self.in_flight < self.config.window_size
    }

    /// Number of packets currently awaiting acknowledgment, including
    /// acknowledged ones held back behind an unacknowledged base.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn has_unacked(&self) -> bool {
        self.in_flight > 0
    }

    /// Whether this sender believes its retransmission timer is pending.
    pub fn timer_armed(&self) -> bool {
        self.timer_armed
    }

    /// Iterate over in-flight slots from the base onwards.
    pub fn window_entries(&self) -> impl Iterator<Item = &SendSlot> {
        (0..self.in_flight).filter_map(move |off| self.window.get(off))
    }

    /// Frame `message` as the next packet and send it, if the window allows.
    ///
    /// Returns the sequence number assigned to the packet.  The timer is
    /// armed when the packet becomes the window base.
    pub fn submit(
        &mut self,
        channel: &mut dyn Channel,
        message: Message,
    ) -> Result<SeqNum, SendError> {
        if !self.can_send() {
            self.stats.window_full += 1;
            debug!("[sr:A] new message arrives, send window is full");
            return Err(SendError::WindowFull {
                in_flight: self.in_flight,
            });
        }

        let seq = self.next_seq;
        let packet = Packet::data(seq, &message);
        self.window.insert(
            self.in_flight,
            SendSlot {
                packet,
                acked: false,
                tx_count: 1,
            },
        );
        self.in_flight += 1;

        debug!("[sr:A] → DATA seq={seq} in_flight={}", self.in_flight);
        channel.to_network(ME, packet);

        if !self.timer_armed {
            channel.start_timer(ME, self.config.rtt);
            self.timer_armed = true;
        }

        self.next_seq = next_seq(seq, self.config.seq_space);
        Ok(seq)
    }

    /// Process a packet arriving from the receiver.
    pub fn acknowledge(&mut self, channel: &mut dyn Channel, packet: &Packet) -> AckOutcome {
        if packet.is_corrupted() {
            self.stats.corrupted += 1;
            debug!("[sr:A] ← corrupted ACK, ignored");
            return AckOutcome::Corrupted;
        }
        self.stats.acks_received += 1;

        let Some(off) = self.slot_for(packet) else {
            debug!("[sr:A] ← ACK {} outside window, duplicate", packet.ack);
            return AckOutcome::Duplicate;
        };
        let Some(slot) = self.window.get_mut(off) else {
            return AckOutcome::Duplicate;
        };
        if slot.acked {
            debug!("[sr:A] ← ACK {} already seen, duplicate", packet.ack);
            return AckOutcome::Duplicate;
        }

        slot.acked = true;
        self.stats.new_acks += 1;
        debug!("[sr:A] ← ACK {} is new", packet.ack);

        if off != 0 {
            return AckOutcome::Accepted { slid: 0 };
        }

        let mut slid = 0;
        while self.window.get(0).is_some_and(|s| s.acked) {
            self.window.advance();
            self.base = next_seq(self.base, self.config.seq_space);
            self.in_flight -= 1;
            slid += 1;
        }
        trace!(
            "[sr:A] window slid by {slid}, base={} in_flight={}",
            self.base,
            self.in_flight
        );

        channel.stop_timer(ME);
        self.timer_armed = false;
        if self.has_unacked() {
            channel.start_timer(ME, self.config.rtt);
            self.timer_armed = true;
        }

        AckOutcome::Accepted { slid }
    }

    /// Handle expiry of the base packet's timer: resend that packet only.
    pub fn timeout(&mut self, channel: &mut dyn Channel) {
        self.timer_armed = false;

        let Some(slot) = self.window.get_mut(0) else {
            debug!("[sr:A] timeout with empty window, ignored");
            return;
        };
        slot.tx_count += 1;
        let packet = slot.packet;

        debug!("[sr:A] timeout, resending packet {}", packet.seq);
        channel.to_network(ME, packet);
        self.stats.packets_resent += 1;

        channel.start_timer(ME, self.config.rtt);
        self.timer_armed = true;
    }

    /// Window offset addressed by `packet.ack`, if it names an in-flight slot.
    fn slot_for(&self, packet: &Packet) -> Option<usize> {
        let space = self.config.seq_space;
        let ack = packet.ack_num(space)?;
        if !in_window(ack, self.base, self.config.window_size, space) {
            return None;
        }
        Some(offset(ack, self.base, space)).filter(|&off| off < self.in_flight)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{Action, Recorder};

    fn sender() -> (SrSender, Recorder) {
        (SrSender::new(ProtocolConfig::default()), Recorder::new())
    }

    fn msg(b: u8) -> Message {
        Message::filled(b)
    }

    #[test]
    fn initial_state() {
        let (s, _) = sender();
        assert_eq!(s.base, 0);
        assert_eq!(s.next_seq, 0);
        assert!(s.can_send());
        assert!(!s.has_unacked());
        assert!(!s.timer_armed());
    }

    #[test]
    fn first_submit_arms_timer_once() {
        let (mut s, mut ch) = sender();
        assert_eq!(s.submit(&mut ch, msg(b'a')), Ok(0));
        assert_eq!(s.submit(&mut ch, msg(b'b')), Ok(1));

        assert_eq!(ch.timer_starts(), 1);
        assert_eq!(ch.sent().len(), 2);
        assert_eq!(s.in_flight(), 2);
        assert_eq!(s.next_seq, 2);
    }

    #[test]
    fn submitted_packet_carries_no_ack() {
        let (mut s, mut ch) = sender();
        s.submit(&mut ch, msg(b'a')).unwrap();
        let pkt = ch.sent()[0];
        assert_eq!(pkt.ack, crate::packet::NOT_IN_USE);
        assert!(!pkt.is_corrupted());
    }

    #[test]
    fn out_of_order_ack_does_not_slide() {
        let (mut s, mut ch) = sender();
        for b in b"abc" {
            s.submit(&mut ch, msg(*b)).unwrap();
        }
        ch.drain();

        let out = s.acknowledge(&mut ch, &Packet::ack(1));
        assert_eq!(out, AckOutcome::Accepted { slid: 0 });
        assert_eq!(s.base, 0);
        assert_eq!(s.in_flight(), 3);
        assert!(ch.actions.is_empty(), "timer must not be touched");
    }

    #[test]
    fn base_ack_slides_past_contiguous_acks() {
        let (mut s, mut ch) = sender();
        for b in b"abcd" {
            s.submit(&mut ch, msg(*b)).unwrap();
        }
        s.acknowledge(&mut ch, &Packet::ack(1));
        s.acknowledge(&mut ch, &Packet::ack(2));
        ch.drain();

        let out = s.acknowledge(&mut ch, &Packet::ack(0));
        assert_eq!(out, AckOutcome::Accepted { slid: 3 });
        assert_eq!(s.base, 3);
        assert_eq!(s.in_flight(), 1);
        assert_eq!(
            ch.drain(),
            vec![
                Action::StopTimer(EndpointId::Sender),
                Action::StartTimer(EndpointId::Sender, 16.0)
            ]
        );
    }

    #[test]
    fn last_ack_stops_timer_without_rearming() {
        let (mut s, mut ch) = sender();
        s.submit(&mut ch, msg(b'a')).unwrap();
        ch.drain();

        s.acknowledge(&mut ch, &Packet::ack(0));
        assert_eq!(ch.drain(), vec![Action::StopTimer(EndpointId::Sender)]);
        assert!(!s.timer_armed());
        assert!(!s.has_unacked());
    }

    #[test]
    fn duplicate_ack_changes_nothing() {
        let (mut s, mut ch) = sender();
        s.submit(&mut ch, msg(b'a')).unwrap();
        s.submit(&mut ch, msg(b'b')).unwrap();

        assert_eq!(
            s.acknowledge(&mut ch, &Packet::ack(1)),
            AckOutcome::Accepted { slid: 0 }
        );
        assert_eq!(s.acknowledge(&mut ch, &Packet::ack(1)), AckOutcome::Duplicate);
        assert_eq!(s.stats.new_acks, 1);
        assert_eq!(s.stats.acks_received, 2);
    }

    #[test]
    fn ack_for_unsent_sequence_ignored() {
        let (mut s, mut ch) = sender();
        s.submit(&mut ch, msg(b'a')).unwrap();

        // 3 is inside [base, base + 6) but was never sent.
        assert_eq!(s.acknowledge(&mut ch, &Packet::ack(3)), AckOutcome::Duplicate);
        assert_eq!(s.stats.new_acks, 0);
    }

    #[test]
    fn corrupted_ack_ignored() {
        let (mut s, mut ch) = sender();
        s.submit(&mut ch, msg(b'a')).unwrap();

        let mut ack = Packet::ack(0);
        ack.ack = 999_999;
        assert_eq!(s.acknowledge(&mut ch, &ack), AckOutcome::Corrupted);
        assert_eq!(s.stats.corrupted, 1);
        assert_eq!(s.stats.acks_received, 0);
        assert!(s.has_unacked());
    }

    #[test]
    fn timeout_resends_base_only() {
        let (mut s, mut ch) = sender();
        for b in b"abc" {
            s.submit(&mut ch, msg(*b)).unwrap();
        }
        ch.drain();

        s.timeout(&mut ch);
        let sent = ch.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].seq, 0);
        assert_eq!(ch.timer_starts(), 1);
        assert_eq!(s.stats.packets_resent, 1);
        assert_eq!(s.window_entries().next().map(|e| e.tx_count), Some(2));
    }

    #[test]
    fn spurious_timeout_is_ignored() {
        let (mut s, mut ch) = sender();
        s.timeout(&mut ch);
        assert!(ch.actions.is_empty());
        assert_eq!(s.stats.packets_resent, 0);
    }

    #[test]
    fn window_wraps_around_sequence_space() {
        let (mut s, mut ch) = sender();
        // Walk the base to 10 with one packet at a time.
        for i in 0..10u32 {
            s.submit(&mut ch, msg(b'a')).unwrap();
            s.acknowledge(&mut ch, &Packet::ack(i));
        }
        assert_eq!(s.base, 10);

        let seqs: Vec<_> = (0..6)
            .map(|_| s.submit(&mut ch, msg(b'z')).unwrap())
            .collect();
        assert_eq!(seqs, vec![10, 11, 12, 0, 1, 2]);
        assert!(!s.can_send());

        // Ack 0 (offset 3) then 10..12: base jumps to 1.
        s.acknowledge(&mut ch, &Packet::ack(0));
        for a in [10, 11, 12] {
            s.acknowledge(&mut ch, &Packet::ack(a));
        }
        assert_eq!(s.base, 1);
        assert_eq!(s.in_flight(), 2);
    }

    #[test]
    fn init_resets_everything() {
        let (mut s, mut ch) = sender();
        s.submit(&mut ch, msg(b'a')).unwrap();
        s.init();
        assert_eq!(s.in_flight(), 0);
        assert_eq!(s.next_seq, 0);
        assert!(!s.timer_armed());
        assert_eq!(s.stats, SenderStats::default());
    }

    #[test]
    fn acks_at_largest_seq_space() {
        let config = ProtocolConfig::new(6, crate::config::MAX_SEQ_SPACE, 16.0).unwrap();
        let (mut s, mut ch) = (SrSender::new(config), Recorder::new());
        s.submit(&mut ch, msg(b'a')).unwrap();
        s.submit(&mut ch, msg(b'b')).unwrap();

        assert_eq!(s.acknowledge(&mut ch, &Packet::ack(0)), AckOutcome::Accepted { slid: 1 });
        assert_eq!(s.acknowledge(&mut ch, &Packet::ack(1)), AckOutcome::Accepted { slid: 1 });
        assert!(!s.has_unacked());
    }
}
