//! Discrete-event network simulator for the two endpoints.
//!
//! The simulator owns one [`SrSender`], one [`SrReceiver`] and the lossy link
//! between them.  It drives both through their entry points, one event at a
//! time, and implements [`Channel`] for them.
//!
//! | Fault       | Model                                                  |
//! |-------------|--------------------------------------------------------|
//! | Loss        | Drop a packet with probability `loss_prob`.            |
//! | Corruption  | With probability `corrupt_prob`, overwrite one field:  |
//! |             | `payload[0] = 'Z'` (75%), `seq` (12.5%), `ack` (12.5%).|
//! | Delay       | Arrive `1 + 9·U` after the later of now and the last   |
//! |             | arrival scheduled towards the same endpoint.           |
//!
//! Packets cross the link as their 32-byte wire encoding and are decoded on
//! arrival.  The delay rule means packets are never reordered.  All randomness comes
//! from a seeded ChaCha8 RNG, so a run is reproducible from its
//! [`ChannelConfig`].

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use log::{debug, trace, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::channel::{Channel, EndpointId};
use crate::config::{ChannelConfig, ConfigError, ProtocolConfig};
use crate::packet::{Message, Packet, SeqNum, PACKET_LEN};
use crate::sr_receiver::SrReceiver;
use crate::sr_sender::{SendError, SrSender};
use crate::stats::{ChannelStats, Report};
use crate::timer::{TimerMisuse, TimerSlot, TimerToken};

/// Value written into a header field by a corrupting channel.
const CORRUPT_FIELD: i32 = 999_999;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum EventKind {
    /// The built-in workload produces its next application message.
    Generate,
    Arrival { to: EndpointId, frame: [u8; PACKET_LEN] },
    TimerExpired { endpoint: EndpointId, token: TimerToken },
}

#[derive(Debug, Clone)]
struct Scheduled {
    at: f64,
    /// Insertion order; breaks ties between events due at the same time.
    order: u64,
    kind: EventKind,
}

// Min-heap on (at, order).
impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at
            .total_cmp(&self.at)
            .then_with(|| other.order.cmp(&self.order))
    }
}

fn slot(endpoint: EndpointId) -> usize {
    match endpoint {
        EndpointId::Sender => 0,
        EndpointId::Receiver => 1,
    }
}

// ---------------------------------------------------------------------------
// Network — the Channel the endpoints see
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Network {
    config: ChannelConfig,
    rng: ChaCha8Rng,
    now: f64,
    queue: BinaryHeap<Scheduled>,
    next_order: u64,
    /// Latest arrival time scheduled towards each endpoint.
    last_arrival: [f64; 2],
    timers: [TimerSlot; 2],
    delivered: Vec<Message>,
    stats: ChannelStats,
}

impl Network {
    fn new(config: ChannelConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self {
            config,
            rng,
            now: 0.0,
            queue: BinaryHeap::new(),
            next_order: 0,
            last_arrival: [0.0; 2],
            timers: [TimerSlot::new(), TimerSlot::new()],
            delivered: Vec::new(),
            stats: ChannelStats::default(),
        }
    }

    fn schedule(&mut self, at: f64, kind: EventKind) {
        let order = self.next_order;
        self.next_order += 1;
        self.queue.push(Scheduled { at, order, kind });
    }

    fn corrupt(&mut self, packet: &mut Packet) {
        let x: f64 = self.rng.gen();
        if x < 0.75 {
            packet.payload[0] = b'Z';
        } else if x < 0.875 {
            packet.seq = CORRUPT_FIELD;
        } else {
            packet.ack = CORRUPT_FIELD;
        }
    }
}

impl Channel for Network {
    fn to_network(&mut self, from: EndpointId, packet: Packet) {
        self.stats.to_network += 1;

        if self.rng.gen::<f64>() < self.config.loss_prob {
            self.stats.lost += 1;
            debug!("[chan] packet from {from} lost");
            return;
        }

        let mut packet = packet;
        if self.rng.gen::<f64>() < self.config.corrupt_prob {
            self.stats.corrupted += 1;
            self.corrupt(&mut packet);
            debug!("[chan] packet from {from} corrupted");
        }

        let to = from.peer();
        let after = self.now.max(self.last_arrival[slot(to)]);
        let at = after + 1.0 + 9.0 * self.rng.gen::<f64>();
        self.last_arrival[slot(to)] = at;
        trace!("[chan] packet {from} → {to} arrives at {at:.3}");
        self.schedule(
            at,
            EventKind::Arrival {
                to,
                frame: packet.encode(),
            },
        );
    }

    fn to_application(&mut self, at: EndpointId, message: Message) {
        trace!("[chan] message delivered at {at}");
        self.stats.to_application += 1;
        self.delivered.push(message);
    }

    fn start_timer(&mut self, endpoint: EndpointId, duration: f64) {
        let deadline = self.now + duration;
        match self.timers[slot(endpoint)].start(deadline) {
            Ok(token) => {
                self.schedule(deadline, EventKind::TimerExpired { endpoint, token });
            }
            Err(TimerMisuse::AlreadyArmed) => {
                self.stats.timer_warnings += 1;
                warn!("[chan] {endpoint} started a timer that is already running");
            }
        }
    }

    fn stop_timer(&mut self, endpoint: EndpointId) {
        if !self.timers[slot(endpoint)].stop() {
            trace!("[chan] {endpoint} stopped an idle timer");
        }
    }
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

/// A sender, a receiver and the lossy link between them.
#[derive(Debug)]
pub struct Simulator {
    sender: SrSender,
    receiver: SrReceiver,
    net: Network,
    /// Messages the sender accepted, in submission order.
    accepted: Vec<Message>,
    /// Messages produced so far by the built-in workload.
    generated: usize,
    workload_started: bool,
    /// Deliveries already handed out by [`Simulator::take_delivered`].
    taken: usize,
}

impl Simulator {
    /// Build a simulator with both endpoints initialised.
    ///
    /// The built-in workload of `channel.messages` messages is only started
    /// by [`Simulator::run`]; external submissions via
    /// [`Simulator::submit`] work either way.
    pub fn new(protocol: ProtocolConfig, channel: ChannelConfig) -> Result<Self, ConfigError> {
        protocol.validate()?;
        channel.validate()?;

        let mut sender = SrSender::new(protocol);
        let mut receiver = SrReceiver::new(protocol);
        sender.init();
        receiver.init();

        Ok(Self {
            sender,
            receiver,
            net: Network::new(channel),
            accepted: Vec::new(),
            generated: 0,
            workload_started: false,
            taken: 0,
        })
    }

    /// Current virtual time.
    pub fn now(&self) -> f64 {
        self.net.now
    }

    pub fn sender(&self) -> &SrSender {
        &self.sender
    }

    pub fn receiver(&self) -> &SrReceiver {
        &self.receiver
    }

    /// Messages the sender accepted so far.
    pub fn accepted(&self) -> &[Message] {
        &self.accepted
    }

    /// Every message delivered to the receiving application so far.
    pub fn delivered(&self) -> &[Message] {
        &self.net.delivered
    }

    /// Deliveries made since the previous call.
    pub fn take_delivered(&mut self) -> Vec<Message> {
        let fresh = self.net.delivered[self.taken..].to_vec();
        self.taken = self.net.delivered.len();
        fresh
    }

    /// `true` when no event is pending.
    pub fn is_idle(&self) -> bool {
        self.net.queue.is_empty()
    }

    /// Hand `message` to the sender at the current time.
    pub fn submit(&mut self, message: Message) -> Result<SeqNum, SendError> {
        let seq = self.sender.submit(&mut self.net, message)?;
        self.accepted.push(message);
        Ok(seq)
    }

    /// Run the built-in workload until nothing is left to do or
    /// `max_time` is reached.
    pub fn run(&mut self) -> Report {
        self.start_workload();
        self.run_until_idle();
        self.report()
    }

    /// Process every pending event, stopping early at `max_time`.
    pub fn run_until_idle(&mut self) {
        let limit = self.net.config.max_time;
        while self.step_before(limit) {}
    }

    /// Process every event due at or before `until`, then advance the clock
    /// to `until`.
    pub fn run_until(&mut self, until: f64) {
        let until = until.min(self.net.config.max_time);
        while self.step_before(until) {}
        if until > self.net.now {
            self.net.now = until;
        }
    }

    /// Snapshot of the counters and delivery outcome.
    pub fn report(&self) -> Report {
        let delivered = &self.net.delivered;
        let in_order = delivered.len() <= self.accepted.len()
            && delivered[..] == self.accepted[..delivered.len()];
        Report {
            end_time: self.net.now,
            accepted: self.accepted.len(),
            delivered: delivered.len(),
            in_order,
            sender: self.sender.stats,
            receiver: self.receiver.stats,
            channel: self.net.stats,
        }
    }

    fn start_workload(&mut self) {
        if self.workload_started {
            return;
        }
        self.workload_started = true;
        if self.net.config.messages > 0 {
            self.schedule_next_generate();
        }
    }

    fn schedule_next_generate(&mut self) {
        let gap = 2.0 * self.net.config.mean_interarrival * self.net.rng.gen::<f64>();
        let at = self.net.now + gap;
        self.net.schedule(at, EventKind::Generate);
    }

    /// Pop and dispatch the next event if it is due by `limit`.
    fn step_before(&mut self, limit: f64) -> bool {
        match self.net.queue.peek() {
            Some(ev) if ev.at <= limit => {}
            _ => return false,
        }
        let Some(ev) = self.net.queue.pop() else {
            return false;
        };
        self.net.now = ev.at;

        match ev.kind {
            EventKind::Generate => {
                let letter = b'a' + (self.generated % 26) as u8;
                self.generated += 1;
                trace!("[sim] t={:.3} application message {letter}", self.net.now);
                // A rejected message is counted by the sender and dropped.
                let _ = self.submit(Message::filled(letter));
                if self.generated < self.net.config.messages {
                    self.schedule_next_generate();
                }
            }
            EventKind::Arrival { to, frame } => {
                let packet = match Packet::decode(&frame) {
                    Ok(packet) => packet,
                    Err(e) => {
                        warn!("[chan] undecodable frame for {to} dropped: {e}");
                        return true;
                    }
                };
                match to {
                    EndpointId::Sender => {
                        self.sender.acknowledge(&mut self.net, &packet);
                    }
                    EndpointId::Receiver => {
                        self.receiver.accept(&mut self.net, &packet);
                    }
                }
            }
            EventKind::TimerExpired { endpoint, token } => {
                if self.net.timers[slot(endpoint)].fire(token) {
                    self.net.stats.timeouts += 1;
                    match endpoint {
                        EndpointId::Sender => self.sender.timeout(&mut self.net),
                        EndpointId::Receiver => self.receiver.timeout(&mut self.net),
                    }
                } else {
                    trace!("[sim] stale timer event for {endpoint} discarded");
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sim(channel: ChannelConfig) -> Simulator {
        Simulator::new(ProtocolConfig::default(), channel).unwrap()
    }

    #[test]
    fn perfect_channel_delivers_everything() {
        let mut s = sim(ChannelConfig {
            messages: 30,
            ..ChannelConfig::default()
        });
        let report = s.run();
        assert!(report.is_complete(), "{report}");
        assert_eq!(report.channel.lost, 0);
        assert_eq!(report.channel.corrupted, 0);
        assert_eq!(report.accepted as u64 + report.sender.window_full, 30);
        assert!(s.is_idle());
        assert!(!s.sender().has_unacked());
    }

    #[test]
    fn generated_messages_cycle_letters() {
        let mut s = sim(ChannelConfig {
            messages: 3,
            mean_interarrival: 1000.0,
            ..ChannelConfig::default()
        });
        s.run();
        let letters: Vec<u8> = s.delivered().iter().map(|m| m.data[0]).collect();
        assert_eq!(letters, b"abc");
    }

    #[test]
    fn same_seed_same_run() {
        let config = ChannelConfig {
            messages: 50,
            loss_prob: 0.2,
            corrupt_prob: 0.2,
            seed: 7,
            ..ChannelConfig::default()
        };
        let a = sim(config.clone()).run();
        let b = sim(config).run();
        assert_eq!(a, b);
    }

    #[test]
    fn external_submit_and_clock() {
        let mut s = sim(ChannelConfig::default());
        assert_eq!(s.submit(Message::filled(b'x')), Ok(0));
        s.run_until(5.0);
        assert_eq!(s.now(), 5.0);
        s.run_until_idle();
        assert_eq!(s.take_delivered(), vec![Message::filled(b'x')]);
        assert!(s.take_delivered().is_empty());
    }

    #[test]
    fn max_time_bounds_a_dead_link() {
        let mut s = sim(ChannelConfig {
            messages: 1,
            loss_prob: 1.0,
            max_time: 500.0,
            ..ChannelConfig::default()
        });
        let report = s.run();
        assert_eq!(report.delivered, 0);
        assert!(report.end_time <= 500.0);
        assert!(report.sender.packets_resent > 0);
        assert!(report.in_order);
    }

    #[test]
    fn endpoints_never_double_arm() {
        let report = sim(ChannelConfig {
            messages: 200,
            loss_prob: 0.3,
            corrupt_prob: 0.3,
            mean_interarrival: 5.0,
            seed: 42,
            ..ChannelConfig::default()
        })
        .run();
        assert_eq!(report.channel.timer_warnings, 0);
        assert!(report.is_complete(), "{report}");
    }

    #[test]
    fn invalid_config_rejected() {
        let bad = ChannelConfig {
            corrupt_prob: -0.1,
            ..ChannelConfig::default()
        };
        assert!(Simulator::new(ProtocolConfig::default(), bad).is_err());
    }

    #[test]
    fn corruption_survives_the_wire_encoding() {
        let report = sim(ChannelConfig {
            messages: 3,
            corrupt_prob: 1.0,
            max_time: 500.0,
            ..ChannelConfig::default()
        })
        .run();
        assert_eq!(report.delivered, 0);
        assert_eq!(report.receiver.packets_received, 0);
        assert!(report.receiver.corrupted > 0);
    }

    #[test]
    fn non_positive_max_time_rejected() {
        let result = Simulator::new(
            ProtocolConfig::default(),
            ChannelConfig {
                max_time: -1.0,
                ..ChannelConfig::default()
            },
        );
        assert!(matches!(result, Err(ConfigError::InvalidMaxTime(_))));
    }
}
