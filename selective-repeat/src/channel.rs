//! The contract between the endpoints and their environment.
//!
//! Endpoints never touch the network, the application or a clock directly.
//! Every side effect goes through a [`Channel`], which the environment
//! implements: the discrete-event [`crate::simulator::Simulator`] in normal
//! runs, or a [`Recorder`] when driving an endpoint by hand.

use std::fmt;

use crate::packet::{Message, Packet};

/// Which endpoint is calling into the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointId {
    /// The data-originating side ("A").
    Sender,
    /// The data-consuming side ("B").
    Receiver,
}

impl EndpointId {
    /// The endpoint at the other end of the link.
    pub fn peer(self) -> Self {
        match self {
            Self::Sender => Self::Receiver,
            Self::Receiver => Self::Sender,
        }
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sender => write!(f, "A"),
            Self::Receiver => write!(f, "B"),
        }
    }
}

/// Services the environment provides to an endpoint.
///
/// Each endpoint owns at most one pending timer.  `start_timer` is only
/// valid once the previous timer has fired or been stopped; `stop_timer` on
/// an idle timer must be a harmless no-op.
pub trait Channel {
    /// Hand `packet` to the (possibly lossy) network towards the peer.
    fn to_network(&mut self, from: EndpointId, packet: Packet);

    /// Deliver a reassembled message to the local application.
    fn to_application(&mut self, at: EndpointId, message: Message);

    /// Arm the endpoint's single-shot timer for `duration` time units.
    fn start_timer(&mut self, endpoint: EndpointId, duration: f64);

    /// Cancel the endpoint's timer, if armed.
    fn stop_timer(&mut self, endpoint: EndpointId);
}

// ---------------------------------------------------------------------------
// Recorder
// ---------------------------------------------------------------------------

/// One side effect requested by an endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    ToNetwork(EndpointId, Packet),
    ToApplication(EndpointId, Message),
    StartTimer(EndpointId, f64),
    StopTimer(EndpointId),
}

/// A [`Channel`] that performs nothing and remembers everything.
///
/// Useful for stepping an endpoint through a hand-written scenario and
/// inspecting exactly what it asked the environment to do.
#[derive(Debug, Default)]
pub struct Recorder {
    pub actions: Vec<Action>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all recorded actions, leaving the recorder empty.
    pub fn drain(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.actions)
    }

    /// Packets sent to the network so far, in order.
    pub fn sent(&self) -> Vec<Packet> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                Action::ToNetwork(_, p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    /// Messages delivered to the application so far, in order.
    pub fn delivered(&self) -> Vec<Message> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                Action::ToApplication(_, m) => Some(*m),
                _ => None,
            })
            .collect()
    }

    /// Number of `start_timer` requests recorded.
    pub fn timer_starts(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a, Action::StartTimer(..)))
            .count()
    }
}

impl Channel for Recorder {
    fn to_network(&mut self, from: EndpointId, packet: Packet) {
        self.actions.push(Action::ToNetwork(from, packet));
    }

    fn to_application(&mut self, at: EndpointId, message: Message) {
        self.actions.push(Action::ToApplication(at, message));
    }

    fn start_timer(&mut self, endpoint: EndpointId, duration: f64) {
        self.actions.push(Action::StartTimer(endpoint, duration));
    }

    fn stop_timer(&mut self, endpoint: EndpointId) {
        self.actions.push(Action::StopTimer(endpoint));
    }
}
