//! Single-shot retransmission timer bookkeeping for the simulator.
//!
//! Each endpoint owns exactly one [`TimerSlot`].  Arming produces a
//! [`TimerToken`] that the simulator attaches to the scheduled expiry event;
//! when the event comes due, [`TimerSlot::fire`] only honours it if the token
//! is still current.  Cancelling or re-arming bumps the generation, so a
//! stale expiry already sitting in the event queue is discarded instead of
//! reaching the endpoint.

/// Identifies one arming of a [`TimerSlot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerToken(u64);

/// Why a timer request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMisuse {
    /// `start` while a timer is already pending.
    AlreadyArmed,
}

/// One endpoint's timer: idle, or armed with a deadline.
#[derive(Debug, Default)]
pub struct TimerSlot {
    armed: Option<(TimerToken, f64)>,
    generation: u64,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Deadline of the pending timer, if any.
    pub fn deadline(&self) -> Option<f64> {
        self.armed.map(|(_, at)| at)
    }

    /// Arm the timer to expire at `deadline`.
    pub fn start(&mut self, deadline: f64) -> Result<TimerToken, TimerMisuse> {
        if self.armed.is_some() {
            return Err(TimerMisuse::AlreadyArmed);
        }
        self.generation += 1;
        let token = TimerToken(self.generation);
        self.armed = Some((token, deadline));
        Ok(token)
    }

    /// Cancel the pending timer.  Returns `false` if nothing was armed.
    pub fn stop(&mut self) -> bool {
        self.armed.take().is_some()
    }

    /// Consume an expiry event.  Returns `true` if it belongs to the pending
    /// timer, which then becomes idle.
    pub fn fire(&mut self, token: TimerToken) -> bool {
        match self.armed {
            Some((current, _)) if current == token => {
                self.armed = None;
                true
            }
            _ => false,
        }
    }
}
