//! Concurrent session: a simulation running in a background tokio task.
//!
//! # Architecture
//!
//! ```text
//!  Application                              event_loop task
//!      │  submit(msg)  ──▶  submit_tx ──▶  ┌──────────────────────┐
//!      │                                   │  Simulator           │
//!      │  recv()       ◀──  deliver_rx ◀── │   ├── SrSender        │
//!      │                                   │   ├── SrReceiver      │
//!      ▼                                   │   └── lossy link      │
//!  SrSession                               └──────────▲───────────┘
//!                                                     │ tick: +1 time unit
//!                                              tokio::time::interval
//! ```
//!
//! The event loop multiplexes application submissions and a wall-clock tick
//! with `tokio::select!`.  Each tick advances the simulator's virtual clock
//! by one unit, so packets take real time to cross the link and timers fire
//! in real time.  The endpoints are still driven synchronously, one event at
//! a time, from the single task.
//!
//! A submission the sender rejects because its window is full is counted in
//! the final [`Report`] and dropped; the session does not queue it.
//!
//! ```ignore
//! let mut session = SrSession::spawn(protocol, channel, Duration::from_millis(1))?;
//! session.submit(Message::filled(b'a')).await?;
//! let first = session.recv().await;
//! let (rest, report) = session.close().await?;
//! ```

use std::time::Duration;

use log::debug;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::{ChannelConfig, ConfigError, ProtocolConfig};
use crate::packet::Message;
use crate::simulator::Simulator;
use crate::stats::Report;

const QUEUE_DEPTH: usize = 64;

/// Errors surfaced by [`SrSession`].
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session event loop has stopped")]
    Closed,

    #[error("session event loop failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

// ---------------------------------------------------------------------------
// SrSession — concurrent handle
// ---------------------------------------------------------------------------

/// Handle to a simulation running in the background.
pub struct SrSession {
    /// Messages for the sender.
    pub submit_tx: mpsc::Sender<Message>,

    /// Messages delivered to the receiving application, in order.
    pub deliver_rx: mpsc::Receiver<Message>,

    handle: JoinHandle<Report>,
}

impl SrSession {
    /// Start a simulation in a new task.
    ///
    /// `tick` is the wall-clock length of one virtual time unit and must be
    /// non-zero.  The
    /// built-in workload of `channel.messages` is not used; all traffic comes
    /// from [`SrSession::submit`].
    pub fn spawn(
        protocol: ProtocolConfig,
        channel: ChannelConfig,
        tick: Duration,
    ) -> Result<Self, ConfigError> {
        if tick.is_zero() {
            return Err(ConfigError::ZeroTick);
        }
        let sim = Simulator::new(protocol, channel)?;
        let (submit_tx, submit_rx) = mpsc::channel::<Message>(QUEUE_DEPTH);
        let (deliver_tx, deliver_rx) = mpsc::channel::<Message>(QUEUE_DEPTH);

        let handle = tokio::spawn(event_loop(sim, tick, submit_rx, deliver_tx));

        Ok(Self {
            submit_tx,
            deliver_rx,
            handle,
        })
    }

    /// Hand a message to the sender.
    pub async fn submit(&self, message: Message) -> Result<(), SessionError> {
        self.submit_tx
            .send(message)
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// Next message delivered at the receiver, or `None` once the session
    /// has finished.
    pub async fn recv(&mut self) -> Option<Message> {
        self.deliver_rx.recv().await
    }

    /// Stop accepting submissions, let the simulation run to quiescence and
    /// return the deliveries not yet received together with the final
    /// report.
    pub async fn close(self) -> Result<(Vec<Message>, Report), SessionError> {
        let Self {
            submit_tx,
            mut deliver_rx,
            handle,
        } = self;
        // Dropping submit_tx tells the event loop to wind down.
        drop(submit_tx);

        let mut rest = Vec::new();
        while let Some(message) = deliver_rx.recv().await {
            rest.push(message);
        }
        let report = handle.await?;
        Ok((rest, report))
    }
}

// ---------------------------------------------------------------------------
// Background event loop
// ---------------------------------------------------------------------------

async fn event_loop(
    mut sim: Simulator,
    tick: Duration,
    mut app_rx: mpsc::Receiver<Message>,
    app_tx: mpsc::Sender<Message>,
) -> Report {
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            // ── Branch 1: new message from the application ──────────────
            maybe_msg = app_rx.recv() => {
                match maybe_msg {
                    None => break,
                    Some(message) => {
                        if let Err(e) = sim.submit(message) {
                            debug!("[session] submission rejected: {e}");
                        }
                    }
                }
            }

            // ── Branch 2: one unit of virtual time ───────────────────────
            _ = ticker.tick() => {
                let until = sim.now() + 1.0;
                sim.run_until(until);
            }
        }

        if !forward(&mut sim, &app_tx).await {
            debug!("[session] delivery receiver dropped; stopping");
            return sim.report();
        }
    }

    // Application closed the submit queue: finish what is in flight.
    sim.run_until_idle();
    forward(&mut sim, &app_tx).await;
    let report = sim.report();
    debug!("[session] finished at t={:.3}", report.end_time);
    report
}

/// Push fresh deliveries to the application.  `false` once nobody listens.
async fn forward(sim: &mut Simulator, app_tx: &mpsc::Sender<Message>) -> bool {
    for message in sim.take_delivered() {
        if app_tx.send(message).await.is_err() {
            return false;
        }
    }
    true
}
