//! Intent transmitter.
//!
//! Samples the input state on a fixed clock. Every tick with a non-idle
//! vector on a live connection yields exactly one `move` message; the
//! authority applies each one as this tick's movement, so a held key keeps
//! producing a message per tick. Idle ticks and ticks while disconnected
//! produce nothing. No queueing or retry: a lost move is superseded by the
//! next tick.

use std::time::Duration;

use kirworld_shared::net::ClientMsg;
use tracing::trace;

use crate::input::InputSampler;

/// Outcome of one transmitter tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Sent,
    Idle,
    Offline,
}

/// Fixed-period move intent producer.
#[derive(Debug, Clone)]
pub struct IntentTransmitter {
    period: Duration,
    ticks: u64,
    sent: u64,
    dropped: u64,
}

impl IntentTransmitter {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            ticks: 0,
            sent: 0,
            dropped: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Runs one tick. Returns the message to emit, if any.
    pub fn tick(&mut self, input: &InputSampler, connected: bool) -> (TickOutcome, Option<ClientMsg>) {
        self.ticks += 1;
        if !connected {
            return (TickOutcome::Offline, None);
        }
        let intent = input.vector();
        if intent.is_idle() {
            return (TickOutcome::Idle, None);
        }
        trace!(tick = self.ticks, dx = intent.dx, dy = intent.dy, "Move intent");
        (TickOutcome::Sent, Some(ClientMsg::Move(intent)))
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Moves the channel accepted.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Moves emitted by `tick` that the channel refused.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn record_sent(&mut self) {
        self.sent += 1;
    }

    pub fn record_dropped(&mut self) {
        self.dropped += 1;
    }
}
