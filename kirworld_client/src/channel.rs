//! Connection channel abstraction.
//!
//! The core treats the link to the authority as a bidirectional event
//! channel: outbound messages go through [`Channel::send`], inbound traffic
//! and lifecycle changes arrive as [`ChannelEvent`]s on a receiver owned by
//! the runtime loop.

use std::collections::VecDeque;

use kirworld_shared::net::{ClientMsg, ProtocolError, ServerMsg};
use thiserror::Error;
use tokio::sync::mpsc;

/// Inbound event from the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// Link is up. `resumed` is true when the transport restored the prior
    /// session, so no new join is needed.
    Connected { resumed: bool },
    Disconnected { reason: String },
    Message(ServerMsg),
    /// Transport gave up or was closed; no further events follow.
    Closed,
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel is not connected")]
    NotConnected,
    #[error("channel is closed")]
    Closed,
    #[error("encode failed: {0}")]
    Encode(#[from] ProtocolError),
}

/// Outbound side of the connection.
pub trait Channel {
    fn is_connected(&self) -> bool;

    /// Enqueues a message without blocking.
    fn send(&mut self, msg: ClientMsg) -> Result<(), ChannelError>;

    /// Releases the transport. Idempotent.
    fn close(&mut self);
}

impl<C: Channel + ?Sized> Channel for Box<C> {
    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn send(&mut self, msg: ClientMsg) -> Result<(), ChannelError> {
        (**self).send(msg)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// In-process channel that records what was sent.
///
/// The paired [`MemoryHandle`] injects inbound events the way a transport
/// would.
#[derive(Debug, Default)]
pub struct MemoryChannel {
    connected: bool,
    closed: bool,
    sent: VecDeque<ClientMsg>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel plus an inbound event pipe.
    pub fn with_events() -> (Self, MemoryHandle, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(), MemoryHandle { tx }, rx)
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected && !self.closed;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Messages sent so far, oldest first.
    pub fn sent(&self) -> impl Iterator<Item = &ClientMsg> {
        self.sent.iter()
    }

    /// Removes and returns everything sent so far.
    pub fn take_sent(&mut self) -> Vec<ClientMsg> {
        self.sent.drain(..).collect()
    }
}

impl Channel for MemoryChannel {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn send(&mut self, msg: ClientMsg) -> Result<(), ChannelError> {
        if self.closed {
            return Err(ChannelError::Closed);
        }
        if !self.connected {
            return Err(ChannelError::NotConnected);
        }
        kirworld_shared::net::encode(&msg)?;
        self.sent.push_back(msg);
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
        self.connected = false;
    }
}

/// Inbound side of a [`MemoryChannel`].
#[derive(Debug, Clone)]
pub struct MemoryHandle {
    tx: mpsc::UnboundedSender<ChannelEvent>,
}

impl MemoryHandle {
    /// Returns false once the receiving loop is gone.
    pub fn push(&self, event: ChannelEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}
