//! WebSocket transport.
//!
//! One IO task per channel owns the socket. It forwards decoded inbound
//! frames as [`ChannelEvent`]s and writes encoded outbound frames. When the
//! socket drops it reconnects after a jittered delay; each new socket is a
//! fresh session, so the orchestrator re-joins. After `max_attempts`
//! consecutive failed connects the task emits `Closed` and exits.
//!
//! Closing the channel drops the outbound sender: the task sends a Close
//! frame on the live socket and exits. If it has not finished within
//! [`CLOSE_GRACE`] it is aborted.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use futures_util::{SinkExt, StreamExt};
use kirworld_shared::{
    config::ClientConfig,
    net::{decode, encode, ClientMsg, ServerMsg},
};
use rand::Rng;
use tokio::{net::TcpStream, sync::mpsc, task::JoinHandle};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::channel::{Channel, ChannelError, ChannelEvent};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long a closing IO task may take to say goodbye before it is aborted.
pub const CLOSE_GRACE: Duration = Duration::from_millis(500);

/// Reconnect behaviour after the socket drops or a connect fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Consecutive failed connects before giving up.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl ReconnectPolicy {
    pub fn from_config(cfg: &ClientConfig) -> Self {
        Self {
            max_attempts: cfg.reconnect_attempts,
            delay: cfg.reconnect_delay(),
        }
    }

    /// Delay plus up to 25% random jitter.
    pub fn backoff(&self) -> Duration {
        let max_jitter = (self.delay.as_millis() / 4) as u64;
        let jitter = if max_jitter == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=max_jitter)
        };
        self.delay + Duration::from_millis(jitter)
    }
}

/// [`Channel`] over a WebSocket.
pub struct WsChannel {
    /// `None` once closed.
    outbound: Option<mpsc::UnboundedSender<String>>,
    connected: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
    closing: Option<JoinHandle<()>>,
}

impl WsChannel {
    /// Spawns the IO task and returns the channel with its event receiver.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(
        url: impl Into<String>,
        policy: ReconnectPolicy,
    ) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (ev_tx, ev_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(run_transport(
            url.into(),
            policy,
            out_rx,
            ev_tx,
            Arc::clone(&connected),
        ));
        (
            Self {
                outbound: Some(out_tx),
                connected,
                task: Some(task),
                closing: None,
            },
            ev_rx,
        )
    }

    /// Waits until the IO task started by [`Channel::close`] has finished,
    /// either after sending its Close frame or by being aborted.
    pub async fn closed(&mut self) {
        if let Some(closing) = self.closing.take() {
            let _ = closing.await;
        }
    }
}

impl Channel for WsChannel {
    fn is_connected(&self) -> bool {
        self.outbound.is_some() && self.connected.load(Ordering::Acquire)
    }

    fn send(&mut self, msg: ClientMsg) -> Result<(), ChannelError> {
        let outbound = self.outbound.as_ref().ok_or(ChannelError::Closed)?;
        if !self.connected.load(Ordering::Acquire) {
            return Err(ChannelError::NotConnected);
        }
        let frame = encode(&msg)?;
        outbound.send(frame).map_err(|_| ChannelError::Closed)
    }

    fn close(&mut self) {
        // The IO task sees the sender gone and closes the socket itself.
        self.outbound = None;
        self.connected.store(false, Ordering::Release);
        let Some(mut task) = self.task.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                self.closing = Some(handle.spawn(async move {
                    if tokio::time::timeout(CLOSE_GRACE, &mut task).await.is_err() {
                        warn!("Transport did not close in time, aborting");
                        task.abort();
                    }
                }));
            }
            Err(_) => task.abort(),
        }
        info!("Transport closed");
    }
}

impl Drop for WsChannel {
    fn drop(&mut self) {
        self.close();
    }
}

enum PumpEnd {
    /// Socket lost; reconnect.
    Lost(String),
    /// Nobody is listening for events anymore.
    ReceiverGone,
    /// Channel handle dropped.
    Shutdown,
}

async fn run_transport(
    url: String,
    policy: ReconnectPolicy,
    mut outbound: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<ChannelEvent>,
    connected: Arc<AtomicBool>,
) {
    let mut failures = 0u32;
    loop {
        info!(url = %url, attempt = failures + 1, "Connecting");
        let attempt = tokio::select! {
            attempt = connect_async(url.as_str()) => attempt,
            _ = handle_dropped(&mut outbound) => return,
        };
        match attempt {
            Ok((socket, _response)) => {
                failures = 0;
                // Frames queued for the previous socket belong to a dead session.
                while outbound.try_recv().is_ok() {}
                connected.store(true, Ordering::Release);
                info!(url = %url, "Connected");
                if events.send(ChannelEvent::Connected { resumed: false }).is_err() {
                    return;
                }

                let end = pump(socket, &mut outbound, &events).await;
                connected.store(false, Ordering::Release);
                match end {
                    PumpEnd::Lost(reason) => {
                        warn!(reason = %reason, "Connection lost");
                        if events.send(ChannelEvent::Disconnected { reason }).is_err() {
                            return;
                        }
                    }
                    PumpEnd::ReceiverGone | PumpEnd::Shutdown => return,
                }
            }
            Err(e) => {
                failures += 1;
                warn!(error = %e, attempt = failures, max = policy.max_attempts, "Connect failed");
                if failures >= policy.max_attempts {
                    error!(attempts = failures, "Giving up on transport");
                    let _ = events.send(ChannelEvent::Closed);
                    return;
                }
            }
        }
        tokio::select! {
            _ = tokio::time::sleep(policy.backoff()) => {}
            _ = handle_dropped(&mut outbound) => return,
        }
    }
}

/// Resolves once every outbound sender is gone. Frames arriving while no
/// socket is open are stale and discarded.
async fn handle_dropped(outbound: &mut mpsc::UnboundedReceiver<String>) {
    while outbound.recv().await.is_some() {}
}

async fn pump(
    socket: Socket,
    outbound: &mut mpsc::UnboundedReceiver<String>,
    events: &mpsc::UnboundedSender<ChannelEvent>,
) -> PumpEnd {
    let (mut write, mut read) = socket.split();
    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(text) => {
                    if let Err(e) = write.send(Message::Text(text.into())).await {
                        return PumpEnd::Lost(e.to_string());
                    }
                }
                None => {
                    debug!("Sending close frame");
                    if let Err(e) = write.send(Message::Close(None)).await {
                        debug!(error = %e, "Close frame not delivered");
                    }
                    return PumpEnd::Shutdown;
                }
            },
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => match decode::<ServerMsg>(text.as_str()) {
                    Ok(msg) => {
                        if events.send(ChannelEvent::Message(msg)).is_err() {
                            return PumpEnd::ReceiverGone;
                        }
                    }
                    Err(e) => warn!(error = %e, "Dropping malformed frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| f.reason.as_str().to_string())
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "closed by peer".to_string());
                    return PumpEnd::Lost(reason);
                }
                Some(Ok(Message::Binary(data))) => {
                    debug!(bytes = data.len(), "Ignoring binary frame");
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return PumpEnd::Lost(e.to_string()),
                None => return PumpEnd::Lost("stream ended".to_string()),
            },
        }
    }
}
