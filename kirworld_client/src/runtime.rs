//! Event loop.
//!
//! One cooperative loop multiplexes channel events, the send clock, the
//! host frame source and host events. Every resource the loop acquires
//! (clock, frame source, receivers) is a local released when `run` returns,
//! after the client has been shut down.

use async_trait::async_trait;
use tokio::{
    sync::{mpsc, oneshot},
    time::{self, Interval, MissedTickBehavior},
};
use tracing::{debug, info};

use crate::{
    camera::Viewport,
    channel::{Channel, ChannelEvent},
    client::{GameClient, SessionState},
    input::InputEvent,
    render::RenderBackend,
};

/// Event from the host application.
#[derive(Debug)]
pub enum HostEvent {
    Input(InputEvent),
    Resize(Viewport),
    /// Reply with the client's status lines.
    Status(oneshot::Sender<Vec<String>>),
    Quit,
}

/// Host frame scheduling.
///
/// A windowed host resolves `next_frame` from its vsync / redraw callback.
#[async_trait]
pub trait FrameSource: Send {
    async fn next_frame(&mut self);
}

/// Fixed-rate frames for headless hosts.
pub struct IntervalFrames {
    interval: Interval,
}

impl IntervalFrames {
    /// Must be called from within a tokio runtime.
    pub fn new(period: std::time::Duration) -> Self {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval }
    }
}

#[async_trait]
impl FrameSource for IntervalFrames {
    async fn next_frame(&mut self) {
        self.interval.tick().await;
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub frames: u64,
    pub send_ticks: u64,
    pub moves_sent: u64,
}

/// Drives `client` until the host quits, the host event stream ends, or
/// the transport closes. The client is shut down before returning.
pub async fn run<C, F, R>(
    client: &mut GameClient<C>,
    mut events: mpsc::UnboundedReceiver<ChannelEvent>,
    mut host: mpsc::Receiver<HostEvent>,
    mut frames: F,
    renderer: &mut R,
) -> RunStats
where
    C: Channel,
    F: FrameSource,
    R: RenderBackend,
{
    let mut send_clock = time::interval(client.transmitter().period());
    send_clock.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the first send happens one
    // period after start.
    send_clock.tick().await;

    let mut frame_count = 0u64;
    let mut events_open = true;

    info!(period = ?client.transmitter().period(), "Client loop started");

    while client.state() != SessionState::Closed {
        tokio::select! {
            ev = events.recv(), if events_open => match ev {
                Some(ev) => client.handle_channel_event(ev),
                None => {
                    events_open = false;
                    client.handle_channel_event(ChannelEvent::Closed);
                }
            },
            _ = send_clock.tick() => {
                let outcome = client.transmit_tick();
                debug!(?outcome, "Send tick");
            }
            _ = frames.next_frame() => {
                let view = client.frame();
                renderer.present(&view);
                frame_count += 1;
            }
            host_ev = host.recv() => match host_ev {
                Some(HostEvent::Input(input)) => client.handle_input(input),
                Some(HostEvent::Resize(viewport)) => client.resize(viewport),
                Some(HostEvent::Status(reply)) => {
                    let _ = reply.send(client.status_lines());
                }
                Some(HostEvent::Quit) | None => {
                    info!("Host requested exit");
                    break;
                }
            },
        }
    }

    client.shutdown();
    drop(send_clock);

    RunStats {
        frames: frame_count,
        send_ticks: client.transmitter().ticks(),
        moves_sent: client.transmitter().sent(),
    }
}
