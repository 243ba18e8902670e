//! Client implementation.
//!
//! `GameClient` owns every client-side component and the connection:
//! - Input sampler fed by host keyboard / d-pad events
//! - Intent transmitter driven by the send clock
//! - Snapshot receiver fed by channel events
//! - Interpolator and camera driven by the frame clock
//! - Chat overlay
//!
//! All mutation happens from one loop; each handler reads the current
//! state when it runs, so a frame always sees the latest snapshot and
//! input.

use anyhow::Context;
use kirworld_shared::{
    config::ClientConfig,
    math::Vec2,
    net::{player_name, ClientMsg, EntityId, PlayerState},
};
use tracing::{debug, info, warn};

use crate::{
    camera::{Camera, Viewport, ZoomLimits},
    channel::{Channel, ChannelEvent},
    chat::ChatOverlay,
    input::{Focus, InputEvent, InputSampler, Key},
    interp::Interpolator,
    receiver::{Received, SnapshotReceiver},
    render::FrameView,
    transmitter::{IntentTransmitter, TickOutcome},
};

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the transport and the identity assignment.
    Connecting,
    /// Identity known, no snapshot seen yet.
    Joined,
    /// Receiving snapshots.
    Active,
    /// Transport dropped; world state is kept on screen.
    Reconnecting,
    /// Torn down. Terminal.
    Closed,
}

/// High-level game client.
pub struct GameClient<C: Channel> {
    channel: C,
    state: SessionState,
    player_name: String,

    input: InputSampler,
    focus: Focus,
    pointer_over_chat: bool,
    transmitter: IntentTransmitter,
    receiver: SnapshotReceiver,
    interp: Interpolator,
    camera: Camera,
    chat: ChatOverlay,

    viewport: Viewport,
    /// Camera focus before the local player is known.
    world_center: Vec2,
    /// Offset from a player's position to its sprite center.
    sprite_center: Vec2,
    frames: u64,
}

impl<C: Channel> GameClient<C> {
    /// Builds a client around an already opened channel.
    ///
    /// Fails when the config is invalid or the display name is empty.
    pub fn new(cfg: &ClientConfig, channel: C) -> anyhow::Result<Self> {
        cfg.validate()?;
        let name = player_name(&cfg.player_name).context("player name")?;
        let half = cfg.player_size / 2.0;

        Ok(Self {
            channel,
            state: SessionState::Connecting,
            player_name: name,
            input: InputSampler::new(),
            focus: Focus::World,
            pointer_over_chat: false,
            transmitter: IntentTransmitter::new(cfg.send_interval()),
            receiver: SnapshotReceiver::new(),
            interp: Interpolator::new(cfg.smoothing),
            camera: Camera::new(ZoomLimits::from_config(cfg)),
            chat: ChatOverlay::new(cfg.chat_capacity),
            viewport: Viewport::new(cfg.viewport_width, cfg.viewport_height),
            world_center: Vec2::new(cfg.world_width / 2.0, cfg.world_height / 2.0),
            sprite_center: Vec2::new(half, half),
            frames: 0,
        })
    }

    // ─── Channel events ───

    pub fn handle_channel_event(&mut self, event: ChannelEvent) {
        if self.state == SessionState::Closed {
            debug!(?event, "Event after close ignored");
            return;
        }
        match event {
            ChannelEvent::Connected { resumed } => self.on_connected(resumed),
            ChannelEvent::Disconnected { reason } => self.on_disconnected(&reason),
            ChannelEvent::Message(msg) => self.on_message(msg),
            ChannelEvent::Closed => {
                info!("Transport closed the channel");
                self.shutdown();
            }
        }
    }

    fn on_connected(&mut self, resumed: bool) {
        match self.state {
            SessionState::Connecting => self.send_join(),
            SessionState::Reconnecting => {
                if resumed {
                    info!("Session resumed");
                } else {
                    // Fresh session: the authority has forgotten us.
                    self.camera.reset();
                    self.send_join();
                }
                self.state = SessionState::Active;
            }
            SessionState::Joined | SessionState::Active => {
                if !resumed {
                    self.send_join();
                }
            }
            SessionState::Closed => {}
        }
    }

    fn on_disconnected(&mut self, reason: &str) {
        match self.state {
            SessionState::Joined | SessionState::Active => {
                warn!(reason = %reason, "Disconnected, keeping world state");
                self.state = SessionState::Reconnecting;
            }
            _ => debug!(reason = %reason, state = ?self.state, "Disconnected"),
        }
    }

    fn on_message(&mut self, msg: kirworld_shared::net::ServerMsg) {
        match self.receiver.apply(msg) {
            Received::Identity { id, changed } => {
                if self.state == SessionState::Connecting {
                    info!(id = %id, name = %self.player_name, "Joined");
                    self.state = SessionState::Joined;
                } else if changed {
                    info!(id = %id, "Rejoined with new identity");
                }
            }
            Received::Snapshot { .. } => {
                if self.state == SessionState::Joined {
                    self.state = SessionState::Active;
                }
            }
            Received::Chat(msg) => {
                debug!(from = %msg.sender_name, "Chat received");
                self.chat.push(msg);
            }
        }
    }

    fn send_join(&mut self) {
        match self.channel.send(ClientMsg::Join(self.player_name.clone())) {
            Ok(()) => info!(name = %self.player_name, "Join sent"),
            Err(e) => warn!(error = %e, "Join not sent"),
        }
    }

    // ─── Host input ───

    pub fn handle_input(&mut self, event: InputEvent) {
        if self.state == SessionState::Closed {
            return;
        }
        match event {
            InputEvent::KeyDown(key) => self.key_down(key),
            InputEvent::KeyUp(key) => {
                if !self.focus.is_text_entry() {
                    if let Some(dir) = key.direction() {
                        self.input.set_intent(dir, false);
                    }
                }
            }
            InputEvent::DPadPress { dx, dy } => self.input.press_dpad(dx, dy),
            InputEvent::DPadRelease => self.input.clear(),
            InputEvent::ZoomIn => {
                if !self.pointer_over_chat {
                    self.camera.zoom_in();
                }
            }
            InputEvent::ZoomOut => {
                if !self.pointer_over_chat {
                    self.camera.zoom_out();
                }
            }
            InputEvent::Wheel(delta) => {
                if !self.pointer_over_chat {
                    self.camera.wheel(delta);
                }
            }
            InputEvent::PointerOverChat(over) => self.pointer_over_chat = over,
            InputEvent::ToggleChat => {
                self.chat.toggle_open();
                self.sync_focus();
            }
            InputEvent::ToggleChatCollapsed => {
                self.chat.toggle_collapsed();
                self.sync_focus();
            }
            InputEvent::FocusChat => self.focus_chat(),
            InputEvent::Blur => {
                self.chat.blur();
                self.focus = Focus::World;
            }
            InputEvent::ComposeText(text) => {
                if self.focus.is_text_entry() {
                    self.chat.type_text(&text);
                }
            }
        }
    }

    fn key_down(&mut self, key: Key) {
        if self.focus.is_text_entry() {
            match key {
                Key::Char(c) => {
                    let mut buf = [0u8; 4];
                    self.chat.type_text(c.encode_utf8(&mut buf));
                }
                Key::Backspace => self.chat.backspace(),
                Key::Enter => self.submit_chat(),
                Key::Escape => {
                    self.chat.blur();
                    self.focus = Focus::World;
                }
                _ => {}
            }
            return;
        }

        if let Some(dir) = key.direction() {
            self.input.set_intent(dir, true);
        } else if matches!(key, Key::Char(c) if c.eq_ignore_ascii_case(&'c')) {
            self.focus_chat();
        }
    }

    fn focus_chat(&mut self) {
        self.chat.focus_compose();
        self.focus = Focus::ChatCompose;
        // Releases are not seen while typing.
        self.input.clear();
    }

    fn sync_focus(&mut self) {
        if !self.chat.is_compose_focused() {
            self.focus = Focus::World;
        }
    }

    /// The compose buffer is only cleared once the channel took the message.
    fn submit_chat(&mut self) {
        let text = match self.chat.outgoing() {
            Ok(text) => text,
            Err(e) => {
                debug!(error = %e, "Chat rejected locally");
                return;
            }
        };
        match self.channel.send(ClientMsg::Chat(text)) {
            Ok(()) => {
                self.chat.clear_compose();
                debug!("Chat sent");
            }
            Err(e) => warn!(error = %e, "Chat not sent, kept in compose"),
        }
    }

    // ─── Clocks ───

    /// One send-clock tick.
    pub fn transmit_tick(&mut self) -> TickOutcome {
        let live = self.state != SessionState::Closed && self.channel.is_connected();
        let (outcome, msg) = self.transmitter.tick(&self.input, live);
        if let Some(msg) = msg {
            match self.channel.send(msg) {
                Ok(()) => self.transmitter.record_sent(),
                Err(e) => {
                    self.transmitter.record_dropped();
                    debug!(error = %e, "Move dropped");
                    return TickOutcome::Offline;
                }
            }
        }
        outcome
    }

    /// One render frame: advance interpolation and derive the view.
    pub fn frame(&mut self) -> FrameView {
        self.frames += 1;
        let entities = self
            .interp
            .step(self.receiver.players(), self.receiver.local_id());
        let focus = entities
            .iter()
            .find(|e| e.is_local)
            .map(|e| e.display + self.sprite_center)
            .unwrap_or(self.world_center);
        FrameView {
            transform: self.camera.transform(focus, self.viewport),
            entities,
        }
    }

    pub fn resize(&mut self, viewport: Viewport) {
        if viewport.width > 0.0 && viewport.height > 0.0 {
            self.viewport = viewport;
        }
    }

    /// Stops sending, closes the channel and drops display state. Idempotent.
    pub fn shutdown(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.channel.close();
        self.input.clear();
        self.interp.clear();
        self.state = SessionState::Closed;
        info!(frames = self.frames, moves = self.transmitter.sent(), "Client closed");
    }

    // ─── Accessors ───

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn player_name(&self) -> &str {
        &self.player_name
    }

    pub fn local_id(&self) -> Option<&EntityId> {
        self.receiver.local_id()
    }

    pub fn players(&self) -> &[PlayerState] {
        self.receiver.players()
    }

    pub fn input(&self) -> &InputSampler {
        &self.input
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn chat(&self) -> &ChatOverlay {
        &self.chat
    }

    pub fn transmitter(&self) -> &IntentTransmitter {
        &self.transmitter
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Human-readable status for the console.
    pub fn status_lines(&self) -> Vec<String> {
        let mut out = Vec::new();
        out.push(format!("State: {:?}", self.state));
        out.push(format!("Name: {}", self.player_name));
        match self.receiver.local_id() {
            Some(id) => out.push(format!("Entity ID: {}", id)),
            None => out.push("Entity ID: (unassigned)".to_string()),
        }
        if let Some(me) = self.receiver.local_player() {
            out.push(format!("Position: ({:.1}, {:.1})", me.x, me.y));
        }
        out.push(format!("Connected: {}", self.channel.is_connected()));
        out.push(format!("Players: {}", self.receiver.players().len()));
        out.push(format!("Snapshots: {}", self.receiver.snapshots()));
        let v = self.input.vector();
        out.push(format!("Intent: ({}, {})", v.dx, v.dy));
        out.push(format!(
            "Moves sent: {} / {} ticks ({} dropped)",
            self.transmitter.sent(),
            self.transmitter.ticks(),
            self.transmitter.dropped()
        ));
        out.push(format!("Zoom: {:.2}", self.camera.zoom()));
        out.push(format!("Frames: {}", self.frames));
        out.push(format!("Chat messages: {}", self.chat.log().len()));
        for msg in self.chat.log().recent(5) {
            let own = if msg.is_from(self.receiver.local_id()) { " (you)" } else { "" };
            out.push(format!(
                "  [{}] {}{}: {}",
                msg.received_at.format("%H:%M:%S"),
                msg.sender_name,
                own,
                msg.text
            ));
        }
        out
    }
}

impl<C: Channel> Drop for GameClient<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        channel::{ChannelError, MemoryChannel},
        input::Direction,
    };
    use kirworld_shared::net::{ChatBroadcast, Identity, MoveIntent, ServerMsg};

    fn client() -> GameClient<MemoryChannel> {
        let cfg = ClientConfig {
            player_name: "Ann".into(),
            ..Default::default()
        };
        GameClient::new(&cfg, MemoryChannel::new()).unwrap()
    }

    fn connect(c: &mut GameClient<MemoryChannel>) {
        c.channel_mut().set_connected(true);
        c.handle_channel_event(ChannelEvent::Connected { resumed: false });
    }

    fn joined(c: &mut GameClient<MemoryChannel>, id: &str) {
        c.handle_channel_event(ChannelEvent::Message(ServerMsg::Joined(Identity {
            id: id.into(),
        })));
    }

    fn players(c: &mut GameClient<MemoryChannel>, list: Vec<PlayerState>) {
        c.handle_channel_event(ChannelEvent::Message(ServerMsg::Players(list)));
    }

    #[test]
    fn empty_name_rejected() {
        let cfg = ClientConfig {
            player_name: "   ".into(),
            ..Default::default()
        };
        assert!(GameClient::new(&cfg, MemoryChannel::new()).is_err());
    }

    #[test]
    fn lifecycle_connecting_joined_active() {
        let mut c = client();
        assert_eq!(c.state(), SessionState::Connecting);
        connect(&mut c);
        assert_eq!(
            c.channel_mut().take_sent(),
            vec![ClientMsg::Join("Ann".into())]
        );
        joined(&mut c, "p1");
        assert_eq!(c.state(), SessionState::Joined);
        players(&mut c, vec![PlayerState::new("p1", "Ann", 1.0, 1.0)]);
        assert_eq!(c.state(), SessionState::Active);
    }

    #[test]
    fn disconnect_keeps_world_and_resumed_reconnect_skips_join() {
        let mut c = client();
        connect(&mut c);
        joined(&mut c, "p1");
        players(&mut c, vec![PlayerState::new("p1", "Ann", 1.0, 1.0)]);
        c.channel_mut().take_sent();

        c.channel_mut().set_connected(false);
        c.handle_channel_event(ChannelEvent::Disconnected {
            reason: "timeout".into(),
        });
        assert_eq!(c.state(), SessionState::Reconnecting);
        assert_eq!(c.players().len(), 1);
        assert_eq!(c.frame().entities.len(), 1);

        c.channel_mut().set_connected(true);
        c.handle_channel_event(ChannelEvent::Connected { resumed: true });
        assert_eq!(c.state(), SessionState::Active);
        assert!(c.channel_mut().take_sent().is_empty());
    }

    #[test]
    fn fresh_reconnect_rejoins_and_resets_zoom() {
        let mut c = client();
        connect(&mut c);
        joined(&mut c, "p1");
        c.handle_input(InputEvent::ZoomIn);
        assert!(c.camera().zoom() > 1.0);
        c.channel_mut().take_sent();

        c.channel_mut().set_connected(false);
        c.handle_channel_event(ChannelEvent::Disconnected { reason: "x".into() });
        c.channel_mut().set_connected(true);
        c.handle_channel_event(ChannelEvent::Connected { resumed: false });

        assert_eq!(c.state(), SessionState::Active);
        assert_eq!(c.camera().zoom(), 1.0);
        assert_eq!(
            c.channel_mut().take_sent(),
            vec![ClientMsg::Join("Ann".into())]
        );
    }

    #[test]
    fn transmitter_silent_while_disconnected() {
        let mut c = client();
        connect(&mut c);
        c.channel_mut().take_sent();
        c.handle_input(InputEvent::KeyDown(Key::Char('d')));

        assert_eq!(c.transmit_tick(), TickOutcome::Sent);
        c.channel_mut().set_connected(false);
        assert_eq!(c.transmit_tick(), TickOutcome::Offline);
        assert_eq!(
            c.channel_mut().take_sent(),
            vec![ClientMsg::Move(MoveIntent { dx: 1, dy: 0 })]
        );
    }

    /// Reports a live link but refuses every send, as when the socket drops
    /// between the connectivity check and the enqueue.
    struct RefusingChannel;

    impl Channel for RefusingChannel {
        fn is_connected(&self) -> bool {
            true
        }

        fn send(&mut self, _msg: ClientMsg) -> Result<(), ChannelError> {
            Err(ChannelError::NotConnected)
        }

        fn close(&mut self) {}
    }

    #[test]
    fn refused_move_not_counted_as_sent() {
        let cfg = ClientConfig {
            player_name: "Ann".into(),
            ..Default::default()
        };
        let mut c = GameClient::new(&cfg, RefusingChannel).unwrap();
        c.handle_input(InputEvent::KeyDown(Key::ArrowUp));
        assert_eq!(c.transmit_tick(), TickOutcome::Offline);
        assert_eq!(c.transmitter().sent(), 0);
        assert_eq!(c.transmitter().dropped(), 1);
        assert!(c
            .status_lines()
            .iter()
            .any(|l| l == "Moves sent: 0 / 1 ticks (1 dropped)"));
    }

    #[test]
    fn typing_in_chat_does_not_move() {
        let mut c = client();
        connect(&mut c);
        c.channel_mut().take_sent();

        c.handle_input(InputEvent::KeyDown(Key::Char('w')));
        assert_eq!(c.input().vector(), MoveIntent { dx: 0, dy: -1 });

        c.handle_input(InputEvent::KeyDown(Key::Char('c')));
        assert_eq!(c.focus(), Focus::ChatCompose);
        assert!(c.input().vector().is_idle());

        for ch in "wasd".chars() {
            c.handle_input(InputEvent::KeyDown(Key::Char(ch)));
        }
        c.handle_input(InputEvent::KeyDown(Key::ArrowLeft));
        assert!(c.input().vector().is_idle());
        assert_eq!(c.chat().compose(), "wasd");

        c.handle_input(InputEvent::KeyDown(Key::Enter));
        assert_eq!(
            c.channel_mut().take_sent(),
            vec![ClientMsg::Chat("wasd".into())]
        );
        assert_eq!(c.chat().compose(), "");

        c.handle_input(InputEvent::KeyDown(Key::Escape));
        assert_eq!(c.focus(), Focus::World);
        c.handle_input(InputEvent::KeyDown(Key::ArrowLeft));
        assert_eq!(c.input().vector().dx, -1);
    }

    #[test]
    fn blank_chat_never_sent() {
        let mut c = client();
        connect(&mut c);
        c.channel_mut().take_sent();
        c.handle_input(InputEvent::FocusChat);
        c.handle_input(InputEvent::ComposeText("    ".into()));
        c.handle_input(InputEvent::KeyDown(Key::Enter));
        assert!(c.channel_mut().take_sent().is_empty());
    }

    #[test]
    fn chat_kept_when_send_fails() {
        let mut c = client();
        connect(&mut c);
        joined(&mut c, "p1");
        c.channel_mut().take_sent();

        c.channel_mut().set_connected(false);
        c.handle_channel_event(ChannelEvent::Disconnected { reason: "x".into() });
        c.handle_input(InputEvent::FocusChat);
        c.handle_input(InputEvent::ComposeText("important".into()));
        c.handle_input(InputEvent::KeyDown(Key::Enter));
        assert_eq!(c.chat().compose(), "important");
        assert!(c.channel_mut().take_sent().is_empty());

        c.channel_mut().set_connected(true);
        c.handle_channel_event(ChannelEvent::Connected { resumed: true });
        c.handle_input(InputEvent::KeyDown(Key::Enter));
        assert_eq!(
            c.channel_mut().take_sent(),
            vec![ClientMsg::Chat("important".into())]
        );
        assert_eq!(c.chat().compose(), "");
    }

    #[test]
    fn zoom_suppressed_over_chat() {
        let mut c = client();
        c.handle_input(InputEvent::PointerOverChat(true));
        c.handle_input(InputEvent::Wheel(-500.0));
        c.handle_input(InputEvent::ZoomIn);
        assert_eq!(c.camera().zoom(), 1.0);
        c.handle_input(InputEvent::PointerOverChat(false));
        c.handle_input(InputEvent::Wheel(-500.0));
        assert!((c.camera().zoom() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn camera_centers_world_before_join() {
        let mut c = client();
        let view = c.frame();
        let center = Viewport::new(1280.0, 720.0).center();
        assert_eq!(view.transform.world_to_screen(Vec2::new(1600.0, 1200.0)), center);
    }

    #[test]
    fn camera_follows_local_sprite_center() {
        let mut c = client();
        connect(&mut c);
        joined(&mut c, "p1");
        players(
            &mut c,
            vec![
                PlayerState::new("p2", "Bo", 0.0, 0.0),
                PlayerState::new("p1", "Ann", 500.0, 300.0),
            ],
        );
        let view = c.frame();
        let me = view.local().unwrap();
        assert_eq!(me.id.as_str(), "p1");
        let sprite_center = me.display + Vec2::new(16.0, 16.0);
        assert_eq!(
            view.transform.world_to_screen(sprite_center),
            Viewport::new(1280.0, 720.0).center()
        );
    }

    #[test]
    fn chat_broadcast_lands_in_log() {
        let mut c = client();
        connect(&mut c);
        c.handle_channel_event(ChannelEvent::Message(ServerMsg::Chat(ChatBroadcast {
            id: "p2".into(),
            name: "Bo".into(),
            text: "hello".into(),
        })));
        assert_eq!(c.chat().log().latest().unwrap().text, "hello");
    }

    #[test]
    fn shutdown_is_terminal() {
        let mut c = client();
        connect(&mut c);
        c.handle_input(InputEvent::KeyDown(Key::Char('s')));
        c.shutdown();
        assert_eq!(c.state(), SessionState::Closed);
        assert!(c.channel().is_closed());
        assert_eq!(c.transmit_tick(), TickOutcome::Offline);

        joined(&mut c, "p1");
        assert!(c.local_id().is_none());
        c.handle_input(InputEvent::KeyDown(Key::Char('s')));
        assert!(!c.input().is_held(Direction::Down));
    }

    #[test]
    fn status_mentions_state() {
        let c = client();
        let lines = c.status_lines();
        assert_eq!(lines[0], "State: Connecting");
        assert!(lines.iter().any(|l| l == "Entity ID: (unassigned)"));
        assert!(!lines.iter().any(|l| l.starts_with("Position:")));
    }

    #[test]
    fn status_shows_authoritative_position() {
        let mut c = client();
        connect(&mut c);
        joined(&mut c, "p1");
        assert!(!c.status_lines().iter().any(|l| l.starts_with("Position:")));

        players(
            &mut c,
            vec![
                PlayerState::new("p2", "Bo", 5.0, 5.0),
                PlayerState::new("p1", "Ann", 120.0, 87.5),
            ],
        );
        assert!(c.status_lines().iter().any(|l| l == "Position: (120.0, 87.5)"));
    }
}
