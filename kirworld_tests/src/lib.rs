//! `kirworld_tests`
//!
//! A scripted world authority for integration tests. It speaks the client's
//! WebSocket message contract and nothing more:
//! - `join` assigns `p1`, `p2`, ... and spawns the player at [`SPAWN`]
//! - every `move` shifts the sender by [`STEP`] per axis and broadcasts a
//!   full `players` snapshot
//! - `chat` is broadcast to every connection, sender included
//!
//! It is not a game server: no bounds, no collisions, no tick rate.

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use kirworld_shared::net::{
    decode, encode, ChatBroadcast, ClientMsg, EntityId, Identity, PlayerState, ServerMsg,
};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::{broadcast, watch},
    task::JoinHandle,
};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// Spawn position of every joining player.
pub const SPAWN: (f64, f64) = (100.0, 100.0);

/// Distance moved per received intent, per axis.
pub const STEP: f64 = 5.0;

/// Installs a test-writer subscriber once per test binary.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_test_writer()
        .try_init();
}

#[derive(Default)]
struct World {
    players: Vec<PlayerState>,
    received: Vec<ClientMsg>,
}

struct Shared {
    world: Mutex<World>,
    next_id: AtomicUsize,
    connections: AtomicUsize,
    clean_closes: AtomicUsize,
    updates: broadcast::Sender<ServerMsg>,
    kick: watch::Sender<u64>,
}

impl Shared {
    fn record(&self, msg: &ClientMsg) {
        if let Ok(mut world) = self.world.lock() {
            world.received.push(msg.clone());
        }
    }

    fn spawn(&self, name: &str) -> EntityId {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let id = EntityId::new(format!("p{}", n));
        if let Ok(mut world) = self.world.lock() {
            world
                .players
                .push(PlayerState::new(id.as_str(), name, SPAWN.0, SPAWN.1));
        }
        id
    }

    fn apply_move(&self, id: &EntityId, dx: i8, dy: i8) {
        if let Ok(mut world) = self.world.lock() {
            if let Some(p) = world.players.iter_mut().find(|p| &p.id == id) {
                p.x += f64::from(dx) * STEP;
                p.y += f64::from(dy) * STEP;
            }
        }
    }

    fn remove(&self, id: &EntityId) {
        if let Ok(mut world) = self.world.lock() {
            world.players.retain(|p| &p.id != id);
        }
    }

    fn name_of(&self, id: &EntityId) -> Option<String> {
        let world = self.world.lock().ok()?;
        world
            .players
            .iter()
            .find(|p| &p.id == id)
            .map(|p| p.name.clone())
    }

    fn broadcast_players(&self) {
        let players = match self.world.lock() {
            Ok(world) => world.players.clone(),
            Err(_) => return,
        };
        // No receivers is fine.
        let _ = self.updates.send(ServerMsg::Players(players));
    }
}

/// Handle to a running test authority. Dropping it stops accepting.
pub struct TestAuthority {
    addr: SocketAddr,
    shared: Arc<Shared>,
    task: JoinHandle<()>,
}

impl TestAuthority {
    /// Binds to an ephemeral loopback port and starts accepting.
    pub async fn bind() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind test authority")?;
        let addr = listener.local_addr()?;
        let (updates, _) = broadcast::channel(256);
        let (kick, _) = watch::channel(0u64);
        let shared = Arc::new(Shared {
            world: Mutex::new(World::default()),
            next_id: AtomicUsize::new(0),
            connections: AtomicUsize::new(0),
            clean_closes: AtomicUsize::new(0),
            updates,
            kick,
        });

        let accept_shared = Arc::clone(&shared);
        let task = tokio::spawn(async move {
            loop {
                let (stream, peer) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "Accept failed");
                        continue;
                    }
                };
                let shared = Arc::clone(&accept_shared);
                tokio::spawn(async move {
                    if let Err(e) = serve_connection(stream, shared).await {
                        debug!(peer = %peer, error = %e, "Connection ended with error");
                    }
                });
            }
        });

        info!(addr = %addr, "Test authority listening");
        Ok(Self { addr, shared, task })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Every well-formed client message received so far, in arrival order.
    pub fn received(&self) -> Vec<ClientMsg> {
        self.shared
            .world
            .lock()
            .map(|w| w.received.clone())
            .unwrap_or_default()
    }

    /// Current authoritative player list.
    pub fn players(&self) -> Vec<PlayerState> {
        self.shared
            .world
            .lock()
            .map(|w| w.players.clone())
            .unwrap_or_default()
    }

    /// Total connections accepted so far.
    pub fn connections(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }

    /// Connections the client ended with a Close frame.
    pub fn clean_closes(&self) -> usize {
        self.shared.clean_closes.load(Ordering::SeqCst)
    }

    /// Closes every open connection; new connections are still accepted.
    pub fn kick_all(&self) {
        self.shared.kick.send_modify(|n| *n += 1);
    }
}

impl Drop for TestAuthority {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve_connection(stream: TcpStream, shared: Arc<Shared>) -> anyhow::Result<()> {
    let socket = accept_async(stream).await.context("websocket handshake")?;
    shared.connections.fetch_add(1, Ordering::SeqCst);
    let (mut write, mut read) = socket.split();

    // Subscribe before anything is sent so no snapshot is missed.
    let mut updates = shared.updates.subscribe();
    let mut kick = shared.kick.subscribe();

    let mut me: Option<EntityId> = None;
    let result: anyhow::Result<()> = loop {
        tokio::select! {
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let msg = match decode::<ClientMsg>(text.as_str()) {
                        Ok(msg) => msg,
                        Err(e) => {
                            warn!(error = %e, "Ignoring malformed client frame");
                            continue;
                        }
                    };
                    shared.record(&msg);
                    match msg {
                        ClientMsg::Join(name) => {
                            if let Some(old) = me.take() {
                                shared.remove(&old);
                            }
                            let id = shared.spawn(&name);
                            let joined = encode(&ServerMsg::Joined(Identity { id: id.clone() }))?;
                            if let Err(e) = write.send(Message::Text(joined.into())).await {
                                break Err(e.into());
                            }
                            info!(id = %id, name = %name, "Player joined");
                            me = Some(id);
                            shared.broadcast_players();
                        }
                        ClientMsg::Move(intent) => {
                            if let Some(id) = &me {
                                shared.apply_move(id, intent.dx, intent.dy);
                                shared.broadcast_players();
                            }
                        }
                        ClientMsg::Chat(text) => {
                            if let Some(id) = &me {
                                let name = shared.name_of(id).unwrap_or_default();
                                let _ = shared.updates.send(ServerMsg::Chat(ChatBroadcast {
                                    id: id.clone(),
                                    name,
                                    text,
                                }));
                            }
                        }
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    shared.clean_closes.fetch_add(1, Ordering::SeqCst);
                    break Ok(());
                }
                None => break Ok(()),
                Some(Ok(_)) => {}
                Some(Err(e)) => break Err(e.into()),
            },
            update = updates.recv() => match update {
                Ok(msg) => {
                    let frame = encode(&msg)?;
                    if let Err(e) = write.send(Message::Text(frame.into())).await {
                        break Err(e.into());
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "Connection lagged behind updates");
                }
                Err(broadcast::error::RecvError::Closed) => break Ok(()),
            },
            changed = kick.changed() => {
                if changed.is_ok() {
                    debug!("Kicking connection");
                    let _ = write.send(Message::Close(None)).await;
                }
                break Ok(());
            }
        }
    };

    if let Some(id) = me {
        shared.remove(&id);
        shared.broadcast_players();
        info!(id = %id, "Player left");
    }
    result
}
