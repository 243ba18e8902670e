//! `kirworld_client`
//!
//! Client-side systems:
//! - Connection management (WebSocket transport with reconnect)
//! - Input sampling and level-triggered intent transmission
//! - Snapshot reception and interpolation for every player
//! - Camera follow and zoom
//! - Chat overlay
//! - Rendering abstraction wiring

pub mod camera;
pub mod channel;
pub mod chat;
pub mod client;
pub mod console;
pub mod input;
pub mod interp;
pub mod receiver;
pub mod render;
pub mod runtime;
pub mod transmitter;
pub mod transport;

pub use client::GameClient;
