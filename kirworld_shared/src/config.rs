//! Configuration system.
//!
//! Loads client configuration from JSON strings (file IO left to the app)
//! and overlays the endpoint from the environment.

use std::time::Duration;

use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chat::DEFAULT_CHAT_CAPACITY;

/// Environment variable naming the authority endpoint.
pub const WS_URL_ENV: &str = "KIRWORLD_WS_URL";

/// Root client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// WebSocket endpoint of the authority, e.g. `ws://127.0.0.1:3000/ws`.
    pub server_url: String,
    /// Display name sent with `join`.
    pub player_name: String,
    /// Intent transmitter period.
    pub send_interval_ms: u64,
    /// Fraction of the remaining gap closed per rendered frame.
    pub smoothing: f64,
    /// Frame rate of the headless frame source.
    pub frame_hz: u32,
    pub world_width: f64,
    pub world_height: f64,
    /// Player sprite edge length in world units.
    pub player_size: f64,
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Zoom change per zoom-in/zoom-out action.
    pub zoom_step: f64,
    /// Zoom change per pointer-wheel unit.
    pub wheel_sensitivity: f64,
    /// Retained chat messages.
    pub chat_capacity: usize,
    /// Consecutive failed connects before the transport gives up.
    pub reconnect_attempts: u32,
    pub reconnect_delay_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:3000/ws".to_string(),
            player_name: "Player".to_string(),
            send_interval_ms: 80,
            smoothing: 0.2,
            frame_hz: 60,
            world_width: 3200.0,
            world_height: 2400.0,
            player_size: 32.0,
            viewport_width: 1280.0,
            viewport_height: 720.0,
            min_zoom: 0.5,
            max_zoom: 2.0,
            zoom_step: 0.1,
            wheel_sensitivity: 0.001,
            chat_capacity: DEFAULT_CHAT_CAPACITY,
            reconnect_attempts: 5,
            reconnect_delay_ms: 1000,
        }
    }
}

impl ClientConfig {
    /// Parses config from JSON. Missing fields take their defaults.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Replaces the endpoint with `KIRWORLD_WS_URL` when it is set and non-empty.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(WS_URL_ENV) {
            let url = url.trim();
            if !url.is_empty() {
                debug!(var = WS_URL_ENV, url = %url, "Endpoint overridden from environment");
                self.server_url = url.to_string();
            }
        }
        self
    }

    pub fn send_interval(&self) -> Duration {
        Duration::from_millis(self.send_interval_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.frame_hz.max(1)))
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Rejects values the client loop cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(!self.server_url.trim().is_empty(), "server_url is empty");
        ensure!(
            self.smoothing > 0.0 && self.smoothing <= 1.0,
            "smoothing must be in (0, 1], got {}",
            self.smoothing
        );
        ensure!(self.send_interval_ms > 0, "send_interval_ms must be positive");
        ensure!(self.frame_hz > 0, "frame_hz must be positive");
        ensure!(
            self.min_zoom > 0.0 && self.min_zoom <= self.max_zoom,
            "zoom bounds invalid: [{}, {}]",
            self.min_zoom,
            self.max_zoom
        );
        ensure!(self.zoom_step > 0.0, "zoom_step must be positive");
        ensure!(self.chat_capacity > 0, "chat_capacity must be positive");
        ensure!(
            self.viewport_width > 0.0 && self.viewport_height > 0.0,
            "viewport must have positive size"
        );
        Ok(())
    }

    /// Parses and validates a JSON config document.
    pub fn load_json(s: &str) -> anyhow::Result<Self> {
        let cfg = Self::from_json_str(s).context("parse client config")?;
        cfg.validate().context("validate client config")?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_behaviour() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.send_interval(), Duration::from_millis(80));
        assert_eq!(cfg.smoothing, 0.2);
        assert_eq!(cfg.chat_capacity, 100);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg = ClientConfig::load_json(r#"{"server_url":"ws://example:9/ws","send_interval_ms":50}"#)
            .unwrap();
        assert_eq!(cfg.server_url, "ws://example:9/ws");
        assert_eq!(cfg.send_interval_ms, 50);
        assert_eq!(cfg.player_name, "Player");
        assert_eq!(cfg.max_zoom, 2.0);
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(ClientConfig::load_json(r#"{"smoothing":0.0}"#).is_err());
        assert!(ClientConfig::load_json(r#"{"smoothing":1.5}"#).is_err());
        assert!(ClientConfig::load_json(r#"{"min_zoom":3.0,"max_zoom":2.0}"#).is_err());
        assert!(ClientConfig::load_json(r#"{"send_interval_ms":0}"#).is_err());
        assert!(ClientConfig::load_json("not json").is_err());
    }

    #[test]
    fn frame_interval_from_hz() {
        let cfg = ClientConfig {
            frame_hz: 50,
            ..Default::default()
        };
        assert_eq!(cfg.frame_interval(), Duration::from_millis(20));
    }
}
