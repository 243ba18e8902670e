//! Standalone client binary.
//!
//! Usage:
//!   cargo run -p kirworld_client -- [--url ws://127.0.0.1:3000/ws] [--name Player]
//!                                   [--config client.json] [--send-ms 80]
//!
//! The client connects to the world authority, joins with a display name,
//! streams movement intent while a direction is held, and interpolates the
//! received snapshots. Set `RUST_LOG=kirworld_client=trace` to see where the
//! local player lands on screen each frame.
//!
//! Console commands:
//!   hold <dir> / release <dir> - Hold or release a direction
//!   dpad <dx> <dy> / dpad off  - On-screen d-pad
//!   say <message>              - Send chat message
//!   zoom in|out, wheel <delta> - Camera zoom
//!   chat, collapse             - Chat panel toggles
//!   resize <w> <h>             - Viewport size
//!   status                     - Show client status
//!   quit                       - Exit client

use std::env;
use std::io::{BufRead, Write};

use anyhow::Context;
use kirworld_client::{
    console::{parse_command, Command},
    render::TraceRenderer,
    runtime::{self, HostEvent, IntervalFrames},
    transport::{ReconnectPolicy, WsChannel},
    GameClient,
};
use kirworld_shared::config::ClientConfig;
use tokio::sync::{mpsc, oneshot};
use tracing::info;

#[derive(Default)]
struct Args {
    url: Option<String>,
    name: Option<String>,
    config: Option<String>,
    send_ms: Option<u64>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut out = Args::default();
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--url" if i + 1 < args.len() => {
                out.url = Some(args[i + 1].clone());
                i += 2;
            }
            "--name" if i + 1 < args.len() => {
                out.name = Some(args[i + 1].clone());
                i += 2;
            }
            "--config" if i + 1 < args.len() => {
                out.config = Some(args[i + 1].clone());
                i += 2;
            }
            "--send-ms" if i + 1 < args.len() => {
                let ms = args[i + 1]
                    .parse()
                    .with_context(|| format!("--send-ms {}", args[i + 1]))?;
                out.send_ms = Some(ms);
                i += 2;
            }
            _ => i += 1,
        }
    }
    Ok(out)
}

/// Defaults, then the config file, then the environment, then flags.
fn load_config(args: Args) -> anyhow::Result<ClientConfig> {
    let mut cfg = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("read {}", path))?;
            ClientConfig::load_json(&text)?
        }
        None => ClientConfig::default(),
    };
    cfg = cfg.with_env_overrides();
    if let Some(url) = args.url {
        cfg.server_url = url;
    }
    if let Some(name) = args.name {
        cfg.player_name = name;
    }
    if let Some(ms) = args.send_ms {
        cfg.send_interval_ms = ms;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn spawn_console(host_tx: mpsc::Sender<HostEvent>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("] ");
            let _ = stdout.flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let sent = match parse_command(line) {
                Ok(Command::Input(events)) => events
                    .into_iter()
                    .all(|ev| host_tx.blocking_send(HostEvent::Input(ev)).is_ok()),
                Ok(Command::Resize(viewport)) => {
                    host_tx.blocking_send(HostEvent::Resize(viewport)).is_ok()
                }
                Ok(Command::Status) => {
                    let (reply_tx, reply_rx) = oneshot::channel();
                    if host_tx.blocking_send(HostEvent::Status(reply_tx)).is_err() {
                        break;
                    }
                    match reply_rx.blocking_recv() {
                        Ok(lines) => {
                            for line in lines {
                                println!("{}", line);
                            }
                            true
                        }
                        Err(_) => false,
                    }
                }
                Ok(Command::Quit) => {
                    let _ = host_tx.blocking_send(HostEvent::Quit);
                    break;
                }
                Err(e) => {
                    println!("Error: {}", e);
                    true
                }
            };
            if !sent {
                break;
            }
        }
    });
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = load_config(parse_args()?).context("client config")?;
    info!(url = %cfg.server_url, name = %cfg.player_name, send_ms = cfg.send_interval_ms, "Starting client");

    let (channel, events) = WsChannel::open(cfg.server_url.clone(), ReconnectPolicy::from_config(&cfg));
    let mut client = GameClient::new(&cfg, channel).context("create client")?;

    let (host_tx, host_rx) = mpsc::channel(64);
    spawn_console(host_tx);

    println!("Client started. Type 'status' for info, 'quit' to exit.");
    println!();

    let mut renderer = TraceRenderer::default();
    let frames = IntervalFrames::new(cfg.frame_interval());
    let stats = runtime::run(&mut client, events, host_rx, frames, &mut renderer).await;
    client.channel_mut().closed().await;

    println!("Disconnected from server.");
    info!(
        frames = stats.frames,
        send_ticks = stats.send_ticks,
        moves = stats.moves_sent,
        "Client exited"
    );
    Ok(())
}
