//! Console commands for the headless client.
//!
//! Commands:
//!   hold <dir>         - Press and hold a direction (up/down/left/right or w/a/s/d)
//!   release <dir>      - Release a held direction
//!   dpad <dx> <dy>     - Press the on-screen d-pad
//!   dpad off           - Release the d-pad
//!   say <message>      - Send a chat message
//!   zoom in|out        - Step the zoom level
//!   wheel <delta>      - Pointer wheel (positive zooms out)
//!   chat               - Toggle the chat panel
//!   collapse           - Toggle the collapsed chat panel
//!   resize <w> <h>     - Change the viewport size
//!   status             - Show client status
//!   quit               - Exit client

use crate::{
    camera::Viewport,
    input::{Direction, InputEvent, Key},
};

/// Parsed console command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Input events to feed the client, in order.
    Input(Vec<InputEvent>),
    Resize(Viewport),
    Status,
    Quit,
}

/// Parses one console line. Errors carry a usage message.
pub fn parse_command(line: &str) -> Result<Command, String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some((&head, args)) = tokens.split_first() else {
        return Err("empty command".to_string());
    };

    match head {
        "hold" | "release" => {
            let dir = args
                .first()
                .and_then(|s| Direction::parse(s))
                .ok_or_else(|| format!("Usage: {} <up|down|left|right>", head))?;
            let key = direction_key(dir);
            let event = if head == "hold" {
                InputEvent::KeyDown(key)
            } else {
                InputEvent::KeyUp(key)
            };
            Ok(Command::Input(vec![event]))
        }
        "dpad" => match args {
            ["off"] => Ok(Command::Input(vec![InputEvent::DPadRelease])),
            [dx, dy] => {
                let dx = parse_axis(dx)?;
                let dy = parse_axis(dy)?;
                Ok(Command::Input(vec![InputEvent::DPadPress { dx, dy }]))
            }
            _ => Err("Usage: dpad <dx> <dy> | dpad off".to_string()),
        },
        "say" => {
            if args.is_empty() {
                return Err("Usage: say <message>".to_string());
            }
            Ok(Command::Input(vec![
                InputEvent::FocusChat,
                InputEvent::ComposeText(args.join(" ")),
                InputEvent::KeyDown(Key::Enter),
                InputEvent::Blur,
            ]))
        }
        "zoom" => match args {
            ["in"] => Ok(Command::Input(vec![InputEvent::ZoomIn])),
            ["out"] => Ok(Command::Input(vec![InputEvent::ZoomOut])),
            _ => Err("Usage: zoom in|out".to_string()),
        },
        "wheel" => {
            let delta = args
                .first()
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|d| d.is_finite())
                .ok_or_else(|| "Usage: wheel <delta>".to_string())?;
            Ok(Command::Input(vec![InputEvent::Wheel(delta)]))
        }
        "chat" => Ok(Command::Input(vec![InputEvent::ToggleChat])),
        "collapse" => Ok(Command::Input(vec![InputEvent::ToggleChatCollapsed])),
        "resize" => match args {
            [w, h] => {
                let w: f64 = w.parse().map_err(|_| "Usage: resize <w> <h>".to_string())?;
                let h: f64 = h.parse().map_err(|_| "Usage: resize <w> <h>".to_string())?;
                if w <= 0.0 || h <= 0.0 {
                    return Err("viewport must have positive size".to_string());
                }
                Ok(Command::Resize(Viewport::new(w, h)))
            }
            _ => Err("Usage: resize <w> <h>".to_string()),
        },
        "status" => Ok(Command::Status),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(format!("Unknown command: {}", other)),
    }
}

fn direction_key(dir: Direction) -> Key {
    match dir {
        Direction::Up => Key::ArrowUp,
        Direction::Down => Key::ArrowDown,
        Direction::Left => Key::ArrowLeft,
        Direction::Right => Key::ArrowRight,
    }
}

fn parse_axis(s: &str) -> Result<i8, String> {
    match s.parse::<i8>() {
        Ok(v) if (-1..=1).contains(&v) => Ok(v),
        _ => Err(format!("axis must be -1, 0 or 1, got {}", s)),
    }
}
