//! Input handling.
//!
//! Keyboard and on-screen d-pad events both write one set of held
//! directions. The combined intent is derived when sampled, not when the
//! event arrives, so opposite directions held together cancel out.

use bitflags::bitflags;
use kirworld_shared::net::MoveIntent;

bitflags! {
    /// Currently held directions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Held: u8 {
        const UP = 1 << 0;
        const DOWN = 1 << 1;
        const LEFT = 1 << 2;
        const RIGHT = 1 << 3;
    }
}

/// Logical movement direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    fn flag(self) -> Held {
        match self {
            Direction::Up => Held::UP,
            Direction::Down => Held::DOWN,
            Direction::Left => Held::LEFT,
            Direction::Right => Held::RIGHT,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "up" | "w" => Some(Direction::Up),
            "down" | "s" => Some(Direction::Down),
            "left" | "a" => Some(Direction::Left),
            "right" | "d" => Some(Direction::Right),
            _ => None,
        }
    }
}

/// Keys the client reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Enter,
    Backspace,
    Escape,
}

impl Key {
    /// Movement direction bound to this key (WASD and arrows).
    pub fn direction(self) -> Option<Direction> {
        match self {
            Key::ArrowUp => Some(Direction::Up),
            Key::ArrowDown => Some(Direction::Down),
            Key::ArrowLeft => Some(Direction::Left),
            Key::ArrowRight => Some(Direction::Right),
            Key::Char(c) => match c.to_ascii_lowercase() {
                'w' => Some(Direction::Up),
                's' => Some(Direction::Down),
                'a' => Some(Direction::Left),
                'd' => Some(Direction::Right),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Where keyboard input is currently routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    World,
    ChatCompose,
}

impl Focus {
    pub fn is_text_entry(self) -> bool {
        matches!(self, Focus::ChatCompose)
    }
}

/// Raw host input.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    KeyDown(Key),
    KeyUp(Key),
    /// D-pad button pressed; each axis in {-1, 0, 1}.
    DPadPress { dx: i8, dy: i8 },
    DPadRelease,
    ZoomIn,
    ZoomOut,
    /// Pointer wheel delta; positive scrolls down (zooms out).
    Wheel(f64),
    PointerOverChat(bool),
    /// Toggle the chat panel open/closed.
    ToggleChat,
    /// Toggle the expanded/collapsed chat panel.
    ToggleChatCollapsed,
    /// Move focus into the chat compose field.
    FocusChat,
    /// Move focus back to the world.
    Blur,
    /// Text inserted into the focused compose field (paste, IME commit).
    ComposeText(String),
}

/// Held-direction state shared by keyboard and d-pad.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputSampler {
    held: Held,
}

impl InputSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_intent(&mut self, dir: Direction, held: bool) {
        self.held.set(dir.flag(), held);
    }

    /// Mirrors a d-pad press: exactly the pressed directions become held.
    pub fn press_dpad(&mut self, dx: i8, dy: i8) {
        self.held = Held::empty();
        self.held.set(Held::UP, dy < 0);
        self.held.set(Held::DOWN, dy > 0);
        self.held.set(Held::LEFT, dx < 0);
        self.held.set(Held::RIGHT, dx > 0);
    }

    pub fn clear(&mut self) {
        self.held = Held::empty();
    }

    pub fn held(&self) -> Held {
        self.held
    }

    pub fn is_held(&self, dir: Direction) -> bool {
        self.held.contains(dir.flag())
    }

    /// `(right - left, down - up)` at the time of the call.
    pub fn vector(&self) -> MoveIntent {
        let axis = |pos: Held, neg: Held| -> i8 {
            i8::from(self.held.contains(pos)) - i8::from(self.held.contains(neg))
        };
        MoveIntent {
            dx: axis(Held::RIGHT, Held::LEFT),
            dy: axis(Held::DOWN, Held::UP),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_by_default() {
        assert!(InputSampler::new().vector().is_idle());
    }

    #[test]
    fn opposite_keys_cancel() {
        let mut s = InputSampler::new();
        s.set_intent(Direction::Left, true);
        s.set_intent(Direction::Right, true);
        assert_eq!(s.vector().dx, 0);

        s.set_intent(Direction::Left, false);
        assert_eq!(s.vector().dx, 1);

        s.set_intent(Direction::Left, true);
        s.set_intent(Direction::Right, false);
        assert_eq!(s.vector().dx, -1);
    }

    #[test]
    fn diagonal_vector() {
        let mut s = InputSampler::new();
        s.set_intent(Direction::Up, true);
        s.set_intent(Direction::Right, true);
        assert_eq!(s.vector(), MoveIntent { dx: 1, dy: -1 });
    }

    #[test]
    fn dpad_overwrites_keyboard_state() {
        let mut s = InputSampler::new();
        s.set_intent(Direction::Up, true);
        s.set_intent(Direction::Left, true);
        s.press_dpad(0, 1);
        assert_eq!(s.vector(), MoveIntent { dx: 0, dy: 1 });
        assert!(!s.is_held(Direction::Up));

        // Keyboard written after the d-pad wins the same way.
        s.set_intent(Direction::Down, false);
        assert!(s.vector().is_idle());
    }

    #[test]
    fn key_bindings() {
        assert_eq!(Key::Char('W').direction(), Some(Direction::Up));
        assert_eq!(Key::Char('a').direction(), Some(Direction::Left));
        assert_eq!(Key::ArrowDown.direction(), Some(Direction::Down));
        assert_eq!(Key::Char('c').direction(), None);
        assert_eq!(Key::Enter.direction(), None);
    }

    #[test]
    fn direction_parse() {
        assert_eq!(Direction::parse("UP"), Some(Direction::Up));
        assert_eq!(Direction::parse("d"), Some(Direction::Right));
        assert_eq!(Direction::parse("sideways"), None);
    }
}
