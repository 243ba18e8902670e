//! Chat overlay state.
//!
//! Wraps the capped message log with the compose buffer and the
//! open/collapsed presentation flags. Nothing here talks to the network;
//! `outgoing` hands back the text to send.

use kirworld_shared::{
    chat::{ChatLog, ChatMessage},
    net::{chat_text, InputError, MAX_CHAT_LEN},
};

#[derive(Debug, Clone)]
pub struct ChatOverlay {
    log: ChatLog,
    compose: String,
    /// Panel visible (small screens hide it behind a bubble).
    open: bool,
    /// Panel collapsed to its header (large screens).
    collapsed: bool,
    compose_focused: bool,
}

impl ChatOverlay {
    pub fn new(capacity: usize) -> Self {
        Self {
            log: ChatLog::new(capacity),
            compose: String::new(),
            open: false,
            collapsed: false,
            compose_focused: false,
        }
    }

    pub fn push(&mut self, msg: ChatMessage) {
        self.log.push(msg);
    }

    pub fn log(&self) -> &ChatLog {
        &self.log
    }

    pub fn compose(&self) -> &str {
        &self.compose
    }

    /// Appends typed text, stopping at the length cap.
    pub fn type_text(&mut self, text: &str) {
        let room = MAX_CHAT_LEN.saturating_sub(self.compose.chars().count());
        self.compose.extend(text.chars().filter(|c| !c.is_control()).take(room));
    }

    pub fn backspace(&mut self) {
        self.compose.pop();
    }

    /// Normalized compose text ready to send. The buffer is left as is;
    /// call [`ChatOverlay::clear_compose`] once the send went through.
    ///
    /// Empty or whitespace-only input is rejected.
    pub fn outgoing(&self) -> Result<String, InputError> {
        chat_text(&self.compose)
    }

    pub fn clear_compose(&mut self) {
        self.compose.clear();
    }

    /// Keyboard shortcut: expand, open and focus the compose field.
    pub fn focus_compose(&mut self) {
        self.collapsed = false;
        self.open = true;
        self.compose_focused = true;
    }

    pub fn blur(&mut self) {
        self.compose_focused = false;
    }

    pub fn toggle_open(&mut self) {
        self.open = !self.open;
        if !self.open {
            self.compose_focused = false;
        }
    }

    pub fn toggle_collapsed(&mut self) {
        self.collapsed = !self.collapsed;
        if self.collapsed {
            self.compose_focused = false;
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    pub fn is_compose_focused(&self) -> bool {
        self.compose_focused
    }
}
