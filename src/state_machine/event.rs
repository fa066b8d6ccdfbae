//! Events that can occur in a conversation

use crate::catalog;

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// `/start`: drop whatever is in progress and show the root menu
    Start,
    /// Back button: same as start, with the "back to menu" reply
    Back,
    /// Any other text, already trimmed
    Text(String),
}

impl Event {
    /// Classify raw inbound text
    pub fn from_text(raw: &str) -> Self {
        let text = raw.trim();
        if catalog::is_start(text) {
            Event::Start
        } else if catalog::is_back(text) {
            Event::Back
        } else {
            Event::Text(text.to_string())
        }
    }
}
