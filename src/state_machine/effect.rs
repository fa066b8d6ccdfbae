//! Effects produced by state transitions

use crate::db::NewAppointment;
use serde::Serialize;

/// Reply keyboard attached to an outbound prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "rows", rename_all = "snake_case")]
pub enum Keyboard {
    /// Button labels laid out in rows, in display order
    Menu(Vec<Vec<String>>),
    /// Hide any keyboard left over from a previous prompt
    Remove,
}

impl Keyboard {
    /// One button per row
    pub fn column<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Keyboard::Menu(labels.into_iter().map(|l| vec![l.into()]).collect())
    }

    /// All button labels in display order; empty for [`Keyboard::Remove`]
    #[allow(dead_code)] // Used in tests
    pub fn labels(&self) -> Vec<&str> {
        match self {
            Keyboard::Menu(rows) => rows.iter().flatten().map(String::as_str).collect(),
            Keyboard::Remove => Vec::new(),
        }
    }
}

/// Prompt text plus an optional keyboard, not yet addressed to a chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

impl Reply {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Durably record a completed booking; must succeed before anything after it runs
    CommitAppointment(NewAppointment),

    /// Send a prompt back to the conversation
    Reply(Reply),

    /// Drop the session from the registry instead of writing the new state back
    EndSession,
}

/// Coarse classification of what a transition asks of the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    None,
    CommitAppointment,
    Reset,
}

impl Effect {
    pub fn reply(reply: Reply) -> Self {
        Effect::Reply(reply)
    }

    pub fn commit(appointment: NewAppointment) -> Self {
        Effect::CommitAppointment(appointment)
    }
}
