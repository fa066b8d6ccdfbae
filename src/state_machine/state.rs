//! Intake form state types

use crate::catalog::Insurance;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one remote chat thread (the Telegram chat id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub i64);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ConversationId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

// ============================================================================
// Intake State
// ============================================================================

/// Where a conversation is in the booking flow.
///
/// Each variant carries exactly the fields collected before it, so a
/// later-stage field cannot exist without every earlier one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntakeState {
    /// Root menu, nothing chosen yet
    #[default]
    Idle,

    /// Specialty chosen, waiting for a practitioner
    AwaitingDoctor { specialty: String },

    /// Practitioner chosen, waiting for the patient's full name
    AwaitingName { specialty: String, doctor: String },

    /// Waiting for a 10-digit national id
    AwaitingNationalId {
        specialty: String,
        doctor: String,
        name: String,
    },

    /// Waiting for an insurance plan
    AwaitingInsurance {
        specialty: String,
        doctor: String,
        name: String,
        national_id: String,
    },

    /// Summary shown with a quoted price, waiting for payment confirmation
    AwaitingPayment {
        specialty: String,
        doctor: String,
        name: String,
        national_id: String,
        insurance: Insurance,
        price: u32,
    },
}

/// Flat tag of an [`IntakeState`], for logs and assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StateTag {
    Idle,
    AwaitingDoctor,
    AwaitingName,
    AwaitingNationalId,
    AwaitingInsurance,
    AwaitingPayment,
}

impl fmt::Display for StateTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            StateTag::Idle => "IDLE",
            StateTag::AwaitingDoctor => "AWAITING_DOCTOR",
            StateTag::AwaitingName => "AWAITING_NAME",
            StateTag::AwaitingNationalId => "AWAITING_NATIONAL_ID",
            StateTag::AwaitingInsurance => "AWAITING_INSURANCE",
            StateTag::AwaitingPayment => "AWAITING_PAYMENT",
        };
        f.write_str(tag)
    }
}

impl IntakeState {
    pub fn tag(&self) -> StateTag {
        match self {
            IntakeState::Idle => StateTag::Idle,
            IntakeState::AwaitingDoctor { .. } => StateTag::AwaitingDoctor,
            IntakeState::AwaitingName { .. } => StateTag::AwaitingName,
            IntakeState::AwaitingNationalId { .. } => StateTag::AwaitingNationalId,
            IntakeState::AwaitingInsurance { .. } => StateTag::AwaitingInsurance,
            IntakeState::AwaitingPayment { .. } => StateTag::AwaitingPayment,
        }
    }

    #[allow(dead_code)] // Used in tests
    pub fn is_idle(&self) -> bool {
        matches!(self, IntakeState::Idle)
    }

    /// Flattened view of the fields collected so far
    #[allow(dead_code)] // Used in tests
    pub fn form(&self) -> IntakeForm<'_> {
        match self {
            IntakeState::Idle => IntakeForm::default(),
            IntakeState::AwaitingDoctor { specialty } => IntakeForm {
                specialty: Some(specialty),
                ..IntakeForm::default()
            },
            IntakeState::AwaitingName { specialty, doctor } => IntakeForm {
                specialty: Some(specialty),
                doctor: Some(doctor),
                ..IntakeForm::default()
            },
            IntakeState::AwaitingNationalId {
                specialty,
                doctor,
                name,
            } => IntakeForm {
                specialty: Some(specialty),
                doctor: Some(doctor),
                name: Some(name),
                ..IntakeForm::default()
            },
            IntakeState::AwaitingInsurance {
                specialty,
                doctor,
                name,
                national_id,
            } => IntakeForm {
                specialty: Some(specialty),
                doctor: Some(doctor),
                name: Some(name),
                national_id: Some(national_id),
                ..IntakeForm::default()
            },
            IntakeState::AwaitingPayment {
                specialty,
                doctor,
                name,
                national_id,
                insurance,
                price,
            } => IntakeForm {
                specialty: Some(specialty),
                doctor: Some(doctor),
                name: Some(name),
                national_id: Some(national_id),
                insurance: Some(*insurance),
                price: Some(*price),
            },
        }
    }
}

/// Borrowed, flattened form fields; `None` until the owning stage is reached
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(dead_code)] // Used in tests
pub struct IntakeForm<'a> {
    pub specialty: Option<&'a str>,
    pub doctor: Option<&'a str>,
    pub name: Option<&'a str>,
    pub national_id: Option<&'a str>,
    pub insurance: Option<Insurance>,
    pub price: Option<u32>,
}

// ============================================================================
// Session
// ============================================================================

/// In-progress form for one conversation, held only in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub conversation_id: ConversationId,
    pub state: IntakeState,
}

impl Session {
    pub fn new(conversation_id: ConversationId) -> Self {
        Self {
            conversation_id,
            state: IntakeState::Idle,
        }
    }

    pub fn with_state(conversation_id: ConversationId, state: IntakeState) -> Self {
        Self {
            conversation_id,
            state,
        }
    }
}

/// Context for one transition (immutable inputs besides state and event)
#[derive(Debug, Clone)]
pub struct IntakeContext<'a> {
    pub conversation_id: ConversationId,
    pub catalog: &'a crate::catalog::Catalog,
    /// Clock reading stamped onto a committed appointment
    pub now: DateTime<Utc>,
}

impl<'a> IntakeContext<'a> {
    pub fn new(
        conversation_id: ConversationId,
        catalog: &'a crate::catalog::Catalog,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            conversation_id,
            catalog,
            now,
        }
    }
}
