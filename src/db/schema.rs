//! Database schema and types

use crate::catalog::Insurance;
use crate::state_machine::ConversationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS appointments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    chat_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    national_id TEXT NOT NULL,
    specialty TEXT NOT NULL,
    doctor TEXT NOT NULL,
    insurance TEXT NOT NULL,
    price INTEGER NOT NULL,
    visit_code TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_appointments_chat ON appointments(chat_id);
";

/// How long a writer waits on a lock held by another connection
pub const BUSY_TIMEOUT_MS: u64 = 10_000;

/// A completed booking, before the store has assigned it an id
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewAppointment {
    pub conversation_id: ConversationId,
    pub name: String,
    pub national_id: String,
    pub specialty: String,
    pub doctor: String,
    pub insurance: Insurance,
    pub price: u32,
    pub visit_code: String,
    pub created_at: DateTime<Utc>,
}

/// A committed appointment record; never updated after insert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    pub conversation_id: ConversationId,
    pub name: String,
    pub national_id: String,
    pub specialty: String,
    pub doctor: String,
    pub insurance: Insurance,
    pub price: u32,
    pub visit_code: String,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    pub fn from_new(id: i64, new: NewAppointment) -> Self {
        Self {
            id,
            conversation_id: new.conversation_id,
            name: new.name,
            national_id: new.national_id,
            specialty: new.specialty,
            doctor: new.doctor,
            insurance: new.insurance,
            price: new.price,
            visit_code: new.visit_code,
            created_at: new.created_at,
        }
    }
}
