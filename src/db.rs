//! Appointment store
//!
//! Durable, append-only table of completed bookings. A single mutex around
//! the SQLite connection is the only write serialization point; it is held
//! for exactly one insert.

mod schema;

pub use schema::*;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to initialize appointment store at {path}: {source}")]
    Init {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("Failed to write appointment: {0}")]
    Write(#[source] rusqlite::Error),
    #[error("Failed to read appointments: {0}")]
    Read(#[source] rusqlite::Error),
    #[error("Appointment store is unavailable: a writer panicked while holding it")]
    Poisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create the store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        let init_err = |source| StoreError::Init {
            path: path.display().to_string(),
            source,
        };
        let conn = Connection::open(path).map_err(init_err)?;
        Self::init(conn).map_err(init_err)
    }

    /// Open an in-memory store (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> StoreResult<Self> {
        let init_err = |source| StoreError::Init {
            path: ":memory:".to_string(),
            source,
        };
        let conn = Connection::open_in_memory().map_err(init_err)?;
        Self::init(conn).map_err(init_err)
    }

    fn init(conn: Connection) -> rusqlite::Result<Self> {
        conn.busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))?;
        // WAL + synchronous=FULL: an acknowledged insert survives a crash.
        // journal_mode answers with the mode it settled on ("memory" for :memory:)
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        conn.pragma_update(None, "synchronous", "FULL")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    // ==================== Appointment Operations ====================

    /// Append one appointment as a single atomic insert
    pub fn insert_appointment(&self, new: &NewAppointment) -> StoreResult<Appointment> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;

        conn.execute(
            "INSERT INTO appointments
             (chat_id, name, national_id, specialty, doctor, insurance, price, visit_code, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                new.conversation_id.0,
                new.name,
                new.national_id,
                new.specialty,
                new.doctor,
                new.insurance.label(),
                new.price,
                new.visit_code,
                new.created_at.to_rfc3339(),
            ],
        )
        .map_err(StoreError::Write)?;

        let id = conn.last_insert_rowid();
        Ok(Appointment::from_new(id, new.clone()))
    }

    /// Number of committed appointments
    pub fn appointment_count(&self) -> StoreResult<i64> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.query_row("SELECT COUNT(*) FROM appointments", [], |row| row.get(0))
            .map_err(StoreError::Read)
    }

    /// All appointments in commit order
    #[allow(dead_code)] // Operator inspection and tests
    pub fn list_appointments(&self) -> StoreResult<Vec<Appointment>> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let mut stmt = conn
            .prepare(
                "SELECT id, chat_id, name, national_id, specialty, doctor, insurance, price,
                        visit_code, created_at
                 FROM appointments ORDER BY id",
            )
            .map_err(StoreError::Read)?;

        let rows = stmt
            .query_map([], row_to_appointment)
            .map_err(StoreError::Read)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::Read)
    }

    /// Appointments booked from one conversation, in commit order
    #[allow(dead_code)] // Operator inspection and tests
    pub fn appointments_for(&self, chat_id: i64) -> StoreResult<Vec<Appointment>> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let mut stmt = conn
            .prepare(
                "SELECT id, chat_id, name, national_id, specialty, doctor, insurance, price,
                        visit_code, created_at
                 FROM appointments WHERE chat_id = ?1 ORDER BY id",
            )
            .map_err(StoreError::Read)?;

        let rows = stmt
            .query_map(params![chat_id], row_to_appointment)
            .map_err(StoreError::Read)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::Read)
    }
}

fn row_to_appointment(row: &Row<'_>) -> rusqlite::Result<Appointment> {
    let insurance: String = row.get(6)?;
    let insurance = crate::catalog::Insurance::from_label(&insurance)
        .ok_or_else(|| rusqlite::Error::InvalidColumnType(6, "insurance".to_string(), Type::Text))?;

    Ok(Appointment {
        id: row.get(0)?,
        conversation_id: crate::state_machine::ConversationId(row.get(1)?),
        name: row.get(2)?,
        national_id: row.get(3)?,
        specialty: row.get(4)?,
        doctor: row.get(5)?,
        insurance,
        price: row.get(7)?,
        visit_code: row.get(8)?,
        created_at: parse_datetime(9, &row.get::<_, String>(9)?)?,
    })
}

/// Records are immutable, so an unreadable timestamp is an error rather than a guess
fn parse_datetime(column: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}
