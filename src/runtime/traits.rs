//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the dispatcher with mock implementations.

use super::OutboundReply;
use crate::db::{Appointment, Database, NewAppointment, StoreError};
use crate::telegram::TransportError;
use async_trait::async_trait;
use std::sync::Arc;

/// Durable sink for completed bookings
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Append one record; either the whole record is stored or nothing is
    async fn append(&self, appointment: &NewAppointment) -> Result<Appointment, StoreError>;
}

/// Outbound channel back to the user's chat
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn deliver(&self, reply: &OutboundReply) -> Result<(), TransportError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: AppointmentStore + ?Sized> AppointmentStore for Arc<T> {
    async fn append(&self, appointment: &NewAppointment) -> Result<Appointment, StoreError> {
        (**self).append(appointment).await
    }
}

#[async_trait]
impl<T: ReplySink + ?Sized> ReplySink for Arc<T> {
    async fn deliver(&self, reply: &OutboundReply) -> Result<(), TransportError> {
        (**self).deliver(reply).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use Database as an AppointmentStore
#[derive(Clone)]
pub struct DatabaseStore {
    db: Database,
}

impl DatabaseStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[allow(dead_code)] // Useful for tests
    pub fn inner(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl AppointmentStore for DatabaseStore {
    async fn append(&self, appointment: &NewAppointment) -> Result<Appointment, StoreError> {
        self.db.insert_appointment(appointment)
    }
}
