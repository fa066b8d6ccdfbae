//! Event dispatcher
//!
//! Runs one inbound message through lookup, transition and effect execution
//! while holding that conversation's registry gate, so per-conversation
//! processing is strictly one message at a time.

use super::traits::AppointmentStore;
use super::{InboundEvent, OutboundReply};

use crate::catalog::Catalog;
use crate::prompts;
use crate::registry::{ConversationGuard, SessionRegistry};
use crate::state_machine::{transition, Effect, Event, IntakeContext, Session, TransitionResult};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, Mutex, PoisonError};

/// Generic dispatcher that can work with any appointment store
pub struct Dispatcher<S>
where
    S: AppointmentStore + 'static,
{
    catalog: Arc<Catalog>,
    registry: Arc<SessionRegistry>,
    store: S,
    /// Source of prices and visit codes
    rng: Mutex<StdRng>,
}

impl<S> Dispatcher<S>
where
    S: AppointmentStore + 'static,
{
    pub fn new(catalog: Arc<Catalog>, registry: Arc<SessionRegistry>, store: S) -> Self {
        Self {
            catalog,
            registry,
            store,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Draw prices and visit codes from a fixed seed
    #[allow(dead_code)] // Used in tests
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Process one inbound message and return the reply for its chat
    pub async fn handle(&self, inbound: InboundEvent) -> Option<OutboundReply> {
        let conversation_id = inbound.conversation_id;
        let event = Event::from_text(&inbound.text);

        let mut guard = self.registry.lock(conversation_id).await;
        let session = guard.get_or_create();

        let context = IntakeContext::new(conversation_id, &self.catalog, Utc::now());
        let result = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            transition(&session.state, &context, event, &mut *rng)
        };

        tracing::debug!(
            conversation_id = %conversation_id,
            from = %session.state.tag(),
            to = %result.new_state.tag(),
            side_effect = ?result.side_effect(),
            "Transition"
        );

        self.execute_effects(&mut guard, result).await
    }

    /// Run effects in order. A failed commit abandons the rest and leaves the
    /// stored session untouched.
    async fn execute_effects(
        &self,
        guard: &mut ConversationGuard<'_>,
        result: TransitionResult,
    ) -> Option<OutboundReply> {
        let conversation_id = guard.conversation_id();
        let TransitionResult { new_state, effects } = result;
        let mut reply = None;
        let mut end_session = false;

        for effect in effects {
            match effect {
                Effect::CommitAppointment(appointment) => {
                    match self.store.append(&appointment).await {
                        Ok(stored) => {
                            tracing::info!(
                                conversation_id = %conversation_id,
                                appointment_id = stored.id,
                                visit_code = %stored.visit_code,
                                "Appointment committed"
                            );
                        }
                        Err(e) => {
                            tracing::error!(
                                conversation_id = %conversation_id,
                                error = %e,
                                "Failed to commit appointment"
                            );
                            return Some(OutboundReply::new(
                                conversation_id,
                                prompts::commit_failed(),
                            ));
                        }
                    }
                }
                Effect::Reply(r) => reply = Some(r),
                Effect::EndSession => end_session = true,
            }
        }

        if end_session {
            guard.remove();
        } else {
            guard.put(Session::with_state(conversation_id, new_state));
        }

        reply.map(|r| OutboundReply::new(conversation_id, r))
    }
}
