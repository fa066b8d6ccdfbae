//! In-memory session registry
//!
//! Maps each conversation to its in-progress form. Every conversation has
//! its own async gate: [`SessionRegistry::lock`] waits (FIFO) until no other
//! task is processing that conversation, and the returned guard is the only
//! way to read or write the session. Distinct conversations never contend
//! beyond the brief map lookup.

use crate::state_machine::{ConversationId, Session};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slot = Arc<AsyncMutex<Option<Session>>>;

/// Registry of live sessions, shared by every dispatcher task
#[derive(Default)]
pub struct SessionRegistry {
    slots: Mutex<HashMap<ConversationId, Slot>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to one conversation's session.
    ///
    /// Holders are served in the order they called `lock`.
    pub async fn lock(&self, conversation_id: ConversationId) -> ConversationGuard<'_> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(conversation_id).or_default())
        };
        let held = Arc::clone(&slot).lock_owned().await;
        ConversationGuard {
            registry: self,
            conversation_id,
            slot,
            held: Some(held),
        }
    }

    /// Number of conversations currently tracked, including any mid-update
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[allow(dead_code)] // API completeness
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop the map entry once nobody holds or awaits it and it has no session
    fn release(&self, conversation_id: ConversationId, slot: &Slot) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(current) = slots.get(&conversation_id) else {
            return;
        };
        // All clones are taken under `slots`, so a count of two (map + us)
        // means no other task can reach this slot until we let go of the map.
        if !Arc::ptr_eq(current, slot) || Arc::strong_count(slot) != 2 {
            return;
        }
        let vacant = slot.try_lock().is_ok_and(|session| session.is_none());
        if vacant {
            slots.remove(&conversation_id);
        }
    }
}

/// Exclusive access to one conversation's session.
///
/// Dropping the guard admits the next waiter for the same conversation.
pub struct ConversationGuard<'a> {
    registry: &'a SessionRegistry,
    conversation_id: ConversationId,
    slot: Slot,
    held: Option<OwnedMutexGuard<Option<Session>>>,
}

impl ConversationGuard<'_> {
    fn held(&self) -> &Option<Session> {
        // `held` is only taken in Drop
        self.held.as_deref().unwrap_or(&None)
    }

    fn held_mut(&mut self) -> Option<&mut Option<Session>> {
        self.held.as_deref_mut()
    }

    pub fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    /// The stored session, if one exists
    #[allow(dead_code)] // Used in tests
    pub fn get(&self) -> Option<&Session> {
        self.held().as_ref()
    }

    /// The stored session, creating an idle one on first contact
    pub fn get_or_create(&mut self) -> Session {
        let conversation_id = self.conversation_id;
        match self.held_mut() {
            Some(slot) => slot
                .get_or_insert_with(|| Session::new(conversation_id))
                .clone(),
            None => Session::new(conversation_id),
        }
    }

    /// Replace the stored session
    pub fn put(&mut self, session: Session) {
        debug_assert_eq!(session.conversation_id, self.conversation_id);
        if let Some(slot) = self.held_mut() {
            *slot = Some(session);
        }
    }

    /// Forget the session; the next contact starts from scratch
    pub fn remove(&mut self) -> Option<Session> {
        self.held_mut().and_then(Option::take)
    }
}

impl Drop for ConversationGuard<'_> {
    fn drop(&mut self) {
        // Release the gate first so `release` can inspect the slot
        drop(self.held.take());
        self.registry.release(self.conversation_id, &self.slot);
    }
}
