//! Runtime for dispatching conversation events
//!
//! Transports turn platform updates into [`InboundEvent`]s; the dispatch loop
//! fans them out to one serial lane per conversation and hands each reply to
//! a [`ReplySink`].

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::Dispatcher;
pub use traits::*;

use crate::state_machine::{ConversationId, Keyboard, Reply};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Type alias for the production dispatcher
pub type ProductionDispatcher = Dispatcher<DatabaseStore>;

/// One text message from a user, already attributed to its conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub conversation_id: ConversationId,
    pub text: String,
}

impl InboundEvent {
    pub fn new(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            conversation_id: ConversationId(chat_id),
            text: text.into(),
        }
    }
}

/// A prompt addressed to the chat it answers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundReply {
    pub conversation_id: ConversationId,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyboard: Option<Keyboard>,
}

impl OutboundReply {
    pub fn new(conversation_id: ConversationId, reply: Reply) -> Self {
        Self {
            conversation_id,
            text: reply.text,
            keyboard: reply.keyboard,
        }
    }
}

// ============================================================================
// Dispatch loop
// ============================================================================

/// Routes inbound events to per-conversation lanes.
///
/// A lane is a queue plus a worker task that drains it one event at a time,
/// so messages from one chat are handled in arrival order while different
/// chats run concurrently. Lanes retire once their queue is empty.
pub struct DispatchLoop<S, K>
where
    S: AppointmentStore + 'static,
    K: ReplySink + 'static,
{
    dispatcher: Arc<Dispatcher<S>>,
    sink: K,
    lanes: Mutex<HashMap<ConversationId, mpsc::UnboundedSender<InboundEvent>>>,
}

impl<S, K> DispatchLoop<S, K>
where
    S: AppointmentStore + 'static,
    K: ReplySink + 'static,
{
    pub fn new(dispatcher: Arc<Dispatcher<S>>, sink: K) -> Self {
        Self {
            dispatcher,
            sink,
            lanes: Mutex::new(HashMap::new()),
        }
    }

    /// Consume events until the channel closes or `cancel` fires
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<InboundEvent>, cancel: CancellationToken) {
        tracing::info!("Dispatch loop started");
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                event = rx.recv() => match event {
                    Some(event) => self.route(event),
                    None => break,
                },
            }
        }
        tracing::info!("Dispatch loop stopped");
    }

    fn route(self: &Arc<Self>, event: InboundEvent) {
        let conversation_id = event.conversation_id;
        let mut lanes = self.lanes.lock().unwrap_or_else(PoisonError::into_inner);

        let event = match lanes.get(&conversation_id) {
            Some(tx) => match tx.send(event) {
                Ok(()) => return,
                // The lane's worker died; start a fresh one
                Err(mpsc::error::SendError(event)) => event,
            },
            None => event,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        if tx.send(event).is_err() {
            return;
        }
        lanes.insert(conversation_id, tx);
        drop(lanes);

        tokio::spawn(Arc::clone(self).drain_lane(conversation_id, rx));
    }

    async fn drain_lane(
        self: Arc<Self>,
        conversation_id: ConversationId,
        mut rx: mpsc::UnboundedReceiver<InboundEvent>,
    ) {
        loop {
            // Checked under the lanes lock so `route` never sends into a
            // queue whose worker is about to exit
            let next = {
                let mut lanes = self.lanes.lock().unwrap_or_else(PoisonError::into_inner);
                match rx.try_recv() {
                    Ok(event) => Some(event),
                    Err(_) => {
                        lanes.remove(&conversation_id);
                        None
                    }
                }
            };
            let Some(event) = next else { break };
            self.process(event).await;
        }
    }

    async fn process(&self, event: InboundEvent) {
        let Some(reply) = self.dispatcher.handle(event).await else {
            return;
        };
        if let Err(e) = self.sink.deliver(&reply).await {
            tracing::warn!(
                conversation_id = %reply.conversation_id,
                error = %e,
                "Failed to deliver reply"
            );
        }
    }
}
