//! Mock implementations for testing
//!
//! These mocks enable dispatcher and dispatch-loop tests without real I/O.

use super::traits::*;
use super::OutboundReply;
use crate::db::{Appointment, NewAppointment, StoreError};
use crate::telegram::TransportError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

// ============================================================================
// Mock Appointment Store
// ============================================================================

/// In-memory store with failure injection
#[allow(dead_code)]
pub struct MockStore {
    records: Mutex<Vec<Appointment>>,
    attempts: Mutex<Vec<NewAppointment>>,
    next_id: AtomicI64,
    failures: AtomicUsize,
    delay: Option<Duration>,
}

#[allow(dead_code)]
impl MockStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            attempts: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            failures: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Sleep this long inside every append
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail the next `n` appends with a write error
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<Appointment> {
        self.records.lock().unwrap().clone()
    }

    /// Every appointment passed to `append`, including failed ones
    pub fn attempts(&self) -> Vec<NewAppointment> {
        self.attempts.lock().unwrap().clone()
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AppointmentStore for MockStore {
    async fn append(&self, appointment: &NewAppointment) -> Result<Appointment, StoreError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.attempts.lock().unwrap().push(appointment.clone());
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::Write(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_FULL),
                Some("database or disk is full".to_string()),
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let stored = Appointment::from_new(id, appointment.clone());
        self.records.lock().unwrap().push(stored.clone());
        Ok(stored)
    }
}

// ============================================================================
// Recording Reply Sink
// ============================================================================

/// Sink that forwards every delivered reply to a channel the test reads
pub struct RecordingSink {
    tx: mpsc::UnboundedSender<OutboundReply>,
}

impl RecordingSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OutboundReply>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ReplySink for RecordingSink {
    async fn deliver(&self, reply: &OutboundReply) -> Result<(), TransportError> {
        self.tx
            .send(reply.clone())
            .map_err(|_| TransportError::api("recording sink closed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, Insurance, PAY_LABEL};
    use crate::db::Database;
    use crate::prompts;
    use crate::registry::SessionRegistry;
    use crate::runtime::{DispatchLoop, Dispatcher, InboundEvent};
    use crate::state_machine::{ConversationId, Keyboard, Session, StateTag};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    const SPECIALTY: &str = "گوش و حلق و بینی";
    const DOCTOR: &str = "دکتر نیوشا اصغری";

    fn booking(name: &str, national_id: &str) -> Vec<String> {
        [SPECIALTY, DOCTOR, name, national_id, "آزاد", PAY_LABEL]
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    fn dispatcher<S: AppointmentStore + 'static>(store: S) -> Dispatcher<S> {
        Dispatcher::new(
            Arc::new(Catalog::clinic()),
            Arc::new(SessionRegistry::new()),
            store,
        )
    }

    async fn send<S: AppointmentStore + 'static>(
        dispatcher: &Dispatcher<S>,
        chat: i64,
        text: &str,
    ) -> OutboundReply {
        dispatcher
            .handle(InboundEvent::new(chat, text))
            .await
            .expect("every message gets a reply")
    }

    async fn session_of<S: AppointmentStore + 'static>(
        dispatcher: &Dispatcher<S>,
        chat: i64,
    ) -> Option<Session> {
        let guard = dispatcher.registry().lock(ConversationId(chat)).await;
        guard.get().cloned()
    }

    async fn state_of<S: AppointmentStore + 'static>(
        dispatcher: &Dispatcher<S>,
        chat: i64,
    ) -> Option<StateTag> {
        session_of(dispatcher, chat).await.map(|s| s.state.tag())
    }

    #[tokio::test]
    async fn test_full_booking_commits_once() {
        let store = Arc::new(MockStore::new());
        let dispatcher = dispatcher(Arc::clone(&store));
        let catalog = Catalog::clinic();

        let replies = {
            let mut replies = Vec::new();
            for text in booking("Ali Rezaei", "1234567890") {
                replies.push(send(&dispatcher, 77, &text).await);
            }
            replies
        };

        assert_eq!(replies[0], OutboundReply::new(ConversationId(77), prompts::choose_doctor(&catalog, SPECIALTY)));
        assert_eq!(replies[1].keyboard, Some(Keyboard::Remove));
        assert_eq!(replies[2].text, prompts::ask_national_id().text);
        assert_eq!(replies[3].text, prompts::choose_insurance().text);
        assert!(replies[4].text.contains("Ali Rezaei"));
        assert!(replies[4].text.contains("تومان"));

        let records = store.records();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.conversation_id, ConversationId(77));
        assert_eq!(record.specialty, SPECIALTY);
        assert_eq!(record.doctor, DOCTOR);
        assert_eq!(record.name, "Ali Rezaei");
        assert_eq!(record.national_id, "1234567890");
        assert_eq!(record.insurance, Insurance::SelfPay);
        assert!(replies[5].text.contains(&record.visit_code));
        assert_eq!(replies[5].keyboard, Some(Keyboard::Remove));

        // Session is gone; the next message starts from the root menu
        assert_eq!(state_of(&dispatcher, 77).await, None);
        assert!(dispatcher.registry().is_empty());
    }

    #[tokio::test]
    async fn test_failed_commit_keeps_payment_step() {
        let store = Arc::new(MockStore::new());
        let dispatcher = dispatcher(Arc::clone(&store)).with_rng_seed(7);

        let mut inputs = booking("Sara", "0987654321");
        let pay = inputs.pop().unwrap();
        for text in &inputs {
            send(&dispatcher, 5, text).await;
        }
        let before = session_of(&dispatcher, 5).await.unwrap();

        store.fail_next(1);
        let reply = send(&dispatcher, 5, &pay).await;
        assert_eq!(reply.text, prompts::commit_failed().text);
        assert!(store.records().is_empty());

        let after = session_of(&dispatcher, 5).await.unwrap();
        assert_eq!(after.state.tag(), StateTag::AwaitingPayment);
        assert_eq!(after.state.form(), before.state.form());
        assert_eq!(after.state, before.state);

        // Retrying succeeds from the retained form
        tokio::time::sleep(Duration::from_millis(5)).await;
        let reply = send(&dispatcher, 5, &pay).await;
        let records = store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Sara");
        assert!(reply.text.contains(&records[0].visit_code));
        assert_eq!(state_of(&dispatcher, 5).await, None);

        // Only the code and timestamp are drawn again
        let attempts = store.attempts();
        assert_eq!(attempts.len(), 2);
        let (failed, committed) = (&attempts[0], &attempts[1]);
        assert_ne!(failed.visit_code, committed.visit_code);
        assert!(committed.created_at > failed.created_at);
        let same_draws = NewAppointment {
            visit_code: failed.visit_code.clone(),
            created_at: failed.created_at,
            ..committed.clone()
        };
        assert_eq!(&same_draws, failed);
    }

    #[tokio::test]
    async fn test_pay_without_session_stores_nothing() {
        let store = Arc::new(MockStore::new());
        let dispatcher = dispatcher(Arc::clone(&store));

        let reply = send(&dispatcher, 9, "پرداخت").await;
        assert_eq!(reply.text, prompts::session_lost(&Catalog::clinic()).text);
        assert!(store.records().is_empty());
    }

    #[tokio::test]
    async fn test_back_mid_form_discards_progress() {
        let store = Arc::new(MockStore::new());
        let dispatcher = dispatcher(Arc::clone(&store));

        send(&dispatcher, 3, SPECIALTY).await;
        send(&dispatcher, 3, DOCTOR).await;
        assert_eq!(state_of(&dispatcher, 3).await, Some(StateTag::AwaitingName));

        let reply = send(&dispatcher, 3, "🔙 بازگشت").await;
        assert_eq!(reply.text, prompts::back_to_menu(&Catalog::clinic()).text);
        assert_eq!(state_of(&dispatcher, 3).await, None);

        // A name now is just unrecognized root-menu input
        send(&dispatcher, 3, "Ali").await;
        assert_eq!(state_of(&dispatcher, 3).await, Some(StateTag::Idle));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_conversations_stay_isolated() {
        let store = Arc::new(MockStore::new().with_delay(Duration::from_millis(5)));
        let dispatcher = Arc::new(dispatcher(Arc::clone(&store)));

        let mut tasks = Vec::new();
        for chat in 1..=20_i64 {
            let dispatcher = Arc::clone(&dispatcher);
            tasks.push(tokio::spawn(async move {
                for text in booking(&format!("Patient {chat}"), &format!("{chat:010}")) {
                    send(&dispatcher, chat, &text).await;
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let records = store.records();
        assert_eq!(records.len(), 20);
        for record in records {
            let chat = record.conversation_id.0;
            assert_eq!(record.name, format!("Patient {chat}"));
            assert_eq!(record.national_id, format!("{chat:010}"));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_dispatch_loop_preserves_per_chat_order() {
        let store = Arc::new(MockStore::new().with_delay(Duration::from_millis(2)));
        let dispatcher = Arc::new(dispatcher(Arc::clone(&store)));
        let (sink, mut replies) = RecordingSink::channel();
        let dispatch = Arc::new(DispatchLoop::new(dispatcher, sink));

        let (tx, rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Arc::clone(&dispatch).run(rx, cancel.clone()));

        let chats = [11_i64, 12, 13];
        let scripts: Vec<Vec<String>> = chats
            .iter()
            .map(|chat| booking(&format!("User {chat}"), &format!("{chat:010}")))
            .collect();

        // Interleave the three conversations message by message
        for step in 0..6 {
            for (chat, script) in chats.iter().zip(&scripts) {
                tx.send(InboundEvent::new(*chat, script[step].clone()))
                    .await
                    .unwrap();
            }
        }

        let mut per_chat: std::collections::HashMap<i64, Vec<OutboundReply>> =
            std::collections::HashMap::new();
        for _ in 0..18 {
            let reply = tokio::time::timeout(Duration::from_secs(5), replies.recv())
                .await
                .expect("reply within timeout")
                .expect("sink open");
            per_chat.entry(reply.conversation_id.0).or_default().push(reply);
        }

        let catalog = Catalog::clinic();
        for chat in chats {
            let texts: Vec<_> = per_chat[&chat].iter().map(|r| r.text.clone()).collect();
            assert_eq!(texts[0], prompts::choose_doctor(&catalog, SPECIALTY).text);
            assert_eq!(texts[1], prompts::ask_name().text);
            assert_eq!(texts[2], prompts::ask_national_id().text);
            assert_eq!(texts[3], prompts::choose_insurance().text);
            assert!(texts[4].contains(&format!("User {chat}")));
            assert!(texts[5].starts_with('✅'));
        }
        assert_eq!(store.records().len(), 3);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_database_store_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let dispatcher = dispatcher(DatabaseStore::new(db.clone()));

        for text in booking("Mina", "1111111111") {
            send(&dispatcher, 21, &text).await;
        }

        let stored = db.appointments_for(21).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].name, "Mina");
        assert_eq!(stored[0].insurance, Insurance::SelfPay);
    }
}
