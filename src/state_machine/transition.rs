//! Pure state transition function
//!
//! Given a state, its context, one event and a random source, produce the
//! next state and the effects the dispatcher must run. No I/O happens here;
//! the clock reading arrives through [`IntakeContext`] and randomness through
//! the caller's RNG, so tests can pin both.

use super::effect::{Reply, SideEffect};
use super::{Effect, Event, IntakeContext, IntakeState};
use crate::catalog::{self, Insurance};
use crate::db::NewAppointment;
use crate::prompts;
use rand::Rng;
use std::ops::RangeInclusive;

/// Quoted visit price in toman, inclusive on both ends
pub const PRICE_RANGE: RangeInclusive<u32> = 50_000..=200_000;

/// Visit codes are always five decimal digits
pub const VISIT_CODE_RANGE: RangeInclusive<u32> = 10_000..=99_999;

pub const NATIONAL_ID_LEN: usize = 10;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: IntakeState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: IntakeState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_reply(self, reply: Reply) -> Self {
        self.with_effect(Effect::reply(reply))
    }

    /// What the dispatcher has to do besides replying
    pub fn side_effect(&self) -> SideEffect {
        if self
            .effects
            .iter()
            .any(|e| matches!(e, Effect::CommitAppointment(_)))
        {
            SideEffect::CommitAppointment
        } else if self.effects.iter().any(|e| matches!(e, Effect::EndSession)) {
            SideEffect::Reset
        } else {
            SideEffect::None
        }
    }

    /// The prompt to send, if any
    #[allow(dead_code)] // Used in tests
    pub fn reply(&self) -> Option<&Reply> {
        self.effects.iter().find_map(|e| match e {
            Effect::Reply(r) => Some(r),
            _ => None,
        })
    }

    /// The appointment to commit, if any
    #[allow(dead_code)] // Used in tests
    pub fn appointment(&self) -> Option<&NewAppointment> {
        self.effects.iter().find_map(|e| match e {
            Effect::CommitAppointment(a) => Some(a),
            _ => None,
        })
    }

    fn reset(reply: Reply) -> Self {
        Self::new(IntakeState::Idle)
            .with_effect(Effect::EndSession)
            .with_reply(reply)
    }
}

/// Pure transition function.
///
/// Every (state, event) pair has a row, so there is no error case: input the
/// current step cannot use yields a corrective re-prompt in the same state.
#[allow(clippy::too_many_lines)] // One arm per row of the booking table
pub fn transition<R: Rng + ?Sized>(
    state: &IntakeState,
    context: &IntakeContext<'_>,
    event: Event,
    rng: &mut R,
) -> TransitionResult {
    let catalog = context.catalog;

    match (state, event) {
        // ============================================================
        // Reset from anywhere
        // ============================================================
        (_, Event::Start) => TransitionResult::reset(prompts::greeting(catalog)),
        (_, Event::Back) => TransitionResult::reset(prompts::back_to_menu(catalog)),

        // ============================================================
        // Root menu
        // ============================================================
        (IntakeState::Idle, Event::Text(text)) => {
            if let Some(specialty) = catalog.specialty(&text) {
                TransitionResult::new(IntakeState::AwaitingDoctor {
                    specialty: specialty.name.clone(),
                })
                .with_reply(prompts::choose_doctor(catalog, &specialty.name))
            } else if catalog::is_pay(&text) {
                // Payment for a form this process no longer holds
                TransitionResult::reset(prompts::session_lost(catalog))
            } else {
                TransitionResult::new(IntakeState::Idle).with_reply(prompts::fallback(catalog))
            }
        }

        // ============================================================
        // Practitioner
        // ============================================================
        (IntakeState::AwaitingDoctor { specialty }, Event::Text(text)) => {
            if let Some(doctor) = catalog.doctor(specialty, &text) {
                TransitionResult::new(IntakeState::AwaitingName {
                    specialty: specialty.clone(),
                    doctor: doctor.to_string(),
                })
                .with_reply(prompts::ask_name())
            } else if let Some(other) = catalog.specialty(&text) {
                TransitionResult::new(IntakeState::AwaitingDoctor {
                    specialty: other.name.clone(),
                })
                .with_reply(prompts::choose_doctor(catalog, &other.name))
            } else {
                TransitionResult::new(state.clone())
                    .with_reply(prompts::doctor_not_listed(catalog, specialty))
            }
        }

        // ============================================================
        // Identity
        // ============================================================
        (IntakeState::AwaitingName { specialty, doctor }, Event::Text(text)) => {
            if text.is_empty() {
                TransitionResult::new(state.clone()).with_reply(prompts::ask_name())
            } else {
                TransitionResult::new(IntakeState::AwaitingNationalId {
                    specialty: specialty.clone(),
                    doctor: doctor.clone(),
                    name: text,
                })
                .with_reply(prompts::ask_national_id())
            }
        }

        (
            IntakeState::AwaitingNationalId {
                specialty,
                doctor,
                name,
            },
            Event::Text(text),
        ) => {
            if is_valid_national_id(&text) {
                TransitionResult::new(IntakeState::AwaitingInsurance {
                    specialty: specialty.clone(),
                    doctor: doctor.clone(),
                    name: name.clone(),
                    national_id: text,
                })
                .with_reply(prompts::choose_insurance())
            } else {
                TransitionResult::new(state.clone()).with_reply(prompts::invalid_national_id())
            }
        }

        // ============================================================
        // Insurance and quote
        // ============================================================
        (
            IntakeState::AwaitingInsurance {
                specialty,
                doctor,
                name,
                national_id,
            },
            Event::Text(text),
        ) => match Insurance::from_label(&text) {
            Some(insurance) => {
                let price = rng.gen_range(PRICE_RANGE);
                let reply = prompts::summary(&prompts::Summary {
                    name: name.as_str(),
                    national_id: national_id.as_str(),
                    specialty: specialty.as_str(),
                    doctor: doctor.as_str(),
                    insurance,
                    price,
                });
                TransitionResult::new(IntakeState::AwaitingPayment {
                    specialty: specialty.clone(),
                    doctor: doctor.clone(),
                    name: name.clone(),
                    national_id: national_id.clone(),
                    insurance,
                    price,
                })
                .with_reply(reply)
            }
            None => {
                TransitionResult::new(state.clone()).with_reply(prompts::insurance_not_listed())
            }
        },

        // ============================================================
        // Payment
        // ============================================================
        (
            IntakeState::AwaitingPayment {
                specialty,
                doctor,
                name,
                national_id,
                insurance,
                price,
            },
            Event::Text(text),
        ) => {
            if !catalog::is_pay(&text) {
                return TransitionResult::new(state.clone()).with_reply(prompts::payment_menu());
            }

            // Code and timestamp live only in the commit effect; a failed
            // commit leaves nothing behind to be reused on the next attempt.
            let visit_code = generate_visit_code(rng);
            let appointment = NewAppointment {
                conversation_id: context.conversation_id,
                name: name.clone(),
                national_id: national_id.clone(),
                specialty: specialty.clone(),
                doctor: doctor.clone(),
                insurance: *insurance,
                price: *price,
                visit_code: visit_code.clone(),
                created_at: context.now,
            };

            TransitionResult::new(IntakeState::Idle)
                .with_effect(Effect::commit(appointment))
                .with_reply(prompts::payment_confirmed(&visit_code))
                .with_effect(Effect::EndSession)
        }
    }
}

/// Exactly ten ASCII digits
pub fn is_valid_national_id(text: &str) -> bool {
    text.len() == NATIONAL_ID_LEN && text.bytes().all(|b| b.is_ascii_digit())
}

fn generate_visit_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    rng.gen_range(VISIT_CODE_RANGE).to_string()
}
