//! Intake conversation state machine
//!
//! Pure state transitions in the Elm Architecture style: the dispatcher owns
//! all I/O and executes the effects a transition returns.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;


pub use effect::{Effect, Keyboard, Reply, SideEffect};
pub use event::Event;
#[allow(unused_imports)] // IntakeForm is used by tests
pub use state::{ConversationId, IntakeContext, IntakeForm, IntakeState, Session, StateTag};
pub use transition::{transition, TransitionResult};
