//! Interview session state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions:
//! the runtime feeds events in and executes the effects that come out.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;
pub mod turn;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{
    Phase, QuestionStrategy, SessionContext, SessionRules, SessionState, TerminationPolicy,
};
pub use transition::transition;
pub use turn::{Feedback, Question, QuestionCategory, Turn};
