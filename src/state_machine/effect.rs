//! Effects produced by state transitions

use super::state::QuestionStrategy;
use crate::collaborator::{QuestionRequest, ScoreRequest};
use crate::protocol::{ErrorCode, ServerMessage};

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Push a frame to the client
    Send(ServerMessage),

    /// Ask the question generator for the next question (spawns as background task)
    RequestQuestion {
        strategy: QuestionStrategy,
        request: QuestionRequest,
    },

    /// Ask the scorer to grade the pending answer (spawns as background task)
    RequestFeedback { request: ScoreRequest },

    /// Close the connection normally after the summary
    CloseConnection,
}

impl Effect {
    pub fn send_error(code: ErrorCode, message: impl Into<String>) -> Self {
        Effect::Send(ServerMessage::error(code, message))
    }

    #[cfg(test)]
    pub fn is_question(&self) -> bool {
        matches!(self, Effect::Send(ServerMessage::Question { .. }))
    }
}
