//! Events that can occur in an interview session

use super::state::QuestionStrategy;
use super::turn::{Feedback, Question};
use crate::protocol::ClientMessage;

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    // Client events
    StartInterview {
        interview_type: String,
        level: String,
        resume_text: Option<String>,
    },
    Response {
        text: String,
    },

    // Question generator events
    QuestionGenerated {
        strategy: QuestionStrategy,
        question: Question,
    },
    QuestionsExhausted {
        strategy: QuestionStrategy,
    },
    QuestionFailed {
        strategy: QuestionStrategy,
        message: String,
    },

    // Scorer events, tagged with the turn they were requested for
    FeedbackReady {
        turn: usize,
        feedback: Feedback,
    },
    ScoringFailed {
        turn: usize,
        message: String,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::StartInterview { .. } => "start_interview",
            Event::Response { .. } => "response",
            Event::QuestionGenerated { .. } => "question_generated",
            Event::QuestionsExhausted { .. } => "questions_exhausted",
            Event::QuestionFailed { .. } => "question_failed",
            Event::FeedbackReady { .. } => "feedback_ready",
            Event::ScoringFailed { .. } => "scoring_failed",
        }
    }
}

impl From<ClientMessage> for Event {
    fn from(message: ClientMessage) -> Self {
        match message {
            ClientMessage::StartInterview {
                interview_type,
                level,
                resume_text,
            } => Event::StartInterview {
                interview_type,
                level,
                resume_text,
            },
            ClientMessage::Response { response } => Event::Response { text: response },
        }
    }
}
