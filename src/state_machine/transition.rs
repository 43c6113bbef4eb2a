//! Pure state transition function
//!
//! Given the same state, context and event this always produces the same
//! new state and effects. All I/O happens in the runtime that executes the
//! returned effects.

use super::state::{
    normalize_label, normalize_resume, InterviewSetup, Phase, QuestionStrategy, SessionContext,
    SessionState,
};
use super::turn::{PendingQuestion, Turn};
use super::{Effect, Event};
use crate::collaborator::{QuestionRequest, ScoreRequest};
use crate::protocol::{ErrorCode, ServerMessage};
use crate::summary::{build_summary, CompletionReason};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: SessionState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: SessionState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    #[must_use]
    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Events the current phase refuses. None of these change state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("{0}")]
    InvalidSetup(String),
    #[error("The interview has already started")]
    AlreadyStarted,
    #[error("{0}")]
    UnexpectedMessage(String),
    /// A collaborator result that no longer matches the session
    #[error("Stale result: {0}")]
    StaleResult(String),
}

impl TransitionError {
    /// Code to report to the client, `None` for rejections the client never caused
    pub fn client_code(&self) -> Option<ErrorCode> {
        match self {
            TransitionError::InvalidSetup(_) => Some(ErrorCode::InvalidSetup),
            TransitionError::AlreadyStarted => Some(ErrorCode::AlreadyStarted),
            TransitionError::UnexpectedMessage(_) => Some(ErrorCode::UnexpectedMessage),
            TransitionError::StaleResult(_) => None,
        }
    }
}

/// Pure transition function
#[allow(clippy::too_many_lines)]
pub fn transition(
    state: &SessionState,
    context: &SessionContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (&state.phase, event) {
        // ============================================================
        // Session start
        // ============================================================

        // AwaitingStart + StartInterview -> AwaitingNextQuestion
        (
            Phase::AwaitingStart,
            Event::StartInterview {
                interview_type,
                level,
                resume_text,
            },
        ) => {
            let setup = validate_setup(context, &interview_type, &level, resume_text)?;
            let request = question_request(&setup, &state.history);
            let next = SessionState {
                phase: Phase::AwaitingNextQuestion {
                    strategy: QuestionStrategy::Primary,
                },
                setup: Some(setup),
                history: state.history.clone(),
            };
            Ok(TransitionResult::new(next).with_effect(Effect::RequestQuestion {
                strategy: QuestionStrategy::Primary,
                request,
            }))
        }

        (_, Event::StartInterview { .. }) => Err(TransitionError::AlreadyStarted),

        // ============================================================
        // Candidate answers
        // ============================================================

        // AwaitingAnswer + Response -> AwaitingAnswer (scoring)
        (Phase::AwaitingAnswer { pending }, Event::Response { text }) if !pending.is_scoring() => {
            let setup = require_setup(state)?;
            let request = ScoreRequest {
                turn: pending.turn,
                question: pending.question.clone(),
                answer: text.clone(),
                interview_type: setup.interview_type.clone(),
                level: setup.level.clone(),
            };
            let next = SessionState {
                phase: Phase::AwaitingAnswer {
                    pending: pending.with_answer(text),
                },
                ..state.clone()
            };
            Ok(TransitionResult::new(next)
                .with_effect(Effect::Send(ServerMessage::Ack))
                .with_effect(Effect::RequestFeedback { request }))
        }

        (Phase::AwaitingAnswer { pending }, Event::Response { .. }) => {
            Err(TransitionError::UnexpectedMessage(format!(
                "An answer to question {} is already being scored",
                pending.turn
            )))
        }

        (phase, Event::Response { .. }) => Err(TransitionError::UnexpectedMessage(format!(
            "No question is awaiting an answer (phase: {})",
            phase.name()
        ))),

        // ============================================================
        // Question generation
        // ============================================================

        // AwaitingNextQuestion + QuestionGenerated -> AwaitingAnswer
        (
            Phase::AwaitingNextQuestion { strategy },
            Event::QuestionGenerated {
                strategy: produced_by,
                question,
            },
        ) if *strategy == produced_by => {
            let turn = state.history.len() + 1;
            let message = ServerMessage::question(&question, turn);
            let next = SessionState {
                phase: Phase::AwaitingAnswer {
                    pending: PendingQuestion::new(turn, question),
                },
                ..state.clone()
            };
            Ok(TransitionResult::new(next).with_effect(Effect::Send(message)))
        }

        // Primary generator failed -> retry once with the fallback strategy
        (
            Phase::AwaitingNextQuestion {
                strategy: QuestionStrategy::Primary,
            },
            Event::QuestionFailed {
                strategy: QuestionStrategy::Primary,
                ..
            },
        ) => {
            let setup = require_setup(state)?;
            let request = question_request(setup, &state.history);
            let next = SessionState {
                phase: Phase::AwaitingNextQuestion {
                    strategy: QuestionStrategy::Fallback,
                },
                ..state.clone()
            };
            Ok(TransitionResult::new(next).with_effect(Effect::RequestQuestion {
                strategy: QuestionStrategy::Fallback,
                request,
            }))
        }

        // Fallback failed or ran dry too -> Completed (degraded)
        (
            Phase::AwaitingNextQuestion {
                strategy: QuestionStrategy::Fallback,
            },
            Event::QuestionFailed {
                strategy: QuestionStrategy::Fallback,
                ..
            }
            | Event::QuestionsExhausted {
                strategy: QuestionStrategy::Fallback,
            },
        ) => Ok(complete(state, state.history.clone(), CompletionReason::GeneratorFailed)),

        // Generator has nothing left to ask -> Completed
        (
            Phase::AwaitingNextQuestion { strategy },
            Event::QuestionsExhausted {
                strategy: produced_by,
            },
        ) if *strategy == produced_by => Ok(complete(
            state,
            state.history.clone(),
            CompletionReason::QuestionsExhausted,
        )),

        // ============================================================
        // Scoring
        // ============================================================

        // AwaitingAnswer + FeedbackReady -> AwaitingNextQuestion | Completed
        (Phase::AwaitingAnswer { pending }, Event::FeedbackReady { turn, feedback })
            if pending.turn == turn && pending.is_scoring() =>
        {
            let completed = pending.complete(feedback.clone()).ok_or_else(|| {
                TransitionError::StaleResult(format!("turn {turn} has no answer attached"))
            })?;
            let mut history = state.history.clone();
            history.push(completed);

            let feedback_message = Effect::Send(ServerMessage::feedback(&feedback));

            if context.rules.termination.should_complete(history.len()) {
                return Ok(TransitionResult::new(state.clone())
                    .with_effect(feedback_message)
                    .merge(complete(state, history, CompletionReason::MaxTurns)));
            }

            let setup = require_setup(state)?;
            let request = question_request(setup, &history);
            let next = SessionState {
                phase: Phase::AwaitingNextQuestion {
                    strategy: QuestionStrategy::Primary,
                },
                setup: state.setup.clone(),
                history,
            };
            Ok(TransitionResult::new(next)
                .with_effect(feedback_message)
                .with_effect(Effect::RequestQuestion {
                    strategy: QuestionStrategy::Primary,
                    request,
                }))
        }

        // Scorer failed -> detach the answer so the candidate can resubmit
        (Phase::AwaitingAnswer { pending }, Event::ScoringFailed { turn, message })
            if pending.turn == turn && pending.is_scoring() =>
        {
            let next = SessionState {
                phase: Phase::AwaitingAnswer {
                    pending: pending.without_answer(),
                },
                ..state.clone()
            };
            Ok(TransitionResult::new(next).with_effect(Effect::send_error(
                ErrorCode::CollaboratorFailure,
                format!("Could not score your answer ({message}). Please send it again."),
            )))
        }

        // ============================================================
        // Stale collaborator results
        // ============================================================
        (phase, event) => Err(TransitionError::StaleResult(format!(
            "{} does not apply in phase {}",
            event.name(),
            phase.name()
        ))),
    }
}

impl TransitionResult {
    /// Append another result's effects and adopt its state
    fn merge(mut self, other: TransitionResult) -> Self {
        self.new_state = other.new_state;
        self.effects.extend(other.effects);
        self
    }
}

// Helper functions

fn complete(state: &SessionState, history: Vec<Turn>, reason: CompletionReason) -> TransitionResult {
    let summary = build_summary(&history, reason);
    let message = ServerMessage::summary(&summary);
    let next = SessionState {
        phase: Phase::Completed { summary },
        setup: state.setup.clone(),
        history,
    };
    TransitionResult::new(next).with_effects([Effect::Send(message), Effect::CloseConnection])
}

fn validate_setup(
    context: &SessionContext,
    interview_type: &str,
    level: &str,
    resume_text: Option<String>,
) -> Result<InterviewSetup, TransitionError> {
    let interview_type = normalize_label(interview_type);
    let level = normalize_label(level);
    let rules = &context.rules;

    if interview_type.is_empty() {
        return Err(TransitionError::InvalidSetup(
            "interview_type must not be empty".to_string(),
        ));
    }
    if level.is_empty() {
        return Err(TransitionError::InvalidSetup(
            "level must not be empty".to_string(),
        ));
    }
    if !rules.interview_types.contains(&interview_type) {
        return Err(TransitionError::InvalidSetup(format!(
            "Unknown interview_type `{interview_type}`; expected one of: {}",
            join(&rules.interview_types)
        )));
    }
    if !rules.levels.contains(&level) {
        return Err(TransitionError::InvalidSetup(format!(
            "Unknown level `{level}`; expected one of: {}",
            join(&rules.levels)
        )));
    }

    Ok(InterviewSetup {
        interview_type,
        level,
        resume_context: normalize_resume(resume_text),
    })
}

fn join<'a>(items: impl IntoIterator<Item = &'a String>) -> String {
    items
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn require_setup(state: &SessionState) -> Result<&InterviewSetup, TransitionError> {
    state.setup.as_ref().ok_or_else(|| {
        TransitionError::StaleResult(format!(
            "session has no setup in phase {}",
            state.phase.name()
        ))
    })
}

fn question_request(setup: &InterviewSetup, history: &[Turn]) -> QuestionRequest {
    QuestionRequest {
        interview_type: setup.interview_type.clone(),
        level: setup.level.clone(),
        resume_context: setup.resume_context.clone(),
        history: history.to_vec(),
    }
}
