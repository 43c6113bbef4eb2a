//! Session state types

use super::turn::{PendingQuestion, Turn};
use crate::summary::SessionSummary;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Resume text beyond this many characters is dropped
pub const MAX_RESUME_CHARS: usize = 4000;

/// Which question source the coordinator should use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionStrategy {
    /// The configured generator
    Primary,
    /// Generic questions, used once after the primary generator fails
    Fallback,
}

impl QuestionStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionStrategy::Primary => "primary",
            QuestionStrategy::Fallback => "fallback",
        }
    }
}

/// Position of the session in the interview lifecycle
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Phase {
    /// Connection open, waiting for `start_interview`
    #[default]
    AwaitingStart,

    /// A question request is in flight
    AwaitingNextQuestion { strategy: QuestionStrategy },

    /// A question was sent; waiting for (or scoring) the candidate's answer
    AwaitingAnswer { pending: PendingQuestion },

    /// Terminal: the summary has been built and sent
    Completed { summary: SessionSummary },
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::AwaitingStart => "awaiting_start",
            Phase::AwaitingNextQuestion { .. } => "awaiting_next_question",
            Phase::AwaitingAnswer { .. } => "awaiting_answer",
            Phase::Completed { .. } => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed { .. })
    }

    pub fn pending_question(&self) -> Option<&PendingQuestion> {
        match self {
            Phase::AwaitingAnswer { pending } => Some(pending),
            _ => None,
        }
    }
}

/// Candidate context captured from `start_interview`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterviewSetup {
    pub interview_type: String,
    pub level: String,
    pub resume_context: Option<String>,
}

/// Mutable session state, replaced wholesale by each transition
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionState {
    pub phase: Phase,
    /// Set once when the interview starts
    pub setup: Option<InterviewSetup>,
    /// Append-only
    pub history: Vec<Turn>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// When a session stops asking questions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationPolicy {
    /// Complete once this many turns are in the history
    MaxTurns(usize),
    /// Keep going until the generator reports exhaustion
    UntilExhausted,
}

impl TerminationPolicy {
    pub fn should_complete(self, completed_turns: usize) -> bool {
        match self {
            TerminationPolicy::MaxTurns(max) => completed_turns >= max,
            TerminationPolicy::UntilExhausted => false,
        }
    }
}

impl Default for TerminationPolicy {
    fn default() -> Self {
        // 2 intro + 3 technical + 2 behavioral
        TerminationPolicy::MaxTurns(7)
    }
}

/// Validation and termination rules shared by every session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRules {
    pub interview_types: BTreeSet<String>,
    pub levels: BTreeSet<String>,
    pub termination: TerminationPolicy,
}

impl SessionRules {
    pub fn new(
        interview_types: impl IntoIterator<Item = impl AsRef<str>>,
        levels: impl IntoIterator<Item = impl AsRef<str>>,
        termination: TerminationPolicy,
    ) -> Self {
        Self {
            interview_types: interview_types
                .into_iter()
                .map(|t| normalize_label(t.as_ref()))
                .filter(|t| !t.is_empty())
                .collect(),
            levels: levels
                .into_iter()
                .map(|l| normalize_label(l.as_ref()))
                .filter(|l| !l.is_empty())
                .collect(),
            termination,
        }
    }
}

/// Context for a session (immutable for its lifetime)
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,
    /// Label supplied in the connection URL, if any
    pub client_id: Option<String>,
    pub rules: Arc<SessionRules>,
}

impl SessionContext {
    pub fn new(
        session_id: impl Into<String>,
        client_id: Option<String>,
        rules: Arc<SessionRules>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            client_id,
            rules,
        }
    }
}

/// Canonical form of an interview type or level: trimmed, lower-case,
/// inner whitespace collapsed to `_`.
pub fn normalize_label(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

/// Blank resumes become `None`; long ones are cut at a character boundary.
pub fn normalize_resume(raw: Option<String>) -> Option<String> {
    let text = raw?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.chars().count() > MAX_RESUME_CHARS {
        tracing::warn!(
            chars = trimmed.chars().count(),
            limit = MAX_RESUME_CHARS,
            "Resume text too long, truncating"
        );
        return Some(trimmed.chars().take(MAX_RESUME_CHARS).collect());
    }
    Some(trimmed.to_string())
}
