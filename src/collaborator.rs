//! Question generation and answer scoring collaborators
//!
//! The session core decides when these run; implementations decide what
//! to ask and how to grade. All implementations are stateless with respect
//! to a session: everything they need arrives in the request.

pub mod heuristic;
pub mod openai;
pub mod question_bank;

use crate::config::AppConfig;
use crate::state_machine::{Feedback, Question, QuestionCategory, Turn};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use heuristic::HeuristicScorer;
pub use openai::OpenAiCollaborator;
pub use question_bank::QuestionBank;

/// Generic questions used when the primary generator fails
pub const FALLBACK_QUESTIONS: &[(&str, QuestionCategory)] = &[
    ("Tell me about yourself.", QuestionCategory::Intro),
    (
        "Explain a technical concept you know well.",
        QuestionCategory::Technical,
    ),
    (
        "Describe a challenging situation you faced at work.",
        QuestionCategory::Behavioral,
    ),
];

/// Everything a generator may use to pick the next question
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionRequest {
    pub interview_type: String,
    pub level: String,
    pub resume_context: Option<String>,
    pub history: Vec<Turn>,
}

impl QuestionRequest {
    /// 1-based turn number the generated question will occupy
    pub fn turn(&self) -> usize {
        self.history.len() + 1
    }

    pub fn has_asked(&self, text: &str) -> bool {
        self.history.iter().any(|turn| turn.question.text == text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QuestionOutcome {
    Question(Question),
    /// The generator has no further questions for this session
    Exhausted,
}

/// An answer to grade, paired with the question it was given for
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRequest {
    pub turn: usize,
    pub question: Question,
    pub answer: String,
    pub interview_type: String,
    pub level: String,
}

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("unavailable: {0}")]
    Unavailable(String),
    #[error("invalid reply: {0}")]
    InvalidReply(String),
}

/// Produces interview questions
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    /// Next question for the session, or `Exhausted`
    async fn generate(&self, request: &QuestionRequest) -> Result<QuestionOutcome, CollaboratorError>;

    /// Generic-question strategy tried once after `generate` fails
    async fn fallback(&self, request: &QuestionRequest) -> Result<QuestionOutcome, CollaboratorError> {
        Ok(generic_question(request))
    }

    fn name(&self) -> &str;
}

/// Grades candidate answers
#[async_trait]
pub trait AnswerScorer: Send + Sync {
    async fn score(&self, request: &ScoreRequest) -> Result<Feedback, CollaboratorError>;

    fn name(&self) -> &str;
}

/// First generic question the session has not seen yet
pub fn generic_question(request: &QuestionRequest) -> QuestionOutcome {
    FALLBACK_QUESTIONS
        .iter()
        .find(|(text, _)| !request.has_asked(text))
        .map_or(QuestionOutcome::Exhausted, |&(text, category)| {
            QuestionOutcome::Question(Question::new(text).with_category(category))
        })
}

/// The generator/scorer pair every session shares
pub struct Collaborators {
    pub generator: Arc<dyn QuestionGenerator>,
    pub scorer: Arc<dyn AnswerScorer>,
    /// Interview types contributed by question bank files
    pub bank_types: Vec<String>,
}

impl Collaborators {
    /// Question bank and heuristic scorer, replaced by the LLM client for
    /// both roles when an API key is configured.
    pub fn from_config(config: &AppConfig) -> Result<Self, CollaboratorError> {
        let mut bank = match &config.question_bank_dir {
            Some(dir) => QuestionBank::load_dir(dir).map_err(|e| {
                CollaboratorError::Unavailable(format!(
                    "cannot read question bank directory {}: {e}",
                    dir.display()
                ))
            })?,
            None => QuestionBank::builtin(),
        };
        if let Some(seed) = config.question_seed {
            bank = bank.with_seed(seed);
        }
        let bank_types = bank.interview_types();

        let collaborators = match &config.llm {
            Some(settings) => {
                let client = Arc::new(OpenAiCollaborator::new(settings.clone())?);
                tracing::info!(model = %settings.model, "Using LLM collaborator");
                Self {
                    generator: client.clone(),
                    scorer: client,
                    bank_types,
                }
            }
            None => {
                tracing::info!("No API key configured, using question bank and heuristic scorer");
                Self {
                    generator: Arc::new(bank),
                    scorer: Arc::new(HeuristicScorer::new()),
                    bank_types,
                }
            }
        };
        Ok(collaborators)
    }
}
