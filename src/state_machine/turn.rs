//! Question, answer and feedback records for a single interview turn

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lowest score a metric may carry
pub const METRIC_MIN: f64 = 0.0;
/// Highest score a metric may carry
pub const METRIC_MAX: f64 = 10.0;

/// Interview phase a question belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionCategory {
    Intro,
    Technical,
    Behavioral,
}

impl QuestionCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionCategory::Intro => "intro",
            QuestionCategory::Technical => "technical",
            QuestionCategory::Behavioral => "behavioral",
        }
    }
}

/// A question posed to the candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<QuestionCategory>,
}

impl Question {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            category: None,
        }
    }

    #[must_use]
    pub fn with_category(mut self, category: QuestionCategory) -> Self {
        self.category = Some(category);
        self
    }
}

/// Scorer output for one answer
///
/// Metric values are clamped into `[METRIC_MIN, METRIC_MAX]` on
/// construction; non-finite values are dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub narrative: String,
    pub metrics: BTreeMap<String, f64>,
}

impl Feedback {
    pub fn new(narrative: impl Into<String>, metrics: BTreeMap<String, f64>) -> Self {
        let metrics = metrics
            .into_iter()
            .filter(|(_, value)| value.is_finite())
            .map(|(name, value)| (name, value.clamp(METRIC_MIN, METRIC_MAX)))
            .collect();
        Self {
            narrative: narrative.into(),
            metrics,
        }
    }

    /// Mean of this turn's metrics, `None` when the scorer reported none
    #[allow(clippy::cast_precision_loss)] // metric counts are tiny
    pub fn metric_mean(&self) -> Option<f64> {
        if self.metrics.is_empty() {
            return None;
        }
        let total: f64 = self.metrics.values().sum();
        Some(total / self.metrics.len() as f64)
    }
}

/// A completed question/answer/feedback triple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub question: Question,
    pub answer: String,
    pub feedback: Feedback,
}

/// The single outstanding question of an `AwaitingAnswer` session
#[derive(Debug, Clone, PartialEq)]
pub struct PendingQuestion {
    /// 1-based position of this question in the interview
    pub turn: usize,
    pub question: Question,
    /// Answer being scored; `None` until the candidate responds
    pub answer: Option<String>,
}

impl PendingQuestion {
    pub fn new(turn: usize, question: Question) -> Self {
        Self {
            turn,
            question,
            answer: None,
        }
    }

    pub fn is_scoring(&self) -> bool {
        self.answer.is_some()
    }

    #[must_use]
    pub fn with_answer(&self, answer: impl Into<String>) -> Self {
        Self {
            answer: Some(answer.into()),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn without_answer(&self) -> Self {
        Self {
            answer: None,
            ..self.clone()
        }
    }

    /// Close the turn with its feedback. Returns `None` if no answer was attached.
    pub fn complete(&self, feedback: Feedback) -> Option<Turn> {
        let answer = self.answer.clone()?;
        Some(Turn {
            question: self.question.clone(),
            answer,
            feedback,
        })
    }
}
