//! Deterministic answer scorer based on surface features of the answer text

use super::{AnswerScorer, CollaboratorError, ScoreRequest};
use crate::state_machine::Feedback;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};

const FILLER_WORDS: &[&str] = &["um", "uh", "like", "ah", "er", "hmm"];
const FILLER_PHRASES: &[&str] = &["you know", "i mean", "sort of", "kind of"];

const STOP_WORDS: &[&str] = &[
    "about", "after", "also", "been", "between", "could", "describe", "does", "explain", "from",
    "have", "into", "tell", "that", "their", "there", "these", "they", "this", "time", "were",
    "what", "when", "where", "which", "while", "with", "would", "your",
];

/// Surface statistics of an answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerStats {
    pub word_count: usize,
    pub filler_count: usize,
    pub sentence_count: usize,
}

impl AnswerStats {
    pub fn of(answer: &str) -> Self {
        let lowered = answer.to_lowercase();
        let words: Vec<&str> = lowered
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|w| !w.is_empty())
            .collect();
        let single = words.iter().filter(|w| FILLER_WORDS.contains(w)).count();
        let joined = words.join(" ");
        let phrases: usize = FILLER_PHRASES
            .iter()
            .map(|phrase| joined.matches(phrase).count())
            .sum();
        let sentence_count = answer
            .split(['.', '!', '?'])
            .filter(|s| !s.trim().is_empty())
            .count();
        Self {
            word_count: words.len(),
            filler_count: single + phrases,
            sentence_count,
        }
    }

    /// Words per minute proxy: longer answers pace higher, 1..=10
    pub fn pace(self) -> f64 {
        let raw = self.word_count.saturating_mul(6) / 10;
        bounded(raw, 1, 10)
    }

    /// Every filler costs two points, 1..=10
    pub fn confidence(self) -> f64 {
        let raw = 10usize.saturating_sub(self.filler_count.saturating_mul(2));
        bounded(raw, 1, 10)
    }
}

#[allow(clippy::cast_precision_loss)]
fn bounded(value: usize, min: usize, max: usize) -> f64 {
    value.clamp(min, max) as f64
}

/// Scores answers from word counts, filler words and keyword overlap
/// with the question. Requires no network access.
#[derive(Debug, Default)]
pub struct HeuristicScorer;

impl HeuristicScorer {
    pub fn new() -> Self {
        Self
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn evaluate(request: &ScoreRequest) -> Feedback {
        let stats = AnswerStats::of(&request.answer);
        let mut metrics = BTreeMap::new();

        if stats.word_count == 0 {
            for name in ["clarity", "technical_accuracy", "communication", "confidence", "pace"] {
                metrics.insert(name.to_string(), 0.0);
            }
            return Feedback::new("No answer was given.", metrics);
        }

        let words_per_sentence = stats.word_count as f64 / stats.sentence_count.max(1) as f64;
        let structure = if (8.0..=25.0).contains(&words_per_sentence) {
            8.0
        } else if words_per_sentence < 8.0 {
            6.0
        } else {
            5.0
        };
        let clarity = structure - 0.5 * stats.filler_count as f64;

        let overlap = keyword_overlap(&request.question.text, &request.answer);
        let technical_accuracy = 2.0 + 8.0 * overlap;

        let communication = (stats.word_count as f64 / 6.0).min(10.0);

        metrics.insert("clarity".to_string(), clarity);
        metrics.insert("technical_accuracy".to_string(), technical_accuracy);
        metrics.insert("communication".to_string(), communication);
        metrics.insert("confidence".to_string(), stats.confidence());
        metrics.insert("pace".to_string(), stats.pace());

        let feedback = Feedback::new(String::new(), metrics);
        let narrative = narrative(&stats, &feedback);
        Feedback {
            narrative,
            ..feedback
        }
    }
}

#[async_trait]
impl AnswerScorer for HeuristicScorer {
    async fn score(&self, request: &ScoreRequest) -> Result<Feedback, CollaboratorError> {
        Ok(Self::evaluate(request))
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}

fn keywords(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 4)
        .map(str::to_lowercase)
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

/// Fraction of the question's keywords the answer mentions, 0.5 when the
/// question has none
#[allow(clippy::cast_precision_loss)]
fn keyword_overlap(question: &str, answer: &str) -> f64 {
    let wanted = keywords(question);
    if wanted.is_empty() {
        return 0.5;
    }
    let given = keywords(answer);
    wanted.intersection(&given).count() as f64 / wanted.len() as f64
}

fn narrative(stats: &AnswerStats, feedback: &Feedback) -> String {
    let metric = |name: &str| feedback.metrics.get(name).copied().unwrap_or_default();
    let mut parts = vec![format!(
        "Your answer was {} word{}.",
        stats.word_count,
        if stats.word_count == 1 { "" } else { "s" }
    )];

    if metric("technical_accuracy") >= 7.0 {
        parts.push("You addressed the key points of the question.".to_string());
    } else {
        parts.push("Tie your answer more directly to the question asked.".to_string());
    }
    if stats.filler_count > 0 {
        parts.push(format!(
            "Watch for filler words ({} found).",
            stats.filler_count
        ));
    }
    if metric("communication") < 5.0 {
        parts.push("Add detail and a concrete example.".to_string());
    }
    parts.join(" ")
}
