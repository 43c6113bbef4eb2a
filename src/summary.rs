//! End-of-session summary
//!
//! Summaries are derived from the accumulated turn history only, so the same
//! history always yields the same summary.

use crate::state_machine::Turn;
use serde::Serialize;
use std::collections::BTreeMap;

/// Metric averages at or above this are reported as strengths
pub const STRENGTH_THRESHOLD: f64 = 7.0;
/// Metric averages below this produce a recommendation
pub const WEAKNESS_THRESHOLD: f64 = 5.0;

/// Why the session stopped asking questions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    /// The configured number of turns was reached
    MaxTurns,
    /// The question generator had nothing left to ask
    QuestionsExhausted,
    /// Both the primary and fallback question sources failed
    GeneratorFailed,
}

impl CompletionReason {
    /// True when the interview ended early because of a collaborator failure
    pub fn is_degraded(self) -> bool {
        matches!(self, CompletionReason::GeneratorFailed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    /// Overall score in `[0, 100]`
    pub score: u8,
    pub overview: String,
    pub turns: usize,
    pub completion: CompletionReason,
    pub strengths: Vec<String>,
    pub recommendations: Vec<String>,
    /// Per-metric mean across all turns that reported the metric
    pub metric_averages: BTreeMap<String, f64>,
}

/// Build the summary for a finished session
///
/// The score is the mean of each turn's metric mean, scaled from the 0-10
/// metric range to 0-100. Turns without metrics do not contribute. An empty
/// history scores 0.
pub fn build_summary(history: &[Turn], completion: CompletionReason) -> SessionSummary {
    let metric_averages = metric_averages(history);
    let score = overall_score(history);

    let strengths: Vec<String> = metric_averages
        .iter()
        .filter(|(_, avg)| **avg >= STRENGTH_THRESHOLD)
        .map(|(name, avg)| format!("Strong {} (average {avg:.1}/10)", display_name(name)))
        .collect();

    let mut recommendations: Vec<String> = metric_averages
        .iter()
        .filter(|(_, avg)| **avg < WEAKNESS_THRESHOLD)
        .map(|(name, _)| recommendation_for(name))
        .collect();
    if recommendations.is_empty() && !history.is_empty() {
        recommendations.push("Provide more specific examples.".to_string());
    }

    SessionSummary {
        score,
        overview: overview(history.len(), score, completion),
        turns: history.len(),
        completion,
        strengths,
        recommendations,
        metric_averages,
    }
}

#[allow(clippy::cast_precision_loss)]
fn metric_averages(history: &[Turn]) -> BTreeMap<String, f64> {
    let mut totals: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for turn in history {
        for (name, value) in &turn.feedback.metrics {
            let entry = totals.entry(name.as_str()).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
    }
    totals
        .into_iter()
        .map(|(name, (total, count))| (name.to_string(), total / count as f64))
        .collect()
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn overall_score(history: &[Turn]) -> u8 {
    let means: Vec<f64> = history
        .iter()
        .filter_map(|turn| turn.feedback.metric_mean())
        .collect();
    if means.is_empty() {
        return 0;
    }
    let mean = means.iter().sum::<f64>() / means.len() as f64;
    // clamped to [0, 100] so the cast is exact
    (mean * 10.0).round().clamp(0.0, 100.0) as u8
}

fn overview(turns: usize, score: u8, completion: CompletionReason) -> String {
    if turns == 0 {
        return match completion {
            CompletionReason::GeneratorFailed => {
                "The interview ended before any question could be asked. Score: 0/100.".to_string()
            }
            _ => "No turns were completed. Score: 0/100.".to_string(),
        };
    }
    let plural = if turns == 1 { "" } else { "s" };
    match completion {
        CompletionReason::MaxTurns => {
            format!("You completed {turns} question{plural}. Overall score: {score}/100.")
        }
        CompletionReason::QuestionsExhausted => format!(
            "You answered all {turns} available question{plural}. Overall score: {score}/100."
        ),
        CompletionReason::GeneratorFailed => format!(
            "The interview ended early after {turns} question{plural} because no further \
             questions could be generated. Overall score: {score}/100."
        ),
    }
}

fn display_name(metric: &str) -> String {
    metric.replace('_', " ")
}

fn recommendation_for(metric: &str) -> String {
    match metric {
        "clarity" => "Structure answers with a clear beginning, middle, and end.".to_string(),
        "technical_accuracy" => {
            "Review core technical concepts and tie your answers to the question asked."
                .to_string()
        }
        "communication" => "Explain your reasoning step by step as you answer.".to_string(),
        "confidence" => "Cut filler words and state your points directly.".to_string(),
        "pace" => "Give fuller answers with supporting detail.".to_string(),
        other => format!("Work on your {}.", display_name(other)),
    }
}
