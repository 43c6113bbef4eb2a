//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across arbitrary event sequences,
//! including collaborator results that arrive late or for the wrong turn.

use super::state::*;
use super::transition::*;
use super::*;
use crate::protocol::ServerMessage;
use proptest::prelude::*;
use std::sync::Arc;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context(termination: TerminationPolicy) -> SessionContext {
    let rules = SessionRules::new(["backend", "frontend"], ["junior", "senior"], termination);
    SessionContext::new("test-session", None, Arc::new(rules))
}

fn phase_rank(phase: &Phase) -> u8 {
    match phase {
        Phase::AwaitingStart => 0,
        Phase::AwaitingNextQuestion { .. } => 1,
        Phase::AwaitingAnswer { .. } => 2,
        Phase::Completed { .. } => 3,
    }
}

/// Phase edges the state machine may take
fn is_allowed_edge(from: &Phase, to: &Phase) -> bool {
    matches!(
        (phase_rank(from), phase_rank(to)),
        (0, 1) | (1, 1 | 2 | 3) | (2, 1 | 2 | 3)
    )
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_strategy() -> impl Strategy<Value = QuestionStrategy> {
    prop_oneof![
        Just(QuestionStrategy::Primary),
        Just(QuestionStrategy::Fallback),
    ]
}

fn arb_feedback() -> impl Strategy<Value = Feedback> {
    (
        "[a-zA-Z ]{1,30}",
        proptest::collection::btree_map(
            prop_oneof![
                Just("clarity".to_string()),
                Just("communication".to_string()),
                Just("technical_accuracy".to_string()),
            ],
            -5.0f64..15.0,
            0..3,
        ),
    )
        .prop_map(|(narrative, metrics)| Feedback::new(narrative, metrics))
}

fn arb_start_event() -> impl Strategy<Value = Event> {
    (
        prop_oneof![Just("backend"), Just("Frontend"), Just("astronaut"), Just("")],
        prop_oneof![Just("junior"), Just("SENIOR"), Just("wizard")],
        proptest::option::of("[a-zA-Z ]{0,40}"),
    )
        .prop_map(|(interview_type, level, resume_text)| Event::StartInterview {
            interview_type: interview_type.to_string(),
            level: level.to_string(),
            resume_text,
        })
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        arb_start_event(),
        "[a-zA-Z ]{1,30}".prop_map(|text| Event::Response { text }),
        (arb_strategy(), "[a-zA-Z ?]{1,30}").prop_map(|(strategy, text)| {
            Event::QuestionGenerated {
                strategy,
                question: Question::new(text),
            }
        }),
        arb_strategy().prop_map(|strategy| Event::QuestionsExhausted { strategy }),
        (arb_strategy(), "[a-z ]{1,20}")
            .prop_map(|(strategy, message)| Event::QuestionFailed { strategy, message }),
        (1usize..5, arb_feedback()).prop_map(|(turn, feedback)| Event::FeedbackReady { turn, feedback }),
        (1usize..5, "[a-z ]{1,20}").prop_map(|(turn, message)| Event::ScoringFailed { turn, message }),
    ]
}

fn arb_termination() -> impl Strategy<Value = TerminationPolicy> {
    prop_oneof![
        (1usize..4).prop_map(TerminationPolicy::MaxTurns),
        Just(TerminationPolicy::UntilExhausted),
    ]
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Only the documented phase edges are ever taken, and rejections change nothing
    #[test]
    fn prop_only_allowed_edges(
        termination in arb_termination(),
        events in proptest::collection::vec(arb_event(), 0..30)
    ) {
        let ctx = test_context(termination);
        let mut state = SessionState::new();

        for event in events {
            if let Ok(result) = transition(&state, &ctx, event) {
                if result.new_state.phase != state.phase {
                    prop_assert!(
                        is_allowed_edge(&state.phase, &result.new_state.phase),
                        "Illegal edge {} -> {}",
                        state.phase.name(),
                        result.new_state.phase.name()
                    );
                }
                state = result.new_state;
            }
        }
    }

    // History only grows, one turn at a time, and earlier turns never change
    #[test]
    fn prop_history_append_only(
        termination in arb_termination(),
        events in proptest::collection::vec(arb_event(), 0..30)
    ) {
        let ctx = test_context(termination);
        let mut state = SessionState::new();

        for event in events {
            if let Ok(result) = transition(&state, &ctx, event) {
                let before = &state.history;
                let after = &result.new_state.history;
                prop_assert!(after.len() == before.len() || after.len() == before.len() + 1);
                prop_assert_eq!(&after[..before.len()], &before[..]);
                state = result.new_state;
            }
        }
    }

    // Every emitted summary carries a score in [0, 100]
    #[test]
    fn prop_summary_score_in_range(
        termination in arb_termination(),
        events in proptest::collection::vec(arb_event(), 0..30)
    ) {
        let ctx = test_context(termination);
        let mut state = SessionState::new();

        for event in events {
            if let Ok(result) = transition(&state, &ctx, event) {
                for effect in &result.effects {
                    if let Effect::Send(ServerMessage::Summary { summary }) = effect {
                        prop_assert!(summary.score <= 100);
                    }
                }
                state = result.new_state;
            }
        }
    }

    // Transitions are deterministic
    #[test]
    fn prop_transition_deterministic(
        events in proptest::collection::vec(arb_event(), 1..20)
    ) {
        let ctx = test_context(TerminationPolicy::MaxTurns(3));
        let mut state = SessionState::new();

        for event in events {
            let first = transition(&state, &ctx, event.clone());
            let second = transition(&state, &ctx, event);
            match (first, second) {
                (Ok(a), Ok(b)) => {
                    prop_assert_eq!(&a.new_state, &b.new_state);
                    prop_assert_eq!(&a.effects, &b.effects);
                    state = a.new_state;
                }
                (Err(a), Err(b)) => prop_assert_eq!(a, b),
                (a, b) => prop_assert!(false, "Diverged: {:?} vs {:?}", a, b),
            }
        }
    }

    // At most one question is outstanding, and nothing is asked once completed
    #[test]
    fn prop_one_question_at_a_time(
        termination in arb_termination(),
        events in proptest::collection::vec(arb_event(), 0..30)
    ) {
        let ctx = test_context(termination);
        let mut state = SessionState::new();

        for event in events {
            if let Ok(result) = transition(&state, &ctx, event) {
                let questions = result.effects.iter().filter(|e| e.is_question()).count();
                prop_assert!(questions <= 1);
                if questions == 1 {
                    prop_assert!(
                        matches!(state.phase, Phase::AwaitingNextQuestion { .. }),
                        "question sent outside AwaitingNextQuestion"
                    );
                    prop_assert!(
                        matches!(result.new_state.phase, Phase::AwaitingAnswer { .. }),
                        "question sent without moving to AwaitingAnswer"
                    );
                }
                state = result.new_state;
            }
        }
    }

    // A completed session rejects every event
    #[test]
    fn prop_completed_is_terminal(
        events in proptest::collection::vec(arb_event(), 1..20)
    ) {
        let ctx = test_context(TerminationPolicy::MaxTurns(3));
        let start = transition(
            &SessionState::new(),
            &ctx,
            Event::StartInterview {
                interview_type: "backend".to_string(),
                level: "junior".to_string(),
                resume_text: None,
            },
        )
        .unwrap()
        .new_state;
        let completed = transition(
            &start,
            &ctx,
            Event::QuestionsExhausted { strategy: QuestionStrategy::Primary },
        )
        .unwrap()
        .new_state;
        prop_assert!(completed.phase.is_terminal());

        for event in events {
            prop_assert!(transition(&completed, &ctx, event).is_err());
        }
    }

    // Feedback metrics always land inside the metric range
    #[test]
    fn prop_feedback_metrics_clamped(feedback in arb_feedback()) {
        for value in feedback.metrics.values() {
            prop_assert!((turn::METRIC_MIN..=turn::METRIC_MAX).contains(value));
        }
    }
}
