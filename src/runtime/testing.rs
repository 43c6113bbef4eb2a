//! Mock collaborators and a session harness for testing
//!
//! These mocks enable end-to-end session tests without network access.

use crate::collaborator::{
    AnswerScorer, CollaboratorError, QuestionGenerator, QuestionOutcome, QuestionRequest,
    ScoreRequest,
};
use crate::protocol::ServerMessage;
use crate::runtime::{InboundFrame, Outbound, SessionHandle, SessionManager};
use crate::state_machine::{Feedback, Question, SessionRules, SessionState, TerminationPolicy};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

// ============================================================================
// Mock Question Generator
// ============================================================================

/// Generator that returns queued outcomes; an empty queue is a failure
pub struct MockGenerator {
    outcomes: Mutex<VecDeque<Result<QuestionOutcome, CollaboratorError>>>,
    fail_fallback: bool,
    exhausted_fallback: bool,
    /// Record of all primary requests made
    pub requests: Mutex<Vec<QuestionRequest>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            fail_fallback: false,
            exhausted_fallback: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Make the fallback strategy fail too
    #[must_use]
    pub fn failing_fallback(mut self) -> Self {
        self.fail_fallback = true;
        self
    }

    /// Make the fallback strategy report that it has nothing left to ask
    #[must_use]
    pub fn exhausted_fallback(mut self) -> Self {
        self.exhausted_fallback = true;
        self
    }

    pub fn queue_question(&self, text: &str) {
        self.outcomes
            .lock()
            .unwrap()
            .push_back(Ok(QuestionOutcome::Question(Question::new(text))));
    }

    pub fn queue_exhausted(&self) {
        self.outcomes
            .lock()
            .unwrap()
            .push_back(Ok(QuestionOutcome::Exhausted));
    }

    pub fn queue_error(&self, message: &str) {
        self.outcomes
            .lock()
            .unwrap()
            .push_back(Err(CollaboratorError::Unavailable(message.to_string())));
    }

    pub fn recorded_requests(&self) -> Vec<QuestionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuestionGenerator for MockGenerator {
    async fn generate(&self, request: &QuestionRequest) -> Result<QuestionOutcome, CollaboratorError> {
        self.requests.lock().unwrap().push(request.clone());
        self.outcomes.lock().unwrap().pop_front().unwrap_or_else(|| {
            Err(CollaboratorError::Unavailable(
                "No mock question queued".to_string(),
            ))
        })
    }

    async fn fallback(&self, request: &QuestionRequest) -> Result<QuestionOutcome, CollaboratorError> {
        if self.fail_fallback {
            return Err(CollaboratorError::Unavailable("fallback disabled".to_string()));
        }
        if self.exhausted_fallback {
            return Ok(QuestionOutcome::Exhausted);
        }
        Ok(crate::collaborator::generic_question(request))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Generator whose primary strategy sleeps before answering
pub struct DelayedMockGenerator {
    inner: MockGenerator,
    delay: Duration,
}

impl DelayedMockGenerator {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MockGenerator::new(),
            delay,
        }
    }

    pub fn queue_question(&self, text: &str) {
        self.inner.queue_question(text);
    }
}

#[async_trait]
impl QuestionGenerator for DelayedMockGenerator {
    async fn generate(&self, request: &QuestionRequest) -> Result<QuestionOutcome, CollaboratorError> {
        tokio::time::sleep(self.delay).await;
        self.inner.generate(request).await
    }

    fn name(&self) -> &str {
        "delayed_mock"
    }
}

// ============================================================================
// Mock Answer Scorer
// ============================================================================

/// Scorer that returns queued feedback; an empty queue is a failure
pub struct MockScorer {
    responses: Mutex<VecDeque<Result<Feedback, CollaboratorError>>>,
    /// Record of all requests made
    pub requests: Mutex<Vec<ScoreRequest>>,
}

impl MockScorer {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn queue_feedback(&self, feedback: Feedback) {
        self.responses.lock().unwrap().push_back(Ok(feedback));
    }

    /// Queue feedback with a single `clarity` metric
    pub fn queue_score(&self, clarity: f64) {
        self.queue_feedback(Feedback::new(
            format!("Clarity {clarity}"),
            [("clarity".to_string(), clarity)].into_iter().collect(),
        ));
    }

    pub fn queue_error(&self, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(CollaboratorError::Unavailable(message.to_string())));
    }

    pub fn recorded_requests(&self) -> Vec<ScoreRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockScorer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnswerScorer for MockScorer {
    async fn score(&self, request: &ScoreRequest) -> Result<Feedback, CollaboratorError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses.lock().unwrap().pop_front().unwrap_or_else(|| {
            Err(CollaboratorError::Unavailable(
                "No mock feedback queued".to_string(),
            ))
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Mock scorer with configurable delay (for testing liveness and teardown)
pub struct DelayedMockScorer {
    inner: MockScorer,
    delay: Duration,
    finished: AtomicUsize,
    /// Notified when a request starts (for test synchronization)
    pub request_started: Arc<Notify>,
}

impl DelayedMockScorer {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MockScorer::new(),
            delay,
            finished: AtomicUsize::new(0),
            request_started: Arc::new(Notify::new()),
        }
    }

    pub fn queue_score(&self, clarity: f64) {
        self.inner.queue_score(clarity);
    }

    pub fn queue_feedback(&self, feedback: Feedback) {
        self.inner.queue_feedback(feedback);
    }

    pub fn recorded_requests(&self) -> Vec<ScoreRequest> {
        self.inner.recorded_requests()
    }

    /// Requests that ran to completion
    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnswerScorer for DelayedMockScorer {
    async fn score(&self, request: &ScoreRequest) -> Result<Feedback, CollaboratorError> {
        self.inner.requests.lock().unwrap().push(request.clone());
        self.request_started.notify_one();
        tokio::time::sleep(self.delay).await;
        self.finished.fetch_add(1, Ordering::SeqCst);
        self.inner.responses.lock().unwrap().pop_front().unwrap_or_else(|| {
            Err(CollaboratorError::Unavailable(
                "No mock feedback queued".to_string(),
            ))
        })
    }

    fn name(&self) -> &str {
        "delayed_mock"
    }
}

// ============================================================================
// Test Session Harness
// ============================================================================

/// A running session driven through its channels, as the WebSocket layer would
pub struct TestSession {
    pub handle: SessionHandle,
}

impl TestSession {
    pub fn builder() -> TestSessionBuilder {
        TestSessionBuilder::new()
    }

    pub async fn send_raw(&self, raw: &str) {
        self.handle
            .frames
            .send(InboundFrame::Text(raw.to_string()))
            .await
            .expect("session loop stopped");
    }

    pub async fn send_json(&self, value: serde_json::Value) {
        self.send_raw(&value.to_string()).await;
    }

    pub async fn start(&self, interview_type: &str, level: &str, resume: Option<&str>) {
        self.send_json(serde_json::json!({
            "type": "start_interview",
            "interview_type": interview_type,
            "level": level,
            "resume_text": resume,
        }))
        .await;
    }

    pub async fn respond(&self, text: &str) {
        self.send_json(serde_json::json!({ "type": "response", "response": text }))
            .await;
    }

    /// Next outbound item, `None` on timeout or when the session is gone
    pub async fn next(&mut self, timeout: Duration) -> Option<Outbound> {
        tokio::time::timeout(timeout, self.handle.outbound.recv())
            .await
            .ok()
            .flatten()
    }

    /// Next outbound server message, panicking on timeout or close
    pub async fn expect_message(&mut self) -> ServerMessage {
        match self.next(Duration::from_secs(2)).await {
            Some(Outbound::Message(message)) => message,
            other => panic!("expected a server message, got {other:?}"),
        }
    }

    /// Next message must be of the given kind
    pub async fn expect_kind(&mut self, kind: &str) -> ServerMessage {
        let message = self.expect_message().await;
        assert_eq!(message.kind(), kind, "unexpected message {message:?}");
        message
    }

    /// Assert nothing is sent within `window`
    pub async fn expect_silence(&mut self, window: Duration) {
        if let Some(item) = self.next(window).await {
            panic!("expected silence, got {item:?}");
        }
    }

    /// Drop the inbound side and wait for the loop to return its final state
    pub async fn disconnect(self) -> SessionState {
        let SessionHandle { frames, task, .. } = self.handle;
        drop(frames);
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("session did not stop")
            .expect("session task panicked")
    }
}

pub struct TestSessionBuilder {
    termination: TerminationPolicy,
    timeout: Option<Duration>,
    generator: Option<Arc<dyn QuestionGenerator>>,
    scorer: Option<Arc<dyn AnswerScorer>>,
}

impl TestSessionBuilder {
    pub fn new() -> Self {
        Self {
            termination: TerminationPolicy::MaxTurns(3),
            timeout: None,
            generator: None,
            scorer: None,
        }
    }

    #[must_use]
    pub fn max_turns(mut self, max: usize) -> Self {
        self.termination = TerminationPolicy::MaxTurns(max);
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn generator(mut self, generator: Arc<dyn QuestionGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    #[must_use]
    pub fn scorer(mut self, scorer: Arc<dyn AnswerScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn build(self) -> TestSession {
        let rules = SessionRules::new(
            ["backend", "frontend", "software_engineer"],
            ["junior", "mid", "senior"],
            self.termination,
        );
        let manager = SessionManager::new(
            Arc::new(rules),
            self.generator.unwrap_or_else(|| Arc::new(MockGenerator::new())),
            self.scorer.unwrap_or_else(|| Arc::new(MockScorer::new())),
            self.timeout,
        );
        TestSession {
            handle: manager.spawn_session(Some("test-client".to_string())),
        }
    }
}

impl Default for TestSessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ErrorCode;
    use crate::state_machine::Phase;
    use crate::summary::CompletionReason;
    use serde_json::json;

    const QUIET: Duration = Duration::from_millis(100);

    fn error_code(message: &ServerMessage) -> ErrorCode {
        match message {
            ServerMessage::Error { code, .. } => *code,
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mock_generator_queue() {
        let generator = MockGenerator::new();
        generator.queue_question("Q1");
        let request = QuestionRequest {
            interview_type: "backend".to_string(),
            level: "mid".to_string(),
            resume_context: None,
            history: vec![],
        };

        assert_eq!(
            generator.generate(&request).await.unwrap(),
            QuestionOutcome::Question(Question::new("Q1"))
        );
        // Second call should fail (no more outcomes)
        assert!(generator.generate(&request).await.is_err());
        assert_eq!(generator.recorded_requests().len(), 2);
    }

    /// Start with an empty resume yields exactly one question
    #[tokio::test]
    async fn test_start_emits_exactly_one_question() {
        let generator = Arc::new(MockGenerator::new());
        generator.queue_question("How do indexes work?");
        let mut session = TestSession::builder().generator(generator.clone()).build();

        session.start("backend", "mid", Some("")).await;
        match session.expect_kind("question").await {
            ServerMessage::Question { question, turn, .. } => {
                assert_eq!(question, "How do indexes work?");
                assert_eq!(turn, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
        session.expect_silence(QUIET).await;

        let requests = generator.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].resume_context, None);
    }

    /// Full session reaching the turn limit
    #[tokio::test]
    async fn test_full_session_to_summary() {
        let generator = Arc::new(MockGenerator::new());
        generator.queue_question("Q1");
        generator.queue_question("Q2");
        let scorer = Arc::new(MockScorer::new());
        scorer.queue_score(8.0);
        scorer.queue_score(6.0);

        let mut session = TestSession::builder()
            .max_turns(2)
            .generator(generator.clone())
            .scorer(scorer.clone())
            .build();

        session.start("Backend", "MID", None).await;
        session.expect_kind("question").await;
        session.respond("I'd use an index").await;
        session.expect_kind("ack").await;
        session.expect_kind("feedback").await;
        session.expect_kind("question").await;
        session.respond("Shard by tenant").await;
        session.expect_kind("ack").await;
        session.expect_kind("feedback").await;

        match session.expect_kind("summary").await {
            ServerMessage::Summary { summary } => {
                assert_eq!(summary.score, 70);
                assert_eq!(summary.turns, 2);
                assert_eq!(summary.completion, CompletionReason::MaxTurns);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(session.next(QUIET).await, Some(Outbound::Close));

        // Each answer was scored against the question pending when it was sent
        let scored = scorer.recorded_requests();
        assert_eq!(scored[0].question.text, "Q1");
        assert_eq!(scored[0].answer, "I'd use an index");
        assert_eq!(scored[1].question.text, "Q2");
        assert_eq!(scored[1].level, "mid");

        let history_lengths: Vec<_> = generator
            .recorded_requests()
            .iter()
            .map(|r| r.history.len())
            .collect();
        assert_eq!(history_lengths, vec![0, 1]);

        let state = session.disconnect().await;
        assert!(state.phase.is_terminal());
        assert_eq!(state.history.len(), 2);
    }

    /// Malformed frames are reported and leave the session usable
    #[tokio::test]
    async fn test_malformed_frame_keeps_session_open() {
        let generator = Arc::new(MockGenerator::new());
        generator.queue_question("Q1");
        let mut session = TestSession::builder().generator(generator).build();

        session.send_raw("not json").await;
        let error = session.expect_kind("error").await;
        assert_eq!(error_code(&error), ErrorCode::MalformedMessage);

        session.send_json(json!({"type": "dance"})).await;
        assert_eq!(error_code(&session.expect_message().await), ErrorCode::MalformedMessage);

        session
            .handle
            .frames
            .send(InboundFrame::Binary)
            .await
            .unwrap();
        assert_eq!(error_code(&session.expect_message().await), ErrorCode::MalformedMessage);

        session.start("backend", "junior", None).await;
        session.expect_kind("question").await;
    }

    #[tokio::test]
    async fn test_out_of_phase_messages() {
        let generator = Arc::new(MockGenerator::new());
        generator.queue_question("Q1");
        let mut session = TestSession::builder().generator(generator).build();

        session.respond("too early").await;
        assert_eq!(error_code(&session.expect_message().await), ErrorCode::UnexpectedMessage);

        session.start("astronaut", "junior", None).await;
        assert_eq!(error_code(&session.expect_message().await), ErrorCode::InvalidSetup);

        session.start("backend", "junior", None).await;
        session.expect_kind("question").await;

        session.start("backend", "junior", None).await;
        assert_eq!(error_code(&session.expect_message().await), ErrorCode::AlreadyStarted);
    }

    /// A response while the next question is being generated is rejected
    #[tokio::test]
    async fn test_response_while_awaiting_next_question() {
        let generator = Arc::new(DelayedMockGenerator::new(Duration::from_millis(300)));
        generator.queue_question("Q1");
        let mut session = TestSession::builder().generator(generator).build();

        session.start("backend", "mid", None).await;
        session.respond("eager answer").await;
        assert_eq!(error_code(&session.expect_message().await), ErrorCode::UnexpectedMessage);
        session.expect_kind("question").await;
    }

    /// The ack arrives before slow feedback, and a duplicate answer is refused
    #[tokio::test]
    async fn test_ack_precedes_slow_feedback() {
        let generator = Arc::new(MockGenerator::new());
        generator.queue_question("Q1");
        let scorer = Arc::new(DelayedMockScorer::new(Duration::from_millis(200)));
        scorer.queue_score(5.0);
        let mut session = TestSession::builder()
            .max_turns(1)
            .generator(generator)
            .scorer(scorer.clone())
            .build();

        session.start("backend", "mid", None).await;
        session.expect_kind("question").await;
        session.respond("first").await;
        session.expect_kind("ack").await;

        session.respond("second").await;
        assert_eq!(error_code(&session.expect_message().await), ErrorCode::UnexpectedMessage);

        session.expect_kind("feedback").await;
        session.expect_kind("summary").await;
        assert_eq!(scorer.recorded_requests().len(), 1);
        assert_eq!(scorer.recorded_requests()[0].answer, "first");
    }

    #[tokio::test]
    async fn test_generator_failure_uses_fallback() {
        let generator = Arc::new(MockGenerator::new());
        generator.queue_error("model overloaded");
        let mut session = TestSession::builder().generator(generator).build();

        session.start("backend", "mid", None).await;
        match session.expect_kind("question").await {
            ServerMessage::Question { question, .. } => {
                assert_eq!(question, "Tell me about yourself.");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_persistent_generator_failure_completes_degraded() {
        let generator = Arc::new(MockGenerator::new().failing_fallback());
        generator.queue_error("model overloaded");
        let mut session = TestSession::builder().generator(generator).build();

        session.start("backend", "mid", None).await;
        match session.expect_kind("summary").await {
            ServerMessage::Summary { summary } => {
                assert_eq!(summary.score, 0);
                assert_eq!(summary.turns, 0);
                assert_eq!(summary.completion, CompletionReason::GeneratorFailed);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(session.next(QUIET).await, Some(Outbound::Close));
    }

    #[tokio::test]
    async fn test_fallback_with_nothing_left_completes_degraded() {
        let generator = Arc::new(MockGenerator::new().exhausted_fallback());
        generator.queue_error("model overloaded");
        let mut session = TestSession::builder().generator(generator).build();

        session.start("backend", "mid", None).await;
        match session.expect_kind("summary").await {
            ServerMessage::Summary { summary } => {
                assert_eq!(summary.completion, CompletionReason::GeneratorFailed);
                assert_eq!(summary.turns, 0);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(session.next(QUIET).await, Some(Outbound::Close));
    }

    #[tokio::test]
    async fn test_generator_timeout_falls_back() {
        let generator = Arc::new(DelayedMockGenerator::new(Duration::from_secs(10)));
        generator.queue_question("never delivered");
        let mut session = TestSession::builder()
            .generator(generator)
            .timeout(Duration::from_millis(50))
            .build();

        session.start("backend", "mid", None).await;
        match session.expect_kind("question").await {
            ServerMessage::Question { question, .. } => {
                assert_eq!(question, "Tell me about yourself.");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_exhausted_generator_completes() {
        let generator = Arc::new(MockGenerator::new());
        generator.queue_question("Q1");
        generator.queue_exhausted();
        let scorer = Arc::new(MockScorer::new());
        scorer.queue_score(9.0);
        let mut session = TestSession::builder()
            .max_turns(5)
            .generator(generator)
            .scorer(scorer)
            .build();

        session.start("backend", "mid", None).await;
        session.expect_kind("question").await;
        session.respond("answer").await;
        session.expect_kind("ack").await;
        session.expect_kind("feedback").await;
        match session.expect_kind("summary").await {
            ServerMessage::Summary { summary } => {
                assert_eq!(summary.completion, CompletionReason::QuestionsExhausted);
                assert_eq!(summary.score, 90);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_scoring_failure_allows_resubmission() {
        let generator = Arc::new(MockGenerator::new());
        generator.queue_question("Q1");
        let scorer = Arc::new(MockScorer::new());
        scorer.queue_error("scorer offline");
        scorer.queue_score(7.0);
        let mut session = TestSession::builder()
            .max_turns(1)
            .generator(generator)
            .scorer(scorer.clone())
            .build();

        session.start("backend", "mid", None).await;
        session.expect_kind("question").await;
        session.respond("attempt one").await;
        session.expect_kind("ack").await;
        assert_eq!(error_code(&session.expect_message().await), ErrorCode::CollaboratorFailure);

        session.respond("attempt two").await;
        session.expect_kind("ack").await;
        session.expect_kind("feedback").await;
        session.expect_kind("summary").await;

        let answers: Vec<_> = scorer
            .recorded_requests()
            .into_iter()
            .map(|r| (r.turn, r.answer))
            .collect();
        assert_eq!(
            answers,
            vec![(1, "attempt one".to_string()), (1, "attempt two".to_string())]
        );
    }

    /// Dropping the connection discards the in-flight scoring call
    #[tokio::test]
    async fn test_disconnect_discards_pending_call() {
        let generator = Arc::new(MockGenerator::new());
        generator.queue_question("Q1");
        let scorer = Arc::new(DelayedMockScorer::new(Duration::from_millis(200)));
        scorer.queue_score(9.0);
        let mut session = TestSession::builder()
            .generator(generator)
            .scorer(scorer.clone())
            .build();

        session.start("backend", "mid", None).await;
        session.expect_kind("question").await;
        session.respond("answer").await;
        session.expect_kind("ack").await;
        scorer.request_started.notified().await;

        let state = session.disconnect().await;
        assert!(state.history.is_empty());
        assert!(matches!(state.phase, Phase::AwaitingAnswer { ref pending } if pending.is_scoring()));

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(scorer.finished(), 0);
    }
}
