//! Turn coordinator
//!
//! Runs collaborator calls off the session loop and feeds their results
//! back in as events. Calls race the session's cancellation token, so once
//! the session is torn down no result is ever delivered.

use crate::collaborator::{
    AnswerScorer, CollaboratorError, QuestionGenerator, QuestionOutcome, QuestionRequest,
    ScoreRequest,
};
use crate::state_machine::{Event, QuestionCategory, QuestionStrategy};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

pub struct TurnCoordinator<G: ?Sized, S: ?Sized> {
    generator: Arc<G>,
    scorer: Arc<S>,
    /// Applied to every collaborator call; expiry counts as a failure
    timeout: Option<Duration>,
    event_tx: mpsc::Sender<Event>,
    cancel: CancellationToken,
}

impl<G, S> TurnCoordinator<G, S>
where
    G: QuestionGenerator + ?Sized + 'static,
    S: AnswerScorer + ?Sized + 'static,
{
    pub fn new(
        generator: Arc<G>,
        scorer: Arc<S>,
        timeout: Option<Duration>,
        event_tx: mpsc::Sender<Event>,
    ) -> Self {
        Self {
            generator,
            scorer,
            timeout,
            event_tx,
            cancel: CancellationToken::new(),
        }
    }

    /// Spawn a question request; answers with `QuestionGenerated`,
    /// `QuestionsExhausted` or `QuestionFailed`
    pub fn request_question(&self, strategy: QuestionStrategy, request: QuestionRequest) {
        let generator = self.generator.clone();
        let event_tx = self.event_tx.clone();
        let cancel = self.cancel.clone();
        let timeout = self.timeout;

        tokio::spawn(
            async move {
                tracing::debug!(
                    strategy = strategy.as_str(),
                    turn = request.turn(),
                    generator = generator.name(),
                    "Requesting question"
                );
                let call = async {
                    match strategy {
                        QuestionStrategy::Primary => generator.generate(&request).await,
                        QuestionStrategy::Fallback => generator.fallback(&request).await,
                    }
                };

                tokio::select! {
                    biased;

                    () = cancel.cancelled() => {
                        tracing::debug!("Question request discarded");
                    }

                    result = with_timeout(timeout, call) => {
                        let event = match result {
                            Ok(QuestionOutcome::Question(question)) => {
                                tracing::debug!(
                                    strategy = strategy.as_str(),
                                    category = question.category.map(QuestionCategory::as_str),
                                    "Question ready"
                                );
                                Event::QuestionGenerated { strategy, question }
                            }
                            Ok(QuestionOutcome::Exhausted) => Event::QuestionsExhausted { strategy },
                            Err(e) => {
                                tracing::warn!(
                                    strategy = strategy.as_str(),
                                    error = %e,
                                    "Question generation failed"
                                );
                                Event::QuestionFailed {
                                    strategy,
                                    message: e.to_string(),
                                }
                            }
                        };
                        let _ = event_tx.send(event).await;
                    }
                }
            }
            .in_current_span(),
        );
    }

    /// Spawn a scoring request; answers with `FeedbackReady` or
    /// `ScoringFailed`, tagged with the request's turn
    pub fn request_feedback(&self, request: ScoreRequest) {
        let scorer = self.scorer.clone();
        let event_tx = self.event_tx.clone();
        let cancel = self.cancel.clone();
        let timeout = self.timeout;

        tokio::spawn(
            async move {
                let turn = request.turn;
                tracing::debug!(turn, scorer = scorer.name(), "Requesting feedback");

                tokio::select! {
                    biased;

                    () = cancel.cancelled() => {
                        tracing::debug!(turn, "Scoring request discarded");
                    }

                    result = with_timeout(timeout, scorer.score(&request)) => {
                        let event = match result {
                            Ok(feedback) => Event::FeedbackReady { turn, feedback },
                            Err(e) => {
                                tracing::warn!(turn, error = %e, "Scoring failed");
                                Event::ScoringFailed {
                                    turn,
                                    message: e.to_string(),
                                }
                            }
                        };
                        let _ = event_tx.send(event).await;
                    }
                }
            }
            .in_current_span(),
        );
    }

    /// Abandon every in-flight call
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl<G: ?Sized, S: ?Sized> Drop for TurnCoordinator<G, S> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn with_timeout<T>(
    limit: Option<Duration>,
    call: impl Future<Output = Result<T, CollaboratorError>>,
) -> Result<T, CollaboratorError> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .unwrap_or(Err(CollaboratorError::Timeout(limit))),
        None => call.await,
    }
}
