//! Session runtime executor

use super::coordinator::TurnCoordinator;
use crate::collaborator::{AnswerScorer, QuestionGenerator};
use crate::protocol::{self, CodecError, ErrorCode, ServerMessage};
use crate::state_machine::{transition, Effect, Event, Phase, SessionContext, SessionState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::Instrument;

/// Capacity of the collaborator result channel
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// A frame received from the client connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Text(String),
    Binary,
}

/// What the connection writer should do next
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Message(ServerMessage),
    /// Close the connection normally; nothing follows
    Close,
}

/// Drives one session: client frames and collaborator results go through
/// `transition`, and the resulting effects are executed here.
pub struct SessionRuntime<G, S>
where
    G: QuestionGenerator + ?Sized + 'static,
    S: AnswerScorer + ?Sized + 'static,
{
    context: SessionContext,
    state: SessionState,
    coordinator: TurnCoordinator<G, S>,
    frame_rx: mpsc::Receiver<InboundFrame>,
    event_rx: mpsc::Receiver<Event>,
    outbound_tx: mpsc::Sender<Outbound>,
    /// Set once the connection is closed or the writer is gone
    closed: bool,
}

impl<G, S> SessionRuntime<G, S>
where
    G: QuestionGenerator + ?Sized + 'static,
    S: AnswerScorer + ?Sized + 'static,
{
    pub fn new(
        context: SessionContext,
        generator: Arc<G>,
        scorer: Arc<S>,
        timeout: Option<Duration>,
        frame_rx: mpsc::Receiver<InboundFrame>,
        outbound_tx: mpsc::Sender<Outbound>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            context,
            state: SessionState::new(),
            coordinator: TurnCoordinator::new(generator, scorer, timeout, event_tx),
            frame_rx,
            event_rx,
            outbound_tx,
            closed: false,
        }
    }

    /// Run until the connection closes or the session completes.
    /// Returns the final state.
    pub async fn run(self) -> SessionState {
        let span = tracing::info_span!(
            "session",
            session_id = %self.context.session_id,
            client_id = self.context.client_id.as_deref().unwrap_or("-"),
        );
        self.run_loop().instrument(span).await
    }

    async fn run_loop(mut self) -> SessionState {
        tracing::info!("Session started");

        while !self.closed {
            tokio::select! {
                frame = self.frame_rx.recv() => match frame {
                    Some(frame) => self.handle_frame(frame).await,
                    None => {
                        tracing::info!(phase = self.state.phase.name(), "Connection closed by client");
                        break;
                    }
                },
                Some(event) = self.event_rx.recv() => {
                    self.process_event(event).await;
                }
            }
        }

        // In-flight collaborator calls must never reach a dead session
        self.coordinator.shutdown();
        tracing::info!(
            phase = self.state.phase.name(),
            turns = self.state.history.len(),
            "Session stopped"
        );
        self.state
    }

    async fn handle_frame(&mut self, frame: InboundFrame) {
        let decoded = match frame {
            InboundFrame::Text(raw) => protocol::decode(&raw),
            InboundFrame::Binary => Err(CodecError::BinaryFrame),
        };

        match decoded {
            Ok(message) => {
                tracing::debug!(kind = message.kind(), "Client message");
                self.process_event(message.into()).await;
            }
            Err(e) => {
                tracing::debug!(error = %e, "Rejected client frame");
                self.send(ServerMessage::error(ErrorCode::MalformedMessage, e.to_string()))
                    .await;
            }
        }
    }

    async fn process_event(&mut self, event: Event) {
        let event_name = event.name();
        match transition(&self.state, &self.context, event) {
            Ok(result) => {
                let old_phase = self.state.phase.name();
                self.state = result.new_state;
                let new_phase = self.state.phase.name();
                if old_phase != new_phase {
                    tracing::info!(
                        from = old_phase,
                        to = new_phase,
                        event = event_name,
                        turn = self.state.phase.pending_question().map(|p| p.turn),
                        "Phase changed"
                    );
                    if self.state.phase.is_terminal() {
                        self.log_completion();
                    }
                }

                for effect in result.effects {
                    if self.closed {
                        break;
                    }
                    self.execute_effect(effect).await;
                }
            }
            Err(e) => match e.client_code() {
                Some(code) => {
                    tracing::debug!(event = event_name, error = %e, "Event rejected");
                    self.send(ServerMessage::error(code, e.to_string())).await;
                }
                None => {
                    tracing::debug!(event = event_name, error = %e, "Discarding stale result");
                }
            },
        }
    }

    fn log_completion(&self) {
        let Phase::Completed { summary } = &self.state.phase else {
            return;
        };
        if summary.completion.is_degraded() {
            tracing::warn!(
                completion = ?summary.completion,
                turns = summary.turns,
                score = summary.score,
                "Interview ended early"
            );
        } else {
            tracing::info!(
                completion = ?summary.completion,
                turns = summary.turns,
                score = summary.score,
                metrics = ?summary.metric_averages,
                "Interview completed"
            );
        }
    }

    async fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::Send(message) => self.send(message).await,
            Effect::RequestQuestion { strategy, request } => {
                self.coordinator.request_question(strategy, request);
            }
            Effect::RequestFeedback { request } => {
                self.coordinator.request_feedback(request);
            }
            Effect::CloseConnection => {
                self.coordinator.shutdown();
                let _ = self.outbound_tx.send(Outbound::Close).await;
                self.closed = true;
            }
        }
    }

    async fn send(&mut self, message: ServerMessage) {
        tracing::debug!(kind = message.kind(), "Sending");
        if self.outbound_tx.send(Outbound::Message(message)).await.is_err() {
            tracing::info!("Connection writer gone, stopping session");
            self.closed = true;
        }
    }
}
