//! Runtime for executing interview sessions
//!
//! Each connection gets its own `SessionRuntime` task. The transport feeds
//! it `InboundFrame`s and drains `Outbound` items; nothing else is shared
//! between sessions except the rules and the collaborators.

mod coordinator;
mod executor;

#[cfg(test)]
pub mod testing;

pub use executor::{InboundFrame, Outbound, SessionRuntime};

use crate::collaborator::{AnswerScorer, QuestionGenerator};
use crate::state_machine::{SessionContext, SessionRules, SessionState};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Buffered frames per direction before the sender waits
const FRAME_CHANNEL_CAPACITY: usize = 32;

/// Type alias for the runtime used by the server
pub type ProductionRuntime = SessionRuntime<dyn QuestionGenerator, dyn AnswerScorer>;

/// Spawns session runtimes that share rules and collaborators
pub struct SessionManager {
    rules: Arc<SessionRules>,
    generator: Arc<dyn QuestionGenerator>,
    scorer: Arc<dyn AnswerScorer>,
    timeout: Option<Duration>,
    active_sessions: Arc<AtomicUsize>,
}

/// Handle to interact with a running session
pub struct SessionHandle {
    pub session_id: String,
    /// Dropping this ends the session
    pub frames: mpsc::Sender<InboundFrame>,
    pub outbound: mpsc::Receiver<Outbound>,
    pub task: JoinHandle<SessionState>,
}

impl SessionManager {
    pub fn new(
        rules: Arc<SessionRules>,
        generator: Arc<dyn QuestionGenerator>,
        scorer: Arc<dyn AnswerScorer>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            rules,
            generator,
            scorer,
            timeout,
            active_sessions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of sessions whose runtime task is still running
    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::SeqCst)
    }

    /// Start a fresh session in `AwaitingStart`
    pub fn spawn_session(&self, client_id: Option<String>) -> SessionHandle {
        let session_id = uuid::Uuid::new_v4().to_string();
        let context = SessionContext::new(session_id.clone(), client_id, self.rules.clone());

        let (frame_tx, frame_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);

        let runtime: ProductionRuntime = SessionRuntime::new(
            context,
            self.generator.clone(),
            self.scorer.clone(),
            self.timeout,
            frame_rx,
            outbound_tx,
        );

        let active = self.active_sessions.clone();
        active.fetch_add(1, Ordering::SeqCst);
        let task = tokio::spawn(async move {
            let _guard = ActiveGuard(active);
            runtime.run().await
        });

        tracing::debug!(session_id = %session_id, "Spawned session runtime");

        SessionHandle {
            session_id,
            frames: frame_tx,
            outbound: outbound_rx,
            task,
        }
    }
}

/// Decrements the active count however the task ends
struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
