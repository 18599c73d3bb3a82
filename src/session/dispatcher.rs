//! Ordered script dispatch.
//!
//! A single worker task owns the evaluator side of a session. Requests are
//! applied strictly in submission order. Fire-and-settle requests are
//! never retried and their failures stop at this boundary: they are
//! logged, counted and emitted as events, and the bar clock never sees
//! them.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{EvaluatorError, SessionError};
use crate::evaluator::AudioEvaluator;
use crate::observability::events::{Event, EventEmitter};
use crate::observability::metrics;

/// What triggered a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchReason {
    /// First script of a session start.
    Initial,
    /// A bar tick entered a new phase.
    PhaseChange,
    /// Debounced live control change.
    ParameterChange,
    /// Session stop.
    Silence,
}

impl DispatchReason {
    /// Stable name for logs and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::PhaseChange => "phase_change",
            Self::ParameterChange => "parameter_change",
            Self::Silence => "silence",
        }
    }
}

impl std::fmt::Display for DispatchReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

struct DispatchRequest {
    script: String,
    reason: DispatchReason,
    reply: Option<oneshot::Sender<Result<(), EvaluatorError>>>,
}

/// Sending side of the dispatch queue.
#[derive(Debug, Clone)]
pub(crate) struct Dispatcher {
    tx: mpsc::UnboundedSender<DispatchRequest>,
}

impl Dispatcher {
    /// Spawns the worker. It exits once every `Dispatcher` clone is dropped
    /// and the queue has drained.
    pub(crate) fn spawn(
        evaluator: Arc<dyn AudioEvaluator>,
        events: Arc<EventEmitter>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(rx, evaluator, events));
        (Self { tx }, worker)
    }

    /// Queues `script` without waiting for the outcome.
    pub(crate) fn submit(&self, script: String, reason: DispatchReason) {
        let request = DispatchRequest {
            script,
            reason,
            reply: None,
        };
        if self.tx.send(request).is_err() {
            warn!(%reason, "dispatch worker gone, script dropped");
        }
    }

    /// Queues `script` and waits until the evaluator has accepted or
    /// rejected it.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Dispatch` if the evaluator rejects the script
    /// and `SessionError::Closed` if the worker is gone.
    pub(crate) async fn dispatch(
        &self,
        script: String,
        reason: DispatchReason,
    ) -> Result<(), SessionError> {
        let (reply, outcome) = oneshot::channel();
        self.tx
            .send(DispatchRequest {
                script,
                reason,
                reply: Some(reply),
            })
            .map_err(|_| SessionError::Closed)?;

        outcome
            .await
            .map_err(|_| SessionError::Closed)?
            .map_err(SessionError::Dispatch)
    }
}

async fn run_worker(
    mut rx: mpsc::UnboundedReceiver<DispatchRequest>,
    evaluator: Arc<dyn AudioEvaluator>,
    events: Arc<EventEmitter>,
) {
    while let Some(request) = rx.recv().await {
        let reason = request.reason;
        let result = evaluator.evaluate(&request.script).await;
        metrics::record_dispatch(reason.as_str(), result.is_ok());

        match (request.reply, result) {
            (Some(reply), result) => {
                let _ = reply.send(result);
            }
            (None, Ok(())) => {
                debug!(%reason, bytes = request.script.len(), "script dispatched");
            }
            (None, Err(e)) => {
                warn!(%reason, error = %e, "evaluator rejected script");
                events.emit(Event::DispatchFailed {
                    timestamp: Utc::now(),
                    reason: reason.as_str().to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    debug!("dispatch worker finished");
}
