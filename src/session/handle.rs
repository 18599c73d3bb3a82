//! Cloneable session handle.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::error::{ParameterError, SessionError};
use crate::params::{Parameters, validate_cutoff, validate_resonance, validate_tempo};

use super::snapshot::SessionSnapshot;

pub(crate) enum Command {
    Start {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
}

/// Controls a spawned session.
///
/// Clones talk to the same session task. The task shuts down once every
/// handle is dropped or [`SessionHandle::shutdown`] is called.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    parameters: Arc<watch::Sender<Parameters>>,
    snapshots: watch::Receiver<SessionSnapshot>,
    cancel: CancellationToken,
}

impl SessionHandle {
    pub(crate) const fn new(
        commands: mpsc::Sender<Command>,
        parameters: Arc<watch::Sender<Parameters>>,
        snapshots: watch::Receiver<SessionSnapshot>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            commands,
            parameters,
            snapshots,
            cancel,
        }
    }

    /// Starts playback. Returns once the initial script was accepted, or
    /// immediately if already playing.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Initialization` if the audio context or the
    /// initial dispatch failed; the session stays stopped and a later
    /// `start` may be retried. Returns `SessionError::Closed` if the
    /// session task is gone.
    pub async fn start(&self) -> Result<(), SessionError> {
        let (reply, outcome) = oneshot::channel();
        self.commands
            .send(Command::Start { reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        outcome.await.map_err(|_| SessionError::Closed)?
    }

    /// Stops playback and silences the evaluator. No-op when stopped.
    ///
    /// No tick fires after this returns.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Closed` if the session task is gone.
    pub async fn stop(&self) -> Result<(), SessionError> {
        let (reply, outcome) = oneshot::channel();
        self.commands
            .send(Command::Stop { reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        outcome.await.map_err(|_| SessionError::Closed)
    }

    /// Publishes a new tempo.
    ///
    /// # Errors
    ///
    /// Rejects non-finite or non-positive values; nothing is published.
    pub fn set_tempo(&self, bpm: f64) -> Result<(), ParameterError> {
        validate_tempo(bpm)?;
        self.parameters.send_modify(|p| p.tempo_bpm = bpm);
        Ok(())
    }

    /// Publishes a new filter cutoff.
    ///
    /// # Errors
    ///
    /// Rejects non-finite or non-positive values; nothing is published.
    pub fn set_cutoff(&self, hz: f64) -> Result<(), ParameterError> {
        validate_cutoff(hz)?;
        self.parameters.send_modify(|p| p.cutoff_hz = hz);
        Ok(())
    }

    /// Publishes a new filter resonance.
    ///
    /// # Errors
    ///
    /// Rejects non-finite or negative values; nothing is published.
    pub fn set_resonance(&self, q: f64) -> Result<(), ParameterError> {
        validate_resonance(q)?;
        self.parameters.send_modify(|p| p.resonance = q);
        Ok(())
    }

    /// Current live parameters.
    #[must_use]
    pub fn parameters(&self) -> Parameters {
        *self.parameters.borrow()
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver that observes every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Asks the session task to stop playback and exit.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Whether the session task has exited.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}
