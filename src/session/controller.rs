//! Session task.
//!
//! [`SessionBuilder::spawn`] starts the task and returns its handle. The
//! task loop waits on, in priority order:
//!
//! 1. shutdown,
//! 2. start/stop commands,
//! 3. parameter changes,
//! 4. the next bar tick,
//! 5. the debounced parameter dispatch.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::display::{DisplaySurface, ERROR_LABEL, INITIALIZING_LABEL, SILENT_LABEL};
use crate::error::{ConfigError, EvaluatorError, SessionError};
use crate::evaluator::{AudioEvaluator, ContextState, SampleMap};
use crate::observability::events::{Event, EventEmitter, StopReason};
use crate::observability::metrics;
use crate::params::{ParameterKind, Parameters, bar_duration};
use crate::pattern;
use crate::phase::PhaseTable;
use crate::scheduler::{BarScheduler, Debouncer};

use super::SessionOptions;
use super::dispatcher::{DispatchReason, Dispatcher};
use super::handle::{Command, SessionHandle};
use super::snapshot::SessionSnapshot;

const COMMAND_BUFFER: usize = 32;

/// Configures and spawns a session task.
pub struct SessionBuilder {
    evaluator: Arc<dyn AudioEvaluator>,
    display: Box<dyn DisplaySurface>,
    table: PhaseTable,
    parameters: Parameters,
    options: SessionOptions,
    samples: Option<SampleMap>,
    events: Arc<EventEmitter>,
    name: Option<String>,
}

impl std::fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("evaluator", &self.evaluator.name())
            .field("phases", &self.table.len())
            .field("parameters", &self.parameters)
            .field("options", &self.options)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl SessionBuilder {
    /// Session over the default phase table and parameters.
    pub fn new(
        evaluator: Arc<dyn AudioEvaluator>,
        display: impl DisplaySurface + 'static,
    ) -> Self {
        Self {
            evaluator,
            display: Box::new(display),
            table: PhaseTable::default(),
            parameters: Parameters::default(),
            options: SessionOptions::default(),
            samples: None,
            events: Arc::new(EventEmitter::noop()),
            name: None,
        }
    }

    /// Session configured from a loaded session file.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured phase table is invalid.
    pub fn from_config(
        config: &SessionConfig,
        evaluator: Arc<dyn AudioEvaluator>,
        display: impl DisplaySurface + 'static,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(evaluator, display)
            .phases(config.phase_table()?)
            .parameters(config.parameters)
            .options(config.session_options())
            .samples(config.samples.clone())
            .name(config.session.name.clone()))
    }

    /// Phase table to cycle.
    #[must_use]
    pub fn phases(mut self, table: PhaseTable) -> Self {
        self.table = table;
        self
    }

    /// Initial live parameters.
    #[must_use]
    pub const fn parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Debounce and warm-up timing.
    #[must_use]
    pub const fn options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Samples registered when the task starts.
    #[must_use]
    pub fn samples(mut self, samples: SampleMap) -> Self {
        self.samples = Some(samples);
        self
    }

    /// Event stream for this session.
    #[must_use]
    pub fn events(mut self, events: Arc<EventEmitter>) -> Self {
        self.events = events;
        self
    }

    /// Session name used in logs and events.
    #[must_use]
    pub fn name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    /// Spawns the session task on the current runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn(self) -> (SessionHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (params_tx, params_rx) = watch::channel(self.parameters);
        let first = *self.table.get(0);
        let mut idle = SessionSnapshot::idle(first.name, first.duration_bars);
        idle.tempo_bpm = self.parameters.tempo_bpm;
        let (snapshot_tx, snapshot_rx) = watch::channel(idle);
        let cancel = CancellationToken::new();

        let (dispatcher, dispatch_worker) =
            Dispatcher::spawn(Arc::clone(&self.evaluator), Arc::clone(&self.events));

        let session = Session {
            evaluator: self.evaluator,
            display: self.display,
            scheduler: BarScheduler::new(self.table),
            debouncer: Debouncer::new(self.options.debounce),
            options: self.options,
            commands: command_rx,
            params: params_rx,
            last_params: self.parameters,
            snapshots: snapshot_tx,
            dispatcher,
            dispatch_worker,
            events: self.events,
            cancel: cancel.clone(),
            samples: self.samples,
            name: self.name,
            label: SILENT_LABEL.to_string(),
            energy: 0,
            bars_played: 0,
        };

        let handle = SessionHandle::new(command_tx, Arc::new(params_tx), snapshot_rx, cancel);
        (handle, tokio::spawn(session.run()))
    }
}

struct Session {
    evaluator: Arc<dyn AudioEvaluator>,
    display: Box<dyn DisplaySurface>,
    scheduler: BarScheduler,
    debouncer: Debouncer<ParameterKind>,
    options: SessionOptions,
    commands: mpsc::Receiver<Command>,
    params: watch::Receiver<Parameters>,
    last_params: Parameters,
    snapshots: watch::Sender<SessionSnapshot>,
    dispatcher: Dispatcher,
    dispatch_worker: JoinHandle<()>,
    events: Arc<EventEmitter>,
    cancel: CancellationToken,
    samples: Option<SampleMap>,
    name: Option<String>,
    label: String,
    energy: u8,
    bars_played: u64,
}

impl Session {
    async fn run(mut self) {
        if let Some(samples) = self.samples.take() {
            match self.evaluator.register_samples(&samples).await {
                Ok(()) => debug!(samples = samples.sample_count(), "samples registered"),
                Err(e) => warn!(error = %e, "sample registration failed, continuing without"),
            }
        }
        metrics::set_tempo(self.last_params.tempo_bpm);

        loop {
            tokio::select! {
                biased;

                () = self.cancel.cancelled() => break,

                command = self.commands.recv() => match command {
                    Some(Command::Start { reply }) => {
                        let result = self.start().await;
                        let _ = reply.send(result);
                    }
                    Some(Command::Stop { reply }) => {
                        self.stop(StopReason::Requested);
                        let _ = reply.send(());
                    }
                    None => break,
                },

                changed = self.params.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.on_parameters_changed();
                }

                deadline = self.scheduler.next_tick() => self.on_tick(deadline),

                kind = self.debouncer.ready() => self.on_debounced(kind),
            }
        }

        self.stop(StopReason::Shutdown);
        let Self {
            dispatcher,
            dispatch_worker,
            ..
        } = self;
        drop(dispatcher);
        if let Err(e) = dispatch_worker.await {
            warn!(error = %e, "dispatch worker panicked");
        }
        debug!("session task finished");
    }

    async fn start(&mut self) -> Result<(), SessionError> {
        if self.scheduler.is_running() {
            debug!("start ignored, session already running");
            return Ok(());
        }

        self.show(INITIALIZING_LABEL, 0);
        self.scheduler.reset();
        self.bars_played = 0;

        if self.evaluator.context_state() == ContextState::Suspended {
            debug!(evaluator = self.evaluator.name(), "resuming audio context");
            if let Err(e) = self.evaluator.resume().await {
                return Err(self.fail_start(e));
            }
        }

        if !self.options.warmup.is_zero() {
            tokio::select! {
                () = tokio::time::sleep(self.options.warmup) => {}
                () = self.cancel.cancelled() => return Err(SessionError::Closed),
            }
        }

        let params = *self.params.borrow_and_update();
        self.last_params = params;
        let first = *self.scheduler.table().get(0);
        let script = pattern::generate(&first, &params);
        match self.dispatcher.dispatch(script, DispatchReason::Initial).await {
            Ok(()) => {}
            Err(SessionError::Dispatch(e)) => return Err(self.fail_start(e)),
            Err(e) => return Err(e),
        }

        self.scheduler.start(Instant::now());
        metrics::set_tempo(params.tempo_bpm);

        info!(
            session = self.name.as_deref().unwrap_or("unnamed"),
            tempo_bpm = params.tempo_bpm,
            phases = self.scheduler.table().len(),
            "session started"
        );
        self.events.emit(Event::SessionStarted {
            timestamp: Utc::now(),
            session_name: self.name.clone(),
            evaluator: self.evaluator.name().to_string(),
            tempo_bpm: params.tempo_bpm,
            phase_count: self.scheduler.table().len(),
        });
        self.events.emit(Event::PhaseEntered {
            timestamp: Utc::now(),
            phase_name: first.name.to_string(),
            phase_index: 0,
            energy: first.energy,
        });
        self.publish();
        Ok(())
    }

    fn fail_start(&mut self, error: EvaluatorError) -> SessionError {
        warn!(error = %error, "session failed to start");
        self.events.emit(Event::InitializationFailed {
            timestamp: Utc::now(),
            error: error.to_string(),
        });
        self.show(ERROR_LABEL, 0);
        SessionError::Initialization(error)
    }

    fn stop(&mut self, reason: StopReason) {
        if !self.scheduler.is_running() {
            debug!("stop ignored, session not running");
            return;
        }

        self.dispatcher
            .submit(pattern::silence().to_string(), DispatchReason::Silence);
        self.scheduler.stop();
        if let Some(kind) = self.debouncer.cancel() {
            debug!(?kind, "pending parameter dispatch discarded");
        }
        metrics::set_current_energy(0);

        info!(bars_played = self.bars_played, ?reason, "session stopped");
        self.events.emit(Event::SessionStopped {
            timestamp: Utc::now(),
            reason,
            bars_played: self.bars_played,
        });
        self.show(SILENT_LABEL, 0);
    }

    fn on_tick(&mut self, deadline: Instant) {
        let params = *self.params.borrow();
        let now = Instant::now();
        // Anchor on the due time so bar lengths do not accumulate wake-up
        // latency; fall back to `now` once a whole bar has been missed.
        let anchor = if now.saturating_duration_since(deadline) <= bar_duration(params.tempo_bpm) {
            deadline
        } else {
            now
        };

        let Some(tick) = self.scheduler.tick(anchor, params.tempo_bpm) else {
            return;
        };

        if let Some(transition) = tick.transition {
            let from = self.scheduler.table().get(transition.from).name;
            info!(from = %from, to = %tick.phase.name, energy = tick.phase.energy, "phase change");
            metrics::record_phase_transition(from, tick.phase.name);
            self.events.emit(Event::PhaseEntered {
                timestamp: Utc::now(),
                phase_name: tick.phase.name.to_string(),
                phase_index: tick.phase_index,
                energy: tick.phase.energy,
            });
            self.dispatcher.submit(
                pattern::generate(&tick.phase, &params),
                DispatchReason::PhaseChange,
            );
        }

        self.bars_played += 1;
        metrics::record_bar(tick.phase.name);
        metrics::set_current_energy(tick.phase.energy);
        self.events.emit(Event::BarStarted {
            timestamp: Utc::now(),
            phase_name: tick.phase.name.to_string(),
            bar: tick.bar,
            duration_bars: tick.phase.duration_bars,
            bar_duration_ms: tick.bar_duration.as_secs_f64() * 1000.0,
        });
        self.show(&tick.label(), tick.phase.energy);
    }

    fn on_parameters_changed(&mut self) {
        let params = *self.params.borrow_and_update();
        let previous = std::mem::replace(&mut self.last_params, params);

        let tempo_changed = differs(previous.tempo_bpm, params.tempo_bpm);
        let kind = if tempo_changed {
            ParameterKind::Tempo
        } else if differs(previous.cutoff_hz, params.cutoff_hz) {
            ParameterKind::Cutoff
        } else if differs(previous.resonance, params.resonance) {
            ParameterKind::Resonance
        } else {
            return;
        };

        if tempo_changed {
            metrics::set_tempo(params.tempo_bpm);
        }
        if !self.scheduler.is_running() {
            return;
        }

        self.debouncer.push(kind);

        if tempo_changed {
            if let Some(resync) = self.scheduler.resync(Instant::now(), params.tempo_bpm) {
                debug!(
                    tempo_bpm = params.tempo_bpm,
                    progress = resync.progress,
                    remaining = ?resync.remaining,
                    "bar clock resynced"
                );
                self.events.emit(Event::TempoResynced {
                    timestamp: Utc::now(),
                    tempo_bpm: params.tempo_bpm,
                    progress: resync.progress,
                    remaining_ms: resync.remaining.as_secs_f64() * 1000.0,
                });
            }
        }
        self.publish();
    }

    fn on_debounced(&mut self, kind: ParameterKind) {
        if !self.scheduler.is_running() {
            return;
        }
        let params = *self.params.borrow();
        let phase = *self.scheduler.current_phase();
        debug!(?kind, phase = %phase.name, "dispatching parameter change");
        self.dispatcher.submit(
            pattern::generate(&phase, &params),
            DispatchReason::ParameterChange,
        );
    }

    fn show(&mut self, label: &str, energy: u8) {
        self.display.update(label, energy);
        label.clone_into(&mut self.label);
        self.energy = energy;
        self.publish();
    }

    fn publish(&self) {
        let state = self.scheduler.state();
        let phase = self.scheduler.current_phase();
        let started = state.last_bar_start().is_some();
        let snapshot = SessionSnapshot {
            is_playing: state.is_playing(),
            phase_index: state.current_phase_index(),
            phase: phase.name,
            bar: if started { state.bar_count() - 1 } else { 0 },
            duration_bars: phase.duration_bars,
            energy: self.energy,
            label: self.label.clone(),
            tempo_bpm: self.last_params.tempo_bpm,
            bar_duration_ms: state.current_bar_duration().as_secs_f64() * 1000.0,
            bars_played: self.bars_played,
        };
        self.snapshots.send_replace(snapshot);
    }
}

fn differs(a: f64, b: f64) -> bool {
    a.to_bits() != b.to_bits()
}
