//! Tempo-synchronized bar scheduler.
//!
//! The [`BarScheduler`] owns the [`SessionState`] and a single
//! [`TickTimer`]. Each tick performs one bar step and re-arms the timer
//! for the next bar boundary; a live tempo change re-arms it early or late
//! so the boundary lands where the listener expects it.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};

use crate::params::bar_duration;
use crate::phase::{Phase, PhaseTable};

use super::state::SessionState;
use super::timer::TickTimer;

/// Upper bound on bar progress used by resync, so the rescheduled tick
/// always lies in the future.
pub const MAX_RESYNC_PROGRESS: f64 = 0.99;

/// A phase change performed at the start of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTransition {
    /// Index of the phase that just finished.
    pub from: usize,
    /// Index of the phase now current.
    pub to: usize,
}

/// Outcome of one bar step.
#[derive(Debug, Clone, PartialEq)]
pub struct BarTick {
    /// Set when this tick moved to a new phase.
    pub transition: Option<PhaseTransition>,
    /// Index of the phase shown by this tick.
    pub phase_index: usize,
    /// The phase shown by this tick.
    pub phase: Phase,
    /// 1-indexed bar within the phase.
    pub bar: u32,
    /// Delay until the next tick.
    pub bar_duration: Duration,
}

impl BarTick {
    /// Display label, e.g. `"Groove (Bar 1/16)"`.
    #[must_use]
    pub fn label(&self) -> String {
        format_label(&self.phase, self.bar)
    }
}

/// Formats the display label for `bar` of `phase`.
#[must_use]
pub fn format_label(phase: &Phase, bar: u32) -> String {
    format!("{} (Bar {}/{})", phase.name, bar, phase.duration_bars)
}

/// Outcome of a tempo resync.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resync {
    /// Fraction of the current bar already played, clamped.
    pub progress: f64,
    /// Bar length before the change.
    pub previous_bar_duration: Duration,
    /// Bar length at the new tempo.
    pub bar_duration: Duration,
    /// Delay until the rescheduled tick.
    pub remaining: Duration,
}

/// Computes the remaining delay after a tempo change.
///
/// `progress = min(elapsed / previous, 0.99)` and
/// `remaining = current * (1 - progress)`. A zero `previous` counts as a
/// finished bar.
#[must_use]
pub fn resync_delay(elapsed: Duration, previous: Duration, current: Duration) -> (f64, Duration) {
    let progress = if previous.is_zero() {
        MAX_RESYNC_PROGRESS
    } else {
        (elapsed.as_secs_f64() / previous.as_secs_f64()).min(MAX_RESYNC_PROGRESS)
    };
    (progress, current.mul_f64(1.0 - progress))
}

/// Bar/phase state machine with its self-rescheduling tick.
#[derive(Debug)]
pub struct BarScheduler {
    table: PhaseTable,
    state: SessionState,
    timer: TickTimer,
}

impl BarScheduler {
    /// Creates a stopped scheduler over `table`.
    #[must_use]
    pub const fn new(table: PhaseTable) -> Self {
        Self {
            table,
            state: SessionState::initial(),
            timer: TickTimer::new(),
        }
    }

    /// The phase table being cycled.
    #[must_use]
    pub const fn table(&self) -> &PhaseTable {
        &self.table
    }

    /// Current session state.
    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    /// Whether the scheduler is running.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.state.is_playing
    }

    /// The phase at the current index.
    #[must_use]
    pub fn current_phase(&self) -> &Phase {
        self.table.get(self.state.current_phase_index)
    }

    /// When the next tick is due, if running.
    #[must_use]
    pub fn next_tick_at(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    /// Returns the state to its initial values and drops any pending tick.
    pub fn reset(&mut self) {
        self.timer.cancel();
        self.state = SessionState::initial();
    }

    /// `Stopped -> Running`: resets position and schedules an immediate
    /// tick at `now`. No-op when already running.
    pub fn start(&mut self, now: Instant) {
        if self.state.is_playing {
            return;
        }
        self.reset();
        self.state.is_playing = true;
        self.timer.schedule_at(now);
        debug!(phases = self.table.len(), "bar scheduler started");
    }

    /// `Running -> Stopped`: cancels the pending tick and clears state.
    /// Returns `false` if the scheduler was already stopped.
    pub fn stop(&mut self) -> bool {
        if !self.state.is_playing {
            return false;
        }
        self.reset();
        debug!("bar scheduler stopped");
        true
    }

    /// Waits for the pending tick and returns the instant it was due.
    /// Never completes while stopped. Cancel-safe.
    pub async fn next_tick(&mut self) -> Instant {
        self.timer.fired().await
    }

    /// Performs one bar step at `now` with the live tempo.
    ///
    /// 1. advance the phase when the previous bar was its last,
    /// 2. expose the phase and bar to display,
    /// 3. increment the bar counter for the next tick,
    /// 4. recompute the bar length from `tempo_bpm`,
    /// 5. record the bar start and schedule the next tick.
    ///
    /// Returns `None` when stopped.
    pub fn tick(&mut self, now: Instant, tempo_bpm: f64) -> Option<BarTick> {
        if !self.state.is_playing {
            return None;
        }

        let mut transition = None;
        let index = self.state.current_phase_index;
        if self.state.bar_count > self.table.get(index).duration_bars {
            let to = self.table.next_index(index);
            self.state.current_phase_index = to;
            self.state.bar_count = 1;
            transition = Some(PhaseTransition { from: index, to });
        }

        let phase_index = self.state.current_phase_index;
        let phase = *self.table.get(phase_index);
        let bar = self.state.bar_count;
        self.state.current_energy = phase.energy;

        self.state.bar_count += 1;

        let duration = bar_duration(tempo_bpm);
        self.state.current_bar_duration = duration;
        self.state.last_bar_start = Some(now);
        self.timer.schedule_at(now + duration);

        trace!(phase = %phase.name, bar, ?duration, "bar tick");

        Some(BarTick {
            transition,
            phase_index,
            phase,
            bar,
            bar_duration: duration,
        })
    }

    /// Re-aligns the pending tick after a tempo change at `now`.
    ///
    /// Returns `None` when stopped or before the first bar has started;
    /// in the latter case only the stored bar length is refreshed.
    pub fn resync(&mut self, now: Instant, tempo_bpm: f64) -> Option<Resync> {
        if !self.state.is_playing {
            return None;
        }

        let previous = self.state.current_bar_duration;
        let current = bar_duration(tempo_bpm);
        self.state.current_bar_duration = current;

        let last = self.state.last_bar_start?;
        let elapsed = now.saturating_duration_since(last);
        let (progress, remaining) = resync_delay(elapsed, previous, current);

        self.timer.schedule_at(now + remaining);

        Some(Resync {
            progress,
            previous_bar_duration: previous,
            bar_duration: current,
            remaining,
        })
    }
}
