//! Session state owned by the bar scheduler.

use std::time::Duration;

use tokio::time::Instant;

/// Mutable bar/phase position of a session.
///
/// Exclusively owned by one [`BarScheduler`](super::BarScheduler); it is
/// never shared across tasks. `bar_count` is 1-indexed and names the bar
/// the *next* tick will display, so at tick entry it lies in
/// `1..=duration_bars + 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub(crate) current_phase_index: usize,
    pub(crate) bar_count: u32,
    pub(crate) current_energy: u8,
    pub(crate) is_playing: bool,
    pub(crate) last_bar_start: Option<Instant>,
    pub(crate) current_bar_duration: Duration,
}

impl SessionState {
    /// State at session start: first phase, bar 1, silent.
    #[must_use]
    pub const fn initial() -> Self {
        Self {
            current_phase_index: 0,
            bar_count: 1,
            current_energy: 0,
            is_playing: false,
            last_bar_start: None,
            current_bar_duration: Duration::ZERO,
        }
    }

    /// Index into the phase table.
    #[must_use]
    pub const fn current_phase_index(&self) -> usize {
        self.current_phase_index
    }

    /// Bar number the next tick will show.
    #[must_use]
    pub const fn bar_count(&self) -> u32 {
        self.bar_count
    }

    /// Energy of the phase shown by the latest tick, 0 when stopped.
    #[must_use]
    pub const fn current_energy(&self) -> u8 {
        self.current_energy
    }

    /// Whether the scheduler is running.
    #[must_use]
    pub const fn is_playing(&self) -> bool {
        self.is_playing
    }

    /// When the current bar started.
    #[must_use]
    pub const fn last_bar_start(&self) -> Option<Instant> {
        self.last_bar_start
    }

    /// Length of the current bar at the tempo it was last computed with.
    #[must_use]
    pub const fn current_bar_duration(&self) -> Duration {
        self.current_bar_duration
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::initial()
    }
}
