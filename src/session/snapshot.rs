//! Observable session state.

use serde::Serialize;

use crate::display::SILENT_LABEL;
use crate::params::DEFAULT_TEMPO_BPM;
use crate::phase::PhaseName;

/// Point-in-time view of a session, published after every change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    /// Whether the bar clock is running.
    pub is_playing: bool,
    /// Index of the current phase.
    pub phase_index: usize,
    /// Current phase.
    pub phase: PhaseName,
    /// Bar currently shown, 1-indexed; 0 before the first bar.
    pub bar: u32,
    /// Bars in the current phase.
    pub duration_bars: u32,
    /// Displayed energy percentage.
    pub energy: u8,
    /// Displayed label.
    pub label: String,
    /// Live tempo.
    pub tempo_bpm: f64,
    /// Length of the current bar in milliseconds; 0 before the first bar.
    pub bar_duration_ms: f64,
    /// Bars played since the last start.
    pub bars_played: u64,
}

impl SessionSnapshot {
    /// Snapshot of a session that has never started.
    #[must_use]
    pub fn idle(first_phase: PhaseName, duration_bars: u32) -> Self {
        Self {
            is_playing: false,
            phase_index: 0,
            phase: first_phase,
            bar: 0,
            duration_bars,
            energy: 0,
            label: SILENT_LABEL.to_string(),
            tempo_bpm: DEFAULT_TEMPO_BPM,
            bar_duration_ms: 0.0,
            bars_played: 0,
        }
    }
}
