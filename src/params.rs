//! Live control parameters.
//!
//! Parameters are owned by whoever drives the controls (a UI, the stdin
//! reader of `tranceloop run`, a test). The session only ever reads the
//! latest published value.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ParameterError;

/// Default tempo in beats per minute.
pub const DEFAULT_TEMPO_BPM: f64 = 138.0;

/// Default bass filter cutoff in Hz.
pub const DEFAULT_CUTOFF_HZ: f64 = 1000.0;

/// Default bass filter resonance.
pub const DEFAULT_RESONANCE: f64 = 10.0;

/// Beats in one bar.
pub const BEATS_PER_BAR: f64 = 4.0;

/// Slowest accepted tempo.
pub const MIN_TEMPO_BPM: f64 = 1.0;

/// Fastest accepted tempo.
pub const MAX_TEMPO_BPM: f64 = 1000.0;

/// The three live controls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Parameters {
    /// Tempo in BPM.
    #[serde(default = "default_tempo")]
    pub tempo_bpm: f64,
    /// Bass low-pass cutoff in Hz.
    #[serde(default = "default_cutoff")]
    pub cutoff_hz: f64,
    /// Bass filter resonance (unitless).
    #[serde(default = "default_resonance")]
    pub resonance: f64,
}

const fn default_tempo() -> f64 {
    DEFAULT_TEMPO_BPM
}

const fn default_cutoff() -> f64 {
    DEFAULT_CUTOFF_HZ
}

const fn default_resonance() -> f64 {
    DEFAULT_RESONANCE
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            tempo_bpm: DEFAULT_TEMPO_BPM,
            cutoff_hz: DEFAULT_CUTOFF_HZ,
            resonance: DEFAULT_RESONANCE,
        }
    }
}

impl Parameters {
    /// Checks every control against its accepted range.
    ///
    /// # Errors
    ///
    /// Returns the first offending control.
    pub fn validate(&self) -> Result<(), ParameterError> {
        validate_tempo(self.tempo_bpm)?;
        validate_cutoff(self.cutoff_hz)?;
        validate_resonance(self.resonance)
    }

    /// Length of one bar at the current tempo.
    #[must_use]
    pub fn bar_duration(&self) -> Duration {
        bar_duration(self.tempo_bpm)
    }
}

/// Length of one 4/4 bar: `(60 / bpm) * 4` seconds.
///
/// Tempos outside [`MIN_TEMPO_BPM`, `MAX_TEMPO_BPM`] are clamped into
/// range; NaN is treated as the slowest tempo.
#[must_use]
pub fn bar_duration(tempo_bpm: f64) -> Duration {
    let bpm = if tempo_bpm.is_nan() {
        MIN_TEMPO_BPM
    } else {
        tempo_bpm.clamp(MIN_TEMPO_BPM, MAX_TEMPO_BPM)
    };
    Duration::try_from_secs_f64(60.0 / bpm * BEATS_PER_BAR)
        .unwrap_or(Duration::from_secs(240))
}

/// # Errors
///
/// Rejects tempos outside [`MIN_TEMPO_BPM`, `MAX_TEMPO_BPM`] and NaN.
pub fn validate_tempo(bpm: f64) -> Result<(), ParameterError> {
    if (MIN_TEMPO_BPM..=MAX_TEMPO_BPM).contains(&bpm) {
        Ok(())
    } else {
        Err(ParameterError::InvalidTempo(bpm))
    }
}

/// # Errors
///
/// Rejects non-finite and non-positive cutoffs.
pub fn validate_cutoff(hz: f64) -> Result<(), ParameterError> {
    if hz.is_finite() && hz > 0.0 {
        Ok(())
    } else {
        Err(ParameterError::InvalidCutoff(hz))
    }
}

/// # Errors
///
/// Rejects non-finite and negative resonance.
pub fn validate_resonance(q: f64) -> Result<(), ParameterError> {
    if q.is_finite() && q >= 0.0 {
        Ok(())
    } else {
        Err(ParameterError::InvalidResonance(q))
    }
}

/// Which control changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    /// Tempo change; also resyncs the bar scheduler.
    Tempo,
    /// Filter cutoff change.
    Cutoff,
    /// Filter resonance change.
    Resonance,
}
