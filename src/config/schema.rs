//! Session configuration schema.
//!
//! ```yaml
//! session:
//!   name: friday-set
//!   debounce_ms: 150
//!   warmup_ms: 500
//! parameters:
//!   tempo_bpm: 138
//!   cutoff_hz: 1000
//!   resonance: 10
//! phases:
//!   - { name: intro, duration_bars: 8, energy: 20 }
//!   - { name: drop, duration_bars: 16, energy: 100 }
//! samples:
//!   base: samples/
//!   banks:
//!     tr808: { bd: 808/BD.wav, sd: 808/SD.wav }
//!   remote: [github:tidalcycles/Dirt-Samples]
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::evaluator::SampleMap;
use crate::params::Parameters;
use crate::phase::{Phase, PhaseName, PhaseTable};
use crate::session::SessionOptions;

/// Default quiet window for parameter dispatches, in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 150;

/// Default pause between "Initializing..." and the first dispatch.
pub const DEFAULT_WARMUP_MS: u64 = 500;

/// Root of a session file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Runtime settings.
    #[serde(default)]
    pub session: SessionSettings,

    /// Initial live control values.
    #[serde(default)]
    pub parameters: Parameters,

    /// Phase table override; the standard arc when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phases: Option<Vec<PhaseEntry>>,

    /// Sample registration handed to the evaluator.
    #[serde(default)]
    pub samples: SampleMap,
}

/// `session:` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionSettings {
    /// Free-form name used in logs and events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Quiet window for debounced parameter dispatches.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Delay between showing "Initializing..." and the first dispatch.
    #[serde(default = "default_warmup_ms")]
    pub warmup_ms: u64,
}

const fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

const fn default_warmup_ms() -> u64 {
    DEFAULT_WARMUP_MS
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            name: None,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            warmup_ms: DEFAULT_WARMUP_MS,
        }
    }
}

/// One `phases:` entry as written in the file.
///
/// Kept loosely typed so validation can report every bad entry at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhaseEntry {
    /// Phase name (`intro`, `groove`, `breakdown`, `build-up`, `drop`, `outro`).
    pub name: String,
    /// Length in bars.
    pub duration_bars: u32,
    /// Energy percentage.
    pub energy: u32,
}

impl SessionConfig {
    /// Builds the frozen phase table.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for unknown names or out-of-range
    /// values. Run the validator first for a complete report.
    pub fn phase_table(&self) -> Result<PhaseTable, ConfigError> {
        let Some(entries) = &self.phases else {
            return Ok(PhaseTable::default());
        };

        let phases = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let name: PhaseName = entry.name.parse()?;
                let energy = u8::try_from(entry.energy)
                    .ok()
                    .filter(|e| *e <= 100)
                    .ok_or_else(|| ConfigError::InvalidValue {
                        field: format!("phases[{i}].energy"),
                        value: entry.energy.to_string(),
                        expected: "a percentage between 0 and 100".to_string(),
                    })?;
                Ok(Phase::new(name, entry.duration_bars, energy))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        PhaseTable::new(phases)
    }

    /// Runtime options for the session controller.
    #[must_use]
    pub const fn session_options(&self) -> SessionOptions {
        SessionOptions {
            debounce: Duration::from_millis(self.session.debounce_ms),
            warmup: Duration::from_millis(self.session.warmup_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: SessionConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.session.debounce_ms, 150);
        assert_eq!(config.session.warmup_ms, 500);
        assert_eq!(config.phase_table().unwrap(), PhaseTable::default());
        assert_eq!(config.parameters, Parameters::default());
    }

    #[test]
    fn custom_phases_build_table() {
        let yaml = r"
phases:
  - { name: intro, duration_bars: 2, energy: 10 }
  - { name: Build-up, duration_bars: 1, energy: 90 }
";
        let config: SessionConfig = serde_yaml::from_str(yaml).unwrap();
        let table = config.phase_table().unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1).name, PhaseName::BuildUp);
        assert_eq!(table.get(1).energy, 90);
    }

    #[test]
    fn energy_over_100_is_rejected() {
        let yaml = "phases:\n  - { name: drop, duration_bars: 4, energy: 300 }\n";
        let config: SessionConfig = serde_yaml::from_str(yaml).unwrap();
        let err = config.phase_table().unwrap_err();
        assert!(err.to_string().contains("phases[0].energy"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<SessionConfig, _> = serde_yaml::from_str("tempo: 140");
        assert!(result.is_err());
    }

    #[test]
    fn session_options_convert_millis() {
        let yaml = "session:\n  debounce_ms: 120\n  warmup_ms: 0\n";
        let config: SessionConfig = serde_yaml::from_str(yaml).unwrap();
        let options = config.session_options();
        assert_eq!(options.debounce, Duration::from_millis(120));
        assert_eq!(options.warmup, Duration::ZERO);
    }
}
