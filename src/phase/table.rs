//! Phase descriptors and the cyclic phase table.
//!
//! The table is validated once when it is built and never mutated
//! afterwards; sessions share it through an `Arc`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Named macro-section of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhaseName {
    /// Filtered kick and pad only.
    Intro,
    /// Full groove with hats and bass.
    Groove,
    /// Percussion drops out, lead and pad carry the harmony.
    Breakdown,
    /// Dense snare roll into the drop.
    BuildUp,
    /// Everything at full energy.
    Drop,
    /// Kick and pad wind down.
    Outro,
}

impl PhaseName {
    /// All phase names in their canonical session order.
    pub const ALL: [Self; 6] = [
        Self::Intro,
        Self::Groove,
        Self::Breakdown,
        Self::BuildUp,
        Self::Drop,
        Self::Outro,
    ];

    /// Display label used on the display surface.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Intro => "Intro",
            Self::Groove => "Groove",
            Self::Breakdown => "Breakdown",
            Self::BuildUp => "Build-up",
            Self::Drop => "Drop",
            Self::Outro => "Outro",
        }
    }

    /// Kebab-case identifier used in configuration files and on the CLI.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Intro => "intro",
            Self::Groove => "groove",
            Self::Breakdown => "breakdown",
            Self::BuildUp => "build-up",
            Self::Drop => "drop",
            Self::Outro => "outro",
        }
    }

    /// Returns the closest known phase key for a misspelled name.
    #[must_use]
    pub fn suggest(input: &str) -> Option<&'static str> {
        let input = input.to_ascii_lowercase();
        Self::ALL
            .iter()
            .map(|p| (p.key(), strsim::damerau_levenshtein(&input, p.key())))
            .filter(|(_, distance)| *distance <= 3)
            .min_by_key(|(_, distance)| *distance)
            .map(|(key, _)| key)
    }
}

impl fmt::Display for PhaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PhaseName {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        let normalized = if normalized == "buildup" {
            "build-up".to_string()
        } else {
            normalized
        };

        Self::ALL
            .into_iter()
            .find(|p| p.key() == normalized)
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "phase".to_string(),
                value: s.to_string(),
                expected: Self::suggest(s).map_or_else(
                    || "one of intro, groove, breakdown, build-up, drop, outro".to_string(),
                    |hint| format!("a phase name (did you mean '{hint}'?)"),
                ),
            })
    }
}

/// Immutable phase descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    /// Which macro-section this is.
    pub name: PhaseName,
    /// Length of the phase in bars (at least 1).
    pub duration_bars: u32,
    /// Target intensity, 0-100.
    pub energy: u8,
}

impl Phase {
    /// Creates a phase descriptor. Bounds are checked by [`PhaseTable::new`].
    #[must_use]
    pub const fn new(name: PhaseName, duration_bars: u32, energy: u8) -> Self {
        Self {
            name,
            duration_bars,
            energy,
        }
    }
}

/// The standard trance arc.
pub const DEFAULT_PHASES: [Phase; 6] = [
    Phase::new(PhaseName::Intro, 8, 20),
    Phase::new(PhaseName::Groove, 16, 60),
    Phase::new(PhaseName::Breakdown, 16, 30),
    Phase::new(PhaseName::BuildUp, 8, 80),
    Phase::new(PhaseName::Drop, 16, 100),
    Phase::new(PhaseName::Outro, 8, 40),
];

/// Ordered, cyclic, validated list of phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTable {
    phases: Arc<[Phase]>,
}

impl PhaseTable {
    /// Builds a table, rejecting empty tables, zero-length phases and
    /// energy above 100.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the first offending entry.
    pub fn new(phases: Vec<Phase>) -> Result<Self, ConfigError> {
        if phases.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "phases".to_string(),
                value: "[]".to_string(),
                expected: "at least one phase".to_string(),
            });
        }

        for (i, phase) in phases.iter().enumerate() {
            if phase.duration_bars == 0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("phases[{i}].duration_bars"),
                    value: "0".to_string(),
                    expected: "a bar count of at least 1".to_string(),
                });
            }
            if phase.energy > 100 {
                return Err(ConfigError::InvalidValue {
                    field: format!("phases[{i}].energy"),
                    value: phase.energy.to_string(),
                    expected: "a percentage between 0 and 100".to_string(),
                });
            }
        }

        Ok(Self {
            phases: phases.into(),
        })
    }

    /// Number of phases in one cycle.
    #[must_use]
    pub fn len(&self) -> usize {
        self.phases.len()
    }

    /// Always `false`; an empty table cannot be constructed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Returns the phase at `index`, wrapping around the cycle.
    #[must_use]
    pub fn get(&self, index: usize) -> &Phase {
        &self.phases[index % self.phases.len()]
    }

    /// Index following `index` in the cycle.
    #[must_use]
    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.phases.len()
    }

    /// First index holding a phase with the given name.
    #[must_use]
    pub fn position(&self, name: PhaseName) -> Option<usize> {
        self.phases.iter().position(|p| p.name == name)
    }

    /// First phase with the given name.
    #[must_use]
    pub fn find(&self, name: PhaseName) -> Option<&Phase> {
        self.phases.iter().find(|p| p.name == name)
    }

    /// Bars in one full cycle of the table.
    #[must_use]
    pub fn total_bars(&self) -> u64 {
        self.phases.iter().map(|p| u64::from(p.duration_bars)).sum()
    }

    /// Iterates over the phases in order.
    pub fn iter(&self) -> impl Iterator<Item = &Phase> {
        self.phases.iter()
    }
}

impl Default for PhaseTable {
    fn default() -> Self {
        Self {
            phases: DEFAULT_PHASES.into(),
        }
    }
}
