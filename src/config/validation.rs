//! Session configuration validation.
//!
//! Validation runs on the deserialized [`SessionConfig`] and collects ALL
//! issues rather than stopping at the first, so a single run of
//! `tranceloop validate` reports everything wrong with a file.

use std::collections::HashSet;

use crate::config::schema::{PhaseEntry, SessionConfig};
use crate::error::{Severity, ValidationIssue};
use crate::evaluator::SampleMap;
use crate::params::{Parameters, validate_cutoff, validate_resonance, validate_tempo};
use crate::phase::PhaseName;

/// Debounce windows outside this range still work but feel sluggish or
/// stop coalescing slider drags.
const RECOMMENDED_DEBOUNCE_MS: std::ops::RangeInclusive<u64> = 100..=200;

/// Tempos above this are almost certainly a typo.
const MAX_PLAUSIBLE_TEMPO: f64 = 300.0;

const MAX_WARMUP_MS: u64 = 10_000;

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Configuration validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a configuration and returns every issue found.
    pub fn validate(&mut self, config: &SessionConfig) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        self.validate_session(config);
        self.validate_parameters(&config.parameters);
        if let Some(phases) = &config.phases {
            self.validate_phases(phases);
        }
        self.validate_samples(&config.samples);

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    fn validate_session(&mut self, config: &SessionConfig) {
        let settings = &config.session;

        if settings.name.as_deref().is_some_and(str::is_empty) {
            self.add_warning("session.name", "Session name is empty");
        }

        if !RECOMMENDED_DEBOUNCE_MS.contains(&settings.debounce_ms) {
            self.add_warning(
                "session.debounce_ms",
                &format!(
                    "Debounce window of {} ms is outside the recommended {}-{} ms",
                    settings.debounce_ms,
                    RECOMMENDED_DEBOUNCE_MS.start(),
                    RECOMMENDED_DEBOUNCE_MS.end()
                ),
            );
        }

        if settings.warmup_ms > MAX_WARMUP_MS {
            self.add_warning(
                "session.warmup_ms",
                &format!("Warm-up of {} ms delays every start", settings.warmup_ms),
            );
        }
    }

    fn validate_parameters(&mut self, params: &Parameters) {
        if let Err(e) = validate_tempo(params.tempo_bpm) {
            self.add_error("parameters.tempo_bpm", &e.to_string());
        } else if params.tempo_bpm > MAX_PLAUSIBLE_TEMPO {
            self.add_warning(
                "parameters.tempo_bpm",
                &format!("Tempo of {} BPM is unusually fast", params.tempo_bpm),
            );
        }

        if let Err(e) = validate_cutoff(params.cutoff_hz) {
            self.add_error("parameters.cutoff_hz", &e.to_string());
        }

        if let Err(e) = validate_resonance(params.resonance) {
            self.add_error("parameters.resonance", &e.to_string());
        }
    }

    fn validate_phases(&mut self, phases: &[PhaseEntry]) {
        if phases.is_empty() {
            self.add_error("phases", "Phase list cannot be empty; omit it to use the default arc");
            return;
        }

        let mut seen = HashSet::new();
        for (i, entry) in phases.iter().enumerate() {
            let path = format!("phases[{i}]");

            match entry.name.parse::<PhaseName>() {
                Ok(name) => {
                    if !seen.insert(name) {
                        self.add_warning(
                            &format!("{path}.name"),
                            &format!("Phase '{name}' appears more than once in the cycle"),
                        );
                    }
                }
                Err(_) => {
                    let hint = PhaseName::suggest(&entry.name)
                        .map_or_else(String::new, |s| format!(" (did you mean '{s}'?)"));
                    self.add_error(
                        &format!("{path}.name"),
                        &format!("Unknown phase '{}'{hint}", entry.name),
                    );
                }
            }

            if entry.duration_bars == 0 {
                self.add_error(
                    &format!("{path}.duration_bars"),
                    "Phase must last at least 1 bar",
                );
            }

            if entry.energy > 100 {
                self.add_error(
                    &format!("{path}.energy"),
                    &format!("Energy {} is above 100", entry.energy),
                );
            }
        }
    }

    fn validate_samples(&mut self, samples: &SampleMap) {
        for (bank, entries) in &samples.banks {
            if entries.is_empty() {
                self.add_warning(
                    &format!("samples.banks.{bank}"),
                    "Sample bank has no entries",
                );
            }
            for (name, path) in entries {
                if path.trim().is_empty() {
                    self.add_error(
                        &format!("samples.banks.{bank}.{name}"),
                        "Sample path cannot be empty",
                    );
                }
            }
        }
    }

    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}
