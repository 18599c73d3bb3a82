//! Display surfaces for the phase label and energy meter.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

/// Label shown while a session is starting.
pub const INITIALIZING_LABEL: &str = "Initializing...";

/// Label shown when a session failed to start.
pub const ERROR_LABEL: &str = "Error";

/// Label shown once a session has stopped.
pub const SILENT_LABEL: &str = "Silent";

/// Width of the console energy meter in cells.
const METER_WIDTH: usize = 20;

/// Receives the label and energy for every bar and lifecycle transition.
pub trait DisplaySurface: Send {
    /// Shows `label` with an energy percentage.
    fn update(&mut self, label: &str, energy: u8);
}

impl DisplaySurface for Box<dyn DisplaySurface> {
    fn update(&mut self, label: &str, energy: u8) {
        (**self).update(label, energy);
    }
}

/// One recorded display update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayUpdate {
    /// Label text.
    pub label: String,
    /// Energy percentage.
    pub energy: u8,
}

/// Records every update; clones share the same history.
#[derive(Debug, Clone, Default)]
pub struct MemoryDisplay {
    history: Arc<Mutex<Vec<DisplayUpdate>>>,
}

impl MemoryDisplay {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All updates so far, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<DisplayUpdate> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The most recent update.
    #[must_use]
    pub fn last(&self) -> Option<DisplayUpdate> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    /// Labels only, oldest first.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.history().into_iter().map(|u| u.label).collect()
    }
}

impl DisplaySurface for MemoryDisplay {
    fn update(&mut self, label: &str, energy: u8) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(DisplayUpdate {
                label: label.to_string(),
                energy,
            });
    }
}

/// Prints one line per update with an energy meter.
#[derive(Debug)]
pub struct ConsoleDisplay<W> {
    out: W,
}

impl ConsoleDisplay<std::io::Stderr> {
    /// Display on standard error, leaving stdout for scripts.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write + Send> ConsoleDisplay<W> {
    /// Wraps `out`.
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    /// Unwraps the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> DisplaySurface for ConsoleDisplay<W> {
    fn update(&mut self, label: &str, energy: u8) {
        let line = format!("{label:<24} {} {energy:>3}%", energy_meter(energy));
        if let Err(e) = writeln!(self.out, "{line}").and_then(|()| self.out.flush()) {
            warn!(error = %e, "failed to write display update");
        }
    }
}

/// Renders `energy` as a fixed-width bar, e.g. `[#####...............]`.
#[must_use]
pub fn energy_meter(energy: u8) -> String {
    let filled = usize::from(energy.min(100)) * METER_WIDTH / 100;
    format!(
        "[{}{}]",
        "#".repeat(filled),
        ".".repeat(METER_WIDTH - filled)
    )
}
