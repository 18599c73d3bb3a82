//! Session metrics.
//!
//! Prometheus-compatible counters and gauges with typed helpers. Without an
//! installed recorder the helpers are no-ops.

use std::sync::atomic::{AtomicBool, Ordering};

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::TranceLoopError;
use crate::phase::PhaseName;

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Installs the global recorder.
///
/// With `Some(port)` a Prometheus listener is served on
/// `127.0.0.1:<port>`; with `None` metrics are only recorded in-process.
///
/// # Errors
///
/// Returns `TranceLoopError::Io` if the recorder or listener cannot be
/// installed.
pub fn init_metrics(port: Option<u16>) -> Result<(), TranceLoopError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }

    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| TranceLoopError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_counter!("tranceloop_bars_total", "Bars played");
    describe_counter!(
        "tranceloop_phase_transitions_total",
        "Phase transitions by source and target phase"
    );
    describe_counter!(
        "tranceloop_dispatch_total",
        "Scripts handed to the evaluator by reason"
    );
    describe_counter!(
        "tranceloop_dispatch_failures_total",
        "Scripts the evaluator rejected by reason"
    );
    describe_gauge!("tranceloop_current_energy", "Energy of the current phase");
    describe_gauge!("tranceloop_tempo_bpm", "Live tempo");
}

/// Records one bar in `phase`.
pub fn record_bar(phase: PhaseName) {
    counter!("tranceloop_bars_total", "phase" => phase.key()).increment(1);
}

/// Records a phase transition.
pub fn record_phase_transition(from: PhaseName, to: PhaseName) {
    counter!(
        "tranceloop_phase_transitions_total",
        "from" => from.key(),
        "to" => to.key()
    )
    .increment(1);
}

/// Records a dispatch and, if it failed, a failure.
pub fn record_dispatch(reason: &'static str, success: bool) {
    counter!("tranceloop_dispatch_total", "reason" => reason).increment(1);
    if !success {
        counter!("tranceloop_dispatch_failures_total", "reason" => reason).increment(1);
    }
}

/// Sets the energy gauge.
pub fn set_current_energy(energy: u8) {
    gauge!("tranceloop_current_energy").set(f64::from(energy));
}

/// Sets the tempo gauge.
pub fn set_tempo(tempo_bpm: f64) {
    gauge!("tranceloop_tempo_bpm").set(tempo_bpm);
}
