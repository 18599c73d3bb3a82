//! `phases`: list the phase cycle.

use serde::Serialize;

use crate::cli::args::{OutputFormat, PhasesArgs};
use crate::display::energy_meter;
use crate::error::TranceLoopError;
use crate::params::{bar_duration, validate_tempo};
use crate::phase::PhaseTable;

use super::load_config;

#[derive(Debug, Serialize)]
struct PhaseRow {
    index: usize,
    name: String,
    duration_bars: u32,
    energy: u8,
    seconds: f64,
}

/// Print the configured or standard phase table.
///
/// # Errors
///
/// Returns an error if the session file or tempo is invalid.
pub fn run(args: &PhasesArgs) -> Result<(), TranceLoopError> {
    let config = load_config(args.config.as_deref())?;
    let tempo = args.tempo.unwrap_or(config.parameters.tempo_bpm);
    validate_tempo(tempo)?;
    let table = config.phase_table()?;
    let rows = rows(&table, tempo);

    match args.format {
        OutputFormat::Human => {
            for row in &rows {
                println!(
                    "{:>2}. {:<10} {:>3} bars  {} {:>3}%  {:>6.1}s",
                    row.index + 1,
                    row.name,
                    row.duration_bars,
                    energy_meter(row.energy),
                    row.energy,
                    row.seconds
                );
            }
            println!(
                "cycle: {} bars, {:.1}s at {tempo} BPM",
                table.total_bars(),
                rows.iter().map(|r| r.seconds).sum::<f64>()
            );
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
    }
    Ok(())
}

fn rows(table: &PhaseTable, tempo: f64) -> Vec<PhaseRow> {
    let bar = bar_duration(tempo).as_secs_f64();
    table
        .iter()
        .enumerate()
        .map(|(index, phase)| PhaseRow {
            index,
            name: phase.name.to_string(),
            duration_bars: phase.duration_bars,
            energy: phase.energy,
            seconds: bar * f64::from(phase.duration_bars),
        })
        .collect()
}
