//! `generate`: print one pattern script.

use crate::cli::args::GenerateArgs;
use crate::error::TranceLoopError;
use crate::pattern;
use crate::phase::{DEFAULT_PHASES, Phase};

use super::load_config;

/// Print the script for the requested phase, or the silence script.
///
/// A phase missing from a configured table falls back to its standard
/// length and energy.
///
/// # Errors
///
/// Returns an error if the session file is invalid or a parameter is out
/// of range.
pub fn run(args: &GenerateArgs) -> Result<(), TranceLoopError> {
    print!("{}", render(args)?);
    Ok(())
}

fn render(args: &GenerateArgs) -> Result<String, TranceLoopError> {
    if args.silence {
        return Ok(format!("{}\n", pattern::silence()));
    }

    let config = load_config(args.config.as_deref())?;
    let params = args.parameters.apply(config.parameters);
    params.validate()?;

    let Some(name) = args.phase else {
        return Ok(format!("{}\n", pattern::silence()));
    };
    let table = config.phase_table()?;
    let phase: Phase = table
        .find(name)
        .or_else(|| DEFAULT_PHASES.iter().find(|p| p.name == name))
        .copied()
        .unwrap_or(Phase::new(name, 1, 0));

    Ok(pattern::generate(&phase, &params))
}
