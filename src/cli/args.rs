//! CLI argument definitions
//!
//! All Clap derive structs for `tranceloop` command-line parsing.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::params::Parameters;
use crate::phase::PhaseName;

// ============================================================================
// Root CLI
// ============================================================================

/// Generative trance session driver.
#[derive(Parser, Debug)]
#[command(name = "tranceloop", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "TRANCELOOP_COLOR")]
    pub color: ColorChoice,

    /// Log line format.
    #[arg(long, default_value = "human", global = true, env = "TRANCELOOP_LOG_FORMAT")]
    pub log_format: OutputFormat,
}

// ============================================================================
// Top-Level Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a live session.
    Run(RunArgs),

    /// Print the pattern script for one phase.
    Generate(GenerateArgs),

    /// List the phase cycle.
    Phases(PhasesArgs),

    /// Validate session files without playing them.
    Validate(ValidateArgs),

    /// Generate shell completion scripts.
    Completions(CompletionsArgs),

    /// Display version information.
    Version(VersionArgs),
}

/// Live control overrides shared by `run` and `generate`.
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct ParameterArgs {
    /// Tempo in BPM.
    #[arg(long)]
    pub tempo: Option<f64>,

    /// Bass filter cutoff in Hz.
    #[arg(long)]
    pub cutoff: Option<f64>,

    /// Bass filter resonance.
    #[arg(long)]
    pub resonance: Option<f64>,
}

impl ParameterArgs {
    /// Applies the given overrides on top of `base`.
    #[must_use]
    pub fn apply(&self, base: Parameters) -> Parameters {
        Parameters {
            tempo_bpm: self.tempo.unwrap_or(base.tempo_bpm),
            cutoff_hz: self.cutoff.unwrap_or(base.cutoff_hz),
            resonance: self.resonance.unwrap_or(base.resonance),
        }
    }
}

/// Arguments for `run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Session file.
    #[arg(short, long, env = "TRANCELOOP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Live control overrides.
    #[command(flatten)]
    pub parameters: ParameterArgs,

    /// Publish scripts to this file instead of stdout.
    #[arg(short, long, env = "TRANCELOOP_SCRIPT_OUT")]
    pub out: Option<PathBuf>,

    /// Write the JSONL event stream to this file (`-` for stderr).
    #[arg(long)]
    pub events_file: Option<PathBuf>,

    /// Serve Prometheus metrics on this port.
    #[arg(long, env = "TRANCELOOP_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Stop after this long (e.g. `90s`, `5m`).
    #[arg(long = "for", value_parser = humantime::parse_duration)]
    pub run_for: Option<Duration>,

    /// Draw the waveform feed on stderr.
    #[arg(long)]
    pub visualize: bool,

    /// Wait for a `start` command instead of playing immediately.
    #[arg(long)]
    pub paused: bool,
}

/// Arguments for `generate`.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Phase to generate (`intro`, `groove`, `breakdown`, `build-up`,
    /// `drop`, `outro`).
    #[arg(required_unless_present = "silence")]
    pub phase: Option<PhaseName>,

    /// Live control values.
    #[command(flatten)]
    pub parameters: ParameterArgs,

    /// Session file supplying the phase table and parameters.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print the silence script instead.
    #[arg(long, conflicts_with = "phase")]
    pub silence: bool,
}

/// Arguments for `phases`.
#[derive(Args, Debug)]
pub struct PhasesArgs {
    /// Session file with a phase table override.
    #[arg(short, long, env = "TRANCELOOP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Tempo used to compute phase lengths.
    #[arg(long)]
    pub tempo: Option<f64>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Session files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Treat warnings as errors.
    #[arg(long)]
    pub strict: bool,
}

// ============================================================================
// Completions / Version
// ============================================================================

/// Arguments for `completions`.
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell.
    pub shell: Shell,
}

/// Arguments for `version`.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Color when stderr is a terminal and `NO_COLOR` is unset.
    #[default]
    Auto,
    /// Always emit ANSI colors.
    Always,
    /// Never emit ANSI colors.
    Never,
}

/// Human or machine output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text.
    #[default]
    Human,
    /// JSON.
    Json,
}

/// Shells supported by `completions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    /// Bash.
    Bash,
    /// Zsh.
    Zsh,
    /// Fish.
    Fish,
    /// `PowerShell`.
    #[value(name = "powershell")]
    PowerShell,
    /// Elvish.
    Elvish,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_without_arguments() {
        let cli = Cli::try_parse_from(["tranceloop", "run"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(args.config.is_none());
        assert!(!args.paused);
    }

    #[test]
    fn run_with_overrides_and_duration() {
        let cli = Cli::try_parse_from([
            "tranceloop",
            "run",
            "--tempo",
            "130",
            "--cutoff",
            "800",
            "--for",
            "90s",
            "--visualize",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.parameters.tempo, Some(130.0));
        assert_eq!(args.parameters.cutoff, Some(800.0));
        assert_eq!(args.run_for, Some(Duration::from_secs(90)));
        assert!(args.visualize);
    }

    #[test]
    fn bad_duration_is_rejected() {
        assert!(Cli::try_parse_from(["tranceloop", "run", "--for", "soon"]).is_err());
    }

    #[test]
    fn generate_parses_phase_names() {
        for phase in ["intro", "groove", "breakdown", "build-up", "drop", "outro"] {
            let cli = Cli::try_parse_from(["tranceloop", "generate", phase]);
            assert!(cli.is_ok(), "Failed to parse phase={phase}");
        }
        assert!(Cli::try_parse_from(["tranceloop", "generate", "chorus"]).is_err());
    }

    #[test]
    fn generate_needs_phase_or_silence() {
        assert!(Cli::try_parse_from(["tranceloop", "generate"]).is_err());
        assert!(Cli::try_parse_from(["tranceloop", "generate", "--silence"]).is_ok());
        assert!(Cli::try_parse_from(["tranceloop", "generate", "drop", "--silence"]).is_err());
    }

    #[test]
    fn validate_requires_files() {
        assert!(Cli::try_parse_from(["tranceloop", "validate"]).is_err());
    }

    #[test]
    fn completions_shells_parse() {
        for shell in ["bash", "zsh", "fish", "powershell", "elvish"] {
            let cli = Cli::try_parse_from(["tranceloop", "completions", shell]);
            assert!(cli.is_ok(), "Failed to parse shell={shell}");
        }
    }

    #[test]
    fn verbose_count_is_global() {
        let cli = Cli::try_parse_from(["tranceloop", "phases", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn help_output() {
        let err = Cli::try_parse_from(["tranceloop", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn parameter_overrides_apply() {
        let overrides = ParameterArgs {
            tempo: Some(140.0),
            cutoff: None,
            resonance: Some(0.0),
        };
        let params = overrides.apply(Parameters::default());
        assert!((params.tempo_bpm - 140.0).abs() < f64::EPSILON);
        assert!((params.cutoff_hz - 1000.0).abs() < f64::EPSILON);
        assert!(params.resonance.abs() < f64::EPSILON);
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
