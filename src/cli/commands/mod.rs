//! CLI command dispatch and handlers
//!
//! Routes parsed CLI arguments to the appropriate command handler.

pub mod completions;
pub mod generate;
pub mod phases;
pub mod run;
pub mod validate;
pub mod version;

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::cli::args::{Cli, Commands};
use crate::config::{ConfigLoader, SessionConfig, default_config_path};
use crate::error::TranceLoopError;

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// `cancel` fires on the first Ctrl+C or SIGTERM.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub async fn dispatch(cli: Cli, cancel: CancellationToken) -> Result<(), TranceLoopError> {
    match cli.command {
        Commands::Run(args) => run::run(&args, cli.quiet, cancel).await,
        Commands::Generate(args) => generate::run(&args),
        Commands::Phases(args) => phases::run(&args),
        Commands::Validate(args) => validate::run(&args),
        Commands::Completions(args) => {
            completions::run(&args);
            Ok(())
        }
        Commands::Version(args) => {
            version::run(&args);
            Ok(())
        }
    }
}

/// Loads a session file, logging its warnings. Without `path` the file in
/// the working directory is used if present, otherwise the defaults.
fn load_config(path: Option<&Path>) -> Result<Arc<SessionConfig>, TranceLoopError> {
    let fallback = default_config_path();
    let path = match path {
        Some(path) => path,
        None if fallback.is_file() => fallback.as_path(),
        None => return Ok(Arc::new(SessionConfig::default())),
    };

    tracing::info!(config = %path.display(), "loading session file");
    let result = ConfigLoader::default().load(path)?;
    for warning in &result.warnings {
        tracing::warn!(
            location = warning.location.as_deref().unwrap_or("<unknown>"),
            "{}",
            warning.message
        );
    }
    Ok(result.config)
}
