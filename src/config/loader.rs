//! Session file loader
//!
//! Loading pipeline:
//! 1. Size check and read
//! 2. Environment variable expansion (on raw text, before parsing)
//! 3. YAML parsing into [`SessionConfig`]
//! 4. Validation
//! 5. Freeze with `Arc`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::schema::SessionConfig;
use crate::config::validation::Validator;
use crate::error::ConfigError;

/// Default upper bound on session file size.
pub const DEFAULT_MAX_CONFIG_SIZE: usize = 1024 * 1024;

/// Options for the configuration loader.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Maximum configuration file size in bytes.
    pub max_config_size: usize,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            max_config_size: env_or("TRANCELOOP_MAX_CONFIG_SIZE", DEFAULT_MAX_CONFIG_SIZE),
        }
    }
}

/// Result of loading a session file.
#[derive(Debug)]
pub struct LoadResult {
    /// The loaded and validated configuration.
    pub config: Arc<SessionConfig>,

    /// Warnings encountered during loading.
    pub warnings: Vec<LoadWarning>,
}

/// Warning during configuration loading.
#[derive(Debug, Clone)]
pub struct LoadWarning {
    /// Warning message.
    pub message: String,

    /// Location where the warning occurred.
    pub location: Option<String>,
}

/// Configuration loader.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: LoaderOptions,
}

impl ConfigLoader {
    /// Creates a new configuration loader with the given options.
    #[must_use]
    pub const fn new(options: LoaderOptions) -> Self {
        Self { options }
    }

    /// Loads, validates and freezes a session file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or too large, a required
    /// environment variable is unset, the YAML does not parse, or
    /// validation reports errors.
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        let size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if size > self.options.max_config_size {
            return Err(ConfigError::TooLarge {
                path: path.to_path_buf(),
                size,
                limit: self.options.max_config_size,
            });
        }

        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        self.load_str(&raw, path)
    }

    /// Runs the pipeline on in-memory text; `origin` is used in messages.
    ///
    /// # Errors
    ///
    /// See [`ConfigLoader::load`].
    pub fn load_str(&self, raw: &str, origin: &Path) -> Result<LoadResult, ConfigError> {
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
        let (expanded, mut warnings) = expand_env(raw, origin)?;

        let config: SessionConfig = if expanded.trim().is_empty() {
            SessionConfig::default()
        } else {
            serde_yaml::from_str(&expanded).map_err(|e| ConfigError::ParseError {
                path: origin.to_path_buf(),
                line: e.location().map(|l| l.line()),
                message: e.to_string(),
            })?
        };

        let result = Validator::new().validate(&config);
        if result.has_errors() {
            return Err(ConfigError::ValidationError {
                path: origin.display().to_string(),
                errors: result.errors,
            });
        }

        warnings.extend(result.warnings.into_iter().map(|issue| LoadWarning {
            message: issue.message,
            location: Some(issue.path),
        }));

        Ok(LoadResult {
            config: Arc::new(config),
            warnings,
        })
    }
}

/// Expands `${VAR}`, `${VAR:-default}` and `${VAR:?message}`; `$$` is a
/// literal `$`. An unset `${VAR}` expands to nothing with a warning.
fn expand_env(raw: &str, origin: &Path) -> Result<(String, Vec<LoadWarning>), ConfigError> {
    let mut out = String::with_capacity(raw.len());
    let mut warnings = Vec::new();
    let mut rest = raw;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 1..];

        if let Some(after) = tail.strip_prefix('$') {
            out.push('$');
            rest = after;
        } else if let Some(body) = tail.strip_prefix('{') {
            let close = body.find('}').ok_or_else(|| ConfigError::ParseError {
                path: origin.to_path_buf(),
                line: Some(raw[..raw.len() - rest.len() + pos].lines().count().max(1)),
                message: "Unclosed environment variable reference".to_string(),
            })?;
            let reference = &body[..close];
            rest = &body[close + 1..];

            let (name, fallback) = reference
                .split_once(":-")
                .map_or((reference, None), |(n, d)| (n, Some(Fallback::Default(d))));
            let (name, fallback) = match fallback {
                Some(f) => (name, Some(f)),
                None => reference
                    .split_once(":?")
                    .map_or((reference, None), |(n, m)| (n, Some(Fallback::Required(m)))),
            };

            match (std::env::var(name), fallback) {
                (Ok(value), _) => out.push_str(&value),
                (Err(_), Some(Fallback::Default(value))) => out.push_str(value),
                (Err(_), Some(Fallback::Required(message))) => {
                    return Err(ConfigError::EnvVarNotSet {
                        var: name.to_string(),
                        location: message.to_string(),
                    });
                }
                (Err(_), None) => warnings.push(LoadWarning {
                    message: format!("Environment variable '{name}' is not set, using empty string"),
                    location: Some(origin.display().to_string()),
                }),
            }
        } else {
            out.push('$');
            rest = tail;
        }
    }

    out.push_str(rest);
    Ok((out, warnings))
}

enum Fallback<'a> {
    Default(&'a str),
    Required(&'a str),
}

/// Parses an environment variable with a default value.
fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Session file picked up from the working directory when `--config` is
/// absent.
#[must_use]
pub fn default_config_path() -> PathBuf {
    PathBuf::from("tranceloop.yaml")
}
