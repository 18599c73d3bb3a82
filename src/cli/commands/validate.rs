//! `validate`: check session files without playing them.

use std::path::PathBuf;

use serde::Serialize;

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::config::ConfigLoader;
use crate::error::{ConfigError, Severity, TranceLoopError, ValidationIssue};

#[derive(Debug, Serialize)]
struct FileReport {
    file: PathBuf,
    valid: bool,
    errors: Vec<String>,
    warnings: Vec<String>,
}

/// Validate every file and print a report.
///
/// # Errors
///
/// Returns the last failure if any file is invalid, or has warnings in
/// strict mode.
pub fn run(args: &ValidateArgs) -> Result<(), TranceLoopError> {
    let loader = ConfigLoader::default();
    let mut failure = None;
    let mut reports = Vec::with_capacity(args.files.len());

    for path in &args.files {
        tracing::info!(file = %path.display(), "validating session file");
        let (report, error) = check(&loader, path.clone(), args.strict);
        if let Some(error) = error {
            failure = Some(error);
        }
        reports.push(report);
    }

    match args.format {
        OutputFormat::Human => {
            for report in &reports {
                let status = if report.valid { "ok" } else { "invalid" };
                println!("{}: {status}", report.file.display());
                for line in report.errors.iter().chain(&report.warnings) {
                    println!("  {line}");
                }
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
    }

    failure.map_or(Ok(()), |e| Err(e.into()))
}

fn check(loader: &ConfigLoader, file: PathBuf, strict: bool) -> (FileReport, Option<ConfigError>) {
    match loader.load(&file) {
        Ok(result) => {
            let warnings: Vec<String> = result
                .warnings
                .iter()
                .map(|w| match &w.location {
                    Some(at) => format!("warning: {} at {at}", w.message),
                    None => format!("warning: {}", w.message),
                })
                .collect();

            let error = (strict && !result.warnings.is_empty()).then(|| {
                ConfigError::ValidationError {
                    path: file.display().to_string(),
                    errors: result
                        .warnings
                        .iter()
                        .map(|w| ValidationIssue {
                            path: w.location.clone().unwrap_or_default(),
                            message: w.message.clone(),
                            severity: Severity::Error,
                        })
                        .collect(),
                }
            });

            let report = FileReport {
                file,
                valid: error.is_none(),
                errors: Vec::new(),
                warnings,
            };
            (report, error)
        }
        Err(error) => {
            let errors = match &error {
                ConfigError::ValidationError { errors, .. } => {
                    errors.iter().map(ToString::to_string).collect()
                }
                other => vec![format!("error: {other}")],
            };
            let report = FileReport {
                file,
                valid: false,
                errors,
                warnings: Vec::new(),
            };
            (report, Some(error))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn file(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "{contents}").unwrap();
        f
    }

    #[test]
    fn valid_file_passes() {
        let f = file("parameters: { tempo_bpm: 140 }");
        let (report, error) = check(&ConfigLoader::default(), f.path().to_path_buf(), false);
        assert!(report.valid);
        assert!(error.is_none());
    }

    #[test]
    fn issues_are_listed() {
        let f = file("phases:\n  - { name: dorp, duration_bars: 0, energy: 10 }\n");
        let (report, error) = check(&ConfigLoader::default(), f.path().to_path_buf(), false);
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors[0].contains("did you mean 'drop'"));
        assert!(error.is_some());
    }

    #[test]
    fn strict_mode_fails_on_warnings() {
        let f = file("session: { debounce_ms: 1000 }");
        let loader = ConfigLoader::default();
        let (lenient, _) = check(&loader, f.path().to_path_buf(), false);
        let (strict, error) = check(&loader, f.path().to_path_buf(), true);
        assert!(lenient.valid);
        assert_eq!(lenient.warnings.len(), 1);
        assert!(!strict.valid);
        assert!(matches!(error, Some(ConfigError::ValidationError { .. })));
    }
}
