//! Error types for `tranceloop`
//!
//! This module provides the error hierarchy used across the session
//! runtime, the configuration pipeline and the CLI, together with the
//! process exit codes each error maps to.

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `tranceloop` CLI operations.
///
/// These codes follow Unix conventions.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Session error (initialization failed, session task gone)
    pub const SESSION_ERROR: i32 = 5;

    /// Usage error (invalid arguments, out-of-range control values)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `tranceloop` operations.
///
/// Aggregates all domain-specific errors and provides a unified
/// exit code mapping for the binary.
#[derive(Debug, Error)]
pub enum TranceLoopError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Session lifecycle error
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Rejected live control value
    #[error(transparent)]
    Parameter(#[from] ParameterError),

    /// Evaluator collaborator error outside of a session
    #[error(transparent)]
    Evaluator(#[from] EvaluatorError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl TranceLoopError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) | Self::Yaml(_) => ExitCode::CONFIG_ERROR,
            Self::Session(_) => ExitCode::SESSION_ERROR,
            Self::Parameter(_) => ExitCode::USAGE_ERROR,
            Self::Evaluator(_) => ExitCode::ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Configuration validation failed
    #[error("validation failed for {path}")]
    ValidationError {
        /// Path to the configuration file
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Configuration file exceeds the size limit
    #[error("config file {path} is {size} bytes (limit: {limit})")]
    TooLarge {
        /// Path to the configuration file
        path: PathBuf,
        /// Actual size in bytes
        size: usize,
        /// Configured limit in bytes
        limit: usize,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },

    /// Environment variable referenced in configuration is not set
    #[error("environment variable '{var}' not set (referenced at {location})")]
    EnvVarNotSet {
        /// Name of the environment variable
        var: String,
        /// Location in the configuration where it was referenced
        location: String,
    },
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during configuration validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the problematic field (e.g., "phases[2].duration_bars")
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Error - validation failure that prevents configuration from being used
    Error,
    /// Warning - potential issue that does not prevent configuration loading
    Warning,
}

// ============================================================================
// Parameter Errors
// ============================================================================

/// Live control values rejected before they reach the session.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ParameterError {
    /// Tempo must lie between 1 and 1000 BPM
    #[error("invalid tempo: {0} BPM (must be between 1 and 1000)")]
    InvalidTempo(f64),

    /// Cutoff must be finite and strictly positive
    #[error("invalid cutoff: {0} Hz (must be > 0)")]
    InvalidCutoff(f64),

    /// Resonance must be finite and non-negative
    #[error("invalid resonance: {0} (must be >= 0)")]
    InvalidResonance(f64),
}

// ============================================================================
// Evaluator Errors
// ============================================================================

/// Failures reported by the external audio pattern evaluator.
#[derive(Debug, Error)]
pub enum EvaluatorError {
    /// The evaluator rejected a script
    #[error("script rejected: {0}")]
    Rejected(String),

    /// The audio context could not be created or resumed
    #[error("audio context unavailable: {0}")]
    ContextUnavailable(String),

    /// Sample registration failed
    #[error("sample registration failed: {0}")]
    Samples(String),

    /// I/O failure while handing the script over
    #[error("evaluator I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Session Errors
// ============================================================================

/// Session lifecycle errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Evaluator or context setup failed; the session stays stopped
    #[error("session initialization failed: {0}")]
    Initialization(#[source] EvaluatorError),

    /// A generated script was rejected by the evaluator
    #[error("dispatch failed: {0}")]
    Dispatch(#[source] EvaluatorError),

    /// The session task is no longer running
    #[error("session task closed")]
    Closed,
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `tranceloop` operations.
pub type Result<T> = std::result::Result<T, TranceLoopError>;

// ============================================================================
// Tests
// ============================================================================
