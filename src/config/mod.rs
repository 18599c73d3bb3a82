//! Session configuration
//!
//! Loads and validates session files: initial parameters, an optional
//! phase table override, sample registration and runtime settings.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigLoader, LoadResult, LoadWarning, LoaderOptions, default_config_path};
pub use schema::*;
pub use validation::{ValidationResult, Validator};
