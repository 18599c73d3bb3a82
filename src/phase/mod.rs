//! Phase table
//!
//! A session cycles through a fixed, ordered list of macro-sections.
//! Each [`Phase`] carries its length in bars and a target energy; the
//! [`PhaseTable`] provides indexed and cyclic lookup over them.

pub mod table;

pub use table::{DEFAULT_PHASES, Phase, PhaseName, PhaseTable};
