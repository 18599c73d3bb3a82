//! Bar scheduler
//!
//! Keeps a bar-accurate clock running while tempo changes mid-performance.
//!
//! # Architecture
//!
//! - [`SessionState`] - phase index, bar counter, energy and bar timing
//! - [`BarScheduler`] - the bar/phase state machine and its tick timer
//! - [`TickTimer`] - cancellable, re-armable one-shot wake-up
//! - [`Debouncer`] - coalesces bursts of intents into the last one

pub mod debounce;
pub mod engine;
pub mod state;
pub mod timer;

pub use debounce::{DEFAULT_DEBOUNCE, Debouncer};
pub use engine::{
    BarScheduler, BarTick, MAX_RESYNC_PROGRESS, PhaseTransition, Resync, format_label,
    resync_delay,
};
pub use state::SessionState;
pub use timer::TickTimer;
