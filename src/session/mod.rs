//! Session controller
//!
//! A session runs as one tokio task that exclusively owns the bar
//! scheduler, the parameter debouncer and the display. Callers drive it
//! through a cloneable [`SessionHandle`]:
//!
//! - start/stop travel over a command channel and are answered once
//!   applied,
//! - live parameters are published through a `watch` channel and read
//!   fresh at every generation,
//! - the task publishes a [`SessionSnapshot`] after every change.
//!
//! Scripts reach the evaluator through a [`dispatcher`] task that applies
//! them in submission order.

pub mod controller;
pub mod dispatcher;
pub mod handle;
pub mod snapshot;

pub use controller::SessionBuilder;
pub use dispatcher::DispatchReason;
pub use handle::SessionHandle;
pub use snapshot::SessionSnapshot;

use std::time::Duration;

use crate::config::schema::{DEFAULT_DEBOUNCE_MS, DEFAULT_WARMUP_MS};

/// Timing knobs for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Quiet window for parameter-driven dispatches.
    pub debounce: Duration,
    /// Pause between "Initializing..." and the initial dispatch.
    pub warmup: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            warmup: Duration::from_millis(DEFAULT_WARMUP_MS),
        }
    }
}
