//! Coalescing debouncer.
//!
//! Each [`Debouncer::push`] records the latest intent and restarts the
//! quiet window. Only when the window elapses without a new push does
//! [`Debouncer::ready`] hand the most recent intent back, once.

use std::time::Duration;

use super::timer::TickTimer;

/// Default quiet window for parameter-driven dispatches.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(150);

/// Holds the latest intent until its quiet window expires.
#[derive(Debug)]
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<T>,
    timer: TickTimer,
}

impl<T> Debouncer<T> {
    /// Creates an idle debouncer with the given quiet window.
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
            timer: TickTimer::new(),
        }
    }

    /// Quiet window length.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Records `intent`, replacing any earlier one, and restarts the window.
    pub fn push(&mut self, intent: T) {
        self.pending = Some(intent);
        self.timer.schedule_after(self.window);
    }

    /// Discards the pending intent without running it.
    pub fn cancel(&mut self) -> Option<T> {
        self.timer.cancel();
        self.pending.take()
    }

    /// Whether an intent is waiting for its window to expire.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Completes with the latest intent once the window has elapsed.
    /// Never completes while idle. Cancel-safe.
    pub async fn ready(&mut self) -> T {
        loop {
            self.timer.fired().await;
            if let Some(intent) = self.pending.take() {
                return intent;
            }
        }
    }
}

impl<T> Default for Debouncer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}
