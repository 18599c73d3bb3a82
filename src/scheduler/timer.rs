//! Cancellable one-shot timer slot.
//!
//! A [`TickTimer`] holds at most one pending wake-up. Re-scheduling
//! replaces the pending deadline, cancelling drops it. The owner awaits
//! [`TickTimer::fired`] inside a `select!` loop; an unarmed timer never
//! completes, so the branch simply stays idle.

use std::pin::Pin;
use std::time::Duration;

use tokio::time::{Instant, Sleep, sleep_until};

/// A single re-armable delayed wake-up.
#[derive(Debug, Default)]
pub struct TickTimer {
    sleep: Option<Pin<Box<Sleep>>>,
}

impl TickTimer {
    /// Creates an unarmed timer.
    #[must_use]
    pub const fn new() -> Self {
        Self { sleep: None }
    }

    /// Arms the timer for `deadline`, replacing any pending wake-up.
    pub fn schedule_at(&mut self, deadline: Instant) {
        match self.sleep.as_mut() {
            Some(sleep) => sleep.as_mut().reset(deadline),
            None => self.sleep = Some(Box::pin(sleep_until(deadline))),
        }
    }

    /// Arms the timer `delay` from now.
    pub fn schedule_after(&mut self, delay: Duration) {
        self.schedule_at(Instant::now() + delay);
    }

    /// Drops the pending wake-up, if any.
    pub fn cancel(&mut self) {
        self.sleep = None;
    }

    /// Whether a wake-up is pending.
    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.sleep.is_some()
    }

    /// Deadline of the pending wake-up.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.sleep.as_ref().map(|s| s.deadline())
    }

    /// Completes when the pending deadline passes, disarming the timer and
    /// returning the deadline that fired. Never completes while unarmed.
    ///
    /// Cancel-safe: dropping the future keeps the deadline armed.
    pub async fn fired(&mut self) -> Instant {
        let Some(sleep) = self.sleep.as_mut() else {
            return std::future::pending().await;
        };
        sleep.as_mut().await;
        let deadline = sleep.deadline();
        self.sleep = None;
        deadline
    }
}
