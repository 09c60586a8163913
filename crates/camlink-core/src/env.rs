//! Environment abstraction.
//!
//! State machines never read the clock themselves. Drivers obtain the time
//! from an [`Environment`] and pass it in, which lets the simulation harness
//! substitute a virtual clock.

use std::{
    future::Future,
    time::{Duration, Instant},
};

/// Source of time for drivers.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Suspend for `duration`.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}
