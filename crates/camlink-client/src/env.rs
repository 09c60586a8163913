//! Production environment backed by tokio's clock.

use std::{
    future::Future,
    time::{Duration, Instant},
};

use camlink_core::env::Environment;

/// Tokio clock. Honors paused time in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl Environment for SystemEnv {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}
