//! Call pacing for undocumented upstream rate limits
//!
//! The personal-data APIs this connector talks to publish no rate limits;
//! a fixed minimum interval between consecutive calls has proven to keep
//! them happy. The pacer is injected into the orchestrator so tests can
//! substitute a no-op and run without real delays. One pacer instance is
//! shared across a whole run; it is the single global pacing resource.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Pacing component applied before each upstream call
#[async_trait]
pub trait Pacer: Send + Sync {
    /// Wait if necessary before the next upstream call
    async fn pace(&self);
}

/// Enforces a minimum interval between consecutive calls
///
/// The first call never waits; every subsequent call waits out the
/// remainder of the interval since the previous one.
pub struct IntervalPacer {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl IntervalPacer {
    pub fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }
}

#[async_trait]
impl Pacer for IntervalPacer {
    async fn pace(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// No-delay pacer for tests and offline replays
#[derive(Debug, Default)]
pub struct NoopPacer;

#[async_trait]
impl Pacer for NoopPacer {
    async fn pace(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_pacer_creation() {
        let pacer = IntervalPacer::new(1000);
        assert_eq!(pacer.min_interval, Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_interval_pacer_timing() {
        let pacer = IntervalPacer::new(100); // short interval for a fast test

        let start = Instant::now();

        // First call - no wait
        pacer.pace().await;
        let first_elapsed = start.elapsed();

        // Second call - should wait ~100ms
        pacer.pace().await;
        let second_elapsed = start.elapsed();

        // Third call - should wait another ~100ms
        pacer.pace().await;
        let third_elapsed = start.elapsed();

        assert!(first_elapsed < Duration::from_millis(50));
        assert!(second_elapsed >= Duration::from_millis(90));
        assert!(third_elapsed >= Duration::from_millis(190));
    }

    #[tokio::test]
    async fn test_noop_pacer_never_waits() {
        let pacer = NoopPacer;

        let start = Instant::now();
        for _ in 0..50 {
            pacer.pace().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
