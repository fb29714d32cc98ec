//! Reset-on-trigger timer used to coalesce bursts of DOM mutations

use std::time::Duration;
use tokio::time::Instant;

/// Coalesces triggers into a single firing once no trigger arrived for `quiet`
///
/// The debouncer only tracks the deadline; its owner awaits [`Debouncer::wait`]
/// on the current deadline and calls [`Debouncer::fire`] when it elapses.
#[derive(Debug, Clone)]
pub struct Debouncer {
    quiet: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self { quiet, deadline: None }
    }

    /// Quiet period after the last trigger
    pub fn quiet_period(&self) -> Duration {
        self.quiet
    }

    /// Push the deadline out to now + quiet period
    pub fn trigger(&mut self) {
        self.deadline = Some(Instant::now() + self.quiet);
    }

    /// Whether a firing is scheduled
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Current deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Consume the scheduled firing. Returns false if nothing was pending.
    pub fn fire(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    /// Sleep until `deadline`; never completes when there is none
    pub async fn wait(deadline: Option<Instant>) {
        match deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_trigger_resets_deadline() {
        let mut debouncer = Debouncer::new(Duration::from_millis(150));
        assert!(!debouncer.is_pending());

        debouncer.trigger();
        let first = debouncer.deadline().unwrap();

        tokio::time::advance(Duration::from_millis(100)).await;
        debouncer.trigger();
        let second = debouncer.deadline().unwrap();

        assert_eq!(second - first, Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_after_quiet_period() {
        let mut debouncer = Debouncer::new(Duration::from_millis(150));
        let start = Instant::now();

        for _ in 0..5 {
            debouncer.trigger();
            tokio::time::advance(Duration::from_millis(10)).await;
        }

        Debouncer::wait(debouncer.deadline()).await;
        assert!(debouncer.fire());
        assert!(!debouncer.fire());
        assert_eq!(start.elapsed(), Duration::from_millis(190));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_without_deadline_never_completes() {
        let result = tokio::time::timeout(Duration::from_secs(60), Debouncer::wait(None)).await;
        assert!(result.is_err());
    }
}
