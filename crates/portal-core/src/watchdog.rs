//! Single-shot deadline guarding agent readiness.
//!
//! The watchdog does not spawn anything: it records a deadline and the event
//! loop sleeps on it. Disarming is just clearing the deadline, so there is no
//! window in which a disarmed watchdog can still fire.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct Watchdog {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Watchdog {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arm (or re-arm) the timer starting now.
    pub fn arm(&mut self) {
        self.deadline = Some(Instant::now() + self.delay);
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|d| now >= d)
    }
}

/// Sleep until `deadline`, or forever if there is none.
///
/// Meant for a `tokio::select!` branch; the deadline is copied out of the
/// watchdog so the branch does not borrow it.
pub async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_expires_after_delay() {
        let mut dog = Watchdog::new(Duration::from_secs(20));
        dog.arm();

        tokio::time::advance(Duration::from_secs(19)).await;
        assert!(!dog.is_expired(Instant::now()));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(dog.is_expired(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarmed_never_expires() {
        let mut dog = Watchdog::new(Duration::from_secs(1));
        dog.arm();
        dog.disarm();

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(!dog.is_expired(Instant::now()));
        assert!(dog.deadline().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_until_completes_at_deadline() {
        let mut dog = Watchdog::new(Duration::from_secs(20));
        dog.arm();
        let start = Instant::now();

        sleep_until(dog.deadline()).await;
        assert!(Instant::now() - start >= Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_until_none_is_pending() {
        let res = tokio::time::timeout(Duration::from_secs(3600), sleep_until(None)).await;
        assert!(res.is_err());
    }
}
