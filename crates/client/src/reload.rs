//! Debounced reload gate.
//!
//! Any number of reload requests within the quiet window collapse into one
//! reload fired when the window has passed without a new request.

use std::time::Duration;

use tokio::time::Instant;

/// Trailing-edge debouncer for full-list reloads.
#[derive(Debug)]
pub struct ReloadGate {
    quiet: Duration,
    deadline: Option<Instant>,
}

impl ReloadGate {
    /// Create a disarmed gate with the given quiet window.
    #[must_use]
    pub const fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            deadline: None,
        }
    }

    /// Request a reload. Re-arms the deadline to `now + quiet`.
    pub fn signal(&mut self) {
        self.deadline = Some(Instant::now() + self.quiet);
    }

    /// Request a reload no sooner than `delay` from now.
    ///
    /// Delays shorter than the quiet window are raised to it. A later
    /// [`ReloadGate::signal`] re-arms to the usual quiet window.
    pub fn signal_after(&mut self, delay: Duration) {
        self.deadline = Some(Instant::now() + delay.max(self.quiet));
    }

    /// Returns true if a reload is pending.
    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Wait for the pending reload to fire, then disarm.
    ///
    /// Never resolves while disarmed. Cancellation-safe: dropping the future
    /// before it resolves leaves the gate armed.
    pub async fn fired(&mut self) {
        wait_until(self.deadline).await;
        self.deadline = None;
    }
}

/// Sleep until `deadline`, or forever if there is none.
async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUIET: Duration = Duration::from_millis(500);

    #[tokio::test(start_paused = true)]
    async fn test_signals_within_window_fire_once() {
        let mut gate = ReloadGate::new(QUIET);
        let start = Instant::now();

        for _ in 0..5 {
            gate.signal();
            tokio::time::advance(Duration::from_millis(100)).await;
        }
        gate.fired().await;

        // Last signal at +400ms, so the reload fires at +900ms.
        assert_eq!(start.elapsed(), Duration::from_millis(900));
        assert!(!gate.is_armed());

        let second = tokio::time::timeout(Duration::from_secs(10), gate.fired()).await;
        assert!(second.is_err(), "disarmed gate must not fire again");
    }

    #[tokio::test(start_paused = true)]
    async fn test_signal_after_waits_at_least_quiet_window() {
        let mut gate = ReloadGate::new(QUIET);
        let start = Instant::now();
        gate.signal_after(Duration::from_secs(5));
        gate.fired().await;
        assert_eq!(start.elapsed(), Duration::from_secs(5));

        let start = Instant::now();
        gate.signal_after(Duration::from_millis(10));
        gate.fired().await;
        assert_eq!(start.elapsed(), QUIET);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_gate_never_fires() {
        let mut gate = ReloadGate::new(QUIET);
        assert!(
            tokio::time::timeout(Duration::from_secs(5), gate.fired())
                .await
                .is_err()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_wait_keeps_gate_armed() {
        let mut gate = ReloadGate::new(QUIET);
        gate.signal();

        let early = tokio::time::timeout(Duration::from_millis(100), gate.fired()).await;
        assert!(early.is_err());
        assert!(gate.is_armed());

        gate.fired().await;
        assert!(!gate.is_armed());
    }
}
