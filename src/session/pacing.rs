//! Request pacing for the portal.
//!
//! The portal has no published rate limit; it tolerates one request every
//! few seconds. Every request after the first waits a random delay drawn
//! from the pacing window, measured from the completion of the previous
//! request.

use std::time::{Duration, Instant};

use rand::Rng;

/// Bounds of the randomized inter-request delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingWindow {
    pub min: Duration,
    pub max: Duration,
}

impl PacingWindow {
    /// Create a window; bounds are swapped if given in the wrong order
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max { Self { min, max } } else { Self { min: max, max: min } }
    }

    /// Window from millisecond bounds
    pub fn from_millis(min_ms: u64, max_ms: u64) -> Self {
        Self::new(Duration::from_millis(min_ms), Duration::from_millis(max_ms))
    }

    /// Draw a delay uniformly from the window
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        rng.gen_range(self.min..=self.max)
    }

    /// Check if a delay lies in the window
    pub fn contains(&self, delay: Duration) -> bool {
        delay >= self.min && delay <= self.max
    }
}

impl Default for PacingWindow {
    /// 1–4 seconds
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(4))
    }
}

/// Pacing state owned by the session.
#[derive(Debug)]
pub struct Pacer {
    window: PacingWindow,
    enabled: bool,
    /// When the previous request completed (None = no request yet).
    last_completed: Option<Instant>,
}

impl Pacer {
    /// Create an enabled pacer
    pub fn new(window: PacingWindow) -> Self {
        Self {
            window,
            enabled: true,
            last_completed: None,
        }
    }

    /// Pacer that never waits (mock substitution mode)
    pub fn disabled() -> Self {
        Self {
            window: PacingWindow::default(),
            enabled: false,
            last_completed: None,
        }
    }

    pub fn window(&self) -> PacingWindow {
        self.window
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Remaining wait before the next request may start, for a given delay
    pub fn remaining(&self, delay: Duration) -> Option<Duration> {
        let done = self.last_completed?;
        let elapsed = done.elapsed();
        if elapsed < delay { Some(delay - elapsed) } else { None }
    }

    /// Wait before issuing the next request.
    ///
    /// Returns how long we actually slept.
    pub async fn wait(&mut self) -> Duration {
        if !self.enabled || self.last_completed.is_none() {
            return Duration::ZERO;
        }
        let delay = self.window.sample(&mut rand::thread_rng());
        match self.remaining(delay) {
            Some(remaining) => {
                log::debug!("Pacing: waiting {}ms before next request", remaining.as_millis());
                tokio::time::sleep(remaining).await;
                remaining
            }
            None => Duration::ZERO,
        }
    }

    /// Record that a request finished (successfully or not).
    pub fn record_completion(&mut self) {
        self.last_completed = Some(Instant::now());
    }
}
