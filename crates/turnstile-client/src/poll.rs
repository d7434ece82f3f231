//! Fixed-interval poll scheduler.
//!
//! Without a push channel, the only way a client learns that another
//! player moved is to refetch the session on a timer. The scheduler is
//! meant to sit in a `tokio::select!` loop next to the intent channel:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(intent) = intents.recv() => { /* roll / end turn */ }
//!         _ = poller.wait_for_poll() => { client.poll_once().await; }
//!     }
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

/// Poll timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Time between refetches.
    pub interval: Duration,
    /// Random delay (0..max) added to the first poll so clients that
    /// joined together don't hit the server in lockstep.
    pub initial_jitter: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            initial_jitter: Duration::from_millis(500),
        }
    }
}

impl PollConfig {
    /// Shortest interval accepted.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(100);

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called by [`PollScheduler::new`]. `interval` is raised to
    /// [`Self::MIN_INTERVAL`]; `initial_jitter` is capped at `interval`.
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_ms = self.interval.as_millis() as u64,
                min_ms = Self::MIN_INTERVAL.as_millis() as u64,
                "poll interval below minimum, clamping"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        if self.initial_jitter > self.interval {
            self.initial_jitter = self.interval;
        }
        self
    }
}

/// Information about a fired poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTick {
    /// Starts at 1.
    pub poll: u64,
    /// Whole intervals missed because the loop was busy.
    pub skipped: u64,
}

pub struct PollScheduler {
    config: PollConfig,
    polls: u64,
    next: Instant,
    paused: bool,
}

impl PollScheduler {
    pub fn new(config: PollConfig) -> Self {
        let config = config.validated();
        let jitter = if config.initial_jitter.is_zero() {
            Duration::ZERO
        } else {
            let max = config.initial_jitter.as_micros() as u64;
            Duration::from_micros(rand::rng().random_range(0..max))
        };
        debug!(
            interval_ms = config.interval.as_millis() as u64,
            jitter_ms = jitter.as_millis() as u64,
            "poll scheduler created"
        );
        Self {
            config,
            polls: 0,
            next: Instant::now() + config.interval + jitter,
            paused: false,
        }
    }

    /// Waits for the next poll. Pends forever while paused.
    ///
    /// After a late wake-up the next poll is scheduled from now rather
    /// than from the missed deadline, so a stalled loop never fires a
    /// burst of catch-up polls.
    pub async fn wait_for_poll(&mut self) -> PollTick {
        if self.paused {
            std::future::pending::<()>().await;
        }

        time::sleep_until(self.next).await;

        let now = Instant::now();
        let late_by = now.saturating_duration_since(self.next);
        let skipped = (late_by.as_nanos() / self.config.interval.as_nanos()) as u64;
        if skipped > 0 {
            warn!(poll = self.polls + 1, skipped, "poll loop fell behind, skipping ahead");
        }

        self.polls += 1;
        self.next = now + self.config.interval;
        trace!(poll = self.polls, "poll fired");

        PollTick {
            poll: self.polls,
            skipped,
        }
    }

    /// Idempotent.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(poll = self.polls, "poll scheduler paused");
        }
    }

    /// Restarts the interval from now.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            self.next = Instant::now() + self.config.interval;
            debug!(poll = self.polls, "poll scheduler resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn poll_count(&self) -> u64 {
        self.polls
    }

    pub fn interval(&self) -> Duration {
        self.config.interval
    }
}
