//! Reconnection bookkeeping.
//!
//! [`ConnectionState`] is the pure part: it decides whether a failed
//! connection is retried and after how long. [`RetryTimer`] is the single
//! outstanding wake-up for that retry, owned by the synchronizer task and
//! dropped on teardown.

use std::future::pending;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{Sleep, sleep};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Exponential backoff with a fixed attempt ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl Backoff {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Delay before retry number `prior_failures + 1`: `base * 2^prior_failures`.
    pub fn delay_for(&self, prior_failures: u32) -> Duration {
        let factor = 1u32.checked_shl(prior_failures).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The investigation already reached a terminal event.
    Terminal,
    /// Every retry was spent.
    Exhausted,
    /// The failure cannot go away by retrying.
    Permanent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { attempt: u32, delay: Duration },
    Stop(StopReason),
}

/// Connection flags plus the retry counter for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionState {
    backoff: Backoff,
    connected: bool,
    reconnecting: bool,
    attempt: u32,
    disarmed: bool,
    gave_up: bool,
}

impl ConnectionState {
    pub fn new(backoff: Backoff) -> Self {
        Self {
            backoff,
            connected: false,
            reconnecting: false,
            attempt: 0,
            disarmed: false,
            gave_up: false,
        }
    }

    pub fn connected(&self) -> bool {
        self.connected
    }

    pub fn reconnecting(&self) -> bool {
        self.reconnecting
    }

    /// A failure ended the connection for good. Teardown does not count.
    pub fn gave_up(&self) -> bool {
        self.gave_up
    }

    /// Retries scheduled since the last successful open.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// The connection opened: clear the counter.
    pub fn on_open(&mut self) {
        self.connected = true;
        self.reconnecting = false;
        self.attempt = 0;
    }

    /// The connection failed or dropped.
    pub fn on_error(&mut self, terminal: bool) -> RetryDecision {
        self.connected = false;

        if terminal {
            self.reconnecting = false;
            return RetryDecision::Stop(StopReason::Terminal);
        }
        if self.disarmed || self.attempt >= self.backoff.max_attempts {
            self.reconnecting = false;
            self.gave_up |= !self.disarmed;
            return RetryDecision::Stop(StopReason::Exhausted);
        }

        let delay = self.backoff.delay_for(self.attempt);
        self.attempt += 1;
        self.reconnecting = true;
        RetryDecision::Retry {
            attempt: self.attempt,
            delay,
        }
    }

    /// The connection failed in a way retrying cannot fix.
    pub fn on_permanent_error(&mut self) -> RetryDecision {
        self.connected = false;
        self.reconnecting = false;
        self.gave_up = true;
        RetryDecision::Stop(StopReason::Permanent)
    }

    /// Whether a retry armed for `attempt` may still run.
    pub fn should_fire(&self, attempt: u32) -> bool {
        !self.disarmed && self.reconnecting && self.attempt == attempt
    }

    /// Teardown: force the counter to the ceiling so nothing reconnects.
    pub fn disarm(&mut self) {
        self.connected = false;
        self.reconnecting = false;
        self.attempt = self.backoff.max_attempts;
        self.disarmed = true;
    }

    /// Back to a fresh target.
    pub fn reset(&mut self) {
        *self = Self::new(self.backoff);
    }
}

/// At most one pending retry.
#[derive(Debug, Default)]
pub struct RetryTimer {
    sleep: Option<Pin<Box<Sleep>>>,
    attempt: u32,
}

impl RetryTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a retry, replacing any pending one.
    pub fn arm(&mut self, delay: Duration, attempt: u32) {
        self.sleep = Some(Box::pin(sleep(delay)));
        self.attempt = attempt;
    }

    pub fn disarm(&mut self) {
        self.sleep = None;
    }

    /// Resolves with the armed attempt number once the delay elapses; never
    /// resolves while disarmed. Cancel safe.
    pub async fn fired(&mut self) -> u32 {
        match self.sleep.as_mut() {
            Some(sleep) => {
                sleep.as_mut().await;
                self.sleep = None;
                self.attempt
            }
            None => pending().await,
        }
    }
}
