use std::time::{Duration, SystemTime};

// Past this many consecutive failures the backoff window stops growing.
const FAILURE_CEILING: u32 = 6;

/// The transport circuit breaker.
///
/// One instance lives on the worker thread per transport and is mutated
/// only after each send attempt. While the endpoint is erroring the
/// backoff window grows quadratically, `min(failures, 6)²` seconds, and
/// [`ClientState::should_try`] gates whether a send is attempted at all.
/// A single success fully heals the circuit.
#[derive(Debug, Default)]
pub struct ClientState {
    consecutive_failures: u32,
    last_attempt: Option<SystemTime>,
    retry_after: Option<SystemTime>,
}

impl ClientState {
    /// Creates a new online state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the last attempt succeeded (or none was made yet).
    pub fn is_online(&self) -> bool {
        self.consecutive_failures == 0
    }

    /// The current backoff window.
    pub fn backoff_interval(&self) -> Duration {
        let n = u64::from(self.consecutive_failures.min(FAILURE_CEILING));
        Duration::from_secs(n * n)
    }

    /// Whether a send should be attempted right now.
    ///
    /// Returns `false` while an explicit retry-after deadline or the
    /// computed backoff window is still running.
    pub fn should_try(&self) -> bool {
        if self.consecutive_failures == 0 {
            return true;
        }
        if let Some(deadline) = self.retry_after {
            return SystemTime::now() >= deadline;
        }
        match self.last_attempt {
            Some(at) => SystemTime::now() >= at + self.backoff_interval(),
            None => true,
        }
    }

    /// Records a failed send attempt.
    ///
    /// An explicit server-supplied retry-after takes precedence over the
    /// computed backoff window until it expires.
    pub fn record_failure(&mut self, retry_after: Option<Duration>) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_attempt = Some(SystemTime::now());
        self.retry_after = retry_after.map(|duration| SystemTime::now() + duration);
    }

    /// Records a successful send attempt, resetting the circuit.
    pub fn record_success(&mut self) {
        *self = Self::default();
    }
}
