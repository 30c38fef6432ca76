use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::protocol::{DiscardReason, Envelope};
use crate::ClientOptions;

/// The trait for transports.
///
/// A transport is responsible for shipping finished envelopes to the
/// ingestion endpoint. Because the SDK can be closed, all transports need
/// to be able to flush and shut down with a deadline.
pub trait Transport: Send + Sync + 'static {
    /// Sends an [`Envelope`].
    ///
    /// This is called on the capturing thread and must not block on I/O;
    /// provided transports enqueue onto a background worker here.
    fn send_envelope(&self, envelope: Envelope);

    /// Drains the transport queue up to the given deadline.
    ///
    /// Returns `true` if the queue was drained in time.
    fn flush(&self, timeout: Duration) -> bool {
        let _ = timeout;
        true
    }

    /// Instructs the transport to flush and shut down.
    fn shutdown(&self, timeout: Duration) -> bool {
        self.flush(timeout)
    }
}

/// A factory creating a transport for the given client options.
pub trait TransportFactory: Send + Sync {
    /// Given the options, creates the transport.
    fn create_transport(&self, options: &ClientOptions) -> Arc<dyn Transport>;
}

impl<F> TransportFactory for F
where
    F: Fn(&ClientOptions) -> Arc<dyn Transport> + Send + Sync,
{
    fn create_transport(&self, options: &ClientOptions) -> Arc<dyn Transport> {
        self(options)
    }
}

impl<T: Transport> TransportFactory for Arc<T> {
    fn create_transport(&self, options: &ClientOptions) -> Arc<dyn Transport> {
        let _ = options;
        self.clone()
    }
}

/// Counts events the pipeline dropped, keyed by [`DiscardReason`].
///
/// The log is shared (cheaply clonable) between the client and its
/// transport so both sides of the queue boundary account into the same
/// counters. Drops are never surfaced to the host application; this is
/// the diagnostic record of how much telemetry was lost and why.
#[derive(Debug, Default, Clone)]
pub struct LostEventLog {
    counts: Arc<Mutex<BTreeMap<DiscardReason, usize>>>,
}

impl LostEventLog {
    /// Creates a new empty log.
    pub fn new() -> Self {
        Default::default()
    }

    /// Records a single lost event.
    pub fn record(&self, reason: DiscardReason) {
        self.record_many(reason, 1);
    }

    /// Records multiple lost events for one reason.
    pub fn record_many(&self, reason: DiscardReason, count: usize) {
        if count == 0 {
            return;
        }
        faultline_debug!("lost {} event(s): {}", count, reason);
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        *counts.entry(reason).or_default() += count;
    }

    /// Returns the number of events lost for the given reason.
    pub fn count(&self, reason: DiscardReason) -> usize {
        let counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        counts.get(&reason).copied().unwrap_or(0)
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> BTreeMap<DiscardReason, usize> {
        self.counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lost_event_accounting() {
        let log = LostEventLog::new();
        log.record(DiscardReason::QueueOverflow);
        log.record_many(DiscardReason::QueueOverflow, 2);
        log.record(DiscardReason::SampleRate);
        assert_eq!(log.count(DiscardReason::QueueOverflow), 3);
        assert_eq!(log.count(DiscardReason::SampleRate), 1);
        assert_eq!(log.count(DiscardReason::RateLimited), 0);
        assert_eq!(log.snapshot().len(), 2);
    }
}
