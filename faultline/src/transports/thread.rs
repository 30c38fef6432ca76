use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use faultline_core::faultline_debug;

use super::ratelimit::{RateLimiter, RateLimitingCategory};
use super::state::ClientState;
use crate::protocol::DiscardReason;
use crate::{Envelope, LostEventLog};

pub(crate) enum Task {
    SendEnvelope(Envelope),
    Flush(Sender<()>),
    Shutdown,
}

type SpawnFn =
    Box<dyn Fn(Receiver<Task>, Arc<AtomicBool>, LostEventLog) -> Option<JoinHandle<()>> + Send + Sync>;

/// The background worker behind the provided HTTP transport.
///
/// A bounded queue decouples "the envelope is ready" from "the envelope
/// is on the wire": enqueueing never blocks, and enqueueing onto a full
/// queue drops the envelope with a queue-overflow lost-event record
/// instead of slowing the capturing thread. Exactly one worker thread
/// drains the queue; it is spawned lazily on first use and respawned if
/// it is found dead.
pub struct TransportThread {
    sender: Sender<Task>,
    receiver: Receiver<Task>,
    lost: LostEventLog,
    shutdown: Arc<AtomicBool>,
    spawn: SpawnFn,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TransportThread {
    /// Creates a new transport thread around the given send function.
    ///
    /// The send function runs on the worker thread only. It receives the
    /// rate limiter and circuit breaker it should update from the
    /// response of each attempt.
    pub fn new<SendFn>(queue_size: usize, lost: LostEventLog, send: SendFn) -> Self
    where
        SendFn: Fn(Envelope, &mut RateLimiter, &mut ClientState) + Clone + Send + Sync + 'static,
    {
        let (sender, receiver) = bounded(queue_size.max(1));
        let shutdown = Arc::new(AtomicBool::new(false));

        let spawn: SpawnFn = Box::new(move |receiver, shutdown, lost| {
            let send = send.clone();
            thread::Builder::new()
                .name("faultline-transport".into())
                .spawn(move || worker_loop(receiver, shutdown, lost, send))
                .ok()
        });

        Self {
            sender,
            receiver,
            lost,
            shutdown,
            spawn,
            handle: Mutex::new(None),
        }
    }

    /// Enqueues an envelope, without blocking.
    ///
    /// A full queue absorbs the overload by dropping the envelope.
    pub fn send(&self, envelope: Envelope) {
        if self.shutdown.load(Ordering::SeqCst) {
            return;
        }
        match self.sender.try_send(Task::SendEnvelope(envelope)) {
            Ok(()) => self.ensure_worker(),
            Err(TrySendError::Full(_)) => {
                self.lost.record(DiscardReason::QueueOverflow);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    /// Waits until all currently queued tasks were processed, up to the
    /// timeout.
    pub fn flush(&self, timeout: Duration) -> bool {
        self.ensure_worker();
        let (sender, receiver) = bounded(1);
        if self
            .sender
            .send_timeout(Task::Flush(sender), timeout)
            .is_err()
        {
            return false;
        }
        receiver.recv_timeout(timeout).is_ok()
    }

    /// Flushes with the given deadline, then stops the worker.
    ///
    /// Whatever did not drain within the deadline is abandoned.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        let drained = self.flush(timeout);
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = self.sender.try_send(Task::Shutdown);
        drained
    }

    // Liveness probe: spawn the worker if it was never started, or
    // respawn it if it died. A dead worker must not silently turn the
    // transport into a black hole.
    fn ensure_worker(&self) {
        let mut slot = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        let alive = slot.as_ref().is_some_and(|handle| !handle.is_finished());
        if alive || self.shutdown.load(Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = slot.take() {
            let _ = handle.join();
            faultline_debug!("[TransportThread] worker died unexpectedly, respawning");
        }
        *slot = (self.spawn)(
            self.receiver.clone(),
            self.shutdown.clone(),
            self.lost.clone(),
        );
    }
}

impl Drop for TransportThread {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = self.sender.try_send(Task::Shutdown);
        // the worker is not joined: a send that hangs in network I/O
        // must not be able to hang the dropping thread
    }
}

fn worker_loop(
    receiver: Receiver<Task>,
    shutdown: Arc<AtomicBool>,
    lost: LostEventLog,
    send: impl Fn(Envelope, &mut RateLimiter, &mut ClientState),
) {
    let mut rl = RateLimiter::new();
    let mut state = ClientState::new();

    for task in receiver.iter() {
        if shutdown.load(Ordering::SeqCst) {
            return;
        }
        let envelope = match task {
            Task::SendEnvelope(envelope) => envelope,
            Task::Flush(sender) => {
                sender.send(()).ok();
                continue;
            }
            Task::Shutdown => {
                return;
            }
        };

        if let Some(time_left) = rl.is_disabled(RateLimitingCategory::Any) {
            faultline_debug!(
                "[TransportThread] skipping send, rate limited for {}s",
                time_left.as_secs()
            );
            lost.record_many(DiscardReason::RateLimited, envelope.items().count());
            continue;
        }

        if !state.should_try() {
            lost.record_many(DiscardReason::NetworkBackoff, envelope.items().count());
            continue;
        }

        let Some(envelope) = rl.filter_envelope(envelope, &lost) else {
            continue;
        };

        // a panicking send attempt loses one envelope, never the worker
        if catch_unwind(AssertUnwindSafe(|| send(envelope, &mut rl, &mut state))).is_err() {
            faultline_debug!("[TransportThread] send attempt panicked");
        }
    }
}
