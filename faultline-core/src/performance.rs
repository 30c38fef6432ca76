//! Performance monitoring: transactions, spans, and consistent trace
//! sampling.
//!
//! A [`Transaction`] is the root span of a trace. The keep/drop decision
//! for a trace is made exactly once, when the transaction starts, and is
//! derived deterministically from the trace id so that every hop of a
//! distributed trace reaches the same decision without re-communicating
//! it.

use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::protocol;
use crate::{Client, Hub};

const MAX_SPANS: usize = 1_000;

/// The name of the header used to propagate trace context between hops.
pub const TRACE_HEADER_NAME: &str = "faultline-trace";

// global API:

/// Start a new Performance Monitoring Transaction.
///
/// The transaction needs to be explicitly finished via
/// [`Transaction::finish`], otherwise it will be discarded.
/// The transaction itself also represents the root span in the span
/// hierarchy. Child spans can be started with the
/// [`Transaction::start_child`] method.
pub fn start_transaction(ctx: TransactionContext) -> Transaction {
    let client = Hub::with_active(|hub| hub.client());
    Transaction::new(client, ctx)
}

// Hub API:

impl Hub {
    /// Start a new Performance Monitoring Transaction.
    ///
    /// See the global [`start_transaction`] for more documentation.
    pub fn start_transaction(&self, ctx: TransactionContext) -> Transaction {
        Transaction::new(self.client(), ctx)
    }
}

/// Derives the per-trace uniform random value from the trace id.
///
/// All spans sharing one trace id observe the same value in `[0, 1)`, on
/// every hop of a distributed trace, which is what makes the sampling
/// decision consistent across process boundaries.
pub fn sample_rand(trace_id: &protocol::TraceId) -> f64 {
    let bytes = trace_id.as_bytes();
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&bytes[8..]);
    let mut rng = StdRng::seed_from_u64(u64::from_be_bytes(seed));
    rng.random::<f64>()
}

/// The propagated trace state: trace id, active span id and an optional
/// explicit sampling decision.
///
/// Rendered into (and parsed from) the `faultline-trace` header as
/// `{trace_id}-{span_id}(-{0|1})?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PropagatedTrace {
    trace_id: protocol::TraceId,
    span_id: protocol::SpanId,
    sampled: Option<bool>,
}

impl PropagatedTrace {
    /// Creates a new propagated trace state.
    pub fn new(
        trace_id: protocol::TraceId,
        span_id: protocol::SpanId,
        sampled: Option<bool>,
    ) -> Self {
        PropagatedTrace {
            trace_id,
            span_id,
            sampled,
        }
    }

    /// The trace id.
    pub fn trace_id(&self) -> protocol::TraceId {
        self.trace_id
    }

    /// The active span id.
    pub fn span_id(&self) -> protocol::SpanId {
        self.span_id
    }

    /// The explicit sampling decision, if one was communicated.
    pub fn sampled(&self) -> Option<bool> {
        self.sampled
    }
}

impl fmt::Display for PropagatedTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.trace_id, self.span_id)?;
        if let Some(sampled) = self.sampled {
            write!(f, "-{}", if sampled { '1' } else { '0' })?;
        }
        Ok(())
    }
}

pub(crate) fn parse_propagated_trace(header: &str) -> Option<PropagatedTrace> {
    let header = header.trim();
    let mut parts = header.splitn(3, '-');

    let trace_id = parts.next()?.parse().ok()?;
    let span_id = parts.next()?.parse().ok()?;
    let sampled = parts.next().and_then(|sampled| match sampled {
        "1" => Some(true),
        "0" => Some(false),
        _ => None,
    });

    Some(PropagatedTrace {
        trace_id,
        span_id,
        sampled,
    })
}

// "Context" Types:

/// The Transaction Context used to start a new Performance Monitoring
/// Transaction.
///
/// The Transaction Context defines the metadata for a transaction, and
/// is also the connection point for distributed tracing.
#[derive(Debug)]
pub struct TransactionContext {
    name: String,
    op: String,
    trace_id: protocol::TraceId,
    parent_span_id: Option<protocol::SpanId>,
    sampled: Option<bool>,
}

impl TransactionContext {
    /// Creates a new Transaction Context with the given `name` and `op`.
    ///
    /// See also the [`TransactionContext::continue_from_headers`]
    /// function that can be used for distributed tracing.
    #[must_use = "this must be used with `start_transaction`"]
    pub fn new(name: &str, op: &str) -> Self {
        Self::continue_from_headers(name, op, vec![])
    }

    /// Creates a new Transaction Context based on the distributed
    /// tracing `headers`.
    ///
    /// The `headers` in particular need to include the
    /// `faultline-trace` header to associate the transaction with a
    /// distributed trace.
    #[must_use = "this must be used with `start_transaction`"]
    pub fn continue_from_headers<'a, I: IntoIterator<Item = (&'a str, &'a str)>>(
        name: &str,
        op: &str,
        headers: I,
    ) -> Self {
        let mut trace = None;
        for (k, v) in headers.into_iter() {
            if k.eq_ignore_ascii_case(TRACE_HEADER_NAME) {
                trace = parse_propagated_trace(v);
            }
        }

        let (trace_id, parent_span_id, sampled) = match trace {
            Some(trace) => (trace.trace_id, Some(trace.span_id), trace.sampled),
            None => (protocol::TraceId::default(), None, None),
        };

        Self {
            name: name.into(),
            op: op.into(),
            trace_id,
            parent_span_id,
            sampled,
        }
    }

    /// Creates a new Transaction Context based on an existing Span.
    ///
    /// This should be used when an independent computation is spawned on
    /// another thread and should be connected to the calling thread via
    /// a distributed tracing transaction.
    pub fn continue_from_span(name: &str, op: &str, span: Option<TransactionOrSpan>) -> Self {
        let span = match span {
            Some(span) => span,
            None => return Self::new(name, op),
        };

        let (trace_id, parent_span_id, sampled) = match span {
            TransactionOrSpan::Transaction(transaction) => {
                let inner = transaction
                    .inner
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                (
                    inner.context.trace_id,
                    inner.context.span_id,
                    Some(inner.sampled),
                )
            }
            TransactionOrSpan::Span(span) => {
                let sampled = span.sampled;
                let span = span.span.lock().unwrap_or_else(PoisonError::into_inner);
                (span.trace_id, span.span_id, Some(sampled))
            }
        };

        Self {
            name: name.into(),
            op: op.into(),
            trace_id,
            parent_span_id: Some(parent_span_id),
            sampled,
        }
    }

    /// Set the explicit sampling decision for this Transaction.
    ///
    /// This can be either an explicit boolean flag, or [`None`], which
    /// falls back to the configured rate or sampler callback.
    pub fn set_sampled(&mut self, sampled: impl Into<Option<bool>>) {
        self.sampled = sampled.into();
    }

    /// The name of the transaction.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The operation of the transaction.
    pub fn operation(&self) -> &str {
        &self.op
    }

    /// The trace id of the transaction.
    pub fn trace_id(&self) -> protocol::TraceId {
        self.trace_id
    }
}

/// Decides whether a transaction with the given context is recorded.
///
/// An explicit inbound decision is inherited only when neither a rate
/// nor a sampler callback is configured locally; otherwise the decision
/// is the deterministic `sample_rand` draw measured against the rate,
/// which yields the identical verdict at every hop sharing the trace id.
fn decide_sampled(client: Option<&Arc<Client>>, ctx: &TransactionContext) -> bool {
    let Some(client) = client else {
        return ctx.sampled.unwrap_or(false);
    };

    let options = client.options();
    let rate = options
        .traces_sample_rate
        .or_else(|| options.traces_sampler.as_ref().map(|sampler| sampler(ctx)));

    match (ctx.sampled, rate) {
        (Some(parent_decision), None) => parent_decision,
        (_, Some(rate)) => {
            if rate >= 1.0 {
                true
            } else if rate <= 0.0 {
                false
            } else {
                (sample_rand(&ctx.trace_id) as f32) < rate
            }
        }
        (None, None) => false,
    }
}

// global API types:

/// A wrapper that groups a [`Transaction`] and a [`Span`] together.
#[derive(Clone, Debug)]
pub enum TransactionOrSpan {
    /// A [`Transaction`].
    Transaction(Transaction),
    /// A [`Span`].
    Span(Span),
}

impl From<Transaction> for TransactionOrSpan {
    fn from(transaction: Transaction) -> Self {
        Self::Transaction(transaction)
    }
}

impl From<Span> for TransactionOrSpan {
    fn from(span: Span) -> Self {
        Self::Span(span)
    }
}

impl TransactionOrSpan {
    /// Set some extra information to be sent with this Transaction/Span.
    pub fn set_data(&self, key: &str, value: protocol::Value) {
        match self {
            TransactionOrSpan::Transaction(transaction) => transaction.set_data(key, value),
            TransactionOrSpan::Span(span) => span.set_data(key, value),
        }
    }

    /// Get the status of the Transaction/Span.
    pub fn get_status(&self) -> Option<protocol::SpanStatus> {
        match self {
            TransactionOrSpan::Transaction(transaction) => transaction.get_status(),
            TransactionOrSpan::Span(span) => span.get_status(),
        }
    }

    /// Set the status of the Transaction/Span.
    pub fn set_status(&self, status: protocol::SpanStatus) {
        match self {
            TransactionOrSpan::Transaction(transaction) => transaction.set_status(status),
            TransactionOrSpan::Span(span) => span.set_status(status),
        }
    }

    /// Starts a new child Span with the given `op` and `description`.
    #[must_use = "a span must be explicitly closed via `finish()`"]
    pub fn start_child(&self, op: &str, description: &str) -> Span {
        match self {
            TransactionOrSpan::Transaction(transaction) => {
                transaction.start_child(op, description)
            }
            TransactionOrSpan::Span(span) => span.start_child(op, description),
        }
    }

    /// Returns the headers needed for distributed tracing.
    pub fn iter_headers(&self) -> TraceHeadersIter {
        match self {
            TransactionOrSpan::Transaction(transaction) => transaction.iter_headers(),
            TransactionOrSpan::Span(span) => span.iter_headers(),
        }
    }

    pub(crate) fn apply_to_event(&self, event: &mut protocol::Event<'_>) {
        if event.contexts.contains_key("trace") {
            return;
        }

        let context = match self {
            TransactionOrSpan::Transaction(transaction) => {
                let inner = transaction
                    .inner
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                inner.context.clone()
            }
            TransactionOrSpan::Span(span) => {
                let span = span.span.lock().unwrap_or_else(PoisonError::into_inner);
                protocol::TraceContext {
                    trace_id: span.trace_id,
                    span_id: span.span_id,
                    parent_span_id: span.parent_span_id,
                    op: span.op.clone(),
                    ..Default::default()
                }
            }
        };
        event.contexts.insert("trace".into(), context.into());
    }

    /// Finishes the Transaction/Span.
    ///
    /// This records the end timestamp and either sends the inner
    /// [`Transaction`] directly, or adds the [`Span`] to its transaction.
    pub fn finish(self) {
        match self {
            TransactionOrSpan::Transaction(transaction) => transaction.finish(),
            TransactionOrSpan::Span(span) => span.finish(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct TransactionInner {
    client: Option<Arc<Client>>,
    sampled: bool,
    context: protocol::TraceContext,
    pub(crate) transaction: Option<protocol::Transaction<'static>>,
}

type TransactionArc = Arc<Mutex<TransactionInner>>;

/// A running Performance Monitoring Transaction.
///
/// The transaction needs to be explicitly finished via
/// [`Transaction::finish`], otherwise neither the transaction nor any of
/// its child spans will be sent.
#[derive(Clone, Debug)]
pub struct Transaction {
    pub(crate) inner: TransactionArc,
}

impl Transaction {
    fn new(client: Option<Arc<Client>>, ctx: TransactionContext) -> Self {
        let context = protocol::TraceContext {
            trace_id: ctx.trace_id,
            parent_span_id: ctx.parent_span_id,
            op: Some(ctx.op.clone()),
            ..Default::default()
        };

        let sampled = decide_sampled(client.as_ref(), &ctx);

        // An unsampled transaction carries no payload and no client, so
        // there is nothing to send on `finish`.
        let (client, transaction) = if sampled && client.is_some() {
            (
                client,
                Some(protocol::Transaction {
                    name: Some(ctx.name),
                    ..Default::default()
                }),
            )
        } else {
            (None, None)
        };

        Self {
            inner: Arc::new(Mutex::new(TransactionInner {
                client,
                sampled,
                context,
                transaction,
            })),
        }
    }

    /// Whether this transaction is recorded.
    ///
    /// The flag is fixed at creation and never changes.
    pub fn is_sampled(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sampled
    }

    /// Set some extra information to be sent with this Transaction.
    pub fn set_data(&self, key: &str, value: protocol::Value) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(transaction) = inner.transaction.as_mut() {
            transaction.extra.insert(key.into(), value);
        }
    }

    /// Sets a tag to a specific value.
    pub fn set_tag<V: ToString>(&self, key: &str, value: V) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(transaction) = inner.transaction.as_mut() {
            transaction.tags.insert(key.into(), value.to_string());
        }
    }

    /// Get the status of the Transaction.
    pub fn get_status(&self) -> Option<protocol::SpanStatus> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.context.status
    }

    /// Set the status of the Transaction.
    pub fn set_status(&self, status: protocol::SpanStatus) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.context.status = Some(status);
    }

    /// Set the HTTP request information for this Transaction.
    pub fn set_request(&self, request: protocol::Request) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(transaction) = inner.transaction.as_mut() {
            transaction.request = Some(request);
        }
    }

    /// Returns the headers needed for distributed tracing.
    pub fn iter_headers(&self) -> TraceHeadersIter {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let trace = PropagatedTrace::new(
            inner.context.trace_id,
            inner.context.span_id,
            Some(inner.sampled),
        );
        TraceHeadersIter::new(trace.to_string())
    }

    /// Finishes the Transaction.
    ///
    /// This records the end timestamp, merges the scope data of the
    /// finishing context, and sends the transaction together with all
    /// finished child spans. Consuming `self` makes a second finish
    /// impossible; the end timestamp of the payload is only ever written
    /// once.
    pub fn finish(self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(mut transaction) = inner.transaction.take() {
            if let Some(client) = inner.client.take() {
                transaction.finish();
                transaction
                    .contexts
                    .insert("trace".into(), inner.context.clone().into());

                Hub::with_active(|hub| {
                    hub.with_current_scope(|scope| scope.apply_to_transaction(&mut transaction))
                });

                let options = client.options();
                transaction.release.clone_from(&options.release);
                transaction.environment.clone_from(&options.environment);
                transaction.sdk = Some(Cow::Owned(client.sdk_info.clone()));

                let mut envelope = protocol::Envelope::new();
                envelope.add_item(transaction);

                client.send_envelope(envelope)
            }
        }
    }

    /// Starts a new child Span with the given `op` and `description`.
    ///
    /// The span must be explicitly finished via [`Span::finish`].
    #[must_use = "a span must be explicitly closed via `finish()`"]
    pub fn start_child(&self, op: &str, description: &str) -> Span {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let span = protocol::Span {
            trace_id: inner.context.trace_id,
            parent_span_id: Some(inner.context.span_id),
            op: Some(op.into()),
            description: if description.is_empty() {
                None
            } else {
                Some(description.into())
            },
            ..Default::default()
        };
        Span {
            transaction: Arc::clone(&self.inner),
            sampled: inner.sampled,
            span: Arc::new(Mutex::new(span)),
        }
    }
}

type SpanArc = Arc<Mutex<protocol::Span>>;

/// A running Performance Monitoring Span.
///
/// The span needs to be explicitly finished via [`Span::finish`],
/// otherwise it will not be sent.
#[derive(Clone, Debug)]
pub struct Span {
    pub(crate) transaction: TransactionArc,
    sampled: bool,
    span: SpanArc,
}

impl Span {
    /// Whether this span is recorded.
    ///
    /// Inherited from the transaction root at creation; never changes.
    pub fn is_sampled(&self) -> bool {
        self.sampled
    }

    /// Set some extra information to be sent with this Span.
    pub fn set_data(&self, key: &str, value: protocol::Value) {
        let mut span = self.span.lock().unwrap_or_else(PoisonError::into_inner);
        span.data.insert(key.into(), value);
    }

    /// Sets a tag to a specific value.
    pub fn set_tag<V: ToString>(&self, key: &str, value: V) {
        let mut span = self.span.lock().unwrap_or_else(PoisonError::into_inner);
        span.tags.insert(key.into(), value.to_string());
    }

    /// Get the status of the Span.
    pub fn get_status(&self) -> Option<protocol::SpanStatus> {
        let span = self.span.lock().unwrap_or_else(PoisonError::into_inner);
        span.status
    }

    /// Set the status of the Span.
    pub fn set_status(&self, status: protocol::SpanStatus) {
        let mut span = self.span.lock().unwrap_or_else(PoisonError::into_inner);
        span.status = Some(status);
    }

    /// Returns the headers needed for distributed tracing.
    pub fn iter_headers(&self) -> TraceHeadersIter {
        let span = self.span.lock().unwrap_or_else(PoisonError::into_inner);
        let trace = PropagatedTrace::new(span.trace_id, span.span_id, Some(self.sampled));
        TraceHeadersIter::new(trace.to_string())
    }

    /// Finishes the Span.
    ///
    /// This records the end timestamp and adds the span to its
    /// transaction, up to the span cap. An unsampled span is discarded,
    /// and a span that was already finished through another handle is
    /// left untouched.
    pub fn finish(self) {
        let mut span = self.span.lock().unwrap_or_else(PoisonError::into_inner);
        if span.timestamp.is_some() {
            return;
        }
        span.finish();

        if !self.sampled {
            return;
        }

        let mut inner = self
            .transaction
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(transaction) = inner.transaction.as_mut() {
            if transaction.spans.len() < MAX_SPANS {
                transaction.spans.push(span.clone());
            }
        }
    }

    /// Starts a new child Span with the given `op` and `description`.
    #[must_use = "a span must be explicitly closed via `finish()`"]
    pub fn start_child(&self, op: &str, description: &str) -> Span {
        let span = self.span.lock().unwrap_or_else(PoisonError::into_inner);
        let child = protocol::Span {
            trace_id: span.trace_id,
            parent_span_id: Some(span.span_id),
            op: Some(op.into()),
            description: if description.is_empty() {
                None
            } else {
                Some(description.into())
            },
            ..Default::default()
        };
        Span {
            transaction: Arc::clone(&self.transaction),
            sampled: self.sampled,
            span: Arc::new(Mutex::new(child)),
        }
    }
}

/// A trace propagation header as a key/value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceHeader {
    /// The header name.
    pub key: &'static str,
    /// The header value.
    pub value: String,
}

/// An Iterator over the distributed tracing headers of a trace.
#[derive(Debug)]
pub struct TraceHeadersIter {
    value: Option<String>,
}

impl TraceHeadersIter {
    pub(crate) fn new(value: String) -> Self {
        Self { value: Some(value) }
    }
}

impl Iterator for TraceHeadersIter {
    type Item = TraceHeader;

    fn next(&mut self) -> Option<Self::Item> {
        self.value.take().map(|value| TraceHeader {
            key: TRACE_HEADER_NAME,
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_rand_is_deterministic() {
        let trace_id: protocol::TraceId = "4c79f60c11214eb38604f4ae0781bfb2".parse().unwrap();
        let first = sample_rand(&trace_id);
        for _ in 0..100 {
            assert_eq!(sample_rand(&trace_id), first);
        }
        assert!((0.0..1.0).contains(&first));
    }

    #[test]
    fn test_sample_rand_varies_with_trace_id() {
        let a: protocol::TraceId = "4c79f60c11214eb38604f4ae0781bfb2".parse().unwrap();
        let b: protocol::TraceId = "00000000000000000000000000000001".parse().unwrap();
        assert_ne!(sample_rand(&a), sample_rand(&b));
    }

    #[test]
    fn test_parse_propagated_trace() {
        let trace =
            parse_propagated_trace("09e04486820349518ac7b5d2adbf6ba5-9cf635fa5b870b3a-0").unwrap();
        assert_eq!(
            trace.trace_id().to_string(),
            "09e04486820349518ac7b5d2adbf6ba5"
        );
        assert_eq!(trace.span_id().to_string(), "9cf635fa5b870b3a");
        assert_eq!(trace.sampled(), Some(false));

        let trace =
            parse_propagated_trace("09e04486820349518ac7b5d2adbf6ba5-9cf635fa5b870b3a").unwrap();
        assert_eq!(trace.sampled(), None);

        assert!(parse_propagated_trace("garbage").is_none());
    }

    #[test]
    fn test_propagated_trace_roundtrip() {
        let text = "09e04486820349518ac7b5d2adbf6ba5-9cf635fa5b870b3a-1";
        let trace = parse_propagated_trace(text).unwrap();
        assert_eq!(trace.to_string(), text);
    }

    #[test]
    fn test_continue_from_headers_inherits_decision() {
        let headers = [(
            "faultline-trace",
            "09e04486820349518ac7b5d2adbf6ba5-9cf635fa5b870b3a-1",
        )];
        let ctx = TransactionContext::continue_from_headers("name", "op", headers);
        // Without a client there is no rate configured: the explicit
        // inbound decision is authoritative.
        let transaction = Transaction::new(None, ctx);
        assert!(transaction.is_sampled());

        let child = transaction.start_child("child.op", "");
        assert!(child.is_sampled());
    }

    #[test]
    fn test_unsampled_transaction_has_no_payload() {
        let mut ctx = TransactionContext::new("name", "op");
        ctx.set_sampled(false);
        let transaction = Transaction::new(None, ctx);
        assert!(!transaction.is_sampled());
        assert!(transaction
            .inner
            .lock()
            .unwrap()
            .transaction
            .is_none());
    }
}
