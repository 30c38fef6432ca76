#![cfg(feature = "test")]

use std::sync::Arc;

use faultline::performance::{sample_rand, TransactionContext};
use faultline::protocol::TraceId;
use faultline::test::with_captured_envelopes_options;
use faultline::ClientOptions;

const TRACE_ID: &str = "4c79f60c11214eb38604f4ae0781bfb2";

fn trace_header() -> String {
    format!("{TRACE_ID}-9cf635fa5b870b3a")
}

#[test]
fn test_sampling_is_consistent_across_a_trace() {
    let trace_id: TraceId = TRACE_ID.parse().unwrap();
    let expected = sample_rand(&trace_id) < 0.5;

    let options = ClientOptions {
        traces_sample_rate: Some(0.5),
        ..Default::default()
    };

    let envelopes = with_captured_envelopes_options(
        || {
            let header = trace_header();
            let headers = [("faultline-trace", header.as_str())];

            let ctx = TransactionContext::continue_from_headers("first", "http.server", headers);
            let transaction = faultline::start_transaction(ctx);
            assert_eq!(transaction.is_sampled(), expected);

            // every span of the trace reaches the identical decision
            for _ in 0..100 {
                let child = transaction.start_child("db.query", "select 1");
                assert_eq!(child.is_sampled(), expected);
                child.finish();
            }

            // a second hop over the same trace id decides identically
            let ctx = TransactionContext::continue_from_headers(
                "second",
                "http.client",
                [("faultline-trace", trace_header().as_str())],
            );
            let second = faultline::start_transaction(ctx);
            assert_eq!(second.is_sampled(), expected);

            transaction.finish();
        },
        options,
    );

    if expected {
        assert_eq!(envelopes.len(), 1);
        let transaction = envelopes[0].transaction().unwrap();
        assert_eq!(transaction.name.as_deref(), Some("first"));
        assert_eq!(transaction.spans.len(), 100);
        assert!(transaction.timestamp.is_some());
    } else {
        assert!(envelopes.is_empty());
    }
}

#[test]
fn test_explicit_parent_decision_is_inherited_without_local_rate() {
    // no rate and no sampler configured: the inbound decision wins
    let envelopes = with_captured_envelopes_options(
        || {
            let kept = format!("{}-1", trace_header());
            let ctx = TransactionContext::continue_from_headers(
                "kept",
                "task",
                [("faultline-trace", kept.as_str())],
            );
            let transaction = faultline::start_transaction(ctx);
            assert!(transaction.is_sampled());
            transaction.finish();

            let dropped = format!("{}-0", trace_header());
            let ctx = TransactionContext::continue_from_headers(
                "dropped",
                "task",
                [("faultline-trace", dropped.as_str())],
            );
            let transaction = faultline::start_transaction(ctx);
            assert!(!transaction.is_sampled());
            transaction.finish();
        },
        ClientOptions::default(),
    );

    assert_eq!(envelopes.len(), 1);
    assert_eq!(
        envelopes[0].transaction().unwrap().name.as_deref(),
        Some("kept")
    );
}

#[test]
fn test_traces_sampler_callback_decides() {
    let options = ClientOptions {
        traces_sampler: Some(Arc::new(|ctx: &TransactionContext| {
            if ctx.operation() == "noisy" {
                0.0
            } else {
                1.0
            }
        })),
        ..Default::default()
    };

    let envelopes = with_captured_envelopes_options(
        || {
            let noisy = faultline::start_transaction(TransactionContext::new("a", "noisy"));
            assert!(!noisy.is_sampled());
            noisy.finish();

            let quiet = faultline::start_transaction(TransactionContext::new("b", "quiet"));
            assert!(quiet.is_sampled());
            quiet.finish();
        },
        options,
    );

    assert_eq!(envelopes.len(), 1);
}

#[test]
fn test_finished_transaction_carries_trace_context() {
    let options = ClientOptions {
        traces_sample_rate: Some(1.0),
        ..Default::default()
    };
    let envelopes = with_captured_envelopes_options(
        || {
            let transaction =
                faultline::start_transaction(TransactionContext::new("tx", "http.server"));
            transaction.finish();
        },
        options,
    );
    assert_eq!(envelopes.len(), 1);
    let transaction = envelopes[0].transaction().unwrap();
    assert!(transaction.contexts.contains_key("trace"));
}

#[test]
fn test_span_finish_is_recorded_once() {
    let options = ClientOptions {
        traces_sample_rate: Some(1.0),
        ..Default::default()
    };
    let envelopes = with_captured_envelopes_options(
        || {
            let transaction =
                faultline::start_transaction(TransactionContext::new("tx", "http.server"));
            let span = transaction.start_child("db.query", "select 1");
            let twin = span.clone();
            span.finish();
            // finishing through a second handle is a no-op
            twin.finish();
            transaction.finish();
        },
        options,
    );
    let transaction = envelopes[0].transaction().unwrap();
    assert_eq!(transaction.spans.len(), 1);
    assert!(transaction.spans[0].timestamp.is_some());
}
