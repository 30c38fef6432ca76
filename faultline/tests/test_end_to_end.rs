#![cfg(feature = "test")]

use std::error::Error;
use std::fmt;
use std::sync::{Arc, Mutex};

use faultline::test::{with_captured_envelopes, with_captured_envelopes_options};
use faultline::types::Uuid;
use faultline::{ClientOptions, Hub, Level};

#[derive(Debug)]
struct ZeroDivisionError;

impl fmt::Display for ZeroDivisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "divided by 0")
    }
}

impl Error for ZeroDivisionError {}

#[test]
fn test_capture_error_end_to_end() {
    let captured_id = Arc::new(Mutex::new(Uuid::nil()));
    let captured_id_in = Arc::clone(&captured_id);

    let envelopes = with_captured_envelopes(move || {
        let id = faultline::capture_error(&ZeroDivisionError);
        assert!(!id.is_nil());
        *captured_id_in.lock().unwrap() = id;

        // drain the transport before the client goes away
        let client = Hub::current().client().unwrap();
        assert!(client.flush(None));
    });

    assert_eq!(envelopes.len(), 1);
    let envelope = &envelopes[0];
    let event = envelope.event().unwrap();

    assert_eq!(Some(&event.event_id), envelope.uuid());
    assert_eq!(event.event_id, *captured_id.lock().unwrap());
    assert_eq!(event.exception.len(), 1);
    assert_eq!(event.exception[0].ty, "ZeroDivisionError");
    assert_eq!(event.exception[0].value.as_deref(), Some("divided by 0"));
    assert_eq!(event.level, Level::Error);
}

#[test]
fn test_event_carries_sdk_and_defaults() {
    let options = ClientOptions {
        release: Some("app@1.2.3".into()),
        environment: Some("production".into()),
        ..Default::default()
    };
    let envelopes = with_captured_envelopes_options(
        || {
            faultline::capture_message("hello", Level::Info);
        },
        options,
    );
    let event = envelopes[0].event().unwrap();
    assert_eq!(event.release.as_deref(), Some("app@1.2.3"));
    assert_eq!(event.environment.as_deref(), Some("production"));
    let sdk = event.sdk.as_deref().unwrap();
    assert_eq!(sdk.name, "faultline.rust");
}

#[test]
fn test_pipeline_sanitizes_and_truncates() {
    let options = ClientOptions {
        max_value_bytes: 100,
        ..Default::default()
    };
    let envelopes = with_captured_envelopes_options(
        || {
            faultline::configure_scope(|scope| {
                scope.set_extra("password", "hunter2".into());
                scope.set_extra("card", "4242 4242 4242 4242".into());
                scope.set_extra("blob", "x".repeat(1000).into());
            });
            faultline::capture_message(&"m".repeat(1000), Level::Info);
        },
        options,
    );
    let event = envelopes[0].event().unwrap();
    assert_eq!(event.extra["password"], serde_json::json!("********"));
    assert_eq!(event.extra["card"], serde_json::json!("********"));
    assert_eq!(event.extra["blob"].as_str().unwrap().len(), 100);
    assert_eq!(event.message.as_deref().unwrap().len(), 100);
}

#[test]
fn test_serialized_envelope_contains_the_event() {
    let envelopes = with_captured_envelopes(|| {
        faultline::capture_error(&ZeroDivisionError);
    });
    let mut body = Vec::new();
    envelopes[0].to_writer(&mut body).unwrap();
    let body = String::from_utf8(body).unwrap();

    let mut lines = body.lines();
    let header: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
    assert!(header["event_id"].is_string());
    let item_header: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
    assert_eq!(item_header["type"], "event");
    let payload: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
    assert_eq!(payload["exception"]["values"][0]["type"], "ZeroDivisionError");
    assert_eq!(payload["exception"]["values"][0]["value"], "divided by 0");
}

#[test]
fn test_attach_stacktrace_integration() {
    let options = ClientOptions {
        attach_stacktrace: true,
        ..Default::default()
    }
    .add_integration(faultline::integrations::backtrace::AttachStacktraceIntegration)
    .add_integration(faultline::integrations::backtrace::ProcessStacktraceIntegration);

    let envelopes = with_captured_envelopes_options(
        || {
            faultline::capture_error(&ZeroDivisionError);
        },
        options,
    );
    let event = envelopes[0].event().unwrap();
    // the stacktrace is attached to the outermost exception, once
    let stacktrace = event.exception.last().unwrap().stacktrace.as_ref();
    assert!(stacktrace.is_some_and(|stacktrace| !stacktrace.frames.is_empty()));
}
