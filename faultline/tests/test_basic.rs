#![cfg(feature = "test")]

use std::sync::{Arc, Mutex};

use faultline::protocol::{DiscardReason, Event};
use faultline::test::{with_captured_events, with_captured_events_options};
use faultline::types::Uuid;
use faultline::{ClientOptions, Hub, Level};

#[test]
fn test_basic_capture_message() {
    let mut last_event_id = None::<Uuid>;
    let events = with_captured_events(|| {
        faultline::configure_scope(|scope| {
            scope.set_tag("worker", "worker1");
        });
        faultline::capture_message("Hello World!", Level::Warning);
        last_event_id = faultline::last_event_id();
    });
    assert_eq!(events.len(), 1);
    let event = events.into_iter().next().unwrap();
    assert_eq!(event.message.unwrap(), "Hello World!");
    assert_eq!(event.level, Level::Warning);
    assert_eq!(
        event.tags.into_iter().collect::<Vec<(String, String)>>(),
        vec![("worker".to_string(), "worker1".to_string())]
    );

    assert_eq!(Some(event.event_id), last_event_id);
}

#[test]
fn test_breadcrumbs_are_capped_oldest_first() {
    let options = ClientOptions {
        max_breadcrumbs: 3,
        ..Default::default()
    };
    let events = with_captured_events_options(
        || {
            for i in 0..5 {
                faultline::add_breadcrumb(faultline::Breadcrumb {
                    message: Some(format!("crumb {i}")),
                    ..Default::default()
                });
            }
            faultline::capture_message("done", Level::Info);
        },
        options,
    );
    assert_eq!(events.len(), 1);
    let messages: Vec<_> = events[0]
        .breadcrumbs
        .iter()
        .map(|breadcrumb| breadcrumb.message.clone().unwrap())
        .collect();
    assert_eq!(messages, vec!["crumb 2", "crumb 3", "crumb 4"]);
}

#[test]
fn test_with_scope_does_not_leak() {
    let events = with_captured_events(|| {
        faultline::with_scope(
            |scope| scope.set_tag("inner", "true"),
            || faultline::capture_message("inside", Level::Info),
        );
        faultline::capture_message("outside", Level::Info);
    });
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].tags.get("inner").map(String::as_str), Some("true"));
    assert!(events[1].tags.is_empty());
}

#[test]
fn test_before_send_can_drop() {
    let options = ClientOptions {
        before_send: Some(Arc::new(|_| None)),
        ..Default::default()
    };
    let events = with_captured_events_options(
        || {
            faultline::capture_message("never sent", Level::Error);
            assert_eq!(faultline::last_event_id(), None);
        },
        options,
    );
    assert!(events.is_empty());
}

#[test]
fn test_before_breadcrumb_filters() {
    let options = ClientOptions {
        before_breadcrumb: Some(Arc::new(|breadcrumb| {
            if breadcrumb.message.as_deref() == Some("noisy") {
                None
            } else {
                Some(breadcrumb)
            }
        })),
        ..Default::default()
    };
    let events = with_captured_events_options(
        || {
            for message in ["noisy", "useful"] {
                faultline::add_breadcrumb(faultline::Breadcrumb {
                    message: Some(message.into()),
                    ..Default::default()
                });
            }
            faultline::capture_message("done", Level::Info);
        },
        options,
    );
    let messages: Vec<_> = events[0]
        .breadcrumbs
        .iter()
        .map(|breadcrumb| breadcrumb.message.clone().unwrap())
        .collect();
    assert_eq!(messages, vec!["useful"]);
}

#[test]
fn test_excluded_exception_types() {
    #[derive(Debug)]
    struct IgnoredError;

    impl std::fmt::Display for IgnoredError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "noise")
        }
    }

    impl std::error::Error for IgnoredError {}

    let options = ClientOptions {
        excluded_exception_types: vec!["IgnoredError".into()],
        ..Default::default()
    };
    let events = with_captured_events_options(
        || {
            faultline::capture_error(&IgnoredError);
        },
        options,
    );
    assert!(events.is_empty());
}

#[test]
fn test_should_capture_overrides_sample_rate() {
    let options = ClientOptions {
        sample_rate: 0.0,
        should_capture: Some(Arc::new(|_: &Event| true)),
        ..Default::default()
    };
    let events = with_captured_events_options(
        || {
            faultline::capture_message("kept anyway", Level::Error);
        },
        options,
    );
    assert_eq!(events.len(), 1);
}

#[test]
fn test_sample_rate_zero_drops_everything() {
    let options = ClientOptions {
        sample_rate: 0.0,
        ..Default::default()
    };
    let events = with_captured_events_options(
        || {
            for _ in 0..10 {
                faultline::capture_message("dropped", Level::Error);
            }
        },
        options,
    );
    assert!(events.is_empty());
}

#[test]
fn test_lost_events_are_accounted() {
    let options = ClientOptions {
        sample_rate: 0.0,
        ..Default::default()
    };
    let counted = Arc::new(Mutex::new(None));
    let counted_in = Arc::clone(&counted);
    let events = with_captured_events_options(
        move || {
            faultline::capture_message("dropped", Level::Error);
            let client = Hub::current().client().unwrap();
            *counted_in.lock().unwrap() = Some(client.lost_events());
        },
        options,
    );
    assert!(events.is_empty());
    let counts = counted.lock().unwrap().clone().unwrap();
    assert_eq!(counts.get(&DiscardReason::SampleRate).copied(), Some(1));
}

#[test]
fn test_cloned_hubs_have_isolated_scopes() {
    let events = with_captured_events(|| {
        let outer = Hub::current();

        let worker = Arc::new(Hub::new_from_top(&outer));
        std::thread::spawn(move || {
            Hub::run(worker, || {
                faultline::configure_scope(|scope| scope.set_tag("thread", "worker"));
                faultline::capture_message("from worker", Level::Info);
            })
        })
        .join()
        .unwrap();

        // the worker's scope mutation stayed on the worker's hub
        faultline::capture_message("from main", Level::Info);
    });
    assert_eq!(events.len(), 2);
    let worker_event = events
        .iter()
        .find(|event| event.message.as_deref() == Some("from worker"))
        .unwrap();
    let main_event = events
        .iter()
        .find(|event| event.message.as_deref() == Some("from main"))
        .unwrap();
    assert_eq!(
        worker_event.tags.get("thread").map(String::as_str),
        Some("worker")
    );
    assert!(main_event.tags.is_empty());
}

#[test]
fn test_uninitialized_sdk_is_a_noop() {
    // no client is bound on this fresh hub
    let hub = Arc::new(Hub::new(None, Arc::new(Default::default())));
    Hub::run(hub, || {
        let id = faultline::capture_message("nobody listens", Level::Error);
        assert!(id.is_nil());
    });
}

#[test]
fn test_panicking_scope_processor_is_contained() {
    let events = with_captured_events(|| {
        faultline::configure_scope(|scope| {
            scope.add_event_processor(|_event| panic!("processor bug"));
        });
        // the panic is swallowed at the hub boundary
        let id = faultline::capture_message("boom", Level::Error);
        assert!(id.is_nil());
    });
    assert!(events.is_empty());
}
