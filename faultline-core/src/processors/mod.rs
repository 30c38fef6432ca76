//! The fixed, ordered event sanitization pipeline.
//!
//! Every processor is a pure transform `Event -> Event`, independently
//! testable, applied by the client before the before-send callback. The
//! order is fixed and load-bearing: sanitization and masking run first,
//! truncation runs last so byte ceilings apply to already-reduced data.

mod depth;
mod mask;
mod sanitize;
mod truncate;
pub mod utf8;

pub use self::depth::ElideDeepStructures;
pub use self::mask::{MaskHeadersAndCookies, MaskRequestBodies};
pub use self::sanitize::SanitizeSensitiveData;
pub use self::truncate::{truncate_to_char_boundary, TruncateStrings};

use crate::protocol::{Event, Value};
use crate::ClientOptions;

/// The token masked values are replaced with.
///
/// Deliberately free of digits so that sanitization is idempotent: a
/// masked value can never re-match the card-number pattern.
pub const MASK: &str = "********";

/// The placeholder substituted for structures too deep to walk.
pub const ELISION_PLACEHOLDER: &str = "(...)";

/// A single step of the event pipeline.
///
/// Processors transform the serializable representation of an event.
/// Unlike [`Integration`](crate::Integration) hooks and the before-send
/// callback they can not drop the event, which keeps each step trivially
/// composable.
pub trait EventProcessor: Send + Sync {
    /// The name of the processor, for diagnostics.
    fn name(&self) -> &'static str;

    /// Transforms the event.
    fn process(&self, event: Event<'static>) -> Event<'static>;
}

/// Builds the processor chain for the given options.
///
/// Ordering: sanitize, structural elision, header/cookie masking,
/// optional body masking, optional stacktrace removal, truncation last.
pub(crate) fn default_chain(options: &ClientOptions) -> Vec<Box<dyn EventProcessor>> {
    let mut chain: Vec<Box<dyn EventProcessor>> = vec![
        Box::new(SanitizeSensitiveData::with_extra_patterns(
            &options.sanitize_fields,
        )),
        Box::new(ElideDeepStructures),
        Box::new(MaskHeadersAndCookies::new(options.sensitive_headers.clone())),
    ];
    if options.mask_request_bodies {
        chain.push(Box::new(MaskRequestBodies));
    }
    if options.strip_stacktraces {
        chain.push(Box::new(StripStacktraces));
    }
    chain.push(Box::new(TruncateStrings::new(options.max_value_bytes)));
    chain
}

/// Strips all stack frames from an event, for size- or
/// privacy-constrained deployments.
pub struct StripStacktraces;

impl EventProcessor for StripStacktraces {
    fn name(&self) -> &'static str {
        "strip-stacktraces"
    }

    fn process(&self, mut event: Event<'static>) -> Event<'static> {
        for exception in event.exception.iter_mut() {
            exception.stacktrace = None;
        }
        event
    }
}

/// Applies `f` to every string inside a value tree.
pub(crate) fn for_each_string(value: &mut Value, f: &mut dyn FnMut(&mut String)) {
    match value {
        Value::String(s) => f(s),
        Value::Array(values) => {
            for value in values {
                for_each_string(value, f);
            }
        }
        Value::Object(map) => {
            for value in map.values_mut() {
                for_each_string(value, f);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Exception, Stacktrace, Values};

    #[test]
    fn test_strip_stacktraces() {
        let event = Event {
            exception: Values::from(vec![Exception {
                ty: "Oops".into(),
                stacktrace: Some(Stacktrace::default()),
                ..Default::default()
            }]),
            ..Default::default()
        };
        let event = StripStacktraces.process(event);
        assert!(event.exception[0].stacktrace.is_none());
    }

    #[test]
    fn test_chain_order_ends_with_truncation() {
        let chain = default_chain(&ClientOptions::default());
        assert_eq!(chain.first().unwrap().name(), "sanitize-sensitive-data");
        assert_eq!(chain.last().unwrap().name(), "truncate-strings");
    }
}
