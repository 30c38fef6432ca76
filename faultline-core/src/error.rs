use std::error::Error;

use crate::protocol::{Event, Exception, Level};
use crate::types::Uuid;
use crate::Hub;

/// The maximum number of entries collected from one cause chain.
///
/// A chain that is longer (or that loops back onto itself in a way the
/// identity check misses) is cut off here to bound event size.
const MAX_CAUSE_CHAIN_DEPTH: usize = 16;

impl Hub {
    /// Capture any `std::error::Error`.
    ///
    /// See the global [`capture_error`] for more documentation.
    pub fn capture_error<E: Error + ?Sized>(&self, error: &E) -> Uuid {
        if self.is_active_and_usage_safe() {
            self.capture_event(event_from_error(error))
        } else {
            Uuid::nil()
        }
    }
}

/// Captures a `std::error::Error`.
///
/// Creates an event from the given error and sends it to the current
/// hub. The chain of causes is resolved as well, ordered innermost
/// cause first.
///
/// # Examples
///
/// ```
/// # use faultline_core as faultline;
/// faultline::capture_error(&std::io::Error::last_os_error());
/// ```
pub fn capture_error<E: Error + ?Sized>(error: &E) -> Uuid {
    Hub::with_active(|hub| hub.capture_error(error))
}

/// Create a faultline `Event` from a `std::error::Error`.
///
/// The `source` chain is walked from the outermost error inward,
/// collecting ancestors until the chain ends, a cause repeats an already
/// visited ancestor (by identity), or the maximum depth is reached; the
/// chain is then reversed so the final ordering is innermost cause first.
///
/// # Examples
///
/// ```
/// use thiserror::Error;
///
/// #[derive(Debug, Error)]
/// #[error("inner")]
/// struct InnerError;
///
/// #[derive(Debug, Error)]
/// #[error("outer")]
/// struct OuterError(#[from] InnerError);
///
/// let event = faultline_core::event_from_error(&OuterError(InnerError));
/// assert_eq!(event.level, faultline_core::Level::Error);
/// assert_eq!(event.exception.len(), 2);
/// assert_eq!(&event.exception[0].ty, "InnerError");
/// assert_eq!(event.exception[0].value, Some("inner".into()));
/// assert_eq!(&event.exception[1].ty, "OuterError");
/// assert_eq!(event.exception[1].value, Some("outer".into()));
/// ```
pub fn event_from_error<E: Error + ?Sized>(err: &E) -> Event<'static> {
    let mut exceptions = vec![exception_from_error(err)];
    let mut visited = vec![err as *const E as *const ()];

    let mut source = err.source();
    while let Some(err) = source {
        let identity = err as *const dyn Error as *const ();
        if visited.contains(&identity) || visited.len() >= MAX_CAUSE_CHAIN_DEPTH {
            break;
        }
        visited.push(identity);
        exceptions.push(exception_from_error(err));
        source = err.source();
    }

    exceptions.reverse();
    Event {
        exception: exceptions.into(),
        level: Level::Error,
        ..Default::default()
    }
}

/// Create a faultline `Exception` from a `std::error::Error`.
pub fn exception_from_error<E: Error + ?Sized>(err: &E) -> Exception {
    let dbg = format!("{err:?}");
    let value = err.to_string();

    // A generic `Debug` output starts with the type name; error wrappers
    // that only format their message (anyhow-style) do not, in which
    // case no type can be extracted.
    let ty = if dbg == format!("{value:?}") || dbg == value {
        String::from("Error")
    } else {
        parse_type_from_debug(&dbg).to_owned()
    };

    // The module is everything before the trailing type segment, if the
    // debug representation carried a path.
    let (module, ty) = match ty.rsplit_once("::") {
        Some((module, ty)) => (Some(module.to_owned()), ty.to_owned()),
        None => (None, ty),
    };

    Exception {
        ty,
        module,
        value: Some(value),
        ..Default::default()
    }
}

fn parse_type_from_debug(dbg: &str) -> &str {
    dbg.split(&['(', '{', ' '][..])
        .next()
        .unwrap_or(dbg)
        .trim()
}

#[cfg(test)]
mod tests {
    use std::fmt;

    use super::*;

    #[derive(Debug)]
    struct ZeroDivisionError;

    impl fmt::Display for ZeroDivisionError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "divided by 0")
        }
    }

    impl Error for ZeroDivisionError {}

    #[derive(Debug)]
    struct Chained {
        message: &'static str,
        source: Option<Box<dyn Error + 'static>>,
    }

    impl fmt::Display for Chained {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.message)
        }
    }

    impl Error for Chained {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            self.source.as_deref()
        }
    }

    /// An error that claims to be caused by itself.
    #[derive(Debug)]
    struct SelfCaused;

    impl fmt::Display for SelfCaused {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "it's turtles all the way down")
        }
    }

    impl Error for SelfCaused {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(self)
        }
    }

    #[test]
    fn test_simple_error() {
        let event = event_from_error(&ZeroDivisionError);
        assert_eq!(event.exception.len(), 1);
        assert_eq!(event.exception[0].ty, "ZeroDivisionError");
        assert_eq!(event.exception[0].value, Some("divided by 0".into()));
        assert_eq!(event.level, Level::Error);
    }

    #[test]
    fn test_chain_is_innermost_first() {
        let chained = Chained {
            message: "c",
            source: Some(Box::new(Chained {
                message: "b",
                source: Some(Box::new(Chained {
                    message: "a",
                    source: None,
                })),
            })),
        };
        let event = event_from_error(&chained);
        assert_eq!(event.exception.len(), 3);
        assert_eq!(event.exception[0].value, Some("a".into()));
        assert_eq!(event.exception[1].value, Some("b".into()));
        assert_eq!(event.exception[2].value, Some("c".into()));
    }

    #[test]
    fn test_self_referential_cause_terminates() {
        let event = event_from_error(&SelfCaused);
        assert_eq!(event.exception.len(), 1);
        assert_eq!(event.exception[0].ty, "SelfCaused");
    }

    #[test]
    fn test_module_is_split_from_path() {
        let exception = exception_from_error(&ZeroDivisionError);
        assert_eq!(exception.ty, "ZeroDivisionError");
        assert_eq!(exception.module, None);
    }
}
