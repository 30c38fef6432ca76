use faultline_core::protocol::{Frame, Stacktrace};

use crate::utils::function_starts_with;

const WELL_KNOWN_NOT_IN_APP: &[&str] = &[
    // standard library and SDK crates
    "std::",
    "core::",
    "alloc::",
    "backtrace::",
    "faultline::",
    "faultline_core::",
    "faultline_types::",
    "faultline_backtrace::",
    // these are not modules but things like __rust_maybe_catch_panic
    "__rust_",
    "___rust_",
    "_rust_begin_unwind",
    // well-known library frames
    "anyhow::",
    "log::",
    "tokio::",
];

const WELL_KNOWN_BORDER_FRAMES: &[&str] = &[
    "std::panicking::begin_panic",
    "core::panicking::panic",
    // well-known library frames
    "anyhow::",
];

/// A helper function to trim a stacktrace.
///
/// Everything newer than the newest border frame is runtime scaffolding
/// (panic machinery, capture internals) and is cut off. The predicate
/// can mark additional frames as borders.
pub fn trim_stacktrace<F>(stacktrace: &mut Stacktrace, f: F)
where
    F: Fn(&Frame, &Stacktrace) -> bool,
{
    let known_cutoff = stacktrace
        .frames
        .iter()
        .rev()
        .position(|frame| match frame.function {
            Some(ref func) => is_well_known_border_frame(func) || f(frame, stacktrace),
            None => false,
        });

    if let Some(cutoff) = known_cutoff {
        let trunc = stacktrace.frames.len() - cutoff - 1;
        stacktrace.frames.truncate(trunc);
    }
}

/// Checks if a function is from a module that shall be considered not
/// in-app by default.
pub fn is_well_known_not_in_app(func: &str) -> bool {
    WELL_KNOWN_NOT_IN_APP
        .iter()
        .any(|m| function_starts_with(func, m))
}

fn is_well_known_border_frame(func: &str) -> bool {
    WELL_KNOWN_BORDER_FRAMES
        .iter()
        .any(|m| function_starts_with(func, m))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named_frame(function: &str) -> Frame {
        Frame {
            function: Some(function.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_trims_above_panic_border() {
        let mut stacktrace = Stacktrace {
            frames: vec![
                named_frame("std::rt::lang_start"),
                named_frame("app::main"),
                named_frame("app::handler"),
                named_frame("core::panicking::panic"),
                named_frame("backtrace::capture"),
            ],
            ..Default::default()
        };
        trim_stacktrace(&mut stacktrace, |_, _| false);
        assert_eq!(stacktrace.frames.len(), 3);
        assert_eq!(
            stacktrace.frames.last().unwrap().function.as_deref(),
            Some("app::handler")
        );
    }

    #[test]
    fn test_no_border_no_trim() {
        let mut stacktrace = Stacktrace {
            frames: vec![named_frame("app::main"), named_frame("app::handler")],
            ..Default::default()
        };
        trim_stacktrace(&mut stacktrace, |_, _| false);
        assert_eq!(stacktrace.frames.len(), 2);
    }
}
