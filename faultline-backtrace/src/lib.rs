//! Backtrace integration and utilities for the faultline SDK.
//!
//! Exposes functions to capture, process and parse stacktraces, as well
//! as the integrations that process event stacktraces on their way
//! through the pipeline.
#![warn(missing_docs)]

mod integration;
mod parse;
mod process;
mod trim;
mod utils;

pub use crate::integration::{AttachStacktraceIntegration, ProcessStacktraceIntegration};
pub use crate::parse::parse_stacktrace;
pub use crate::process::{backtrace_to_stacktrace, process_event_stacktrace};
pub use crate::trim::trim_stacktrace;
pub use faultline_core::protocol::{Frame, Stacktrace};

/// Returns the current backtrace as a faultline stacktrace.
pub fn current_stacktrace() -> Option<Stacktrace> {
    backtrace_to_stacktrace(&backtrace::Backtrace::new())
}
