use faultline_core::protocol::Event;
use faultline_core::{ClientOptions, Integration};

use crate::current_stacktrace;
use crate::process::process_event_stacktrace;

/// Integration to process event stacktraces.
///
/// This trims scaffolding frames and classifies each frame according to
/// the `in_app_include`, `in_app_exclude` and `project_roots` options.
#[derive(Debug, Default)]
pub struct ProcessStacktraceIntegration;

impl ProcessStacktraceIntegration {
    /// Creates a new integration to process stacktraces.
    pub fn new() -> Self {
        Self
    }
}

impl Integration for ProcessStacktraceIntegration {
    fn name(&self) -> &'static str {
        "process-stacktrace"
    }

    fn process_event(
        &self,
        mut event: Event<'static>,
        options: &ClientOptions,
    ) -> Option<Event<'static>> {
        for exception in &mut event.exception {
            if let Some(ref mut stacktrace) = exception.stacktrace {
                process_event_stacktrace(stacktrace, options);
            }
        }
        if let Some(ref mut stacktrace) = event.stacktrace {
            process_event_stacktrace(stacktrace, options);
        }
        Some(event)
    }
}

/// Integration to attach stacktraces to events.
///
/// When `attach_stacktrace` is enabled and an event carries no trace of
/// its own, the current thread's stacktrace is captured once and
/// attached to the outermost exception, or to the event itself for
/// plain messages. Inner causes never receive a duplicate copy.
#[derive(Debug, Default)]
pub struct AttachStacktraceIntegration;

impl AttachStacktraceIntegration {
    /// Creates a new integration to attach stacktraces to events.
    pub fn new() -> Self {
        Self
    }
}

impl Integration for AttachStacktraceIntegration {
    fn name(&self) -> &'static str {
        "attach-stacktrace"
    }

    fn process_event(
        &self,
        mut event: Event<'static>,
        options: &ClientOptions,
    ) -> Option<Event<'static>> {
        if options.attach_stacktrace && !has_stacktrace(&event) {
            if let Some(stacktrace) = current_stacktrace() {
                // the outermost exception is the capture point
                match event.exception.last_mut() {
                    Some(exception) => exception.stacktrace = Some(stacktrace),
                    None => event.stacktrace = Some(stacktrace),
                }
            }
        }
        Some(event)
    }
}

fn has_stacktrace(event: &Event) -> bool {
    event.stacktrace.is_some() || event.exception.iter().any(|exc| exc.stacktrace.is_some())
}
