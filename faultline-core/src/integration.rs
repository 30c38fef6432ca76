use std::any::Any;

use crate::protocol::Event;
use crate::ClientOptions;

/// Integration abstraction.
///
/// An integration is the explicit registration point for anything that
/// wants to observe or modify events on their way through the pipeline —
/// the composition-based alternative to patching host library internals.
/// Integrations are registered on [`ClientOptions`] before the client is
/// created; `setup` runs once at client construction and may adjust the
/// options, `process_event` runs for every event after the scope was
/// applied.
pub trait Integration: Any + Sync + Send {
    /// Name of this integration, reported in the SDK metadata.
    fn name(&self) -> &'static str {
        "unknown"
    }

    /// Called whenever the integration is attached to a new client.
    fn setup(&self, options: &mut ClientOptions) {
        let _ = options;
    }

    /// The hook for processing (or dropping) events.
    fn process_event(
        &self,
        event: Event<'static>,
        options: &ClientOptions,
    ) -> Option<Event<'static>> {
        let _ = options;
        Some(event)
    }
}
