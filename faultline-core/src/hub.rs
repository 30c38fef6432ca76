use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use crate::hub_impl::HubImpl;
use crate::protocol::{Event, Level};
use crate::types::Uuid;
use crate::{IntoBreadcrumbs, Scope, ScopeGuard};

/// The central object that manages scopes and clients.
///
/// This can be used to capture events and manage the scope.  With a
/// client bound the hub will deliver events to the client's pipeline; if
/// no client is bound every capture call is a cheap no-op.
///
/// The hub that is available automatically is thread local: each thread
/// lazily receives its own hub cloned from the main hub, with a copied
/// scope and a shared client handle. That gives every new execution
/// context isolated mutable state without re-reading configuration, and
/// keeps scope access lock-free across threads.
pub struct Hub {
    pub(crate) inner: HubImpl,
    pub(crate) last_event_id: RwLock<Option<Uuid>>,
}

impl Hub {
    /// Sends the event to the current client with the current scope.
    ///
    /// In case no client is bound this does nothing and the returned id
    /// is the nil uuid. A panic anywhere inside the capture machinery is
    /// caught here and logged: an inability to report an error must not
    /// itself become an error in the host application.
    pub fn capture_event(&self, event: Event<'static>) -> Uuid {
        let (client, scope) = self.inner.with(|stack| {
            let top = stack.top();
            (top.client.clone(), top.scope.clone())
        });

        let Some(client) = client else {
            return Uuid::nil();
        };

        let event_id = match catch_unwind(AssertUnwindSafe(|| {
            client.capture_event(event, Some(scope.as_ref()))
        })) {
                Ok(event_id) => event_id,
                Err(_) => {
                    faultline_debug!("[Hub] capture pipeline panicked; event discarded");
                    Uuid::nil()
                }
            };

        if !event_id.is_nil() {
            *self
                .last_event_id
                .write()
                .unwrap_or_else(PoisonError::into_inner) = Some(event_id);
        }
        event_id
    }

    /// Captures an arbitrary message.
    pub fn capture_message(&self, msg: &str, level: Level) -> Uuid {
        let event = Event {
            message: Some(msg.to_string()),
            level,
            ..Default::default()
        };
        self.capture_event(event)
    }

    /// Invokes a function that can modify the current scope.
    pub fn configure_scope<F, R>(&self, f: F) -> R
    where
        R: Default,
        F: FnOnce(&mut Scope) -> R,
    {
        let has_client = self.inner.with(|stack| stack.top().client.is_some());
        if !has_client {
            return Default::default();
        }
        self.inner
            .with_mut(|stack| f(Arc::make_mut(&mut stack.top_mut().scope)))
    }

    /// Pushes a new scope.
    ///
    /// This returns a guard that when dropped will pop the scope again.
    pub fn push_scope(&self) -> ScopeGuard {
        self.inner.with_mut(|stack| {
            stack.push();
            ScopeGuard(Some((self.inner.stack.clone(), stack.depth())))
        })
    }

    /// Temporarily pushes a scope for a single call optionally
    /// reconfiguring it.
    ///
    /// The scope is popped again on every exit path, including panics in
    /// the callback, so mutations inside never leak to the parent scope.
    pub fn with_scope<C, F, R>(&self, scope_config: C, callback: F) -> R
    where
        C: FnOnce(&mut Scope),
        F: FnOnce() -> R,
    {
        let _guard = self.push_scope();
        self.configure_scope(scope_config);
        callback()
    }

    /// Adds a new breadcrumb to the current scope.
    ///
    /// The breadcrumb is passed through the configured
    /// `before_breadcrumb` callback first; the scope's buffer is bounded
    /// by `max_breadcrumbs`, evicting the oldest entries.
    pub fn add_breadcrumb<B: IntoBreadcrumbs>(&self, breadcrumb: B) {
        self.inner.with_mut(|stack| {
            let top = stack.top_mut();
            if let Some(client) = top.client.clone() {
                let scope = Arc::make_mut(&mut top.scope);
                let options = client.options();
                let breadcrumbs = Arc::make_mut(&mut scope.breadcrumbs);
                for breadcrumb in breadcrumb.into_breadcrumbs() {
                    let breadcrumb_opt = match &options.before_breadcrumb {
                        Some(callback) => callback(breadcrumb),
                        None => Some(breadcrumb),
                    };
                    if let Some(breadcrumb) = breadcrumb_opt {
                        breadcrumbs.push_back(breadcrumb);
                    }
                    while breadcrumbs.len() > options.max_breadcrumbs {
                        breadcrumbs.pop_front();
                    }
                }
            }
        })
    }

    /// Returns the last event id.
    pub fn last_event_id(&self) -> Option<Uuid> {
        *self
            .last_event_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
