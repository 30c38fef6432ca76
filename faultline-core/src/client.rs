use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::RefUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use rand::random;

use crate::constants::SDK_INFO;
use crate::processors;
use crate::protocol::{ClientSdkInfo, DiscardReason, Event};
use crate::transport::LostEventLog;
use crate::types::{random_uuid, Dsn, Uuid};
use crate::{ClientOptions, Envelope, EventProcessor, Hub, Integration, Scope, Transport};

impl<T: Into<ClientOptions>> From<T> for Client {
    fn from(o: T) -> Client {
        Client::with_options(o.into())
    }
}

pub(crate) type TransportArc = Arc<RwLock<Option<Arc<dyn Transport>>>>;

/// The Faultline Client.
///
/// The Client is responsible for event processing: it applies the scope
/// snapshot, runs integrations and the processor chain, applies the
/// before-send hook, makes the final keep/drop decision, and hands
/// surviving events to the configured [`Transport`]. It can be created
/// from [`ClientOptions`].
///
/// # Examples
///
/// ```
/// # use faultline_core as faultline;
/// faultline::Client::from(faultline::ClientOptions::default());
/// ```
pub struct Client {
    options: ClientOptions,
    transport: TransportArc,
    integrations: Vec<Arc<dyn Integration>>,
    processors: Vec<Box<dyn EventProcessor>>,
    lost: LostEventLog,
    pub(crate) sdk_info: ClientSdkInfo,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("dsn", &self.dsn())
            .field("options", &self.options)
            .finish()
    }
}

impl Clone for Client {
    fn clone(&self) -> Client {
        let transport = Arc::new(RwLock::new(
            self.transport
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        ));
        Client {
            options: self.options.clone(),
            transport,
            integrations: self.integrations.clone(),
            processors: processors::default_chain(&self.options),
            lost: self.lost.clone(),
            sdk_info: self.sdk_info.clone(),
        }
    }
}

impl Client {
    /// Creates a new client from a config.
    ///
    /// The following common values are supported for the client config:
    ///
    /// * `ClientOptions`: configure the client with the given options.
    /// * `()` or empty string: disable the client.
    /// * `&str` / `String` / `&OsStr` / `OsString`: configure with a DSN.
    /// * `Dsn` / `&Dsn`: configure the client with a given DSN.
    /// * `(Dsn, ClientOptions)`: configure from a DSN and options.
    ///
    /// An unparsable DSN yields a disabled client rather than a panic:
    /// a configuration error must not crash host startup.
    pub fn from_config<O: Into<ClientOptions>>(opts: O) -> Client {
        Client::with_options(opts.into())
    }

    /// Creates a new client for the given options.
    ///
    /// If the DSN on the options is set to `None` the client will be
    /// entirely disabled.
    pub fn with_options(mut options: ClientOptions) -> Client {
        crate::set_debug_enabled(options.debug);

        // Create the main hub eagerly so a lazily spawned background
        // thread can never be the first to touch the process hub.
        Hub::with(|_| {});

        let create_transport = || {
            options.dsn.as_ref()?;
            let factory = options.transport.as_ref()?;
            Some(factory.create_transport(&options))
        };

        let transport = Arc::new(RwLock::new(create_transport()));
        if transport
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
        {
            faultline_debug!("[Client] no transport available, client is disabled");
        }

        let mut sdk_info = SDK_INFO.clone();

        let integrations = options.integrations.clone();
        for integration in &integrations {
            integration.setup(&mut options);
            sdk_info.integrations.push(integration.name().to_string());
        }

        let processors = processors::default_chain(&options);

        Client {
            options,
            transport,
            integrations,
            processors,
            lost: LostEventLog::new(),
            sdk_info,
        }
    }

    /// Prepares an event for transmission.
    pub fn prepare_event(
        &self,
        mut event: Event<'static>,
        scope: Option<&Scope>,
    ) -> Option<Event<'static>> {
        // event_id and sdk are set before anything else runs so that
        // processors can poke around in that data.
        if event.event_id.is_nil() {
            event.event_id = random_uuid();
        }

        if event.sdk.is_none() {
            // NOTE: we need to clone here because `Event` must be `'static`
            event.sdk = Some(Cow::Owned(self.sdk_info.clone()));
        }

        if let Some(scope) = scope {
            event = match scope.apply_to_event(event) {
                Some(event) => event,
                None => {
                    self.lost.record(DiscardReason::EventProcessor);
                    return None;
                }
            };
        }

        for integration in &self.integrations {
            let id = event.event_id;
            event = match integration.process_event(event, &self.options) {
                Some(event) => event,
                None => {
                    faultline_debug!(
                        "[Client] integration '{}' dropped event {}",
                        integration.name(),
                        id
                    );
                    self.lost.record(DiscardReason::EventProcessor);
                    return None;
                }
            }
        }

        if event.release.is_none() {
            event.release.clone_from(&self.options.release);
        }
        if event.environment.is_none() {
            event.environment.clone_from(&self.options.environment);
        }
        if event.server_name.is_none() {
            event.server_name.clone_from(&self.options.server_name);
        }
        if &event.platform == "other" {
            event.platform = "native".into();
        }

        for processor in &self.processors {
            event = processor.process(event);
        }

        if let Some(ref func) = self.options.before_send {
            let id = event.event_id;
            event = match func(event) {
                Some(event) => event,
                None => {
                    faultline_debug!("[Client] before_send dropped event {}", id);
                    self.lost.record(DiscardReason::BeforeSend);
                    return None;
                }
            }
        }

        // Exclusion by exception type looks at the outermost exception,
        // which is the last entry of the innermost-first chain.
        if let Some(exception) = event.exception.last() {
            if self
                .options
                .excluded_exception_types
                .iter()
                .any(|ty| *ty == exception.ty)
            {
                faultline_debug!(
                    "[Client] event {} dropped by exclusion list ({})",
                    event.event_id,
                    exception.ty
                );
                self.lost.record(DiscardReason::ExclusionFilter);
                return None;
            }
        }

        let keep = match &self.options.should_capture {
            Some(callback) => callback(&event),
            None => self.sample_should_send(self.options.sample_rate),
        };
        if !keep {
            self.lost.record(DiscardReason::SampleRate);
            return None;
        }

        Some(event)
    }

    /// Returns the options of this client.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Returns the DSN that constructed this client.
    pub fn dsn(&self) -> Option<&Dsn> {
        self.options.dsn.as_ref()
    }

    /// Quick check to see if the client is enabled.
    ///
    /// The Client is enabled if it has a valid DSN and transport configured.
    pub fn is_enabled(&self) -> bool {
        self.options.dsn.is_some()
            && self
                .transport
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .is_some()
    }

    /// Captures an event and hands it to the transport.
    ///
    /// Returns the event id, or the nil uuid if the event was dropped.
    pub fn capture_event(&self, event: Event<'static>, scope: Option<&Scope>) -> Uuid {
        if let Some(ref transport) = *self
            .transport
            .read()
            .unwrap_or_else(PoisonError::into_inner)
        {
            if let Some(event) = self.prepare_event(event, scope) {
                let event_id = event.event_id;
                let mut envelope: Envelope = Envelope::new();
                envelope.add_item(event);

                if let Some(scope) = scope {
                    for attachment in scope.attachments.iter().cloned() {
                        envelope.add_item(attachment);
                    }
                }

                transport.send_envelope(envelope);
                return event_id;
            }
        }
        Default::default()
    }

    /// Sends the specified [`Envelope`] directly.
    pub fn send_envelope(&self, envelope: Envelope) {
        if let Some(ref transport) = *self
            .transport
            .read()
            .unwrap_or_else(PoisonError::into_inner)
        {
            transport.send_envelope(envelope);
        }
    }

    /// Drains all pending events without shutting down.
    pub fn flush(&self, timeout: Option<Duration>) -> bool {
        if let Some(ref transport) = *self
            .transport
            .read()
            .unwrap_or_else(PoisonError::into_inner)
        {
            transport.flush(timeout.unwrap_or(self.options.shutdown_timeout))
        } else {
            true
        }
    }

    /// Drains all pending events and shuts down the transport behind the
    /// client.  After shutting down the transport is removed.
    ///
    /// This returns `true` if the queue was successfully drained within
    /// the given time, or `shutdown_timeout` if none was provided.
    pub fn close(&self, timeout: Option<Duration>) -> bool {
        let transport_opt = self
            .transport
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(transport) = transport_opt {
            transport.shutdown(timeout.unwrap_or(self.options.shutdown_timeout))
        } else {
            true
        }
    }

    /// Returns a random boolean with a probability defined by rate.
    pub fn sample_should_send(&self, rate: f32) -> bool {
        if rate >= 1.0 {
            true
        } else if rate <= 0.0 {
            false
        } else {
            random::<f32>() < rate
        }
    }

    /// Returns a snapshot of the events this client dropped, by reason.
    ///
    /// This only covers capture-side drops; the transport keeps its own
    /// accounting for queue overflow, rate limits and backoff.
    pub fn lost_events(&self) -> BTreeMap<DiscardReason, usize> {
        self.lost.snapshot()
    }
}

// Make this unwind safe. It's not out of the box because of the
// callbacks inside `ClientOptions` and the contained integrations.
impl RefUnwindSafe for Client {}
