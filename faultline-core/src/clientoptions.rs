use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::constants::USER_AGENT;
use crate::performance::TransactionContext;
use crate::protocol::{Breadcrumb, Event};
use crate::types::Dsn;
use crate::{Integration, IntoDsn, TransportFactory};

/// Type alias for before event/breadcrumb handlers.
pub type BeforeCallback<T> = Arc<dyn Fn(T) -> Option<T> + Send + Sync>;

/// Type alias for the sampler callback deciding the rate of a transaction.
pub type TracesSampler = Arc<dyn Fn(&TransactionContext) -> f32 + Send + Sync>;

/// Type alias for the authoritative error-capture decision callback.
pub type ShouldCapture = Arc<dyn Fn(&Event<'static>) -> bool + Send + Sync>;

/// Configuration settings for the client.
///
/// The options are immutable once the client was constructed from them;
/// reconfiguration happens by building a new client and binding it.
///
/// # Examples
///
/// ```
/// # use faultline_core as faultline;
/// let _options = faultline::ClientOptions {
///     debug: true,
///     ..Default::default()
/// };
/// ```
#[derive(Clone)]
pub struct ClientOptions {
    // Common options
    /// The DSN to use.  If not set the client is effectively disabled.
    pub dsn: Option<Dsn>,
    /// Enables debug mode.
    ///
    /// In debug mode debug information is printed to stderr to help you
    /// understand what the SDK is doing.  When the `debug-logs` feature
    /// is enabled, the SDK logs to the `faultline` logger independently
    /// of this flag.
    pub debug: bool,
    /// The release to be sent with events.
    pub release: Option<Cow<'static, str>>,
    /// The environment to be sent with events.
    pub environment: Option<Cow<'static, str>>,
    /// The server name to be reported.
    pub server_name: Option<Cow<'static, str>>,
    /// The sample rate for error event submission. (0.0 - 1.0, defaults to 1.0)
    pub sample_rate: f32,
    /// The sample rate for transactions. `None` defers to the
    /// `traces_sampler` callback, or to an explicit inbound decision.
    pub traces_sample_rate: Option<f32>,
    /// Callback computing a transaction sample rate from its context.
    pub traces_sampler: Option<TracesSampler>,
    /// Authoritative keep/drop decision for error events.  When set, this
    /// takes precedence over `sample_rate`.
    pub should_capture: Option<ShouldCapture>,
    /// Maximum number of breadcrumbs kept on a scope. (defaults to 100)
    pub max_breadcrumbs: usize,
    /// Attaches stacktraces to message events.
    pub attach_stacktrace: bool,
    /// If turned on, default PII informations (like cookies and request
    /// bodies) are captured instead of masked.
    pub send_default_pii: bool,
    /// Module prefixes that are always considered "in_app".
    pub in_app_include: Vec<&'static str>,
    /// Module prefixes that are never "in_app".
    pub in_app_exclude: Vec<&'static str>,
    /// Filesystem prefixes of the application's own source tree.
    ///
    /// Frames whose path lives under one of these are classified in-app,
    /// and frame filenames are reported relative to the longest matching
    /// prefix.
    pub project_roots: Vec<Cow<'static, str>>,
    /// Exception type names that are never sent.
    pub excluded_exception_types: Vec<Cow<'static, str>>,
    /// Additional key patterns scrubbed by the sanitizer, on top of the
    /// built-in sensitive keys.
    pub sanitize_fields: Vec<Cow<'static, str>>,
    /// Request headers masked by the header processor.
    pub sensitive_headers: Vec<Cow<'static, str>>,
    /// Replaces captured POST/PUT/PATCH request bodies with the mask token.
    pub mask_request_bodies: bool,
    /// Strips all exception stacktraces before sending.
    pub strip_stacktraces: bool,
    /// Byte ceiling applied to every string value in an event.
    pub max_value_bytes: usize,
    // Integration options
    /// A list of integrations to enable.
    pub integrations: Vec<Arc<dyn Integration>>,
    /// Whether to add default integrations.
    pub default_integrations: bool,
    // Hooks
    /// Callback that is executed before event sending.
    pub before_send: Option<BeforeCallback<Event<'static>>>,
    /// Callback that is executed for each Breadcrumb being added.
    pub before_breadcrumb: Option<BeforeCallback<Breadcrumb>>,
    // Transport options
    /// The transport to use.
    ///
    /// This is typically either a boxed function taking the client
    /// options by reference and returning a `Transport`, or an
    /// `Arc<Transport>`.
    pub transport: Option<Arc<dyn TransportFactory>>,
    /// An optional HTTP proxy to use.
    ///
    /// This will default to the `http_proxy` environment variable.
    pub http_proxy: Option<Cow<'static, str>>,
    /// An optional HTTPS proxy to use.
    ///
    /// This will default to the `HTTPS_PROXY` environment variable
    /// or `http_proxy` if that one exists.
    pub https_proxy: Option<Cow<'static, str>>,
    /// The connect timeout for each HTTP attempt.
    pub connect_timeout: Duration,
    /// The read timeout for each HTTP attempt.
    pub read_timeout: Duration,
    /// Serialized envelopes larger than this are compressed before the
    /// POST; smaller payloads are sent uncompressed since compression
    /// has fixed overhead.
    pub compression_threshold: usize,
    /// Capacity of the bounded background worker queue.  Enqueueing
    /// beyond capacity drops the envelope instead of blocking.
    pub queue_size: usize,
    /// The timeout on client drop for draining events on shutdown.
    pub shutdown_timeout: Duration,
    /// The user agent that should be reported.
    pub user_agent: Cow<'static, str>,
}

impl ClientOptions {
    /// Creates new Options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a configured integration to the options.
    ///
    /// # Examples
    ///
    /// ```
    /// # use faultline_core as faultline;
    /// struct MyIntegration;
    ///
    /// impl faultline::Integration for MyIntegration {}
    ///
    /// let options = faultline::ClientOptions::new().add_integration(MyIntegration);
    /// assert_eq!(options.integrations.len(), 1);
    /// ```
    pub fn add_integration<I: Integration>(mut self, integration: I) -> Self {
        self.integrations.push(Arc::new(integration));
        self
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[derive(Debug)]
        struct BeforeSend;
        let before_send = self.before_send.as_ref().map(|_| BeforeSend);
        #[derive(Debug)]
        struct BeforeBreadcrumb;
        let before_breadcrumb = self.before_breadcrumb.as_ref().map(|_| BeforeBreadcrumb);
        #[derive(Debug)]
        struct TracesSampler;
        let traces_sampler = self.traces_sampler.as_ref().map(|_| TracesSampler);
        #[derive(Debug)]
        struct ShouldCapture;
        let should_capture = self.should_capture.as_ref().map(|_| ShouldCapture);
        #[derive(Debug)]
        struct TransportFactory;
        let transport = self.transport.as_ref().map(|_| TransportFactory);

        let integrations: Vec<_> = self.integrations.iter().map(|i| i.name()).collect();

        f.debug_struct("ClientOptions")
            .field("dsn", &self.dsn)
            .field("debug", &self.debug)
            .field("release", &self.release)
            .field("environment", &self.environment)
            .field("server_name", &self.server_name)
            .field("sample_rate", &self.sample_rate)
            .field("traces_sample_rate", &self.traces_sample_rate)
            .field("traces_sampler", &traces_sampler)
            .field("should_capture", &should_capture)
            .field("max_breadcrumbs", &self.max_breadcrumbs)
            .field("attach_stacktrace", &self.attach_stacktrace)
            .field("send_default_pii", &self.send_default_pii)
            .field("in_app_include", &self.in_app_include)
            .field("in_app_exclude", &self.in_app_exclude)
            .field("project_roots", &self.project_roots)
            .field("excluded_exception_types", &self.excluded_exception_types)
            .field("sanitize_fields", &self.sanitize_fields)
            .field("sensitive_headers", &self.sensitive_headers)
            .field("mask_request_bodies", &self.mask_request_bodies)
            .field("strip_stacktraces", &self.strip_stacktraces)
            .field("max_value_bytes", &self.max_value_bytes)
            .field("integrations", &integrations)
            .field("default_integrations", &self.default_integrations)
            .field("before_send", &before_send)
            .field("before_breadcrumb", &before_breadcrumb)
            .field("transport", &transport)
            .field("http_proxy", &self.http_proxy)
            .field("https_proxy", &self.https_proxy)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("compression_threshold", &self.compression_threshold)
            .field("queue_size", &self.queue_size)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl Default for ClientOptions {
    fn default() -> ClientOptions {
        ClientOptions {
            dsn: None,
            debug: false,
            release: None,
            environment: None,
            server_name: None,
            sample_rate: 1.0,
            traces_sample_rate: None,
            traces_sampler: None,
            should_capture: None,
            max_breadcrumbs: 100,
            attach_stacktrace: false,
            send_default_pii: false,
            in_app_include: vec![],
            in_app_exclude: vec![],
            project_roots: vec![],
            excluded_exception_types: vec![],
            sanitize_fields: vec![],
            sensitive_headers: vec![Cow::Borrowed("authorization")],
            mask_request_bodies: false,
            strip_stacktraces: false,
            max_value_bytes: 8192,
            integrations: vec![],
            default_integrations: true,
            before_send: None,
            before_breadcrumb: None,
            transport: None,
            http_proxy: None,
            https_proxy: None,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(30),
            compression_threshold: 1024,
            queue_size: 30,
            shutdown_timeout: Duration::from_secs(2),
            user_agent: Cow::Borrowed(USER_AGENT.as_str()),
        }
    }
}

impl<T: IntoDsn> From<(T, ClientOptions)> for ClientOptions {
    fn from((into_dsn, mut opts): (T, ClientOptions)) -> ClientOptions {
        opts.dsn = into_dsn.into_dsn().unwrap_or_else(|err| {
            faultline_debug!("invalid DSN, client will be disabled: {}", err);
            None
        });
        opts
    }
}

impl<T: IntoDsn> From<T> for ClientOptions {
    fn from(into_dsn: T) -> ClientOptions {
        ClientOptions {
            dsn: into_dsn.into_dsn().unwrap_or_else(|err| {
                faultline_debug!("invalid DSN, client will be disabled: {}", err);
                None
            }),
            ..ClientOptions::default()
        }
    }
}
