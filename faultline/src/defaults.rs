use std::borrow::Cow;
use std::env;
use std::sync::Arc;

use crate::ClientOptions;

#[cfg(feature = "backtrace")]
use crate::Integration;

/// Amends the given options with the environment driven defaults.
///
/// This fills in the DSN (`FAULTLINE_DSN`), release
/// (`FAULTLINE_RELEASE`), environment (`FAULTLINE_ENVIRONMENT`), the
/// server name, proxies, the default transport and the default
/// integrations, for every field the caller did not set explicitly.
pub fn apply_defaults(mut opts: ClientOptions) -> ClientOptions {
    #[cfg(feature = "transport")]
    if opts.transport.is_none() {
        opts.transport = Some(Arc::new(crate::transports::DefaultTransportFactory));
    }
    if opts.dsn.is_none() {
        opts.dsn = env::var("FAULTLINE_DSN")
            .ok()
            .and_then(|dsn| dsn.parse().ok());
    }
    if opts.release.is_none() {
        opts.release = env::var("FAULTLINE_RELEASE").ok().map(Cow::Owned);
    }
    if opts.environment.is_none() {
        opts.environment = env::var("FAULTLINE_ENVIRONMENT")
            .ok()
            .map(Cow::Owned)
            .or_else(|| {
                Some(Cow::Borrowed(if cfg!(debug_assertions) {
                    "debug"
                } else {
                    "release"
                }))
            });
    }
    if opts.server_name.is_none() {
        opts.server_name = hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
            .map(Cow::Owned);
    }
    if opts.http_proxy.is_none() {
        opts.http_proxy = env::var("HTTP_PROXY")
            .ok()
            .map(Cow::Owned)
            .or_else(|| env::var("http_proxy").ok().map(Cow::Owned));
    }
    if opts.https_proxy.is_none() {
        opts.https_proxy = env::var("HTTPS_PROXY")
            .ok()
            .map(Cow::Owned)
            .or_else(|| env::var("https_proxy").ok().map(Cow::Owned))
            .or_else(|| opts.http_proxy.clone());
    }
    #[cfg(feature = "backtrace")]
    if opts.default_integrations {
        // attach before processing, so attached traces get processed too
        let mut integrations: Vec<Arc<dyn Integration>> = vec![
            Arc::new(faultline_backtrace::AttachStacktraceIntegration),
            Arc::new(faultline_backtrace::ProcessStacktraceIntegration),
        ];
        integrations.append(&mut opts.integrations);
        opts.integrations = integrations;
    }
    opts
}
