use std::sync::Arc;

use faultline_core::faultline_debug;

use crate::defaults::apply_defaults;
use crate::{Client, ClientOptions, Hub};

/// Helper struct that is returned from `init`.
///
/// When this is dropped events are drained with the configured shutdown
/// timeout.
#[must_use = "when the init guard is dropped the transport will be shut down and no further \
              events can be sent.  If you do want to ignore this use mem::forget on it."]
pub struct ClientInitGuard(Arc<Client>);

impl std::ops::Deref for ClientInitGuard {
    type Target = Client;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl ClientInitGuard {
    /// Quick check if the client is enabled.
    pub fn is_enabled(&self) -> bool {
        self.0.is_enabled()
    }
}

impl Drop for ClientInitGuard {
    fn drop(&mut self) {
        if self.is_enabled() {
            faultline_debug!("dropping client guard -> disposing client");
        } else {
            faultline_debug!("dropping client guard (no client to dispose)");
        }
        // end any session that is still ongoing.
        self.0.close(None);
    }
}

/// Creates the SDK client for a given client config and binds it to the
/// current hub.
///
/// This returns a client init guard that must be kept in scope; when the
/// guard is dropped the transport that was initialized shuts down and no
/// further events can be sent on it. If you do not want (or can not)
/// keep the guard around it is permissible to call `mem::forget` on it.
///
/// A missing or invalid DSN does not panic but yields a disabled client:
/// every capture call turns into a no-op, so a configuration error can
/// never crash host startup.
///
/// # Examples
///
/// ```no_run
/// let _faultline = faultline::init("https://key@faultline.invalid/1234");
/// ```
///
/// Or if draining on shutdown should be ignored:
///
/// ```no_run
/// std::mem::forget(faultline::init("https://key@faultline.invalid/1234"));
/// ```
///
/// For more information about the formats accepted see
/// [`Client::from_config`].
pub fn init<C: Into<ClientOptions>>(opts: C) -> ClientInitGuard {
    let opts = apply_defaults(opts.into());
    let client = Arc::new(Client::from_config(opts));

    Hub::with(|hub| hub.bind_client(Some(client.clone())));
    if let Some(dsn) = client.dsn() {
        faultline_debug!("enabled faultline client for DSN {}", dsn);
    } else {
        faultline_debug!("initialized disabled faultline client due to disabled or invalid DSN");
    }
    ClientInitGuard(client)
}
