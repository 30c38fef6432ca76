//! The provided transports.
//!
//! This module exposes the HTTP transport that is compiled into the
//! library with the `transport` feature, together with the pieces it is
//! built from: the bounded background worker thread, the per-category
//! rate limiter and the transport circuit breaker.

use std::sync::Arc;

use crate::{ClientOptions, Transport, TransportFactory};

mod ratelimit;
mod state;
mod thread;
mod ureq;

pub use self::ratelimit::{RateLimiter, RateLimitingCategory};
pub use self::state::ClientState;
pub use self::thread::TransportThread;
pub use self::ureq::UreqHttpTransport;

/// The default http transport.
pub type HttpTransport = UreqHttpTransport;

/// Creates the default HTTP transport.
///
/// This is the default value for `transport` on the client options.
#[derive(Clone)]
pub struct DefaultTransportFactory;

impl TransportFactory for DefaultTransportFactory {
    fn create_transport(&self, options: &ClientOptions) -> Arc<dyn Transport> {
        Arc::new(HttpTransport::new(options))
    }
}
