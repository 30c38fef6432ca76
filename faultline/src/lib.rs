//! This crate provides support for reporting errors and performance
//! traces to a Faultline ingestion endpoint. The system is split into
//! layers: this crate contains the default transport and the environment
//! driven defaults, while [`faultline-core`](faultline_core) holds the
//! hub/scope/client capture pipeline that integrations build on.
//!
//! # Quickstart
//!
//! The most convenient way to use this library is the [`init`] function,
//! which starts an SDK client with a DSN and any other options. The
//! [`init`] function returns a guard that when dropped will flush
//! remaining events. If no DSN is configured (or it is invalid) the SDK
//! stays inert: every capture call is a cheap no-op and the host
//! application is never affected.
//!
//! ```no_run
//! let _guard = faultline::init("https://key@faultline.invalid/42");
//! faultline::capture_message("Hello World!", faultline::Level::Info);
//! // when the guard goes out of scope, the transport flushes
//! ```
//!
//! More complex setups pass [`ClientOptions`] (or a `(dsn, options)`
//! tuple) to [`init`]:
//!
//! ```no_run
//! let _guard = faultline::init(faultline::ClientOptions {
//!     release: faultline::release_name!(),
//!     max_breadcrumbs: 50,
//!     ..Default::default()
//! });
//! ```
//!
//! # Threading
//!
//! Every thread gets its own hub, lazily cloned from the main thread's
//! hub. Scope data configured on one thread therefore never races with
//! another thread; to hand context to a worker thread explicitly, clone
//! the hub with [`Hub::new_from_top`] and bind it with [`Hub::run`].
//!
//! Capture calls never block on the network: finished envelopes are
//! enqueued onto a bounded background worker that owns all the I/O. An
//! overloaded queue drops telemetry instead of slowing the application.
#![warn(missing_docs)]

pub use faultline_core::*;

mod defaults;
mod init;

pub use crate::defaults::apply_defaults;
pub use crate::init::{init, ClientInitGuard};

#[cfg(feature = "transport")]
pub mod transports;

/// Available integrations.
pub mod integrations {
    #[cfg(feature = "backtrace")]
    pub mod backtrace {
        //! Backtrace capture and processing.
        pub use faultline_backtrace::*;
    }
}
