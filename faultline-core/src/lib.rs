//! This crate provides the core of the faultline SDK: the hub/scope/client
//! triad that tracks per-thread execution context, the event construction
//! and sanitization pipeline, the sampling logic, and the transport traits
//! that connect the pipeline to the network boundary.
//!
//! `faultline-core` is meant for integration authors and third-party
//! library authors that want to instrument their code. Applications should
//! instead use the [`faultline`](https://docs.rs/faultline) crate, which
//! comes with a default transport and environment-driven defaults.
//!
//! # Core Concepts
//!
//! The [`Client`] owns the configuration and the transport. The [`Hub`]
//! owns one client and one [`Scope`] per logical execution context; every
//! thread lazily receives its own hub cloned from the main hub, so scope
//! mutations never need cross-thread locking on the hot path.
//!
//! Nothing in this crate ever propagates a failure into the host
//! application: capture errors are logged through [`faultline_debug!`]
//! and swallowed.
#![warn(missing_docs)]

#[macro_use]
mod macros;

mod api;
mod breadcrumbs;
mod client;
mod clientoptions;
mod constants;
mod error;
mod hub;
mod hub_impl;
mod integration;
mod intodsn;
pub mod performance;
pub mod processors;
mod scope;
mod transport;

#[cfg(feature = "test")]
pub mod test;

pub use crate::api::*;
pub use crate::breadcrumbs::IntoBreadcrumbs;
pub use crate::client::Client;
pub use crate::clientoptions::{BeforeCallback, ClientOptions, ShouldCapture, TracesSampler};
pub use crate::error::{capture_error, event_from_error, exception_from_error};
pub use crate::hub::Hub;
pub use crate::hub_impl::SwitchGuard;
pub use crate::integration::Integration;
pub use crate::intodsn::IntoDsn;
pub use crate::performance::{
    start_transaction, PropagatedTrace, Span, TraceHeader, TraceHeadersIter, Transaction,
    TransactionContext, TransactionOrSpan,
};
pub use crate::processors::EventProcessor;
pub use crate::scope::{Scope, ScopeGuard};
pub use crate::transport::{LostEventLog, Transport, TransportFactory};

/// The faultline protocol.
pub mod protocol {
    pub use faultline_types::protocol::latest::*;
}

/// Types used by the protocol and configuration surface.
pub mod types {
    pub use faultline_types::*;
}

pub use crate::protocol::{Breadcrumb, Envelope, Level, User};
pub use crate::types::Uuid;

use std::sync::atomic::{AtomicBool, Ordering};

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

pub(crate) fn set_debug_enabled(enabled: bool) {
    DEBUG_ENABLED.store(enabled, Ordering::Relaxed);
}

/// Whether internal debug output is enabled.
#[doc(hidden)]
pub fn debug_enabled() -> bool {
    DEBUG_ENABLED.load(Ordering::Relaxed)
}
