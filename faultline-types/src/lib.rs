//! This crate provides common types for working with the faultline
//! ingestion protocol: the DSN that identifies a project on an ingestion
//! host, the per-request auth header, and the protocol value types
//! (events, transactions, envelopes) that are shipped over the wire.
//!
//! The types in this crate are plain data. The actual capture pipeline
//! lives in `faultline-core`, the provided HTTP transport in the
//! `faultline` crate.
#![warn(missing_docs)]

mod auth;
mod dsn;
mod project_id;
pub mod protocol;
mod utils;

pub use crate::auth::{Auth, ParseAuthError, PROTOCOL_VERSION};
pub use crate::dsn::{Dsn, ParseDsnError, Scheme};
pub use crate::project_id::{ParseProjectIdError, ProjectId};
pub use crate::utils::{datetime_to_timestamp, timestamp_to_datetime, to_rfc3339};

pub use url::{ParseError as UrlParseError, Url};
pub use uuid::Uuid;

/// Returns a completely random (v4) uuid.
pub fn random_uuid() -> Uuid {
    Uuid::new_v4()
}
