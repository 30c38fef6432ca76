//! This module exposes the types for the faultline protocol in
//! different versions.

pub mod v1;

mod envelope;

/// The latest version of the protocol.
pub const LATEST: u16 = 1;

/// The always latest faultline protocol version.
pub mod latest {
    pub use super::v1::*;
}
