use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use thiserror::Error;

use crate::dsn::Dsn;
use crate::utils::datetime_to_timestamp;

/// The protocol version this library speaks.
pub const PROTOCOL_VERSION: u16 = 1;

/// Represents an auth header parsing error.
#[derive(Debug, Error)]
pub enum ParseAuthError {
    /// Raised if the auth header is not a faultline auth header.
    #[error("non faultline auth")]
    NonFaultlineAuth,
    /// Raised if the timestamp value is invalid.
    #[error("invalid value for timestamp")]
    InvalidTimestamp,
    /// Raised if the version value is invalid.
    #[error("invalid value for version")]
    InvalidVersion,
    /// Raised if the version is missing entirely.
    #[error("no valid version defined")]
    MissingVersion,
    /// Raised if the public key is missing entirely.
    #[error("missing public key in auth header")]
    MissingPublicKey,
}

/// Represents the `X-Faultline-Auth` header.
///
/// The header is recomputed for every request so that the embedded
/// timestamp bounds how long a captured request stays replayable.
#[derive(Default, Debug)]
pub struct Auth {
    timestamp: Option<f64>,
    client: Option<String>,
    version: u16,
    key: String,
}

impl Auth {
    /// Returns the unix timestamp the client defined.
    pub fn timestamp(&self) -> Option<f64> {
        self.timestamp
    }

    /// Returns the protocol version the client speaks.
    pub fn version(&self) -> u16 {
        self.version
    }

    /// Returns the public key.
    pub fn public_key(&self) -> &str {
        &self.key
    }

    /// Returns the client agent string.
    pub fn client_agent(&self) -> Option<&str> {
        self.client.as_deref()
    }
}

pub(crate) fn auth_from_dsn_and_client(dsn: &Dsn, client: Option<&str>) -> Auth {
    Auth {
        timestamp: Some(datetime_to_timestamp(&SystemTime::now())),
        client: client.map(|x| x.to_string()),
        version: PROTOCOL_VERSION,
        key: dsn.public_key().to_string(),
    }
}

impl fmt::Display for Auth {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Faultline faultline_key={}, faultline_version={}",
            self.key, self.version
        )?;
        if let Some(ts) = self.timestamp {
            write!(f, ", faultline_timestamp={ts}")?;
        }
        if let Some(ref client) = self.client {
            write!(f, ", faultline_client={client}")?;
        }
        Ok(())
    }
}

impl FromStr for Auth {
    type Err = ParseAuthError;

    fn from_str(s: &str) -> Result<Auth, ParseAuthError> {
        let mut rv = Auth::default();
        let mut base_iter = s.splitn(2, ' ');
        if !base_iter
            .next()
            .unwrap_or("")
            .eq_ignore_ascii_case("faultline")
        {
            return Err(ParseAuthError::NonFaultlineAuth);
        }
        for item in base_iter.next().unwrap_or("").split(',') {
            let mut kviter = item.trim().split('=');
            match (kviter.next(), kviter.next()) {
                (Some("faultline_timestamp"), Some(ts)) => {
                    rv.timestamp =
                        Some(ts.parse().map_err(|_| ParseAuthError::InvalidTimestamp)?);
                }
                (Some("faultline_client"), Some(client)) => {
                    rv.client = Some(client.into());
                }
                (Some("faultline_version"), Some(version)) => {
                    rv.version = version.parse().map_err(|_| ParseAuthError::InvalidVersion)?;
                }
                (Some("faultline_key"), Some(key)) => {
                    rv.key = key.into();
                }
                _ => {}
            }
        }

        if rv.key.is_empty() {
            return Err(ParseAuthError::MissingPublicKey);
        }
        if rv.version == 0 {
            return Err(ParseAuthError::MissingVersion);
        }

        Ok(rv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_parsing() {
        let auth: Auth = "Faultline faultline_timestamp=1328055286.51, \
                          faultline_client=faultline.rust/0.1.0, \
                          faultline_version=1, \
                          faultline_key=public"
            .parse()
            .unwrap();
        assert_eq!(auth.timestamp(), Some(1328055286.51));
        assert_eq!(auth.client_agent(), Some("faultline.rust/0.1.0"));
        assert_eq!(auth.version(), 1);
        assert_eq!(auth.public_key(), "public");

        assert_eq!(
            auth.to_string(),
            "Faultline faultline_key=public, \
             faultline_version=1, \
             faultline_timestamp=1328055286.51, \
             faultline_client=faultline.rust/0.1.0"
        );
    }

    #[test]
    fn test_auth_from_dsn() {
        let dsn: Dsn = "https://public@ingest.invalid/1".parse().unwrap();
        let auth = dsn.to_auth(Some("faultline.rust/0.1.0"));
        assert_eq!(auth.public_key(), "public");
        assert_eq!(auth.version(), PROTOCOL_VERSION);
        assert!(auth.timestamp().unwrap() > 0.0);
    }

    #[test]
    fn test_auth_rejects_foreign_header() {
        assert!("Bearer xyz".parse::<Auth>().is_err());
    }
}
