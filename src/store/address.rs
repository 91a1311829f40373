//! Backend address parsing.
//!
//! Accepts the plain connect-string form `host:port[/db]` and the URL form
//! `redis://host:port[/db]`. An empty host (`:6379`) means the local machine.

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::store::StoreError;

const DEFAULT_PORT: u16 = 6379;
const LOCALHOST: &str = "127.0.0.1";

/// A parsed backend location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendAddress {
    raw: String,
    host: String,
    port: u16,
    db: Option<i64>,
}

impl BackendAddress {
    /// Host name or IP to dial.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port to dial.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Database index selected on every new connection.
    pub fn db(&self) -> Option<i64> {
        self.db
    }

    /// The address exactly as configured.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    fn parse_url(raw: &str) -> Result<Self, StoreError> {
        let invalid = || StoreError::InvalidAddress(raw.to_string());
        let url = Url::parse(raw).map_err(|_| invalid())?;
        let host = url.host_str().filter(|h| !h.is_empty()).ok_or_else(invalid)?;
        let db = parse_db(url.path().trim_start_matches('/')).ok_or_else(invalid)?;

        Ok(Self {
            raw: raw.to_string(),
            host: host.to_string(),
            port: url.port().unwrap_or(DEFAULT_PORT),
            db,
        })
    }

    fn parse_plain(raw: &str) -> Result<Self, StoreError> {
        let invalid = || StoreError::InvalidAddress(raw.to_string());
        let (endpoint, db) = match raw.split_once('/') {
            Some((endpoint, db)) => (endpoint, parse_db(db).ok_or_else(invalid)?),
            None => (raw, None),
        };
        let (host, port) = endpoint.rsplit_once(':').ok_or_else(invalid)?;
        let port: u16 = port.parse().map_err(|_| invalid())?;
        let host = if host.is_empty() { LOCALHOST } else { host };

        Ok(Self {
            raw: raw.to_string(),
            host: host.to_string(),
            port,
            db,
        })
    }
}

/// `""` means no database; anything else must be a non-negative index.
fn parse_db(segment: &str) -> Option<Option<i64>> {
    if segment.is_empty() {
        return Some(None);
    }
    match segment.parse::<i64>() {
        Ok(db) if db >= 0 => Some(Some(db)),
        _ => None,
    }
}

impl FromStr for BackendAddress {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with("redis://") {
            Self::parse_url(s)
        } else {
            Self::parse_plain(s)
        }
    }
}

impl fmt::Display for BackendAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
