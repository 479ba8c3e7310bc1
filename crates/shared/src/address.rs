//! `host:port` addresses of managed database servers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

lazy_static::lazy_static! {
    static ref HOST_PORT_REGEX: regex::Regex =
        regex::Regex::new(r"^[\w.-]+:[0-9]{1,5}$").unwrap();
}

/// Error type for address parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("'{0}' should be formatted like host:port")]
    InvalidFormat(String),
    #[error("'{0}' has a port outside 1-65535")]
    InvalidPort(String),
}

/// A server address made of a host name and a TCP port.
///
/// Host names are case-insensitive and stored lowercased, so two addresses
/// typed with different capitalisation compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HostAddress {
    name: String,
    port: u16,
}

impl HostAddress {
    pub fn new(name: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into().to_lowercase(),
            port,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl FromStr for HostAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if !HOST_PORT_REGEX.is_match(trimmed) {
            return Err(AddressError::InvalidFormat(trimmed.to_string()));
        }
        // The regex guarantees exactly one colon followed by digits.
        let (name, port) = trimmed
            .rsplit_once(':')
            .ok_or_else(|| AddressError::InvalidFormat(trimmed.to_string()))?;
        let port: u16 = port
            .parse()
            .map_err(|_| AddressError::InvalidPort(trimmed.to_string()))?;
        if port == 0 {
            return Err(AddressError::InvalidPort(trimmed.to_string()));
        }
        Ok(Self::new(name, port))
    }
}

impl TryFrom<String> for HostAddress {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HostAddress> for String {
    fn from(value: HostAddress) -> Self {
        value.to_string()
    }
}

impl fmt::Display for HostAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.port)
    }
}
