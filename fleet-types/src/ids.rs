//! Identity types for clusters and fleet members.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// A unique identifier for one cluster instance (the cluster's fsid).
///
/// UUID format. Simulated clusters generate a random one at creation;
/// real clusters carry the fsid they were deployed with.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClusterId(uuid::Uuid);

impl ClusterId {
    /// Create a new random ClusterId.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Build a fixed id from a number, for deployments configured with
    /// a well-known fsid.
    pub fn from_u128(value: u128) -> Self {
        Self(uuid::Uuid::from_u128(value))
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for ClusterId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for ClusterId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| TypesError::InvalidClusterId(s.to_string()))
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClusterId({})", &self.to_string()[..8])
    }
}

/// The fully qualified name of one fleet member.
///
/// Stable for the lifetime of the fleet that owns it.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentAddress(String);

impl AgentAddress {
    /// Create an address, rejecting empty names and names with whitespace.
    pub fn new(fqdn: impl Into<String>) -> Result<Self, TypesError> {
        let fqdn = fqdn.into();
        if fqdn.is_empty() || fqdn.chars().any(char::is_whitespace) {
            return Err(TypesError::InvalidAddress(fqdn));
        }
        Ok(Self(fqdn))
    }

    /// The address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The first label of the name (`node000` for `node000.cluster0.com`).
    pub fn short_name(&self) -> &str {
        self.0.split('.').next().unwrap_or(&self.0)
    }
}

impl TryFrom<String> for AgentAddress {
    type Error = TypesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AgentAddress> for String {
    fn from(value: AgentAddress) -> Self {
        value.0
    }
}

impl FromStr for AgentAddress {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for AgentAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for AgentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AgentAddress({})", self.0)
    }
}
