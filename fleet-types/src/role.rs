//! Role tags (`mon.0`, `osd.1`, `client.0`) assigned to fleet members.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// A service role hosted by a fleet member: a service type plus an id.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Role {
    service: String,
    id: u32,
}

impl Role {
    /// Service type of the administrative client role.
    pub const CLIENT: &'static str = "client";
    /// Service type of a monitor.
    pub const MON: &'static str = "mon";
    /// Service type of a storage daemon.
    pub const OSD: &'static str = "osd";

    /// Build a role from its parts.
    pub fn new(service: impl Into<String>, id: u32) -> Self {
        Self {
            service: service.into(),
            id,
        }
    }

    /// The administrative access point role, `client.0`.
    pub fn admin() -> Self {
        Self::new(Self::CLIENT, 0)
    }

    /// Service type (`mon`, `osd`, `client`, ...).
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Numeric id within the service type.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Whether this role belongs to the given service type.
    pub fn is_service(&self, service_type: &str) -> bool {
        self.service == service_type
    }
}

impl FromStr for Role {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TypesError::InvalidRole(s.to_string());
        let (service, id) = s.trim().rsplit_once('.').ok_or_else(invalid)?;
        if service.is_empty() || !service.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(invalid());
        }
        let id = id.parse::<u32>().map_err(|_| invalid())?;
        Ok(Self::new(service, id))
    }
}

impl TryFrom<String> for Role {
    type Error = TypesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.service, self.id)
    }
}

impl fmt::Debug for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Role({})", self)
    }
}
