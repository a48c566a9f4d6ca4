//! Static host to role map for a real deployment.
//!
//! Keys are `user@host` ssh targets, values the ordered role tags that host
//! carries. Exactly one target must carry the admin role (`client.0`); all
//! cluster-wide commands are run there.

use std::collections::BTreeMap;

use fleet_types::{AgentAddress, Role, TypesError};

/// Errors from building a target map.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TargetsError {
    /// Key is not of the form `user@host`.
    #[error("invalid target {0:?}: expected user@host")]
    InvalidTarget(String),

    /// Malformed role tag or host name.
    #[error("invalid entry for {target}: {source}")]
    InvalidEntry {
        /// Offending target.
        target: String,
        /// Parse failure.
        source: TypesError,
    },

    /// No target carries the admin role.
    #[error("no target carries the {0} role")]
    MissingAdmin(Role),

    /// More than one target carries the admin role.
    #[error("{role} is assigned to more than one target: {targets:?}")]
    DuplicateAdmin {
        /// The admin role.
        role: Role,
        /// Every target carrying it.
        targets: Vec<String>,
    },
}

/// One remote machine: how to reach it and what it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    user: String,
    host: AgentAddress,
    roles: Vec<Role>,
}

impl RemoteTarget {
    /// `user@host`, as passed to the remote executor.
    pub fn ssh_target(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    /// Login user.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Host name.
    pub fn host(&self) -> &AgentAddress {
        &self.host
    }

    /// Roles in declaration order.
    pub fn roles(&self) -> &[Role] {
        &self.roles
    }
}

/// Immutable `user@host` → roles mapping with exactly one admin target.
#[derive(Debug, Clone)]
pub struct RemoteTargetMap {
    targets: Vec<RemoteTarget>,
    admin: usize,
}

impl RemoteTargetMap {
    /// Build from raw `user@host` → role tag lists, using `admin_role` as
    /// the administrative access point.
    pub fn from_raw(
        raw: &BTreeMap<String, Vec<String>>,
        admin_role: &Role,
    ) -> Result<Self, TargetsError> {
        let mut targets = Vec::with_capacity(raw.len());
        for (key, tags) in raw {
            let (user, host) = key
                .split_once('@')
                .filter(|(u, h)| !u.is_empty() && !h.is_empty())
                .ok_or_else(|| TargetsError::InvalidTarget(key.clone()))?;
            let invalid = |source| TargetsError::InvalidEntry {
                target: key.clone(),
                source,
            };
            let host = AgentAddress::new(host).map_err(invalid)?;
            let roles = tags
                .iter()
                .map(|t| t.parse::<Role>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(invalid)?;
            targets.push(RemoteTarget {
                user: user.to_string(),
                host,
                roles,
            });
        }

        let admins: Vec<usize> = targets
            .iter()
            .enumerate()
            .filter(|(_, t)| t.roles.contains(admin_role))
            .map(|(i, _)| i)
            .collect();

        match admins.as_slice() {
            [admin] => Ok(Self {
                admin: *admin,
                targets,
            }),
            [] => Err(TargetsError::MissingAdmin(admin_role.clone())),
            many => Err(TargetsError::DuplicateAdmin {
                role: admin_role.clone(),
                targets: many.iter().map(|&i| targets[i].ssh_target()).collect(),
            }),
        }
    }

    /// All targets, ordered by `user@host`.
    pub fn targets(&self) -> &[RemoteTarget] {
        &self.targets
    }

    /// The target administrative commands are sent to.
    pub fn admin(&self) -> &RemoteTarget {
        &self.targets[self.admin]
    }

    /// Every host name.
    pub fn hosts(&self) -> Vec<AgentAddress> {
        self.targets.iter().map(|t| t.host.clone()).collect()
    }

    /// Number of targets.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether the map has no targets. Never true for a built map.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// The known three-node lab deployment.
pub fn default_targets() -> BTreeMap<String, Vec<String>> {
    let entry = |target: &str, roles: &[&str]| {
        (
            target.to_string(),
            roles.iter().map(|r| r.to_string()).collect::<Vec<_>>(),
        )
    };
    BTreeMap::from([
        entry(
            "ubuntu@mira002.front.sepia.ceph.com",
            &["mon.0", "osd.0", "client.0"],
        ),
        entry("ubuntu@mira028.front.sepia.ceph.com", &["mon.1", "osd.1"]),
        entry("ubuntu@mira043.front.sepia.ceph.com", &["mon.2", "osd.3"]),
    ])
}
