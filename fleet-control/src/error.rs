//! Error types for fleet-control.
//!
//! Every failure a controller can report is classified as either a skip
//! (this environment cannot provide what the test asked for) or an error
//! (the environment should have worked and did not). See [`FailureKind`].

use std::time::Duration;

use fleet_types::{AgentAddress, ClusterId, ClusterShape, TypesError};

use crate::config::ConfigError;
use crate::remote::RemoteError;
use crate::targets::TargetsError;

/// How a caller should treat a failed controller call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Skip the test; the requested shape is unsatisfiable here.
    Skip,
    /// Fail the test; the environment is unusable.
    Error,
}

/// Main error type for controller operations.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// The environment cannot satisfy the requested shape.
    #[error("skipping: {reason}")]
    Skip {
        /// Why the request cannot be satisfied.
        reason: String,
    },

    /// The environment exists but could not be brought to a clean state.
    #[error("environment error: {0}")]
    Environment(String),

    /// A required invariant never became true.
    #[error("timed out after {timeout:?} waiting for {what}")]
    ConvergenceTimeout {
        /// Description of the awaited condition.
        what: String,
        /// How long we waited.
        timeout: Duration,
    },

    /// The backend can never provide the requested shape.
    #[error("unsupported configuration: requested {requested}, this backend only provides {supported}")]
    UnsupportedConfiguration {
        /// What the caller asked for.
        requested: ClusterShape,
        /// The only shape available.
        supported: ClusterShape,
    },

    /// Shape with zero servers or zero clusters.
    #[error("invalid cluster shape: {0}")]
    InvalidShape(ClusterShape),

    /// The fsid is not owned by this controller (never configured, or shut down).
    #[error("unknown cluster: {0}")]
    UnknownCluster(ClusterId),

    /// The agent does not belong to the cluster.
    #[error("unknown agent {agent} in cluster {fsid}")]
    UnknownAgent {
        /// Cluster searched.
        fsid: ClusterId,
        /// Requested agent.
        agent: AgentAddress,
    },

    /// The OSD id does not exist in the cluster.
    #[error("unknown osd.{osd_id} in cluster {fsid}")]
    UnknownOsd {
        /// Cluster searched.
        fsid: ClusterId,
        /// Requested OSD.
        osd_id: u32,
    },

    /// The cluster-state service stopped answering.
    #[error("cluster state service for {0} is not running")]
    ServiceUnavailable(ClusterId),

    /// Remote command failed.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Invalid remote target map.
    #[error("target map error: {0}")]
    Targets(#[from] TargetsError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Invalid identity or role value.
    #[error("invalid value: {0}")]
    Types(#[from] TypesError),

    /// Cluster state could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ControlError {
    /// Build a skip failure.
    pub fn skip(reason: impl Into<String>) -> Self {
        Self::Skip {
            reason: reason.into(),
        }
    }

    /// Classify this failure for the calling test.
    pub fn kind(&self) -> FailureKind {
        match self {
            ControlError::Skip { .. } => FailureKind::Skip,
            _ => FailureKind::Error,
        }
    }

    /// Shorthand for `kind() == FailureKind::Skip`.
    pub fn is_skip(&self) -> bool {
        self.kind() == FailureKind::Skip
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_skip_is_a_skip() {
        assert!(ControlError::skip("need 5 servers").is_skip());
        assert_eq!(
            ControlError::Environment("dirty".into()).kind(),
            FailureKind::Error
        );
        assert_eq!(
            ControlError::ConvergenceTimeout {
                what: "pgs active+clean".into(),
                timeout: Duration::from_secs(1),
            }
            .kind(),
            FailureKind::Error
        );
    }

    #[test]
    fn unsupported_configuration_is_not_a_skip() {
        let err = ControlError::UnsupportedConfiguration {
            requested: ClusterShape::new(4),
            supported: ClusterShape::new(3),
        };
        assert_eq!(err.kind(), FailureKind::Error);
        assert_eq!(
            err.to_string(),
            "unsupported configuration: requested 4 server(s) x 1 cluster(s), \
             this backend only provides 3 server(s) x 1 cluster(s)"
        );
    }

    #[test]
    fn remote_failures_are_errors() {
        let err: ControlError = RemoteError::CommandFailed {
            target: "ubuntu@h".into(),
            command: "ceph osd stat".into(),
            exit_code: 1,
            stderr: String::new(),
        }
        .into();
        assert_eq!(err.kind(), FailureKind::Error);
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ControlError>();
    }
}
