//! The cluster shape a test requests from a controller.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Server count and cluster count requested by `configure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClusterShape {
    /// Fleet members per cluster.
    pub server_count: usize,
    /// Number of independent clusters.
    pub cluster_count: usize,
}

impl ClusterShape {
    /// One cluster of `server_count` servers.
    pub fn new(server_count: usize) -> Self {
        Self {
            server_count,
            cluster_count: 1,
        }
    }

    /// Set the number of clusters.
    pub fn clusters(mut self, cluster_count: usize) -> Self {
        self.cluster_count = cluster_count;
        self
    }

    /// Total fleet members across all clusters.
    pub fn total_servers(&self) -> usize {
        self.server_count.saturating_mul(self.cluster_count)
    }

    /// A shape with no servers or no clusters cannot be provisioned.
    pub fn is_empty(&self) -> bool {
        self.server_count == 0 || self.cluster_count == 0
    }
}

impl fmt::Display for ClusterShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} server(s) x {} cluster(s)",
            self.server_count, self.cluster_count
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_one_cluster() {
        let shape = ClusterShape::new(3);
        assert_eq!(shape.cluster_count, 1);
        assert_eq!(shape.total_servers(), 3);
    }

    #[test]
    fn total_servers_multiplies() {
        assert_eq!(ClusterShape::new(2).clusters(2).total_servers(), 4);
    }

    #[test]
    fn empty_shapes() {
        assert!(ClusterShape::new(0).is_empty());
        assert!(ClusterShape::new(3).clusters(0).is_empty());
        assert!(!ClusterShape::new(1).is_empty());
    }

    #[test]
    fn display() {
        assert_eq!(
            ClusterShape::new(3).to_string(),
            "3 server(s) x 1 cluster(s)"
        );
    }
}
