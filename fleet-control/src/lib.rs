//! # fleet-control
//!
//! Control plane for test fixtures that need a Ceph-like cluster.
//!
//! A test asks a [`FleetController`] for a [`ClusterShape`] and gets back
//! either a clean cluster or a typed skip/error, without knowing which
//! backend served it:
//! - [`EmbeddedFleetController`] - Simulated fleets of in-process agents that
//!   can be partitioned one at a time or all together
//! - [`ExternalFleetController`] - A fixed real deployment reached over
//!   `ssh`, verified clean by polling its status output
//!
//! Supporting pieces:
//! - [`poller`] - Bounded "fetch until converged" loop
//! - [`status`] - Pure parsers for the real tool's status lines
//! - [`remote`] - The "run command on host" primitive
//! - [`targets`] - The external backend's host to role map

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod controller;
pub mod embedded;
pub mod error;
pub mod external;
pub mod poller;
pub mod remote;
pub mod status;
pub mod targets;

pub use config::{Backend, Config, ConfigError};
pub use controller::{build_controller, FleetController};
pub use embedded::EmbeddedFleetController;
pub use error::{ControlError, FailureKind};
pub use external::ExternalFleetController;
pub use fleet_types::{AgentAddress, ClusterId, ClusterShape, Role};
