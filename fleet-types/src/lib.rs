//! # fleet-types
//!
//! Types shared by the fleet controllers and their callers:
//! - [`ClusterId`], [`AgentAddress`] - Identity of a cluster and of one fleet member
//! - [`Role`] - `<service>.<id>` role tags carried by remote targets
//! - [`ClusterShape`] - What a test asks a controller for
//! - [`TypesError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod role;
mod shape;

pub use error::TypesError;
pub use ids::{AgentAddress, ClusterId};
pub use role::Role;
pub use shape::ClusterShape;
