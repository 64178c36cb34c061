//! Cluster state: the [`cluster::ClusterApi`] capability the reconcilers
//! depend on, plus the in-process and SlateDB-backed implementations.

pub mod client;
pub mod cluster;
pub mod memory;
pub mod registry;
