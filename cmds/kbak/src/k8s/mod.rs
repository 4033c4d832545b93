//! Kubernetes API access using kube-rs.
//!
//! Covers the cluster connection, the catalog of kinds a backup lists, and the models of the
//! listed objects.

pub mod catalog;
pub mod client;
pub mod list;
pub mod object;
