//! Mock Kubernetes API server for testing.
//!
//! Provides a read-only HTTP server that can be used with kubeconfig-based connections.

pub mod discovery;
pub mod http;

pub use discovery::{DiscoveryMode, MockApiResource, MockDiscovery};
pub use http::{HttpMockK8sServer, MockFailure, RunningHttpMockK8sServer};
