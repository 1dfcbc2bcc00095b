//! Remote compiler and workload restarter for gitkube
//!
//! Compiles every `Remote` visible to the controller into the single JSON
//! document the git server reads:
//! - [`naming`] qualifies remote and deployment names with their namespace
//! - [`credentials`] resolves registry push credentials from Secrets
//! - [`compiler`] turns one Remote into its configuration entry
//! - [`config`] aggregates all entries and serializes the document
//!
//! [`restart`] forces a rolling restart of a Deployment, and [`controller`]
//! ties it together: recompile on every Remote change, publish the document
//! to a ConfigMap, restart the git server when it changed.

pub mod compiler;
pub mod config;
pub mod controller;
pub mod credentials;
pub mod naming;
pub mod restart;
pub mod store;

pub use compiler::{compile_remote, ContainerEntry, RegistryEntry, RemoteEntry};
pub use config::{aggregate, build_config, ConfigDocument};
pub use restart::{restart_deployment, ConflictPolicy, WorkloadRef, RESTART_ANNOTATION};
