//! Common types for gitkube: the Remote CRD, errors, and utilities

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod metrics;
pub mod retry;
pub mod telemetry;

pub use error::Error;

/// Namespace where the git server and its configuration live
pub const GITKUBE_SYSTEM_NAMESPACE: &str = "kube-system";

/// ConfigMap holding the compiled remotes configuration
pub const GITKUBE_CONFIG_MAP: &str = "gitkube-ci-conf";

/// Data key inside the configuration ConfigMap
pub const GITKUBE_CONFIG_KEY: &str = "remotes.json";

/// Deployment running the git server that consumes the configuration
pub const GITKUBED_DEPLOYMENT: &str = "gitkubed";

/// Field manager / reporting component name used for API writes
pub const FIELD_MANAGER: &str = "gitkube-controller";
