//! Custom Resource Definitions for gitkube

mod remote;

pub use remote::{
    ContainerSpec, DeploymentSpec, RegistryCredentials, RegistrySpec, Remote, RemoteSpec,
    SecretKeyRef,
};
