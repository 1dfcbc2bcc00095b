//! Narrow store interfaces over the Kubernetes API
//!
//! The compiler and restarter only ever list Remotes, read Secrets, and
//! read-modify-write Deployments; the controller additionally reads and
//! applies one ConfigMap. Each concern is a small trait so tests can mock it,
//! and [`KubeStore`] implements all of them over a `kube::Client`.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::api::{Api, ListParams, Patch, PatchParams, PostParams};
use kube::Client;

#[cfg(test)]
use mockall::automock;

use gitkube_common::crd::Remote;
use gitkube_common::{Error, FIELD_MANAGER};

use crate::restart::WorkloadRef;

/// Lists every Remote visible to the controller
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RemoteLister: Send + Sync {
    /// List Remotes across all namespaces
    ///
    /// Fails when the API server cannot be reached; callers must not treat
    /// that as an empty list.
    async fn list_remotes(&self) -> Result<Vec<Remote>, Error>;
}

/// Reads Secrets referenced by Remotes
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Get a Secret, failing with `NotFound`, `Forbidden` or `Kube`
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, Error>;
}

/// Reads and updates the Deployments gitkube restarts
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WorkloadStore: Send + Sync {
    /// Get the current state of a Deployment
    async fn get_deployment(&self, workload: &WorkloadRef) -> Result<Deployment, Error>;

    /// Replace a Deployment
    ///
    /// The object's `resourceVersion` is sent along, so a concurrent write
    /// since it was read fails with `Conflict`.
    async fn update_deployment(&self, deployment: &Deployment) -> Result<Deployment, Error>;
}

/// Reads and writes the ConfigMap holding the compiled configuration
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConfigMapStore: Send + Sync {
    /// Get a ConfigMap, or None if it does not exist yet
    async fn get_config_map(&self, namespace: &str, name: &str)
        -> Result<Option<ConfigMap>, Error>;

    /// Create or update a ConfigMap with server-side apply
    async fn apply_config_map(&self, config_map: &ConfigMap) -> Result<(), Error>;
}

/// Real Kubernetes store implementation
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    /// Create a new KubeStore wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RemoteLister for KubeStore {
    async fn list_remotes(&self) -> Result<Vec<Remote>, Error> {
        let api: Api<Remote> = Api::all(self.client.clone());
        let remotes = api
            .list(&ListParams::default())
            .await
            .map_err(list_error)?;
        Ok(remotes.items)
    }
}

#[async_trait]
impl SecretStore for KubeStore {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, Error> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        api.get(name)
            .await
            .map_err(|e| Error::from_kube(e, "Secret", namespace, name))
    }
}

#[async_trait]
impl WorkloadStore for KubeStore {
    async fn get_deployment(&self, workload: &WorkloadRef) -> Result<Deployment, Error> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), &workload.namespace);
        api.get(&workload.name)
            .await
            .map_err(|e| Error::from_kube(e, "Deployment", &workload.namespace, &workload.name))
    }

    async fn update_deployment(&self, deployment: &Deployment) -> Result<Deployment, Error> {
        let namespace = deployment.metadata.namespace.as_deref().ok_or_else(|| {
            Error::internal_with_context("update_deployment", "deployment has no namespace")
        })?;
        let name = deployment.metadata.name.as_deref().ok_or_else(|| {
            Error::internal_with_context("update_deployment", "deployment has no name")
        })?;

        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        api.replace(name, &PostParams::default(), deployment)
            .await
            .map_err(|e| Error::from_kube(e, "Deployment", namespace, name))
    }
}

#[async_trait]
impl ConfigMapStore for KubeStore {
    async fn get_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ConfigMap>, Error> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(cm) => Ok(Some(cm)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(Error::from_kube(e, "ConfigMap", namespace, name)),
        }
    }

    async fn apply_config_map(&self, config_map: &ConfigMap) -> Result<(), Error> {
        let namespace = config_map.metadata.namespace.as_deref().ok_or_else(|| {
            Error::internal_with_context("apply_config_map", "config map has no namespace")
        })?;
        let name = config_map.metadata.name.as_deref().ok_or_else(|| {
            Error::internal_with_context("apply_config_map", "config map has no name")
        })?;

        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        api.patch(
            name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(config_map),
        )
        .await
        .map_err(|e| Error::from_kube(e, "ConfigMap", namespace, name))?;
        Ok(())
    }
}

/// Classify a failed cluster-wide Remote listing
fn list_error(err: kube::Error) -> Error {
    Error::from_kube(err, "Remote", "", "")
}
