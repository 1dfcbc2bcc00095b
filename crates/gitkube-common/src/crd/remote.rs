//! Remote CRD: a git-push deployment target
//!
//! A Remote lists the SSH keys allowed to push, the Deployments that get
//! rebuilt from the pushed tree, and optionally the image registry the built
//! images are pushed to.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Remote describes a git remote that builds and rolls out Deployments on push.
///
/// Example:
/// ```yaml
/// apiVersion: gitkube.sh/v1alpha1
/// kind: Remote
/// metadata:
///   name: example
///   namespace: default
/// spec:
///   authorizedKeys:
///     - ssh-rsa AAAA...
///   registry:
///     url: docker.io/user
///     credentials:
///       secretKeyRef:
///         name: regsecret
///         key: .dockerconfigjson
///   deployments:
///     - name: www
///       containers:
///         - name: www
///           path: ./www
///           dockerfile: ./www/Dockerfile
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "gitkube.sh",
    version = "v1alpha1",
    kind = "Remote",
    namespaced,
    printcolumn = r#"{"name":"Registry","type":"string","jsonPath":".spec.registry.url"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSpec {
    /// SSH public keys allowed to push, one entry per line of authorized_keys
    #[serde(default)]
    pub authorized_keys: Vec<String>,

    /// Image registry for built images; absent means images stay local
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<RegistrySpec>,

    /// Deployments rebuilt from the pushed tree
    #[serde(default)]
    pub deployments: Vec<DeploymentSpec>,
}

/// A Deployment in the Remote's namespace and the containers built for it
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSpec {
    /// Deployment name
    pub name: String,

    /// Containers of the Deployment whose images are built on push
    #[serde(default)]
    pub containers: Vec<ContainerSpec>,
}

/// Build instructions for one container image
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    /// Container name inside the Deployment's pod template
    pub name: String,

    /// Build context path inside the repository
    #[serde(default)]
    pub path: String,

    /// Dockerfile path inside the repository
    #[serde(default)]
    pub dockerfile: String,
}

/// Image registry the built images are pushed to
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySpec {
    /// Registry URL used as the image name prefix (e.g. "docker.io/user")
    #[serde(default)]
    pub url: String,

    /// Credentials for pushing; absent for registries that accept anonymous pushes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<RegistryCredentials>,
}

/// Where registry push credentials are stored
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegistryCredentials {
    /// Secret key holding a dockercfg blob
    pub secret_key_ref: SecretKeyRef,
}

/// Reference to a single key of a Secret in the Remote's namespace
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct SecretKeyRef {
    /// Secret name
    pub name: String,

    /// Key within the Secret's data
    pub key: String,
}

impl SecretKeyRef {
    /// Create a reference to `key` of Secret `name`
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
        }
    }
}

impl RegistrySpec {
    /// Registry whose push credentials live in `secret_ref`
    pub fn with_credentials(url: impl Into<String>, secret_ref: SecretKeyRef) -> Self {
        Self {
            url: url.into(),
            credentials: Some(RegistryCredentials {
                secret_key_ref: secret_ref,
            }),
        }
    }

    /// The Secret reference, if credentials are configured
    pub fn secret_ref(&self) -> Option<&SecretKeyRef> {
        self.credentials.as_ref().map(|c| &c.secret_key_ref)
    }
}
