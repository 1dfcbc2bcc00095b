//! RemoteCompiler: one Remote → one configuration entry
//!
//! Entry shape, as read by the git server:
//! ```json
//! {
//!   "authorized-keys": "ssh-rsa A...\nssh-rsa B...",
//!   "deployments": {
//!     "ns1.web": { "app": { "dockerfile": "Dockerfile", "path": "/" } }
//!   },
//!   "registry": { "dockercfg": "...", "prefix": "docker.io/user" }
//! }
//! ```
//! Fields are declared in key order and nested maps are `BTreeMap`s, so the
//! serialized form is identical for identical input.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use gitkube_common::crd::{DeploymentSpec, RegistrySpec, Remote};

use crate::credentials::resolve_registry_credentials;
use crate::naming::qualify_deployment;
use crate::store::SecretStore;

/// Compiled configuration for one Remote
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Authorized keys, newline separated, in the order the Remote lists them
    #[serde(rename = "authorized-keys")]
    pub authorized_keys: String,

    /// Qualified deployment name → container name → build instructions
    pub deployments: BTreeMap<String, BTreeMap<String, ContainerEntry>>,

    /// Registry block; omitted entirely when the Remote configures none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<RegistryEntry>,
}

/// Build instructions for one container
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerEntry {
    pub dockerfile: String,
    pub path: String,
}

/// Registry block of a compiled Remote
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// dockercfg blob, empty when the credentials could not be read
    pub dockercfg: String,
    /// Image name prefix (the registry URL)
    pub prefix: String,
}

/// Compile a Remote into its configuration entry.
///
/// Cannot fail: credential lookup failures already degrade to an empty
/// dockercfg inside the resolver.
pub async fn compile_remote(secrets: &dyn SecretStore, remote: &Remote) -> RemoteEntry {
    let namespace = remote.metadata.namespace.as_deref().unwrap_or_default();

    let registry = match &remote.spec.registry {
        Some(registry) => Some(compile_registry(secrets, namespace, registry).await),
        None => None,
    };

    RemoteEntry {
        authorized_keys: join_authorized_keys(&remote.spec.authorized_keys),
        deployments: compile_deployments(namespace, &remote.spec.deployments),
        registry,
    }
}

/// Join keys with `\n`, preserving order (one key per authorized_keys line)
pub fn join_authorized_keys(keys: &[String]) -> String {
    keys.join("\n")
}

/// Fold deployments into qualified name → container name → entry.
///
/// Container names are unique per Deployment upstream; a duplicate is not
/// rejected here and the later container wins.
pub fn compile_deployments(
    namespace: &str,
    deployments: &[DeploymentSpec],
) -> BTreeMap<String, BTreeMap<String, ContainerEntry>> {
    deployments
        .iter()
        .map(|deployment| {
            let containers = deployment
                .containers
                .iter()
                .map(|c| {
                    (
                        c.name.clone(),
                        ContainerEntry {
                            dockerfile: c.dockerfile.clone(),
                            path: c.path.clone(),
                        },
                    )
                })
                .collect();
            (qualify_deployment(namespace, &deployment.name), containers)
        })
        .collect()
}

async fn compile_registry(
    secrets: &dyn SecretStore,
    namespace: &str,
    registry: &RegistrySpec,
) -> RegistryEntry {
    RegistryEntry {
        dockercfg: resolve_registry_credentials(secrets, namespace, registry).await,
        prefix: registry.url.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use gitkube_common::crd::{ContainerSpec, RemoteSpec, SecretKeyRef};
    use gitkube_common::Error;
    use k8s_openapi::api::core::v1::Secret;
    use k8s_openapi::ByteString;

    use crate::store::MockSecretStore;

    fn remote(namespace: &str, name: &str, spec: RemoteSpec) -> Remote {
        let mut remote = Remote::new(name, spec);
        remote.metadata.namespace = Some(namespace.to_string());
        remote
    }

    fn container(name: &str, path: &str, dockerfile: &str) -> ContainerSpec {
        ContainerSpec {
            name: name.to_string(),
            path: path.to_string(),
            dockerfile: dockerfile.to_string(),
        }
    }

    fn web_spec() -> RemoteSpec {
        RemoteSpec {
            authorized_keys: vec!["key1".to_string()],
            registry: None,
            deployments: vec![DeploymentSpec {
                name: "web".to_string(),
                containers: vec![container("app", "/", "Dockerfile")],
            }],
        }
    }

    #[tokio::test]
    async fn compiles_remote_without_registry() {
        let mut secrets = MockSecretStore::new();
        secrets.expect_get_secret().never();

        let entry = compile_remote(&secrets, &remote("ns1", "r1", web_spec())).await;

        assert_eq!(entry.authorized_keys, "key1");
        assert!(entry.registry.is_none());
        assert_eq!(
            entry.deployments["ns1.web"]["app"],
            ContainerEntry {
                dockerfile: "Dockerfile".to_string(),
                path: "/".to_string(),
            }
        );

        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(
            json,
            r#"{"authorized-keys":"key1","deployments":{"ns1.web":{"app":{"dockerfile":"Dockerfile","path":"/"}}}}"#
        );
    }

    #[tokio::test]
    async fn registry_with_readable_secret() {
        let mut secrets = MockSecretStore::new();
        secrets.expect_get_secret().times(1).returning(|_, _| {
            Ok(Secret {
                data: Some(BTreeMap::from([(
                    ".dockercfg".to_string(),
                    ByteString(b"cfg".to_vec()),
                )])),
                ..Default::default()
            })
        });

        let mut spec = web_spec();
        spec.registry = Some(RegistrySpec::with_credentials(
            "docker.io/user",
            SecretKeyRef::new("regsecret", ".dockercfg"),
        ));
        let entry = compile_remote(&secrets, &remote("ns1", "r1", spec)).await;

        assert_eq!(
            entry.registry,
            Some(RegistryEntry {
                dockercfg: "cfg".to_string(),
                prefix: "docker.io/user".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn failed_secret_lookup_keeps_prefix_and_empties_dockercfg() {
        let mut secrets = MockSecretStore::new();
        secrets
            .expect_get_secret()
            .returning(|ns, name| Err(Error::not_found("Secret", ns, name)));

        let mut spec = web_spec();
        spec.registry = Some(RegistrySpec::with_credentials(
            "quay.io/org",
            SecretKeyRef::new("gone", ".dockercfg"),
        ));
        let entry = compile_remote(&secrets, &remote("ns1", "r1", spec)).await;

        let registry = entry.registry.unwrap();
        assert_eq!(registry.prefix, "quay.io/org");
        assert_eq!(registry.dockercfg, "");

        // Failure must not affect the rest of the entry
        assert_eq!(entry.authorized_keys, "key1");
        assert!(entry.deployments.contains_key("ns1.web"));
    }

    #[tokio::test]
    async fn present_but_empty_registry_still_emits_block() {
        let mut secrets = MockSecretStore::new();
        secrets.expect_get_secret().never();

        let mut spec = web_spec();
        spec.registry = Some(RegistrySpec::default());
        let entry = compile_remote(&secrets, &remote("ns1", "r1", spec)).await;

        assert_eq!(entry.registry, Some(RegistryEntry::default()));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            json["registry"],
            serde_json::json!({"dockercfg": "", "prefix": ""})
        );
    }

    #[test]
    fn authorized_keys_preserve_order() {
        let keys = vec!["a".to_string(), "b".to_string()];
        assert_eq!(join_authorized_keys(&keys), "a\nb");
        assert_eq!(join_authorized_keys(&[]), "");
    }

    #[test]
    fn duplicate_container_names_last_write_wins() {
        let deployments = vec![DeploymentSpec {
            name: "web".to_string(),
            containers: vec![
                container("app", "/first", "Dockerfile.first"),
                container("app", "/second", "Dockerfile.second"),
            ],
        }];

        let compiled = compile_deployments("ns1", &deployments);
        let containers = &compiled["ns1.web"];
        assert_eq!(containers.len(), 1);
        assert_eq!(containers["app"].path, "/second");
        assert_eq!(containers["app"].dockerfile, "Dockerfile.second");
    }

    #[test]
    fn deployments_are_qualified_with_remote_namespace() {
        let deployments = vec![
            DeploymentSpec {
                name: "web".to_string(),
                containers: vec![],
            },
            DeploymentSpec {
                name: "worker".to_string(),
                containers: vec![container("job", "./job", "./job/Dockerfile")],
            },
        ];

        let compiled = compile_deployments("team-a", &deployments);
        let keys: Vec<_> = compiled.keys().cloned().collect();
        assert_eq!(keys, vec!["team-a.web", "team-a.worker"]);
        assert!(compiled["team-a.web"].is_empty());
    }
}
