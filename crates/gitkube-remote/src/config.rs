//! ConfigAggregator: all Remotes → the serialized configuration document

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use gitkube_common::crd::Remote;
use gitkube_common::Error;

use crate::compiler::{compile_remote, RemoteEntry};
use crate::naming::qualify_remote;
use crate::store::{RemoteLister, SecretStore};

/// Qualified remote name → compiled entry
///
/// Serializes with keys sorted at every level, so equal documents are
/// byte-equal and can be diffed against what is already published.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigDocument(pub BTreeMap<String, RemoteEntry>);

impl ConfigDocument {
    /// Number of remotes in the document
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the document has no remotes
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entry for a qualified remote name
    pub fn get(&self, qualified_name: &str) -> Option<&RemoteEntry> {
        self.0.get(qualified_name)
    }

    /// Compact JSON; an empty document encodes as `{}`
    pub fn to_json(&self) -> Result<String, Error> {
        encode_json(self)
    }

    /// Parse a previously published document
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json)
            .map_err(|e| Error::serialization(format!("failed to decode remotes config: {e}")))
    }
}

fn encode_json<T: Serialize + ?Sized>(value: &T) -> Result<String, Error> {
    serde_json::to_string(value)
        .map_err(|e| Error::serialization(format!("failed to encode remotes config: {e}")))
}

/// Compile every Remote and collect the entries under their qualified names.
///
/// Qualified names cannot collide for distinct (namespace, name) pairs; if
/// they ever do, the later Remote wins.
pub async fn aggregate(secrets: &dyn SecretStore, remotes: &[Remote]) -> ConfigDocument {
    let mut document = ConfigDocument::default();

    for remote in remotes {
        let namespace = remote.metadata.namespace.as_deref().unwrap_or_default();
        let name = remote.metadata.name.as_deref().unwrap_or_default();
        let key = qualify_remote(namespace, name);

        let entry = compile_remote(secrets, remote).await;
        if document.0.insert(key.clone(), entry).is_some() {
            warn!(remote = %key, "duplicate qualified remote name, keeping the last one");
        }
    }

    debug!(remotes = document.len(), "aggregated remotes config");
    document
}

/// List all Remotes, compile them, and serialize the document.
///
/// A listing failure fails the whole pass: no partial document is produced.
/// An empty listing yields the valid empty document `{}`.
pub async fn build_config(
    lister: &dyn RemoteLister,
    secrets: &dyn SecretStore,
) -> Result<String, Error> {
    let remotes = lister.list_remotes().await?;
    aggregate(secrets, &remotes).await.to_json()
}
