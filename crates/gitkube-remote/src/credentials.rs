//! Registry push credentials
//!
//! A credential that cannot be read must not keep other remotes from being
//! served: every lookup failure degrades to an empty dockercfg, is logged,
//! and is counted in `gitkube_credential_lookup_failures_total`. There is a
//! single attempt per compile pass; the next reconcile picks up fixes.

use std::fmt::Display;

use tracing::{debug, warn};

use gitkube_common::crd::{RegistrySpec, SecretKeyRef};
use gitkube_common::metrics;

use crate::store::SecretStore;

/// Resolve the dockercfg blob for `registry` in `namespace`
///
/// Registries without credentials resolve to an empty string without
/// touching the store.
pub async fn resolve_registry_credentials(
    secrets: &dyn SecretStore,
    namespace: &str,
    registry: &RegistrySpec,
) -> String {
    match registry.secret_ref() {
        Some(secret_ref) => resolve(secrets, namespace, secret_ref).await,
        None => {
            debug!(namespace = %namespace, registry = %registry.url, "registry has no credentials");
            String::new()
        }
    }
}

/// Read `secret_ref.key` of Secret `secret_ref.name` in `namespace`
///
/// Returns the value decoded as UTF-8, or an empty string when the Secret
/// cannot be fetched or lacks the key.
pub async fn resolve(
    secrets: &dyn SecretStore,
    namespace: &str,
    secret_ref: &SecretKeyRef,
) -> String {
    if secret_ref.name.is_empty() {
        debug!(namespace = %namespace, "registry credentials reference no secret");
        return String::new();
    }

    let secret = match secrets.get_secret(namespace, &secret_ref.name).await {
        Ok(secret) => secret,
        Err(e) => {
            report_lookup_failure(namespace, &secret_ref.name, e.reason(), &e);
            return String::new();
        }
    };

    match secret.data.as_ref().and_then(|data| data.get(&secret_ref.key)) {
        Some(value) => String::from_utf8_lossy(&value.0).into_owned(),
        None => {
            let detail = format!("secret has no key {}", secret_ref.key);
            report_lookup_failure(namespace, &secret_ref.name, "missing_key", &detail);
            String::new()
        }
    }
}

fn report_lookup_failure(
    namespace: &str,
    secret: &str,
    reason: &'static str,
    error: &dyn Display,
) {
    warn!(
        namespace = %namespace,
        secret = %secret,
        reason,
        error = %error,
        "registry credential lookup failed, using empty dockercfg"
    );
    metrics::record_credential_lookup_failure(namespace, reason);
}
