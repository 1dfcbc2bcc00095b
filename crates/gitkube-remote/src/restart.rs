//! WorkloadRestarter: force a rolling restart of a Deployment
//!
//! Stamping the pod template with a fresh annotation value makes the
//! Deployment controller see a new template and roll every pod.

use std::collections::BTreeMap;
use std::fmt;

use chrono::Utc;
use k8s_openapi::api::apps::v1::Deployment;
use tracing::{info, warn};

use gitkube_common::metrics;
use gitkube_common::retry::{retry_if, RetryConfig};
use gitkube_common::Error;

use crate::store::WorkloadStore;

/// Pod-template annotation holding the Unix time of the last restart
pub const RESTART_ANNOTATION: &str = "gitkube/lasteventtimestamp";

/// Namespaced reference to a Deployment
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct WorkloadRef {
    pub namespace: String,
    pub name: String,
}

impl WorkloadRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for WorkloadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// What to do when the update loses an optimistic-concurrency race
#[derive(Clone, Debug, Default, PartialEq)]
pub enum ConflictPolicy {
    /// Return the conflict to the caller (one read, one update)
    #[default]
    Surface,
    /// Re-run the whole read-modify-write on conflicts only
    Retry(RetryConfig),
}

/// Restart a Deployment by stamping its pod template.
///
/// Each attempt is one read and one update. Errors other than a conflict
/// retried under [`ConflictPolicy::Retry`] are returned as-is.
pub async fn restart_deployment(
    workloads: &dyn WorkloadStore,
    workload: &WorkloadRef,
    policy: &ConflictPolicy,
) -> Result<(), Error> {
    let result = match policy {
        ConflictPolicy::Surface => restart_once(workloads, workload).await,
        ConflictPolicy::Retry(config) => {
            retry_if(config, "restart_deployment", Error::is_conflict, || {
                restart_once(workloads, workload)
            })
            .await
        }
    };

    metrics::record_deployment_restart(result.is_ok());
    match &result {
        Ok(()) => info!(deployment = %workload, "restarted deployment"),
        Err(e) => warn!(
            deployment = %workload,
            reason = e.reason(),
            error = %e,
            "failed to restart deployment"
        ),
    }
    result
}

async fn restart_once(workloads: &dyn WorkloadStore, workload: &WorkloadRef) -> Result<(), Error> {
    let mut deployment = workloads.get_deployment(workload).await?;
    stamp_restart(&mut deployment, Utc::now().timestamp())?;
    workloads.update_deployment(&deployment).await?;
    Ok(())
}

/// Set the restart annotation on the pod template to `timestamp`,
/// creating the template metadata and annotation map if absent.
pub fn stamp_restart(deployment: &mut Deployment, timestamp: i64) -> Result<(), Error> {
    let spec = deployment.spec.as_mut().ok_or_else(|| {
        Error::internal_with_context(
            "restart",
            format!(
                "deployment {} has no spec",
                deployment_name(&deployment.metadata)
            ),
        )
    })?;

    spec.template
        .metadata
        .get_or_insert_with(Default::default)
        .annotations
        .get_or_insert_with(BTreeMap::new)
        .insert(RESTART_ANNOTATION.to_string(), timestamp.to_string());
    Ok(())
}

fn deployment_name(meta: &k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta) -> String {
    format!(
        "{}/{}",
        meta.namespace.as_deref().unwrap_or_default(),
        meta.name.as_deref().unwrap_or_default()
    )
}
