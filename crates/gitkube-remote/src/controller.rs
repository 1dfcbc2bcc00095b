//! Configuration sync controller
//!
//! Every Remote event (and a periodic resync) triggers a full recompile of
//! the configuration. The document is published to a ConfigMap only when it
//! differs from what is stored; after a change the git server Deployment is
//! restarted so it reloads the configuration. A restart that fails after
//! the publish stays pending and is retried by later passes even though the
//! stored document already matches.
//!
//! Recompiling everything on each event keeps reconciles idempotent and
//! makes Remote deletions visible without finalizers.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::runtime::watcher::{self, Event};
use kube::runtime::WatchStreamExt;
use kube::{Api, Client, ResourceExt};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use gitkube_common::crd::Remote;
use gitkube_common::{
    metrics, Error, GITKUBED_DEPLOYMENT, GITKUBE_CONFIG_KEY, GITKUBE_CONFIG_MAP,
    GITKUBE_SYSTEM_NAMESPACE,
};

use crate::config::build_config;
use crate::restart::{restart_deployment, ConflictPolicy, WorkloadRef};
use crate::store::{ConfigMapStore, KubeStore, RemoteLister, SecretStore, WorkloadStore};

/// Where the configuration is published and which Deployment consumes it
#[derive(Clone, Debug, PartialEq)]
pub struct ControllerConfig {
    /// Namespace of the ConfigMap and the git server Deployment
    pub namespace: String,
    /// ConfigMap the document is written to
    pub config_map: String,
    /// Deployment restarted after the document changes
    pub deployment: String,
    /// Interval of full resyncs independent of watch events
    pub resync_interval: Duration,
    /// How restarts handle update conflicts
    pub conflict_policy: ConflictPolicy,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespace: GITKUBE_SYSTEM_NAMESPACE.to_string(),
            config_map: GITKUBE_CONFIG_MAP.to_string(),
            deployment: GITKUBED_DEPLOYMENT.to_string(),
            resync_interval: Duration::from_secs(300),
            conflict_policy: ConflictPolicy::Surface,
        }
    }
}

/// Shared context for the sync controller
pub struct Context {
    pub remotes: Arc<dyn RemoteLister>,
    pub secrets: Arc<dyn SecretStore>,
    pub workloads: Arc<dyn WorkloadStore>,
    pub config_maps: Arc<dyn ConfigMapStore>,
    pub config: ControllerConfig,
    /// Set once a document is published, cleared once gitkubed restarted
    restart_pending: AtomicBool,
}

impl Context {
    /// Create a context backed by the Kubernetes API
    pub fn new(client: Client, config: ControllerConfig) -> Self {
        let store = Arc::new(KubeStore::new(client));
        Self::with_stores(store.clone(), store.clone(), store.clone(), store, config)
    }

    /// Create a context over arbitrary store implementations
    pub fn with_stores(
        remotes: Arc<dyn RemoteLister>,
        secrets: Arc<dyn SecretStore>,
        workloads: Arc<dyn WorkloadStore>,
        config_maps: Arc<dyn ConfigMapStore>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            remotes,
            secrets,
            workloads,
            config_maps,
            config,
            restart_pending: AtomicBool::new(false),
        }
    }

    /// Whether a published document still waits for a gitkubed restart
    pub fn restart_pending(&self) -> bool {
        self.restart_pending.load(Ordering::SeqCst)
    }
}

/// Result of one sync pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The published document already matched
    Unchanged,
    /// The document was published and the git server restarted
    Updated,
    /// The document was already published; a pending restart completed
    Restarted,
}

impl SyncOutcome {
    fn as_label(self) -> &'static str {
        match self {
            SyncOutcome::Unchanged => "unchanged",
            SyncOutcome::Updated => "updated",
            SyncOutcome::Restarted => "restarted",
        }
    }
}

/// Recompile the configuration and publish it if it changed.
pub async fn sync_config(ctx: &Context) -> Result<SyncOutcome, Error> {
    let config = &ctx.config;
    let document = build_config(ctx.remotes.as_ref(), ctx.secrets.as_ref()).await?;

    let published = ctx
        .config_maps
        .get_config_map(&config.namespace, &config.config_map)
        .await?
        .and_then(|cm| cm.data)
        .and_then(|mut data| data.remove(GITKUBE_CONFIG_KEY));

    let outcome = if published.as_deref() == Some(document.as_str()) {
        if !ctx.restart_pending() {
            debug!(config_map = %config.config_map, "remotes config unchanged");
            return Ok(SyncOutcome::Unchanged);
        }
        info!(deployment = %config.deployment, "retrying pending gitkubed restart");
        SyncOutcome::Restarted
    } else {
        ctx.config_maps
            .apply_config_map(&config_map(config, document))
            .await?;
        ctx.restart_pending.store(true, Ordering::SeqCst);
        info!(
            namespace = %config.namespace,
            config_map = %config.config_map,
            "published remotes config"
        );
        SyncOutcome::Updated
    };

    let workload = WorkloadRef::new(&config.namespace, &config.deployment);
    restart_deployment(ctx.workloads.as_ref(), &workload, &config.conflict_policy).await?;
    ctx.restart_pending.store(false, Ordering::SeqCst);

    Ok(outcome)
}

/// Run one sync pass, logging and counting its outcome
pub async fn reconcile(ctx: &Context) -> Result<SyncOutcome, Error> {
    let result = sync_config(ctx).await;
    match &result {
        Ok(outcome) => metrics::record_config_sync(outcome.as_label()),
        Err(e) => {
            error!(reason = e.reason(), error = %e, "remotes config sync failed");
            metrics::record_config_sync("error");
        }
    }
    result
}

/// Whether a watch event can change the compiled configuration
///
/// Events of the initial listing are coalesced into `InitDone`.
pub fn triggers_sync(event: &Event<Remote>) -> bool {
    match event {
        Event::Apply(remote) | Event::Delete(remote) => {
            debug!(
                remote = %remote.name_any(),
                namespace = %remote.namespace().unwrap_or_default(),
                "remote changed"
            );
            true
        }
        Event::InitDone => true,
        Event::Init | Event::InitApply(_) => false,
    }
}

/// Watch Remotes in all namespaces and keep the configuration in sync.
///
/// Returns when the watch stream ends.
pub async fn run(ctx: Arc<Context>, remotes: Api<Remote>) {
    let mut events = remote_events(remotes).boxed();
    let mut resync = resync_timer(ctx.config.resync_interval);

    info!(
        namespace = %ctx.config.namespace,
        config_map = %ctx.config.config_map,
        "starting remotes config controller"
    );

    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(Ok(event)) if triggers_sync(&event) => {}
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    warn!(error = %e, "error watching Remotes");
                    continue;
                }
                None => {
                    warn!("Remote watch stream ended");
                    return;
                }
            },
            _ = resync.tick() => debug!("periodic remotes config resync"),
        }

        // Failures are retried on the next event or resync tick
        let _ = reconcile(&ctx).await;
    }
}

/// Interval whose first tick is one full `period` away
///
/// The initial listing (`InitDone`) runs the first pass.
fn resync_timer(period: Duration) -> Interval {
    let mut timer = tokio::time::interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer.reset();
    timer
}

fn remote_events(
    remotes: Api<Remote>,
) -> impl futures::Stream<Item = Result<Event<Remote>, watcher::Error>> + Send {
    watcher::watcher(remotes, watcher::Config::default()).default_backoff()
}

fn config_map(config: &ControllerConfig, document: String) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(config.config_map.clone()),
            namespace: Some(config.namespace.clone()),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(GITKUBE_CONFIG_KEY.to_string(), document)])),
        ..Default::default()
    }
}
