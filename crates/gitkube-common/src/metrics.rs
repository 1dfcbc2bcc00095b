//! Metrics registry for gitkube observability
//!
//! Instruments are registered on the OpenTelemetry global meter. Without a
//! meter provider installed they are no-ops, so recording is always safe.

use once_cell::sync::Lazy;
use opentelemetry::metrics::{Counter, Meter};
use opentelemetry::{global, KeyValue};

/// Global meter for gitkube metrics
static METER: Lazy<Meter> = Lazy::new(|| global::meter("gitkube"));

/// Counter of registry credential lookups that degraded to an empty dockercfg
///
/// Labels:
/// - `namespace`: namespace of the Remote
/// - `reason`: not_found, forbidden, kube, ...
pub static CREDENTIAL_LOOKUP_FAILURES: Lazy<Counter<u64>> = Lazy::new(|| {
    METER
        .u64_counter("gitkube_credential_lookup_failures_total")
        .with_description("Registry credential lookups that fell back to an empty dockercfg")
        .with_unit("{lookups}")
        .build()
});

/// Counter of configuration sync passes
///
/// Labels:
/// - `result`: unchanged, updated, restarted, error
pub static CONFIG_SYNCS: Lazy<Counter<u64>> = Lazy::new(|| {
    METER
        .u64_counter("gitkube_config_syncs_total")
        .with_description("Configuration sync passes by outcome")
        .with_unit("{syncs}")
        .build()
});

/// Counter of Deployment restarts triggered
///
/// Labels:
/// - `result`: success, error
pub static DEPLOYMENT_RESTARTS: Lazy<Counter<u64>> = Lazy::new(|| {
    METER
        .u64_counter("gitkube_deployment_restarts_total")
        .with_description("Deployment restarts triggered by gitkube")
        .with_unit("{restarts}")
        .build()
});

/// Record a credential lookup that fell back to an empty dockercfg
pub fn record_credential_lookup_failure(namespace: &str, reason: &'static str) {
    CREDENTIAL_LOOKUP_FAILURES.add(
        1,
        &[
            KeyValue::new("namespace", namespace.to_string()),
            KeyValue::new("reason", reason),
        ],
    );
}

/// Record the outcome of a configuration sync pass
pub fn record_config_sync(result: &'static str) {
    CONFIG_SYNCS.add(1, &[KeyValue::new("result", result)]);
}

/// Record the outcome of a Deployment restart
pub fn record_deployment_restart(success: bool) {
    let result = if success { "success" } else { "error" };
    DEPLOYMENT_RESTARTS.add(1, &[KeyValue::new("result", result)]);
}
