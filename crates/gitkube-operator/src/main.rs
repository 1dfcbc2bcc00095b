//! gitkube operator - compiles Remotes into the git server configuration

use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use kube::{Api, Client, CustomResourceExt};

use gitkube_common::crd::Remote;
use gitkube_common::retry::RetryConfig;
use gitkube_common::telemetry::{init_telemetry, TelemetryConfig};
use gitkube_common::{
    FIELD_MANAGER, GITKUBED_DEPLOYMENT, GITKUBE_CONFIG_MAP, GITKUBE_SYSTEM_NAMESPACE,
};
use gitkube_remote::controller::{self, Context, ControllerConfig};
use gitkube_remote::ConflictPolicy;

/// gitkube - git push to deploy on Kubernetes
#[derive(Parser, Debug)]
#[command(name = "gitkube-operator", version, about, long_about = None)]
struct Cli {
    /// Print the Remote CRD manifest and exit
    #[arg(long)]
    crd: bool,

    /// Log human-readable text instead of JSON
    #[arg(long, global = true)]
    text_logs: bool,

    // Controller settings when no subcommand is given
    #[command(flatten)]
    controller: ControllerArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the remotes config controller (default mode)
    ///
    /// Watches Remote resources in all namespaces, publishes the compiled
    /// configuration to a ConfigMap and restarts gitkubed when it changes.
    Controller(ControllerArgs),
}

#[derive(Args, Debug, Clone)]
struct ControllerArgs {
    /// Namespace of the configuration ConfigMap and the gitkubed Deployment
    #[arg(long, env = "GITKUBE_NAMESPACE", default_value = GITKUBE_SYSTEM_NAMESPACE)]
    namespace: String,

    /// ConfigMap the remotes configuration is written to
    #[arg(long, env = "GITKUBE_CONFIG_MAP", default_value = GITKUBE_CONFIG_MAP)]
    config_map: String,

    /// Deployment restarted after the configuration changes
    #[arg(long, env = "GITKUBE_DEPLOYMENT", default_value = GITKUBED_DEPLOYMENT)]
    deployment: String,

    /// Seconds between full resyncs
    #[arg(long, env = "GITKUBE_RESYNC_SECONDS", default_value_t = 300)]
    resync_seconds: u64,

    /// Attempts for a restart that hits an update conflict (1 = no retry)
    #[arg(long, env = "GITKUBE_RESTART_ATTEMPTS", default_value_t = 1)]
    restart_attempts: u32,

    /// Do not install or update the Remote CRD on startup
    #[arg(long)]
    skip_crd_install: bool,
}

impl From<&ControllerArgs> for ControllerConfig {
    fn from(args: &ControllerArgs) -> Self {
        let conflict_policy = if args.restart_attempts > 1 {
            ConflictPolicy::Retry(RetryConfig::with_max_attempts(args.restart_attempts))
        } else {
            ConflictPolicy::Surface
        };

        Self {
            namespace: args.namespace.clone(),
            config_map: args.config_map.clone(),
            deployment: args.deployment.clone(),
            resync_interval: Duration::from_secs(args.resync_seconds.max(1)),
            conflict_policy,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        let crd = serde_yaml::to_string(&Remote::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    init_telemetry(TelemetryConfig {
        service_name: "gitkube-operator".to_string(),
        json: !cli.text_logs,
    })?;

    run_controller(cli.controller_args()).await
}

impl Cli {
    /// Settings of the `controller` subcommand, or the top-level ones
    fn controller_args(self) -> ControllerArgs {
        match self.command {
            Some(Commands::Controller(args)) => args,
            None => self.controller,
        }
    }
}

/// Install or update the Remote CRD with server-side apply
async fn ensure_crd_installed(client: &Client) -> anyhow::Result<()> {
    use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
    use kube::api::{Patch, PatchParams};

    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();

    tracing::info!("Installing Remote CRD...");
    crds.patch(Remote::crd_name(), &params, &Patch::Apply(&Remote::crd()))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to install Remote CRD: {}", e))?;

    Ok(())
}

async fn run_controller(args: ControllerArgs) -> anyhow::Result<()> {
    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    if !args.skip_crd_install {
        ensure_crd_installed(&client).await?;
    }

    let config = ControllerConfig::from(&args);
    let ctx = Arc::new(Context::new(client.clone(), config));
    let remotes: Api<Remote> = Api::all(client);

    tokio::select! {
        _ = controller::run(ctx, remotes) => {
            anyhow::bail!("remotes config controller stopped unexpectedly");
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("Received shutdown signal, exiting");
        }
    }

    Ok(())
}
