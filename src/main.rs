use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use special_resource_runtime::{
    cluster::KubeClusterApi,
    config::{parse_node_selector, RuntimeConfig},
    manifest::{load_manifests, render_manifests, ContainerScope, ProxyInjector},
    runtime::{
        collect_runtime_snapshot, collect_upgrade_info, resolve_proxy, NodeLabelClusterInfo,
        RetryPolicy, RuntimeSnapshot,
    },
};
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Collect the runtime snapshot for the selected nodes
    Collect(CommonArgs),
    /// Inject the cluster proxy into the containers of a manifest file
    Inject(InjectArgs),
    /// Show per-node upgrade state for the selected nodes
    Upgrade(CommonArgs),
    /// Show version information
    Version,
}

#[derive(Parser, Debug)]
struct CommonArgs {
    /// Namespace the software stack is installed into
    #[arg(long, env = "SR_NAMESPACE", default_value = "default")]
    namespace: String,

    /// Node selector as key=value pairs separated by commas
    #[arg(long, env = "SR_NODE_SELECTOR", default_value = "")]
    node_selector: String,

    /// Attempts made to find the push secret
    #[arg(long, env = "SR_SECRET_ATTEMPTS", default_value_t = 3)]
    secret_attempts: u32,

    /// Pause between push secret attempts, in seconds
    #[arg(long, env = "SR_SECRET_RETRY_DELAY_SECS", default_value_t = 2)]
    secret_retry_delay_secs: u64,

    /// Upper bound for a single API call, in seconds
    #[arg(long, env = "SR_CALL_TIMEOUT_SECS", default_value_t = 30)]
    call_timeout_secs: u64,

    /// Inject the proxy into the first container of each workload only
    #[arg(long, env = "SR_FIRST_CONTAINER_ONLY")]
    first_container_only: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    output: OutputFormat,

    #[arg(long, env = "SR_LOG_FORMAT", value_enum, default_value_t = LogFormat::Plain)]
    log_format: LogFormat,
}

#[derive(Parser, Debug)]
struct InjectArgs {
    /// Multi-document YAML file with the rendered manifests
    file: PathBuf,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Plain,
    Json,
}

impl CommonArgs {
    fn runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        let mut config = RuntimeConfig::new(&self.namespace);
        config.node_selector = parse_node_selector(&self.node_selector)?;
        config.secret_retry = RetryPolicy::new(
            self.secret_attempts,
            Duration::from_secs(self.secret_retry_delay_secs),
        );
        config.call_timeout = Duration::from_secs(self.call_timeout_secs);
        if self.first_container_only {
            config.container_scope = ContainerScope::FirstContainerOnly;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.command {
        Commands::Version => {
            println!("sr-runtime v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Collect(common) => run_collect(common).await,
        Commands::Inject(inject) => run_inject(inject).await,
        Commands::Upgrade(common) => run_upgrade(common).await,
    }
}

fn init_tracing(format: LogFormat) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    // Logs go to stderr so stdout stays parseable
    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Plain => registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

async fn connect(config: &RuntimeConfig) -> anyhow::Result<KubeClusterApi> {
    let client = kube::Client::try_default()
        .await
        .context("failed to build Kubernetes client")?;
    info!("Connected to Kubernetes cluster");

    Ok(KubeClusterApi::new(client).with_call_timeout(config.call_timeout))
}

fn print<T: Serialize>(value: &T, format: OutputFormat) -> anyhow::Result<()> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    };
    println!("{rendered}");
    Ok(())
}

async fn run_collect(args: CommonArgs) -> anyhow::Result<()> {
    init_tracing(args.log_format);
    let config = args.runtime_config()?;
    let api = connect(&config).await?;

    let snapshot = collect_runtime_snapshot(&api, &NodeLabelClusterInfo, &config)
        .await
        .context("runtime information collection failed")?;

    print(&snapshot, args.output)
}

async fn run_upgrade(args: CommonArgs) -> anyhow::Result<()> {
    init_tracing(args.log_format);
    let config = args.runtime_config()?;
    let api = connect(&config).await?;

    let mut snapshot = RuntimeSnapshot::default();
    collect_upgrade_info(&api, &NodeLabelClusterInfo, &config.node_selector, &mut snapshot)
        .await
        .context("upgrade info collection failed")?;

    print(&snapshot.cluster_upgrade_info, args.output)
}

async fn run_inject(args: InjectArgs) -> anyhow::Result<()> {
    init_tracing(args.common.log_format);
    let config = args.common.runtime_config()?;

    let mut manifests = load_manifests(&args.file)
        .with_context(|| format!("failed to load manifests from {}", args.file.display()))?;
    let api = connect(&config).await?;

    let resolution = resolve_proxy(&api).await.context("proxy lookup failed")?;
    if resolution.is_degraded() {
        warn!(
            issues = resolution.issues.len(),
            "Proxy configuration is incomplete, missing fields are injected empty"
        );
    }

    let injected = ProxyInjector::new(&resolution.config)
        .with_scope(config.container_scope)
        .inject_all(&mut manifests)?;
    info!(manifests = manifests.len(), containers = injected, "Injected proxy environment");

    match args.common.output {
        OutputFormat::Yaml => print!("{}", render_manifests(&manifests)?),
        OutputFormat::Json => print(&manifests, OutputFormat::Json)?,
    }
    Ok(())
}
