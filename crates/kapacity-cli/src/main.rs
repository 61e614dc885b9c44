//! kapacity - estimate how many more replicas a Kubernetes cluster can host.
//!
//! This is the entry point for the `kapacity` binary.

mod render;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use kapacity_estimator::{
    resolve_kubeconfig, ClusterEstimator, ClusterSource, EstimateRequest, EstimatorConfig,
    EstimatorError, K8sClusterSource, ResourceAsk,
};
use tracing::{debug, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use render::{AskEcho, BuildInfo};

/// Report format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Console tables.
    Table,
    /// Pretty-printed JSON.
    Json,
}

/// kapacity - replica capacity estimator for Kubernetes clusters.
#[derive(Parser, Debug)]
#[command(name = "kapacity")]
#[command(author, about, long_about = None, disable_version_flag = true)]
struct Args {
    /// CPU request per replica: millicores ("250m") or whole cores ("2").
    #[arg(long, default_value = "100m")]
    cpureq: String,

    /// Memory request per replica: K, M, G or T (1024-based).
    #[arg(long, default_value = "1G")]
    memreq: String,

    /// CPU limit per replica: millicores ("250m") or whole cores ("2").
    #[arg(long, default_value = "100m")]
    cpulimit: String,

    /// Memory limit per replica: K, M, G or T (1024-based).
    #[arg(long, default_value = "1G")]
    memlimit: String,

    /// Number of replicas you want to deploy.
    #[arg(long, default_value_t = 1)]
    replicas: u64,

    /// Path to the kubeconfig file (defaults to $KUBECONFIG, then ~/.kube/config).
    #[arg(long)]
    kubeconfig: Option<PathBuf>,

    /// Report format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,

    /// Display version and build date, then exit.
    #[arg(long)]
    version: bool,

    /// Print an explanation of the report columns, then exit.
    #[arg(long)]
    legends: bool,

    /// Enable debug logging.
    #[arg(long, default_value = "false")]
    debug: bool,
}

impl Args {
    fn asks(&self) -> AskEcho<'_> {
        AskEcho {
            cpu_request: &self.cpureq,
            memory_request: &self.memreq,
            cpu_limit: &self.cpulimit,
            memory_limit: &self.memlimit,
        }
    }

    fn estimate_request(&self) -> kapacity_estimator::Result<EstimateRequest> {
        let request = ResourceAsk::parse(&self.cpureq, &self.memreq)?;
        let limit = ResourceAsk::parse(&self.cpulimit, &self.memlimit)?;

        for (flag, raw, bytes) in [
            ("--memreq", &self.memreq, request.memory_bytes),
            ("--memlimit", &self.memlimit, limit.memory_bytes),
        ] {
            if bytes == 0 {
                warn!(flag, value = %raw, "Memory quantity not understood, using 0");
            }
        }

        Ok(EstimateRequest {
            request,
            limit,
            replicas: self.replicas,
        })
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.debug);

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            let code = err
                .downcast_ref::<EstimatorError>()
                .map_or(1, EstimatorError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn init_tracing(debug: bool) {
    let default_filter = if debug { "kapacity=debug,warn" } else { "warn" };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(args: &Args) -> anyhow::Result<()> {
    if args.version {
        print!("{}", render::version(&BuildInfo::current()));
        return Ok(());
    }
    if args.legends {
        print!("{}", render::legends());
        return Ok(());
    }

    let request = args.estimate_request()?;
    let source = connect(args.kubeconfig.clone()).await?;
    let output = estimate(source, EstimatorConfig::from_env(), &request, args).await?;
    print!("{output}");

    Ok(())
}

async fn connect(explicit: Option<PathBuf>) -> anyhow::Result<K8sClusterSource> {
    let explicit_given = explicit.is_some();

    match resolve_kubeconfig(explicit) {
        Some(path) if explicit_given || path.is_file() => {
            debug!(path = %path.display(), "Loading kubeconfig");
            Ok(K8sClusterSource::from_kubeconfig(&path).await?)
        }
        _ => {
            debug!("No kubeconfig file found, inferring cluster configuration");
            Ok(K8sClusterSource::new().await?)
        }
    }
}

async fn estimate<S: ClusterSource>(
    source: S,
    config: EstimatorConfig,
    request: &EstimateRequest,
    args: &Args,
) -> anyhow::Result<String> {
    let estimator = ClusterEstimator::new(source, config)?;
    let report = estimator.estimate(request).await?;

    Ok(match args.output {
        OutputFormat::Table => render::report(&report, &args.asks()),
        OutputFormat::Json => format!("{}\n", render::json(&report)?),
    })
}
