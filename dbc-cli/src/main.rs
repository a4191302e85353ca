//! dbc: plan and simulate database cluster reconciliation.
//!
//! `dbc plan` prints the operations needed to converge an observed cluster
//! onto a desired spec. `dbc simulate` runs a full lifecycle against an
//! in-memory control plane that applies mutations with a delay.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dbc_engine::{
    ClusterLifecycle, ClusterObserved, ClusterSpec, EngineConfig, SimulatedCloud, plan,
};
use serde::de::DeserializeOwned;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "dbc", version)]
#[command(about = "Plan and simulate database cluster reconciliation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the plan converging an observed cluster onto a desired spec
    Plan {
        /// Desired cluster spec (JSON)
        #[arg(long)]
        desired: PathBuf,

        /// Observed cluster state (JSON)
        #[arg(long)]
        observed: PathBuf,
    },

    /// Create, optionally update and delete a cluster against a simulated cloud
    Simulate {
        /// Cluster spec to create (JSON)
        #[arg(long)]
        spec: PathBuf,

        /// Spec to converge onto after create (JSON)
        #[arg(long)]
        update: Option<PathBuf>,

        /// Delete the cluster at the end
        #[arg(long)]
        delete: bool,

        /// Status fetches a cluster stays transitional after each mutation
        #[arg(long, default_value = "2")]
        settle_polls: u32,

        #[command(flatten)]
        timing: Timing,
    },
}

#[derive(Args, Debug)]
struct Timing {
    /// Create timeout in seconds
    #[arg(long)]
    create_timeout: Option<u64>,

    /// Update timeout in seconds (defaults to the create timeout)
    #[arg(long)]
    update_timeout: Option<u64>,

    /// Delete timeout in seconds
    #[arg(long)]
    delete_timeout: Option<u64>,

    /// Delay between status polls in seconds
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Lower bound on the poll delay in seconds
    #[arg(long)]
    min_poll_interval: Option<u64>,
}

impl Timing {
    fn config(&self) -> EngineConfig {
        let mut config = EngineConfig::default();
        if let Some(secs) = self.create_timeout {
            config = config.with_create_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.update_timeout {
            config = config.with_update_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.delete_timeout {
            config = config.with_delete_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.poll_interval {
            config = config.with_poll_interval(Duration::from_secs(secs));
        }
        if let Some(secs) = self.min_poll_interval {
            config = config.with_min_poll_interval(Duration::from_secs(secs));
        }
        config
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn simulate(
    spec: &Path,
    update: Option<&Path>,
    delete: bool,
    settle_polls: u32,
    config: EngineConfig,
) -> Result<()> {
    let spec: ClusterSpec = read_json(spec)?;
    let desired: Option<ClusterSpec> = update.map(read_json::<ClusterSpec>).transpose()?;

    let cloud = Arc::new(SimulatedCloud::new(settle_polls));
    let lifecycle = ClusterLifecycle::new(Arc::clone(&cloud), config);

    let (id, cluster) = lifecycle
        .create(&spec)
        .await
        .context("create failed")?;
    print_json(&cluster)?;

    if let Some(desired) = desired {
        let cluster = lifecycle
            .update(&id, &desired)
            .await
            .context("update failed")?;
        print_json(&cluster)?;
    }

    if delete {
        lifecycle.delete(&id).await.context("delete failed")?;
    }

    info!("Mutations issued: {:?}", cloud.mutations().await);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dbc=info,dbc_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Plan { desired, observed } => {
            let desired: ClusterSpec = read_json(&desired)?;
            let observed: ClusterObserved = read_json(&observed)?;
            let plan = plan(&desired, &observed).context("plan rejected")?;
            info!("Planned {} operations {:?}", plan.len(), plan.summary());
            print_json(&plan)?;
        }
        Commands::Simulate {
            spec,
            update,
            delete,
            settle_polls,
            timing,
        } => {
            simulate(
                &spec,
                update.as_deref(),
                delete,
                settle_polls,
                timing.config(),
            )
            .await?;
        }
    }

    Ok(())
}
