// Copyright (c) 2025 - Cowboy AI, Inc.
//! Topology Renderer
//!
//! Reads a topology file (JSON: one context or a list of contexts), builds
//! every context, and prints the compiled templates.
//!
//! With `--simulate` each context is also deployed against the in-memory
//! backend, server addresses are printed, and every stack is deleted again.
//! With the `heat` feature and `HEAT_ENDPOINT` set, the real orchestration
//! service is used instead.
//!
//! Run with: cargo run --bin topology-render -- topology.json [--simulate]
//!
//! Environment:
//! - TOPOLOGY_FILE: topology path when none is given on the command line
//! - STACK_POLL_SECS: status poll interval (default 2)
//! - HEAT_ENDPOINT / OS_AUTH_TOKEN: orchestration service (feature `heat`)

use anyhow::{bail, Context as _, Result};
use serde::Deserialize;
use stack_topology::compiler::{compile, placement_order};
use stack_topology::config::{ContextConfig, DeployConfig};
use stack_topology::domain::{TopologyObject, TopologyRegistry};
use stack_topology::stack::{OrchestrationBackend, SimulatedBackend, StackManager};
use std::time::Duration;
use tracing::{error, info, warn};

/// Topology document shape
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TopologyFile {
    Many(Vec<ContextConfig>),
    One(Box<ContextConfig>),
}

/// Configuration for one run
#[derive(Debug, Clone)]
struct RenderConfig {
    topology_file: String,
    simulate: bool,
    deploy: DeployConfig,
}

impl RenderConfig {
    /// Load configuration from arguments and environment variables
    fn from_env() -> Result<Self> {
        let mut topology_file = None;
        let mut simulate = false;
        for arg in std::env::args().skip(1) {
            match arg.as_str() {
                "--simulate" => simulate = true,
                flag if flag.starts_with("--") => bail!("unknown option {}", flag),
                path => topology_file = Some(path.to_string()),
            }
        }
        let topology_file = match topology_file {
            Some(path) => path,
            None => std::env::var("TOPOLOGY_FILE")
                .context("no topology file given and TOPOLOGY_FILE not set")?,
        };

        let mut deploy = DeployConfig::default();
        if let Ok(secs) = std::env::var("STACK_POLL_SECS") {
            let secs: u64 = secs.parse().context("STACK_POLL_SECS must be a number of seconds")?;
            deploy.poll_interval = Duration::from_secs(secs);
        }

        Ok(Self {
            topology_file,
            simulate,
            deploy,
        })
    }
}

fn load_topology(path: &str) -> Result<Vec<ContextConfig>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
    let file: TopologyFile =
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path))?;
    Ok(match file {
        TopologyFile::Many(contexts) => contexts,
        TopologyFile::One(context) => vec![*context],
    })
}

async fn deploy_all<B: OrchestrationBackend>(
    registry: &mut TopologyRegistry,
    manager: StackManager<B>,
) -> Result<()> {
    let token = manager.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping deployment");
            token.cancel();
        }
    });

    for context in registry.contexts_mut() {
        if let Err(err) = context.deploy(&manager).await {
            error!(context = %context.name(), error = %err, "Deployment failed");
            if let Err(cleanup) = manager.delete_all().await {
                error!(error = %cleanup, "Cleanup incomplete");
            }
            return Err(err).with_context(|| format!("Failed to deploy context {}", context.name()));
        }
    }

    for context in registry.contexts() {
        for server in context.servers() {
            let dn = server.dn();
            if let Some(info) = registry.server_info(&dn) {
                println!("{} {}", dn, serde_json::to_string_pretty(&info)?);
            }
        }
    }

    manager.delete_all().await.context("Failed to delete stacks")?;
    info!("All stacks deleted");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = RenderConfig::from_env()?;
    info!("Rendering topology from {}", config.topology_file);

    let mut registry = TopologyRegistry::new();
    for context_config in load_topology(&config.topology_file)? {
        let context = registry
            .build_context(&context_config)
            .with_context(|| format!("Invalid topology for context {}", context_config.name))?;
        info!(
            context = %context.name(),
            order = ?placement_order(context),
            "Placement order"
        );
        let graph = compile(context).context("Failed to compile topology")?;
        println!("{}", serde_json::to_string_pretty(&graph.to_template())?);
    }

    if !config.simulate {
        return Ok(());
    }

    #[cfg(feature = "heat")]
    if let Ok(endpoint) = std::env::var("HEAT_ENDPOINT") {
        use stack_topology::stack::{HeatBackend, HeatConfig};

        let backend = HeatBackend::new(HeatConfig {
            endpoint,
            auth_token: std::env::var("OS_AUTH_TOKEN").context("OS_AUTH_TOKEN not set")?,
            timeout_secs: 30,
        })?;
        return deploy_all(&mut registry, StackManager::with_config(backend, config.deploy)).await;
    }

    deploy_all(
        &mut registry,
        StackManager::with_config(SimulatedBackend::new(), config.deploy),
    )
    .await
}
