//! k8stun CLI - Keep Kubernetes port-forwards alive
//!
//! Reads a list of tunnels (namespace, label selector, local and remote
//! port) and keeps a `kubectl port-forward` running for each of them until
//! interrupted.

mod commands;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use k8stun_core::kubernetes::expand_home;
use k8stun_core::{ClusterConfig, ConfigFile};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "k8stun")]
#[command(author, version, about = "Keep Kubernetes port-forwards alive")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Tunnel configuration file (.yaml/.yml for YAML, JSON otherwise)
    #[arg(short, long, global = true, env = "K8STUN_CONFIG", default_value = "k8stun.yaml")]
    config: PathBuf,

    /// Kubeconfig file [default: kubectl reads $KUBECONFIG, then ~/.kube/config]
    #[arg(long, global = true)]
    kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[arg(long, global = true)]
    context: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start all tunnels and keep them up until interrupted (default)
    Run,

    /// Validate the configuration file
    Check,

    /// List the configured tunnels
    #[command(alias = "ls")]
    List,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let colorize = !cli.no_color && atty::is(atty::Stream::Stdout);

    init_tracing(cli.verbose, colorize);

    let config_file = ConfigFile::new(expand_home(&cli.config));
    let cluster = cluster_from_flags(cli.kubeconfig.as_deref(), cli.context);

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => commands::run::run(&config_file, cluster, colorize, cli.json).await?,
        Commands::Check => commands::check::run(&config_file, &cluster, cli.json).await?,
        Commands::List => commands::list::run(&config_file, cli.json).await?,
    }

    Ok(())
}

/// Only an explicit `--kubeconfig` is passed on; otherwise kubectl resolves
/// (and merges) `$KUBECONFIG` itself.
fn cluster_from_flags(kubeconfig: Option<&Path>, context: Option<String>) -> ClusterConfig {
    ClusterConfig::new(kubeconfig.map(expand_home), context)
}

fn init_tracing(verbose: bool, colorize: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_ansi(colorize))
        .with(filter)
        .init();
}
