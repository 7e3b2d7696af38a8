/*!

This is the command line interface for creating clusters, keeping their membership rosters in sync
and bootstrapping the mesh VPN between their instances.

!*/

mod backend;
mod catalog;
mod cluster;
mod dns;
mod instance;

use agent_utils::init_logger;
use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

/// Provision clusters of cloud instances and connect them with a mesh VPN.
#[derive(Parser)]
#[clap(author, version, about)]
struct Args {
    /// Set logging verbosity [trace|debug|info|warn|error]. If the environment variable `RUST_LOG`
    /// is present, it overrides the default logging behavior. See https://docs.rs/env_logger/latest
    #[clap(long = "log-level", default_value = "info")]
    log_level: LevelFilter,
    #[clap(flatten)]
    backend: backend::BackendArgs,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Create, inspect, repair or delete whole clusters.
    Cluster(cluster::Cluster),
    /// Add or remove single instances of an existing cluster.
    Instance(instance::Instance),
    /// List the machine sizes of the provider.
    Plans(catalog::Catalog),
    /// List the regions of the provider.
    Regions(catalog::Catalog),
    /// List the OS images of the provider.
    Images(catalog::Catalog),
    /// List the SSH keys registered with the provider.
    Keys(catalog::Catalog),
    /// Inspect DNS records.
    Dns(dns::Dns),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logger(env!("CARGO_CRATE_NAME"), Some(args.log_level));
    if let Err(e) = run(args).await {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let backend = args.backend.build()?;
    match args.command {
        Command::Cluster(cluster) => cluster.run(&backend).await,
        Command::Instance(instance) => instance.run(&backend).await,
        Command::Plans(catalog) => catalog.run(&backend, catalog::Listing::Plans).await,
        Command::Regions(catalog) => catalog.run(&backend, catalog::Listing::Regions).await,
        Command::Images(catalog) => catalog.run(&backend, catalog::Listing::Images).await,
        Command::Keys(catalog) => catalog.run(&backend, catalog::Listing::Keys).await,
        Command::Dns(dns) => dns.run(&backend).await,
    }
}
