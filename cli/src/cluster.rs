use crate::backend::Backend;
use agent_utils::json_display;
use anyhow::{Context, Result};
use clap::Parser;
use cluster_agent::members::no_forced_proxies;
use cluster_agent::model::constants::{
    DEFAULT_BOOTSTRAP_IMAGE, DEFAULT_IMAGE, DEFAULT_INSTANCE_COUNT, DEFAULT_MESH_ADDRESS_BLOCK,
    DEFAULT_REGION, DEFAULT_SIZE, DEFAULT_VPN_NAME,
};
use cluster_agent::model::{
    ClusterInfo, ClusterInstanceList, CreateClusterOptions, PrivateRegistry, RebootStrategy,
};
use cluster_agent::tinc::VpnConfig;
use log::info;

/// Identifies the cluster a command works on.
#[derive(Debug, Parser)]
pub(crate) struct ClusterArgs {
    /// Domain the cluster lives in.
    #[clap(long, env = "MESHFLEET_DOMAIN")]
    domain: String,
    /// Name of the cluster, the first label below the domain.
    #[clap(long)]
    name: String,
}

impl ClusterArgs {
    pub(crate) fn info(&self) -> ClusterInfo {
        ClusterInfo::new(&self.name, &self.domain)
    }
}

/// How new instances are created.
// No `Debug`: holds the registry password.
#[derive(Parser)]
pub(crate) struct InstanceArgs {
    /// OS image to run on new instances.
    #[clap(long, default_value = DEFAULT_IMAGE)]
    image: String,
    /// Region to create the instances in.
    #[clap(long, env = "MESHFLEET_REGION", default_value = DEFAULT_REGION)]
    region: String,
    /// Size (plan) of new instances.
    #[clap(long, default_value = DEFAULT_SIZE)]
    size: String,
    /// Container image of the agent that bootstraps a node on first boot.
    #[clap(long, default_value = DEFAULT_BOOTSTRAP_IMAGE)]
    bootstrap_image: String,
    /// How nodes coordinate OS update reboots [etcd-lock|best-effort|reboot|off].
    #[clap(long, default_value = "etcd-lock")]
    reboot_strategy: RebootStrategy,
    /// URL of a private container registry.
    #[clap(long, env = "MESHFLEET_PRIVATE_REGISTRY_URL", default_value = "")]
    private_registry_url: String,
    /// Username for the private registry.
    #[clap(long, env = "MESHFLEET_PRIVATE_REGISTRY_USERNAME", default_value = "")]
    private_registry_username: String,
    /// Password for the private registry.
    #[clap(
        long,
        env = "MESHFLEET_PRIVATE_REGISTRY_PASSWORD",
        default_value = "",
        hide_env_values = true
    )]
    private_registry_password: String,
    /// Names of SSH keys to add to instances. Repeat the flag or separate names by commas.
    #[clap(long = "ssh-key", env = "MESHFLEET_SSH_KEYS", use_value_delimiter = true)]
    ssh_keys: Vec<String>,
}

impl InstanceArgs {
    pub(crate) fn options(self, cluster: ClusterInfo, instance_count: usize) -> CreateClusterOptions {
        CreateClusterOptions {
            cluster,
            image: self.image,
            region: self.region,
            size: self.size,
            instance_count,
            bootstrap_image: self.bootstrap_image,
            reboot_strategy: self.reboot_strategy,
            private_registry: PrivateRegistry {
                url: self.private_registry_url,
                username: self.private_registry_username,
                password: self.private_registry_password,
            },
            ssh_key_names: self
                .ssh_keys
                .into_iter()
                .filter(|name| !name.is_empty())
                .collect(),
        }
    }
}

/// Create, inspect, repair or delete whole clusters.
#[derive(Parser)]
pub(crate) struct Cluster {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Create a new cluster and write the membership roster to all its instances.
    Create(Create),
    /// Delete all instances of a cluster and their DNS records.
    Delete(Delete),
    /// Rewrite the membership roster on every instance.
    Members(Members),
    /// Configure (or repair) the mesh VPN between all instances.
    Vpn(Vpn),
    /// List the instances of a cluster.
    Instances(Instances),
}

impl Cluster {
    pub(crate) async fn run(self, backend: &Backend) -> Result<()> {
        match self.command {
            Command::Create(create) => create.run(backend).await,
            Command::Delete(delete) => delete.run(backend).await,
            Command::Members(members) => members.run(backend).await,
            Command::Vpn(vpn) => vpn.run(backend).await,
            Command::Instances(instances) => instances.run(backend).await,
        }
    }
}

#[derive(Parser)]
struct Create {
    #[clap(flatten)]
    cluster: ClusterArgs,
    #[clap(flatten)]
    instance: InstanceArgs,
    /// Number of instances in the cluster.
    #[clap(long, default_value_t = DEFAULT_INSTANCE_COUNT)]
    instance_count: usize,
    /// Output the roster in JSON format.
    #[clap(long)]
    json: bool,
}

impl Create {
    async fn run(self, backend: &Backend) -> Result<()> {
        let info = self.cluster.info();
        let options = self.instance.options(info.clone(), self.instance_count);
        let members = backend
            .orchestrator()?
            .create_cluster(&options)
            .await
            .context(format!("Unable to create cluster '{}'", info))?;
        if self.json {
            println!("{}", json_display(&members));
        } else {
            print!("{}", members.render());
        }
        info!("Cluster '{}' created", info);
        Ok(())
    }
}

#[derive(Debug, Parser)]
struct Delete {
    #[clap(flatten)]
    cluster: ClusterArgs,
}

impl Delete {
    async fn run(self, backend: &Backend) -> Result<()> {
        let info = self.cluster.info();
        backend
            .orchestrator()?
            .delete_cluster(&info)
            .await
            .context(format!(
                "Unable to delete cluster '{}' (some instances or records may be left behind)",
                info
            ))?;
        println!("Cluster '{}' was deleted.", info);
        Ok(())
    }
}

#[derive(Debug, Parser)]
struct Members {
    #[clap(flatten)]
    cluster: ClusterArgs,
    /// Output the roster in JSON format.
    #[clap(long)]
    json: bool,
}

impl Members {
    async fn run(self, backend: &Backend) -> Result<()> {
        let info = self.cluster.info();
        let members = backend
            .orchestrator()?
            .update_members(&info, &no_forced_proxies)
            .await
            .context(format!("Unable to update the members of '{}'", info))?;
        if self.json {
            println!("{}", json_display(&members));
        } else {
            print!("{}", members.render());
        }
        Ok(())
    }
}

#[derive(Debug, Parser)]
struct Vpn {
    #[clap(flatten)]
    cluster: ClusterArgs,
    /// Name of the tinc network.
    #[clap(long = "vpn-name", default_value = DEFAULT_VPN_NAME)]
    vpn_name: String,
    /// First three octets of the mesh-internal addresses.
    #[clap(long = "vpn-address-block", default_value = DEFAULT_MESH_ADDRESS_BLOCK)]
    address_block: String,
    /// Output the instances in JSON format.
    #[clap(long)]
    json: bool,
}

impl Vpn {
    async fn run(self, backend: &Backend) -> Result<()> {
        let info = self.cluster.info();
        let vpn = VpnConfig {
            name: self.vpn_name,
            address_block: self.address_block,
            ..VpnConfig::default()
        };
        let instances = backend
            .orchestrator()?
            .reconfigure_vpn(&info, &vpn)
            .await
            .context(format!(
                "Unable to configure VPN '{}' on '{}' (running it again repairs partial setups)",
                vpn.name, info
            ))?;
        print_instances(&instances, self.json);
        Ok(())
    }
}

#[derive(Debug, Parser)]
struct Instances {
    #[clap(flatten)]
    cluster: ClusterArgs,
    /// Output the instances in JSON format.
    #[clap(long)]
    json: bool,
}

impl Instances {
    async fn run(self, backend: &Backend) -> Result<()> {
        let info = self.cluster.info();
        let instances = backend
            .orchestrator()?
            .list_instances(&info)
            .await
            .context(format!("Unable to list the instances of '{}'", info))?;
        print_instances(&instances, self.json);
        Ok(())
    }
}

pub(crate) fn print_instances(instances: &ClusterInstanceList, json: bool) {
    if json {
        println!("{}", json_display(instances));
        return;
    }
    for instance in instances.iter() {
        println!(
            "{:<40} {:<16} {:<16} {}",
            instance.name,
            instance.private_ipv4,
            instance.public_ipv4,
            instance.cluster_ip.as_deref().unwrap_or("-")
        );
    }
}
