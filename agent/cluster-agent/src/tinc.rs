/*!

Bootstraps a full-mesh [tinc](https://www.tinc-vpn.org/) VPN across all instances of a cluster.

The bootstrap runs in two phases separated by a barrier:

1. Every node is configured concurrently: `tinc.conf` with a `ConnectTo` line for every other
   node, its own host descriptor, the interface scripts and a service unit. Then a key pair is
   generated on the node; the daemon appends the public key to the node's own host descriptor.
2. Sequentially for each node, its now complete host descriptor is read back and written into the
   `hosts` directory of every other node.

Phase 2 stays sequential. Each step reads freshly generated remote state and writes to every peer,
so running steps concurrently could read a descriptor while it is being written.

All writes overwrite whole files under stable names, so a failed bootstrap is repaired by running
it again.

!*/

use crate::error::{ErrorKind, IntoProviderError, ProviderError, ProviderResult};
use crate::fanout::{fan_out, ErrorPolicy};
use crate::provider::CloudProvider;
use crate::remote::{InstanceExt, RemoteExec};
use log::{debug, info};
use meshfleet_model::constants::{DEFAULT_MESH_ADDRESS_BLOCK, DEFAULT_VPN_NAME};
use meshfleet_model::{ClusterInfo, ClusterInstance, ClusterInstanceList};
use std::collections::HashSet;
use std::net::Ipv4Addr;

const TINC_CONF_ROOT: &str = "/etc/tinc";
const SYSTEMD_UNIT_DIR: &str = "/etc/systemd/system";
const MESH_NETMASK: &str = "255.255.255.0";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VpnConfig {
    /// The tinc network name.
    pub name: String,
    /// First three octets of the mesh-internal addresses.
    pub address_block: String,
    /// The virtual network interface.
    pub interface: String,
}

impl Default for VpnConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_VPN_NAME.to_string(),
            address_block: DEFAULT_MESH_ADDRESS_BLOCK.to_string(),
            interface: "tun0".to_string(),
        }
    }
}

impl VpnConfig {
    pub fn conf_dir(&self) -> String {
        format!("{}/{}", TINC_CONF_ROOT, self.name)
    }

    pub fn conf_path(&self) -> String {
        format!("{}/tinc.conf", self.conf_dir())
    }

    pub fn hosts_dir(&self) -> String {
        format!("{}/hosts", self.conf_dir())
    }

    pub fn host_path(&self, mesh_name: &str) -> String {
        format!("{}/{}", self.hosts_dir(), mesh_name)
    }

    pub fn up_path(&self) -> String {
        format!("{}/tinc-up", self.conf_dir())
    }

    pub fn down_path(&self) -> String {
        format!("{}/tinc-down", self.conf_dir())
    }

    pub fn private_key_path(&self) -> String {
        format!("{}/rsa_key.priv", self.conf_dir())
    }

    pub fn service_name(&self) -> String {
        format!("{}.service", self.name)
    }

    pub fn service_path(&self) -> String {
        format!("{}/{}", SYSTEMD_UNIT_DIR, self.service_name())
    }

    /// The systemd unit running the daemon of this network.
    pub fn service_unit(&self) -> String {
        let lines = [
            "[Unit]".to_string(),
            format!("Description=tinc for network {}", self.name),
            "After=local-fs.target network-pre.target networking.service".to_string(),
            "Before=network.target".to_string(),
            String::new(),
            "[Service]".to_string(),
            "Type=simple".to_string(),
            format!("ExecStart=/usr/sbin/tincd -D -n {}", self.name),
            format!("ExecReload=/usr/sbin/tincd -n {} reload", self.name),
            format!("ExecStop=/usr/sbin/tincd -n {} stop", self.name),
            "TimeoutStopSec=5".to_string(),
            "Restart=always".to_string(),
            "RestartSec=60".to_string(),
            String::new(),
            "[Install]".to_string(),
            "WantedBy=multi-user.target".to_string(),
        ];
        lines.join("\n") + "\n"
    }

    pub fn tinc_down(&self) -> String {
        "#!/bin/sh\nifconfig $INTERFACE down\n".to_string()
    }
}

/// The name of an instance inside the mesh. tinc only accepts `[A-Za-z0-9_]` in node names.
pub fn mesh_name(instance_name: &str) -> String {
    instance_name.replace(&['.', '-'][..], "_")
}

/// The mesh-internal address of `instance`: the provider assigned one if present, otherwise the
/// address block followed by the last octet of the private address.
pub fn cluster_ip(instance: &ClusterInstance, vpn: &VpnConfig) -> ProviderResult<String> {
    if let Some(ip) = instance.cluster_ip.as_ref().filter(|ip| !ip.is_empty()) {
        return Ok(ip.clone());
    }
    let private_ip: Ipv4Addr = instance.private_ipv4.parse().context(
        ErrorKind::Validation,
        format!(
            "Instance '{}' has no usable private IPv4 address '{}'",
            instance.name, instance.private_ipv4
        ),
    )?;
    Ok(format!("{}.{}", vpn.address_block, private_ip.octets()[3]))
}

/// The mesh configuration of one node.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MeshHost<'a> {
    pub instance: &'a ClusterInstance,
    pub mesh_name: String,
    pub cluster_ip: String,
    /// Mesh names of every other node, in instance order.
    pub connect_to: Vec<String>,
}

impl MeshHost<'_> {
    pub fn tinc_conf(&self, vpn: &VpnConfig) -> String {
        let mut lines = vec![
            format!("Name = {}", self.mesh_name),
            "AddressFamily = ipv4".to_string(),
            format!("Interface = {}", vpn.interface),
        ];
        lines.extend(self.connect_to.iter().map(|peer| format!("ConnectTo = {}", peer)));
        lines.join("\n") + "\n"
    }

    /// The host descriptor before the daemon appends the public key.
    pub fn host_descriptor(&self) -> String {
        format!(
            "Address = {}\nSubnet = {}/32\n",
            self.instance.private_ipv4, self.cluster_ip
        )
    }

    pub fn tinc_up(&self) -> String {
        format!(
            "#!/bin/sh\nifconfig $INTERFACE {} netmask {}\n",
            self.cluster_ip, MESH_NETMASK
        )
    }
}

/// Derives the mesh configuration of every node. Two nodes may not share a mesh name or a
/// mesh-internal address.
pub fn plan_mesh<'a>(
    instances: &'a ClusterInstanceList,
    vpn: &VpnConfig,
) -> ProviderResult<Vec<MeshHost<'a>>> {
    let names: Vec<String> = instances.iter().map(|i| mesh_name(&i.name)).collect();
    let mut seen_names = HashSet::new();
    let mut seen_ips = HashSet::new();
    let mut hosts = Vec::with_capacity(instances.len());
    for (instance, name) in instances.iter().zip(&names) {
        let ip = cluster_ip(instance, vpn)?;
        if !seen_names.insert(name.clone()) {
            return Err(ProviderError::new_with_context(
                ErrorKind::Conflict,
                format!("More than one instance maps to mesh name '{}'", name),
            ));
        }
        if !seen_ips.insert(ip.clone()) {
            return Err(ProviderError::new_with_context(
                ErrorKind::Conflict,
                format!("More than one instance maps to mesh address '{}'", ip),
            ));
        }
        hosts.push(MeshHost {
            instance,
            mesh_name: name.clone(),
            cluster_ip: ip,
            connect_to: names.iter().filter(|n| *n != name).cloned().collect(),
        });
    }
    Ok(hosts)
}

/// Takes a fresh snapshot of the cluster's instances and bootstraps the mesh on all of them.
pub async fn reconfigure_tinc_cluster(
    provider: &dyn CloudProvider,
    remote: &dyn RemoteExec,
    info: &ClusterInfo,
    vpn: &VpnConfig,
    policy: ErrorPolicy,
) -> ProviderResult<ClusterInstanceList> {
    let instances = provider.get_instances(info).await?;
    configure_mesh(remote, &instances, vpn, policy).await
}

/// Bootstraps the mesh on `instances` and returns them with their mesh-internal addresses set.
pub async fn configure_mesh(
    remote: &dyn RemoteExec,
    instances: &ClusterInstanceList,
    vpn: &VpnConfig,
    policy: ErrorPolicy,
) -> ProviderResult<ClusterInstanceList> {
    let hosts = plan_mesh(instances, vpn)?;

    info!(
        "Configuring tinc network '{}' on {} instance(s)",
        vpn.name,
        hosts.len()
    );
    fan_out(&hosts, policy, |host| configure_tinc_host(remote, host, vpn)).await?;

    info!("Distributing tinc host descriptors");
    for host in &hosts {
        distribute_tinc_host(remote, host, &hosts, vpn).await?;
    }

    info!("Restarting '{}' on all instances", vpn.service_name());
    let restart = format!("systemctl restart {}", vpn.service_name());
    let restart = restart.as_str();
    fan_out(&hosts, policy, |host| async move {
        host.instance
            .run_remote_command(remote, restart, "", true)
            .await
    })
    .await?;

    Ok(hosts
        .iter()
        .map(|host| ClusterInstance {
            cluster_ip: Some(host.cluster_ip.clone()),
            ..host.instance.clone()
        })
        .collect())
}

/// Phase 1 for a single node.
async fn configure_tinc_host(
    remote: &dyn RemoteExec,
    host: &MeshHost<'_>,
    vpn: &VpnConfig,
) -> ProviderResult<()> {
    let instance = host.instance;
    debug!("Writing tinc configuration of '{}'", host.mesh_name);
    instance
        .write_file(remote, &vpn.conf_path(), &host.tinc_conf(vpn))
        .await?;
    instance
        .write_file(remote, &vpn.host_path(&host.mesh_name), &host.host_descriptor())
        .await?;

    instance
        .write_file(remote, &vpn.up_path(), &host.tinc_up())
        .await?;
    instance
        .write_file(remote, &vpn.down_path(), &vpn.tinc_down())
        .await?;
    instance
        .run_remote_command(
            remote,
            &format!("chmod 755 {} {}", vpn.up_path(), vpn.down_path()),
            "",
            true,
        )
        .await?;

    instance
        .write_file(remote, &vpn.service_path(), &vpn.service_unit())
        .await?;
    instance
        .run_remote_command(remote, "systemctl daemon-reload", "", true)
        .await?;
    instance
        .run_remote_command(
            remote,
            &format!("systemctl enable {}", vpn.service_name()),
            "",
            true,
        )
        .await?;

    // A leftover private key would not match the public key generated below.
    instance
        .run_remote_command(
            remote,
            &format!("rm -f {}", vpn.private_key_path()),
            "",
            true,
        )
        .await?;
    debug!("Generating tinc keys on '{}'", host.mesh_name);
    instance
        .run_remote_command(remote, &format!("tincd -n {} -K", vpn.name), "", true)
        .await?;
    Ok(())
}

/// Phase 2 for a single node: copy its host descriptor to every other node.
async fn distribute_tinc_host(
    remote: &dyn RemoteExec,
    host: &MeshHost<'_>,
    hosts: &[MeshHost<'_>],
    vpn: &VpnConfig,
) -> ProviderResult<()> {
    let path = vpn.host_path(&host.mesh_name);
    let descriptor = host.instance.read_file(remote, &path).await?;
    for peer in hosts.iter().filter(|h| h.mesh_name != host.mesh_name) {
        debug!(
            "Copying host descriptor of '{}' to '{}'",
            host.mesh_name, peer.mesh_name
        );
        peer.instance.write_file(remote, &path, &descriptor).await?;
    }
    Ok(())
}
