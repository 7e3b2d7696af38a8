use crate::error::{ErrorKind, ProviderError, ProviderResult};
use crate::fanout::ErrorPolicy;
use crate::members::{no_forced_proxies, update_cluster_members, update_members, EtcdProxyPredicate};
use crate::provider::{CloudProvider, DiscoveryService, DnsProvider};
use crate::remote::RemoteExec;
use crate::tinc::{reconfigure_tinc_cluster, VpnConfig};
use log::info;
use meshfleet_model::{
    ClusterInfo, ClusterInstance, ClusterInstanceInfo, ClusterInstanceList, ClusterMemberList,
    CreateClusterOptions,
};

/// Drives the cluster lifecycle workflows. Every collaborator is handed in by the caller; the
/// orchestrator holds no state of its own between calls.
pub struct Orchestrator<'a> {
    provider: &'a dyn CloudProvider,
    dns: &'a dyn DnsProvider,
    remote: &'a dyn RemoteExec,
    discovery: &'a dyn DiscoveryService,
    policy: ErrorPolicy,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        provider: &'a dyn CloudProvider,
        dns: &'a dyn DnsProvider,
        remote: &'a dyn RemoteExec,
        discovery: &'a dyn DiscoveryService,
    ) -> Self {
        Self {
            provider,
            dns,
            remote,
            discovery,
            policy: ErrorPolicy::default(),
        }
    }

    /// Sets how multi-node rounds report failures of more than one node.
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Validates `options`, refuses to touch an existing cluster, provisions all instances with a
    /// shared discovery URL and finally writes the membership roster to every instance.
    ///
    /// The mesh VPN is not configured here; see [`Orchestrator::reconfigure_vpn`].
    pub async fn create_cluster(
        &self,
        options: &CreateClusterOptions,
    ) -> ProviderResult<ClusterMemberList> {
        options.validate()?;

        let existing = self.provider.get_instances(&options.cluster).await?;
        if !existing.is_empty() {
            return Err(ProviderError::new_with_context(
                ErrorKind::Conflict,
                format!(
                    "Cluster '{}' already exists with {} instance(s)",
                    options.cluster,
                    existing.len()
                ),
            ));
        }

        let discovery_url = self
            .discovery
            .new_discovery_url(options.instance_count)
            .await?;
        info!(
            "Creating cluster '{}' with discovery URL '{}'",
            options.cluster, discovery_url
        );
        self.provider
            .create_cluster(options, &discovery_url, self.dns, self.policy)
            .await?;

        let members = self.update_members(&options.cluster, &no_forced_proxies).await?;
        info!("Cluster '{}' created", options.cluster);
        Ok(members)
    }

    /// Adds one instance to an existing cluster. The new instance joins as a proxy member, so it
    /// does not need a discovery URL.
    pub async fn add_instance(
        &self,
        options: &CreateClusterOptions,
    ) -> ProviderResult<ClusterInstance> {
        options.validate()?;

        let existing = self.provider.get_instances(&options.cluster).await?;
        if existing.is_empty() {
            return Err(ProviderError::new_with_context(
                ErrorKind::NotFound,
                format!("Cluster '{}' does not exist", options.cluster),
            ));
        }

        let mut instance_options = options.new_create_instance_options(None);
        instance_options.etcd_proxy = true;
        instance_options.validate()?;
        info!(
            "Adding instance '{}' to cluster '{}'",
            instance_options.instance_name, options.cluster
        );
        let instance = self
            .provider
            .create_instance(&instance_options, self.dns)
            .await?;

        let new_name = instance.name.clone();
        let is_new = move |i: &ClusterInstance| i.name == new_name;
        self.update_members(&options.cluster, &is_new).await?;
        Ok(instance)
    }

    /// Removes one instance, then rewrites the roster on the instances that remain.
    pub async fn delete_instance(&self, info: &ClusterInstanceInfo) -> ProviderResult<()> {
        info.cluster.validate()?;
        info!("Deleting instance '{}'", info.name);
        self.provider.delete_instance(info, self.dns).await?;

        let remaining = self.provider.get_instances(&info.cluster).await?;
        if remaining.is_empty() {
            info!("No instances left in cluster '{}'", info.cluster);
            return Ok(());
        }
        update_members(self.remote, &remaining, &no_forced_proxies, self.policy).await?;
        Ok(())
    }

    pub async fn delete_cluster(&self, info: &ClusterInfo) -> ProviderResult<()> {
        info.validate()?;
        info!("Deleting cluster '{}'", info);
        self.provider.delete_cluster(info, self.dns).await
    }

    /// Writes a fresh membership roster to every instance of the cluster.
    pub async fn update_members(
        &self,
        info: &ClusterInfo,
        is_etcd_proxy: &EtcdProxyPredicate,
    ) -> ProviderResult<ClusterMemberList> {
        update_cluster_members(self.provider, self.remote, info, is_etcd_proxy, self.policy).await
    }

    /// Configures the mesh VPN on every instance of the cluster. Safe to run again to repair a
    /// partially configured mesh.
    pub async fn reconfigure_vpn(
        &self,
        info: &ClusterInfo,
        vpn: &VpnConfig,
    ) -> ProviderResult<ClusterInstanceList> {
        info.validate()?;
        let instances = reconfigure_tinc_cluster(self.provider, self.remote, info, vpn, self.policy)
            .await?;
        info!(
            "Mesh VPN '{}' configured on {} instance(s) of '{}'",
            vpn.name,
            instances.len(),
            info
        );
        Ok(instances)
    }

    pub async fn list_instances(&self, info: &ClusterInfo) -> ProviderResult<ClusterInstanceList> {
        info.validate()?;
        self.provider.get_instances(info).await
    }
}
