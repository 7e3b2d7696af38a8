/*!

The Vultr backend. Instances of a cluster are tagged with the fully qualified cluster name, which
is how [`VultrProvider::get_instances`](cluster_agent::CloudProvider::get_instances) finds them.

!*/

mod api;

pub use api::{VultrClient, VULTR_API_URL};

use crate::cloud_config::CloudConfig;
use api::{CreateInstance, Instance};
use async_trait::async_trait;
use cluster_agent::dns::{register_instance, unregister_instance};
use cluster_agent::model::{
    ClusterInfo, ClusterInstance, ClusterInstanceInfo, ClusterInstanceList, CreateInstanceOptions,
};
use cluster_agent::provider::CatalogEntry;
use cluster_agent::readiness::{wait_until_ready, ReadinessPolicy};
use cluster_agent::{
    fan_out, CloudProvider, DnsProvider, ErrorKind, ErrorPolicy, IntoProviderError,
    ProviderResult, RemoteExec,
};
use log::{info, warn};
use std::sync::Arc;

const ACTIVE: &str = "active";

pub struct VultrProvider {
    client: VultrClient,
    remote: Arc<dyn RemoteExec>,
    readiness: ReadinessPolicy,
}

impl VultrProvider {
    pub fn new(client: VultrClient, remote: Arc<dyn RemoteExec>) -> Self {
        Self {
            client,
            remote,
            readiness: ReadinessPolicy::default(),
        }
    }

    pub fn with_readiness(mut self, readiness: ReadinessPolicy) -> Self {
        self.readiness = readiness;
        self
    }

    async fn ssh_key_ids(&self, names: &[String]) -> ProviderResult<Vec<String>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let keys = self.client.list_ssh_keys().await?;
        names
            .iter()
            .map(|name| {
                keys.iter()
                    .find(|key| &key.name == name)
                    .map(|key| key.id.clone())
                    .context(ErrorKind::NotFound, format!("No SSH key named '{}'", name))
            })
            .collect()
    }

    /// `image` is either a numeric OS ID or the name or family of an OS.
    async fn os_id(&self, image: &str) -> ProviderResult<u32> {
        if let Ok(id) = image.parse() {
            return Ok(id);
        }
        self.client
            .list_os()
            .await?
            .into_iter()
            .find(|os| os.name.eq_ignore_ascii_case(image) || os.family.eq_ignore_ascii_case(image))
            .map(|os| os.id)
            .context(ErrorKind::NotFound, format!("No OS image named '{}'", image))
    }

    async fn find_instance(&self, info: &ClusterInstanceInfo) -> ProviderResult<Instance> {
        self.client
            .list_instances(&info.cluster.id())
            .await?
            .into_iter()
            .find(|instance| instance.label == info.name)
            .context(
                ErrorKind::NotFound,
                format!("No instance '{}' in cluster '{}'", info.name, info.cluster),
            )
    }

    /// Removes the DNS records, then the instance. A DNS failure does not keep the instance.
    async fn destroy(
        &self,
        cluster: &ClusterInfo,
        instance: &Instance,
        dns: &dyn DnsProvider,
    ) -> ProviderResult<()> {
        let dns_result =
            unregister_instance(dns, cluster, &instance.label, Some(&instance.main_ip)).await;
        info!("Deleting instance '{}' ({})", instance.label, instance.id);
        self.client.delete_instance(&instance.id).await?;
        dns_result
    }
}

fn cluster_instance(instance: &Instance) -> ClusterInstance {
    ClusterInstance {
        id: instance.id.clone(),
        name: instance.label.clone(),
        private_ipv4: instance.internal_ip.clone(),
        public_ipv4: instance.main_ip.clone(),
        public_ipv6: Some(instance.v6_main_ip.clone()).filter(|ip| !ip.is_empty() && ip != "::"),
        cluster_ip: None,
    }
}

#[async_trait]
impl CloudProvider for VultrProvider {
    async fn show_plans(&self) -> ProviderResult<Vec<CatalogEntry>> {
        Ok(self
            .client
            .list_plans()
            .await?
            .into_iter()
            .map(|plan| {
                let description = format!(
                    "{} vCPU, {} MB RAM, {} GB disk, ${:.2}/month",
                    plan.vcpu_count, plan.ram, plan.disk, plan.monthly_cost
                );
                CatalogEntry::new(plan.id, description)
            })
            .collect())
    }

    async fn show_regions(&self) -> ProviderResult<Vec<CatalogEntry>> {
        Ok(self
            .client
            .list_regions()
            .await?
            .into_iter()
            .map(|region| {
                let description = format!("{}, {}", region.city, region.country);
                CatalogEntry::new(region.id, description)
            })
            .collect())
    }

    async fn show_images(&self) -> ProviderResult<Vec<CatalogEntry>> {
        Ok(self
            .client
            .list_os()
            .await?
            .into_iter()
            .map(|os| CatalogEntry::new(os.id.to_string(), os.name))
            .collect())
    }

    async fn show_keys(&self) -> ProviderResult<Vec<CatalogEntry>> {
        Ok(self
            .client
            .list_ssh_keys()
            .await?
            .into_iter()
            .map(|key| CatalogEntry::new(key.id, key.name))
            .collect())
    }

    async fn get_instances(&self, info: &ClusterInfo) -> ProviderResult<ClusterInstanceList> {
        let mut instances = self.client.list_instances(&info.id()).await?;
        instances.sort_by(|a, b| a.label.cmp(&b.label));
        Ok(instances.iter().map(cluster_instance).collect())
    }

    async fn create_instance(
        &self,
        options: &CreateInstanceOptions,
        dns: &dyn DnsProvider,
    ) -> ProviderResult<ClusterInstance> {
        options.validate()?;
        let user_data = CloudConfig::for_instance(options, Vec::new()).render()?;
        let request = CreateInstance {
            region: options.region.clone(),
            plan: options.size.clone(),
            os_id: self.os_id(&options.image).await?,
            label: options.instance_name.clone(),
            hostname: options.instance_name.clone(),
            tags: vec![options.cluster.id()],
            sshkey_id: self.ssh_key_ids(&options.ssh_key_names).await?,
            user_data: base64::encode(user_data),
            enable_ipv6: true,
            enable_private_network: true,
        };
        let created = self.client.create_instance(&request).await?;
        info!("Created instance '{}' ({})", created.label, created.id);

        let client = &self.client;
        let id = created.id.as_str();
        let instance = wait_until_ready(
            &self.readiness,
            self.remote.as_ref(),
            &options.instance_name,
            || async move {
                let server = client.get_instance(id).await?;
                Ok((server.status == ACTIVE).then(|| cluster_instance(&server)))
            },
        )
        .await?;

        register_instance(
            dns,
            &options.cluster,
            &instance.name,
            &instance.public_ipv4,
            instance.public_ipv6.as_deref(),
        )
        .await?;
        info!("Instance '{}' is ready", instance.name);
        Ok(instance)
    }

    async fn delete_instance(
        &self,
        info: &ClusterInstanceInfo,
        dns: &dyn DnsProvider,
    ) -> ProviderResult<()> {
        let instance = self.find_instance(info).await?;
        self.destroy(&info.cluster, &instance, dns).await
    }

    async fn delete_cluster(&self, info: &ClusterInfo, dns: &dyn DnsProvider) -> ProviderResult<()> {
        let instances = self.client.list_instances(&info.id()).await?;
        if instances.is_empty() {
            warn!("Cluster '{}' has no instances", info);
            return Ok(());
        }
        info!("Deleting {} instance(s) of '{}'", instances.len(), info);
        fan_out(&instances, ErrorPolicy::CollectAll, |instance| {
            self.destroy(info, instance, dns)
        })
        .await?;
        Ok(())
    }
}
