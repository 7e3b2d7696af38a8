use crate::error::{ProviderError, ProviderResult};
use crate::fanout::{fan_out, ErrorPolicy};
use log::info;
use meshfleet_model::{
    ClusterInfo, ClusterInstance, ClusterInstanceInfo, ClusterInstanceList, CreateClusterOptions,
    CreateInstanceOptions, DiscoveryUrl,
};
use serde::{Deserialize, Serialize};
use serde_plain::{derive_display_from_serialize, derive_fromstr_from_deserialize};

/// One row of a provider's catalog of plans, regions, images or SSH keys.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub description: String,
}

impl CatalogEntry {
    pub fn new<S1, S2>(id: S1, description: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self {
            id: id.into(),
            description: description.into(),
        }
    }
}

/// You implement [`CloudProvider`] once per backend. The [`Orchestrator`](crate::Orchestrator)
/// selects no backend itself; it is handed one at startup.
///
/// Instances handed back by a provider are read-only to everyone else. A provider never caches
/// them: [`get_instances`](CloudProvider::get_instances) always reflects the backend's state at
/// the time of the call.
#[async_trait::async_trait]
pub trait CloudProvider: Send + Sync {
    async fn show_plans(&self) -> ProviderResult<Vec<CatalogEntry>> {
        Err(ProviderError::not_implemented("Listing plans"))
    }

    async fn show_regions(&self) -> ProviderResult<Vec<CatalogEntry>> {
        Err(ProviderError::not_implemented("Listing regions"))
    }

    async fn show_images(&self) -> ProviderResult<Vec<CatalogEntry>> {
        Err(ProviderError::not_implemented("Listing images"))
    }

    async fn show_keys(&self) -> ProviderResult<Vec<CatalogEntry>> {
        Err(ProviderError::not_implemented("Listing SSH keys"))
    }

    /// The instances currently belonging to the cluster. An empty list is not an error.
    async fn get_instances(&self, info: &ClusterInfo) -> ProviderResult<ClusterInstanceList>;

    /// Provision one instance, wait until it answers remote commands and register it in DNS.
    async fn create_instance(
        &self,
        options: &CreateInstanceOptions,
        dns: &dyn DnsProvider,
    ) -> ProviderResult<ClusterInstance>;

    /// Provision `options.instance_count` instances sharing `discovery_url`. The caller has
    /// already checked that the cluster does not exist.
    ///
    /// The default creates all instances concurrently through
    /// [`create_instance`](CloudProvider::create_instance). Every creation runs to completion
    /// even when one of them fails; `policy` decides whether the first failure or all of them
    /// are reported.
    async fn create_cluster(
        &self,
        options: &CreateClusterOptions,
        discovery_url: &DiscoveryUrl,
        dns: &dyn DnsProvider,
        policy: ErrorPolicy,
    ) -> ProviderResult<()> {
        let instance_options: Vec<CreateInstanceOptions> = (0..options.instance_count)
            .map(|_| options.new_create_instance_options(Some(discovery_url)))
            .collect();
        info!(
            "Creating {} instance(s) for cluster '{}'",
            instance_options.len(),
            options.cluster
        );
        fan_out(&instance_options, policy, |o| self.create_instance(o, dns)).await?;
        Ok(())
    }

    /// Remove one instance and its DNS records. Best-effort: cleanup continues past steps whose
    /// failure does not prevent the remaining ones.
    async fn delete_instance(
        &self,
        info: &ClusterInstanceInfo,
        dns: &dyn DnsProvider,
    ) -> ProviderResult<()>;

    /// Remove every instance of the cluster and the associated DNS records. Best-effort.
    async fn delete_cluster(&self, info: &ClusterInfo, dns: &dyn DnsProvider) -> ProviderResult<()>;
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    A,
    #[allow(clippy::upper_case_acronyms)]
    AAAA,
}

derive_display_from_serialize!(RecordType);
derive_fromstr_from_deserialize!(RecordType);

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct DnsRecord {
    pub id: String,
    pub record_type: String,
    /// Fully qualified record name.
    pub name: String,
    pub content: String,
}

/// A DNS backend. Record names are always fully qualified.
#[async_trait::async_trait]
pub trait DnsProvider: Send + Sync {
    async fn domain_records(&self, domain: &str) -> ProviderResult<Vec<DnsRecord>>;

    /// Create a record unless an identical one is already published.
    async fn create_record(
        &self,
        domain: &str,
        record_type: RecordType,
        name: &str,
        content: &str,
    ) -> ProviderResult<()>;

    /// Delete the matching records. With `content` set only records with that content are
    /// removed. Deleting records that do not exist is not an error.
    async fn delete_records(
        &self,
        domain: &str,
        record_type: RecordType,
        name: &str,
        content: Option<&str>,
    ) -> ProviderResult<()>;
}

/// Hands out rendezvous tokens for the coordination service.
#[async_trait::async_trait]
pub trait DiscoveryService: Send + Sync {
    /// A new token for a cluster of `size` voting members.
    async fn new_discovery_url(&self, size: usize) -> ProviderResult<DiscoveryUrl>;
}
