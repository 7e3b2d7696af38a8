use super::MockRemote;
use cluster_agent::dns::{register_instance, unregister_instance};
use cluster_agent::error::{ErrorKind, ProviderError, ProviderResult};
use cluster_agent::model::{
    ClusterInfo, ClusterInstance, ClusterInstanceInfo, ClusterInstanceList,
    CreateInstanceOptions, DiscoveryUrl,
};
use cluster_agent::provider::{DnsRecord, RecordType};
use cluster_agent::readiness::wait_until_ready;
use cluster_agent::{CloudProvider, DiscoveryService, DnsProvider, ReadinessPolicy};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Hands out instances and registers every one of them as a node of the shared [`MockRemote`].
pub(crate) struct MockProvider {
    remote: Arc<MockRemote>,
    instances: Mutex<Vec<(ClusterInfo, ClusterInstance)>>,
    next_index: AtomicUsize,
    pub(crate) get_instances_calls: AtomicUsize,
    pub(crate) create_instance_calls: AtomicUsize,
    pub(crate) delete_calls: AtomicUsize,
    /// The next this many `create_instance` calls fail before provisioning anything.
    pub(crate) failing_creations: AtomicUsize,
}

impl MockProvider {
    pub(crate) fn new(remote: Arc<MockRemote>) -> Self {
        Self {
            remote,
            instances: Mutex::new(Vec::new()),
            next_index: AtomicUsize::new(1),
            get_instances_calls: AtomicUsize::new(0),
            create_instance_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            failing_creations: AtomicUsize::new(0),
        }
    }

    /// Adds an instance without going through DNS registration or readiness polling.
    pub(crate) fn seed(&self, cluster: &ClusterInfo, name: &str) -> ClusterInstance {
        let instance = self.new_instance(name);
        self.instances
            .lock()
            .unwrap()
            .push((cluster.clone(), instance.clone()));
        instance
    }

    pub(crate) fn calls(&self) -> usize {
        self.get_instances_calls.load(Ordering::SeqCst)
            + self.create_instance_calls.load(Ordering::SeqCst)
            + self.delete_calls.load(Ordering::SeqCst)
    }

    fn new_instance(&self, name: &str) -> ClusterInstance {
        let index = self.next_index.fetch_add(1, Ordering::SeqCst);
        let instance = ClusterInstance {
            id: format!("id-{}", index),
            name: name.to_string(),
            private_ipv4: format!("10.0.0.{}", 10 + index),
            public_ipv4: format!("203.0.113.{}", 10 + index),
            public_ipv6: None,
            cluster_ip: None,
        };
        self.remote
            .add_node(instance.host(), &format!("machine-{}", index));
        instance
    }
}

#[async_trait::async_trait]
impl CloudProvider for MockProvider {
    async fn get_instances(&self, info: &ClusterInfo) -> ProviderResult<ClusterInstanceList> {
        self.get_instances_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .instances
            .lock()
            .unwrap()
            .iter()
            .filter(|(cluster, _)| cluster == info)
            .map(|(_, instance)| instance.clone())
            .collect())
    }

    async fn create_instance(
        &self,
        options: &CreateInstanceOptions,
        dns: &dyn DnsProvider,
    ) -> ProviderResult<ClusterInstance> {
        let call = self.create_instance_calls.fetch_add(1, Ordering::SeqCst);
        if self
            .failing_creations
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ProviderError::new_with_context(
                ErrorKind::Remote,
                format!("Instance creation {} was rejected", call),
            ));
        }
        let instance = self.new_instance(&options.instance_name);
        if options.etcd_proxy {
            self.remote.mark_proxy(instance.host());
        }

        let policy = ReadinessPolicy::bounded(Duration::from_millis(1), 10);
        let instance = wait_until_ready(&policy, self.remote.as_ref(), &instance.name, || {
            let instance = instance.clone();
            async move { Ok(Some(instance)) }
        })
        .await?;

        register_instance(
            dns,
            &options.cluster,
            &instance.name,
            &instance.public_ipv4,
            None,
        )
        .await?;
        self.instances
            .lock()
            .unwrap()
            .push((options.cluster.clone(), instance.clone()));
        Ok(instance)
    }

    async fn delete_instance(
        &self,
        info: &ClusterInstanceInfo,
        dns: &dyn DnsProvider,
    ) -> ProviderResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let removed = {
            let mut instances = self.instances.lock().unwrap();
            let position = instances
                .iter()
                .position(|(cluster, i)| *cluster == info.cluster && i.name == info.name)
                .ok_or_else(|| {
                    ProviderError::new_with_context(
                        ErrorKind::NotFound,
                        format!("No instance '{}'", info.name),
                    )
                })?;
            instances.remove(position).1
        };
        unregister_instance(dns, &info.cluster, &removed.name, Some(&removed.public_ipv4)).await
    }

    async fn delete_cluster(&self, info: &ClusterInfo, dns: &dyn DnsProvider) -> ProviderResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let removed: Vec<ClusterInstance> = {
            let mut instances = self.instances.lock().unwrap();
            let (removed, kept) = instances
                .drain(..)
                .partition::<Vec<_>, _>(|(cluster, _)| cluster == info);
            *instances = kept;
            removed.into_iter().map(|(_, i)| i).collect()
        };
        for instance in removed {
            unregister_instance(dns, info, &instance.name, Some(&instance.public_ipv4)).await?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(crate) struct MockDns {
    records: Mutex<Vec<DnsRecord>>,
}

impl MockDns {
    pub(crate) fn records(&self) -> Vec<DnsRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl DnsProvider for MockDns {
    async fn domain_records(&self, domain: &str) -> ProviderResult<Vec<DnsRecord>> {
        Ok(self
            .records()
            .into_iter()
            .filter(|r| r.name.ends_with(domain))
            .collect())
    }

    async fn create_record(
        &self,
        _domain: &str,
        record_type: RecordType,
        name: &str,
        content: &str,
    ) -> ProviderResult<()> {
        let mut records = self.records.lock().unwrap();
        let record_type = record_type.to_string();
        let exists = records
            .iter()
            .any(|r| r.record_type == record_type && r.name == name && r.content == content);
        if !exists {
            let id = format!("record-{}", records.len() + 1);
            records.push(DnsRecord {
                id,
                record_type,
                name: name.to_string(),
                content: content.to_string(),
            });
        }
        Ok(())
    }

    async fn delete_records(
        &self,
        _domain: &str,
        record_type: RecordType,
        name: &str,
        content: Option<&str>,
    ) -> ProviderResult<()> {
        let record_type = record_type.to_string();
        self.records.lock().unwrap().retain(|r| {
            !(r.record_type == record_type
                && r.name == name
                && content.map_or(true, |c| r.content == c))
        });
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(crate) struct MockDiscovery {
    pub(crate) requests: Mutex<Vec<usize>>,
}

#[async_trait::async_trait]
impl DiscoveryService for MockDiscovery {
    async fn new_discovery_url(&self, size: usize) -> ProviderResult<DiscoveryUrl> {
        self.requests.lock().unwrap().push(size);
        DiscoveryUrl::new(format!("https://discovery.example.com/token-{}", size))
            .map_err(ProviderError::from)
    }
}
