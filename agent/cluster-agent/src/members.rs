/*!

The membership synchronizer. It derives one [`ClusterMember`] per node and writes the identical
rendered roster to every node, where the coordination service's file based discovery reads it.
Each round overwrites the whole roster; there are no incremental updates.

!*/

use crate::error::ProviderResult;
use crate::fanout::{fan_out, ErrorPolicy};
use crate::provider::CloudProvider;
use crate::remote::{InstanceExt, RemoteExec};
use log::{debug, info};
use meshfleet_model::constants::CLUSTER_MEMBERS_PATH;
use meshfleet_model::{
    ClusterInfo, ClusterInstance, ClusterInstanceList, ClusterMember, ClusterMemberList,
};

/// Marks instances as proxy members regardless of what they report themselves.
pub type EtcdProxyPredicate = dyn Fn(&ClusterInstance) -> bool + Send + Sync;

/// A predicate that forces no instance into the proxy role.
pub fn no_forced_proxies(_: &ClusterInstance) -> bool {
    false
}

/// Takes a fresh snapshot of the cluster's instances and synchronizes the roster on all of them.
pub async fn update_cluster_members(
    provider: &dyn CloudProvider,
    remote: &dyn RemoteExec,
    info: &ClusterInfo,
    is_etcd_proxy: &EtcdProxyPredicate,
    policy: ErrorPolicy,
) -> ProviderResult<ClusterMemberList> {
    let instances = provider.get_instances(info).await?;
    info!(
        "Updating cluster members of '{}' on {} instance(s)",
        info,
        instances.len()
    );
    update_members(remote, &instances, is_etcd_proxy, policy).await
}

/// Loads the members of `instances`, then pushes the rendered roster to every one of them.
pub async fn update_members(
    remote: &dyn RemoteExec,
    instances: &ClusterInstanceList,
    is_etcd_proxy: &EtcdProxyPredicate,
    policy: ErrorPolicy,
) -> ProviderResult<ClusterMemberList> {
    let members = load_cluster_members(remote, instances, is_etcd_proxy, policy).await?;
    push_cluster_members(remote, instances, &members, policy).await?;
    Ok(members)
}

/// Queries every node for its machine ID and proxy role. The predicate wins over the node's own
/// report. Members are returned in instance order.
pub async fn load_cluster_members(
    remote: &dyn RemoteExec,
    instances: &ClusterInstanceList,
    is_etcd_proxy: &EtcdProxyPredicate,
    policy: ErrorPolicy,
) -> ProviderResult<ClusterMemberList> {
    let members = fan_out(instances.as_slice(), policy, |instance| async move {
        let machine_id = instance.machine_id(remote).await?;
        let reported_proxy = instance.is_etcd_proxy(remote).await?;
        let etcd_proxy = is_etcd_proxy(instance) || reported_proxy;
        debug!(
            "Instance '{}' has machine ID '{}' (etcd proxy: {})",
            instance.name, machine_id, etcd_proxy
        );
        Ok(ClusterMember {
            machine_id,
            private_ip: instance.private_ipv4.clone(),
            etcd_proxy,
        })
    })
    .await?;
    Ok(members.into())
}

/// Writes the rendered roster to every node.
pub async fn push_cluster_members(
    remote: &dyn RemoteExec,
    instances: &ClusterInstanceList,
    members: &ClusterMemberList,
    policy: ErrorPolicy,
) -> ProviderResult<()> {
    let roster = members.render();
    let roster = roster.as_str();
    fan_out(instances.as_slice(), policy, |instance| async move {
        debug!("Writing {} to '{}'", CLUSTER_MEMBERS_PATH, instance.name);
        instance
            .write_file(remote, CLUSTER_MEMBERS_PATH, roster)
            .await
    })
    .await?;
    Ok(())
}
