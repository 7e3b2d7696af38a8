pub(crate) mod mock;

use cluster_agent::model::{ClusterInfo, ClusterInstanceList};
use cluster_agent::tinc::{configure_mesh, mesh_name, VpnConfig};
use cluster_agent::{CloudProvider, ErrorKind, ErrorPolicy, InstanceExt};
use mock::{MockProvider, MockRemote};
use std::sync::Arc;

async fn cluster_of(count: usize) -> (Arc<MockRemote>, ClusterInstanceList) {
    let remote = Arc::new(MockRemote::default());
    let provider = MockProvider::new(remote.clone());
    let cluster = ClusterInfo::new("alpha", "example.com");
    for i in 1..=count {
        provider.seed(&cluster, &format!("core-{:02}.alpha.example.com", i));
    }
    let instances = provider.get_instances(&cluster).await.unwrap();
    (remote, instances)
}

#[tokio::test]
async fn every_node_knows_every_peer() {
    let (remote, instances) = cluster_of(4).await;
    let vpn = VpnConfig::default();
    let configured = configure_mesh(remote.as_ref(), &instances, &vpn, ErrorPolicy::FirstWins)
        .await
        .unwrap();
    assert_eq!(configured.len(), 4);

    for instance in &instances {
        let own = mesh_name(&instance.name);
        let conf = remote.file(instance.host(), &vpn.conf_path()).unwrap();
        let peers: Vec<&str> = conf
            .lines()
            .filter_map(|line| line.strip_prefix("ConnectTo = "))
            .collect();
        assert_eq!(peers.len(), 3);
        assert!(!peers.contains(&own.as_str()));

        // The node's own descriptor plus one per peer.
        let known = remote.dir_entries(instance.host(), &vpn.hosts_dir());
        assert_eq!(known.len(), 4);
        assert_eq!(known.iter().filter(|name| **name != own).count(), 3);
    }
}

#[tokio::test]
async fn written_files_are_not_echoed() {
    let (remote, instances) = cluster_of(2).await;
    let vpn = VpnConfig::default();
    configure_mesh(remote.as_ref(), &instances, &vpn, ErrorPolicy::FirstWins)
        .await
        .unwrap();

    let writes: Vec<String> = remote
        .commands()
        .into_iter()
        .map(|(_, command)| command)
        .filter(|command| command.starts_with("tee "))
        .collect();
    assert!(!writes.is_empty());
    assert!(writes.iter().all(|command| command.ends_with(" > /dev/null")));

    let instance = &instances[0];
    instance
        .write_file(remote.as_ref(), "/etc/meshfleet/secret", "private key")
        .await
        .unwrap();
    assert_eq!(
        remote.file(instance.host(), "/etc/meshfleet/secret").as_deref(),
        Some("private key")
    );
}

#[tokio::test]
async fn descriptors_carry_public_keys() {
    let (remote, instances) = cluster_of(3).await;
    let vpn = VpnConfig::default();
    configure_mesh(remote.as_ref(), &instances, &vpn, ErrorPolicy::FirstWins)
        .await
        .unwrap();

    for instance in &instances {
        let path = vpn.host_path(&mesh_name(&instance.name));
        let own = remote.file(instance.host(), &path).unwrap();
        assert!(own.starts_with(&format!("Address = {}\n", instance.private_ipv4)));
        assert!(own.contains("BEGIN RSA PUBLIC KEY"));
        for peer in instances.others(&instance.name) {
            assert_eq!(remote.file(peer.host(), &path), Some(own.clone()));
        }
    }
}

#[tokio::test]
async fn rerun_converges() {
    let (remote, instances) = cluster_of(3).await;
    let vpn = VpnConfig::default();
    configure_mesh(remote.as_ref(), &instances, &vpn, ErrorPolicy::FirstWins)
        .await
        .unwrap();
    configure_mesh(remote.as_ref(), &instances, &vpn, ErrorPolicy::FirstWins)
        .await
        .unwrap();

    for instance in &instances {
        let node = remote.node(instance.host());
        assert_eq!(node.key_generations, 2);
        let path = vpn.host_path(&mesh_name(&instance.name));
        let own = remote.file(instance.host(), &path).unwrap();
        assert_eq!(own.matches("BEGIN RSA PUBLIC KEY").count(), 1);
        for peer in instances.others(&instance.name) {
            assert_eq!(remote.file(peer.host(), &path), Some(own.clone()));
        }
    }
}

#[tokio::test]
async fn configuration_failure_stops_before_distribution() {
    let (remote, instances) = cluster_of(3).await;
    let vpn = VpnConfig::default();
    remote.fail_command(instances[2].host(), "tincd");

    let err = configure_mesh(remote.as_ref(), &instances, &vpn, ErrorPolicy::FirstWins)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Remote);

    for instance in &instances {
        // Every node finished its own configuration.
        assert!(remote.file(instance.host(), &vpn.service_path()).is_some());
        // No descriptor was distributed.
        let entries = remote.dir_entries(instance.host(), &vpn.hosts_dir());
        assert_eq!(entries, vec![mesh_name(&instance.name)]);
    }
}

#[tokio::test]
async fn collect_all_reports_every_failed_node() {
    let (remote, instances) = cluster_of(3).await;
    remote.fail_command(instances[0].host(), "systemctl daemon-reload");
    remote.fail_command(instances[1].host(), "systemctl daemon-reload");

    let err = configure_mesh(
        remote.as_ref(),
        &instances,
        &VpnConfig::default(),
        ErrorPolicy::CollectAll,
    )
    .await
    .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("2 of 3 operations failed"));
    assert!(message.contains(instances[0].host()));
    assert!(message.contains(instances[1].host()));
}

#[tokio::test]
async fn distribution_is_sequential() {
    let (remote, instances) = cluster_of(3).await;
    let vpn = VpnConfig::default();
    configure_mesh(remote.as_ref(), &instances, &vpn, ErrorPolicy::FirstWins)
        .await
        .unwrap();

    // After the last key generation, descriptors are read back in instance order, each followed
    // by writes to the peers.
    let commands = remote.commands();
    let last_keygen = commands
        .iter()
        .rposition(|(_, c)| c.starts_with("tincd"))
        .unwrap();
    let reads: Vec<&str> = commands[last_keygen..]
        .iter()
        .filter(|(_, c)| c.starts_with("cat /etc/tinc/"))
        .map(|(host, _)| host.as_str())
        .collect();
    let hosts: Vec<&str> = instances.iter().map(|i| i.host()).collect();
    assert_eq!(reads, hosts);
}
