pub(crate) mod mock;

use cluster_agent::model::{ClusterInfo, CreateClusterOptions, DiscoveryUrl};
use cluster_agent::{CloudProvider, ErrorKind, ErrorPolicy};
use meshfleet_providers::VagrantProvider;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use mock::RecordingDns;

/// Logs its arguments to `vagrant.log` in the working folder and creates the state folder on `up`.
const FAKE_VAGRANT: &str = r#"#!/bin/sh
echo "$@" >> vagrant.log
if [ "$1" = "up" ]; then
    mkdir -p .vagrant
fi
"#;

const FAILING_VAGRANT: &str = "#!/bin/sh\necho 'box not found' >&2\nexit 1\n";

fn fake_vagrant(dir: &Path, script: &str) -> PathBuf {
    let path = dir.join("fake-vagrant");
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn options() -> CreateClusterOptions {
    CreateClusterOptions {
        cluster: ClusterInfo::new("alpha", "example.com"),
        image: "coreos-stable".to_string(),
        region: "local".to_string(),
        size: "local".to_string(),
        instance_count: 3,
        bootstrap_image: "meshfleet/bootstrap-agent:1.0".to_string(),
        ..CreateClusterOptions::default()
    }
}

fn discovery_url() -> DiscoveryUrl {
    DiscoveryUrl::new("https://discovery.etcd.io/abc").unwrap()
}

fn vagrant_log(folder: &Path) -> Vec<String> {
    std::fs::read_to_string(folder.join("vagrant.log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn create_writes_machine_files_and_boots() {
    let tmp = TempDir::new().unwrap();
    let folder = tmp.path().join("alpha");
    let provider = VagrantProvider::new(&folder)
        .with_vagrant_binary(fake_vagrant(tmp.path(), FAKE_VAGRANT));

    provider
        .create_cluster(
            &options(),
            &discovery_url(),
            &RecordingDns::default(),
            ErrorPolicy::FirstWins,
        )
        .await
        .unwrap();

    assert!(folder.join("Vagrantfile").is_file());
    assert_eq!(
        std::fs::read_to_string(folder.join("config.rb")).unwrap(),
        "$num_instances=3\n$box=\"coreos-stable\"\n"
    );
    let user_data = std::fs::read_to_string(folder.join("user-data")).unwrap();
    assert!(user_data.starts_with("#cloud-config\n"));
    assert!(user_data.contains("https://discovery.etcd.io/abc"));
    assert!(!user_data.contains("hostname:"));
    assert_eq!(vagrant_log(&folder), vec!["up"]);

    let instances = provider
        .get_instances(&ClusterInfo::new("alpha", "example.com"))
        .await
        .unwrap();
    assert_eq!(instances.names(), vec!["core-01", "core-02", "core-03"]);
    assert_eq!(instances[2].host(), "192.168.33.103");
}

#[tokio::test]
async fn second_create_conflicts() {
    let tmp = TempDir::new().unwrap();
    let folder = tmp.path().join("alpha");
    let provider = VagrantProvider::new(&folder)
        .with_vagrant_binary(fake_vagrant(tmp.path(), FAKE_VAGRANT));
    let dns = RecordingDns::default();

    provider
        .create_cluster(&options(), &discovery_url(), &dns, ErrorPolicy::FirstWins)
        .await
        .unwrap();
    let error = provider
        .create_cluster(&options(), &discovery_url(), &dns, ErrorPolicy::FirstWins)
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Conflict);
    assert_eq!(vagrant_log(&folder), vec!["up"]);
}

#[tokio::test]
async fn delete_destroys_machines_and_state() {
    let tmp = TempDir::new().unwrap();
    let folder = tmp.path().join("alpha");
    let provider = VagrantProvider::new(&folder)
        .with_vagrant_binary(fake_vagrant(tmp.path(), FAKE_VAGRANT));
    let cluster = ClusterInfo::new("alpha", "example.com");
    let dns = RecordingDns::default();

    provider
        .create_cluster(&options(), &discovery_url(), &dns, ErrorPolicy::FirstWins)
        .await
        .unwrap();
    provider.delete_cluster(&cluster, &dns).await.unwrap();

    assert_eq!(vagrant_log(&folder), vec!["up", "destroy -f"]);
    assert!(!folder.join(".vagrant").exists());
    assert!(!folder.join("config.rb").exists());
    assert!(provider.get_instances(&cluster).await.unwrap().is_empty());
}

#[tokio::test]
async fn deleting_an_empty_folder_succeeds() {
    let tmp = TempDir::new().unwrap();
    let provider = VagrantProvider::new(tmp.path().join("never-created"))
        .with_vagrant_binary(fake_vagrant(tmp.path(), FAKE_VAGRANT));

    provider
        .delete_cluster(
            &ClusterInfo::new("alpha", "example.com"),
            &RecordingDns::default(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn failing_vagrant_is_a_remote_error() {
    let tmp = TempDir::new().unwrap();
    let provider = VagrantProvider::new(tmp.path().join("alpha"))
        .with_vagrant_binary(fake_vagrant(tmp.path(), FAILING_VAGRANT));

    let error = provider
        .create_cluster(
            &options(),
            &discovery_url(),
            &RecordingDns::default(),
            ErrorPolicy::FirstWins,
        )
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Remote);
    assert!(error.to_string().contains("box not found"));
}

#[tokio::test]
async fn single_instances_are_not_supported() {
    let tmp = TempDir::new().unwrap();
    let provider = VagrantProvider::new(tmp.path());
    let options = options().new_create_instance_options(None);

    let error = provider
        .create_instance(&options, &RecordingDns::default())
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::NotImplemented);
}
