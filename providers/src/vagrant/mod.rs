/*!

A local backend running the cluster in Vagrant machines. All state lives in one working folder:
the `Vagrantfile`, a `config.rb` holding the instance count, and the shared `user-data`. Only whole
clusters can be created or deleted.

!*/

use crate::cloud_config::CloudConfig;
use agent_utils::provider_error_for_cmd_output;
use async_trait::async_trait;
use cluster_agent::model::{
    ClusterInfo, ClusterInstance, ClusterInstanceInfo, ClusterInstanceList, CreateClusterOptions,
    CreateInstanceOptions, DiscoveryUrl,
};
use cluster_agent::{
    CloudProvider, DnsProvider, ErrorKind, ErrorPolicy, IntoProviderError, ProviderError,
    ProviderResult,
};
use log::{info, warn};
use std::io;
use std::path::{Path, PathBuf};
use tokio::process::Command;

const VAGRANT_FILE: &str = include_str!("Vagrantfile");
const VAGRANT_FILE_NAME: &str = "Vagrantfile";
const CONFIG_FILE_NAME: &str = "config.rb";
const USER_DATA_FILE_NAME: &str = "user-data";
const STATE_DIR_NAME: &str = ".vagrant";
const NUM_INSTANCES_VAR: &str = "$num_instances";
const PRIVATE_NETWORK_PREFIX: &str = "192.168.33";

pub struct VagrantProvider {
    folder: PathBuf,
    vagrant: PathBuf,
}

impl VagrantProvider {
    pub fn new<P: Into<PathBuf>>(folder: P) -> Self {
        Self {
            folder: folder.into(),
            vagrant: PathBuf::from("vagrant"),
        }
    }

    /// Use a specific `vagrant` executable instead of the one on `PATH`.
    pub fn with_vagrant_binary<P: Into<PathBuf>>(mut self, vagrant: P) -> Self {
        self.vagrant = vagrant.into();
        self
    }

    fn path(&self, name: &str) -> PathBuf {
        self.folder.join(name)
    }

    async fn write(&self, name: &str, content: &str) -> ProviderResult<()> {
        let path = self.path(name);
        tokio::fs::write(&path, content)
            .await
            .context(ErrorKind::Remote, format!("Unable to write '{}'", path.display()))
    }

    async fn vagrant(&self, args: &[&str]) -> ProviderResult<String> {
        let hint = format!("vagrant {}", args.join(" "));
        info!("Running '{}' in '{}'", hint, self.folder.display());
        let output = Command::new(&self.vagrant)
            .args(args)
            .current_dir(&self.folder)
            .output()
            .await
            .context(ErrorKind::Remote, format!("Unable to start '{}'", hint))?;
        provider_error_for_cmd_output(output, &hint)
    }

    /// The persisted instance count, or `None` when no cluster was created in the folder.
    async fn instance_count(&self) -> ProviderResult<Option<usize>> {
        let path = self.path(CONFIG_FILE_NAME);
        let config = match tokio::fs::read_to_string(&path).await {
            Ok(config) => config,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ProviderError::new_with_source_and_context(
                    ErrorKind::Remote,
                    format!("Unable to read '{}'", path.display()),
                    e,
                ))
            }
        };
        parse_instance_count(&config)
            .map(Some)
            .context(
                ErrorKind::Validation,
                format!("'{}' does not set {}", path.display(), NUM_INSTANCES_VAR),
            )
    }
}

fn render_config(instance_count: usize, box_name: &str) -> String {
    format!(
        "{}={}\n$box=\"{}\"\n",
        NUM_INSTANCES_VAR, instance_count, box_name
    )
}

fn parse_instance_count(config: &str) -> Option<usize> {
    config.lines().find_map(|line| {
        let (name, value) = line.split_once('=')?;
        if name.trim() == NUM_INSTANCES_VAR {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

fn vagrant_instance(index: usize) -> ClusterInstance {
    let ip = format!("{}.{}", PRIVATE_NETWORK_PREFIX, 100 + index);
    ClusterInstance {
        id: format!("core-{:02}", index),
        name: format!("core-{:02}", index),
        private_ipv4: ip.clone(),
        public_ipv4: ip,
        public_ipv6: None,
        cluster_ip: None,
    }
}

async fn remove_if_exists(path: &Path) -> ProviderResult<()> {
    let result = if path.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };
    match result {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(ProviderError::new_with_source_and_context(
            ErrorKind::Remote,
            format!("Unable to remove '{}'", path.display()),
            e,
        )),
        _ => Ok(()),
    }
}

#[async_trait]
impl CloudProvider for VagrantProvider {
    async fn get_instances(&self, _info: &ClusterInfo) -> ProviderResult<ClusterInstanceList> {
        let count = self.instance_count().await?.unwrap_or_default();
        Ok((1..=count).map(vagrant_instance).collect())
    }

    async fn create_instance(
        &self,
        _options: &CreateInstanceOptions,
        _dns: &dyn DnsProvider,
    ) -> ProviderResult<ClusterInstance> {
        Err(ProviderError::not_implemented(
            "Adding a single Vagrant instance",
        ))
    }

    async fn create_cluster(
        &self,
        options: &CreateClusterOptions,
        discovery_url: &DiscoveryUrl,
        _dns: &dyn DnsProvider,
        _policy: ErrorPolicy,
    ) -> ProviderResult<()> {
        tokio::fs::create_dir_all(&self.folder).await.context(
            ErrorKind::Remote,
            format!("Unable to create '{}'", self.folder.display()),
        )?;
        if self.path(STATE_DIR_NAME).exists() {
            return Err(ProviderError::new_with_context(
                ErrorKind::Conflict,
                format!("Vagrant in '{}' already exists", self.folder.display()),
            ));
        }

        // All machines boot from the same user data, so it carries no host name.
        let instance_options = options.new_create_instance_options(Some(discovery_url));
        let mut cloud_config = CloudConfig::for_instance(&instance_options, Vec::new());
        cloud_config.hostname = None;

        self.write(VAGRANT_FILE_NAME, VAGRANT_FILE).await?;
        self.write(
            CONFIG_FILE_NAME,
            &render_config(options.instance_count, &options.image),
        )
        .await?;
        self.write(USER_DATA_FILE_NAME, &cloud_config.render()?)
            .await?;

        self.vagrant(&["up"]).await?;
        info!(
            "Started {} Vagrant instance(s) in '{}'",
            options.instance_count,
            self.folder.display()
        );
        Ok(())
    }

    async fn delete_instance(
        &self,
        _info: &ClusterInstanceInfo,
        _dns: &dyn DnsProvider,
    ) -> ProviderResult<()> {
        Err(ProviderError::not_implemented(
            "Deleting a single Vagrant instance",
        ))
    }

    async fn delete_cluster(&self, _info: &ClusterInfo, _dns: &dyn DnsProvider) -> ProviderResult<()> {
        if self.path(VAGRANT_FILE_NAME).exists() {
            self.vagrant(&["destroy", "-f"]).await?;
        } else {
            warn!(
                "No {} in '{}', nothing to destroy",
                VAGRANT_FILE_NAME,
                self.folder.display()
            );
        }
        remove_if_exists(&self.path(STATE_DIR_NAME)).await?;
        remove_if_exists(&self.path(CONFIG_FILE_NAME)).await
    }
}
