use crate::constants::INSTANCE_PREFIX_LEN;
use crate::error::{self, Result};
use serde::{Deserialize, Serialize};
use serde_plain::{derive_display_from_serialize, derive_fromstr_from_deserialize};
use snafu::ensure;
use std::fmt::{Debug, Display, Formatter};
use uuid::Uuid;

/// Identifies a cluster. `(name, domain)` addresses exactly one cluster within a provider account.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInfo {
    pub name: String,
    pub domain: String,
}

impl ClusterInfo {
    pub fn new<S1, S2>(name: S1, domain: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self {
            name: name.into(),
            domain: domain.into(),
        }
    }

    /// The fully qualified cluster name, `<name>.<domain>`. Providers tag instances with it.
    pub fn id(&self) -> String {
        format!("{}.{}", self.name, self.domain)
    }

    pub fn validate(&self) -> Result<()> {
        non_empty("name", &self.name)?;
        non_empty("domain", &self.domain)?;
        ensure!(
            self.name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-'),
            error::InvalidFieldSnafu {
                field: "name",
                value: &self.name,
                reason: "only letters, digits and '-' are allowed",
            }
        );
        ensure!(
            !self.domain.starts_with('.') && !self.domain.ends_with('.'),
            error::InvalidFieldSnafu {
                field: "domain",
                value: &self.domain,
                reason: "must not start or end with '.'",
            }
        );
        Ok(())
    }
}

impl Display for ClusterInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.name, self.domain)
    }
}

/// How nodes coordinate OS update reboots.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RebootStrategy {
    EtcdLock,
    BestEffort,
    Reboot,
    Off,
}

impl Default for RebootStrategy {
    fn default() -> Self {
        Self::EtcdLock
    }
}

derive_display_from_serialize!(RebootStrategy);
derive_fromstr_from_deserialize!(RebootStrategy);

/// Credentials for a private container registry. They are passed through to the nodes untouched.
#[derive(Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateRegistry {
    pub url: String,
    pub username: String,
    pub password: String,
}

impl PrivateRegistry {
    pub fn is_configured(&self) -> bool {
        !self.url.is_empty()
    }
}

impl Debug for PrivateRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateRegistry")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A rendezvous token for the coordination service, shared by every node created in one call.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiscoveryUrl(String);

impl DiscoveryUrl {
    pub fn new<S: Into<String>>(url: S) -> Result<Self> {
        let url = url.into().trim().to_string();
        ensure!(
            url.starts_with("http://") || url.starts_with("https://"),
            error::InvalidFieldSnafu {
                field: "discovery url",
                value: url,
                reason: "expected an http(s) URL",
            }
        );
        Ok(Self(url))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DiscoveryUrl {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// The desired state of a new cluster.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClusterOptions {
    #[serde(flatten)]
    pub cluster: ClusterInfo,
    /// OS image to run on new instances.
    pub image: String,
    pub region: String,
    /// Machine size (plan) of new instances.
    pub size: String,
    pub instance_count: usize,
    /// Container image holding the agent that bootstraps a node on first boot.
    pub bootstrap_image: String,
    pub reboot_strategy: RebootStrategy,
    pub private_registry: PrivateRegistry,
    pub ssh_key_names: Vec<String>,
}

impl CreateClusterOptions {
    /// Structural checks only. Nothing here talks to a provider.
    pub fn validate(&self) -> Result<()> {
        self.cluster.validate()?;
        non_empty("image", &self.image)?;
        non_empty("region", &self.region)?;
        non_empty("size", &self.size)?;
        non_empty("bootstrap image", &self.bootstrap_image)?;
        ensure!(
            self.instance_count >= 1,
            error::InstanceCountSnafu {
                count: self.instance_count
            }
        );
        Ok(())
    }

    /// Options for one instance of this cluster with a freshly generated instance name.
    pub fn new_create_instance_options(
        &self,
        discovery_url: Option<&DiscoveryUrl>,
    ) -> CreateInstanceOptions {
        let prefix: String = Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(INSTANCE_PREFIX_LEN)
            .collect();
        CreateInstanceOptions {
            cluster: self.cluster.clone(),
            instance_name: format!("{}.{}", prefix, self.cluster.id()),
            image: self.image.clone(),
            region: self.region.clone(),
            size: self.size.clone(),
            bootstrap_image: self.bootstrap_image.clone(),
            reboot_strategy: self.reboot_strategy,
            private_registry: self.private_registry.clone(),
            ssh_key_names: self.ssh_key_names.clone(),
            discovery_url: discovery_url.cloned(),
            etcd_proxy: false,
        }
    }
}

/// The options a provider needs to create a single instance.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInstanceOptions {
    pub cluster: ClusterInfo,
    /// Fully qualified name of the instance, `<prefix>.<cluster name>.<domain>`.
    pub instance_name: String,
    pub image: String,
    pub region: String,
    pub size: String,
    pub bootstrap_image: String,
    pub reboot_strategy: RebootStrategy,
    pub private_registry: PrivateRegistry,
    pub ssh_key_names: Vec<String>,
    /// `None` when the instance joins an existing cluster instead of forming a new one.
    pub discovery_url: Option<DiscoveryUrl>,
    /// Start the coordination service on this instance as a non-voting proxy.
    pub etcd_proxy: bool,
}

impl CreateInstanceOptions {
    pub fn validate(&self) -> Result<()> {
        self.cluster.validate()?;
        non_empty("instance name", &self.instance_name)?;
        non_empty("image", &self.image)?;
        non_empty("region", &self.region)?;
        non_empty("size", &self.size)?;
        Ok(())
    }
}

fn non_empty(field: &'static str, value: &str) -> Result<()> {
    ensure!(!value.trim().is_empty(), error::EmptyFieldSnafu { field });
    Ok(())
}
