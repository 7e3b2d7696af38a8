/*!

`meshfleet-providers` holds the backends the `meshfleet` binary can be configured with: cloud
providers implementing [`CloudProvider`](cluster_agent::CloudProvider), the Cloudflare
[`DnsProvider`](cluster_agent::DnsProvider), the etcd discovery client, and the cloud-config user
data every new instance boots with.

!*/

use serde::{Deserialize, Serialize};
use serde_plain::{derive_display_from_serialize, derive_fromstr_from_deserialize};

pub mod cloud_config;
pub mod cloudflare;
pub mod discovery;
mod http;
pub mod vagrant;
pub mod vultr;

pub use cloudflare::CloudflareDns;
pub use discovery::EtcdDiscovery;
pub use vagrant::VagrantProvider;
pub use vultr::{VultrClient, VultrProvider};

/// The cloud backends a cluster can run on.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    Vultr,
    Vagrant,
}

impl Default for ProviderKind {
    fn default() -> Self {
        Self::Vultr
    }
}

derive_display_from_serialize!(ProviderKind);
derive_fromstr_from_deserialize!(ProviderKind);
