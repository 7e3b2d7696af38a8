/*!

The `cluster-agent` library is the orchestration and mesh bootstrap engine of `meshfleet`. Cloud
backends implement [`CloudProvider`], DNS backends implement [`DnsProvider`] and remote command
transports implement [`RemoteExec`]. These are handed to an [`Orchestrator`], which provisions a
cluster, writes a consistent membership roster to every node and configures a full-mesh VPN
between all nodes.

Every operation that touches more than one node goes through [`fan_out`]: one unit of work per
node, all units run to completion, and one representative error is reported.

!*/

pub mod dns;
pub mod error;
mod fanout;
pub mod members;
mod orchestrator;
pub mod provider;
pub mod readiness;
pub mod remote;
pub mod tinc;

pub use error::{ErrorKind, IntoProviderError, ProviderError, ProviderResult};
pub use fanout::{fan_out, ErrorPolicy};
pub use meshfleet_model as model;
pub use orchestrator::Orchestrator;
pub use provider::{CloudProvider, DiscoveryService, DnsProvider};
pub use readiness::ReadinessPolicy;
pub use remote::{InstanceExt, RemoteExec};
