/*!

This library provides the data types that describe a cluster, its instances and its members. It is
shared by the cluster agent, the cloud providers and the `meshfleet` CLI. Nothing in here performs
I/O; remote state is only ever observed through the types' owners.

!*/

#![deny(
    clippy::expect_used,
    clippy::get_unwrap,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::panicking_unwrap,
    clippy::unwrap_in_result,
    clippy::unwrap_used
)]

pub use cluster::{
    ClusterInfo, CreateClusterOptions, CreateInstanceOptions, DiscoveryUrl, PrivateRegistry,
    RebootStrategy,
};
pub use error::{Error, Result};
pub use instance::{ClusterInstance, ClusterInstanceInfo, ClusterInstanceList};
pub use member::{ClusterMember, ClusterMemberList};

mod cluster;
pub mod constants;
mod error;
mod instance;
mod member;
