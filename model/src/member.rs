use crate::error::{self, Result};
use crate::ClusterInstance;
use serde::{Deserialize, Serialize};
use snafu::OptionExt;
use std::fmt::Write;

/// One entry of the membership roster that every node keeps for the coordination service.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterMember {
    /// Cluster-wide unique machine identifier.
    pub machine_id: String,
    pub private_ip: String,
    /// A non-voting proxy member of the coordination service.
    pub etcd_proxy: bool,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterMemberList(Vec<ClusterMember>);

impl ClusterMemberList {
    pub fn new(members: Vec<ClusterMember>) -> Self {
        Self(members)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ClusterMember> {
        self.0.iter()
    }

    /// Renders the roster as `machineID=privateIP[ etcd-proxy]`, one member per line.
    pub fn render(&self) -> String {
        let mut data = String::new();
        for member in &self.0 {
            let proxy = if member.etcd_proxy { " etcd-proxy" } else { "" };
            // Writing into a String cannot fail.
            let _ = writeln!(data, "{}={}{}", member.machine_id, member.private_ip, proxy);
        }
        data
    }

    /// The member that runs on `instance`, matched by private address.
    pub fn find(&self, instance: &ClusterInstance) -> Result<&ClusterMember> {
        self.0
            .iter()
            .find(|m| m.private_ip == instance.private_ipv4)
            .context(error::MemberNotFoundSnafu {
                private_ip: &instance.private_ipv4,
            })
    }
}

impl From<Vec<ClusterMember>> for ClusterMemberList {
    fn from(members: Vec<ClusterMember>) -> Self {
        Self(members)
    }
}
