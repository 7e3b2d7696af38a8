use crate::ClusterInfo;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::ops::Index;

/// A provisioned node. Providers create and destroy these; everyone else only reads them.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInstance {
    /// Provider specific identifier of the instance.
    pub id: String,
    /// Fully qualified instance name, also used as the hostname.
    pub name: String,
    pub private_ipv4: String,
    pub public_ipv4: String,
    pub public_ipv6: Option<String>,
    /// Address of the instance inside the mesh VPN. Providers may leave this empty, in which case
    /// it is derived from the private address when the mesh is configured.
    pub cluster_ip: Option<String>,
}

impl ClusterInstance {
    /// The address used to reach the instance for remote commands.
    pub fn host(&self) -> &str {
        if self.public_ipv4.is_empty() {
            &self.private_ipv4
        } else {
            &self.public_ipv4
        }
    }
}

impl Display for ClusterInstance {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.host())
    }
}

/// Identifies one instance of a cluster, e.g. for deletion.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInstanceInfo {
    pub cluster: ClusterInfo,
    /// Fully qualified instance name.
    pub name: String,
}

/// The instances of one cluster in provider order. This is never cached: every bulk operation asks
/// the provider for a fresh snapshot and works on that snapshot only.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterInstanceList(Vec<ClusterInstance>);

impl ClusterInstanceList {
    pub fn new(instances: Vec<ClusterInstance>) -> Self {
        Self(instances)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ClusterInstance> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[ClusterInstance] {
        &self.0
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|i| i.name.as_str()).collect()
    }

    pub fn find_by_name(&self, name: &str) -> Option<&ClusterInstance> {
        self.0.iter().find(|i| i.name == name)
    }

    /// All instances except the one named `name`.
    pub fn others<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ClusterInstance> {
        self.0.iter().filter(move |i| i.name != name)
    }
}

impl Index<usize> for ClusterInstanceList {
    type Output = ClusterInstance;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl From<Vec<ClusterInstance>> for ClusterInstanceList {
    fn from(instances: Vec<ClusterInstance>) -> Self {
        Self(instances)
    }
}

impl FromIterator<ClusterInstance> for ClusterInstanceList {
    fn from_iter<T: IntoIterator<Item = ClusterInstance>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ClusterInstanceList {
    type Item = ClusterInstance;
    type IntoIter = std::vec::IntoIter<ClusterInstance>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ClusterInstanceList {
    type Item = &'a ClusterInstance;
    type IntoIter = std::slice::Iter<'a, ClusterInstance>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
