// Creation defaults
pub const DEFAULT_IMAGE: &str = "coreos-stable";
pub const DEFAULT_REGION: &str = "ams";
pub const DEFAULT_SIZE: &str = "vc2-1c-1gb";
pub const DEFAULT_INSTANCE_COUNT: usize = 3;
pub const DEFAULT_BOOTSTRAP_IMAGE: &str = "meshfleet/bootstrap-agent:latest";

/// Length of the random prefix in front of every generated instance name.
pub const INSTANCE_PREFIX_LEN: usize = 6;

// Mesh VPN
pub const DEFAULT_VPN_NAME: &str = "mesh";
/// The first three octets of the mesh-internal addresses. Each node adds its own last octet.
pub const DEFAULT_MESH_ADDRESS_BLOCK: &str = "192.168.35";

// Node-side paths
pub const CLUSTER_MEMBERS_PATH: &str = "/etc/cluster-members";
pub const ETCD_PROXY_MARKER_PATH: &str = "/etc/cluster-proxy";
pub const MACHINE_ID_PATH: &str = "/etc/machine-id";

// Readiness polling
pub const DEFAULT_READINESS_INTERVAL_SECS: u64 = 5;
