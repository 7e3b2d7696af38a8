/*!

The `#cloud-config` user data handed to every new instance. It sets the host name, configures the
coordination service (joining via the discovery URL, or as a proxy member), and starts the
bootstrap agent container on first boot.

!*/

use cluster_agent::model::constants::ETCD_PROXY_MARKER_PATH;
use cluster_agent::model::{CreateInstanceOptions, RebootStrategy};
use cluster_agent::{ErrorKind, IntoProviderError, ProviderResult};
use serde::{Deserialize, Serialize};

/// Placeholder the image substitutes with the instance's private address on boot.
pub const PRIVATE_IPV4_PLACEHOLDER: &str = "$private_ipv4";
const REGISTRY_ENV_PATH: &str = "/etc/meshfleet/registry.env";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CloudConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ssh_authorized_keys: Vec<String>,
    pub coreos: CoreOs,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub write_files: Vec<WriteFile>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CoreOs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etcd2: Option<Etcd>,
    pub update: Update,
    #[serde(default)]
    pub units: Vec<Unit>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Etcd {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    pub advertise_client_urls: String,
    pub initial_advertise_peer_urls: String,
    pub listen_client_urls: String,
    pub listen_peer_urls: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Update {
    pub reboot_strategy: RebootStrategy,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteFile {
    pub path: String,
    pub permissions: String,
    pub content: String,
}

impl CloudConfig {
    /// The user data of the instance described by `options`. `ssh_keys` are public keys to embed
    /// directly, for backends that cannot attach keys themselves.
    pub fn for_instance(options: &CreateInstanceOptions, ssh_keys: Vec<String>) -> Self {
        let private_ip = PRIVATE_IPV4_PLACEHOLDER;
        let mut write_files = Vec::new();
        if options.etcd_proxy {
            write_files.push(WriteFile {
                path: ETCD_PROXY_MARKER_PATH.to_string(),
                permissions: "0644".to_string(),
                content: String::new(),
            });
        }
        let registry = &options.private_registry;
        if registry.is_configured() {
            write_files.push(WriteFile {
                path: REGISTRY_ENV_PATH.to_string(),
                permissions: "0600".to_string(),
                content: format!(
                    "REGISTRY_URL={}\nREGISTRY_USERNAME={}\nREGISTRY_PASSWORD={}\n",
                    registry.url, registry.username, registry.password
                ),
            });
        }

        let etcd = Etcd {
            discovery: options
                .discovery_url
                .as_ref()
                .map(|url| url.as_str().to_string()),
            proxy: options.etcd_proxy.then(|| "on".to_string()),
            advertise_client_urls: format!("http://{}:2379", private_ip),
            initial_advertise_peer_urls: format!("http://{}:2380", private_ip),
            listen_client_urls: "http://0.0.0.0:2379,http://0.0.0.0:4001".to_string(),
            listen_peer_urls: format!("http://{}:2380", private_ip),
        };

        Self {
            hostname: Some(options.instance_name.clone()),
            ssh_authorized_keys: ssh_keys,
            coreos: CoreOs {
                etcd2: Some(etcd),
                update: Update {
                    reboot_strategy: options.reboot_strategy,
                },
                units: vec![
                    Unit {
                        name: "etcd2.service".to_string(),
                        command: Some("start".to_string()),
                        content: None,
                    },
                    Unit {
                        name: "bootstrap.service".to_string(),
                        command: Some("start".to_string()),
                        content: Some(bootstrap_unit(
                            &options.bootstrap_image,
                            private_ip,
                            registry.is_configured(),
                        )),
                    },
                ],
            },
            write_files,
        }
    }

    pub fn render(&self) -> ProviderResult<String> {
        let yaml = serde_yaml::to_string(self)
            .context(ErrorKind::Validation, "Unable to render cloud-config")?;
        let yaml = yaml.strip_prefix("---\n").unwrap_or(&yaml);
        Ok(format!("#cloud-config\n{}", yaml))
    }
}

/// With `registry_login` the unit logs in to the private registry before pulling. `$$` leaves the
/// credentials to the shell, so they never show up in the unit's command line.
fn bootstrap_unit(image: &str, private_ip: &str, registry_login: bool) -> String {
    let mut lines = vec![
        "[Unit]".to_string(),
        "Description=Cluster bootstrap agent".to_string(),
        "Requires=docker.service".to_string(),
        "After=docker.service".to_string(),
        String::new(),
        "[Service]".to_string(),
        "Type=oneshot".to_string(),
        "RemainAfterExit=yes".to_string(),
        format!("EnvironmentFile=-{}", REGISTRY_ENV_PATH),
    ];
    if registry_login {
        lines.push(
            "ExecStartPre=/bin/sh -c 'echo \"$$REGISTRY_PASSWORD\" | /usr/bin/docker login \
             -u \"$$REGISTRY_USERNAME\" --password-stdin \"$$REGISTRY_URL\"'"
                .to_string(),
        );
    }
    lines.push(format!("ExecStartPre=/usr/bin/docker pull {}", image));
    lines.push(format!(
        "ExecStart=/usr/bin/docker run --rm --net=host --privileged -v /etc:/etc {} --private-ip={}",
        image, private_ip
    ));
    lines.join("\n") + "\n"
}
