use cluster_agent::error::{ErrorKind, ProviderError, ProviderResult};
use cluster_agent::model::constants::{ETCD_PROXY_MARKER_PATH, MACHINE_ID_PATH};
use cluster_agent::RemoteExec;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

#[derive(Clone, Debug, Default)]
pub(crate) struct MockNode {
    pub(crate) files: BTreeMap<String, String>,
    /// The next this many machine-ID probes fail.
    pub(crate) probe_failures: u32,
    pub(crate) probes: u32,
    pub(crate) key_generations: u32,
}

/// Simulates one file system per node. Node state only changes through [`RemoteExec::run`].
#[derive(Debug, Default)]
pub(crate) struct MockRemote {
    nodes: Mutex<HashMap<String, MockNode>>,
    failing_commands: Mutex<Vec<(String, String)>>,
    commands: Mutex<Vec<(String, String)>>,
}

impl MockRemote {
    pub(crate) fn add_node(&self, host: &str, machine_id: &str) {
        let mut node = MockNode::default();
        node.files
            .insert(MACHINE_ID_PATH.to_string(), format!("{}\n", machine_id));
        self.nodes.lock().unwrap().insert(host.to_string(), node);
    }

    pub(crate) fn mark_proxy(&self, host: &str) {
        self.with_node(host, |node| {
            node.files
                .insert(ETCD_PROXY_MARKER_PATH.to_string(), String::new());
        });
    }

    pub(crate) fn fail_probes(&self, host: &str, count: u32) {
        self.with_node(host, |node| node.probe_failures = count);
    }

    /// Every command on `host` starting with `prefix` fails from now on.
    pub(crate) fn fail_command(&self, host: &str, prefix: &str) {
        self.failing_commands
            .lock()
            .unwrap()
            .push((host.to_string(), prefix.to_string()));
    }

    pub(crate) fn node(&self, host: &str) -> MockNode {
        self.nodes.lock().unwrap().get(host).cloned().unwrap()
    }

    pub(crate) fn file(&self, host: &str, path: &str) -> Option<String> {
        self.node(host).files.get(path).cloned()
    }

    /// Names of the files directly inside `dir`.
    pub(crate) fn dir_entries(&self, host: &str, dir: &str) -> Vec<String> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        self.node(host)
            .files
            .keys()
            .filter_map(|path| path.strip_prefix(&prefix))
            .filter(|rest| !rest.contains('/'))
            .map(str::to_string)
            .collect()
    }

    pub(crate) fn commands(&self) -> Vec<(String, String)> {
        self.commands.lock().unwrap().clone()
    }

    pub(crate) fn commands_on(&self, host: &str) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|(h, _)| h == host)
            .map(|(_, c)| c)
            .collect()
    }

    fn with_node<F: FnOnce(&mut MockNode)>(&self, host: &str, f: F) {
        let mut nodes = self.nodes.lock().unwrap();
        f(nodes.get_mut(host).unwrap())
    }

    fn execute(node: &mut MockNode, host: &str, command: &str, stdin: &str) -> Result<String, String> {
        let words: Vec<&str> = command.split_whitespace().collect();
        match words.as_slice() {
            ["mkdir", "-p", _] | ["chmod", ..] | ["systemctl", ..] => Ok(String::new()),
            ["tee", path, ">", "/dev/null"] => {
                node.files.insert(path.to_string(), stdin.to_string());
                Ok(String::new())
            }
            ["cat", path] => {
                if *path == MACHINE_ID_PATH {
                    node.probes += 1;
                    if node.probe_failures > 0 {
                        node.probe_failures -= 1;
                        return Err("connection refused".to_string());
                    }
                }
                node.files
                    .get(*path)
                    .cloned()
                    .ok_or_else(|| format!("cat: {}: No such file or directory", path))
            }
            ["rm", "-f", path] => {
                node.files.remove(*path);
                Ok(String::new())
            }
            ["test", "-e", path, "&&", "echo", "yes", "||", "echo", "no"] => {
                Ok(if node.files.contains_key(*path) {
                    "yes\n".to_string()
                } else {
                    "no\n".to_string()
                })
            }
            ["tincd", "-n", vpn, "-K"] => {
                let conf_dir = format!("/etc/tinc/{}", vpn);
                let name = node
                    .files
                    .get(&format!("{}/tinc.conf", conf_dir))
                    .and_then(|conf| {
                        conf.lines()
                            .find_map(|line| line.strip_prefix("Name = "))
                            .map(str::to_string)
                    })
                    .ok_or_else(|| "tincd: no Name in tinc.conf".to_string())?;
                let host_path = format!("{}/hosts/{}", conf_dir, name);
                if node.files.contains_key(&format!("{}/rsa_key.priv", conf_dir)) {
                    return Err("tincd: private key exists".to_string());
                }
                node.key_generations += 1;
                let key = format!("key-{}-{}", host, node.key_generations);
                node.files
                    .insert(format!("{}/rsa_key.priv", conf_dir), key.clone());
                node.files.entry(host_path).or_default().push_str(&format!(
                    "-----BEGIN RSA PUBLIC KEY-----\n{}\n-----END RSA PUBLIC KEY-----\n",
                    key
                ));
                Ok(String::new())
            }
            _ => Err(format!("unknown command '{}'", command)),
        }
    }
}

#[async_trait::async_trait]
impl RemoteExec for MockRemote {
    async fn run(
        &self,
        host: &str,
        command: &str,
        stdin: &str,
        _sudo: bool,
    ) -> ProviderResult<String> {
        self.commands
            .lock()
            .unwrap()
            .push((host.to_string(), command.to_string()));

        let injected = self
            .failing_commands
            .lock()
            .unwrap()
            .iter()
            .any(|(h, prefix)| h == host && command.starts_with(prefix.as_str()));
        if injected {
            return Err(ProviderError::new_with_context(
                ErrorKind::Remote,
                format!("'{}' failed on '{}'", command, host),
            ));
        }

        let mut nodes = self.nodes.lock().unwrap();
        let node = nodes.get_mut(host).ok_or_else(|| {
            ProviderError::new_with_context(
                ErrorKind::Remote,
                format!("No route to host '{}'", host),
            )
        })?;
        Self::execute(node, host, command, stdin)
            .map_err(|message| ProviderError::new_with_context(ErrorKind::Remote, message))
    }
}
