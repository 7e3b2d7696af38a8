use crate::error::{ErrorKind, ProviderError, ProviderResult};
use meshfleet_model::constants::{ETCD_PROXY_MARKER_PATH, MACHINE_ID_PATH};
use meshfleet_model::ClusterInstance;
use std::path::Path;

/// Runs one command on one node. Implementations may use SSH, a local shell or an agent RPC.
///
/// `stdin` is written to the command's standard input (empty means nothing is written). With
/// `sudo` set the command runs with elevated privileges. On success the captured standard output
/// is returned; a non-zero exit is an error of kind [`ErrorKind::Remote`].
#[async_trait::async_trait]
pub trait RemoteExec: Send + Sync {
    async fn run(&self, host: &str, command: &str, stdin: &str, sudo: bool)
        -> ProviderResult<String>;
}

/// Remote capabilities of a [`ClusterInstance`]. All node mutations go through these.
#[async_trait::async_trait]
pub trait InstanceExt {
    async fn run_remote_command(
        &self,
        remote: &dyn RemoteExec,
        command: &str,
        stdin: &str,
        sudo: bool,
    ) -> ProviderResult<String>;

    /// The node's machine identifier. Also serves as the reachability probe.
    async fn machine_id(&self, remote: &dyn RemoteExec) -> ProviderResult<String>;

    /// Whether the node reports itself as a non-voting proxy member.
    async fn is_etcd_proxy(&self, remote: &dyn RemoteExec) -> ProviderResult<bool>;

    async fn make_dir(&self, remote: &dyn RemoteExec, dir: &str) -> ProviderResult<()>;

    /// Overwrite `path` with `content`, creating the parent directory first. Nothing of `content`
    /// comes back in the command output.
    async fn write_file(&self, remote: &dyn RemoteExec, path: &str, content: &str)
        -> ProviderResult<()>;

    async fn read_file(&self, remote: &dyn RemoteExec, path: &str) -> ProviderResult<String>;
}

#[async_trait::async_trait]
impl InstanceExt for ClusterInstance {
    async fn run_remote_command(
        &self,
        remote: &dyn RemoteExec,
        command: &str,
        stdin: &str,
        sudo: bool,
    ) -> ProviderResult<String> {
        remote.run(self.host(), command, stdin, sudo).await
    }

    async fn machine_id(&self, remote: &dyn RemoteExec) -> ProviderResult<String> {
        let output = self
            .run_remote_command(remote, &format!("cat {}", MACHINE_ID_PATH), "", false)
            .await?;
        let machine_id = output.trim();
        if machine_id.is_empty() {
            return Err(ProviderError::new_with_context(
                ErrorKind::Remote,
                format!("Instance '{}' reported an empty machine ID", self.name),
            ));
        }
        Ok(machine_id.to_string())
    }

    async fn is_etcd_proxy(&self, remote: &dyn RemoteExec) -> ProviderResult<bool> {
        let output = self
            .run_remote_command(
                remote,
                &format!(
                    "test -e {} && echo yes || echo no",
                    ETCD_PROXY_MARKER_PATH
                ),
                "",
                false,
            )
            .await?;
        Ok(output.trim() == "yes")
    }

    async fn make_dir(&self, remote: &dyn RemoteExec, dir: &str) -> ProviderResult<()> {
        self.run_remote_command(remote, &format!("mkdir -p {}", dir), "", true)
            .await?;
        Ok(())
    }

    async fn write_file(
        &self,
        remote: &dyn RemoteExec,
        path: &str,
        content: &str,
    ) -> ProviderResult<()> {
        if let Some(dir) = Path::new(path).parent().and_then(|p| p.to_str()) {
            if !dir.is_empty() && dir != "/" {
                self.make_dir(remote, dir).await?;
            }
        }
        // tee echoes its input, which may be key material, into the captured output.
        self.run_remote_command(remote, &format!("tee {} > /dev/null", path), content, true)
            .await?;
        Ok(())
    }

    async fn read_file(&self, remote: &dyn RemoteExec, path: &str) -> ProviderResult<String> {
        self.run_remote_command(remote, &format!("cat {}", path), "", false)
            .await
    }
}
