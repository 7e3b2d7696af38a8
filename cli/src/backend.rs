use agent_utils::constants::DEFAULT_SSH_USER;
use agent_utils::SshExecutor;
use anyhow::{Context, Result};
use clap::Parser;
use cluster_agent::model::constants::DEFAULT_READINESS_INTERVAL_SECS;
use cluster_agent::{
    CloudProvider, DnsProvider, ErrorPolicy, Orchestrator, ReadinessPolicy, RemoteExec,
};
use log::debug;
use meshfleet_providers::{
    CloudflareDns, EtcdDiscovery, ProviderKind, VagrantProvider, VultrClient, VultrProvider,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Login key Vagrant boxes accept out of the box, relative to the home directory.
const VAGRANT_INSECURE_KEY: &str = ".vagrant.d/insecure_private_key";

/// Selects and configures the backends every command talks to.
// No `Debug`: holds API keys.
#[derive(Parser)]
pub(crate) struct BackendArgs {
    /// The cloud backend to run instances on [vultr|vagrant].
    #[clap(long, env = "MESHFLEET_PROVIDER", default_value = "vultr")]
    provider: ProviderKind,
    /// API key of the Vultr account.
    #[clap(long, env = "VULTR_API_KEY", hide_env_values = true)]
    vultr_api_key: Option<String>,
    /// API key of the Cloudflare account holding the cluster domain.
    #[clap(long, env = "CLOUDFLARE_API_KEY", hide_env_values = true)]
    cloudflare_api_key: Option<String>,
    /// Email address of the Cloudflare account.
    #[clap(long, env = "CLOUDFLARE_EMAIL")]
    cloudflare_email: Option<String>,
    /// User to log in as on the instances.
    #[clap(long, env = "MESHFLEET_SSH_USER", default_value = DEFAULT_SSH_USER)]
    ssh_user: String,
    /// Private key to log in with. Defaults to the SSH agent, or to Vagrant's insecure key for the
    /// vagrant provider.
    #[clap(long, env = "MESHFLEET_SSH_KEYFILE")]
    ssh_keyfile: Option<PathBuf>,
    /// Working folder of the vagrant provider.
    #[clap(long, env = "MESHFLEET_VAGRANT_FOLDER", default_value = "vagrant")]
    vagrant_folder: PathBuf,
    /// Give up waiting for a new instance after this many polls. Waits forever when omitted.
    #[clap(long)]
    ready_timeout_attempts: Option<u32>,
    /// Let every node of a multi-node step finish and report all failures, instead of only the
    /// first one.
    #[clap(long)]
    collect_errors: bool,
}

/// The constructed backends. Commands borrow them for the lifetime of one run.
pub(crate) struct Backend {
    kind: ProviderKind,
    provider: Box<dyn CloudProvider>,
    dns: CloudflareDns,
    dns_configured: bool,
    remote: Arc<dyn RemoteExec>,
    discovery: EtcdDiscovery,
    policy: ErrorPolicy,
}

impl BackendArgs {
    pub(crate) fn build(self) -> Result<Backend> {
        let readiness = match self.ready_timeout_attempts {
            Some(attempts) => ReadinessPolicy::bounded(
                Duration::from_secs(DEFAULT_READINESS_INTERVAL_SECS),
                attempts,
            ),
            None => ReadinessPolicy::default(),
        };

        let keyfile = self.ssh_keyfile.or_else(|| match self.provider {
            ProviderKind::Vagrant => {
                std::env::var_os("HOME").map(|home| PathBuf::from(home).join(VAGRANT_INSECURE_KEY))
            }
            ProviderKind::Vultr => None,
        });
        let mut ssh = SshExecutor::new(self.ssh_user);
        if let Some(keyfile) = keyfile {
            debug!("Logging in to instances with key '{}'", keyfile.display());
            ssh = ssh.with_keyfile(keyfile);
        }
        let remote: Arc<dyn RemoteExec> = Arc::new(ssh);

        let dns_configured = self.cloudflare_api_key.is_some() && self.cloudflare_email.is_some();
        let provider: Box<dyn CloudProvider> = match self.provider {
            ProviderKind::Vultr => {
                let api_key = self
                    .vultr_api_key
                    .context("The vultr provider needs --vultr-api-key or VULTR_API_KEY")?;
                let client = VultrClient::new(api_key).context("Unable to create Vultr client")?;
                Box::new(
                    VultrProvider::new(client, Arc::clone(&remote)).with_readiness(readiness),
                )
            }
            ProviderKind::Vagrant => Box::new(VagrantProvider::new(self.vagrant_folder)),
        };

        let dns = CloudflareDns::new(
            self.cloudflare_api_key.unwrap_or_default(),
            self.cloudflare_email.unwrap_or_default(),
        )
        .context("Unable to create Cloudflare client")?;
        let discovery = EtcdDiscovery::new().context("Unable to create discovery client")?;
        let policy = if self.collect_errors {
            ErrorPolicy::CollectAll
        } else {
            ErrorPolicy::FirstWins
        };

        Ok(Backend {
            kind: self.provider,
            provider,
            dns,
            dns_configured,
            remote,
            discovery,
            policy,
        })
    }
}

impl Backend {
    /// Vagrant machines get no DNS records, every other provider needs Cloudflare access.
    pub(crate) fn orchestrator(&self) -> Result<Orchestrator<'_>> {
        let dns: &dyn DnsProvider = match self.kind {
            ProviderKind::Vagrant => &self.dns,
            ProviderKind::Vultr => self.dns()?,
        };
        Ok(Orchestrator::new(
            self.provider.as_ref(),
            dns,
            self.remote.as_ref(),
            &self.discovery,
        )
        .with_error_policy(self.policy))
    }

    pub(crate) fn provider(&self) -> &dyn CloudProvider {
        self.provider.as_ref()
    }

    /// The DNS provider, for commands that cannot do without one.
    pub(crate) fn dns(&self) -> Result<&dyn DnsProvider> {
        anyhow::ensure!(
            self.dns_configured,
            "DNS access needs --cloudflare-api-key and --cloudflare-email"
        );
        Ok(&self.dns)
    }
}
