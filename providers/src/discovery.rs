use crate::http::{base_url, check_status, endpoint};
use async_trait::async_trait;
use cluster_agent::model::DiscoveryUrl;
use cluster_agent::{DiscoveryService, ErrorKind, IntoProviderError, ProviderError, ProviderResult};
use log::debug;
use reqwest::Client;
use url::Url;

pub const ETCD_DISCOVERY_URL: &str = "https://discovery.etcd.io/";

/// Requests discovery tokens from an etcd discovery service.
pub struct EtcdDiscovery {
    http: Client,
    base_url: Url,
}

impl EtcdDiscovery {
    pub fn new() -> ProviderResult<Self> {
        Self::with_base_url(ETCD_DISCOVERY_URL)
    }

    pub fn with_base_url(url: &str) -> ProviderResult<Self> {
        Ok(Self {
            http: Client::new(),
            base_url: base_url(url)?,
        })
    }
}

#[async_trait]
impl DiscoveryService for EtcdDiscovery {
    async fn new_discovery_url(&self, size: usize) -> ProviderResult<DiscoveryUrl> {
        let response = self
            .http
            .get(endpoint(&self.base_url, "new")?)
            .query(&[("size", size)])
            .send()
            .await
            .context(ErrorKind::Remote, "Unable to request a discovery URL")?;
        let body = check_status(response, "discovery URL request")
            .await?
            .text()
            .await
            .context(ErrorKind::Remote, "Unable to read the discovery URL")?;
        debug!("Obtained discovery URL '{}' for {} member(s)", body.trim(), size);
        DiscoveryUrl::new(body.trim()).map_err(|e| {
            ProviderError::new_with_source_and_context(
                ErrorKind::Remote,
                "The discovery service returned an invalid URL",
                e,
            )
        })
    }
}
