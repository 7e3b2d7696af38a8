use crate::http::{base_url, check_status, endpoint, read_json};
use cluster_agent::{ErrorKind, IntoProviderError, ProviderResult};
use log::trace;
use reqwest::{Client, Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use url::Url;

pub const VULTR_API_URL: &str = "https://api.vultr.com/v2/";
const PER_PAGE: &str = "500";

#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(default)]
pub struct Instance {
    pub id: String,
    pub label: String,
    pub hostname: String,
    pub main_ip: String,
    pub v6_main_ip: String,
    pub internal_ip: String,
    pub status: String,
    pub tags: Vec<String>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct CreateInstance {
    pub region: String,
    pub plan: String,
    pub os_id: u32,
    pub label: String,
    pub hostname: String,
    pub tags: Vec<String>,
    pub sshkey_id: Vec<String>,
    /// Base64 encoded.
    pub user_data: String,
    pub enable_ipv6: bool,
    pub enable_private_network: bool,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(default)]
pub struct SshKey {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Plan {
    pub id: String,
    pub vcpu_count: u32,
    pub ram: u64,
    pub disk: u64,
    pub monthly_cost: f64,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(default)]
pub struct Region {
    pub id: String,
    pub city: String,
    pub country: String,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(default)]
pub struct Os {
    pub id: u32,
    pub name: String,
    pub family: String,
}

#[derive(Deserialize)]
struct InstanceResponse {
    instance: Instance,
}

#[derive(Deserialize)]
struct InstancesResponse {
    instances: Vec<Instance>,
}

#[derive(Deserialize)]
struct SshKeysResponse {
    ssh_keys: Vec<SshKey>,
}

#[derive(Deserialize)]
struct PlansResponse {
    plans: Vec<Plan>,
}

#[derive(Deserialize)]
struct RegionsResponse {
    regions: Vec<Region>,
}

#[derive(Deserialize)]
struct OsResponse {
    os: Vec<Os>,
}

/// A thin client for the parts of the Vultr v2 API the provider needs.
#[derive(Clone)]
pub struct VultrClient {
    http: Client,
    base_url: Url,
    api_key: String,
}

impl VultrClient {
    pub fn new<S: Into<String>>(api_key: S) -> ProviderResult<Self> {
        Self::with_base_url(api_key, VULTR_API_URL)
    }

    pub fn with_base_url<S: Into<String>>(api_key: S, url: &str) -> ProviderResult<Self> {
        Ok(Self {
            http: Client::new(),
            base_url: base_url(url)?,
            api_key: api_key.into(),
        })
    }

    fn request(&self, method: Method, path: &str) -> ProviderResult<RequestBuilder> {
        trace!("{} {}", method, path);
        Ok(self
            .http
            .request(method, endpoint(&self.base_url, path)?)
            .bearer_auth(&self.api_key))
    }

    async fn get<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        what: &str,
    ) -> ProviderResult<T> {
        let response = self
            .request(Method::GET, path)?
            .query(query)
            .send()
            .await
            .context(ErrorKind::Remote, format!("Unable to send {}", what))?;
        read_json(response, what).await
    }

    pub async fn list_instances(&self, tag: &str) -> ProviderResult<Vec<Instance>> {
        let response: InstancesResponse = self
            .get(
                "instances",
                &[("tag", tag), ("per_page", PER_PAGE)],
                "list instances",
            )
            .await?;
        Ok(response.instances)
    }

    pub async fn get_instance(&self, id: &str) -> ProviderResult<Instance> {
        let response: InstanceResponse = self
            .get(&format!("instances/{}", id), &[], "get instance")
            .await?;
        Ok(response.instance)
    }

    pub async fn create_instance(&self, request: &CreateInstance) -> ProviderResult<Instance> {
        let response = self
            .request(Method::POST, "instances")?
            .json(request)
            .send()
            .await
            .context(ErrorKind::Remote, "Unable to send create instance")?;
        let response: InstanceResponse = read_json(response, "create instance").await?;
        Ok(response.instance)
    }

    pub async fn delete_instance(&self, id: &str) -> ProviderResult<()> {
        let response = self
            .request(Method::DELETE, &format!("instances/{}", id))?
            .send()
            .await
            .context(ErrorKind::Remote, "Unable to send delete instance")?;
        check_status(response, "delete instance").await?;
        Ok(())
    }

    pub async fn list_ssh_keys(&self) -> ProviderResult<Vec<SshKey>> {
        let response: SshKeysResponse = self
            .get("ssh-keys", &[("per_page", PER_PAGE)], "list SSH keys")
            .await?;
        Ok(response.ssh_keys)
    }

    pub async fn list_plans(&self) -> ProviderResult<Vec<Plan>> {
        let response: PlansResponse = self
            .get("plans", &[("per_page", PER_PAGE)], "list plans")
            .await?;
        Ok(response.plans)
    }

    pub async fn list_regions(&self) -> ProviderResult<Vec<Region>> {
        let response: RegionsResponse = self
            .get("regions", &[("per_page", PER_PAGE)], "list regions")
            .await?;
        Ok(response.regions)
    }

    pub async fn list_os(&self) -> ProviderResult<Vec<Os>> {
        let response: OsResponse = self
            .get("os", &[("per_page", PER_PAGE)], "list operating systems")
            .await?;
        Ok(response.os)
    }
}
