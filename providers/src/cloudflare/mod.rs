use crate::http::{base_url, endpoint, read_json};
use async_trait::async_trait;
use cluster_agent::provider::{DnsRecord, RecordType};
use cluster_agent::{DnsProvider, ErrorKind, IntoProviderError, ProviderError, ProviderResult};
use log::{debug, info};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

pub const CLOUDFLARE_API_URL: &str = "https://api.cloudflare.com/client/v4/";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Record {
    id: String,
    #[serde(rename = "type")]
    record_type: String,
    name: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct NewRecord<'a> {
    #[serde(rename = "type")]
    record_type: RecordType,
    name: &'a str,
    content: &'a str,
    /// `1` means automatic.
    ttl: u32,
    proxied: bool,
}

impl From<Record> for DnsRecord {
    fn from(r: Record) -> Self {
        DnsRecord {
            id: r.id,
            record_type: r.record_type,
            name: r.name,
            content: r.content,
        }
    }
}

/// DNS records in Cloudflare, authenticated with an account email and API key.
pub struct CloudflareDns {
    http: Client,
    base_url: Url,
    api_key: String,
    email: String,
}

impl CloudflareDns {
    pub fn new<S1, S2>(api_key: S1, email: S2) -> ProviderResult<Self>
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self::with_base_url(api_key, email, CLOUDFLARE_API_URL)
    }

    pub fn with_base_url<S1, S2>(api_key: S1, email: S2, url: &str) -> ProviderResult<Self>
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Ok(Self {
            http: Client::new(),
            base_url: base_url(url)?,
            api_key: api_key.into(),
            email: email.into(),
        })
    }

    fn request(&self, method: Method, path: &str) -> ProviderResult<RequestBuilder> {
        Ok(self
            .http
            .request(method, endpoint(&self.base_url, path)?)
            .header("X-Auth-Key", &self.api_key)
            .header("X-Auth-Email", &self.email))
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> ProviderResult<Option<T>> {
        let response = request
            .send()
            .await
            .context(ErrorKind::Remote, format!("Unable to send {}", what))?;
        let envelope: Envelope<T> = read_json(response, what).await?;
        if !envelope.success {
            let messages: Vec<String> = envelope
                .errors
                .iter()
                .map(|e| format!("{} ({})", e.message, e.code))
                .collect();
            return Err(ProviderError::new_with_context(
                ErrorKind::Remote,
                format!("{} was rejected: {}", what, messages.join(", ")),
            ));
        }
        Ok(envelope.result)
    }

    async fn zone_id(&self, domain: &str) -> ProviderResult<String> {
        let request = self
            .request(Method::GET, "zones")?
            .query(&[("name", domain)]);
        let zones: Vec<Zone> = self
            .send(request, "zone lookup")
            .await?
            .unwrap_or_default();
        zones
            .into_iter()
            .next()
            .map(|zone| zone.id)
            .context(ErrorKind::NotFound, format!("No DNS zone for '{}'", domain))
    }

    async fn records(
        &self,
        zone_id: &str,
        record_type: Option<RecordType>,
        name: Option<&str>,
    ) -> ProviderResult<Vec<Record>> {
        let mut query = vec![("per_page", "100".to_string())];
        if let Some(record_type) = record_type {
            query.push(("type", record_type.to_string()));
        }
        if let Some(name) = name {
            query.push(("name", name.to_string()));
        }
        let request = self
            .request(Method::GET, &format!("zones/{}/dns_records", zone_id))?
            .query(&query);
        Ok(self
            .send(request, "DNS record listing")
            .await?
            .unwrap_or_default())
    }
}

#[async_trait]
impl DnsProvider for CloudflareDns {
    async fn domain_records(&self, domain: &str) -> ProviderResult<Vec<DnsRecord>> {
        let zone_id = self.zone_id(domain).await?;
        Ok(self
            .records(&zone_id, None, None)
            .await?
            .into_iter()
            .map(DnsRecord::from)
            .collect())
    }

    async fn create_record(
        &self,
        domain: &str,
        record_type: RecordType,
        name: &str,
        content: &str,
    ) -> ProviderResult<()> {
        let zone_id = self.zone_id(domain).await?;
        let existing = self.records(&zone_id, Some(record_type), Some(name)).await?;
        if existing.iter().any(|r| r.content == content) {
            debug!("{} record '{}' -> '{}' already exists", record_type, name, content);
            return Ok(());
        }

        info!("Creating {} record '{}' -> '{}'", record_type, name, content);
        let request = self
            .request(Method::POST, &format!("zones/{}/dns_records", zone_id))?
            .json(&NewRecord {
                record_type,
                name,
                content,
                ttl: 1,
                proxied: false,
            });
        self.send::<Record>(request, "DNS record creation").await?;
        Ok(())
    }

    async fn delete_records(
        &self,
        domain: &str,
        record_type: RecordType,
        name: &str,
        content: Option<&str>,
    ) -> ProviderResult<()> {
        let zone_id = self.zone_id(domain).await?;
        let records = self.records(&zone_id, Some(record_type), Some(name)).await?;
        for record in records
            .iter()
            .filter(|r| content.map_or(true, |c| r.content == c))
        {
            info!("Deleting {} record '{}' -> '{}'", record_type, name, record.content);
            let request = self.request(
                Method::DELETE,
                &format!("zones/{}/dns_records/{}", zone_id, record.id),
            )?;
            self.send::<serde_json::Value>(request, "DNS record deletion")
                .await?;
        }
        Ok(())
    }
}
