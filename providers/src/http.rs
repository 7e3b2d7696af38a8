use cluster_agent::{ErrorKind, IntoProviderError, ProviderError, ProviderResult};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

/// Parses `base_url` so that relative endpoint paths are appended to it.
pub(crate) fn base_url(base_url: &str) -> ProviderResult<Url> {
    let base_url = if base_url.ends_with('/') {
        base_url.to_string()
    } else {
        format!("{}/", base_url)
    };
    Url::parse(&base_url).context(
        ErrorKind::Validation,
        format!("Invalid API URL '{}'", base_url),
    )
}

pub(crate) fn endpoint(base_url: &Url, path: &str) -> ProviderResult<Url> {
    base_url.join(path).context(
        ErrorKind::Validation,
        format!("Invalid API path '{}'", path),
    )
}

/// Turns a non-success response into an error carrying the response body. `404` becomes
/// [`ErrorKind::NotFound`].
pub(crate) async fn check_status(response: Response, what: &str) -> ProviderResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let kind = if status == StatusCode::NOT_FOUND {
        ErrorKind::NotFound
    } else {
        ErrorKind::Remote
    };
    Err(ProviderError::new_with_context(
        kind,
        format!("{} failed with status {}: {}", what, status, body.trim()),
    ))
}

pub(crate) async fn read_json<T: DeserializeOwned>(response: Response, what: &str) -> ProviderResult<T> {
    check_status(response, what)
        .await?
        .json()
        .await
        .context(ErrorKind::Remote, format!("Unable to parse the response of {}", what))
}
