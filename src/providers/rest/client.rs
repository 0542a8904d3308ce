use log::debug;
use reqwest::Client;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{CitreeError, HostErrorKind, Result};

pub struct RestClient {
    client: Client,
    base_url: Url,
    api_url: Url,
    token: Option<String>,
}

impl RestClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("citree/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CitreeError::Config(format!("Failed to create HTTP client: {e}")))?;

        // Url::join replaces the last segment unless the base ends with '/'
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };

        let base_url = Url::parse(&normalized)
            .map_err(|e| CitreeError::Config(format!("Invalid base URL: {e}")))?;

        let api_url = base_url
            .join("api/")
            .map_err(|e| CitreeError::Config(format!("Invalid API base URL: {e}")))?;

        Ok(Self {
            client,
            base_url,
            api_url,
            token,
        })
    }

    /// Helper to build authenticated requests
    fn auth_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(token) = &self.token {
            request.bearer_auth(token)
        } else {
            request
        }
    }

    /// URL of a page of the host's web interface.
    pub fn web_url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| CitreeError::Config(format!("Invalid URL for {path}: {e}")))
    }

    pub fn api_url(&self, path: &str) -> Result<Url> {
        self.api_url
            .join(path)
            .map_err(|e| CitreeError::Config(format!("Invalid API URL for {path}: {e}")))
    }

    /// GET `{host}/api/{path}` and decode the JSON body.
    pub async fn get_json<T>(&self, path: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = self.api_url(path)?;
        self.get_json_url(url).await
    }

    /// GET an absolute (or host-relative) URL and decode the JSON body.
    pub async fn get_json_url<T>(&self, url: Url) -> Result<T>
    where
        T: DeserializeOwned,
    {
        debug!("GET {url}");

        let response = self
            .auth_request(self.client.get(url.clone()))
            .send()
            .await
            .map_err(|e| host_error(&url, HostErrorKind::Unknown, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(host_error(
                &url,
                HostErrorKind::from_status(status.as_u16()),
                format!("status {status}: {error_text}"),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| host_error(&url, HostErrorKind::Unknown, format!("invalid body: {e}")))
    }
}

fn host_error(url: &Url, kind: HostErrorKind, detail: String) -> CitreeError {
    CitreeError::HostCommunication {
        url: url.to_string(),
        kind,
        detail,
    }
}

/// Percent-encodes each segment of a slash separated name.
pub fn encode_path(name: &str) -> String {
    name.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
