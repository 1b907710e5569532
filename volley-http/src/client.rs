//! HTTP client implementation

use crate::config::HttpConfig;
use crate::errors::HttpError;
use crate::types::HttpMethod;
use crate::{LOCATION_HEADER, REPLAY_NONCE_HEADER};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

/// A fully-read response from the target server
#[derive(Debug, Clone)]
pub struct TargetResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TargetResponse {
    /// First value of a header, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Fresh anti-replay nonce carried by this response, if any
    pub fn replay_nonce(&self) -> Option<&str> {
        self.header(REPLAY_NONCE_HEADER).filter(|n| !n.is_empty())
    }

    /// URL of the resource this response created, if any
    pub fn location(&self) -> Option<&str> {
        self.header(LOCATION_HEADER).filter(|l| !l.is_empty())
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Pooled transport to the target server
///
/// Cloning is cheap: clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct TargetClient {
    client: Client,
}

impl TargetClient {
    /// Build a client with the given configuration
    pub fn with_config(config: &HttpConfig) -> Result<Self, HttpError> {
        debug!(
            "Creating TargetClient with timeout: {}s",
            config.timeout.as_secs()
        );

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .pool_max_idle_per_host(config.max_idle_per_host)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| HttpError::ConfigError(e.to_string()))?;

        Ok(Self { client })
    }

    pub async fn head(&self, url: &str) -> Result<TargetResponse, HttpError> {
        self.send(HttpMethod::Head, url, None).await
    }

    pub async fn get(&self, url: &str) -> Result<TargetResponse, HttpError> {
        self.send(HttpMethod::Get, url, None).await
    }

    /// POST an already-serialised JSON document
    pub async fn post_json(&self, url: &str, body: Vec<u8>) -> Result<TargetResponse, HttpError> {
        self.send(HttpMethod::Post, url, Some(body)).await
    }

    /// Issue a request and read the whole response
    ///
    /// Non-2xx statuses are returned as responses, not errors; only transport
    /// failures surface as `HttpError`.
    pub async fn send(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> Result<TargetResponse, HttpError> {
        let url = reqwest::Url::parse(url).map_err(|e| HttpError::InvalidUrl(format!("{url}: {e}")))?;

        let mut request = self.client.request(method.into(), url.clone());
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        debug!("{} {} -> {} ({} bytes)", method, url.path(), status, body.len());

        Ok(TargetResponse {
            status,
            headers,
            body,
        })
    }
}
