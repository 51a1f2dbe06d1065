use std::time::Duration;

use infrastructure::HttpClientConfig;
use reqwest_middleware::ClientWithMiddleware;
use serde::Serialize;
use serde_json::Value;

use super::AdapterError;

//JSON-over-HTTP access to a remote endpoint, every call bounded by the configured timeout
#[derive(Debug, Clone)]
pub struct JsonEndpoint {
    client: ClientWithMiddleware,
    base_url: String,
}

impl JsonEndpoint {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = HttpClientConfig::new(None).with_timeout(timeout).new_tracing_client()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get(&self, path: &str) -> Result<Value, AdapterError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).send().await.map_err(transport_error)?;

        Self::parse(&url, response).await
    }

    pub async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<Value, AdapterError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.post(&url).json(body).send().await.map_err(transport_error)?;

        Self::parse(&url, response).await
    }

    async fn parse(url: &str, response: reqwest::Response) -> Result<Value, AdapterError> {
        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::Rejected(format!("{} returned {}", url, status)));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| AdapterError::Transport(format!("invalid JSON from {}: {}", url, e)))
    }
}

fn transport_error(e: reqwest_middleware::Error) -> AdapterError {
    match e {
        reqwest_middleware::Error::Reqwest(e) if e.is_timeout() => {
            AdapterError::Transport("request timed out".to_string())
        }
        other => AdapterError::Transport(other.to_string()),
    }
}
