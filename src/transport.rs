use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::trace;

use crate::errors::AppResult;

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues a lookup request. An `Err` is a connection-level failure; any
/// response that arrives, whatever its status, is `Ok`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url) -> AppResult<HttpResponse>;
}

#[derive(Clone)]
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> AppResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("csvgeocode/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url) -> AppResult<HttpResponse> {
        let response = self.http.get(url.clone()).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        trace!(status, bytes = body.len(), "lookup response received");
        Ok(HttpResponse { status, body })
    }
}
