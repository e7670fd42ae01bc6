use super::client::HttpClient;
use async_trait::async_trait;
use std::time::Duration;

use crate::error::SourceUnavailable;

/// Plain reqwest client with the timeouts used for sheet exports.
pub struct BasicClient(reqwest::Client);

impl BasicClient {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new() -> Result<Self, SourceUnavailable> {
        let inner = reqwest::Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .connect_timeout(Self::CONNECT_TIMEOUT)
            .build()?;
        Ok(Self(inner))
    }
}

#[async_trait]
impl HttpClient for BasicClient {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.0.execute(req).await
    }
}
