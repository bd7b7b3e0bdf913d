use async_trait::async_trait;
use ok_domain::{Error, Result};

/// Outbound web access, seamed behind a trait so tests can swap in a
/// scripted responder instead of making real HTTP calls.
#[async_trait]
pub trait WebAccess: Send + Sync {
    async fn search(&self, query: &str) -> Result<String>;
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Default `WebAccess` backed by a real HTTP client. `search` hits a
/// text-first search endpoint and returns the raw body — summarizing or
/// ranking results is left to the calling agent's model, not this crate.
pub struct ReqwestWebAccess {
    client: reqwest::Client,
    search_endpoint: String,
}

impl ReqwestWebAccess {
    pub fn new(search_endpoint: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), search_endpoint: search_endpoint.into() }
    }
}

#[async_trait]
impl WebAccess for ReqwestWebAccess {
    async fn search(&self, query: &str) -> Result<String> {
        let resp = self
            .client
            .get(&self.search_endpoint)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| Error::Other(format!("web search request failed: {e}")))?;
        resp.text().await.map_err(|e| Error::Other(format!("web search body failed: {e}")))
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Other(format!("web fetch request failed: {e}")))?;
        resp.text().await.map_err(|e| Error::Other(format!("web fetch body failed: {e}")))
    }
}

/// Scripted responder for tests: returns fixed text regardless of input.
pub struct StaticWebAccess {
    pub search_result: String,
    pub fetch_result: String,
}

#[async_trait]
impl WebAccess for StaticWebAccess {
    async fn search(&self, _query: &str) -> Result<String> {
        Ok(self.search_result.clone())
    }

    async fn fetch(&self, _url: &str) -> Result<String> {
        Ok(self.fetch_result.clone())
    }
}
