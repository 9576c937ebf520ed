//! HTTP fetch seam for provider clients, plus the per-request response
//! cache that memoizes bodies for the duration of one evaluation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
#[cfg(test)]
use mockall::automock;

use super::errors::ProviderError;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait HttpFetch: Send + Sync {
    /// GET the URL and return the response body as text.
    async fn fetch_text(&self, url: &str) -> Result<String, ProviderError>;
}

pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ProviderError::transport_with_context("<client setup>", e))?;
        Ok(ReqwestFetcher { client })
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, ProviderError> {
        debug!("Fetching {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProviderError::transport_with_context(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        response
            .text()
            .await
            .map_err(|e| ProviderError::transport_with_context(url, e))
    }
}

/// Response memo scoped to one request evaluation. Clones share the
/// backing map, so every provider call made while answering one query
/// sees the same entries. Only successful bodies are cached.
#[derive(Clone)]
pub struct FetchCache {
    entries: Arc<Mutex<HashMap<String, String>>>,
    hits: Arc<AtomicU64>,
}

impl FetchCache {
    pub fn new() -> Self {
        FetchCache {
            entries: Arc::new(Mutex::new(HashMap::new())),
            hits: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn fetch(
        &self,
        fetcher: &dyn HttpFetch,
        url: &str,
    ) -> Result<String, ProviderError> {
        {
            let entries = self.entries.lock().unwrap();
            if let Some(body) = entries.get(url) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Fetch cache hit for {}", url);
                return Ok(body.clone());
            }
        }
        let body = fetcher.fetch_text(url).await?;
        self.entries
            .lock()
            .unwrap()
            .insert(url.to_string(), body.clone());
        Ok(body)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }
}

impl Default for FetchCache {
    fn default() -> Self {
        Self::new()
    }
}
