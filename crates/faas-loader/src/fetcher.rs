use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;

use faas_core::FunctionId;

use crate::compiler::FunctionSource;
use crate::error::LoaderError;

/// Capability interface the loader uses to retrieve compiled-function
/// metadata from an upstream service, per spec.md §4.C / §6.
#[async_trait]
pub trait UpstreamFetcher: Send + Sync {
    async fn fetch_function(&self, function_id: &FunctionId) -> Result<FunctionSource, LoaderError>;
}

#[derive(Deserialize)]
struct FunctionSourceWire {
    code: String,
    #[serde(default)]
    tests: Option<String>,
    #[serde(default)]
    script: Option<String>,
}

/// Fetches function source from `{baseUrl}/functions/{id}` (spec.md §6),
/// bounded by the loader's configured timeout.
pub struct HttpUpstreamFetcher {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpUpstreamFetcher {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl UpstreamFetcher for HttpUpstreamFetcher {
    async fn fetch_function(&self, function_id: &FunctionId) -> Result<FunctionSource, LoaderError> {
        let url = format!("{}/functions/{}", self.base_url, function_id.as_str());

        let response = tokio::time::timeout(self.timeout, self.client.get(&url).send())
            .await
            .map_err(|_| LoaderError::LoadTimeout {
                timeout_ms: self.timeout.as_millis() as u64,
            })?
            .map_err(|e| LoaderError::LoadError(e.to_string()))?;

        match response.status().as_u16() {
            200..=299 => {
                let wire: FunctionSourceWire = tokio::time::timeout(self.timeout, response.json())
                    .await
                    .map_err(|_| LoaderError::LoadTimeout {
                        timeout_ms: self.timeout.as_millis() as u64,
                    })?
                    .map_err(|e| LoaderError::LoadError(e.to_string()))?;
                Ok(FunctionSource {
                    code: wire.code,
                    tests: wire.tests,
                    script: wire.script,
                })
            }
            404 => Err(LoaderError::FunctionNotFound),
            status => Err(LoaderError::LoaderServiceError { status_code: status }),
        }
    }
}

/// Fixed in-memory source table, standing in for upstream during tests.
#[derive(Default)]
pub struct StaticUpstreamFetcher {
    sources: Mutex<HashMap<FunctionId, FunctionSource>>,
    fail_not_found: Mutex<Vec<FunctionId>>,
}

impl StaticUpstreamFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, function_id: FunctionId, source: FunctionSource) {
        self.sources.lock().insert(function_id, source);
    }

    pub fn fail_with_not_found(&self, function_id: FunctionId) {
        self.fail_not_found.lock().push(function_id);
    }
}

#[async_trait]
impl UpstreamFetcher for StaticUpstreamFetcher {
    async fn fetch_function(&self, function_id: &FunctionId) -> Result<FunctionSource, LoaderError> {
        if self.fail_not_found.lock().contains(function_id) {
            return Err(LoaderError::FunctionNotFound);
        }
        self.sources
            .lock()
            .get(function_id)
            .cloned()
            .ok_or(LoaderError::FunctionNotFound)
    }
}
