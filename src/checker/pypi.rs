use super::MetadataSource;
use crate::cache::MetadataCache;
use crate::error::Result;
use crate::model::{PypiInfo, PypiProject};
use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub const PYPI_BASE_URL: &str = "https://pypi.org/pypi";

pub struct PypiClient {
    client: reqwest::Client,
    base_url: String,
}

impl PypiClient {
    pub fn new() -> Self {
        Self::with_base_url(PYPI_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn project_url(&self, package: &str) -> String {
        format!("{}/{}/json", self.base_url, package)
    }
}

impl Default for PypiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct PypiResponse {
    info: PypiProject,
}

#[async_trait]
impl MetadataSource for PypiClient {
    fn name(&self) -> &'static str {
        "PyPI"
    }

    async fn fetch(&self, package: &str) -> Result<PypiProject> {
        let response = self
            .client
            .get(self.project_url(package))
            .header("Accept", "application/json")
            .send()
            .await?
            .error_for_status()?;

        let body: PypiResponse = response.json().await?;
        Ok(body.info)
    }
}

/// Returns metadata for `packages`, fetching only what the cache lacks.
///
/// Every missing package gets one concurrent request with no retry. Failed
/// lookups are logged and left out of the result. New entries are inserted
/// into `cache`; persisting it is up to the caller.
pub async fn fetch_metadata(
    packages: &[String],
    source: &dyn MetadataSource,
    cache: &MetadataCache,
) -> BTreeMap<String, PypiInfo> {
    let missing = cache.missing(packages);
    debug!(requested = packages.len(), missing = missing.len(), source = source.name(), "Fetching metadata");

    let fetches = missing.iter().map(|name| async move {
        let result = source.fetch(name).await;
        (*name, result)
    });

    // Fetched entries are returned as-is, whatever the cache TTL.
    let mut found = BTreeMap::new();
    for (name, result) in join_all(fetches).await {
        match result {
            Ok(project) => {
                let info = PypiInfo::new(project, Utc::now());
                cache.insert(name, info.clone());
                found.insert(name.to_string(), info);
            }
            Err(e) => warn!(package = name, error = %e, "Metadata fetch failed"),
        }
    }

    for name in packages {
        if !found.contains_key(name) {
            if let Some(info) = cache.get(name) {
                found.insert(name.clone(), info);
            }
        }
    }
    found
}
