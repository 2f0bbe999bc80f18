//! Remote metadata lookups.
//!
//! [`MetadataSource`] is the seam between the fetch-and-cache logic and the
//! network; [`PypiClient`] is the real implementation.

mod pypi;
mod version;

pub use pypi::{fetch_metadata, PypiClient, PYPI_BASE_URL};
pub use version::{check_outdated, is_newer};

use crate::error::Result;
use crate::model::PypiProject;
use async_trait::async_trait;

#[async_trait]
pub trait MetadataSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fetches the latest project metadata for `package`.
    async fn fetch(&self, package: &str) -> Result<PypiProject>;
}

pub fn default_source() -> PypiClient {
    PypiClient::new()
}
