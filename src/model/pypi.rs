use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classifier prefix carrying an OSI license name.
const LICENSE_CLASSIFIER_PREFIX: &str = "License :: OSI Approved :: ";

/// Project metadata as served by `https://pypi.org/pypi/<name>/json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PypiProject {
    pub name: String,
    pub version: String,
    pub summary: Option<String>,
    pub author: Option<String>,
    pub author_email: Option<String>,
    pub classifiers: Vec<String>,
    pub license: Option<String>,
    pub keywords: Option<String>,
    pub maintainer: Option<String>,
    pub maintainer_email: Option<String>,
    pub project_url: Option<String>,
    pub provides_extra: Option<Vec<String>>,
    pub requires_dist: Option<Vec<String>>,
    pub requires_python: Option<String>,
    pub yanked: bool,
    pub yanked_reason: Option<String>,
}

/// A cached PyPI lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PypiInfo {
    pub fetched_at: DateTime<Utc>,
    pub info: PypiProject,
}

impl PypiInfo {
    /// Wraps a fresh response, normalising the license field.
    pub fn new(mut info: PypiProject, fetched_at: DateTime<Utc>) -> Self {
        info.license = Some(resolve_license(&info));
        Self { fetched_at, info }
    }

    pub fn license(&self) -> &str {
        self.info.license.as_deref().unwrap_or("UNKNOWN")
    }
}

/// Picks the first OSI classifier, then the free-form field, then `UNKNOWN`.
pub fn resolve_license(info: &PypiProject) -> String {
    let from_classifier = info
        .classifiers
        .iter()
        .find_map(|c| c.strip_prefix(LICENSE_CLASSIFIER_PREFIX));

    match (from_classifier, info.license.as_deref()) {
        (Some(license), _) => license.to_string(),
        (None, Some(license)) if !license.trim().is_empty() => license.to_string(),
        _ => "UNKNOWN".to_string(),
    }
}
