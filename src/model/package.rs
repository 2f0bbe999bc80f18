use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Packages that ship with every fresh virtual environment.
const DEFAULT_PACKAGES: [&str; 3] = ["pip", "setuptools", "wheel"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageMetadata {
    pub name: String,
    pub version: String,
    pub summary: String,
    /// Bytes on disk. Filled in by the size scan, zero until then.
    pub size: u64,
    pub author: String,
    pub license: String,
    pub license_expression: String,
    pub license_file: Vec<String>,
    #[serde(rename = "classifier")]
    pub classifiers: Vec<String>,
    pub requires_dist: Vec<String>,
    pub requires_python: String,
    pub project_url: Vec<String>,
    pub provides_extra: Vec<String>,
}

impl PackageMetadata {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageTag {
    Default,
    Installed,
}

impl PackageTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageTag::Default => "default",
            PackageTag::Installed => "installed",
        }
    }
}

impl std::fmt::Display for PackageTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One package found in an environment.
///
/// The name is unique within a single listing. `metadata.size` is the only
/// field changed after parsing, written once by the size scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InstalledPackage {
    pub metadata: PackageMetadata,
    /// The package's `.dist-info` (or `.egg-info`) directory.
    pub metadata_location: PathBuf,
    pub installer: String,
    pub requested: bool,
}

impl InstalledPackage {
    pub fn new(metadata: PackageMetadata, metadata_location: impl Into<PathBuf>) -> Self {
        Self {
            metadata,
            metadata_location: metadata_location.into(),
            installer: "pip".to_string(),
            requested: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn is_default(&self) -> bool {
        DEFAULT_PACKAGES
            .iter()
            .any(|name| name.eq_ignore_ascii_case(&self.metadata.name))
    }

    pub fn tag(&self) -> PackageTag {
        if self.is_default() {
            PackageTag::Default
        } else {
            PackageTag::Installed
        }
    }
}

/// The structured listing produced by `pip inspect`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectReport {
    pub pip_version: String,
    pub installed: Vec<InstalledPackage>,
}

/// Installed packages of one environment, sizes populated, in listing order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryReport {
    pub venv_path: PathBuf,
    pub library_root: PathBuf,
    pub pip_version: String,
    pub scan_time: DateTime<Utc>,
    pub packages: Vec<InstalledPackage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outdated: Vec<OutdatedInfo>,
}

impl LibraryReport {
    pub fn total_size(&self) -> u64 {
        self.packages.iter().map(|p| p.metadata.size).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutdatedInfo {
    pub name: String,
    pub current_version: String,
    pub latest_version: String,
}
