//! The `config.toml` file.
//!
//! Every key is optional; anything left out keeps its default. CLI flags are
//! applied on top of the loaded values.
//!
//! ```toml
//! max_depth = 2            # negative walks the whole tree
//! discovery_workers = 4
//! size_workers = 0         # 0 = one per CPU, at most 8
//! probe_timeout_secs = 5
//! cache_ttl_hours = 24
//! default_format = "table"
//! check_outdated = false
//! hide_default_packages = false
//!
//! [ignore]
//! packages = ["types-*"]
//! environments = ["*-old"]
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::model::EnvLayout;
use crate::pipeline::{default_size_workers, DISCOVERY_WORKERS};
use crate::platform;
use crate::scanner::envs::{DEFAULT_MAX_DEPTH, DEFAULT_PROBE_TIMEOUT};
use crate::scanner::{DiscoveryOptions, LibraryScanOptions};

/// Tunables for discovery, size scans and PyPI lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How deep environment discovery descends below each root.
    ///
    /// A negative value walks the whole tree.
    /// Default: 2
    pub max_depth: i32,

    /// Worker threads used for environment discovery.
    ///
    /// Default: 4
    pub discovery_workers: usize,

    /// Worker threads used for package size scans.
    ///
    /// Default: 0, meaning the number of CPUs capped at 8
    pub size_workers: usize,

    /// Deadline for each `python --version` check, in seconds.
    ///
    /// Default: 5
    pub probe_timeout_secs: u64,

    /// How long to keep PyPI metadata, in hours.
    ///
    /// Default: 24 hours
    pub cache_ttl_hours: u64,

    /// Default output format when no `--format` flag is provided.
    ///
    /// Valid values: "table", "json"
    /// Default: "table"
    pub default_format: String,

    /// Whether `packages` compares installed versions against PyPI.
    ///
    /// Default: false
    pub check_outdated: bool,

    /// Whether to hide pip, setuptools and wheel from package listings.
    ///
    /// Default: false
    pub hide_default_packages: bool,

    /// Ignore list configuration for trimming output.
    #[serde(default)]
    pub ignore: IgnoreConfig,
}

/// Configuration for hiding specific packages or environments from output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreConfig {
    /// Package names to hide from listings.
    ///
    /// Supports glob patterns (e.g., "types-*", "*-stubs").
    pub packages: Vec<String>,

    /// Environment directory names to hide from discovery results.
    ///
    /// Supports glob patterns (e.g., "*-old").
    pub environments: Vec<String>,
}

impl IgnoreConfig {
    /// Check if a package should be hidden.
    pub fn should_ignore_package(&self, name: &str) -> bool {
        matches_any(&self.packages, name)
    }

    /// Check if an environment should be hidden.
    pub fn should_ignore_environment(&self, name: &str) -> bool {
        matches_any(&self.environments, name)
    }
}

fn matches_any(patterns: &[String], text: &str) -> bool {
    patterns.iter().any(|pattern| {
        if pattern.contains('*') {
            glob_match(pattern, text)
        } else {
            pattern == text
        }
    })
}

/// `*` matches any run of characters, including none.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern = pattern.as_bytes();
    let text = text.as_bytes();
    let (mut p, mut t) = (0, 0);
    // Position of the last `*` seen and the text index it was tried against.
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == b'*' {
            backtrack = Some((p, t));
            p += 1;
        } else if p < pattern.len() && pattern[p] == text[t] {
            p += 1;
            t += 1;
        } else if let Some((star, tried)) = backtrack {
            p = star + 1;
            t = tried + 1;
            backtrack = Some((star, tried + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == b'*')
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH as i32,
            discovery_workers: DISCOVERY_WORKERS,
            size_workers: 0,
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT.as_secs(),
            cache_ttl_hours: 24,
            default_format: "table".to_string(),
            check_outdated: false,
            hide_default_packages: false,
            ignore: IgnoreConfig::default(),
        }
    }
}

impl Config {
    /// Reads [`Config::config_path`], falling back to defaults when absent.
    ///
    /// ```no_run
    /// let config = venvscan::Config::load()?;
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Reads a config file. Keys missing from the file keep their defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Invalid config in {}", path.display()))
    }

    /// Writes to [`Config::config_path`].
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        fs::write(path, toml::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// `<config dir>/venvscan/config.toml`.
    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }

    /// Discovery depth, `None` when unbounded.
    pub fn discovery_depth(&self) -> Option<usize> {
        usize::try_from(self.max_depth).ok()
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Size-scan worker count with the `0 = automatic` rule applied.
    pub fn effective_size_workers(&self) -> usize {
        if self.size_workers == 0 {
            default_size_workers()
        } else {
            self.size_workers
        }
    }

    pub fn discovery_options(&self) -> DiscoveryOptions {
        DiscoveryOptions {
            max_depth: self.discovery_depth(),
            workers: self.discovery_workers,
            probe_timeout: self.probe_timeout(),
            layout: EnvLayout::default(),
        }
    }

    pub fn library_scan_options(&self) -> LibraryScanOptions {
        LibraryScanOptions {
            workers: self.effective_size_workers(),
            layout: EnvLayout::default(),
        }
    }

    /// The default configuration rendered as TOML, as written by `config --init`.
    pub fn generate_default_config() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_default()
    }
}
