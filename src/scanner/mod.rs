//! Environment and package scanners.
//!
//! | Scanner | Job source | Handler |
//! |---------|------------|---------|
//! | [`discover_environments`] | depth-bounded directory walk | venv layout checks + `python --version` |
//! | [`scan_library`] | `pip inspect` + `RECORD` manifests | recursive size sum |
//! | [`find_interpreters`] | platform search paths | `python --version` |
//!
//! All three run on a [`WorkerPool`](crate::pipeline::WorkerPool).
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use venvscan::process::SystemRunner;
//! use venvscan::scanner::{discover_environments, DiscoveryOptions};
//!
//! let envs = discover_environments(
//!     &[PathBuf::from("/home/me/projects")],
//!     &DiscoveryOptions::default(),
//!     &SystemRunner,
//! );
//! for env in envs {
//!     println!("{} ({})", env.path.display(), env.python_version);
//! }
//! ```

pub mod envs;
pub mod inspect;
pub mod interpreters;
pub mod size;

pub use envs::{discover_environments, validate_candidate, walk_candidates, DiscoveryOptions};
pub use inspect::{list_packages, resolve_library_root, EnvTools};
pub use interpreters::{find_interpreters, SearchPath};
pub use size::{measure_packages, resolve_scan_paths, ScanJob, ScanResult};

use crate::error::Result;
use crate::model::{EnvLayout, LibraryReport};
use crate::pipeline::default_size_workers;
use crate::process::CommandRunner;
use chrono::Utc;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone)]
pub struct LibraryScanOptions {
    pub workers: usize,
    pub layout: EnvLayout,
}

impl Default for LibraryScanOptions {
    fn default() -> Self {
        Self {
            workers: default_size_workers(),
            layout: EnvLayout::default(),
        }
    }
}

/// Lists the packages installed in `venv` and measures each one.
///
/// # Errors
///
/// Fails if the environment has no interpreter or pip, if `pip inspect`
/// fails, or if the library root cannot be resolved. Individual packages
/// never fail the scan; an unmeasurable package reports zero bytes.
pub fn scan_library(
    venv: &Path,
    options: &LibraryScanOptions,
    runner: &dyn CommandRunner,
) -> Result<LibraryReport> {
    let venv = std::path::absolute(venv)?;
    let tools = EnvTools::locate(&venv, &options.layout)?;
    let library_root = resolve_library_root(&tools.python, runner)?;
    let mut report = list_packages(&tools.pip, runner)?;

    measure_packages(&mut report.installed, &library_root, options.workers);

    info!(
        venv = %venv.display(),
        packages = report.installed.len(),
        "Library scan finished"
    );

    Ok(LibraryReport {
        venv_path: venv,
        library_root,
        pip_version: report.pip_version,
        scan_time: Utc::now(),
        packages: report.installed,
        outdated: Vec::new(),
    })
}
