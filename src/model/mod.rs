//! Core data types for environments, installed packages, and PyPI metadata.
//!
//! - [`InstalledPackage`] - A package reported by `pip inspect`
//! - [`InspectReport`] - The full `pip inspect` listing
//! - [`LibraryReport`] - Packages of one environment with sizes filled in
//! - [`VirtualEnvironment`] - A confirmed virtual environment
//! - [`PypiInfo`] - Metadata fetched from PyPI
//!
//! # Example
//!
//! ```
//! use venvscan::model::{InstalledPackage, PackageMetadata};
//!
//! let package = InstalledPackage::new(PackageMetadata::new("requests", "2.32.3"), "/env/lib/requests-2.32.3.dist-info");
//! assert_eq!(package.metadata.size, 0);
//! assert!(!package.is_default());
//! ```

mod environment;
mod package;
mod pypi;

pub use environment::*;
pub use package::*;
pub use pypi::*;
