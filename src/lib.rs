pub mod cache;
pub mod checker;
pub mod config;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod platform;
pub mod process;
pub mod scanner;

pub use cache::MetadataCache;
pub use config::Config;
pub use error::{Result, ScanError};
pub use model::{
    InstalledPackage, LibraryReport, OutdatedInfo, PackageMetadata, Platform, PypiInfo,
    VirtualEnvironment,
};
pub use pipeline::WorkerPool;
pub use process::{CommandRunner, SystemRunner};
pub use scanner::{discover_environments, find_interpreters, scan_library};
