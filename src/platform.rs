//! Cross-platform path resolution.
//!
//! Where venvscan keeps its own files, and where system interpreters are
//! usually installed.

use crate::model::Platform;
use crate::scanner::SearchPath;
use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// Directory name used under the platform's data and config roots.
pub const APP_NAME: &str = "venvscan";

/// Returns the application support directory, creating it if needed.
///
/// Platform-specific locations:
/// - Linux: `~/.local/share/venvscan/`
/// - macOS: `~/Library/Application Support/venvscan/`
/// - Windows: `%APPDATA%\venvscan\`
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn app_support_dir() -> Result<PathBuf> {
    let dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME);

    if !dir.exists() {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    Ok(dir)
}

/// Returns the config directory for venvscan.
///
/// Platform-specific locations:
/// - Linux: `~/.config/venvscan/`
/// - macOS: `~/Library/Application Support/venvscan/`
/// - Windows: `%APPDATA%\venvscan\`
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Directories searched for system-wide interpreters on this platform.
pub fn interpreter_search_paths() -> Vec<SearchPath> {
    interpreter_search_paths_for(Platform::current())
}

pub fn interpreter_search_paths_for(platform: Platform) -> Vec<SearchPath> {
    match platform {
        Platform::MacOS => vec![
            SearchPath::Versions(PathBuf::from("/Library/Frameworks/Python.framework/Versions")),
            SearchPath::Flat(PathBuf::from("/opt/homebrew/bin")),
            SearchPath::Flat(PathBuf::from("/usr/local/bin")),
            SearchPath::Flat(PathBuf::from("/usr/bin")),
        ],
        Platform::Linux => vec![
            SearchPath::Flat(PathBuf::from("/usr/local/bin")),
            SearchPath::Flat(PathBuf::from("/usr/bin")),
            SearchPath::Flat(PathBuf::from("/bin")),
        ],
        // Windows installs use `python.exe` names the lookup does not match.
        Platform::Windows => Vec::new(),
    }
}
