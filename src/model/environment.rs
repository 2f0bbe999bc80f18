use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    MacOS,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        #[cfg(target_os = "macos")]
        return Platform::MacOS;
        #[cfg(target_os = "windows")]
        return Platform::Windows;
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        return Platform::Linux;
    }
}

/// Where a virtual environment keeps its executables on a given platform.
///
/// Candidate lists are ordered; the first match wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvLayout {
    pub bin_dir: String,
    pub python: Vec<String>,
    pub pip: Vec<String>,
    pub activate: Vec<String>,
}

impl EnvLayout {
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Windows => Self {
                bin_dir: "Scripts".to_string(),
                python: strings(&["python.exe", "python3.exe"]),
                pip: strings(&["pip.exe", "pip3.exe"]),
                activate: strings(&["activate.bat", "activate.ps1", "activate"]),
            },
            Platform::Linux | Platform::MacOS => Self {
                bin_dir: "bin".to_string(),
                python: strings(&["python", "python3"]),
                pip: strings(&["pip", "pip3"]),
                activate: strings(&["activate"]),
            },
        }
    }
}

impl Default for EnvLayout {
    fn default() -> Self {
        Self::for_platform(Platform::current())
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// A directory confirmed to be a working virtual environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualEnvironment {
    #[serde(rename = "venv_name")]
    pub name: String,
    #[serde(rename = "venv_path")]
    pub path: PathBuf,
    pub python_version: String,
    pub pip_path: PathBuf,
    pub python_path: PathBuf,
}
