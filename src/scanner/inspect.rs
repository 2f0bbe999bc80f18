//! Setup-phase collaborators for the size scan.
//!
//! Everything here is fatal on failure: without the package listing or the
//! library root there is nothing meaningful to measure.

use crate::error::{Result, ScanError};
use crate::model::{EnvLayout, InspectReport};
use crate::process::CommandRunner;
use crate::scanner::envs::find_first;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Prints the environment's `purelib` directory.
const PURELIB_QUERY: &str = "import sysconfig; print(sysconfig.get_paths()['purelib'])";

/// The interpreter and installer of one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvTools {
    pub python: PathBuf,
    pub pip: PathBuf,
}

impl EnvTools {
    /// Finds the executables inside `venv` for the given layout.
    pub fn locate(venv: &Path, layout: &EnvLayout) -> Result<Self> {
        let bin_dir = venv.join(&layout.bin_dir);
        let python = find_first(&bin_dir, &layout.python, true).ok_or_else(|| {
            ScanError::MissingExecutable {
                dir: bin_dir.clone(),
                candidates: layout.python.clone(),
            }
        })?;
        let pip = find_first(&bin_dir, &layout.pip, true).ok_or_else(|| {
            ScanError::MissingExecutable {
                dir: bin_dir.clone(),
                candidates: layout.pip.clone(),
            }
        })?;
        Ok(Self { python, pip })
    }
}

/// Runs `pip inspect` and parses its report.
///
/// Entries without a name are dropped.
pub fn list_packages(pip: &Path, runner: &dyn CommandRunner) -> Result<InspectReport> {
    let output = runner.run(pip, &["inspect"], None)?;
    let mut report: InspectReport = serde_json::from_str(&output.stdout)?;
    report.installed.retain(|p| !p.metadata.name.is_empty());
    debug!(packages = report.installed.len(), pip_version = %report.pip_version, "Parsed pip inspect");
    Ok(report)
}

/// Asks the interpreter where packages are installed.
pub fn resolve_library_root(python: &Path, runner: &dyn CommandRunner) -> Result<PathBuf> {
    let output = runner.run(python, &["-c", PURELIB_QUERY], None)?;
    let root = output.stdout.trim();

    if root.is_empty() {
        return Err(ScanError::LibraryRoot(format!(
            "{} printed nothing",
            python.display()
        )));
    }
    let root = PathBuf::from(root);
    if !root.is_absolute() {
        return Err(ScanError::LibraryRoot(format!(
            "{} is not an absolute path",
            root.display()
        )));
    }
    Ok(root)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::model::Platform;
    use crate::process::test_support::write_script;
    use crate::process::SystemRunner;
    use tempfile::TempDir;

    #[test]
    fn test_locate_tools() {
        let tmp = TempDir::new().unwrap();
        write_script(&tmp.path().join("bin/python3"), "exit 0");
        write_script(&tmp.path().join("bin/pip"), "exit 0");

        let tools = EnvTools::locate(tmp.path(), &EnvLayout::for_platform(Platform::Linux)).unwrap();
        assert_eq!(tools.python, tmp.path().join("bin/python3"));
        assert_eq!(tools.pip, tmp.path().join("bin/pip"));
    }

    #[test]
    fn test_locate_without_pip_fails() {
        let tmp = TempDir::new().unwrap();
        write_script(&tmp.path().join("bin/python"), "exit 0");

        let err = EnvTools::locate(tmp.path(), &EnvLayout::for_platform(Platform::Linux)).unwrap_err();
        assert!(matches!(err, ScanError::MissingExecutable { .. }));
    }

    #[test]
    fn test_list_packages_drops_nameless() {
        let tmp = TempDir::new().unwrap();
        let pip = write_script(
            &tmp.path().join("pip"),
            r#"cat <<'JSON'
{"version": "1", "pip_version": "24.0", "installed": [
  {"metadata": {"name": "rich", "version": "13.7.1"}, "metadata_location": "/sp/rich-13.7.1.dist-info", "installer": "pip", "requested": true},
  {"metadata": {"name": "", "version": "0"}, "metadata_location": "/sp/broken"}
]}
JSON"#,
        );

        let report = list_packages(&pip, &SystemRunner).unwrap();
        assert_eq!(report.pip_version, "24.0");
        assert_eq!(report.installed.len(), 1);
        assert!(report.installed[0].requested);
    }

    #[test]
    fn test_list_packages_bad_json_is_error() {
        let tmp = TempDir::new().unwrap();
        let pip = write_script(&tmp.path().join("pip"), "echo not-json");

        assert!(matches!(
            list_packages(&pip, &SystemRunner).unwrap_err(),
            ScanError::Parse(_)
        ));
    }

    #[test]
    fn test_resolve_library_root() {
        let tmp = TempDir::new().unwrap();
        let python = write_script(
            &tmp.path().join("python"),
            "echo '/env/lib/python3.12/site-packages'",
        );

        assert_eq!(
            resolve_library_root(&python, &SystemRunner).unwrap(),
            PathBuf::from("/env/lib/python3.12/site-packages")
        );
    }

    #[test]
    fn test_resolve_library_root_rejects_relative_and_empty() {
        let tmp = TempDir::new().unwrap();
        let relative = write_script(&tmp.path().join("rel"), "echo 'lib/site-packages'");
        let empty = write_script(&tmp.path().join("empty"), "true");

        assert!(matches!(
            resolve_library_root(&relative, &SystemRunner),
            Err(ScanError::LibraryRoot(_))
        ));
        assert!(matches!(
            resolve_library_root(&empty, &SystemRunner),
            Err(ScanError::LibraryRoot(_))
        ));
    }
}
