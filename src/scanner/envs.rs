//! Virtual environment discovery.
//!
//! A depth-bounded walk under each root feeds candidate directories into a
//! [`WorkerPool`]; each worker runs the cheap filesystem checks first and only
//! then spawns the candidate's interpreter with a hard deadline.

use crate::model::{EnvLayout, VirtualEnvironment};
use crate::pipeline::{Dispatcher, WorkerPool, DISCOVERY_WORKERS};
use crate::process::CommandRunner;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Default traversal depth below each root.
pub const DEFAULT_MAX_DEPTH: usize = 2;

/// Default deadline for the `python --version` check.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Prefix stripped from the interpreter's version banner.
const VERSION_PREFIX: &str = "Python ";

#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// `None` walks the whole tree.
    pub max_depth: Option<usize>,
    pub workers: usize,
    pub probe_timeout: Duration,
    pub layout: EnvLayout,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            max_depth: Some(DEFAULT_MAX_DEPTH),
            workers: DISCOVERY_WORKERS,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            layout: EnvLayout::default(),
        }
    }
}

/// Finds every virtual environment under `roots`.
///
/// Results are sorted by path and deduplicated, so overlapping roots and
/// racing workers still give a stable listing. Directories that fail any
/// check are left out without an error.
pub fn discover_environments(
    roots: &[PathBuf],
    options: &DiscoveryOptions,
    runner: &dyn CommandRunner,
) -> Vec<VirtualEnvironment> {
    let pool = WorkerPool::new(options.workers);

    let mut found = pool.collect(
        |dispatcher: &mut Dispatcher<PathBuf>| {
            for root in roots {
                walk_candidates(root, options.max_depth, &mut |dir| dispatcher.dispatch(dir));
            }
        },
        |dir| validate_candidate(&dir, &options.layout, runner, options.probe_timeout),
    );

    found.sort_by(|a, b| a.path.cmp(&b.path));
    found.dedup_by(|a, b| a.path == b.path);

    info!(
        roots = roots.len(),
        environments = found.len(),
        "Environment discovery finished"
    );
    found
}

/// Emits the absolute root, then every subdirectory down to `max_depth`.
///
/// An unreadable directory ends the descent into that subtree only. Stops
/// early once `emit` returns `false`.
pub fn walk_candidates(
    root: &Path,
    max_depth: Option<usize>,
    emit: &mut dyn FnMut(PathBuf) -> bool,
) {
    let root = match std::path::absolute(root) {
        Ok(root) => root,
        Err(e) => {
            warn!(path = %root.display(), error = %e, "Cannot resolve root");
            return;
        }
    };

    if !emit(root.clone()) || max_depth == Some(0) {
        return;
    }

    let mut walker = WalkDir::new(&root).min_depth(1).follow_links(false);
    if let Some(depth) = max_depth {
        walker = walker.max_depth(depth);
    }

    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_dir() => {
                if !emit(entry.into_path()) {
                    return;
                }
            }
            Ok(_) => {}
            Err(e) => {
                let path = e.path().map(|p| p.display().to_string()).unwrap_or_default();
                warn!(path = %path, error = %e, "Error reading directory");
            }
        }
    }
}

/// Decides whether `dir` is a working virtual environment.
pub fn validate_candidate(
    dir: &Path,
    layout: &EnvLayout,
    runner: &dyn CommandRunner,
    timeout: Duration,
) -> Option<VirtualEnvironment> {
    let bin_dir = dir.join(&layout.bin_dir);
    if !bin_dir.exists() || !dir.join("include").exists() || !dir.join("lib").exists() {
        return None;
    }

    let python_path = find_first(&bin_dir, &layout.python, true)?;
    let pip_path = find_first(&bin_dir, &layout.pip, true)?;
    find_first(&bin_dir, &layout.activate, false)?;

    let output = match runner.run(&python_path, &["--version"], Some(timeout)) {
        Ok(output) => output,
        Err(e) => {
            debug!(candidate = %dir.display(), error = %e, "Interpreter version check failed");
            return None;
        }
    };

    let banner = output.combined();
    let banner = banner.trim();
    let python_version = banner.strip_prefix(VERSION_PREFIX).unwrap_or(banner).to_string();

    debug!(path = %dir.display(), version = %python_version, "Confirmed environment");

    Some(VirtualEnvironment {
        name: dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.display().to_string()),
        path: dir.to_path_buf(),
        python_version,
        pip_path,
        python_path,
    })
}

/// Returns the first of `candidates` present in `dir`.
///
/// With `executable` set the match must also be a regular file with an
/// execute bit.
pub fn find_first(dir: &Path, candidates: &[String], executable: bool) -> Option<PathBuf> {
    candidates.iter().map(|name| dir.join(name)).find(|path| {
        if executable {
            is_executable(path)
        } else {
            path.exists()
        }
    })
}

#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
pub fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::model::Platform;
    use crate::process::test_support::write_script;
    use crate::process::SystemRunner;
    use std::collections::HashSet;
    use std::fs;
    use tempfile::TempDir;

    fn layout() -> EnvLayout {
        EnvLayout::for_platform(Platform::Linux)
    }

    /// Builds a venv-shaped directory whose interpreter runs `python_body`.
    fn make_venv(dir: &Path, python_body: &str) {
        fs::create_dir_all(dir.join("include")).unwrap();
        fs::create_dir_all(dir.join("lib/python3.12/site-packages")).unwrap();
        write_script(&dir.join("bin/python"), python_body);
        write_script(&dir.join("bin/pip"), "exit 0");
        fs::write(dir.join("bin/activate"), "# activate").unwrap();
    }

    fn collect(root: &Path, max_depth: Option<usize>) -> Vec<PathBuf> {
        let mut out = Vec::new();
        walk_candidates(root, max_depth, &mut |p| {
            out.push(p);
            true
        });
        out
    }

    #[test]
    fn test_walk_is_depth_bounded() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("d1/d2/d3/d4/d5")).unwrap();
        fs::write(root.join("d1/file.txt"), "x").unwrap();

        let found: HashSet<PathBuf> = collect(root, Some(2)).into_iter().collect();

        let expected: HashSet<PathBuf> = [
            root.to_path_buf(),
            root.join("d1"),
            root.join("d1/d2"),
        ]
        .into_iter()
        .collect();
        assert_eq!(found, expected);
    }

    #[test]
    fn test_walk_unbounded() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("a/b/c/d/e")).unwrap();

        assert_eq!(collect(tmp.path(), None).len(), 6);
    }

    #[test]
    fn test_walk_depth_zero_emits_root_only() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("a")).unwrap();

        assert_eq!(collect(tmp.path(), Some(0)), vec![tmp.path().to_path_buf()]);
    }

    #[test]
    fn test_discover_depth_zero_checks_root_only() {
        let tmp = TempDir::new().unwrap();
        make_venv(&tmp.path().join("child"), "echo 'Python 3.12.4'");

        let options = DiscoveryOptions {
            max_depth: Some(0),
            layout: layout(),
            ..DiscoveryOptions::default()
        };
        let envs = discover_environments(&[tmp.path().to_path_buf()], &options, &SystemRunner);
        assert!(envs.is_empty());

        let envs = discover_environments(&[tmp.path().join("child")], &options, &SystemRunner);
        assert_eq!(envs.len(), 1);
    }

    #[test]
    fn test_walk_continues_past_unreadable_subtree() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("locked/hidden")).unwrap();
        fs::create_dir_all(root.join("open/child")).unwrap();
        fs::set_permissions(root.join("locked"), fs::Permissions::from_mode(0o000)).unwrap();

        let found: HashSet<PathBuf> = collect(root, Some(2)).into_iter().collect();

        fs::set_permissions(root.join("locked"), fs::Permissions::from_mode(0o755)).unwrap();

        assert!(found.contains(root));
        assert!(found.contains(&root.join("locked")));
        assert!(found.contains(&root.join("open")));
        assert!(found.contains(&root.join("open/child")));
    }

    #[test]
    fn test_walk_missing_root_still_emits_root() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");

        assert_eq!(collect(&missing, Some(2)), vec![missing]);
    }

    #[test]
    fn test_walk_stops_when_emit_refuses() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("a/b")).unwrap();

        let mut count = 0;
        walk_candidates(tmp.path(), None, &mut |_| {
            count += 1;
            false
        });
        assert_eq!(count, 1);
    }

    #[test]
    fn test_validate_confirms_venv() {
        let tmp = TempDir::new().unwrap();
        let venv = tmp.path().join("proj-env");
        make_venv(&venv, "echo 'Python 3.12.4'");

        let env = validate_candidate(&venv, &layout(), &SystemRunner, DEFAULT_PROBE_TIMEOUT)
            .expect("venv should validate");

        assert_eq!(env.name, "proj-env");
        assert_eq!(env.path, venv);
        assert_eq!(env.python_version, "3.12.4");
        assert_eq!(env.python_path, venv.join("bin/python"));
        assert_eq!(env.pip_path, venv.join("bin/pip"));
    }

    #[test]
    fn test_validate_reads_version_from_stderr() {
        let tmp = TempDir::new().unwrap();
        make_venv(tmp.path(), "echo 'Python 2.7.18' >&2");

        let env =
            validate_candidate(tmp.path(), &layout(), &SystemRunner, DEFAULT_PROBE_TIMEOUT).unwrap();
        assert_eq!(env.python_version, "2.7.18");
    }

    #[test]
    fn test_validate_requires_include_and_lib() {
        let tmp = TempDir::new().unwrap();

        for missing in ["include", "lib", "bin"] {
            let venv = tmp.path().join(format!("no-{missing}"));
            make_venv(&venv, "echo 'Python 3.12.4'");
            fs::remove_dir_all(venv.join(missing)).unwrap();

            assert!(
                validate_candidate(&venv, &layout(), &SystemRunner, DEFAULT_PROBE_TIMEOUT)
                    .is_none(),
                "accepted venv without {missing}"
            );
        }
    }

    #[test]
    fn test_validate_rejects_non_executable_python() {
        let tmp = TempDir::new().unwrap();
        make_venv(tmp.path(), "echo 'Python 3.12.4'");
        fs::remove_file(tmp.path().join("bin/python")).unwrap();
        fs::write(tmp.path().join("bin/python"), "not runnable").unwrap();

        assert!(
            validate_candidate(tmp.path(), &layout(), &SystemRunner, DEFAULT_PROBE_TIMEOUT)
                .is_none()
        );
    }

    #[test]
    fn test_validate_falls_back_to_python3() {
        let tmp = TempDir::new().unwrap();
        make_venv(tmp.path(), "echo 'Python 3.11.9'");
        fs::rename(tmp.path().join("bin/python"), tmp.path().join("bin/python3")).unwrap();

        let env =
            validate_candidate(tmp.path(), &layout(), &SystemRunner, DEFAULT_PROBE_TIMEOUT).unwrap();
        assert_eq!(env.python_path, tmp.path().join("bin/python3"));
    }

    #[test]
    fn test_validate_requires_activate_script() {
        let tmp = TempDir::new().unwrap();
        make_venv(tmp.path(), "echo 'Python 3.12.4'");
        fs::remove_file(tmp.path().join("bin/activate")).unwrap();

        assert!(
            validate_candidate(tmp.path(), &layout(), &SystemRunner, DEFAULT_PROBE_TIMEOUT)
                .is_none()
        );
    }

    #[test]
    fn test_validate_rejects_failing_interpreter() {
        let tmp = TempDir::new().unwrap();
        make_venv(tmp.path(), "exit 1");

        assert!(
            validate_candidate(tmp.path(), &layout(), &SystemRunner, DEFAULT_PROBE_TIMEOUT)
                .is_none()
        );
    }

    #[test]
    fn test_discover_finds_nested_envs_sorted() {
        let tmp = TempDir::new().unwrap();
        make_venv(&tmp.path().join("zeta/.venv"), "echo 'Python 3.12.4'");
        make_venv(&tmp.path().join("alpha"), "echo 'Python 3.10.14'");
        // Below the depth limit.
        make_venv(&tmp.path().join("deep/er/still/.venv"), "echo 'Python 3.9.0'");
        // A python binary outside a venv layout.
        write_script(&tmp.path().join("loose/bin/python"), "echo 'Python 3.12.4'");

        let options = DiscoveryOptions {
            layout: layout(),
            ..DiscoveryOptions::default()
        };
        let envs = discover_environments(&[tmp.path().to_path_buf()], &options, &SystemRunner);

        let paths: Vec<PathBuf> = envs.iter().map(|e| e.path.clone()).collect();
        assert_eq!(paths, vec![tmp.path().join("alpha"), tmp.path().join("zeta/.venv")]);
        assert_eq!(envs[0].python_version, "3.10.14");
    }

    #[test]
    fn test_discover_overlapping_roots_dedup() {
        let tmp = TempDir::new().unwrap();
        make_venv(&tmp.path().join("env"), "echo 'Python 3.12.4'");

        let options = DiscoveryOptions {
            layout: layout(),
            ..DiscoveryOptions::default()
        };
        let roots = vec![tmp.path().to_path_buf(), tmp.path().join("env")];
        let envs = discover_environments(&roots, &options, &SystemRunner);

        assert_eq!(envs.len(), 1);
    }

    #[test]
    fn test_probe_timeout_drops_candidate_without_deadlock() {
        let tmp = TempDir::new().unwrap();
        for i in 0..3 {
            make_venv(&tmp.path().join(format!("hung{i}")), "exec sleep 30");
        }
        make_venv(&tmp.path().join("ok"), "echo 'Python 3.12.4'");

        let options = DiscoveryOptions {
            layout: layout(),
            workers: 2,
            probe_timeout: Duration::from_millis(200),
            ..DiscoveryOptions::default()
        };
        let started = std::time::Instant::now();
        let envs = discover_environments(&[tmp.path().to_path_buf()], &options, &SystemRunner);

        assert_eq!(envs.len(), 1);
        assert_eq!(envs[0].name, "ok");
        assert!(started.elapsed() < Duration::from_secs(20));
    }

    #[test]
    fn test_find_first_order() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("activate.ps1"), "").unwrap();
        fs::write(tmp.path().join("activate"), "").unwrap();

        let candidates = vec![
            "activate.bat".to_string(),
            "activate.ps1".to_string(),
            "activate".to_string(),
        ];
        assert_eq!(
            find_first(tmp.path(), &candidates, false),
            Some(tmp.path().join("activate.ps1"))
        );
        assert_eq!(find_first(tmp.path(), &candidates, true), None);
    }
}
