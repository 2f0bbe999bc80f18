//! System-wide Python interpreter lookup.

use crate::pipeline::{Dispatcher, WorkerPool};
use crate::process::CommandRunner;
use crate::scanner::envs::is_executable;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

fn interpreter_name() -> Option<&'static Regex> {
    static NAME: OnceLock<Option<Regex>> = OnceLock::new();
    NAME.get_or_init(|| Regex::new(r"^python(2|3)(\.\d+)?$").ok())
        .as_ref()
}

/// A search directory and how to read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchPath {
    /// Interpreters live directly in this directory.
    Flat(PathBuf),
    /// Each subdirectory is a version with its own `bin/` (Python.framework).
    Versions(PathBuf),
}

impl SearchPath {
    pub fn path(&self) -> &Path {
        match self {
            SearchPath::Flat(p) | SearchPath::Versions(p) => p,
        }
    }
}

/// Returns true for names like `python3` or `python3.12`.
pub fn is_interpreter_name(name: &str) -> bool {
    interpreter_name().is_some_and(|re| re.is_match(name))
}

/// Probes every interpreter found under `search_paths`, returning path → version.
///
/// Inside a [`SearchPath::Versions`] entry only the first interpreter that
/// answers is kept. Interpreters that fail or time out are left out.
pub fn find_interpreters(
    search_paths: &[SearchPath],
    runner: &dyn CommandRunner,
    workers: usize,
    timeout: Duration,
) -> BTreeMap<PathBuf, String> {
    let pool = WorkerPool::new(workers);
    let mut found = BTreeMap::new();

    pool.run(
        |dispatcher: &mut Dispatcher<Vec<PathBuf>>| {
            for group in search_paths.iter().flat_map(candidate_groups) {
                dispatcher.dispatch(group);
            }
        },
        |group| first_responsive(&group, runner, timeout),
        |(path, version)| {
            found.entry(path).or_insert(version);
        },
    );

    found
}

/// Candidate interpreters, grouped so that each group yields at most one hit.
fn candidate_groups(search: &SearchPath) -> Vec<Vec<PathBuf>> {
    match search {
        SearchPath::Flat(dir) => matching_executables(dir)
            .into_iter()
            .map(|path| vec![path])
            .collect(),
        SearchPath::Versions(dir) => list_dir(dir)
            .into_iter()
            .filter(|entry| entry.is_dir())
            .map(|version| matching_executables(&version.join("bin")))
            .filter(|group| !group.is_empty())
            .collect(),
    }
}

fn matching_executables(dir: &Path) -> Vec<PathBuf> {
    list_dir(dir)
        .into_iter()
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(is_interpreter_name)
        })
        .filter(|path| is_executable(path))
        .collect()
}

fn list_dir(dir: &Path) -> Vec<PathBuf> {
    let mut entries: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "Skipping search path");
            Vec::new()
        }
    };
    entries.sort();
    entries
}

fn first_responsive(
    group: &[PathBuf],
    runner: &dyn CommandRunner,
    timeout: Duration,
) -> Option<(PathBuf, String)> {
    for path in group {
        match runner.run(path, &["--version"], Some(timeout)) {
            Ok(output) => return Some((path.clone(), output.combined().trim().to_string())),
            Err(e) => debug!(path = %path.display(), error = %e, "Interpreter version check failed"),
        }
    }
    None
}
