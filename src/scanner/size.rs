//! On-disk footprint of installed packages.
//!
//! Each package's `RECORD` manifest is reduced to the distinct top-level
//! entries it installed under the library root; one [`ScanJob`] per package
//! carries that set to a worker, which walks and sums it. Results come back
//! keyed by the package's index in the listing.

use crate::model::InstalledPackage;
use crate::pipeline::{Dispatcher, PoolStats, WorkerPool};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const PYCACHE: &str = "__pycache__";

/// Paths to measure for the package at `index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanJob {
    pub index: usize,
    pub paths: BTreeSet<PathBuf>,
}

/// Bytes measured for the package at `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanResult {
    pub index: usize,
    pub size: u64,
}

/// Fills in `metadata.size` for every package, in place.
///
/// Packages sharing a top-level entry are each charged for it in full.
pub fn measure_packages(
    packages: &mut [InstalledPackage],
    library_root: &Path,
    workers: usize,
) -> PoolStats {
    let locations: Vec<PathBuf> = packages
        .iter()
        .map(|p| p.metadata_location.clone())
        .collect();
    let pool = WorkerPool::new(workers).with_capacity(packages.len());

    let stats = pool.run(
        move |dispatcher: &mut Dispatcher<ScanJob>| {
            for (index, location) in locations.iter().enumerate() {
                let paths = resolve_scan_paths(location, library_root);
                if !dispatcher.dispatch(ScanJob { index, paths }) {
                    break;
                }
            }
        },
        |job| {
            let size = measure_paths(&job.paths);
            debug!(index = job.index, paths = job.paths.len(), size, "Measured package");
            Some(ScanResult {
                index: job.index,
                size,
            })
        },
        |result| {
            if let Some(package) = packages.get_mut(result.index) {
                package.metadata.size = result.size;
            }
        },
    );

    if stats.dispatched != stats.results {
        warn!(
            dispatched = stats.dispatched,
            results = stats.results,
            "Size scan lost results"
        );
    }
    info!(packages = stats.results, workers = pool.workers(), "Size scan finished");
    stats
}

/// Resolves what to measure for one package.
///
/// Uses `<metadata_location>/RECORD` when it can be opened, otherwise the
/// metadata directory alone.
pub fn resolve_scan_paths(metadata_location: &Path, library_root: &Path) -> BTreeSet<PathBuf> {
    let record = metadata_location.join("RECORD");
    match File::open(&record) {
        Ok(file) => top_level_roots(BufReader::new(file), library_root),
        Err(e) => {
            debug!(record = %record.display(), error = %e, "No install record, measuring metadata directory");
            BTreeSet::from([metadata_location.to_path_buf()])
        }
    }
}

/// Collapses manifest lines into the set of top-level entries under `library_root`.
///
/// Lines resolving outside the root, lines under `__pycache__`, and malformed
/// lines are skipped.
pub fn top_level_roots<R: BufRead>(mut reader: R, library_root: &Path) -> BTreeSet<PathBuf> {
    let root = normalize(library_root);
    let mut roots = BTreeSet::new();
    let mut expected_fields = None;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Install record read failed");
                break;
            }
        }

        let Ok(line) = std::str::from_utf8(&buf) else {
            continue;
        };
        let line = line.trim_end_matches(['\n', '\r']);
        if line.is_empty() {
            continue;
        }

        let Some(fields) = parse_record_line(line) else {
            continue;
        };
        if *expected_fields.get_or_insert(fields.len()) != fields.len() {
            continue;
        }

        if let Some(top) = top_level_entry(&root, &fields[0]) {
            roots.insert(top);
        }
    }

    roots
}

/// Maps one manifest path to `<root>/<first segment>`.
fn top_level_entry(root: &Path, relative: &str) -> Option<PathBuf> {
    let resolved = normalize(&root.join(relative));
    let inside = resolved.strip_prefix(root).ok()?;

    if inside.components().any(|c| c.as_os_str() == PYCACHE) {
        return None;
    }

    match inside.components().next()? {
        Component::Normal(first) => Some(root.join(first)),
        _ => None,
    }
}

/// Splits one CSV line, honouring double-quoted fields.
///
/// Returns `None` for an unterminated quote.
fn parse_record_line(line: &str) -> Option<Vec<String>> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            ('"', true) => in_quotes = false,
            ('"', false) if field.is_empty() => in_quotes = true,
            (',', false) => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }

    if in_quotes {
        return None;
    }
    fields.push(field);
    Some(fields)
}

/// Lexically resolves `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Sums the sizes of every non-directory entry under `paths`.
///
/// Entries that cannot be read, including missing roots, count as zero.
pub fn measure_paths<'a, I>(paths: I) -> u64
where
    I: IntoIterator<Item = &'a PathBuf>,
{
    paths
        .into_iter()
        .flat_map(|path| WalkDir::new(path).follow_links(false))
        .filter_map(|entry| entry.ok())
        .filter(|entry| !entry.file_type().is_dir())
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| meta.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PackageMetadata;
    use std::fs;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn roots_of(record: &str, root: &Path) -> BTreeSet<PathBuf> {
        top_level_roots(Cursor::new(record.as_bytes()), root)
    }

    fn write_file(path: &Path, len: usize) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, vec![b'x'; len]).unwrap();
    }

    #[test]
    fn test_nested_entries_collapse_to_top_level() {
        let root = Path::new("/env/site-packages");
        let record = "foo/__init__.py,sha256=abc,10\n\
                      foo/sub/__init__.py,sha256=def,20\n\
                      foo-1.0.dist-info/METADATA,sha256=ghi,30\n";

        let roots = roots_of(record, root);

        assert_eq!(
            roots,
            BTreeSet::from([
                PathBuf::from("/env/site-packages/foo"),
                PathBuf::from("/env/site-packages/foo-1.0.dist-info"),
            ])
        );
    }

    #[test]
    fn test_escaping_paths_rejected() {
        let root = Path::new("/env/site-packages");
        let record = "../../etc/passwd,,\n\
                      ../../../bin/tool,,\n\
                      /usr/lib/other.py,,\n\
                      pkg/mod.py,,\n";

        assert_eq!(
            roots_of(record, root),
            BTreeSet::from([PathBuf::from("/env/site-packages/pkg")])
        );
    }

    #[test]
    fn test_sibling_prefix_is_not_inside_root() {
        let root = Path::new("/env/site-packages");
        let record = "../site-packages2/evil.py,,\n";

        assert!(roots_of(record, root).is_empty());
    }

    #[test]
    fn test_pycache_entries_skipped() {
        let root = Path::new("/env/site-packages");
        let record = "__pycache__/six.cpython-312.pyc,,\n\
                      six.py,sha256=x,100\n\
                      six-1.16.0.dist-info/RECORD,,\n";

        assert_eq!(
            roots_of(record, root),
            BTreeSet::from([
                PathBuf::from("/env/site-packages/six-1.16.0.dist-info"),
                PathBuf::from("/env/site-packages/six.py"),
            ])
        );
    }

    #[test]
    fn test_quoted_paths_and_bad_lines() {
        let root = Path::new("/env/site-packages");
        let record = "\"odd,name/a.py\",sha256=x,1\n\
                      only-two,fields\n\
                      \"unterminated/b.py,,\n\
                      \n\
                      good/c.py,,\r\n";

        assert_eq!(
            roots_of(record, root),
            BTreeSet::from([
                PathBuf::from("/env/site-packages/good"),
                PathBuf::from("/env/site-packages/odd,name"),
            ])
        );
    }

    #[test]
    fn test_invalid_utf8_line_skipped() {
        let root = Path::new("/env/site-packages");
        let mut record = b"bad\xff/x.py,,\n".to_vec();
        record.extend_from_slice(b"ok/y.py,,\n");

        let roots = top_level_roots(Cursor::new(record), root);
        assert_eq!(roots, BTreeSet::from([PathBuf::from("/env/site-packages/ok")]));
    }

    #[test]
    fn test_parse_record_line() {
        assert_eq!(
            parse_record_line("a,b,c"),
            Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
        assert_eq!(
            parse_record_line("\"say \"\"hi\"\"\",,"),
            Some(vec!["say \"hi\"".to_string(), String::new(), String::new()])
        );
        assert_eq!(parse_record_line("\"open,,"), None);
    }

    #[test]
    fn test_missing_record_falls_back_to_metadata_dir() {
        let tmp = TempDir::new().unwrap();
        let dist_info = tmp.path().join("foo-1.0.dist-info");
        fs::create_dir_all(&dist_info).unwrap();

        assert_eq!(
            resolve_scan_paths(&dist_info, tmp.path()),
            BTreeSet::from([dist_info])
        );
    }

    #[test]
    fn test_measure_paths_sums_files_and_ignores_missing() {
        let tmp = TempDir::new().unwrap();
        write_file(&tmp.path().join("pkg/a.py"), 100);
        write_file(&tmp.path().join("pkg/sub/b.py"), 50);
        write_file(&tmp.path().join("script.py"), 7);

        let paths = BTreeSet::from([
            tmp.path().join("pkg"),
            tmp.path().join("script.py"),
            tmp.path().join("missing"),
        ]);

        assert_eq!(measure_paths(&paths), 157);
    }

    #[test]
    fn test_measure_packages_end_to_end() {
        let tmp = TempDir::new().unwrap();
        let site = tmp.path().join("site-packages");

        // foo: RECORD lists two top-level roots, with repeats under foo/
        write_file(&site.join("foo/__init__.py"), 100);
        write_file(&site.join("foo/sub/__init__.py"), 200);
        write_file(&site.join("foo-1.0.dist-info/METADATA"), 10);
        fs::write(
            site.join("foo-1.0.dist-info/RECORD"),
            "foo/__init__.py,,\nfoo/sub/__init__.py,,\nfoo-1.0.dist-info/METADATA,,\nfoo-1.0.dist-info/RECORD,,\n../../etc/passwd,,\n",
        )
        .unwrap();
        let record_len = fs::metadata(site.join("foo-1.0.dist-info/RECORD")).unwrap().len();

        // bar: no RECORD, only its metadata directory is measured
        write_file(&site.join("bar-2.0.dist-info/METADATA"), 40);
        write_file(&site.join("bar/__init__.py"), 999);

        // baz: RECORD with nothing usable
        write_file(&site.join("baz-0.1.dist-info/RECORD"), 0);

        let mut packages = vec![
            InstalledPackage::new(PackageMetadata::new("foo", "1.0"), site.join("foo-1.0.dist-info")),
            InstalledPackage::new(PackageMetadata::new("bar", "2.0"), site.join("bar-2.0.dist-info")),
            InstalledPackage::new(PackageMetadata::new("baz", "0.1"), site.join("baz-0.1.dist-info")),
        ];

        let stats = measure_packages(&mut packages, &site, 2);

        assert_eq!(stats.dispatched, 3);
        assert_eq!(stats.results, 3);
        assert_eq!(packages[0].metadata.size, 310 + record_len);
        assert_eq!(packages[1].metadata.size, 40);
        assert_eq!(packages[2].metadata.size, 0);
        assert_eq!(packages[0].name(), "foo");
    }

    #[test]
    fn test_measure_packages_counts_match_for_many_packages() {
        let tmp = TempDir::new().unwrap();
        let mut packages: Vec<InstalledPackage> = (0..37)
            .map(|i| {
                let dist = tmp.path().join(format!("p{i}-1.0.dist-info"));
                write_file(&dist.join("METADATA"), i);
                InstalledPackage::new(PackageMetadata::new(format!("p{i}"), "1.0"), dist)
            })
            .collect();

        let stats = measure_packages(&mut packages, tmp.path(), 4);

        assert_eq!(stats.dispatched, 37);
        assert_eq!(stats.results, 37);
        for (i, package) in packages.iter().enumerate() {
            assert_eq!(package.metadata.size, i as u64);
        }
    }

    #[test]
    fn test_measure_packages_empty() {
        let tmp = TempDir::new().unwrap();
        let stats = measure_packages(&mut [], tmp.path(), 4);
        assert_eq!(stats, PoolStats::default());
    }
}
