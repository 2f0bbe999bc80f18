use crate::model::{InstalledPackage, OutdatedInfo, PypiInfo};
use std::collections::BTreeMap;

/// Lists installed packages whose PyPI release is newer than what is installed.
pub fn check_outdated(
    packages: &[InstalledPackage],
    latest: &BTreeMap<String, PypiInfo>,
) -> Vec<OutdatedInfo> {
    packages
        .iter()
        .filter_map(|package| {
            let info = latest.get(package.name())?;
            is_newer(&info.info.version, &package.metadata.version).then(|| OutdatedInfo {
                name: package.name().to_string(),
                current_version: package.metadata.version.clone(),
                latest_version: info.info.version.clone(),
            })
        })
        .collect()
}

pub fn is_newer(latest: &str, current: &str) -> bool {
    // Try semver comparison first
    if let (Ok(latest_ver), Ok(current_ver)) = (
        semver::Version::parse(latest.trim_start_matches('v')),
        semver::Version::parse(current.trim_start_matches('v')),
    ) {
        return latest_ver > current_ver;
    }

    // Two-part releases like "2.0" are common on PyPI
    if let (Some(latest_ver), Some(current_ver)) = (pad_release(latest), pad_release(current)) {
        return latest_ver > current_ver;
    }

    if current == "unknown" || latest.is_empty() {
        return false;
    }

    latest != current
}

/// Parses `X`, `X.Y` or `X.Y.Z` numeric releases as semver.
fn pad_release(version: &str) -> Option<semver::Version> {
    let parts: Vec<u64> = version
        .split('.')
        .map(|p| p.parse().ok())
        .collect::<Option<_>>()?;

    match parts.as_slice() {
        [major] => Some(semver::Version::new(*major, 0, 0)),
        [major, minor] => Some(semver::Version::new(*major, *minor, 0)),
        [major, minor, patch] => Some(semver::Version::new(*major, *minor, *patch)),
        _ => None,
    }
}
