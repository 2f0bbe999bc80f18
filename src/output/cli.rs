use crate::model::{InstalledPackage, LibraryReport, PypiInfo, VirtualEnvironment};
use anyhow::Result;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct EnvironmentRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Python")]
    python: String,
    #[tabled(rename = "Path")]
    path: String,
}

#[derive(Tabled)]
struct PackageRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Tag")]
    tag: String,
    #[tabled(rename = "Summary")]
    summary: String,
}

#[derive(Tabled)]
struct OutdatedRow {
    #[tabled(rename = "Package")]
    package: String,
    #[tabled(rename = "Current")]
    current: String,
    #[tabled(rename = "Latest")]
    latest: String,
    #[tabled(rename = "Type")]
    update_type: String,
}

#[derive(Tabled)]
struct InterpreterRow {
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Path")]
    path: String,
}

#[derive(Tabled)]
struct PypiRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Latest")]
    version: String,
    #[tabled(rename = "License")]
    license: String,
    #[tabled(rename = "Requires Python")]
    requires_python: String,
    #[tabled(rename = "Summary")]
    summary: String,
}

pub fn print_environments(envs: &[VirtualEnvironment]) -> Result<()> {
    println!();
    if envs.is_empty() {
        println!("No virtual environments found.");
        return Ok(());
    }

    println!("Found {} virtual environments:", envs.len());
    println!();

    let rows: Vec<EnvironmentRow> = envs
        .iter()
        .map(|env| EnvironmentRow {
            name: truncate(&env.name, 30),
            python: format_version(&env.python_version),
            path: env.path.display().to_string(),
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
    Ok(())
}

pub fn print_library(report: &LibraryReport) -> Result<()> {
    println!();
    println!("Environment: {}", report.venv_path.display());
    println!("Library:     {}", report.library_root.display());
    println!(
        "Scan completed at: {}",
        report.scan_time.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!();

    if report.packages.is_empty() {
        println!("No packages found.");
    } else {
        let mut packages: Vec<_> = report.packages.iter().collect();
        packages.sort_by(|a, b| b.metadata.size.cmp(&a.metadata.size));

        let rows: Vec<PackageRow> = packages.iter().map(|p| package_row(p)).collect();

        let table = Table::new(rows).with(Style::rounded()).to_string();
        println!("{}", table);
    }

    if !report.outdated.is_empty() {
        println!();
        println!("Found {} outdated packages:", report.outdated.len());
        println!();

        let rows: Vec<OutdatedRow> = report
            .outdated
            .iter()
            .map(|o| OutdatedRow {
                package: o.name.clone(),
                current: o.current_version.clone(),
                latest: o.latest_version.clone(),
                update_type: classify_update(&o.current_version, &o.latest_version).to_string(),
            })
            .collect();

        let table = Table::new(rows).with(Style::rounded()).to_string();
        println!("{}", table);

        println!();
        println!("Upgrade command:");
        let names: Vec<&str> = report.outdated.iter().map(|o| o.name.as_str()).collect();
        if names.len() <= 5 {
            println!("  pip install --upgrade {}", names.join(" "));
        } else {
            println!("  pip install --upgrade ...  # {} packages", names.len());
        }
    }

    println!();
    println!("Summary:");
    println!("  Packages: {}", report.packages.len());
    println!("  Total size: {}", format_size(report.total_size()));
    if !report.pip_version.is_empty() {
        println!("  pip: {}", report.pip_version);
    }
    if !report.outdated.is_empty() {
        println!("  Outdated packages: {}", report.outdated.len());
    }

    Ok(())
}

fn package_row(p: &InstalledPackage) -> PackageRow {
    PackageRow {
        name: truncate(p.name(), 35),
        version: format_version(&p.metadata.version),
        size: format_size(p.metadata.size),
        tag: p.tag().to_string(),
        summary: truncate(&p.metadata.summary, 50),
    }
}

pub fn print_interpreters(interpreters: &BTreeMap<PathBuf, String>) -> Result<()> {
    println!();
    if interpreters.is_empty() {
        println!("No Python interpreters found.");
        return Ok(());
    }

    let rows: Vec<InterpreterRow> = interpreters
        .iter()
        .map(|(path, version)| InterpreterRow {
            version: format_version(version),
            path: path.display().to_string(),
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
    Ok(())
}

/// Prints fetched metadata; names absent from `found` are listed as not found.
pub fn print_pypi(requested: &[String], found: &BTreeMap<String, PypiInfo>) -> Result<()> {
    println!();

    let rows: Vec<PypiRow> = found
        .iter()
        .map(|(name, info)| PypiRow {
            name: truncate(name, 30),
            version: info.info.version.clone(),
            license: truncate(info.license(), 30),
            requires_python: info
                .info
                .requires_python
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "-".to_string()),
            summary: truncate(info.info.summary.as_deref().unwrap_or(""), 50),
        })
        .collect();

    if rows.is_empty() {
        println!("No metadata found.");
    } else {
        let table = Table::new(rows).with(Style::rounded()).to_string();
        println!("{}", table);
    }

    let missing: Vec<&str> = requested
        .iter()
        .filter(|name| !found.contains_key(name.as_str()))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        println!();
        println!("Not found: {}", missing.join(", "));
    }

    Ok(())
}

/// Renders a byte count with binary units, e.g. `1.5 MiB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

fn format_version(version: &str) -> String {
    if version.is_empty() || version == "unknown" {
        "-".to_string()
    } else {
        version.to_string()
    }
}

/// Classify version update as major, minor, or patch
fn classify_update(current: &str, latest: &str) -> &'static str {
    let current_parts: Vec<&str> = current.split('.').collect();
    let latest_parts: Vec<&str> = latest.split('.').collect();

    let major = |parts: &[&str]| parts.first().and_then(|s| s.parse::<u64>().ok());
    let minor = |parts: &[&str]| parts.get(1).and_then(|s| s.parse::<u64>().ok());

    if let (Some(cm), Some(lm)) = (major(&current_parts), major(&latest_parts)) {
        if lm > cm {
            return "MAJOR";
        }
        if let (Some(cmi), Some(lmi)) = (minor(&current_parts), minor(&latest_parts)) {
            if lm == cm && lmi > cmi {
                return "minor";
            }
        }
    }

    "patch"
}
