use anyhow::Result;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;
use venvscan::{
    cache::MetadataCache,
    checker::{check_outdated, default_source, fetch_metadata},
    config::Config,
    output::{
        print_environments, print_interpreters, print_json, print_library, print_pypi,
        OutputFormat,
    },
    platform::interpreter_search_paths,
    scanner::{discover_environments, find_interpreters, scan_library},
    SystemRunner,
};

mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const ERROR: u8 = 1;
    /// Some requested PyPI projects could not be fetched
    pub const PARTIAL: u8 = 2;
}

#[derive(Parser)]
#[command(name = "venvscan")]
#[command(
    author,
    version,
    about = "Discover Python virtual environments and measure their installed packages"
)]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find virtual environments below one or more directories
    Envs {
        /// Directories to search
        #[arg(required = true)]
        roots: Vec<PathBuf>,

        /// How many levels below each root to search (negative for unlimited)
        #[arg(short, long, allow_negative_numbers = true)]
        depth: Option<i32>,

        /// Number of validation workers
        #[arg(short, long)]
        workers: Option<usize>,

        /// Output format (table, json)
        #[arg(short, long)]
        format: Option<String>,
    },

    /// List the packages of a virtual environment with their disk usage
    Packages {
        /// Path to the virtual environment
        venv: PathBuf,

        /// Number of size-scan workers
        #[arg(short, long)]
        workers: Option<usize>,

        /// Compare installed versions against PyPI
        #[arg(long)]
        outdated: bool,

        /// Hide pip, setuptools and wheel
        #[arg(long)]
        hide_default: bool,

        /// Output format (table, json)
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Show PyPI metadata for one or more projects
    Pypi {
        /// Project names
        #[arg(required = true)]
        names: Vec<String>,

        /// Ignore cached entries and fetch again
        #[arg(long)]
        refresh: bool,

        /// Output format (table, json)
        #[arg(short, long)]
        format: Option<String>,
    },

    /// List system-wide Python interpreters
    Interpreters {
        /// Output format (table, json)
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Show or create config file
    Config {
        /// Generate default config file
        #[arg(long)]
        init: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Clear the PyPI metadata cache
    ClearCache,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli.command).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "venvscan=debug" } else { "venvscan=warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();
}

async fn run(command: Commands) -> Result<u8> {
    let mut config = Config::load().unwrap_or_else(|e| {
        warn!(error = %e, "Ignoring unreadable config file");
        Config::default()
    });

    match command {
        Commands::Envs {
            roots,
            depth,
            workers,
            format,
        } => {
            if let Some(depth) = depth {
                config.max_depth = depth;
            }
            if let Some(workers) = workers {
                config.discovery_workers = workers;
            }
            let format = resolve_format(format, &config)?;
            run_envs(roots, &config, format).await
        }
        Commands::Packages {
            venv,
            workers,
            outdated,
            hide_default,
            format,
        } => {
            if let Some(workers) = workers {
                config.size_workers = workers;
            }
            config.check_outdated |= outdated;
            config.hide_default_packages |= hide_default;
            let format = resolve_format(format, &config)?;
            run_packages(venv, &config, format).await
        }
        Commands::Pypi {
            names,
            refresh,
            format,
        } => {
            let format = resolve_format(format, &config)?;
            run_pypi(names, refresh, &config, format).await
        }
        Commands::Interpreters { format } => {
            let format = resolve_format(format, &config)?;
            run_interpreters(&config, format).await
        }
        Commands::Config { init, path } => {
            handle_config(init, path)?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::ClearCache => {
            let cache = MetadataCache::open_default(config.cache_ttl_hours)?;
            cache.clear()?;
            println!("Cache cleared ({}).", cache.path().display());
            Ok(exit_codes::SUCCESS)
        }
    }
}

fn resolve_format(format: Option<String>, config: &Config) -> Result<OutputFormat> {
    let format = format.unwrap_or_else(|| config.default_format.clone());
    OutputFormat::from_str(&format).map_err(|e| anyhow::anyhow!(e))
}

/// Spinner on stderr, only for table output.
fn spinner(format: OutputFormat, message: &str) -> Result<Option<ProgressBar>> {
    if format != OutputFormat::Table {
        return Ok(None);
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message.to_string());
    Ok(Some(pb))
}

async fn run_envs(roots: Vec<PathBuf>, config: &Config, format: OutputFormat) -> Result<u8> {
    let progress = spinner(format, "Searching for virtual environments...")?;

    let options = config.discovery_options();
    let mut envs = tokio::task::spawn_blocking(move || {
        discover_environments(&roots, &options, &SystemRunner)
    })
    .await?;
    envs.retain(|env| !config.ignore.should_ignore_environment(&env.name));

    if let Some(pb) = progress {
        pb.finish_with_message(format!("Found {} virtual environments", envs.len()));
    }

    match format {
        OutputFormat::Table => print_environments(&envs)?,
        OutputFormat::Json => print_json(&envs)?,
    }
    Ok(exit_codes::SUCCESS)
}

async fn run_packages(venv: PathBuf, config: &Config, format: OutputFormat) -> Result<u8> {
    let progress = spinner(format, "Measuring installed packages...")?;

    let options = config.library_scan_options();
    let scanned =
        tokio::task::spawn_blocking(move || scan_library(&venv, &options, &SystemRunner)).await?;
    let mut report = match scanned {
        Ok(report) => report,
        Err(e) => {
            if let Some(pb) = progress {
                pb.finish_and_clear();
            }
            return Err(e.into());
        }
    };

    report.packages.retain(|p| {
        !(config.hide_default_packages && p.is_default())
            && !config.ignore.should_ignore_package(p.name())
    });

    if let Some(ref pb) = progress {
        pb.set_message(format!("Measured {} packages", report.packages.len()));
    }

    if config.check_outdated && !report.packages.is_empty() {
        if let Some(ref pb) = progress {
            pb.set_message("Checking for outdated packages...");
        }

        let cache = MetadataCache::open_default(config.cache_ttl_hours)?;
        let names: Vec<String> = report.packages.iter().map(|p| p.name().to_string()).collect();
        let latest = fetch_metadata(&names, &default_source(), &cache).await;
        if let Err(e) = cache.save() {
            warn!(error = %e, "Failed to save metadata cache");
        }
        report.outdated = check_outdated(&report.packages, &latest);
    }

    if let Some(pb) = progress {
        pb.finish_with_message(format!(
            "Scanned {} packages ({} outdated)",
            report.packages.len(),
            report.outdated.len()
        ));
    }

    match format {
        OutputFormat::Table => print_library(&report)?,
        OutputFormat::Json => print_json(&report)?,
    }
    Ok(exit_codes::SUCCESS)
}

async fn run_pypi(
    names: Vec<String>,
    refresh: bool,
    config: &Config,
    format: OutputFormat,
) -> Result<u8> {
    let progress = spinner(format, "Fetching PyPI metadata...")?;

    let cache = MetadataCache::open_default(config.cache_ttl_hours)?;
    // A zero TTL makes every entry stale, so all requested names are fetched again.
    let cache = if refresh { cache.with_ttl_hours(0) } else { cache };

    let found = fetch_metadata(&names, &default_source(), &cache).await;
    if let Err(e) = cache.save() {
        warn!(error = %e, "Failed to save metadata cache");
    }

    if let Some(pb) = progress {
        pb.finish_with_message(format!("Fetched {} of {} projects", found.len(), names.len()));
    }

    match format {
        OutputFormat::Table => print_pypi(&names, &found)?,
        OutputFormat::Json => print_json(&found)?,
    }

    if names.iter().all(|name| found.contains_key(name)) {
        Ok(exit_codes::SUCCESS)
    } else {
        Ok(exit_codes::PARTIAL)
    }
}

async fn run_interpreters(config: &Config, format: OutputFormat) -> Result<u8> {
    let progress = spinner(format, "Looking for Python interpreters...")?;

    let workers = config.discovery_workers;
    let timeout = config.probe_timeout();
    let found = tokio::task::spawn_blocking(move || {
        find_interpreters(&interpreter_search_paths(), &SystemRunner, workers, timeout)
    })
    .await?;

    if let Some(pb) = progress {
        pb.finish_with_message(format!("Found {} interpreters", found.len()));
    }

    match format {
        OutputFormat::Table => print_interpreters(&found)?,
        OutputFormat::Json => print_json(&found)?,
    }
    Ok(exit_codes::SUCCESS)
}

fn handle_config(init: bool, show_path: bool) -> Result<()> {
    let config_path = Config::config_path();

    if show_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            println!("Config file already exists at: {}", config_path.display());
            return Ok(());
        }

        let config = Config::default();
        config.save()?;
        println!("Created config file at: {}", config_path.display());
        println!();
        println!("Default configuration:");
        println!("{}", Config::generate_default_config());
        return Ok(());
    }

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        println!("Config file: {}", config_path.display());
        println!();
        println!("{}", content);
    } else {
        println!("No config file found.");
        println!("Run 'venvscan config --init' to create one.");
        println!();
        println!("Config path: {}", config_path.display());
    }

    Ok(())
}
