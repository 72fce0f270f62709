//! Lookout command-line interface.
//!
//! Thin shell wiring configuration, logging and the HTTP platform probes
//! into a dispatcher. Results are printed to stdout as JSON; logs go to
//! stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lookout_core::{Category, LookoutConfig, QueryKind, ServiceAdapter, ServiceId};
use lookout_dispatch::{Dispatcher, DispatcherBuilder, RateLimiter, SearchRequest};
use lookout_platforms::{
    probes_for, HttpFetcher, LinkExpander, PageFetcher, PlatformLoader, PlatformRegistry,
    ReverseImageSearch,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Lookout - OSINT query orchestration
#[derive(Parser)]
#[command(name = "lookout", version, about)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a query against every applicable service and print a report
    Search {
        query: String,
        /// Declare the query kind instead of classifying it
        #[arg(long)]
        kind: Option<QueryKind>,
        /// Only run services in this category (repeatable)
        #[arg(long = "category")]
        categories: Vec<Category>,
        /// Stop waiting for services after this many seconds
        #[arg(long)]
        deadline_secs: Option<u64>,
    },
    /// Check whether an identifier exists on each platform
    Check {
        identifier: String,
        /// Only check this platform (repeatable)
        #[arg(long = "platform")]
        platforms: Vec<ServiceId>,
        /// Stop waiting for platforms after this many seconds
        #[arg(long)]
        deadline_secs: Option<u64>,
    },
    /// List the loaded platform definitions
    Platforms,
}

#[derive(Serialize)]
struct PlatformEntry {
    id: String,
    name: String,
    url_template: String,
}

/// Initialize tracing subscriber for logging
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,lookout=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<LookoutConfig> {
    let Some(path) = path else {
        return LookoutConfig::load_with_env().context("failed to load configuration");
    };

    let mut config = LookoutConfig::load_from(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    config.apply_overrides(|key| std::env::var(key).ok());
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn load_registry(config: &LookoutConfig) -> Result<PlatformRegistry> {
    match &config.http.definitions_dir {
        Some(dir) => {
            let loader = PlatformLoader::new(dir.clone())
                .with_context(|| format!("invalid definitions directory {}", dir.display()))?;
            PlatformRegistry::load_from(&loader).context("failed to load platform definitions")
        }
        None => PlatformRegistry::with_builtin().context("failed to load built-in platforms"),
    }
}

fn build_dispatcher(config: &LookoutConfig, registry: &PlatformRegistry) -> Result<Dispatcher> {
    // Platform minimums apply unless the config overrides that service.
    let mut limiter = RateLimiter::from_config(&config.rate_limit)?;
    for (id, interval) in registry.min_intervals() {
        if !config.rate_limit.services.contains_key(id.as_str()) {
            limiter = limiter.with_interval(id, interval);
        }
    }

    let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new(&config.http)?);
    let probes: Vec<Arc<dyn ServiceAdapter>> = probes_for(registry, Arc::clone(&fetcher))
        .into_iter()
        .map(|probe| Arc::new(probe) as Arc<dyn ServiceAdapter>)
        .collect();

    let links: [Arc<dyn ServiceAdapter>; 2] = [
        Arc::new(LinkExpander::new(Arc::clone(&fetcher))?),
        Arc::new(ReverseImageSearch::new(fetcher)?),
    ];

    // Platform probes double as username search adapters.
    let builder = links
        .into_iter()
        .chain(probes.iter().cloned())
        .fold(DispatcherBuilder::from_config(config)?, DispatcherBuilder::adapter);

    Ok(builder
        .probes(probes)
        .rate_limiter(Arc::new(limiter))
        .build()?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{json}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    info!("Starting Lookout v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(cli.config.as_deref())?;
    let registry = load_registry(&config)?;

    match cli.command {
        Commands::Search {
            query,
            kind,
            categories,
            deadline_secs,
        } => {
            let dispatcher = build_dispatcher(&config, &registry)?;

            let mut request = SearchRequest::new(query).with_categories(categories);
            if let Some(kind) = kind {
                request = request.with_kind(kind);
            }
            if let Some(secs) = deadline_secs {
                request = request.with_deadline(Duration::from_secs(secs));
            }

            let records = dispatcher.search(request).await?;
            print_json(&dispatcher.build_report(&records))
        }
        Commands::Check {
            identifier,
            platforms,
            deadline_secs,
        } => {
            let dispatcher = build_dispatcher(&config, &registry)?;
            let platforms = (!platforms.is_empty()).then_some(platforms.as_slice());

            let matrix = match deadline_secs {
                Some(secs) => {
                    dispatcher
                        .check_all_within(&identifier, platforms, Duration::from_secs(secs))
                        .await?
                }
                None => dispatcher.check_all(&identifier, platforms).await?,
            };

            info!(
                found = matrix.found().count(),
                unchecked = matrix.unchecked_count(),
                "check complete"
            );
            print_json(&matrix)
        }
        Commands::Platforms => {
            let entries: Vec<PlatformEntry> = registry
                .get_all()
                .into_iter()
                .map(|definition| PlatformEntry {
                    id: definition.id().to_string(),
                    name: definition.name().to_string(),
                    url_template: definition.platform.url_template.clone(),
                })
                .collect();
            print_json(&entries)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_search_arguments() {
        let cli = Cli::try_parse_from([
            "lookout",
            "search",
            "example.com",
            "--kind",
            "username",
            "--category",
            "platform",
            "--deadline-secs",
            "5",
        ])
        .expect("parse arguments");

        match cli.command {
            Commands::Search {
                query,
                kind,
                categories,
                deadline_secs,
            } => {
                assert_eq!(query, "example.com");
                assert_eq!(kind, Some(QueryKind::Username));
                assert_eq!(categories, vec![Category::Platform]);
                assert_eq!(deadline_secs, Some(5));
            }
            _ => panic!("expected search command"),
        }
    }

    #[test]
    fn test_parse_rejects_bad_platform_id() {
        let result = Cli::try_parse_from(["lookout", "check", "octocat", "--platform", "Not Valid"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "[dispatch]\nmax_in_flight = 4").expect("write config");

        let config = load_config(Some(file.path())).expect("load config");
        assert_eq!(config.dispatch.max_in_flight, 4);
    }

    #[test]
    fn test_build_dispatcher_registers_builtin_platforms() {
        let config = LookoutConfig::default();
        let registry = PlatformRegistry::with_builtin().expect("load built-in platforms");

        let dispatcher = build_dispatcher(&config, &registry).expect("build dispatcher");

        assert_eq!(dispatcher.adapter_count(), registry.count() + 2);
        assert_eq!(
            dispatcher.limiter().interval_for(&"twitter".parse().expect("valid ID")),
            Duration::from_millis(2000)
        );
    }
}
