//! `osprey` - scan, store and correlate identifiers from the terminal.
//!
//! # Usage
//!
//! ```text
//! osprey scan username octocat
//! osprey scan domain example.com
//! osprey correlate example.com --graph
//! osprey correlate example.com --dot | dot -Tsvg > example.svg
//! ```

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::{CorrelateView, ScanOptions};
use osprey_core::AppConfig;
use osprey_store::FsIdentityStore;
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(
    name = "osprey",
    version,
    about = "Collect, store and correlate public identifiers for a target"
)]
struct Args {
    /// Path to a TOML config file (default: the XDG config location).
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log debug output to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one scan and store its results.
    Scan {
        /// Scan category: username, domain or "ip address".
        category: String,
        /// Username, domain or IP address to scan.
        target: String,
        /// Print the results without storing them.
        #[arg(long)]
        no_save: bool,
        /// Skip profile enrichment of discovered accounts.
        #[arg(long)]
        no_enrich: bool,
    },
    /// List stored targets.
    Targets,
    /// Print every stored record of a target.
    Show {
        /// Target name.
        target: String,
    },
    /// Correlate a target's records.
    Correlate {
        /// Target name.
        target: String,
        /// Print the relationship graph instead of the correlations.
        #[arg(long, conflicts_with = "dot")]
        graph: bool,
        /// Print the relationship graph in Graphviz format.
        #[arg(long)]
        dot: bool,
    },
    /// Delete every stored record of a target.
    Forget {
        /// Target name.
        target: String,
    },
    /// Print the effective configuration.
    Config {
        /// Write the configuration file if it does not exist yet.
        #[arg(long)]
        init: bool,
    },
}

/// Initialize tracing subscriber for logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default = if verbose { "info,osprey=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<(AppConfig, PathBuf)> {
    match path {
        Some(path) => {
            let mut config = AppConfig::load_from(path)
                .with_context(|| format!("loading config file {}", path.display()))?;
            config.apply_env();
            config.validate().context("validating config")?;
            Ok((config, path.clone()))
        }
        None => {
            let config = AppConfig::load_with_env().context("loading config")?;
            let path = AppConfig::config_path().context("locating config file")?;
            Ok((config, path))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);
    debug!("Starting Osprey v{}", env!("CARGO_PKG_VERSION"));

    let (config, config_path) = load_config(args.config.as_ref())?;

    let open_store = || -> Result<FsIdentityStore> {
        let store = FsIdentityStore::from_config(&config).context("opening identity store")?;
        debug!(root = %store.root().display(), "using identity store");
        Ok(store)
    };

    let output = match args.command {
        Command::Scan {
            category,
            target,
            no_save,
            no_enrich,
        } => {
            let options = ScanOptions {
                save: !no_save,
                enrich: !no_enrich && config.enrichment.enabled,
            };
            commands::scan(&config, &open_store()?, &category, &target, options).await?
        }
        Command::Targets => commands::targets(&open_store()?).await?,
        Command::Show { target } => commands::show(&open_store()?, &target).await?,
        Command::Correlate { target, graph, dot } => {
            let view = if dot {
                CorrelateView::Dot
            } else if graph {
                CorrelateView::Graph
            } else {
                CorrelateView::Correlations
            };
            commands::correlate(&open_store()?, &target, view).await?
        }
        Command::Forget { target } => commands::forget(&open_store()?, &target).await?,
        Command::Config { init } => {
            if init && !config_path.exists() {
                config
                    .save_to(&config_path)
                    .with_context(|| format!("writing {}", config_path.display()))?;
                info!(path = %config_path.display(), "wrote config file");
            }
            toml::to_string_pretty(&config).context("rendering config")?
        }
    };

    println!("{output}");
    Ok(())
}
