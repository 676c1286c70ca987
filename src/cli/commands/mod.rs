//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod scrape;
mod sites;
mod store;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use kirana::config::{load_settings_with_options, LoadOptions};
use kirana::extract::SiteId;

#[derive(Parser)]
#[command(name = "kirana")]
#[command(about = "Grocery listing scraper for Indian quick-commerce sites")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Resolve relative paths from current working directory instead of config file location
    #[arg(long, global = true)]
    cwd: bool,

    /// Data directory (overrides config file)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape product listings from one or more sites
    Scrape {
        /// Sites to scrape (all sites when omitted)
        #[arg(value_enum)]
        sites: Vec<SiteId>,
        /// JSON file of targets: category URLs or search terms
        #[arg(short = 'T', long)]
        targets: Option<PathBuf>,
        /// Search term or URL to scrape (repeatable)
        #[arg(short, long = "query")]
        queries: Vec<String>,
        /// First target index of the batch
        #[arg(long, default_value = "0")]
        start: usize,
        /// End of the batch, exclusive (default: end of list)
        #[arg(long)]
        end: Option<usize>,
        /// Records to collect per URL (overrides site defaults)
        #[arg(short, long)]
        limit: Option<usize>,
        /// Browser workers per site
        #[arg(short, long)]
        workers: Option<usize>,
        /// Import merged artifacts into the database after scraping
        #[arg(long)]
        store: bool,
        /// Keep running and scrape on a schedule
        #[arg(long)]
        daemon: bool,
        /// Daily start time in daemon mode (HH:MM, local time)
        #[arg(long, requires = "daemon", conflicts_with = "interval")]
        at: Option<String>,
        /// Seconds between cycles in daemon mode (default: 86400)
        #[arg(long, requires = "daemon")]
        interval: Option<u64>,
    },

    /// Merge leftover per-worker partial files into site artifacts
    Merge {
        /// Sites to merge (all sites when omitted)
        #[arg(value_enum)]
        sites: Vec<SiteId>,
    },

    /// Import a JSON artifact into the database with today's date
    Store {
        /// Artifact to import
        file: PathBuf,
        /// Collection to import into
        #[arg(long, value_enum)]
        collection: SiteId,
    },

    /// List scrape dates per collection
    Dates {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the monthly price history of a product
    Prices {
        /// Exact product name
        name: String,
        /// Collection to search
        #[arg(long, value_enum)]
        collection: SiteId,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List stored products and prices for one scrape date
    List {
        /// Collection to list
        #[arg(long, value_enum)]
        collection: SiteId,
        /// Scrape date (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective profile of every site
    Sites,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        use_cwd: cli.cwd,
        data: cli.data,
    };
    let (settings, config) = load_settings_with_options(options).await;

    match cli.command {
        Commands::Scrape {
            sites,
            targets,
            queries,
            start,
            end,
            limit,
            workers,
            store,
            daemon,
            at,
            interval,
        } => {
            let args = scrape::ScrapeArgs {
                sites,
                targets,
                queries,
                start,
                end,
                limit,
                workers,
                store,
            };
            if daemon {
                let schedule = scrape::schedule_from(at.as_deref(), interval)?;
                scrape::cmd_scrape_daemon(&settings, &config, &args, schedule).await
            } else {
                scrape::cmd_scrape(&settings, &config, &args).await
            }
        }
        Commands::Merge { sites } => scrape::cmd_merge(&settings, &sites).await,
        Commands::Store { file, collection } => {
            store::cmd_store(&settings, &file, collection).await
        }
        Commands::Dates { json } => store::cmd_dates(&settings, json).await,
        Commands::Prices {
            name,
            collection,
            json,
        } => store::cmd_prices(&settings, &name, collection, json).await,
        Commands::List {
            collection,
            date,
            json,
        } => store::cmd_list(&settings, collection, date.as_deref(), json).await,
        Commands::Sites => sites::cmd_sites(&config).await,
    }
}
