mod crawl;
mod match_name;
mod report;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use partscout_core::{Category, CrawlMode};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "partscout")]
#[command(about = "PC component price crawler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Crawl vendor listings and write prices into the catalog.
    Crawl {
        /// Overrides PARTSCOUT_CRAWL_MODE for this run.
        #[arg(long)]
        mode: Option<CrawlMode>,
        /// Vendor name or slug; repeat to crawl several. Defaults to all.
        #[arg(long = "vendor")]
        vendors: Vec<String>,
        /// Category to crawl; repeat to crawl several. Defaults to all.
        #[arg(long = "category")]
        categories: Vec<Category>,
        /// Write the run report as JSON to this path.
        #[arg(long)]
        report: Option<PathBuf>,
        /// Crawl and match but leave the catalog file untouched.
        #[arg(long)]
        dry_run: bool,
    },
    /// Match a product name against the catalog without crawling.
    Match {
        #[arg(long)]
        category: Category,
        name: String,
        #[arg(long, default_value_t = partscout_catalog::DEFAULT_THRESHOLD)]
        threshold: u8,
        /// How many scored candidates to list.
        #[arg(long, default_value_t = 5)]
        top: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = partscout_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Commands::Crawl {
            mode,
            vendors,
            categories,
            report,
            dry_run,
        } => {
            if let Some(mode) = mode {
                config.crawl_mode = mode;
            }
            let filter = crawl::CrawlFilter {
                vendors,
                categories,
            };
            crawl::run_crawl(&config, &filter, report.as_deref(), dry_run).await
        }
        Commands::Match {
            category,
            name,
            threshold,
            top,
        } => match_name::run_match(&config, category, &name, threshold, top).await,
    }
}
