//! CLI for running the WaterCrawl datasource outside a host.
//!
//! Progress records are written to stdout as JSON lines; logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use std::io::Write;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use watercrawl_datasource::{validate_credentials, website_crawl, Config, CrawlParameters};

#[derive(Parser)]
#[command(name = "watercrawl-datasource")]
#[command(about = "Crawl a website through the WaterCrawl API")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check WATERCRAWL_API_KEY and WATERCRAWL_BASE_URL
    Validate,

    /// Crawl a website and print progress records
    Crawl(CrawlArgs),
}

#[derive(clap::Args)]
struct CrawlArgs {
    url: String,
    #[arg(long)]
    max_depth: Option<u32>,
    #[arg(long)]
    limit: Option<u32>,
    /// Comma-separated path patterns
    #[arg(long)]
    exclude_paths: Option<String>,
    /// Comma-separated path patterns
    #[arg(long)]
    include_paths: Option<String>,
    /// Comma-separated domains
    #[arg(long)]
    allowed_domains: Option<String>,
    /// Comma-separated CSS selectors
    #[arg(long)]
    exclude_tags: Option<String>,
    /// Comma-separated CSS selectors
    #[arg(long)]
    include_tags: Option<String>,
    #[arg(long)]
    locale: Option<String>,
    #[arg(long)]
    proxy_server_slug: Option<String>,
    /// Keep navigation, footers and other page chrome
    #[arg(long)]
    full_content: bool,
    #[arg(long)]
    ignore_rendering: bool,
    /// JSON object of extra request headers
    #[arg(long)]
    extra_headers: Option<String>,
}

impl From<CrawlArgs> for CrawlParameters {
    fn from(args: CrawlArgs) -> Self {
        Self {
            url: Some(args.url),
            max_depth: args.max_depth,
            limit: args.limit,
            exclude_paths: args.exclude_paths,
            include_paths: args.include_paths,
            allowed_domains: args.allowed_domains,
            exclude_tags: args.exclude_tags,
            include_tags: args.include_tags,
            locale: args.locale,
            proxy_server_slug: args.proxy_server_slug,
            only_main_content: Some(!args.full_content),
            ignore_rendering: Some(args.ignore_rendering),
            extra_headers: args.extra_headers,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,watercrawl_datasource=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    match cli.command {
        Commands::Validate => {
            validate_credentials(&config.credentials)
                .await
                .context("Credential validation failed")?;
            tracing::info!("Credentials are valid");
        }
        Commands::Crawl(args) => {
            let mut progress = website_crawl(config.credentials, args.into(), config.crawl);
            let stdout = std::io::stdout();

            while let Some(record) = progress.next().await {
                let record = record.context("Crawl failed")?;
                let line = serde_json::to_string(&record).context("Failed to encode record")?;
                let mut out = stdout.lock();
                writeln!(out, "{}", line).context("Failed to write record")?;
            }
        }
    }

    Ok(())
}
