use anyhow::{Context, Result, bail};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use bigaray_ingest::application::{
    AdapterRegistry, ChannelRunner, ImageCleanup, IngestContext, IngestError, LinkHealthChecker, reports,
};
use bigaray_ingest::domain::ChannelKey;
use bigaray_ingest::infrastructure::{
    AppConfig, DatabaseConnection, FsBlobStore, HttpFetchGateway, SqliteProductRepository, SqliteSiteRepository,
    init_logging_with_config,
};

#[derive(Parser, Debug)]
#[command(name = "bigaray", version, about = "Fashion catalog ingestion")]
struct Cli {
    /// Configuration file (TOML, JSON or YAML); defaults to ./bigaray.toml when present
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scrape one channel, e.g. `Freepeople_1_1`
    Scrape {
        channel: ChannelKey,
        /// First listing page (defaults to the adapter's range)
        #[arg(long)]
        from: Option<u32>,
        /// Last listing page, inclusive
        #[arg(long)]
        to: Option<u32>,
    },
    /// Scrape every registered channel, one after another
    ScrapeAll,
    /// Re-check catalogued product pages and retire dead ones
    CheckLinks {
        #[arg(long)]
        min_age_days: Option<i64>,
    },
    /// Delete products whose image file is missing
    CleanupImages,
    /// List registered channels
    Channels,
    /// List channels without a recent heartbeat
    StaleChannels {
        #[arg(long)]
        hours: Option<i64>,
    },
    /// Count products a site added today (UTC)
    Today { site: String },
}

#[derive(Serialize)]
struct ChannelInfo {
    channel: String,
    site: &'static str,
    listing_mode: bigaray_ingest::domain::FetchMode,
    pages: String,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Cancels the token on Ctrl-C; runs stop at the next page boundary
fn install_interrupt_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let handle = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current page");
            handle.cancel();
        }
    });
    token
}

async fn build_context(config: AppConfig, registry: Arc<AdapterRegistry>) -> Result<IngestContext> {
    let db = DatabaseConnection::with_max_connections(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to open the catalog database")?;
    db.migrate().await.context("Failed to migrate the catalog database")?;

    let products = Arc::new(SqliteProductRepository::new(db.pool().clone()));
    let sites = Arc::new(SqliteSiteRepository::new(db.pool().clone()));
    let gateway = Arc::new(HttpFetchGateway::new(&config.http, &config.proxy)?);
    let blobs = Arc::new(FsBlobStore::new(config.images.root_dir.clone()));

    Ok(IngestContext {
        config: Arc::new(config),
        registry,
        gateway,
        catalog: products,
        sites: sites.clone(),
        scrapers: sites,
        blobs,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_logging_with_config(&config.logging)?;

    let registry = Arc::new(AdapterRegistry::with_default_adapters());

    if let Command::Channels = cli.command {
        let channels: Vec<ChannelInfo> = registry
            .adapters()
            .into_iter()
            .map(|adapter| ChannelInfo {
                channel: adapter.channel_key().to_string(),
                site: adapter.definition.display_name,
                listing_mode: adapter.listing_mode,
                pages: format!("{}..={}", adapter.default_pages.start(), adapter.default_pages.end()),
            })
            .collect();
        return print_json(&channels);
    }

    let stale_hours = config.crawling.stale_channel_hours;
    let min_age_days = config.crawling.health_check_min_age_days;
    let context = build_context(config, registry.clone()).await?;
    let cancel = install_interrupt_handler();

    match cli.command {
        Command::Scrape { channel, from, to } => {
            let adapter = registry
                .get(&channel)
                .ok_or_else(|| IngestError::UnknownChannel(channel.to_string()))?;
            let Some(pages) = adapter.page_range(from, to) else {
                bail!("--from must not be greater than --to (channel {channel})");
            };
            let summary = ChannelRunner::new(context).run_pages(adapter, pages, &cancel).await?;
            print_json(&summary)
        }
        Command::ScrapeAll => {
            let runner = ChannelRunner::new(context);
            let mut summaries = Vec::new();
            let mut fatal = 0;
            for adapter in registry.adapters() {
                if cancel.is_cancelled() {
                    break;
                }
                match runner.run(adapter, &cancel).await {
                    Ok(summary) => summaries.push(summary),
                    Err(e) if e.is_fatal() => {
                        error!(channel = %adapter.channel_key(), error = %e, "Channel not started");
                        fatal += 1;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            if summaries.is_empty() && fatal > 0 {
                bail!("no channel could be started ({fatal} failed on configuration)");
            }
            print_json(&summaries)
        }
        Command::CheckLinks { min_age_days: days } => {
            let summary = LinkHealthChecker::new(context)
                .run(days.unwrap_or(min_age_days), &cancel)
                .await?;
            print_json(&summary)
        }
        Command::CleanupImages => {
            let summary = ImageCleanup::new(context).run(&cancel).await?;
            print_json(&summary)
        }
        Command::StaleChannels { hours } => {
            let threshold = Utc::now() - Duration::hours(hours.unwrap_or(stale_hours));
            let stale = reports::stale_channels(context.scrapers.as_ref(), threshold).await?;
            info!(count = stale.len(), "Stale channels");
            print_json(&stale)
        }
        Command::Today { site } => {
            let count = reports::inserted_today(context.catalog.as_ref(), &site, Utc::now()).await?;
            println!("{site}: {count}");
            Ok(())
        }
        Command::Channels => Ok(()),
    }
}
