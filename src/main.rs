//! shopwatch entry point.
//!
//! Subcommands run one crawl or notification pass (optionally as a
//! daemon), serve the read-only listing API, or manage the schema.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use shopwatch::api;
use shopwatch::app_state::AppState;
use shopwatch::config::{ServiceConfig, load_shops};
use shopwatch::crawl::{Orchestrator, ShopPlan};
use shopwatch::fetch::StaticFetcher;
use shopwatch::persistence::{PostgresStore, ProductStore};
use shopwatch::service::daemon::{ctrl_c, run_periodic};
use shopwatch::service::{CrawlService, LogNotifier, NotifyService};

#[derive(Debug, Parser)]
#[command(name = "shopwatch", version, about = "Web shop price tracker")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Crawl every configured shop and merge the results.
    Crawl {
        /// Repeat on the crawl interval until Ctrl-C.
        #[arg(long)]
        daemon: bool,
    },
    /// Report unnotified price events.
    Notify {
        /// Repeat on the notify interval until Ctrl-C.
        #[arg(long)]
        daemon: bool,
    },
    /// Serve the product listing over HTTP.
    Serve,
    /// Create the ledger table, or drop it with `--drop`.
    Schema {
        /// Drop the table instead of creating it.
        #[arg(long)]
        drop: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("SHOPWATCH_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = ServiceConfig::from_env().context("loading configuration")?;
    init_tracing();

    let store: Arc<dyn ProductStore> = Arc::new(
        PostgresStore::connect(&config)
            .await
            .context("connecting to database")?,
    );

    match cli.command {
        Command::Crawl { daemon } => crawl(&config, store, daemon).await,
        Command::Notify { daemon } => notify(&config, store, daemon).await,
        Command::Serve => serve(&config, store).await,
        Command::Schema { drop } => {
            if drop {
                store.drop_schema().await?;
                tracing::info!(table = %config.table_name, "schema dropped");
            } else {
                store.ensure_schema().await?;
                tracing::info!(table = %config.table_name, "schema ready");
            }
            Ok(())
        }
    }
}

async fn crawl(config: &ServiceConfig, store: Arc<dyn ProductStore>, daemon: bool) -> anyhow::Result<()> {
    let shops = load_shops(&config.shops_path)
        .with_context(|| format!("loading shops from {}", config.shops_path.display()))?;
    let client = StaticFetcher::build_client(config.http_timeout, &config.user_agent)?;

    let plans = shops
        .into_iter()
        .map(|shop| ShopPlan::from_config(shop, &client, config.render, config.max_workers))
        .collect::<Result<Vec<_>, _>>()?;
    tracing::info!(shops = plans.len(), "shops loaded");

    store.ensure_schema().await?;
    let service = CrawlService::new(Arc::new(Orchestrator::new(plans)), store, config.retention());

    if daemon {
        run_periodic("crawl", config.crawl_interval, || service.run_once(), ctrl_c()).await;
    } else {
        service.run_once().await?;
    }
    Ok(())
}

async fn notify(config: &ServiceConfig, store: Arc<dyn ProductStore>, daemon: bool) -> anyhow::Result<()> {
    let service = NotifyService::new(store, Arc::new(LogNotifier));

    if daemon {
        run_periodic("notify", config.notify_interval, || service.run_once(), ctrl_c()).await;
    } else {
        service.run_once().await?;
    }
    Ok(())
}

async fn serve(config: &ServiceConfig, store: Arc<dyn ProductStore>) -> anyhow::Result<()> {
    let api_key = config
        .api_key
        .clone()
        .context("SHOPWATCH_API_KEY must be set to serve the API")?;

    let app = api::build_router(AppState::new(store, api_key));

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(ctrl_c())
        .await?;
    Ok(())
}
