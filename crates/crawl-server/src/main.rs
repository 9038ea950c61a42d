//! Process entry point: CLI flags, tracing init, resource wiring, and the
//! `axum::serve` loop.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::Semaphore;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crawl_config::Config;
use crawl_core::{Fetcher, RateLimiter};
use crawl_discussion::client::DiscussionApiClient;
use crawl_jobs::JobRegistry;
use crawl_review_browser::BrowserPool;
use crawl_server::{build_router, AppState};

#[derive(Parser, Debug)]
#[command(name = "crawl-server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Mobile-app market-intelligence crawl service")]
struct Cli {
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Maximum number of requests served concurrently before returning 429.
    #[arg(long, default_value_t = 32)]
    max_concurrent_requests: usize,

    /// Skip launching the Playwright browser pool (feed-only mode).
    #[arg(long)]
    no_browser: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let limiter = RateLimiter::new(
        config.rate_limit_per_minute,
        config.rate_limit_burst.max(1),
        config.rate_limit_per_minute,
    );
    let fetcher = Arc::new(Fetcher::new(reqwest::Client::new(), limiter));

    let browser_pool = if cli.no_browser {
        None
    } else {
        let pool = BrowserPool::launch()
            .await
            .context("browser pool failed to launch; pass --no-browser to run feed-only, or fix the Playwright install")?;
        Some(Arc::new(pool))
    };

    let state = AppState {
        fetcher,
        browser_pool,
        discussion_client: Arc::new(DiscussionApiClient::reddit()),
        jobs: JobRegistry::new(),
        config: Arc::new(config),
        concurrency: Arc::new(Semaphore::new(cli.max_concurrent_requests)),
        started_at: std::time::Instant::now(),
    };

    let app = build_router(state).layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", cli.host, cli.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "crawl-server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
