use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

mod config;
mod dashboard;
mod engine;
mod fixtures;
mod model;
mod notify;
mod subs;

use config::Config;
use dashboard::AppState;
use engine::PollLoop;
use fixtures::cache::QueryWindow;
use fixtures::{FixtureFetcher, FootballData, SnapshotCache, TeamDirectory};
use notify::{AudioCue, DiscordNotifier, Dispatcher, HttpAudioCue, LogSink, NotificationSink};
use subs::JsonSubscriptionStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    if config.dry_run {
        info!("🟡 DRY RUN mode – notifications are logged, not delivered");
    } else {
        info!("🔴 LIVE mode – notifications WILL be delivered via Discord");
    }

    // Upstream source and the shared fetch plumbing
    let token = config.football_data_token.as_deref().unwrap_or_default();
    let source = Arc::new(FootballData::new(token, Some(&config.football_data_api_url))?);
    let pacing = Duration::from_millis(config.fetch_pacing_ms);
    let fetcher = Arc::new(FixtureFetcher::new(
        source.clone(),
        pacing,
        Duration::from_millis(config.fetch_jitter_ms),
    ));

    let ttl = Duration::from_secs(config.cache_ttl_secs);
    let live_cache = SnapshotCache::new(
        fetcher.clone(),
        QueryWindow::Live {
            lookback_hours: config.lookback_hours,
        },
        ttl,
    );
    let upcoming_cache = SnapshotCache::new(
        fetcher.clone(),
        QueryWindow::Upcoming {
            lookahead_days: config.lookahead_days,
        },
        ttl,
    );

    let store = JsonSubscriptionStore::new(&config.subscriptions_path);
    let directory = Arc::new(TeamDirectory::new(
        source.clone(),
        config.competitions.clone(),
        pacing,
    ));

    // Notification sinks
    let sink: Arc<dyn NotificationSink> = if config.dry_run {
        Arc::new(LogSink)
    } else {
        Arc::new(DiscordNotifier::new(
            config.discord_token.as_deref().unwrap_or_default(),
            config.discord_channel_id,
            None,
        )?)
    };
    let audio: Option<Arc<dyn AudioCue>> = match &config.sound_server_url {
        Some(url) => Some(Arc::new(HttpAudioCue::new(url)?)),
        None => None,
    };
    let dispatcher = Dispatcher::new(sink, audio);

    // Background poll loop
    let poll = PollLoop::new(
        live_cache.clone(),
        Arc::new(store.clone()),
        dispatcher,
        Duration::from_secs(config.stale_retention_hours * 3600),
    );
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let poll_handle = poll.spawn(Duration::from_secs(config.poll_interval_secs), shutdown_rx);

    // Status/subscription API
    let state = AppState {
        live: live_cache,
        upcoming: upcoming_cache,
        store,
        directory,
    };
    let app = dashboard::router(state);
    let addr: SocketAddr = config.listen_addr.parse()?;
    info!("API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tokio::select! {
        res = axum::serve(listener, app) => { res?; }
        _ = tokio::signal::ctrl_c() => { info!("shutdown requested"); }
    }

    // Stop the timer; an in-flight cycle finishes on its own.
    let _ = shutdown_tx.send(true);
    poll_handle.await?;
    Ok(())
}
