use clap::Parser;

/// Football match notification bot
#[derive(Parser, Debug, Clone)]
#[command(name = "matchday-bot", version, about)]
pub struct Config {
    /// Run in dry-run mode (notifications are logged, not delivered)
    #[arg(long, env = "DRY_RUN", default_value = "false")]
    pub dry_run: bool,

    /// football-data.org API base URL
    #[arg(
        long,
        env = "FOOTBALL_DATA_API_URL",
        default_value = "https://api.football-data.org/v4"
    )]
    pub football_data_api_url: String,

    /// football-data.org API token
    #[arg(long, env = "FOOTBALL_DATA_TOKEN")]
    pub football_data_token: Option<String>,

    /// Discord bot token (required unless --dry-run)
    #[arg(long, env = "DISCORD_TOKEN")]
    pub discord_token: Option<String>,

    /// Discord channel id for broadcast notifications
    #[arg(long, env = "DISCORD_CHANNEL_ID", default_value = "0")]
    pub discord_channel_id: u64,

    /// Companion sound-server URL for audio cues (omit to disable)
    #[arg(long, env = "SOUND_SERVER_URL")]
    pub sound_server_url: Option<String>,

    /// API listen address
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: String,

    /// Subscription store path
    #[arg(long, env = "SUBSCRIPTIONS_PATH", default_value = "subscriptions.json")]
    pub subscriptions_path: String,

    /// Live-state polling interval in seconds
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value = "90")]
    pub poll_interval_secs: u64,

    /// Snapshot cache TTL in seconds
    #[arg(long, env = "CACHE_TTL_SECS", default_value = "45")]
    pub cache_ttl_secs: u64,

    /// Delay between successive upstream calls in milliseconds
    /// (the free plan allows ~10 requests per minute)
    #[arg(long, env = "FETCH_PACING_MS", default_value = "6000")]
    pub fetch_pacing_ms: u64,

    /// Upper bound of random jitter added to each pacing delay, milliseconds
    #[arg(long, env = "FETCH_JITTER_MS", default_value = "1000")]
    pub fetch_jitter_ms: u64,

    /// How many hours back the live query still reports finished matches
    #[arg(long, env = "LOOKBACK_HOURS", default_value = "3")]
    pub lookback_hours: i64,

    /// How many days ahead the upcoming query reaches
    #[arg(long, env = "LOOKAHEAD_DAYS", default_value = "3")]
    pub lookahead_days: i64,

    /// Hours a previous-state entry survives without being re-observed
    #[arg(long, env = "STALE_RETENTION_HOURS", default_value = "6")]
    pub stale_retention_hours: u64,

    /// Competition codes the team directory indexes
    #[arg(
        long,
        env = "COMPETITIONS",
        value_delimiter = ',',
        default_value = "WC,CL,BL1,DED,BSA,PD,FL1,ELC,PPL,EC,SA,PL"
    )]
    pub competitions: Vec<String>,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.football_data_token.is_none() {
            anyhow::bail!("FOOTBALL_DATA_TOKEN is required (get one at football-data.org).");
        }
        if !self.dry_run {
            if self.discord_token.is_none() {
                anyhow::bail!("DISCORD_TOKEN is required. Use --dry-run to log instead.");
            }
            if self.discord_channel_id == 0 {
                anyhow::bail!("DISCORD_CHANNEL_ID is required. Use --dry-run to log instead.");
            }
        }
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be positive");
        }
        if self.lookback_hours < 0 || self.lookahead_days < 0 {
            anyhow::bail!("lookback_hours and lookahead_days must not be negative");
        }
        if self.competitions.is_empty() {
            anyhow::bail!("at least one competition code is required");
        }
        Ok(())
    }
}
