use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::model::EventKind;

/// Fire-and-forget audio side-channel keyed by event kind.
#[async_trait]
pub trait AudioCue: Send + Sync {
    async fn play(&self, kind: EventKind);
}

/// Audio cue sink that posts to a companion sound server. Delivery is
/// best-effort: failures are logged at debug and never surface.
pub struct HttpAudioCue {
    http: Client,
    url: String,
}

impl HttpAudioCue {
    pub fn new(url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(HttpAudioCue {
            http,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl AudioCue for HttpAudioCue {
    async fn play(&self, kind: EventKind) {
        let payload = serde_json::json!({"cue": kind.cue()});
        match self.http.post(&self.url).json(&payload).send().await {
            Ok(resp) if !resp.status().is_success() => {
                debug!("audio cue '{}' rejected: HTTP {}", kind.cue(), resp.status());
            }
            Ok(_) => {}
            Err(e) => debug!("audio cue '{}' failed: {}", kind.cue(), e),
        }
    }
}
