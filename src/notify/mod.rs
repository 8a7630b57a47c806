pub mod audio;
pub mod discord;

pub use audio::{AudioCue, HttpAudioCue};
pub use discord::DiscordNotifier;

use async_trait::async_trait;
use futures_util::future::join_all;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::model::{EventKind, MatchEvent, SubscriberId};

/// Structured message accepted by the notification sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    /// Color hint (0xRRGGBB), keyed by event severity.
    pub color: u32,
}

/// Failure taxonomy for one delivery attempt.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Recipient refused delivery (blocked DMs / missing channel permission).
    #[error("recipient refused delivery")]
    Forbidden,

    #[error("sink error: HTTP {0}")]
    Status(u16),

    #[error("sink request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed sink response: {0}")]
    Malformed(String),
}

/// Downstream delivery surface: per-subscriber direct messages and one
/// shared broadcast channel.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send_direct(
        &self,
        subscriber: SubscriberId,
        note: &Notification,
    ) -> Result<(), DeliveryError>;

    async fn broadcast(&self, note: &Notification) -> Result<(), DeliveryError>;
}

/// Sink that only logs, for --dry-run.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn send_direct(
        &self,
        subscriber: SubscriberId,
        note: &Notification,
    ) -> Result<(), DeliveryError> {
        info!("[dry-run] DM to {}: {}: {}", subscriber, note.title, note.body);
        Ok(())
    }

    async fn broadcast(&self, note: &Notification) -> Result<(), DeliveryError> {
        info!("[dry-run] broadcast: {}: {}", note.title, note.body);
        Ok(())
    }
}

fn color_for(kind: EventKind) -> u32 {
    match kind {
        EventKind::Start => 0x2ECC71,
        EventKind::Goal => 0xE67E22,
        EventKind::Pause => 0xF1C40F,
        EventKind::End => 0xE74C3C,
    }
}

/// Render a detected event as the notification shown to subscribers.
pub fn render(event: &MatchEvent) -> Notification {
    let record = &event.record;
    Notification {
        title: "⚽ Match update".to_string(),
        body: format!(
            "**{}**\nCompetition: **{}**\nMatch: **{}**",
            event.message,
            record.competition,
            record.scoreline(),
        ),
        color: color_for(event.kind),
    }
}

/// Per-event delivery counts, for cycle logging.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub delivered: usize,
    pub failed: usize,
    pub broadcast: bool,
}

/// Fans one event out to its resolved subscribers and the shared channel.
///
/// Direct deliveries run concurrently and fail independently; the broadcast
/// is skipped silently when the channel permission check refuses it; the
/// audio cue is best-effort and cannot affect either.
pub struct Dispatcher {
    sink: Arc<dyn NotificationSink>,
    audio: Option<Arc<dyn AudioCue>>,
}

impl Dispatcher {
    pub fn new(sink: Arc<dyn NotificationSink>, audio: Option<Arc<dyn AudioCue>>) -> Self {
        Dispatcher { sink, audio }
    }

    pub async fn dispatch(
        &self,
        event: &MatchEvent,
        recipients: &[SubscriberId],
    ) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        if recipients.is_empty() {
            return outcome;
        }

        if let Some(audio) = &self.audio {
            audio.play(event.kind).await;
        }

        let note = render(event);
        let sends = recipients.iter().map(|subscriber| {
            let note = &note;
            async move { (*subscriber, self.sink.send_direct(*subscriber, note).await) }
        });

        for (subscriber, result) in join_all(sends).await {
            match result {
                Ok(()) => outcome.delivered += 1,
                Err(DeliveryError::Forbidden) => {
                    debug!("subscriber {} refuses direct messages", subscriber);
                    outcome.failed += 1;
                }
                Err(e) => {
                    warn!("direct delivery to {} failed: {}", subscriber, e);
                    outcome.failed += 1;
                }
            }
        }

        match self.sink.broadcast(&note).await {
            Ok(()) => outcome.broadcast = true,
            Err(DeliveryError::Forbidden) => {
                debug!("broadcast channel permission check failed, skipping");
            }
            Err(e) => warn!("broadcast delivery failed: {}", e),
        }

        outcome
    }
}
