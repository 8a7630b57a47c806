use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::fixtures::fetcher::FetchError;
use crate::fixtures::{SnapshotCache, TeamDirectory};
use crate::model::{EntityId, MatchRecord, SubscriberId};
use crate::subs::{FollowedTeam, JsonSubscriptionStore, SubscriptionReader};

/// Shared state for the status/subscription API. The on-demand read paths go
/// through the same snapshot caches as the poll loop, so they can never force
/// an extra upstream fetch of their own.
#[derive(Clone)]
pub struct AppState {
    pub live: SnapshotCache,
    pub upcoming: SnapshotCache,
    pub store: JsonSubscriptionStore,
    pub directory: Arc<TeamDirectory>,
}

/// Build the Axum router for the API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/live", get(live_handler))
        .route("/api/upcoming", get(upcoming_handler))
        .route("/api/subscriptions", post(subscribe_handler))
        .route(
            "/api/subscriptions/:id",
            get(list_handler).delete(clear_handler),
        )
        .route("/api/subscriptions/:id/:team", delete(unsubscribe_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

#[derive(Debug, Serialize)]
struct MatchesResponse {
    matches: Vec<MatchRecord>,
    /// Present only when the match list is empty, so callers can tell
    /// "nothing relevant" apart from an upstream failure (which is a 503).
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<String>,
}

fn matches_response(matches: Vec<MatchRecord>, empty_note: &str) -> Json<MatchesResponse> {
    let note = matches.is_empty().then(|| empty_note.to_string());
    Json(MatchesResponse { matches, note })
}

fn fetch_error_response(e: FetchError) -> (StatusCode, String) {
    let msg = match e {
        FetchError::RateLimited => "Upstream rate limit reached, try again shortly".to_string(),
        FetchError::Unavailable => "Could not reach the upstream source".to_string(),
    };
    (StatusCode::SERVICE_UNAVAILABLE, msg)
}

async fn active_entities(
    store: &JsonSubscriptionStore,
) -> Result<Vec<EntityId>, (StatusCode, String)> {
    let subscriptions = store
        .list_all_subscribers()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let mut entities: Vec<EntityId> = subscriptions.values().flatten().copied().collect();
    entities.sort_unstable();
    entities.dedup();
    Ok(entities)
}

/// GET /api/live
async fn live_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MatchesResponse>, (StatusCode, String)> {
    let entities = active_entities(&state.store).await?;
    state
        .live
        .get(&entities)
        .await
        .map(|m| matches_response(m, "No followed team is playing right now"))
        .map_err(fetch_error_response)
}

/// GET /api/upcoming
async fn upcoming_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MatchesResponse>, (StatusCode, String)> {
    let entities = active_entities(&state.store).await?;
    state
        .upcoming
        .get(&entities)
        .await
        .map(|mut m| {
            m.sort_by_key(|r| r.utc_date);
            matches_response(m, "No upcoming matches for the followed teams")
        })
        .map_err(fetch_error_response)
}

#[derive(Debug, Deserialize)]
struct SubscribeRequest {
    subscriber_id: SubscriberId,
    /// Team name or a fragment of it; resolved through the team directory.
    team: String,
}

#[derive(Debug, Serialize)]
struct SubscribeResponse {
    added: bool,
    team: FollowedTeam,
}

/// POST /api/subscriptions
async fn subscribe_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubscribeRequest>,
) -> Result<Json<SubscribeResponse>, (StatusCode, String)> {
    let Some(info) = state.directory.search(&req.team).await else {
        return Err((
            StatusCode::NOT_FOUND,
            format!("No team matching '{}' in the tracked competitions", req.team),
        ));
    };

    let team = FollowedTeam {
        team_id: info.id,
        team_name: info.name,
        league: info.competition,
    };
    let added = state
        .store
        .add(req.subscriber_id, team.clone())
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(SubscribeResponse { added, team }))
}

/// GET /api/subscriptions/:id
async fn list_handler(
    State(state): State<Arc<AppState>>,
    Path(subscriber): Path<SubscriberId>,
) -> Result<Json<Vec<FollowedTeam>>, (StatusCode, String)> {
    state
        .store
        .list_entities(subscriber)
        .await
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// DELETE /api/subscriptions/:id/:team
async fn unsubscribe_handler(
    State(state): State<Arc<AppState>>,
    Path((subscriber, team)): Path<(SubscriberId, EntityId)>,
) -> Result<StatusCode, (StatusCode, String)> {
    let removed = state
        .store
        .remove(subscriber, team)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((
            StatusCode::NOT_FOUND,
            "No subscription for that team".to_string(),
        ))
    }
}

/// DELETE /api/subscriptions/:id
async fn clear_handler(
    State(state): State<Arc<AppState>>,
    Path(subscriber): Path<SubscriberId>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .store
        .clear(subscriber)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
