use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::debug;
use url::Url;

use super::source::{FetchQuery, MatchSource, SourceError, TeamInfo};
use crate::model::{EntityId, MatchRecord, MatchStatus, TeamRef};
use async_trait::async_trait;

/// Match source backed by the football-data.org v4 API.
/// Docs: <https://www.football-data.org/documentation/quickstart>
pub struct FootballData {
    http: Client,
    token: String,
    /// Base URL for overriding in tests
    base_url: String,
}

impl FootballData {
    pub fn new(token: &str, base_url: Option<&str>) -> Result<Self, SourceError> {
        let base_url = base_url
            .unwrap_or("https://api.football-data.org/v4")
            .trim_end_matches('/')
            .to_string();
        Url::parse(&base_url)
            .map_err(|e| SourceError::Malformed(format!("invalid base URL: {e}")))?;
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(FootballData {
            http,
            token: token.to_string(),
            base_url,
        })
    }

    async fn get_json(&self, url: &str) -> Result<serde_json::Value, SourceError> {
        debug!("GET {}", url);
        let resp = self
            .http
            .get(url)
            .header("X-Auth-Token", &self.token)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(SourceError::RateLimited);
        }
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }
        resp.json::<serde_json::Value>()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl MatchSource for FootballData {
    fn name(&self) -> &str {
        "football-data.org"
    }

    async fn fetch_matches(
        &self,
        entity: EntityId,
        query: &FetchQuery,
    ) -> Result<Vec<MatchRecord>, SourceError> {
        let url = format!(
            "{}/teams/{}/matches?status={}&dateFrom={}&dateTo={}",
            self.base_url,
            entity,
            status_filter(&query.statuses),
            query.date_from,
            query.date_to,
        );
        let raw = self.get_json(&url).await?;
        Ok(parse_matches(&raw))
    }

    async fn fetch_teams(&self, competition: &str) -> Result<Vec<TeamInfo>, SourceError> {
        let url = format!("{}/competitions/{}/teams", self.base_url, competition);
        let raw = self.get_json(&url).await?;
        Ok(parse_teams(&raw, competition))
    }
}

/// Render a status filter as the comma list the v4 API accepts.
fn status_filter(statuses: &[MatchStatus]) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for s in statuses {
        match s {
            MatchStatus::NotStarted => parts.extend(["SCHEDULED", "TIMED"]),
            MatchStatus::Live => parts.push("IN_PLAY"),
            MatchStatus::Paused => parts.push("PAUSED"),
            MatchStatus::Finished => parts.push("FINISHED"),
            MatchStatus::Postponed => parts.push("POSTPONED"),
            MatchStatus::Cancelled => parts.push("CANCELLED"),
            MatchStatus::Unknown => {}
        }
    }
    parts.join(",")
}

/// Extract match records from a `/matches` payload. Records missing an id,
/// a team id or a team name are dropped; missing scores default to zero.
fn parse_matches(raw: &serde_json::Value) -> Vec<MatchRecord> {
    let matches = match raw["matches"].as_array() {
        Some(a) => a,
        None => return vec![],
    };

    matches
        .iter()
        .filter_map(|m| {
            let id = m["id"].as_u64()?;
            let status = MatchStatus::from_api(m["status"].as_str().unwrap_or(""));
            let competition = m["competition"]["name"]
                .as_str()
                .unwrap_or("unknown")
                .to_string();
            let home = parse_team_ref(&m["homeTeam"])?;
            let away = parse_team_ref(&m["awayTeam"])?;

            let ft = &m["score"]["fullTime"];
            let home_score = ft["home"].as_i64().unwrap_or(0) as i32;
            let away_score = ft["away"].as_i64().unwrap_or(0) as i32;

            let utc_date = m["utcDate"]
                .as_str()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(Utc::now);

            Some(MatchRecord {
                id,
                status,
                competition,
                home,
                away,
                home_score,
                away_score,
                utc_date,
            })
        })
        .collect()
}

fn parse_team_ref(v: &serde_json::Value) -> Option<TeamRef> {
    Some(TeamRef {
        id: v["id"].as_u64()?,
        name: v["name"].as_str()?.to_string(),
    })
}

fn parse_teams(raw: &serde_json::Value, competition: &str) -> Vec<TeamInfo> {
    let teams = match raw["teams"].as_array() {
        Some(a) => a,
        None => return vec![],
    };

    teams
        .iter()
        .filter_map(|t| {
            Some(TeamInfo {
                id: t["id"].as_u64()?,
                name: t["name"].as_str()?.to_string(),
                competition: competition.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload() -> serde_json::Value {
        serde_json::json!({
            "matches": [
                {
                    "id": 101,
                    "status": "IN_PLAY",
                    "utcDate": "2025-11-24T20:00:00Z",
                    "competition": {"name": "Premier League"},
                    "homeTeam": {"id": 57, "name": "Arsenal"},
                    "awayTeam": {"id": 61, "name": "Chelsea"},
                    "score": {"fullTime": {"home": 1, "away": 0}}
                },
                {
                    "id": 102,
                    "status": "PAUSED",
                    "utcDate": "2025-11-24T20:00:00Z",
                    "competition": {"name": "Premier League"},
                    "homeTeam": {"id": 64, "name": "Liverpool"},
                    "awayTeam": {"id": 65, "name": "Manchester City"},
                    "score": {"fullTime": {"home": null, "away": null}}
                },
                {
                    // no homeTeam id -> dropped
                    "id": 103,
                    "status": "IN_PLAY",
                    "homeTeam": {"name": "Ghost FC"},
                    "awayTeam": {"id": 66, "name": "Everton"}
                }
            ]
        })
    }

    #[test]
    fn test_parse_matches_with_defaults() {
        let records = parse_matches(&sample_payload());
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].id, 101);
        assert_eq!(records[0].status, MatchStatus::Live);
        assert_eq!(records[0].home.name, "Arsenal");
        assert_eq!((records[0].home_score, records[0].away_score), (1, 0));

        // Missing full-time scores default to 0:0
        assert_eq!(records[1].status, MatchStatus::Paused);
        assert_eq!((records[1].home_score, records[1].away_score), (0, 0));
    }

    #[test]
    fn test_parse_matches_missing_array() {
        let raw = serde_json::json!({"message": "nope"});
        assert!(parse_matches(&raw).is_empty());
    }

    #[test]
    fn test_parse_teams() {
        let raw = serde_json::json!({
            "teams": [
                {"id": 57, "name": "Arsenal"},
                {"id": 61, "name": "Chelsea"},
                {"name": "No Id FC"}
            ]
        });
        let teams = parse_teams(&raw, "PL");
        assert_eq!(teams.len(), 2);
        assert_eq!(teams[0].competition, "PL");
    }

    #[test]
    fn test_status_filter_expands_not_started() {
        let filter = status_filter(&[MatchStatus::NotStarted, MatchStatus::Live]);
        assert_eq!(filter, "SCHEDULED,TIMED,IN_PLAY");
    }

    #[test]
    fn test_new_rejects_bad_base_url() {
        assert!(FootballData::new("token", Some("not a url")).is_err());
    }
}
