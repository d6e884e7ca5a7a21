//! Optional external round suggestions (e.g. a hosted model behind an HTTP endpoint).
//!
//! Whatever comes back is checked with [`validate_suggestions`]; on any error the
//! session handle falls back to the local generator.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

use crate::models::{Gender, MatchHistoryRecord, Player, PlayerId, QueueEntry};

/// History records sent along with a suggestion request.
pub const SUGGESTION_HISTORY_WINDOW: usize = 30;

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum StrategyError {
    #[error("no external suggestion strategy configured")]
    NotConfigured,
    #[error("external suggestion strategy has no API key")]
    MissingCredential,
    #[error("external suggestion strategy timed out after {0:?}")]
    Timeout(Duration),
    #[error("external suggestion request failed: {0}")]
    Request(String),
    #[error("external suggestion response was malformed: {0}")]
    Malformed(String),
}

/// Alternate round generator. Returns at most `round_count` rounds.
#[async_trait]
pub trait SuggestionStrategy: Send + Sync {
    fn strategy_name(&self) -> &'static str;

    async fn suggest(
        &self,
        eligible: &[Player],
        history: &[MatchHistoryRecord],
        round_count: usize,
        queue: &[QueueEntry],
    ) -> Result<Vec<QueueEntry>, StrategyError>;
}

/// Reject anything that isn't up to `round_count` rounds of four distinct eligible players.
pub fn validate_suggestions(
    eligible: &[Player],
    round_count: usize,
    rounds: Vec<QueueEntry>,
) -> Result<Vec<QueueEntry>, StrategyError> {
    if rounds.len() > round_count {
        return Err(StrategyError::Malformed(format!(
            "asked for {} round(s), got {}",
            round_count,
            rounds.len()
        )));
    }
    let known: HashSet<PlayerId> = eligible.iter().map(|p| p.id).collect();
    for (i, round) in rounds.iter().enumerate() {
        if !round.is_complete() || !round.has_unique_players() {
            return Err(StrategyError::Malformed(format!(
                "round {} does not have four distinct players",
                i + 1
            )));
        }
        if let Some(unknown) = round.player_ids().find(|id| !known.contains(id)) {
            return Err(StrategyError::Malformed(format!(
                "round {} names unknown or unavailable player {}",
                i + 1,
                unknown
            )));
        }
    }
    Ok(rounds)
}

#[derive(Serialize)]
struct PlayerView<'a> {
    id: PlayerId,
    name: &'a str,
    gender: Gender,
    level: u8,
    games_played: u32,
    target_games: u32,
}

#[derive(Serialize)]
struct SuggestionRequest<'a> {
    players: Vec<PlayerView<'a>>,
    history: &'a [MatchHistoryRecord],
    rounds: usize,
    queue: &'a [QueueEntry],
}

#[derive(Deserialize)]
struct SuggestionResponse {
    #[serde(rename = "suggestedRounds")]
    suggested_rounds: Vec<Vec<String>>,
}

/// Posts the roster and recent history as JSON and expects
/// `{"suggestedRounds": [["id", "id", "id", "id"], ...]}` back.
pub struct HttpSuggestionStrategy {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpSuggestionStrategy {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }
}

fn parse_round(ids: &[String]) -> Result<QueueEntry, StrategyError> {
    let parsed: Vec<PlayerId> = ids
        .iter()
        .map(|s| {
            s.parse::<PlayerId>()
                .map_err(|e| StrategyError::Malformed(format!("bad player id {:?}: {}", s, e)))
        })
        .collect::<Result<_, _>>()?;
    let slots: [PlayerId; 4] = parsed.try_into().map_err(|v: Vec<PlayerId>| {
        StrategyError::Malformed(format!("round has {} players, expected 4", v.len()))
    })?;
    Ok(QueueEntry::new(slots))
}

#[async_trait]
impl SuggestionStrategy for HttpSuggestionStrategy {
    fn strategy_name(&self) -> &'static str {
        "HttpSuggestionStrategy"
    }

    async fn suggest(
        &self,
        eligible: &[Player],
        history: &[MatchHistoryRecord],
        round_count: usize,
        queue: &[QueueEntry],
    ) -> Result<Vec<QueueEntry>, StrategyError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(StrategyError::MissingCredential)?;
        let body = SuggestionRequest {
            players: eligible
                .iter()
                .map(|p| PlayerView {
                    id: p.id,
                    name: &p.name,
                    gender: p.gender,
                    level: p.level,
                    games_played: p.games_played,
                    target_games: p.target_games,
                })
                .collect(),
            history: &history[history.len().saturating_sub(SUGGESTION_HISTORY_WINDOW)..],
            rounds: round_count,
            queue,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| StrategyError::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(StrategyError::Request(format!(
                "endpoint answered {}",
                response.status()
            )));
        }
        let text = response
            .text()
            .await
            .map_err(|e| StrategyError::Request(e.to_string()))?;
        let parsed: SuggestionResponse =
            serde_json::from_str(&text).map_err(|e| StrategyError::Malformed(e.to_string()))?;

        parsed
            .suggested_rounds
            .iter()
            .map(|ids| parse_round(ids))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_rejects_wrong_sizes_and_bad_ids() {
        let ids: Vec<String> = (0..3).map(|_| uuid::Uuid::new_v4().to_string()).collect();
        assert!(matches!(parse_round(&ids), Err(StrategyError::Malformed(_))));
        let bad = vec!["nope".to_string(); 4];
        assert!(matches!(parse_round(&bad), Err(StrategyError::Malformed(_))));
    }

    #[tokio::test]
    async fn missing_key_is_reported_before_any_request() {
        let strategy = HttpSuggestionStrategy::new("http://127.0.0.1:9/never", Some("  ".into()));
        let err = strategy.suggest(&[], &[], 1, &[]).await.unwrap_err();
        assert_eq!(err, StrategyError::MissingCredential);
    }
}
