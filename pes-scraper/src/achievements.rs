//! RetroAchievements game-id resolution.
//!
//! Maps a ROM's content fingerprint (rasum) to the achievement service's
//! game id via the public `dorequest.php` endpoint.

use serde::Deserialize;

use crate::error::ScrapeError;
use crate::{REQUEST_TIMEOUT, USER_AGENT};

const DEFAULT_BASE_URL: &str = "https://retroachievements.org";

pub struct RetroAchievements {
    http: reqwest::blocking::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct GameIdResponse {
    #[serde(rename = "Success")]
    success: bool,
    #[serde(rename = "GameID", default)]
    game_id: i64,
}

impl RetroAchievements {
    pub fn new() -> Result<Self, ScrapeError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Point the client at a different endpoint (used by tests).
    pub fn with_base_url(base_url: &str) -> Result<Self, ScrapeError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Resolve a rasum digest to the achievement game id, or `None` when
    /// the service doesn't know the hash.
    pub fn lookup_game_id(&self, rasum: &str) -> Result<Option<i64>, ScrapeError> {
        let resp = self
            .http
            .get(format!("{}/dorequest.php", self.base_url))
            .query(&[("r", "gameid"), ("m", rasum)])
            .send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                status: status.as_u16(),
            });
        }
        let body = resp.text()?;
        parse_game_id(&body)
    }
}

fn parse_game_id(body: &str) -> Result<Option<i64>, ScrapeError> {
    let payload: GameIdResponse = serde_json::from_str(body)?;
    if !payload.success {
        return Err(ScrapeError::payload("gameid request rejected"));
    }
    Ok(if payload.game_id > 0 {
        Some(payload.game_id)
    } else {
        None
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_hash_resolves() {
        let id = parse_game_id(r#"{"Success":true,"GameID":1446}"#).unwrap();
        assert_eq!(id, Some(1446));
    }

    #[test]
    fn unknown_hash_is_none() {
        let id = parse_game_id(r#"{"Success":true,"GameID":0}"#).unwrap();
        assert_eq!(id, None);
    }

    #[test]
    fn rejected_request_is_a_payload_error() {
        let err = parse_game_id(r#"{"Success":false}"#).unwrap_err();
        assert!(matches!(err, ScrapeError::Payload(_)));
    }

    #[test]
    fn garbage_is_a_json_error() {
        let err = parse_game_id("<html>nope</html>").unwrap_err();
        assert!(matches!(err, ScrapeError::Json(_)));
    }
}
