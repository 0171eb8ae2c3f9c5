//! TheGamesDB catalogue provider.
//!
//! Talks to the legacy XML API: `GetGamesList.php` for candidate search,
//! `GetGame.php` for per-game detail (overview, release date, box art) and
//! `GetPlatform.php` for platform-name resolution. Parsing is split from
//! transport so the XML handling is testable from string fixtures.

use std::io::BufRead;

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::ScrapeError;
use crate::provider::{Candidate, CatalogueProvider};
use crate::{REQUEST_TIMEOUT, USER_AGENT};

const DEFAULT_BASE_URL: &str = "http://thegamesdb.net/api";

/// Candidates returned per search, in the catalogue's native order.
const MAX_CANDIDATES: usize = 5;

pub struct TheGamesDb {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl TheGamesDb {
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

    fn fetch(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<String, ScrapeError> {
        let resp = self
            .http
            .get(format!("{}/{endpoint}", self.base_url))
            .query(query)
            .send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                status: status.as_u16(),
            });
        }
        Ok(resp.text()?)
    }
}

impl CatalogueProvider for TheGamesDb {
    fn search(&self, platform: &str, query: &str) -> Result<Vec<Candidate>, ScrapeError> {
        let list = self.fetch("GetGamesList.php", &[("platform", platform), ("name", query)])?;
        let summaries = parse_games_list(list.as_bytes(), MAX_CANDIDATES)?;
        log::debug!(
            "GetGamesList '{}' on '{}': {} candidates",
            query,
            platform,
            summaries.len()
        );

        let mut candidates = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let id = summary.id.to_string();
            let detail_xml = self.fetch("GetGame.php", &[("id", &id)])?;
            let detail = parse_game_detail(detail_xml.as_bytes())?;
            candidates.push(Candidate {
                remote_id: summary.id,
                title: summary.title,
                overview: detail.overview,
                release_date: if detail.release_date != -1 {
                    detail.release_date
                } else {
                    summary.release_date
                },
                cover_urls: detail.cover_urls,
            });
        }
        Ok(candidates)
    }

    fn resolve_platform_name(&self, platform_key: i64) -> Result<String, ScrapeError> {
        let id = platform_key.to_string();
        let xml = self.fetch("GetPlatform.php", &[("id", &id)])?;
        parse_platform_name(xml.as_bytes())
    }
}

// ---------------------------------------------------------------------------
// XML payload parsing
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct GameSummary {
    id: i64,
    title: String,
    release_date: i64,
}

#[derive(Debug, Default)]
struct GameDetail {
    overview: String,
    release_date: i64,
    cover_urls: Vec<String>,
}

/// Parse a `GetGamesList.php` payload into at most `cap` summaries,
/// preserving the catalogue's order.
fn parse_games_list<R: BufRead>(reader: R, cap: usize) -> Result<Vec<GameSummary>, ScrapeError> {
    let mut xml = Reader::from_reader(reader);
    xml.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut games = Vec::new();

    let mut in_game = false;
    let mut current_tag = String::new();
    let mut id: Option<i64> = None;
    let mut title = String::new();
    let mut release_date: i64 = -1;

    loop {
        match xml.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                let tag_name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if tag_name == "Game" {
                    in_game = true;
                    id = None;
                    title.clear();
                    release_date = -1;
                } else {
                    current_tag = tag_name;
                }
            }
            Event::Text(ref e) => {
                if in_game {
                    let text = e.unescape()?.to_string();
                    match current_tag.as_str() {
                        "id" => {
                            id = Some(text.parse().map_err(|_| {
                                ScrapeError::payload(format!("invalid game id: {text}"))
                            })?);
                        }
                        "GameTitle" => title = text,
                        "ReleaseDate" => release_date = parse_release_date(&text),
                        _ => {}
                    }
                }
            }
            Event::End(ref e) => {
                let tag_name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if tag_name == "Game" {
                    in_game = false;
                    if games.len() < cap {
                        if let Some(id) = id.take() {
                            if !title.is_empty() {
                                games.push(GameSummary {
                                    id,
                                    title: std::mem::take(&mut title),
                                    release_date,
                                });
                            }
                        }
                    }
                } else {
                    current_tag.clear();
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(games)
}

/// Parse a `GetGame.php` payload: overview, release date, and box-art
/// URLs (front before back, joined onto `baseImgUrl`).
fn parse_game_detail<R: BufRead>(reader: R) -> Result<GameDetail, ScrapeError> {
    let mut xml = Reader::from_reader(reader);
    xml.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut detail = GameDetail {
        release_date: -1,
        ..GameDetail::default()
    };

    let mut current_tag = String::new();
    let mut base_img_url = String::new();
    let mut boxart_side: Option<String> = None;
    let mut fronts: Vec<String> = Vec::new();
    let mut backs: Vec<String> = Vec::new();

    loop {
        match xml.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                let tag_name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if tag_name == "boxart" {
                    boxart_side = None;
                    for attr in e.attributes() {
                        let attr = attr?;
                        if attr.key.as_ref() == b"side" {
                            boxart_side = Some(String::from_utf8_lossy(&attr.value).to_string());
                        }
                    }
                }
                current_tag = tag_name;
            }
            Event::Text(ref e) => {
                let text = e.unescape()?.to_string();
                match current_tag.as_str() {
                    "baseImgUrl" => base_img_url = text,
                    "Overview" => detail.overview = text,
                    "ReleaseDate" => detail.release_date = parse_release_date(&text),
                    "boxart" => match boxart_side.as_deref() {
                        Some("front") => fronts.push(text),
                        Some("back") => backs.push(text),
                        _ => {}
                    },
                    _ => {}
                }
            }
            Event::End(ref e) => {
                if e.name().as_ref() == b"boxart" {
                    boxart_side = None;
                }
                current_tag.clear();
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    detail.cover_urls = fronts
        .into_iter()
        .chain(backs)
        .map(|path| join_image_url(&base_img_url, &path))
        .collect();

    Ok(detail)
}

/// Parse a `GetPlatform.php` payload into the platform's display name.
/// The name lives in a nested `<Platform>` element inside the outer one.
fn parse_platform_name<R: BufRead>(reader: R) -> Result<String, ScrapeError> {
    let mut xml = Reader::from_reader(reader);
    xml.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut platform_depth = 0u32;
    let mut current_tag = String::new();
    let mut name: Option<String> = None;

    loop {
        match xml.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                let tag_name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if tag_name == "Platform" {
                    platform_depth += 1;
                }
                current_tag = tag_name;
            }
            Event::Text(ref e) => {
                if current_tag == "Platform" && platform_depth == 2 && name.is_none() {
                    name = Some(e.unescape()?.to_string());
                }
            }
            Event::End(ref e) => {
                if e.name().as_ref() == b"Platform" {
                    platform_depth = platform_depth.saturating_sub(1);
                }
                current_tag.clear();
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    name.filter(|n| !n.is_empty())
        .ok_or_else(|| ScrapeError::payload("platform payload carried no name"))
}

/// Catalogue dates arrive as `MM/DD/YYYY` or a bare year. Unix epoch
/// seconds out; -1 when the value is absent or unparseable.
fn parse_release_date(raw: &str) -> i64 {
    let raw = raw.trim();
    if raw.is_empty() {
        return -1;
    }

    let date = chrono::NaiveDate::parse_from_str(raw, "%m/%d/%Y")
        .ok()
        .or_else(|| {
            raw.parse::<i32>()
                .ok()
                .and_then(|year| chrono::NaiveDate::from_ymd_opt(year, 1, 1))
        });

    date.and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or(-1)
}

fn join_image_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAMES_LIST: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<Data>
  <Game>
    <id>7</id>
    <GameTitle>Sonic The Hedgehog</GameTitle>
    <ReleaseDate>06/23/1991</ReleaseDate>
    <Platform>Sega Mega Drive</Platform>
  </Game>
  <Game>
    <id>11</id>
    <GameTitle>Sonic the Hedgehog 2</GameTitle>
    <Platform>Sega Mega Drive</Platform>
  </Game>
</Data>"#;

    #[test]
    fn games_list_preserves_catalogue_order() {
        let games = parse_games_list(GAMES_LIST.as_bytes(), 5).unwrap();
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].id, 7);
        assert_eq!(games[0].title, "Sonic The Hedgehog");
        assert_eq!(games[1].id, 11);
        // Missing release date stays unknown.
        assert_eq!(games[1].release_date, -1);
    }

    #[test]
    fn games_list_caps_candidates() {
        let mut xml = String::from("<Data>");
        for i in 0..10 {
            xml.push_str(&format!(
                "<Game><id>{i}</id><GameTitle>Game {i}</GameTitle></Game>"
            ));
        }
        xml.push_str("</Data>");

        let games = parse_games_list(xml.as_bytes(), 5).unwrap();
        assert_eq!(games.len(), 5);
        assert_eq!(games[4].id, 4);
    }

    #[test]
    fn games_list_rejects_bad_id() {
        let xml = "<Data><Game><id>seven</id><GameTitle>x</GameTitle></Game></Data>";
        let err = parse_games_list(xml.as_bytes(), 5).unwrap_err();
        assert!(matches!(err, ScrapeError::Payload(_)));
    }

    const GAME_DETAIL: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<Data>
  <baseImgUrl>http://thegamesdb.net/banners/</baseImgUrl>
  <Game>
    <id>7</id>
    <GameTitle>Sonic The Hedgehog</GameTitle>
    <ReleaseDate>06/23/1991</ReleaseDate>
    <Overview>Blue blur versus mad scientist.</Overview>
    <Images>
      <boxart side="back" width="1530" height="2100">boxart/original/back/7-1.jpg</boxart>
      <boxart side="front" width="1529" height="2100">boxart/original/front/7-1.jpg</boxart>
    </Images>
  </Game>
</Data>"#;

    #[test]
    fn game_detail_prefers_front_boxart() {
        let detail = parse_game_detail(GAME_DETAIL.as_bytes()).unwrap();
        assert_eq!(detail.overview, "Blue blur versus mad scientist.");
        assert_eq!(
            detail.cover_urls,
            vec![
                "http://thegamesdb.net/banners/boxart/original/front/7-1.jpg".to_string(),
                "http://thegamesdb.net/banners/boxart/original/back/7-1.jpg".to_string(),
            ]
        );
        // 1991-06-23 00:00:00 UTC
        assert_eq!(detail.release_date, 677_635_200);
    }

    #[test]
    fn game_detail_without_images_has_no_cover_urls() {
        let xml = "<Data><Game><id>1</id><GameTitle>x</GameTitle></Game></Data>";
        let detail = parse_game_detail(xml.as_bytes()).unwrap();
        assert!(detail.cover_urls.is_empty());
        assert_eq!(detail.release_date, -1);
        assert_eq!(detail.overview, "");
    }

    const PLATFORM: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<Data>
  <baseImgUrl>http://thegamesdb.net/banners/</baseImgUrl>
  <Platform>
    <id>36</id>
    <Platform>Sega Mega Drive</Platform>
    <console>Mega Drive</console>
  </Platform>
</Data>"#;

    #[test]
    fn platform_name_comes_from_nested_element() {
        let name = parse_platform_name(PLATFORM.as_bytes()).unwrap();
        assert_eq!(name, "Sega Mega Drive");
    }

    #[test]
    fn platform_payload_without_name_is_an_error() {
        let err = parse_platform_name("<Data><Platform><id>3</id></Platform></Data>".as_bytes())
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Payload(_)));
    }

    #[test]
    fn release_dates_parse_or_degrade() {
        assert_eq!(parse_release_date("06/23/1991"), 677_635_200);
        assert_eq!(parse_release_date("1991"), 662_688_000);
        assert_eq!(parse_release_date(""), -1);
        assert_eq!(parse_release_date("soon"), -1);
    }
}
