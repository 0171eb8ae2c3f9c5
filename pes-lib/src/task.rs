//! The per-ROM unit of work.
//!
//! Composes the catalogue client, matcher, image cache, hash engine and
//! store into one task per file. Remote and parse failures degrade the
//! result (the row is still written with whatever local data the task
//! gathered), so a single bad ROM or a dead network never aborts a scan.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use pes_core::Console;
use pes_db::{GameUpdate, NewGame, OperationError};
use pes_scraper::{Candidate, CatalogueProvider, RetroAchievements};
use rusqlite::Connection;

use crate::artwork;
use crate::hasher::{self, RomFamily};
use crate::matcher;
use crate::progress::LastProcessed;

/// Shared services handed to every task by the scheduler.
pub(crate) struct TaskContext {
    pub store: Arc<Mutex<Connection>>,
    pub provider: Option<Arc<dyn CatalogueProvider>>,
    pub achievements: Option<Arc<RetroAchievements>>,
    pub http: reqwest::blocking::Client,
    pub max_cover_width: u32,
}

impl TaskContext {
    /// Short-lived store access. A poisoned mutex means another worker
    /// panicked mid-write; the connection itself is still usable.
    fn store(&self) -> MutexGuard<'_, Connection> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug, Default)]
pub(crate) struct TaskOutcome {
    pub added: bool,
    pub updated: bool,
    pub last: Option<LastProcessed>,
}

pub(crate) struct RomTask {
    pub console: Arc<Console>,
    pub rom_path: PathBuf,
}

impl RomTask {
    pub fn run(&self, ctx: &TaskContext) -> TaskOutcome {
        let Some(file_name) = self.rom_path.file_name().and_then(|n| n.to_str()) else {
            return TaskOutcome::default();
        };
        let stem = self.console.rom_stem(file_name).to_string();
        if self.console.is_ignored(&stem) {
            return TaskOutcome::default();
        }

        let rom_path = self.rom_path.to_string_lossy().to_string();
        let console_id = self.console.id();

        // Preferred query title from the shipped games catalogue.
        let query = {
            let conn = ctx.store();
            pes_db::catalogue_full_name(&conn, &stem).unwrap_or_else(|e| {
                log::warn!("games catalogue lookup for '{stem}' failed: {e}");
                None
            })
        }
        .unwrap_or_else(|| stem.clone());

        // Fast path: an already-enriched row whose cover still exists on
        // disk needs nothing but its exists flag.
        {
            let conn = ctx.store();
            match pes_db::find_game_by_path(&conn, console_id, &rom_path) {
                Ok(Some(row)) if row.api_id.is_some() => {
                    if let Some(cover) = row.cover_art_path.as_deref() {
                        if Path::new(cover).is_file() {
                            if let Err(e) = pes_db::mark_exists(&conn, row.id) {
                                log::warn!("could not flag {} as seen: {e}", row.name);
                            }
                            return TaskOutcome {
                                added: false,
                                updated: false,
                                last: Some(LastProcessed {
                                    name: row.name,
                                    cover_path: Some(PathBuf::from(cover)),
                                }),
                            };
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => log::warn!("store read for {file_name} failed: {e}"),
            }
        }

        // User-supplied art wins over anything remote.
        let safe_stem = stem.replace('/', "_");
        let mut cover = artwork::resolve_existing(
            self.console.cover_art_dir(),
            &[stem.clone(), safe_stem.clone()],
        );
        if let Some(path) = cover.take() {
            match artwork::normalise(&path, ctx.max_cover_width) {
                Ok(normalised) => cover = Some(normalised),
                Err(e) => log::warn!("cover art {} unusable: {e}", path.display()),
            }
        }

        // Remote candidates. The platform name was resolved and cached by
        // the scheduler; without it (or a catalogue key) enrichment is off.
        let mut candidates: Vec<Candidate> = Vec::new();
        if self.console.gamesdb_id().is_some() {
            if let (Some(provider), Some(platform)) =
                (&ctx.provider, self.console.gamesdb_name())
            {
                match provider.search(platform, &query) {
                    Ok(found) => candidates = found,
                    Err(e) => log::warn!("catalogue search for '{query}' failed: {e}"),
                }
            }
        }
        let chosen = matcher::best_match(&query, &candidates).map(|idx| candidates[idx].clone());

        if cover.is_none() {
            if let Some(game) = &chosen {
                cover = self.fetch_cover(ctx, game, &safe_stem);
            }
        }

        // Content hash and achievement id, for consoles that opt in.
        let mut rasum: Option<String> = None;
        let mut achievement_game_id: Option<i64> = None;
        if self.console.achievement_id().is_some() {
            match hasher::rasum(&self.rom_path, RomFamily::for_console(self.console.name())) {
                Ok(digest) => {
                    if let Some(ra) = &ctx.achievements {
                        match ra.lookup_game_id(&digest) {
                            Ok(id) => achievement_game_id = id,
                            Err(e) => {
                                log::warn!("achievement lookup for {file_name} failed: {e}")
                            }
                        }
                    }
                    rasum = Some(digest);
                }
                Err(e) => log::warn!("rasum for {file_name} failed: {e}"),
            }
        }

        let size = std::fs::metadata(&self.rom_path)
            .map(|m| m.len() as i64)
            .unwrap_or(0);
        let cover_str = cover.as_ref().map(|p| p.to_string_lossy().to_string());

        let (game_id, name, added, updated) = match self.persist(
            ctx,
            &rom_path,
            &stem,
            chosen.as_ref(),
            cover_str.as_deref(),
            rasum.as_deref(),
            achievement_game_id,
            size,
        ) {
            Ok(result) => result,
            Err(e) => {
                log::warn!("store write for {file_name} failed: {e}");
                return TaskOutcome::default();
            }
        };

        if !candidates.is_empty() {
            let chosen_id = chosen.as_ref().map(|c| c.remote_id);
            if let Err(e) = self.record_candidates(ctx, game_id, &candidates, chosen_id) {
                log::warn!("recording candidate titles for {file_name} failed: {e}");
            }
        }

        TaskOutcome {
            added,
            updated,
            last: Some(LastProcessed {
                name,
                cover_path: cover,
            }),
        }
    }

    /// Try each cover URL in preference order until one downloads,
    /// verifies and normalises.
    fn fetch_cover(&self, ctx: &TaskContext, game: &Candidate, safe_stem: &str) -> Option<PathBuf> {
        for url in &game.cover_urls {
            let dest = self
                .console
                .cover_art_dir()
                .join(format!("{safe_stem}.{}", extension_from_url(url)));
            match artwork::download_and_store(&ctx.http, url, &dest) {
                Ok(()) => match artwork::normalise(&dest, ctx.max_cover_width) {
                    Ok(path) => return Some(path),
                    Err(e) => {
                        log::warn!("downloaded cover {url} failed normalisation: {e}");
                        let _ = std::fs::remove_file(&dest);
                    }
                },
                Err(e) => log::warn!("cover download {url} failed: {e}"),
            }
        }
        None
    }

    /// Upsert the game row under one lock acquisition: read, decide,
    /// write. Returns `(game_id, display name, added, updated)`.
    #[allow(clippy::too_many_arguments)]
    fn persist(
        &self,
        ctx: &TaskContext,
        rom_path: &str,
        stem: &str,
        chosen: Option<&Candidate>,
        cover: Option<&str>,
        rasum: Option<&str>,
        achievement_game_id: Option<i64>,
        size: i64,
    ) -> Result<(i64, String, bool, bool), OperationError> {
        let conn = ctx.store();

        match pes_db::find_game_by_path(&conn, self.console.id(), rom_path)? {
            None => {
                let name = chosen.map(|c| c.title.as_str()).unwrap_or(stem);
                let id = pes_db::insert_game(
                    &conn,
                    &NewGame {
                        console_id: self.console.id(),
                        name,
                        rom_path,
                        api_id: chosen.map(|c| c.remote_id),
                        cover_art_path: cover,
                        overview: chosen.map(|c| c.overview.as_str()).unwrap_or(""),
                        release_date: chosen.map(|c| c.release_date).unwrap_or(-1),
                        added: chrono::Utc::now().timestamp(),
                        size,
                        rasum,
                        achievement_game_id,
                    },
                )?;
                Ok((id, name.to_string(), true, false))
            }
            Some(row) => {
                // Merge improvements only; a degraded run must not wipe
                // metadata an earlier run resolved.
                let name = chosen
                    .map(|c| c.title.clone())
                    .unwrap_or_else(|| row.name.clone());
                let api_id = chosen.map(|c| c.remote_id).or(row.api_id);
                let cover = cover
                    .map(str::to_string)
                    .or_else(|| row.cover_art_path.clone());
                let overview = chosen
                    .filter(|c| !c.overview.is_empty())
                    .map(|c| c.overview.clone())
                    .unwrap_or_else(|| row.overview.clone());
                let release_date = chosen
                    .map(|c| c.release_date)
                    .filter(|d| *d != -1)
                    .unwrap_or(row.release_date);
                let rasum = rasum.map(str::to_string).or_else(|| row.rasum.clone());
                let achievement_game_id = achievement_game_id.or(row.achievement_game_id);

                let changed = name != row.name
                    || api_id != row.api_id
                    || cover != row.cover_art_path
                    || overview != row.overview
                    || release_date != row.release_date
                    || rasum != row.rasum
                    || achievement_game_id != row.achievement_game_id;

                if changed {
                    pes_db::update_game(
                        &conn,
                        row.id,
                        &GameUpdate {
                            name: &name,
                            api_id,
                            cover_art_path: cover.as_deref(),
                            overview: &overview,
                            release_date,
                            rasum: rasum.as_deref(),
                            achievement_game_id,
                        },
                    )?;
                } else {
                    pes_db::mark_exists(&conn, row.id)?;
                }
                Ok((row.id, name, false, changed))
            }
        }
    }

    /// Record every candidate title and its association with this game;
    /// point the game at the chosen one. One lock acquisition.
    fn record_candidates(
        &self,
        ctx: &TaskContext,
        game_id: i64,
        candidates: &[Candidate],
        chosen_remote_id: Option<i64>,
    ) -> Result<(), OperationError> {
        let conn = ctx.store();
        for candidate in candidates {
            let title_id = pes_db::upsert_title(
                &conn,
                self.console.id(),
                candidate.remote_id,
                &candidate.title,
            )?;
            let match_id = pes_db::insert_match(&conn, game_id, title_id)?;
            if chosen_remote_id == Some(candidate.remote_id) {
                pes_db::set_preferred_match(&conn, game_id, match_id)?;
            }
        }
        Ok(())
    }
}

/// File extension for a cover URL; unknown or missing extensions land on
/// jpg and are repaired by normalisation anyway.
fn extension_from_url(url: &str) -> String {
    let tail = url.rsplit('/').next().unwrap_or(url);
    if let Some((_, ext)) = tail.rsplit_once('.') {
        let ext = ext.to_lowercase();
        if matches!(ext.as_str(), "jpg" | "jpeg" | "png" | "gif") {
            return ext;
        }
    }
    "jpg".to_string()
}
