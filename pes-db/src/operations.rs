//! Stored operations driven by the scan pipeline.
//!
//! Every function takes a plain `&Connection`; the pipeline serialises
//! access through one shared mutex, so no statement here needs its own
//! locking. Critical sections stay short: read, decide, write.

use pes_core::CatalogueEntry;
use rusqlite::{Connection, params};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OperationError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Entity not found: {entity_type} with id '{id}'")]
    NotFound { entity_type: String, id: i64 },
}

// ── Console Operations ──────────────────────────────────────────────────────

/// A console row as persisted, carrying the id the store assigned and the
/// cached catalogue platform name from earlier runs.
#[derive(Debug, Clone)]
pub struct ConsoleRecord {
    pub id: i64,
    pub gamesdb_name: Option<String>,
}

/// Insert or update a console keyed by its unique name.
///
/// The cached `gamesdb_name` is preserved across upserts; it only changes
/// through [`set_console_gamesdb_name`].
pub fn upsert_console(
    conn: &Connection,
    name: &str,
    gamesdb_id: Option<i64>,
    achievement_id: Option<i64>,
) -> Result<ConsoleRecord, OperationError> {
    conn.execute(
        "INSERT INTO console (name, gamesdb_id, achievement_id)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(name) DO UPDATE SET
             gamesdb_id = excluded.gamesdb_id,
             achievement_id = excluded.achievement_id",
        params![name, gamesdb_id, achievement_id],
    )?;

    let record = conn.query_row(
        "SELECT id, gamesdb_name FROM console WHERE name = ?1",
        params![name],
        |row| {
            Ok(ConsoleRecord {
                id: row.get(0)?,
                gamesdb_name: row.get(1)?,
            })
        },
    )?;
    Ok(record)
}

/// Persist the lazily resolved catalogue platform name for a console.
pub fn set_console_gamesdb_name(
    conn: &Connection,
    console_id: i64,
    gamesdb_name: &str,
) -> Result<(), OperationError> {
    let changed = conn.execute(
        "UPDATE console SET gamesdb_name = ?2 WHERE id = ?1",
        params![console_id, gamesdb_name],
    )?;
    if changed == 0 {
        return Err(OperationError::NotFound {
            entity_type: "console".to_string(),
            id: console_id,
        });
    }
    Ok(())
}

// ── Title Operations ────────────────────────────────────────────────────────

/// Insert or refresh a candidate title keyed by `(console_id, api_id)`.
/// Returns the title row id.
pub fn upsert_title(
    conn: &Connection,
    console_id: i64,
    api_id: i64,
    title: &str,
) -> Result<i64, OperationError> {
    conn.execute(
        "INSERT INTO game_title (console_id, api_id, title)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(console_id, api_id) DO UPDATE SET
             title = excluded.title",
        params![console_id, api_id, title],
    )?;

    let id = conn.query_row(
        "SELECT id FROM game_title WHERE console_id = ?1 AND api_id = ?2",
        params![console_id, api_id],
        |row| row.get(0),
    )?;
    Ok(id)
}

// ── Game Operations ─────────────────────────────────────────────────────────

/// A full game row.
#[derive(Debug, Clone)]
pub struct GameRow {
    pub id: i64,
    pub console_id: i64,
    pub name: String,
    pub rom_path: String,
    pub api_id: Option<i64>,
    pub match_id: Option<i64>,
    pub cover_art_path: Option<String>,
    pub overview: String,
    /// Unix epoch seconds; -1 = unknown.
    pub release_date: i64,
    pub added: i64,
    pub last_played: i64,
    pub play_count: i64,
    pub size: i64,
    pub favourite: bool,
    pub rasum: Option<String>,
    pub achievement_game_id: Option<i64>,
    pub exists: bool,
}

pub(crate) const GAME_COLUMNS: &str = "id, console_id, name, rom_path, api_id, match_id, \
     cover_art_path, overview, release_date, added, last_played, play_count, size, \
     favourite, rasum, achievement_game_id, exists_flag";

pub(crate) fn row_to_game(row: &rusqlite::Row<'_>) -> rusqlite::Result<GameRow> {
    Ok(GameRow {
        id: row.get(0)?,
        console_id: row.get(1)?,
        name: row.get(2)?,
        rom_path: row.get(3)?,
        api_id: row.get(4)?,
        match_id: row.get(5)?,
        cover_art_path: row.get(6)?,
        overview: row.get(7)?,
        release_date: row.get(8)?,
        added: row.get(9)?,
        last_played: row.get(10)?,
        play_count: row.get(11)?,
        size: row.get(12)?,
        favourite: row.get(13)?,
        rasum: row.get(14)?,
        achievement_game_id: row.get(15)?,
        exists: row.get(16)?,
    })
}

/// Fields for a freshly scanned game.
#[derive(Debug, Clone)]
pub struct NewGame<'a> {
    pub console_id: i64,
    pub name: &'a str,
    pub rom_path: &'a str,
    pub api_id: Option<i64>,
    pub cover_art_path: Option<&'a str>,
    pub overview: &'a str,
    pub release_date: i64,
    /// First-seen timestamp (Unix epoch seconds).
    pub added: i64,
    pub size: i64,
    pub rasum: Option<&'a str>,
    pub achievement_game_id: Option<i64>,
}

/// Metadata improvements for an existing game row.
///
/// Deliberately excludes `added`, `size`, `last_played` and `play_count`:
/// first-seen and play-history fields are never rewritten by a scan.
#[derive(Debug, Clone)]
pub struct GameUpdate<'a> {
    pub name: &'a str,
    pub api_id: Option<i64>,
    pub cover_art_path: Option<&'a str>,
    pub overview: &'a str,
    pub release_date: i64,
    pub rasum: Option<&'a str>,
    pub achievement_game_id: Option<i64>,
}

/// Look up a game by its ROM path within a console.
pub fn find_game_by_path(
    conn: &Connection,
    console_id: i64,
    rom_path: &str,
) -> Result<Option<GameRow>, OperationError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {GAME_COLUMNS} FROM game WHERE console_id = ?1 AND rom_path = ?2"
    ))?;
    let result = stmt.query_row(params![console_id, rom_path], row_to_game);
    match result {
        Ok(row) => Ok(Some(row)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Insert a game row, returning its id.
///
/// If another row already holds `(console_id, rom_path)` the insert is
/// retried as a metadata update of that row and the existing id is
/// returned.
pub fn insert_game(conn: &Connection, game: &NewGame<'_>) -> Result<i64, OperationError> {
    let inserted = conn.execute(
        "INSERT INTO game (console_id, name, rom_path, api_id, cover_art_path, overview,
                           release_date, added, size, rasum, achievement_game_id, exists_flag)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 1)",
        params![
            game.console_id,
            game.name,
            game.rom_path,
            game.api_id,
            game.cover_art_path,
            game.overview,
            game.release_date,
            game.added,
            game.size,
            game.rasum,
            game.achievement_game_id,
        ],
    );

    match inserted {
        Ok(_) => Ok(conn.last_insert_rowid()),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            let existing = find_game_by_path(conn, game.console_id, game.rom_path)?.ok_or(
                OperationError::NotFound {
                    entity_type: "game".to_string(),
                    id: game.console_id,
                },
            )?;
            update_game(
                conn,
                existing.id,
                &GameUpdate {
                    name: game.name,
                    api_id: game.api_id,
                    cover_art_path: game.cover_art_path,
                    overview: game.overview,
                    release_date: game.release_date,
                    rasum: game.rasum,
                    achievement_game_id: game.achievement_game_id,
                },
            )?;
            Ok(existing.id)
        }
        Err(e) => Err(e.into()),
    }
}

/// Apply metadata improvements to an existing game row and flag it as
/// present on disk.
pub fn update_game(
    conn: &Connection,
    game_id: i64,
    update: &GameUpdate<'_>,
) -> Result<(), OperationError> {
    let changed = conn.execute(
        "UPDATE game SET
             name = ?2,
             api_id = ?3,
             cover_art_path = ?4,
             overview = ?5,
             release_date = ?6,
             rasum = ?7,
             achievement_game_id = ?8,
             exists_flag = 1
         WHERE id = ?1",
        params![
            game_id,
            update.name,
            update.api_id,
            update.cover_art_path,
            update.overview,
            update.release_date,
            update.rasum,
            update.achievement_game_id,
        ],
    )?;
    if changed == 0 {
        return Err(OperationError::NotFound {
            entity_type: "game".to_string(),
            id: game_id,
        });
    }
    Ok(())
}

// ── Mark-and-Sweep Operations ───────────────────────────────────────────────

/// Flag every game of a console as not seen yet. Run once per console
/// before its tasks are queued.
pub fn mark_all_not_exist(conn: &Connection, console_id: i64) -> Result<(), OperationError> {
    conn.execute(
        "UPDATE game SET exists_flag = 0 WHERE console_id = ?1",
        params![console_id],
    )?;
    Ok(())
}

/// Flag a single game as seen on disk.
pub fn mark_exists(conn: &Connection, game_id: i64) -> Result<(), OperationError> {
    conn.execute(
        "UPDATE game SET exists_flag = 1 WHERE id = ?1",
        params![game_id],
    )?;
    Ok(())
}

/// Delete every game of a console still flagged as unseen, together with
/// its match rows. Returns the number of games removed.
///
/// game and game_match reference each other, so the preferred-match
/// pointer is cleared before either side is deleted.
pub fn delete_not_exist(conn: &Connection, console_id: i64) -> Result<usize, OperationError> {
    conn.execute(
        "UPDATE game SET match_id = NULL WHERE console_id = ?1 AND exists_flag = 0",
        params![console_id],
    )?;
    conn.execute(
        "DELETE FROM game_match WHERE game_id IN
             (SELECT id FROM game WHERE console_id = ?1 AND exists_flag = 0)",
        params![console_id],
    )?;
    let deleted = conn.execute(
        "DELETE FROM game WHERE console_id = ?1 AND exists_flag = 0",
        params![console_id],
    )?;
    Ok(deleted)
}

/// Restore the seen flag on every game of a console. Run instead of
/// [`delete_not_exist`] when a scan was cancelled, so no row disappears.
pub fn rollback_not_exist(conn: &Connection, console_id: i64) -> Result<usize, OperationError> {
    let restored = conn.execute(
        "UPDATE game SET exists_flag = 1 WHERE console_id = ?1 AND exists_flag = 0",
        params![console_id],
    )?;
    Ok(restored)
}

// ── Match Operations ────────────────────────────────────────────────────────

/// Associate a candidate title with a game. Returns the match row id;
/// re-associating an existing pair returns the original row.
pub fn insert_match(
    conn: &Connection,
    game_id: i64,
    title_id: i64,
) -> Result<i64, OperationError> {
    conn.execute(
        "INSERT OR IGNORE INTO game_match (game_id, title_id) VALUES (?1, ?2)",
        params![game_id, title_id],
    )?;
    let id = conn.query_row(
        "SELECT id FROM game_match WHERE game_id = ?1 AND title_id = ?2",
        params![game_id, title_id],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Point a game at its preferred match row.
pub fn set_preferred_match(
    conn: &Connection,
    game_id: i64,
    match_id: i64,
) -> Result<(), OperationError> {
    let changed = conn.execute(
        "UPDATE game SET match_id = ?2 WHERE id = ?1",
        params![game_id, match_id],
    )?;
    if changed == 0 {
        return Err(OperationError::NotFound {
            entity_type: "game".to_string(),
            id: game_id,
        });
    }
    Ok(())
}

// ── Games-Catalogue Operations ──────────────────────────────────────────────

/// Seed the short-name lookup table from the shipped catalogue file.
/// Existing entries are left untouched. Returns the number inserted.
pub fn seed_games_catalogue(
    conn: &Connection,
    entries: &[CatalogueEntry],
) -> Result<usize, OperationError> {
    let mut inserted = 0;
    for entry in entries {
        inserted += conn.execute(
            "INSERT OR IGNORE INTO games_catalogue (short_name, full_name) VALUES (?1, ?2)",
            params![entry.short_name, entry.full_name],
        )?;
    }
    Ok(inserted)
}

/// Preferred human title for a terse filename stem, if the catalogue
/// knows it.
pub fn catalogue_full_name(
    conn: &Connection,
    short_name: &str,
) -> Result<Option<String>, OperationError> {
    let result = conn.query_row(
        "SELECT full_name FROM games_catalogue WHERE short_name = ?1",
        params![short_name],
        |row| row.get(0),
    );
    match result {
        Ok(name) => Ok(Some(name)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
