//! SQLite schema creation and migration.

use rusqlite::Connection;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: expected version {expected}, found {found}")]
    VersionMismatch { expected: i32, found: i32 },
}

/// Current schema version. Increment when adding migrations.
pub const CURRENT_VERSION: i32 = 1;

/// Create all tables and indexes if they don't exist.
///
/// Idempotent; safe to call on an existing database.
pub fn create_schema(conn: &Connection) -> Result<(), SchemaError> {
    conn.execute_batch(SCHEMA_SQL)?;
    set_schema_version(conn, CURRENT_VERSION)?;
    Ok(())
}

/// Open or create the game database at the given path.
pub fn open_database(path: &std::path::Path) -> Result<Connection, SchemaError> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

    let version = get_schema_version(&conn)?;
    if version == 0 {
        create_schema(&conn)?;
    } else if version < CURRENT_VERSION {
        migrate(&conn, version)?;
    }

    Ok(conn)
}

/// Open an in-memory database with the full schema. Useful for testing.
pub fn open_memory() -> Result<Connection, SchemaError> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    create_schema(&conn)?;
    Ok(conn)
}

/// Get the current schema version, or 0 if no schema exists.
fn get_schema_version(conn: &Connection) -> Result<i32, SchemaError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Record a schema version.
fn set_schema_version(conn: &Connection, version: i32) -> Result<(), SchemaError> {
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Run migrations from `from_version` up to `CURRENT_VERSION`.
fn migrate(conn: &Connection, from_version: i32) -> Result<(), SchemaError> {
    if from_version > CURRENT_VERSION {
        return Err(SchemaError::VersionMismatch {
            expected: CURRENT_VERSION,
            found: from_version,
        });
    }

    let mut version = from_version;
    while version < CURRENT_VERSION {
        // No migrations yet; version 1 is the initial schema.
        version += 1;
        set_schema_version(conn, version)?;
    }

    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Consoles, upserted from the consoles file at startup.
-- gamesdb_name caches the catalogue's platform name once resolved.
CREATE TABLE IF NOT EXISTS console (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    gamesdb_id INTEGER,
    gamesdb_name TEXT,
    achievement_id INTEGER
);

-- One row per ROM file seen on disk. exists_flag is the mark-and-sweep
-- marker: false only mid-scan, rows still false at the end of a completed
-- scan are deleted.
CREATE TABLE IF NOT EXISTS game (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    console_id INTEGER NOT NULL REFERENCES console(id),
    name TEXT NOT NULL,
    rom_path TEXT NOT NULL,
    api_id INTEGER,
    match_id INTEGER REFERENCES game_match(id),
    cover_art_path TEXT,
    overview TEXT NOT NULL DEFAULT '',
    release_date INTEGER NOT NULL DEFAULT -1,
    added INTEGER NOT NULL,
    last_played INTEGER NOT NULL DEFAULT -1,
    play_count INTEGER NOT NULL DEFAULT 0,
    size INTEGER NOT NULL DEFAULT 0,
    favourite INTEGER NOT NULL DEFAULT 0,
    rasum TEXT,
    achievement_game_id INTEGER,
    exists_flag INTEGER NOT NULL DEFAULT 1,
    UNIQUE (console_id, rom_path)
);
CREATE INDEX IF NOT EXISTS idx_game_rom_path ON game(rom_path);
CREATE INDEX IF NOT EXISTS idx_game_console ON game(console_id);
CREATE INDEX IF NOT EXISTS idx_game_rasum ON game(rasum);

-- Every candidate title the catalogue has ever returned, so later scans
-- can re-associate without re-querying. Never deleted.
CREATE TABLE IF NOT EXISTS game_title (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    console_id INTEGER NOT NULL REFERENCES console(id),
    api_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    UNIQUE (console_id, api_id)
);

-- Associations between a game and the candidate titles offered for it;
-- game.match_id points at the preferred row.
CREATE TABLE IF NOT EXISTS game_match (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    game_id INTEGER NOT NULL REFERENCES game(id),
    title_id INTEGER NOT NULL REFERENCES game_title(id),
    UNIQUE (game_id, title_id)
);

-- Static short-name -> preferred-title table, seeded from the shipped
-- games catalogue file.
CREATE TABLE IF NOT EXISTS games_catalogue (
    short_name TEXT PRIMARY KEY,
    full_name TEXT NOT NULL
);
"#;
