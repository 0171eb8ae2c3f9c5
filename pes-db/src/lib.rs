//! SQLite persistence layer for the PES game database.
//!
//! Provides schema creation, the stored operations the scan pipeline
//! drives under its shared mutex, and the read queries the UI consumes.
//! Backed by SQLite (via rusqlite with the bundled feature).

pub mod operations;
pub mod queries;
pub mod schema;

pub use operations::{
    ConsoleRecord, GameRow, GameUpdate, NewGame, OperationError, catalogue_full_name,
    delete_not_exist, find_game_by_path, insert_game, insert_match, mark_all_not_exist,
    mark_exists, rollback_not_exist, seed_games_catalogue, set_console_gamesdb_name,
    set_preferred_match, update_game, upsert_console, upsert_title,
};
pub use queries::{game_count, list_games, record_play, set_favourite};
pub use schema::{open_database, open_memory};
