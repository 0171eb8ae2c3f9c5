//! Read queries and play-history writes used by the UI surface.

use rusqlite::{Connection, params};

use crate::operations::{GAME_COLUMNS, GameRow, OperationError, row_to_game};

/// All visible games for a console, ordered by display name.
///
/// Rows flagged unseen are mid-scan state and never reach the UI.
pub fn list_games(conn: &Connection, console_id: i64) -> Result<Vec<GameRow>, OperationError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {GAME_COLUMNS} FROM game
         WHERE console_id = ?1 AND exists_flag = 1
         ORDER BY name COLLATE NOCASE"
    ))?;
    let rows = stmt
        .query_map(params![console_id], row_to_game)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Number of visible games for a console.
pub fn game_count(conn: &Connection, console_id: i64) -> Result<i64, OperationError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM game WHERE console_id = ?1 AND exists_flag = 1",
        params![console_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Record a launch: bump the play count and stamp the last-played time.
pub fn record_play(conn: &Connection, game_id: i64, at: i64) -> Result<(), OperationError> {
    let changed = conn.execute(
        "UPDATE game SET play_count = play_count + 1, last_played = ?2 WHERE id = ?1",
        params![game_id, at],
    )?;
    if changed == 0 {
        return Err(OperationError::NotFound {
            entity_type: "game".to_string(),
            id: game_id,
        });
    }
    Ok(())
}

/// Toggle the favourite flag.
pub fn set_favourite(
    conn: &Connection,
    game_id: i64,
    favourite: bool,
) -> Result<(), OperationError> {
    let changed = conn.execute(
        "UPDATE game SET favourite = ?2 WHERE id = ?1",
        params![game_id, favourite],
    )?;
    if changed == 0 {
        return Err(OperationError::NotFound {
            entity_type: "game".to_string(),
            id: game_id,
        });
    }
    Ok(())
}
