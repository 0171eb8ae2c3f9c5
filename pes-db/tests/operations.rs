use pes_core::CatalogueEntry;
use pes_db::*;

fn new_game<'a>(console_id: i64, rom_path: &'a str, name: &'a str) -> NewGame<'a> {
    NewGame {
        console_id,
        name,
        rom_path,
        api_id: None,
        cover_art_path: None,
        overview: "",
        release_date: -1,
        added: 1_700_000_000,
        size: 524_288,
        rasum: None,
        achievement_game_id: None,
    }
}

fn nes(conn: &rusqlite::Connection) -> i64 {
    upsert_console(conn, "NES", Some(7), Some(3)).unwrap().id
}

#[test]
fn upsert_console_assigns_stable_ids() {
    let conn = open_memory().unwrap();
    let first = upsert_console(&conn, "NES", Some(7), None).unwrap();
    let second = upsert_console(&conn, "NES", Some(7), Some(3)).unwrap();
    assert_eq!(first.id, second.id);

    let other = upsert_console(&conn, "Mega Drive", Some(18), None).unwrap();
    assert_ne!(first.id, other.id);
}

#[test]
fn console_gamesdb_name_survives_upsert() {
    let conn = open_memory().unwrap();
    let id = nes(&conn);
    set_console_gamesdb_name(&conn, id, "Nintendo Entertainment System (NES)").unwrap();

    let record = upsert_console(&conn, "NES", Some(7), Some(3)).unwrap();
    assert_eq!(
        record.gamesdb_name.as_deref(),
        Some("Nintendo Entertainment System (NES)")
    );
}

#[test]
fn upsert_title_is_keyed_by_console_and_api_id() {
    let conn = open_memory().unwrap();
    let console_id = nes(&conn);

    let a = upsert_title(&conn, console_id, 101, "Sonic The Hedgehog").unwrap();
    let b = upsert_title(&conn, console_id, 101, "Sonic the Hedgehog").unwrap();
    assert_eq!(a, b);

    let title: String = conn
        .query_row("SELECT title FROM game_title WHERE id = ?1", [a], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(title, "Sonic the Hedgehog");

    let c = upsert_title(&conn, console_id, 102, "Sonic the Hedgehog 2").unwrap();
    assert_ne!(a, c);
}

#[test]
fn insert_then_find_game_by_path() {
    let conn = open_memory().unwrap();
    let console_id = nes(&conn);

    let id = insert_game(&conn, &new_game(console_id, "/roms/NES/mario.nes", "mario")).unwrap();
    let row = find_game_by_path(&conn, console_id, "/roms/NES/mario.nes")
        .unwrap()
        .unwrap();
    assert_eq!(row.id, id);
    assert_eq!(row.name, "mario");
    assert!(row.exists);
    assert_eq!(row.release_date, -1);

    assert!(
        find_game_by_path(&conn, console_id, "/roms/NES/other.nes")
            .unwrap()
            .is_none()
    );
}

#[test]
fn duplicate_insert_is_retried_as_update() {
    let conn = open_memory().unwrap();
    let console_id = nes(&conn);

    let first = insert_game(&conn, &new_game(console_id, "/roms/NES/mario.nes", "mario")).unwrap();

    let mut improved = new_game(console_id, "/roms/NES/mario.nes", "Super Mario Bros.");
    improved.api_id = Some(140);
    improved.overview = "Plumber saves kingdom.";
    improved.added = 9_999_999_999; // must NOT overwrite the first-seen stamp
    let second = insert_game(&conn, &improved).unwrap();
    assert_eq!(first, second);

    let row = find_game_by_path(&conn, console_id, "/roms/NES/mario.nes")
        .unwrap()
        .unwrap();
    assert_eq!(row.name, "Super Mario Bros.");
    assert_eq!(row.api_id, Some(140));
    assert_eq!(row.added, 1_700_000_000);
}

#[test]
fn update_game_never_touches_first_seen_or_play_history() {
    let conn = open_memory().unwrap();
    let console_id = nes(&conn);
    let id = insert_game(&conn, &new_game(console_id, "/roms/NES/mario.nes", "mario")).unwrap();
    record_play(&conn, id, 1_800_000_000).unwrap();

    update_game(
        &conn,
        id,
        &GameUpdate {
            name: "Super Mario Bros.",
            api_id: Some(140),
            cover_art_path: Some("/coverart/NES/mario.jpg"),
            overview: "Plumber saves kingdom.",
            release_date: 496_972_800,
            rasum: Some("8e3abb1c"),
            achievement_game_id: Some(1446),
        },
    )
    .unwrap();

    let row = find_game_by_path(&conn, console_id, "/roms/NES/mario.nes")
        .unwrap()
        .unwrap();
    assert_eq!(row.added, 1_700_000_000);
    assert_eq!(row.play_count, 1);
    assert_eq!(row.last_played, 1_800_000_000);
    assert_eq!(row.cover_art_path.as_deref(), Some("/coverart/NES/mario.jpg"));
    assert_eq!(row.release_date, 496_972_800);
}

#[test]
fn mark_and_sweep_deletes_only_unseen_rows() {
    let conn = open_memory().unwrap();
    let console_id = nes(&conn);

    let kept = insert_game(&conn, &new_game(console_id, "/roms/NES/kept.nes", "kept")).unwrap();
    let gone = insert_game(&conn, &new_game(console_id, "/roms/NES/gone.nes", "gone")).unwrap();

    // Give the doomed row a match so the FK chain is exercised.
    let title_id = upsert_title(&conn, console_id, 55, "Gone").unwrap();
    let match_id = insert_match(&conn, gone, title_id).unwrap();
    set_preferred_match(&conn, gone, match_id).unwrap();

    mark_all_not_exist(&conn, console_id).unwrap();
    mark_exists(&conn, kept).unwrap();

    let deleted = delete_not_exist(&conn, console_id).unwrap();
    assert_eq!(deleted, 1);

    assert!(
        find_game_by_path(&conn, console_id, "/roms/NES/kept.nes")
            .unwrap()
            .is_some()
    );
    assert!(
        find_game_by_path(&conn, console_id, "/roms/NES/gone.nes")
            .unwrap()
            .is_none()
    );

    // Candidate titles are never deleted.
    let titles: i64 = conn
        .query_row("SELECT COUNT(*) FROM game_title", [], |row| row.get(0))
        .unwrap();
    assert_eq!(titles, 1);
}

#[test]
fn rollback_restores_every_unseen_row() {
    let conn = open_memory().unwrap();
    let console_id = nes(&conn);

    insert_game(&conn, &new_game(console_id, "/roms/NES/a.nes", "a")).unwrap();
    insert_game(&conn, &new_game(console_id, "/roms/NES/b.nes", "b")).unwrap();
    mark_all_not_exist(&conn, console_id).unwrap();

    let restored = rollback_not_exist(&conn, console_id).unwrap();
    assert_eq!(restored, 2);

    let unseen: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM game WHERE exists_flag = 0",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(unseen, 0);
}

#[test]
fn insert_match_deduplicates_pairs() {
    let conn = open_memory().unwrap();
    let console_id = nes(&conn);
    let game_id = insert_game(&conn, &new_game(console_id, "/roms/NES/s.nes", "s")).unwrap();
    let title_id = upsert_title(&conn, console_id, 7, "Sonic The Hedgehog").unwrap();

    let a = insert_match(&conn, game_id, title_id).unwrap();
    let b = insert_match(&conn, game_id, title_id).unwrap();
    assert_eq!(a, b);

    set_preferred_match(&conn, game_id, a).unwrap();
    let row = find_game_by_path(&conn, console_id, "/roms/NES/s.nes")
        .unwrap()
        .unwrap();
    assert_eq!(row.match_id, Some(a));
}

#[test]
fn games_catalogue_seeds_once() {
    let conn = open_memory().unwrap();
    let entries = vec![
        CatalogueEntry {
            short_name: "smb".into(),
            full_name: "Super Mario Bros.".into(),
        },
        CatalogueEntry {
            short_name: "zelda".into(),
            full_name: "The Legend of Zelda".into(),
        },
    ];

    assert_eq!(seed_games_catalogue(&conn, &entries).unwrap(), 2);
    // Re-seeding must not overwrite or duplicate.
    assert_eq!(seed_games_catalogue(&conn, &entries).unwrap(), 0);

    assert_eq!(
        catalogue_full_name(&conn, "smb").unwrap().as_deref(),
        Some("Super Mario Bros.")
    );
    assert_eq!(catalogue_full_name(&conn, "unknown").unwrap(), None);
}
