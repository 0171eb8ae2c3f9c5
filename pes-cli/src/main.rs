//! pes: scans ROM collections into the game database.
//!
//! Bootstraps the `~/.pes` user directory, loads the consoles file,
//! opens the database, and runs the ingestion pipeline while rendering
//! its progress sink. Fatal bootstrap problems exit with code 1 and a
//! single logged reason; everything past bootstrap degrades per ROM.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex, mpsc};
use std::time::Duration;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

use pes_core::{Console, PathVars, load_consoles, load_games_catalogue};
use pes_lib::{RomScanner, ScanHandle};
use pes_scraper::{CatalogueProvider, RetroAchievements, TheGamesDb};

#[derive(Parser)]
#[command(name = "pes")]
#[command(about = "Scan ROM directories into the PES game database", long_about = None)]
struct Cli {
    /// Install root containing consoles.ini and games_catalogue.ini
    #[arg(short, long, default_value = "/opt/pes")]
    base_dir: PathBuf,

    /// Only scan these consoles (comma-separated names)
    #[arg(short, long, value_delimiter = ',')]
    consoles: Option<Vec<String>>,

    /// Worker thread count (defaults to twice the logical cores)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Skip remote catalogue and achievement lookups
    #[arg(long)]
    offline: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("{} {e}", "error:".red());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let home = dirs::home_dir().ok_or("cannot determine the home directory")?;
    let user_dir = home.join(".pes");
    let roms_root = user_dir.join("roms");
    let coverart_root = user_dir.join("coverart");
    for dir in [&user_dir, &roms_root, &coverart_root] {
        std::fs::create_dir_all(dir)?;
    }

    let consoles_file = cli.base_dir.join("consoles.ini");
    if !consoles_file.is_file() {
        return Err(format!("required file {} is missing", consoles_file.display()).into());
    }

    let vars = PathVars {
        base_dir: cli.base_dir.clone(),
        user_dir: user_dir.clone(),
    };
    let mut settings = load_consoles(&consoles_file, &vars)?;
    if let Some(wanted) = &cli.consoles {
        settings.retain(|s| wanted.iter().any(|w| w.eq_ignore_ascii_case(&s.name)));
    }
    if settings.is_empty() {
        return Err("no consoles selected".into());
    }

    let conn = pes_db::open_database(&user_dir.join("pes.db"))?;

    let catalogue_file = cli.base_dir.join("games_catalogue.ini");
    if catalogue_file.is_file() {
        let entries = load_games_catalogue(&catalogue_file)?;
        let seeded = pes_db::seed_games_catalogue(&conn, &entries)?;
        log::debug!("seeded {seeded} games catalogue entries");
    }

    let mut consoles = Vec::with_capacity(settings.len());
    for console_settings in settings {
        let record = pes_db::upsert_console(
            &conn,
            &console_settings.name,
            console_settings.gamesdb_id,
            console_settings.achievement_id,
        )?;
        let rom_dir = roms_root.join(&console_settings.name);
        let cover_dir = coverart_root.join(&console_settings.name);
        std::fs::create_dir_all(&rom_dir)?;
        std::fs::create_dir_all(&cover_dir)?;
        consoles.push(Console::new(
            record.id,
            console_settings,
            rom_dir,
            cover_dir,
            record.gamesdb_name,
        ));
    }

    let provider: Option<Arc<dyn CatalogueProvider>> = if cli.offline {
        None
    } else {
        Some(Arc::new(TheGamesDb::new()?))
    };
    let achievements = if cli.offline {
        None
    } else {
        Some(Arc::new(RetroAchievements::new()?))
    };

    let store = Arc::new(Mutex::new(conn));
    let (events_tx, events_rx) = mpsc::channel();
    let mut scanner = RomScanner::new(store, consoles, provider, achievements, events_tx)?;
    if let Some(workers) = cli.workers {
        scanner = scanner.worker_count(workers);
    }

    let handle = scanner.start();
    render_progress(&handle);
    let summary = handle.join();

    // The pipeline publishes exactly one database-update event per scan.
    while let Ok(event) = events_rx.try_recv() {
        log::debug!("UI event: {event:?}");
    }

    println!(
        "{} {} added, {} updated, {} deleted{}",
        "scan complete:".green().bold(),
        summary.added,
        summary.updated,
        summary.deleted,
        if summary.cancelled { " (cancelled)" } else { "" }
    );

    Ok(())
}

/// Poll the progress sink at ~4 Hz and render it.
fn render_progress(handle: &ScanHandle) {
    let bar = ProgressBar::new(100);
    if let Ok(style) =
        ProgressStyle::with_template("{bar:40.cyan/blue} {percent:>3}% {msg}")
    {
        bar.set_style(style);
    }

    let progress = handle.progress();
    while !handle.is_finished() {
        let snap = progress.snapshot();
        bar.set_position(u64::from(snap.percent));
        if let Some(last) = &snap.last_processed {
            bar.set_message(format!(
                "{} ({}/{})",
                last.name, snap.processed, snap.rom_total
            ));
        }
        std::thread::sleep(Duration::from_millis(250));
    }
    bar.finish_and_clear();
}
