//! Scan orchestration: bounded work queue, worker threads, cancellation,
//! and mark-and-sweep finalisation.
//!
//! Workers pull tasks from a bounded channel whose closure (the sender
//! drop) is the drain signal, so cancelled scans still consume every
//! queued task before the pool shuts down. Each worker accumulates local
//! added/updated totals and publishes them on a result channel; the
//! coordinator sums them, finalises the store, and pushes exactly one
//! database-update event to the UI.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, mpsc};
use std::thread::JoinHandle;
use std::time::Duration;

use pes_core::{Console, UiEvent};
use pes_scraper::{CatalogueProvider, RetroAchievements};
use rusqlite::Connection;

use crate::artwork;
use crate::error::ScanError;
use crate::progress::ScanProgress;
use crate::scanner;
use crate::task::{RomTask, TaskContext};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("pes/", env!("CARGO_PKG_VERSION"));

/// Final tallies of a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    pub cancelled: bool,
}

#[derive(Debug, Default)]
struct WorkerTotals {
    added: usize,
    updated: usize,
}

/// Owns one scan over a set of consoles.
///
/// `start()` consumes the scanner, so a finished scan cannot be rerun by
/// accident; build a fresh one for the next pass.
pub struct RomScanner {
    store: Arc<Mutex<Connection>>,
    consoles: Vec<Arc<Console>>,
    provider: Option<Arc<dyn CatalogueProvider>>,
    achievements: Option<Arc<RetroAchievements>>,
    events: mpsc::Sender<UiEvent>,
    progress: Arc<ScanProgress>,
    cancel: Arc<AtomicBool>,
    worker_count: usize,
    max_cover_width: u32,
    http: reqwest::blocking::Client,
}

/// A running scan: poll the progress sink, request cancellation, join for
/// the summary.
pub struct ScanHandle {
    progress: Arc<ScanProgress>,
    cancel: Arc<AtomicBool>,
    thread: JoinHandle<ScanSummary>,
}

impl ScanHandle {
    pub fn progress(&self) -> Arc<ScanProgress> {
        self.progress.clone()
    }

    /// Ask the scan to stop. Tasks already in flight run to completion;
    /// finalisation rolls the seen flags back instead of deleting.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    pub fn join(self) -> ScanSummary {
        match self.thread.join() {
            Ok(summary) => summary,
            Err(_) => {
                log::error!("scan coordinator panicked");
                ScanSummary {
                    cancelled: true,
                    ..ScanSummary::default()
                }
            }
        }
    }
}

impl RomScanner {
    pub fn new(
        store: Arc<Mutex<Connection>>,
        consoles: Vec<Console>,
        provider: Option<Arc<dyn CatalogueProvider>>,
        achievements: Option<Arc<RetroAchievements>>,
        events: mpsc::Sender<UiEvent>,
    ) -> Result<Self, ScanError> {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let http = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            store,
            consoles: consoles.into_iter().map(Arc::new).collect(),
            provider,
            achievements,
            events,
            progress: Arc::new(ScanProgress::new()),
            cancel: Arc::new(AtomicBool::new(false)),
            worker_count: 2 * cores,
            max_cover_width: artwork::DEFAULT_MAX_WIDTH,
            http,
        })
    }

    pub fn worker_count(mut self, workers: usize) -> Self {
        self.worker_count = workers.max(1);
        self
    }

    pub fn max_cover_width(mut self, width: u32) -> Self {
        self.max_cover_width = width;
        self
    }

    pub fn progress(&self) -> Arc<ScanProgress> {
        self.progress.clone()
    }

    /// The shared cancellation signal, for callers that wire it up before
    /// the scan starts.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Kick off the scan on a background coordinator thread.
    pub fn start(self) -> ScanHandle {
        let progress = self.progress.clone();
        let cancel = self.cancel.clone();
        let thread = std::thread::spawn(move || self.run());
        ScanHandle {
            progress,
            cancel,
            thread,
        }
    }

    fn run(self) -> ScanSummary {
        self.progress.begin_queueing();
        self.resolve_platform_names();

        // Enumerate per console, marking its rows unseen in the same
        // breath so a console whose directory fails to read keeps its
        // rows untouched.
        let mut tasks: Vec<RomTask> = Vec::new();
        for console in &self.consoles {
            let files = match scanner::scan_rom_files(console) {
                Ok(files) => files,
                Err(e) => {
                    log::error!(
                        "cannot read ROM directory {}: {e}",
                        console.rom_dir().display()
                    );
                    continue;
                }
            };

            let marked = {
                let mut conn = self.lock_store();
                conn.transaction()
                    .map_err(pes_db::OperationError::from)
                    .and_then(|tx| {
                        pes_db::mark_all_not_exist(&tx, console.id())?;
                        tx.commit().map_err(pes_db::OperationError::from)
                    })
            };
            if let Err(e) = marked {
                log::error!("mark-and-sweep setup for {} failed: {e}", console.name());
                continue;
            }

            for rom_path in files {
                tasks.push(RomTask {
                    console: console.clone(),
                    rom_path,
                });
            }
        }

        let total = tasks.len();
        log::info!(
            "scanning {total} ROMs across {} consoles with {} workers",
            self.consoles.len(),
            self.worker_count
        );
        self.progress.begin_running(total, self.worker_count);

        let ctx = Arc::new(TaskContext {
            store: self.store.clone(),
            provider: self.provider.clone(),
            achievements: self.achievements.clone(),
            http: self.http.clone(),
            max_cover_width: self.max_cover_width,
        });

        let (work_tx, work_rx) = async_channel::bounded::<RomTask>(self.worker_count);
        let (result_tx, result_rx) = mpsc::channel::<WorkerTotals>();

        let mut workers = Vec::with_capacity(self.worker_count);
        for _ in 0..self.worker_count {
            let work_rx = work_rx.clone();
            let result_tx = result_tx.clone();
            let ctx = ctx.clone();
            let cancel = self.cancel.clone();
            let progress = self.progress.clone();
            workers.push(std::thread::spawn(move || {
                let mut totals = WorkerTotals::default();
                while let Ok(task) = work_rx.recv_blocking() {
                    progress.task_dequeued();
                    // A cancelled scan still drains the queue so the
                    // submission loop never wedges on a full channel.
                    if cancel.load(Ordering::Relaxed) {
                        continue;
                    }
                    let outcome = task.run(&ctx);
                    totals.added += usize::from(outcome.added);
                    totals.updated += usize::from(outcome.updated);
                    progress.task_done(outcome.added, outcome.updated, outcome.last);
                }
                let _ = result_tx.send(totals);
            }));
        }
        drop(work_rx);
        drop(result_tx);

        // Submission order is enumeration order; the bounded channel
        // provides backpressure. Dropping the sender closes the queue and
        // lets the workers wind down.
        for task in tasks {
            if work_tx.send_blocking(task).is_err() {
                break;
            }
        }
        drop(work_tx);

        let mut added = 0;
        let mut updated = 0;
        while let Ok(totals) = result_rx.recv() {
            added += totals.added;
            updated += totals.updated;
        }
        for worker in workers {
            let _ = worker.join();
        }

        let cancelled = self.cancel.load(Ordering::Relaxed);
        self.progress.finalising(cancelled);

        let mut deleted = 0;
        {
            let conn = self.lock_store();
            for console in &self.consoles {
                let result = if cancelled {
                    pes_db::rollback_not_exist(&conn, console.id()).map(|_| 0)
                } else {
                    pes_db::delete_not_exist(&conn, console.id())
                };
                match result {
                    Ok(count) => deleted += count,
                    Err(e) => {
                        log::error!("finalisation for {} failed: {e}", console.name())
                    }
                }
            }
        }

        self.progress.finish(deleted);
        let _ = self.events.send(UiEvent::DatabaseUpdate {
            added,
            updated,
            deleted,
        });
        log::info!(
            "scan finished: {added} added, {updated} updated, {deleted} deleted{}",
            if cancelled { " (cancelled)" } else { "" }
        );

        ScanSummary {
            added,
            updated,
            deleted,
            cancelled,
        }
    }

    /// Resolve and persist each console's catalogue platform name, once
    /// per console per process. A failure here just disables remote
    /// enrichment for that console's tasks.
    fn resolve_platform_names(&self) {
        let Some(provider) = &self.provider else {
            return;
        };
        for console in &self.consoles {
            let Some(key) = console.gamesdb_id() else {
                continue;
            };
            if console.gamesdb_name().is_some() {
                continue;
            }
            match provider.resolve_platform_name(key) {
                Ok(name) => {
                    console.cache_gamesdb_name(name.clone());
                    let conn = self.lock_store();
                    if let Err(e) = pes_db::set_console_gamesdb_name(&conn, console.id(), &name) {
                        log::warn!("persisting platform name for {} failed: {e}", console.name());
                    }
                }
                Err(e) => log::warn!(
                    "platform name lookup for {} failed: {e}",
                    console.name()
                ),
            }
        }
    }

    fn lock_store(&self) -> MutexGuard<'_, Connection> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }
}
