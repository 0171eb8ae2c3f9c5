//! The progress sink the UI polls during a scan.
//!
//! Workers touch the sink with single short mutex acquisitions; the UI
//! thread reads a consistent snapshot the same way. Counters only grow;
//! the ETA is the one field allowed to move both ways.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Scan lifecycle. A scanner moves strictly left to right; `Done` is
/// terminal and a second scan needs a fresh scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Queueing,
    Running,
    Completing,
    Cancelling,
    Done,
}

/// The most recently finished ROM, for the UI's ticker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastProcessed {
    pub name: String,
    pub cover_path: Option<PathBuf>,
}

/// A point-in-time view of a running scan.
#[derive(Debug, Clone)]
pub struct ProgressSnapshot {
    pub state: ScanState,
    pub rom_total: usize,
    pub processed: usize,
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    /// 0 before the workers start, 100 once the scan is done.
    pub percent: u8,
    pub elapsed: Duration,
    /// Unknown until at least one task has finished.
    pub eta_remaining: Option<Duration>,
    pub last_processed: Option<LastProcessed>,
}

#[derive(Debug)]
struct Inner {
    state: ScanState,
    rom_total: usize,
    queue_size: usize,
    worker_count: usize,
    processed: usize,
    added: usize,
    updated: usize,
    deleted: usize,
    started_at: Option<Instant>,
    last_processed: Option<LastProcessed>,
}

/// Shared progress accounting for one scan.
#[derive(Debug)]
pub struct ScanProgress {
    inner: Mutex<Inner>,
}

impl ScanProgress {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: ScanState::Idle,
                rom_total: 0,
                queue_size: 0,
                worker_count: 0,
                processed: 0,
                added: 0,
                updated: 0,
                deleted: 0,
                started_at: None,
                last_processed: None,
            }),
        }
    }

    pub(crate) fn begin_queueing(&self) {
        let mut inner = self.lock();
        inner.state = ScanState::Queueing;
        inner.started_at = Some(Instant::now());
    }

    pub(crate) fn begin_running(&self, rom_total: usize, worker_count: usize) {
        let mut inner = self.lock();
        inner.state = ScanState::Running;
        inner.rom_total = rom_total;
        inner.queue_size = rom_total;
        inner.worker_count = worker_count;
    }

    /// A worker pulled a task off the queue.
    pub(crate) fn task_dequeued(&self) {
        let mut inner = self.lock();
        inner.queue_size = inner.queue_size.saturating_sub(1);
    }

    /// A worker finished executing a task.
    pub(crate) fn task_done(&self, added: bool, updated: bool, last: Option<LastProcessed>) {
        let mut inner = self.lock();
        inner.processed += 1;
        if added {
            inner.added += 1;
        }
        if updated {
            inner.updated += 1;
        }
        if last.is_some() {
            inner.last_processed = last;
        }
    }

    pub(crate) fn finalising(&self, cancelled: bool) {
        let mut inner = self.lock();
        inner.state = if cancelled {
            ScanState::Cancelling
        } else {
            ScanState::Completing
        };
    }

    pub(crate) fn finish(&self, deleted: usize) {
        let mut inner = self.lock();
        inner.deleted = deleted;
        inner.state = ScanState::Done;
    }

    pub fn state(&self) -> ScanState {
        self.lock().state
    }

    /// One consistent view for the UI; a single mutex acquisition.
    pub fn snapshot(&self) -> ProgressSnapshot {
        let inner = self.lock();
        let elapsed = inner
            .started_at
            .map(|t| t.elapsed())
            .unwrap_or(Duration::ZERO);

        let percent = match inner.state {
            ScanState::Idle | ScanState::Queueing => 0,
            ScanState::Done => 100,
            _ => {
                if inner.rom_total == 0 {
                    100
                } else {
                    let through =
                        inner.rom_total - inner.queue_size + inner.worker_count;
                    let ratio = through as f64 / inner.rom_total as f64 * 100.0;
                    ratio.round().clamp(0.0, 100.0) as u8
                }
            }
        };

        let eta_remaining = if inner.processed > 0 {
            Some(elapsed.mul_f64(inner.queue_size as f64 / inner.processed as f64))
        } else {
            None
        };

        ProgressSnapshot {
            state: inner.state,
            rom_total: inner.rom_total,
            processed: inner.processed,
            added: inner.added,
            updated: inner.updated,
            deleted: inner.deleted,
            percent,
            elapsed,
            eta_remaining,
            last_processed: inner.last_processed.clone(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned sink means a worker panicked; progress data is still
        // plain counters, so keep serving it.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_is_pinned_before_and_after() {
        let progress = ScanProgress::new();
        assert_eq!(progress.snapshot().percent, 0);

        progress.begin_queueing();
        assert_eq!(progress.snapshot().percent, 0);

        progress.begin_running(10, 2);
        progress.finalising(false);
        progress.finish(0);
        assert_eq!(progress.snapshot().percent, 100);
        assert_eq!(progress.snapshot().state, ScanState::Done);
    }

    #[test]
    fn percent_tracks_queue_drain() {
        let progress = ScanProgress::new();
        progress.begin_queueing();
        progress.begin_running(10, 2);

        // Nothing dequeued yet: (10 - 10 + 2) / 10 = 20%.
        assert_eq!(progress.snapshot().percent, 20);

        for _ in 0..5 {
            progress.task_dequeued();
        }
        // (10 - 5 + 2) / 10 = 70%.
        assert_eq!(progress.snapshot().percent, 70);

        for _ in 0..5 {
            progress.task_dequeued();
        }
        // Clamped: (10 - 0 + 2) / 10 would be 120%.
        assert_eq!(progress.snapshot().percent, 100);
    }

    #[test]
    fn empty_scan_reports_full_progress_while_running() {
        let progress = ScanProgress::new();
        progress.begin_queueing();
        progress.begin_running(0, 4);
        assert_eq!(progress.snapshot().percent, 100);
    }

    #[test]
    fn counters_accumulate() {
        let progress = ScanProgress::new();
        progress.begin_queueing();
        progress.begin_running(3, 1);

        progress.task_dequeued();
        progress.task_done(
            true,
            false,
            Some(LastProcessed {
                name: "Super Mario Bros.".into(),
                cover_path: None,
            }),
        );
        progress.task_dequeued();
        progress.task_done(false, true, None);

        let snap = progress.snapshot();
        assert_eq!(snap.processed, 2);
        assert_eq!(snap.added, 1);
        assert_eq!(snap.updated, 1);
        assert_eq!(
            snap.last_processed.unwrap().name,
            "Super Mario Bros."
        );
    }

    #[test]
    fn eta_is_unknown_until_first_completion() {
        let progress = ScanProgress::new();
        progress.begin_queueing();
        progress.begin_running(4, 1);
        assert!(progress.snapshot().eta_remaining.is_none());

        progress.task_dequeued();
        progress.task_done(true, false, None);
        assert!(progress.snapshot().eta_remaining.is_some());
    }
}
