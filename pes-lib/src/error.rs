use thiserror::Error;

/// Errors raised inside the scan pipeline.
///
/// Per-task failures are logged and degrade the task's result; they never
/// abort a scan. The scheduler itself only surfaces errors from its own
/// setup (HTTP client construction).
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] pes_db::OperationError),

    #[error("catalogue error: {0}")]
    Scrape(#[from] pes_scraper::ScrapeError),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The ROM claims a header its file cannot contain.
    #[error("malformed ROM: {0}")]
    MalformedRom(String),
}

impl ScanError {
    pub fn malformed_rom(msg: impl Into<String>) -> Self {
        Self::MalformedRom(msg.into())
    }
}
