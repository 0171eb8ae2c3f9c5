//! The PES ROM ingestion pipeline.
//!
//! A scan walks each console's ROM directory, enriches every ROM with
//! catalogue metadata and cover art, and upserts the result into the game
//! database with mark-and-sweep cleanup of rows whose files have gone.
//! The whole thing runs on a pool of worker threads behind a bounded
//! queue; the UI polls the progress sink and may set the cancellation
//! flag at any time.

use std::io::{Read, Seek};

pub mod artwork;
pub mod error;
pub mod hasher;
pub mod matcher;
pub mod progress;
pub mod scanner;
pub mod scheduler;

mod task;

pub use error::ScanError;
pub use hasher::{RomFamily, rasum};
pub use progress::{LastProcessed, ProgressSnapshot, ScanProgress, ScanState};
pub use scheduler::{RomScanner, ScanHandle, ScanSummary};

/// A reader that implements both Read and Seek.
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}
