//! Remote catalogue clients for the scan pipeline.
//!
//! [`CatalogueProvider`] is the capability the scheduler is parameterised
//! over; [`gamesdb::TheGamesDb`] is the shipped implementation. Achievement
//! game-id resolution is a separate capability ([`RetroAchievements`]) with
//! the same timeout and error discipline.

pub mod achievements;
pub mod error;
pub mod gamesdb;
pub mod provider;

pub use achievements::RetroAchievements;
pub use error::ScrapeError;
pub use gamesdb::TheGamesDb;
pub use provider::{Candidate, CatalogueProvider};

/// Per-request timeout applied by every client in this crate.
pub(crate) const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// User-agent sent with every request.
pub(crate) const USER_AGENT: &str = concat!("pes/", env!("CARGO_PKG_VERSION"));
