use crate::error::ScrapeError;

/// One candidate game returned by a catalogue search.
///
/// A candidate is fully populated or not returned at all; parse failures
/// surface as errors rather than half-filled values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// The catalogue's stable id for this game.
    pub remote_id: i64,
    /// The catalogue's canonical title.
    pub title: String,
    pub overview: String,
    /// Unix epoch seconds; -1 = unknown.
    pub release_date: i64,
    /// Cover-art URLs in download preference order.
    pub cover_urls: Vec<String>,
}

/// A remote game catalogue.
///
/// Implementations apply a per-request timeout, send a descriptive
/// user-agent, and cap `search` results in the catalogue's native order.
pub trait CatalogueProvider: Send + Sync {
    /// Search the catalogue for a title on a platform. `platform` is the
    /// catalogue's own platform name, obtained from
    /// [`resolve_platform_name`](Self::resolve_platform_name).
    fn search(&self, platform: &str, query: &str) -> Result<Vec<Candidate>, ScrapeError>;

    /// Resolve an opaque platform key to the catalogue's platform name.
    /// Consulted at most once per console per process; the caller caches
    /// the result.
    fn resolve_platform_name(&self, platform_key: i64) -> Result<String, ScrapeError>;
}
