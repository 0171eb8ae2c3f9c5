//! Events published to the UI event queue.

/// An event pushed onto the UI's event queue by background work.
///
/// The scan scheduler publishes exactly one `DatabaseUpdate` per scan,
/// cancelled or not, once finalisation has run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// The game database changed; the UI should reload its lists.
    DatabaseUpdate {
        added: usize,
        updated: usize,
        deleted: usize,
    },
}
