/// Errors from catalogue and achievement lookups.
///
/// Transport failures and payload failures are distinct so callers can
/// log them differently; both degrade a scan task rather than abort it.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned HTTP {status}")]
    Status { status: u16 },

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML attribute error: {0}")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed payload: {0}")]
    Payload(String),
}

impl ScrapeError {
    pub fn payload(msg: impl Into<String>) -> Self {
        Self::Payload(msg.into())
    }

    /// Whether this is a transport-level failure (as opposed to a parse
    /// failure on a delivered payload).
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Status { .. })
    }
}
