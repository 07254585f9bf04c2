use thiserror::Error;

/// Failure classes for anything that talks to the upstream feed.
///
/// Caches degrade to stale values on these when they can; loops log them
/// and move on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketError {
    /// Network failure, timeout or non-success status.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The upstream answered, but not with the shape we expect.
    #[error("invalid upstream schema: {0}")]
    InvalidUpstreamSchema(String),

    #[error("detail unavailable for {asset_id}: {reason}")]
    DetailUnavailable { asset_id: String, reason: String },
}

impl MarketError {
    pub fn timeout(what: &str, limit: std::time::Duration) -> Self {
        Self::UpstreamUnavailable(format!("{what} timed out after {}ms", limit.as_millis()))
    }
}
