// Feed module: how raw quote text gets to the engine

pub mod alphavantage;

pub use alphavantage::AlphaVantageFeed;

/// Transport-level failure. The engine treats this the same as a
/// payload with the mandatory field missing: failed cycle, retry.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("empty response body")]
    EmptyResponse,
}

/// Source of raw quote payloads for one instrument. The engine only
/// sees text; parsing and classification happen in `quote`.
#[async_trait::async_trait]
pub trait QuoteFeed: Send + Sync {
    async fn fetch(&self) -> Result<String, FeedError>;
}
