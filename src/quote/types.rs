use std::time::SystemTime;

/// One snapshot of market data. Built fresh on every successful fetch,
/// superseded wholesale by the next one; a failed fetch leaves the
/// previously held quote untouched.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Quote {
    pub last_price: f64,
    /// Daily low, if the provider sent one we could parse.
    pub low: Option<f64>,
    /// Daily high, same deal.
    pub high: Option<f64>,
    #[serde(skip)]
    pub fetched_at: SystemTime,
}

impl Quote {
    pub fn new(last_price: f64, low: Option<f64>, high: Option<f64>) -> Self {
        Self { last_price, low, high, fetched_at: SystemTime::now() }
    }
}

/// Why a payload did not yield a usable quote. All variants are
/// recoverable; the engine retries after its retry interval.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("mandatory price field missing from payload")]
    MissingField,
    #[error("provider returned an error/throttle payload")]
    UpstreamError,
    #[error("payload present but in an unexpected shape")]
    UnexpectedFormat,
    #[error("price field present but not a valid number: {0:?}")]
    ParseFailure(String),
}
