// Alpha Vantage GLOBAL_QUOTE fetcher

use std::time::Duration;

use tracing::debug;

use super::{FeedError, QuoteFeed};

const BASE_URL: &str = "https://www.alphavantage.co/query";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct AlphaVantageFeed {
    pub symbol: String,  // e.g. "AAPL"
    pub api_key: String, // "demo" works but is rate-capped
    base_url: String,
    client: reqwest::Client,
}

impl AlphaVantageFeed {
    pub fn new(symbol: &str, api_key: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            api_key: api_key.to_string(),
            base_url: BASE_URL.into(),
            client: reqwest::Client::new(),
        }
    }

    fn query_url(&self) -> String {
        format!(
            "{}?function=GLOBAL_QUOTE&symbol={}&apikey={}",
            self.base_url, self.symbol, self.api_key
        )
    }
}

#[async_trait::async_trait]
impl QuoteFeed for AlphaVantageFeed {
    async fn fetch(&self) -> Result<String, FeedError> {
        let res = self
            .client
            .get(self.query_url())
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        let body = res.text().await?;
        debug!(symbol = %self.symbol, bytes = body.len(), "fetched quote payload");
        if body.is_empty() {
            return Err(FeedError::EmptyResponse);
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_url() {
        let feed = AlphaVantageFeed::new("AAPL", "demo");
        assert_eq!(
            feed.query_url(),
            "https://www.alphavantage.co/query?function=GLOBAL_QUOTE&symbol=AAPL&apikey=demo"
        );
    }
}
