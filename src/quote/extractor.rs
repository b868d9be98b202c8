// Scans semi-structured provider payloads for quoted key/value pairs.
// Deliberately NOT a JSON parser: the payload is untrusted and may be
// truncated or an error body, so we only rely on the "key": "value"
// convention holding for the fields we ask for.

use tracing::debug;

use super::types::{ExtractError, Quote};

/// Markers that identify a provider-side error or throttle payload.
const UPSTREAM_MARKERS: [&str; 3] = ["Error Message", "Note", "Information"];

/// Find `"key"`, then the next `:`, then the next pair of quotes, and
/// return the text between them. Scans left-to-right from the first
/// key occurrence; no backtracking. `None` if any step fails.
pub fn extract_quoted_value<'a>(payload: &'a str, key: &str) -> Option<&'a str> {
    let quoted_key = format!("\"{}\"", key);
    let key_pos = payload.find(&quoted_key)?;
    let after_key = key_pos + quoted_key.len();
    let colon_pos = after_key + payload[after_key..].find(':')?;
    let first_quote = colon_pos + payload[colon_pos..].find('"')?;
    let rest = &payload[first_quote + 1..];
    let second_quote = rest.find('"')?;
    Some(&rest[..second_quote])
}

/// Field keys for one provider payload shape. Defaults match the
/// Alpha Vantage GLOBAL_QUOTE response.
#[derive(Debug, Clone)]
pub struct QuoteExtractor {
    pub price_key: String,
    pub low_key: String,
    pub high_key: String,
}

impl Default for QuoteExtractor {
    fn default() -> Self {
        Self {
            price_key: "05. price".into(),
            low_key: "04. low".into(),
            high_key: "03. high".into(),
        }
    }
}

impl QuoteExtractor {
    /// Pull the mandatory price plus optional low/high out of a raw
    /// payload, or classify why we couldn't.
    pub fn extract(&self, payload: &str) -> Result<Quote, ExtractError> {
        if payload.trim().is_empty() {
            return Err(ExtractError::MissingField);
        }

        let price_str = match extract_quoted_value(payload, &self.price_key) {
            Some(s) => s,
            None => return Err(self.classify_missing(payload)),
        };

        let last_price = match parse_decimal(price_str) {
            Some(p) if p > 0.0 => p,
            _ => return Err(ExtractError::ParseFailure(price_str.to_string())),
        };

        // Optional fields: absence or a bad number just leaves them out.
        let low = extract_quoted_value(payload, &self.low_key).and_then(parse_decimal);
        let high = extract_quoted_value(payload, &self.high_key).and_then(parse_decimal);

        debug!(last_price, ?low, ?high, "extracted quote");
        Ok(Quote::new(last_price, low, high))
    }

    fn classify_missing(&self, payload: &str) -> ExtractError {
        if UPSTREAM_MARKERS.iter().any(|m| payload.contains(m)) {
            ExtractError::UpstreamError
        } else {
            ExtractError::UnexpectedFormat
        }
    }
}

fn parse_decimal(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
