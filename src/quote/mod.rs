// Quote extraction module entrypoint
pub mod extractor; // scans raw payload text for quoted fields
pub mod types;     // Quote snapshot + extraction error taxonomy

pub use extractor::{extract_quoted_value, QuoteExtractor};
pub use types::{ExtractError, Quote};
