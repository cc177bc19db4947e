// src/error.rs
// =============================================================================
// Errors that abort a whole crawl.
//
// Almost nothing does. A page that fails to load or a file that fails its
// liveness probe is simply left out of the result. What remains here is bad
// input (seed, depth, proxy) and failing to build the HTTP client at all.
// =============================================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrawlError {
    /// The seed is not a parseable absolute URL
    #[error("invalid seed URL '{url}': {source}")]
    InvalidSeed {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The seed parsed but is not http or https
    #[error("unsupported scheme in seed URL '{url}' (expected http or https)")]
    UnsupportedScheme { url: String },

    /// The seed has no host to scope the crawl to
    #[error("seed URL has no host: {url}")]
    MissingHost { url: String },

    #[error("max depth must be at least 1")]
    InvalidDepth,

    /// A configured proxy URL was rejected by the HTTP client
    #[error("invalid proxy '{proxy}': {source}")]
    InvalidProxy {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },

    /// The HTTP client could not be constructed (TLS backend, resources)
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
