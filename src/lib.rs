//! Finds live downloadable files on a website.
//!
//! A crawl walks same-site pages from a seed URL up to a depth limit,
//! collects every link whose path ends in an allowed file extension, then
//! probes those links and keeps the ones that actually resolve.
//!
//! ```no_run
//! use link_harvester::{crawl, CrawlRequest};
//!
//! # async fn example() -> Result<(), link_harvester::CrawlError> {
//! let request = CrawlRequest::new("https://example.com/", 2, vec!["pdf".into()]);
//! let outcome = crawl(request).await?;
//! for file in &outcome.found_files {
//!     println!("{file}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod checker;
pub mod crawl;
pub mod error;
pub mod stealth;

pub use checker::{LinkCheckResult, LinkStatus, ProbeOptions, ValidationMode};
pub use crawl::{crawl, CrawlOutcome, CrawlRequest, CrawlSettings, Crawler};
pub use error::CrawlError;
pub use stealth::{CrawlMode, ProxyPools};
