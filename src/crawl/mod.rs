// src/crawl/mod.rs
// =============================================================================
// This module handles the whole crawl: traversal followed by validation.
//
// Features:
// - Depth-first crawling starting from a seed URL
// - Same-site restriction (never crawls other hosts)
// - Configurable depth limit and file-extension allow-list
// - Incremental re-crawls (pages from an earlier run are skipped)
// - Liveness check on every file link before it is reported
// - Request shaping per crawl mode (user agent, proxy, delay)
//
// The two phases run strictly one after the other:
//   seed -> traverse -> (visited, candidates) -> validate -> (visited, files)
// =============================================================================

mod links;
mod traverse;

use std::collections::{BTreeSet, HashSet};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use url::Url;

use crate::checker::{validate_candidates, ProbeOptions, ValidationMode};
use crate::error::CrawlError;
use crate::stealth::{CrawlMode, ModePolicy, ProxyPools, RequestShaper};

pub use links::{extract_page_links, resolve_reference, same_site, ExtensionFilter, PageLinks};
pub use traverse::{traverse, CrawlContext, Traversal};

/// Per-request timeout for page fetches.
pub const PAGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Redirects followed before a request is treated as failed.
pub const MAX_REDIRECTS: usize = 10;

// One crawl, as a caller asks for it
//
// The field names double as the JSON body an HTTP wrapper would accept:
//   {"seedUrl": "...", "maxDepth": 2, "priorVisited": [], "fileTypes": ["pdf"], "mode": "stealth"}
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlRequest {
    pub seed_url: String,
    pub max_depth: usize,
    #[serde(default)]
    pub prior_visited: Vec<String>,
    /// Extensions to collect ("pdf" or ".pdf", any case). A link whose path
    /// ends in one of them is treated as a file: it becomes a candidate and
    /// is never fetched as a page to crawl further.
    pub file_types: Vec<String>,
    #[serde(default)]
    pub mode: CrawlMode,
}

impl CrawlRequest {
    pub fn new(seed_url: impl Into<String>, max_depth: usize, file_types: Vec<String>) -> Self {
        Self {
            seed_url: seed_url.into(),
            max_depth,
            prior_visited: Vec::new(),
            file_types,
            mode: CrawlMode::default(),
        }
    }
}

// Result of a crawl: every page attempted and every file confirmed live
//
// BTreeSet keeps the JSON output sorted and stable between runs.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlOutcome {
    pub visited: BTreeSet<String>,
    pub found_files: BTreeSet<String>,
}

// Knobs that apply to every crawl a Crawler runs
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub page_timeout: Duration,
    pub probe: ProbeOptions,
    pub validation: ValidationMode,
    /// When false, the mode's pre-fetch pause is skipped.
    pub honor_delays: bool,
    pub proxies: ProxyPools,
    /// Fixes user-agent, proxy and delay sampling for reproducible runs.
    pub rng_seed: Option<u64>,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            page_timeout: PAGE_TIMEOUT,
            probe: ProbeOptions::default(),
            validation: ValidationMode::HeadThenGet,
            honor_delays: true,
            proxies: ProxyPools::default(),
            rng_seed: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Crawler {
    settings: CrawlSettings,
}

impl Crawler {
    pub fn new(settings: CrawlSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &CrawlSettings {
        &self.settings
    }

    /// Runs one crawl to completion.
    ///
    /// Individual pages and files that fail are left out of the outcome.
    /// Only bad input or failing to build the HTTP client is an error.
    #[instrument(skip(self, request), fields(seed = %request.seed_url, mode = %request.mode))]
    pub async fn crawl(&self, request: CrawlRequest) -> Result<CrawlOutcome, CrawlError> {
        let context = CrawlContext::new(&request.seed_url, request.max_depth, &request.file_types)?;
        let mut shaper = self.shaper_for(request.mode);
        let client = self.build_client(&shaper)?;

        if context.filter.is_empty() {
            warn!("no file types given, nothing will be collected");
        }

        // The proxy URL may carry credentials, so only its presence is logged
        info!(
            mode = %shaper.mode(),
            proxied = shaper.proxy().is_some(),
            "request shaping ready"
        );

        let prior_visited = normalize_visited(request.prior_visited);
        let traversal = traverse(&client, &mut shaper, &context, prior_visited).await;

        info!(
            pages = traversal.visited.len(),
            candidates = traversal.candidates.len(),
            "traversal finished"
        );

        let found_files = match self.settings.validation {
            ValidationMode::HeadThenGet => {
                validate_candidates(&client, &mut shaper, traversal.candidates, &self.settings.probe)
                    .await
            }
            ValidationMode::Skip => traversal.candidates.into_iter().collect(),
        };

        info!(files = found_files.len(), "crawl finished");

        Ok(CrawlOutcome {
            visited: traversal.visited.into_iter().collect(),
            found_files,
        })
    }

    /// Builds the request shaper for one crawl, drawing its proxy.
    pub fn shaper_for(&self, mode: CrawlMode) -> RequestShaper {
        let policy = ModePolicy::for_mode(mode, &self.settings.proxies);
        let shaper = match self.settings.rng_seed {
            Some(seed) => RequestShaper::new(policy, StdRng::seed_from_u64(seed)),
            None => RequestShaper::from_entropy(policy),
        };

        if self.settings.honor_delays {
            shaper
        } else {
            shaper.without_delays()
        }
    }

    /// Builds the HTTP client shared by traversal and validation.
    ///
    /// The proxy is baked into the client, which is what keeps it fixed for
    /// the whole crawl.
    pub fn build_client(&self, shaper: &RequestShaper) -> Result<Client, CrawlError> {
        let mut builder = Client::builder()
            .timeout(self.settings.page_timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS));

        if let Some(proxy) = shaper.proxy() {
            let proxy_config =
                reqwest::Proxy::all(proxy).map_err(|source| CrawlError::InvalidProxy {
                    proxy: proxy.to_string(),
                    source,
                })?;
            builder = builder.proxy(proxy_config);
        }

        Ok(builder.build()?)
    }
}

// Crawls with default settings
//
// This is what an embedding API handler would call once per request.
pub async fn crawl(request: CrawlRequest) -> Result<CrawlOutcome, CrawlError> {
    Crawler::default().crawl(request).await
}

// Puts caller-supplied visited URLs in the same form traversal stores them,
// so "https://ex.com" from an earlier run matches "https://ex.com/".
fn normalize_visited(prior: Vec<String>) -> HashSet<String> {
    prior
        .into_iter()
        .map(|raw| match Url::parse(raw.trim()) {
            Ok(url) => url.to_string(),
            Err(_) => raw,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn quiet_crawler() -> Crawler {
        Crawler::new(CrawlSettings {
            honor_delays: false,
            rng_seed: Some(1),
            ..CrawlSettings::default()
        })
    }

    async fn serve(server: &MockServer, verb: &str, route: &str, response: ResponseTemplate) {
        Mock::given(method(verb))
            .and(path(route))
            .respond_with(response)
            .mount(server)
            .await;
    }

    fn html(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/html")
            .set_body_string(body)
    }

    async fn site() -> MockServer {
        let server = MockServer::start().await;
        serve(
            &server,
            "GET",
            "/",
            html(
                r#"<a href="/files/live.pdf">live</a>
                   <a href="/files/stale.pdf">stale</a>
                   <a href="/files/nohead.pdf?token=abc">no HEAD</a>
                   <a href="/about">about</a>"#,
            ),
        )
        .await;
        serve(&server, "GET", "/about", html(r#"<img src="/files/team.PDF">"#)).await;

        serve(&server, "HEAD", "/files/live.pdf", ResponseTemplate::new(200)).await;
        serve(&server, "HEAD", "/files/team.PDF", ResponseTemplate::new(200)).await;
        serve(&server, "HEAD", "/files/stale.pdf", ResponseTemplate::new(404)).await;
        serve(&server, "HEAD", "/files/nohead.pdf", ResponseTemplate::new(405)).await;
        serve(&server, "GET", "/files/nohead.pdf", ResponseTemplate::new(200)).await;
        server
    }

    #[tokio::test]
    async fn test_crawl_reports_only_live_files() {
        let server = site().await;
        let base = server.uri();

        let request = CrawlRequest::new(format!("{base}/"), 2, vec!["pdf".into()]);
        let outcome = quiet_crawler().crawl(request).await.unwrap();

        let expected_files: BTreeSet<String> = [
            format!("{base}/files/live.pdf"),
            format!("{base}/files/nohead.pdf?token=abc"),
            format!("{base}/files/team.PDF"),
        ]
        .into_iter()
        .collect();
        assert_eq!(outcome.found_files, expected_files);

        let expected_pages: BTreeSet<String> =
            [format!("{base}/"), format!("{base}/about")].into_iter().collect();
        assert_eq!(outcome.visited, expected_pages);
    }

    #[tokio::test]
    async fn test_skip_validation_keeps_every_candidate() {
        let server = site().await;
        let crawler = Crawler::new(CrawlSettings {
            validation: ValidationMode::Skip,
            ..quiet_crawler().settings().clone()
        });

        let request = CrawlRequest::new(format!("{}/", server.uri()), 2, vec!["pdf".into()]);
        let outcome = crawler.crawl(request).await.unwrap();
        assert_eq!(outcome.found_files.len(), 4);
    }

    #[tokio::test]
    async fn test_recrawl_with_previous_visited_fetches_nothing() {
        let server = site().await;
        let crawler = quiet_crawler();
        let request = CrawlRequest::new(format!("{}/", server.uri()), 2, vec!["pdf".into()]);

        let first = crawler.crawl(request.clone()).await.unwrap();
        let pages_before = page_fetches(&server).await;

        let again = CrawlRequest {
            prior_visited: first.visited.iter().cloned().collect(),
            ..request
        };
        let second = crawler.crawl(again).await.unwrap();

        assert_eq!(page_fetches(&server).await, pages_before);
        assert!(second.visited.is_superset(&first.visited));
        assert!(second.found_files.is_empty());
    }

    async fn page_fetches(server: &MockServer) -> usize {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.method.as_str() == "GET" && !r.url.path().starts_with("/files/"))
            .count()
    }

    #[tokio::test]
    async fn test_invalid_proxy_is_an_error() {
        let crawler = Crawler::new(CrawlSettings {
            proxies: ProxyPools {
                stealth: vec!["not a proxy url".into()],
                residential: Vec::new(),
            },
            ..quiet_crawler().settings().clone()
        });

        let request = CrawlRequest {
            mode: CrawlMode::Stealth,
            ..CrawlRequest::new("https://ex.com/", 1, vec!["pdf".into()])
        };
        let result = crawler.crawl(request).await;
        assert!(matches!(result, Err(CrawlError::InvalidProxy { .. })));
    }

    #[tokio::test]
    async fn test_no_file_types_still_crawls_but_collects_nothing() {
        let server = site().await;
        let request = CrawlRequest::new(format!("{}/", server.uri()), 2, Vec::new());

        let base = server.uri();
        let outcome = quiet_crawler().crawl(request).await.unwrap();
        assert!(outcome.found_files.is_empty());
        assert!(outcome.visited.contains(&format!("{base}/about")));
        // Without an allow-list the .pdf anchors are ordinary pages
        assert!(outcome.visited.contains(&format!("{base}/files/live.pdf")));
    }

    #[test]
    fn test_shaper_follows_requested_mode() {
        let crawler = quiet_crawler();
        for mode in [CrawlMode::Standard, CrawlMode::Stealth, CrawlMode::Residential] {
            let shaper = crawler.shaper_for(mode);
            assert_eq!(shaper.mode(), mode);
            assert!(shaper.proxy().is_none());
        }
    }

    #[tokio::test]
    async fn test_zero_depth_is_rejected() {
        let request = CrawlRequest::new("https://ex.com/", 0, vec!["pdf".into()]);
        assert!(matches!(quiet_crawler().crawl(request).await, Err(CrawlError::InvalidDepth)));
    }

    #[test]
    fn test_normalize_visited() {
        let normalized = normalize_visited(vec![
            "https://ex.com".to_string(),
            "HTTPS://EX.COM/Docs".to_string(),
            "not-a-url".to_string(),
        ]);
        assert!(normalized.contains("https://ex.com/"));
        assert!(normalized.contains("https://ex.com/Docs"));
        assert!(normalized.contains("not-a-url"));
    }

    #[test]
    fn test_request_and_outcome_json_shape() {
        let request: CrawlRequest = serde_json::from_str(
            r#"{"seedUrl": "https://ex.com/", "maxDepth": 2, "fileTypes": ["pdf"]}"#,
        )
        .unwrap();
        assert_eq!(request.mode, CrawlMode::Standard);
        assert!(request.prior_visited.is_empty());

        let outcome = CrawlOutcome {
            visited: ["https://ex.com/".to_string()].into_iter().collect(),
            found_files: BTreeSet::new(),
        };
        assert_eq!(
            serde_json::to_string(&outcome).unwrap(),
            r#"{"visited":["https://ex.com/"],"foundFiles":[]}"#
        );
    }
}
