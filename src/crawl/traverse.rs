// src/crawl/traverse.rs
// =============================================================================
// This module walks a website depth-first, collecting visited pages and
// candidate file links.
//
// How it works:
// 1. Start with the seed URL on a stack at depth 0
// 2. Pop a page; skip it if already visited or deeper than max_depth
// 3. Mark it visited *before* fetching, so no page is fetched twice
// 4. Pause for the mode's delay, then fetch the page
// 5. Record every reference whose path matches the extension allow-list
// 6. If there is depth left, push same-site anchors at depth + 1
// 7. Repeat until the stack is empty
//
// A page that fails to load (DNS, TLS, timeout, HTTP >= 400) is dropped
// quietly: it stays in the visited set but adds nothing else.
//
// An explicit stack replaces recursion so that a deep or cyclic link graph
// can't overflow the call stack. There is only ever one request in flight.
// =============================================================================

use std::collections::HashSet;

use anyhow::{anyhow, Result};
use reqwest::header::USER_AGENT;
use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

use super::links::{extract_page_links, same_site, ExtensionFilter};
use crate::error::CrawlError;
use crate::stealth::RequestShaper;

// Read-only inputs for one crawl
#[derive(Debug, Clone)]
pub struct CrawlContext {
    pub seed: Url,
    pub max_depth: usize,
    pub filter: ExtensionFilter,
}

impl CrawlContext {
    /// Validates the seed and depth and normalizes the extension list.
    pub fn new<S: AsRef<str>>(
        seed_url: &str,
        max_depth: usize,
        file_types: &[S],
    ) -> Result<Self, CrawlError> {
        let seed = Url::parse(seed_url.trim()).map_err(|source| CrawlError::InvalidSeed {
            url: seed_url.to_string(),
            source,
        })?;

        if !matches!(seed.scheme(), "http" | "https") {
            return Err(CrawlError::UnsupportedScheme {
                url: seed_url.to_string(),
            });
        }
        if seed.host_str().is_none() {
            return Err(CrawlError::MissingHost {
                url: seed_url.to_string(),
            });
        }
        if max_depth == 0 {
            return Err(CrawlError::InvalidDepth);
        }

        Ok(Self {
            seed,
            max_depth,
            filter: ExtensionFilter::new(file_types),
        })
    }
}

// What a traversal produced: every page it attempted plus every file link
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Traversal {
    pub visited: HashSet<String>,
    pub candidates: HashSet<String>,
}

// A page waiting on the stack
#[derive(Debug, Clone)]
struct CrawlItem {
    url: Url,
    depth: usize, // link hops from the seed
}

// Walks the site from the seed
//
// Parameters:
//   client: HTTP client for this crawl (timeout, redirects and proxy preset)
//   shaper: picks the user agent and pre-fetch delay for each page
//   context: seed, depth limit and extension allow-list
//   visited: pages already fetched by an earlier crawl; these are not refetched
//
// Example:
//   max_depth=1: the seed and the same-site pages it links to
//   max_depth=2: ... plus the same-site pages those link to
pub async fn traverse(
    client: &Client,
    shaper: &mut RequestShaper,
    context: &CrawlContext,
    visited: HashSet<String>,
) -> Traversal {
    let mut traversal = Traversal {
        visited,
        candidates: HashSet::new(),
    };

    let mut stack = vec![CrawlItem {
        url: context.seed.clone(),
        depth: 0,
    }];

    while let Some(item) = stack.pop() {
        if item.depth > context.max_depth || traversal.visited.contains(item.url.as_str()) {
            continue;
        }
        traversal.visited.insert(item.url.to_string());

        let delay = shaper.next_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        info!(depth = item.depth, url = %item.url, "crawling");

        let (page_url, html) = match fetch_page(client, &item.url, shaper.next_user_agent()).await
        {
            Ok(page) => page,
            Err(e) => {
                warn!(url = %item.url, error = %e, "skipping page");
                continue;
            }
        };

        // Relative links resolve against where we ended up after redirects
        let links = extract_page_links(&html, &page_url);

        for reference in &links.references {
            if context.filter.matches(reference) {
                traversal.candidates.insert(reference.to_string());
            }
        }

        if item.depth >= context.max_depth {
            continue;
        }

        // Pushed in reverse so the first link on the page is explored first
        for anchor in links.anchors.into_iter().rev() {
            if !same_site(&context.seed, &anchor) {
                continue;
            }
            // File links are candidates, not pages to crawl
            if context.filter.matches(&anchor) {
                continue;
            }
            if traversal.visited.contains(anchor.as_str()) {
                debug!(url = %anchor, "already visited");
                continue;
            }
            stack.push(CrawlItem {
                url: anchor,
                depth: item.depth + 1,
            });
        }
    }

    traversal
}

// Fetches a page and returns its final URL (after redirects) and body
async fn fetch_page(client: &Client, url: &Url, user_agent: &str) -> Result<(Url, String)> {
    let response = client
        .get(url.clone())
        .header(USER_AGENT, user_agent)
        .send()
        .await?;

    if response.status().as_u16() >= 400 {
        return Err(anyhow!("HTTP {}", response.status()));
    }

    let final_url = response.url().clone();
    let html = response.text().await?;
    Ok((final_url, html))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stealth::{CrawlMode, ModePolicy, ProxyPools};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn shaper() -> RequestShaper {
        let policy = ModePolicy::for_mode(CrawlMode::Standard, &ProxyPools::default());
        RequestShaper::new(policy, StdRng::seed_from_u64(0)).without_delays()
    }

    fn client() -> Client {
        Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap()
    }

    fn html(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/html")
            .set_body_string(body)
    }

    async fn page(server: &MockServer, route: &str, body: &str, expected_fetches: u64) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(html(body))
            .expect(expected_fetches)
            .mount(server)
            .await;
    }

    async fn run(seed: &str, max_depth: usize, visited: HashSet<String>) -> Traversal {
        let context = CrawlContext::new(seed, max_depth, &["pdf"]).unwrap();
        traverse(&client(), &mut shaper(), &context, visited).await
    }

    fn set(items: &[String]) -> HashSet<String> {
        items.iter().cloned().collect()
    }

    #[tokio::test]
    async fn test_depth_one_scenario() {
        let server = MockServer::start().await;
        let base = server.uri();
        page(
            &server,
            "/",
            r#"<a href="docs/a.pdf">A</a>
               <a href="https://other.com/b.pdf">B</a>
               <a href="/page2">Next</a>"#,
            1,
        )
        .await;
        page(&server, "/page2", r#"<a href="/page3">Deeper</a>"#, 1).await;
        page(&server, "/page3", "", 0).await;
        page(&server, "/docs/a.pdf", "", 0).await;

        let result = run(&format!("{base}/"), 1, HashSet::new()).await;

        assert_eq!(
            result.candidates,
            set(&[format!("{base}/docs/a.pdf"), "https://other.com/b.pdf".to_string()])
        );
        assert_eq!(result.visited, set(&[format!("{base}/"), format!("{base}/page2")]));
    }

    #[tokio::test]
    async fn test_cycles_fetch_each_page_once() {
        let server = MockServer::start().await;
        page(&server, "/", r#"<a href="/a">a</a><a href="/b">b</a><a href="/">home</a>"#, 1).await;
        page(&server, "/a", r#"<a href="/">home</a><a href="/b">b</a><a href="/a">self</a>"#, 1).await;
        page(&server, "/b", r#"<a href="/a">a</a>"#, 1).await;

        let result = run(&format!("{}/", server.uri()), 5, HashSet::new()).await;
        assert_eq!(result.visited.len(), 3);
    }

    #[tokio::test]
    async fn test_never_fetches_past_max_depth() {
        let server = MockServer::start().await;
        page(&server, "/", r#"<a href="/1">1</a>"#, 1).await;
        page(&server, "/1", r#"<a href="/2">2</a>"#, 1).await;
        page(&server, "/2", r#"<a href="/3">3</a><a href="/2.pdf">f</a>"#, 1).await;
        page(&server, "/3", r#"<a href="/4">4</a>"#, 0).await;

        let result = run(&format!("{}/", server.uri()), 2, HashSet::new()).await;
        assert_eq!(result.visited.len(), 3);
        assert!(result.candidates.contains(&format!("{}/2.pdf", server.uri())));
    }

    #[tokio::test]
    async fn test_files_found_on_images_and_scripts() {
        let server = MockServer::start().await;
        page(
            &server,
            "/",
            r#"<img src="/img/Photo.JPG"><script src="lib/app.js"></script>"#,
            1,
        )
        .await;

        let context = CrawlContext::new(&format!("{}/", server.uri()), 1, &["jpg", ".js"]).unwrap();
        let result = traverse(&client(), &mut shaper(), &context, HashSet::new()).await;
        assert_eq!(
            result.candidates,
            set(&[
                format!("{}/img/Photo.JPG", server.uri()),
                format!("{}/lib/app.js", server.uri()),
            ])
        );
    }

    #[tokio::test]
    async fn test_error_pages_contribute_nothing() {
        let server = MockServer::start().await;
        page(&server, "/", r#"<a href="/gone">gone</a>"#, 1).await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404).set_body_string(r#"<a href="/x.pdf">x</a>"#))
            .expect(1)
            .mount(&server)
            .await;

        let result = run(&format!("{}/", server.uri()), 3, HashSet::new()).await;
        assert!(result.visited.contains(&format!("{}/gone", server.uri())));
        assert!(result.candidates.is_empty());
    }

    #[tokio::test]
    async fn test_connection_refused_keeps_url_visited() {
        // Nothing listens on port 1
        let result = run("http://127.0.0.1:1/", 2, HashSet::new()).await;
        assert_eq!(result.visited, set(&["http://127.0.0.1:1/".to_string()]));
        assert!(result.candidates.is_empty());
    }

    #[tokio::test]
    async fn test_prior_visited_pages_are_not_refetched() {
        let server = MockServer::start().await;
        let base = server.uri();
        page(&server, "/", r#"<a href="/old">old</a><a href="/new">new</a>"#, 1).await;
        page(&server, "/old", "", 0).await;
        page(&server, "/new", "", 1).await;

        let prior = set(&[format!("{base}/old")]);
        let result = run(&format!("{base}/"), 1, prior).await;
        assert_eq!(
            result.visited,
            set(&[format!("{base}/"), format!("{base}/old"), format!("{base}/new")])
        );
    }

    #[tokio::test]
    async fn test_other_hosts_are_not_crawled() {
        let server = MockServer::start().await;
        // Same server, but "localhost" is a different host than 127.0.0.1
        let other_host = server.uri().replace("127.0.0.1", "localhost");
        page(&server, "/", &format!(r#"<a href="{other_host}/elsewhere">x</a>"#), 1).await;
        page(&server, "/elsewhere", "", 0).await;

        let result = run(&format!("{}/", server.uri()), 3, HashSet::new()).await;
        assert_eq!(result.visited.len(), 1);
    }

    #[test]
    fn test_context_rejects_bad_input() {
        assert!(matches!(
            CrawlContext::new("not a url", 1, &["pdf"]),
            Err(CrawlError::InvalidSeed { .. })
        ));
        assert!(matches!(
            CrawlContext::new("ftp://ex.com/", 1, &["pdf"]),
            Err(CrawlError::UnsupportedScheme { .. })
        ));
        assert!(matches!(
            CrawlContext::new("https://ex.com/", 0, &["pdf"]),
            Err(CrawlError::InvalidDepth)
        ));
    }
}
