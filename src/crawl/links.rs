// src/crawl/links.rs
// =============================================================================
// This module pulls links out of a fetched page.
//
// Two kinds of links matter to the crawler:
// - references: every href/src on <a>, <img>, <script> and <link> elements.
//   These are checked against the file-extension allow-list.
// - anchors: the href of every <a> element. These are the pages we may
//   recurse into.
//
// We use the `scraper` crate to parse HTML and the `url` crate to resolve
// relative references against the page they were found on.
// =============================================================================

use scraper::{Html, Selector};
use url::Url;

// Links found on one page, already resolved to absolute http(s) URLs
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PageLinks {
    pub references: Vec<Url>,
    pub anchors: Vec<Url>,
}

// Extracts references and anchors from HTML content
//
// Parameters:
//   html: the page body
//   page_url: the URL the page was fetched from (base for relative links)
//
// Example:
//   html = "<a href='docs/a.pdf'>A</a><img src='/logo.png'>"
//   page_url = "https://ex.com/"
//   references = [https://ex.com/docs/a.pdf, https://ex.com/logo.png]
//   anchors = [https://ex.com/docs/a.pdf]
pub fn extract_page_links(html: &str, page_url: &Url) -> PageLinks {
    let document = Html::parse_document(html);

    // Both selectors are constants and known to be valid
    let reference_selector =
        Selector::parse("a, img, script, link").expect("reference selector is valid");
    let anchor_selector = Selector::parse("a[href]").expect("anchor selector is valid");

    let references = document
        .select(&reference_selector)
        .filter_map(|element| {
            let element = element.value();
            element.attr("href").or_else(|| element.attr("src"))
        })
        .filter_map(|raw| resolve_reference(page_url, raw))
        .collect();

    let anchors = document
        .select(&anchor_selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|raw| resolve_reference(page_url, raw))
        .collect();

    PageLinks { references, anchors }
}

// Resolves a raw href/src against the page URL
//
// Returns None for anything we can't or shouldn't follow:
//   "" and "#section" (the page itself)
//   "mailto:", "tel:", "javascript:", "data:" (not http)
//   "http://[bad" (malformed)
//
// Everything else follows normal URL resolution, so "//cdn.ex.com/x.js"
// picks up the page's scheme and "../a.pdf" walks up the path.
pub fn resolve_reference(base: &Url, raw: &str) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with('#') {
        return None;
    }

    let url = base.join(raw).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

// True when both URLs name the same host and the same explicit port
//
// Only the host[:port] part is compared, so the scheme may differ:
// "http://ex.com/x" is on the same site as "https://ex.com/". The url crate
// drops a port equal to its scheme's default, so "https://ex.com:443" has no
// explicit port either, while "https://ex.com:8443" does.
pub fn same_site(a: &Url, b: &Url) -> bool {
    a.host_str().is_some() && a.host_str() == b.host_str() && a.port() == b.port()
}

// Case-insensitive file-extension allow-list
//
// Only the URL path is compared, so "/a/B.PDF?x=1#frag" matches "pdf".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionFilter {
    // Stored as ".pdf", ".zip", ... so a path like "/pdf" never matches
    suffixes: Vec<String>,
}

impl ExtensionFilter {
    /// Accepts entries with or without a leading dot, in any case.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut suffixes: Vec<String> = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .map(|ext| format!(".{ext}"))
            .collect();
        suffixes.sort();
        suffixes.dedup();

        Self { suffixes }
    }

    pub fn is_empty(&self) -> bool {
        self.suffixes.is_empty()
    }

    pub fn matches(&self, url: &Url) -> bool {
        let path = url.path().to_lowercase();
        self.suffixes.iter().any(|suffix| path.ends_with(suffix.as_str()))
    }
}
