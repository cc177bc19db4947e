// src/checker/http.rs
// =============================================================================
// This module checks whether file URLs are actually retrievable.
//
// Key functionality:
// - Sends an HTTP HEAD request first (lightweight, no body download)
// - Falls back to one GET if the server rejects HEAD (403 or 405)
// - Classifies failures (404, timeout, SSL errors, DNS errors, etc.)
// - Runs probes concurrently with a fixed cap on in-flight requests
//
// Each probe is a small state machine:
//
//   Pending -> HeadSent -> Finished              (HEAD answered)
//                       -> RetryAsGet -> Finished (HEAD rejected)
//
// A URL is live when the final status is below 400. Failures are never
// errors: the URL is just left out of the confirmed set.
// =============================================================================

use std::collections::BTreeSet;
use std::error::Error as _;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use reqwest::header::{LOCATION, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::stealth::RequestShaper;

/// Per-request timeout for a liveness probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Probes in flight at once.
pub const PROBE_CONCURRENCY: usize = 12;

// Whether a crawl validates its candidates at all
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// HEAD each candidate, GET when HEAD is rejected
    #[default]
    HeadThenGet,
    /// Report every candidate unchecked
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOptions {
    pub timeout: Duration,
    pub concurrency: usize,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            timeout: PROBE_TIMEOUT,
            concurrency: PROBE_CONCURRENCY,
        }
    }
}

// Represents the status of a link after checking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "target", rename_all = "snake_case")]
pub enum LinkStatus {
    /// Link is working (2xx)
    Ok,
    /// Final response was a redirect we could not follow further
    Redirect(String), // Holds the redirect target URL
    /// Link is broken (404, 410)
    Broken,
    /// Server refused access even to a GET (401, 403, 405)
    Forbidden,
    /// Request timed out
    Timeout,
    /// SSL/TLS certificate error
    SslError,
    /// Too many redirects (redirect loop)
    TooManyRedirects,
    /// Could not resolve hostname
    DnsError,
    /// Other error (5xx, connection refused, ...)
    Error,
}

// Represents the result of checking a single link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkCheckResult {
    /// The URL that was checked
    pub url: String,
    /// The status of the link
    #[serde(flatten)]
    pub status: LinkStatus,
    /// Final HTTP status code, when the server answered at all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    /// True when HEAD was rejected and the answer came from a GET
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub via_get_fallback: bool,
    /// Optional message with more details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl LinkCheckResult {
    /// A link is live when the server answered below 400.
    pub fn is_live(&self) -> bool {
        matches!(self.status, LinkStatus::Ok | LinkStatus::Redirect(_))
    }
}

// Probe progress for one URL
enum ProbeState {
    Pending,
    HeadSent(Result<Response, reqwest::Error>),
    RetryAsGet,
    Finished(LinkCheckResult),
}

// Confirms which candidates are live
//
// Every candidate is probed; the returned set holds only the ones that
// answered below 400. Order of completion doesn't matter, the result is a set.
pub async fn validate_candidates<I>(
    client: &Client,
    shaper: &mut RequestShaper,
    candidates: I,
    options: &ProbeOptions,
) -> BTreeSet<String>
where
    I: IntoIterator<Item = String>,
{
    check_links(client, shaper, candidates, options)
        .await
        .into_iter()
        .filter_map(|result| {
            if result.is_live() {
                Some(result.url)
            } else {
                debug!(url = %result.url, status = ?result.status, "dropping dead file link");
                None
            }
        })
        .collect()
}

// Probes many links concurrently and reports every result
//
// At most `options.concurrency` probes are in flight; results come back in
// completion order, not input order.
pub async fn check_links<I>(
    client: &Client,
    shaper: &mut RequestShaper,
    urls: I,
    options: &ProbeOptions,
) -> Vec<LinkCheckResult>
where
    I: IntoIterator<Item = String>,
{
    let timeout = options.timeout;

    // The user agent is drawn here, one per probe, because the shaper's rng
    // can't be shared across the concurrent probes
    let probes = urls.into_iter().map(|url| {
        let user_agent = shaper.next_user_agent();
        async move { probe(client, url, user_agent, timeout).await }
    });

    stream::iter(probes)
        .buffer_unordered(options.concurrency.max(1))
        .collect()
        .await
}

// Runs the HEAD-then-GET state machine for one URL
pub async fn probe(
    client: &Client,
    url: String,
    user_agent: &str,
    timeout: Duration,
) -> LinkCheckResult {
    let shape = |request: RequestBuilder| request.header(USER_AGENT, user_agent).timeout(timeout);

    let mut state = ProbeState::Pending;
    loop {
        state = match state {
            ProbeState::Pending => ProbeState::HeadSent(shape(client.head(&url)).send().await),
            ProbeState::HeadSent(Ok(response)) if is_method_rejected(response.status()) => {
                debug!(url = %url, status = response.status().as_u16(), "HEAD rejected, retrying as GET");
                ProbeState::RetryAsGet
            }
            ProbeState::HeadSent(outcome) => ProbeState::Finished(conclude(url.clone(), outcome, false)),
            ProbeState::RetryAsGet => {
                // Only the status line matters; dropping the response skips the body
                let outcome = shape(client.get(&url)).send().await;
                ProbeState::Finished(conclude(url.clone(), outcome, true))
            }
            ProbeState::Finished(result) => return result,
        };
    }
}

// Some servers answer HEAD with 403/405 even though GET works
fn is_method_rejected(status: StatusCode) -> bool {
    matches!(status, StatusCode::FORBIDDEN | StatusCode::METHOD_NOT_ALLOWED)
}

fn conclude(
    url: String,
    outcome: Result<Response, reqwest::Error>,
    via_get_fallback: bool,
) -> LinkCheckResult {
    let mut result = match outcome {
        Ok(response) => analyze_response(url, &response),
        Err(e) => categorize_error(url, &e),
    };
    result.via_get_fallback = via_get_fallback;
    result
}

// Analyzes an HTTP response to determine link status
//
// HTTP status codes:
// - 200-299: Success
// - 300-399: Redirect (only seen when there's nowhere left to follow)
// - 400-499: Client error (404 not found, etc.)
// - 500-599: Server error
fn analyze_response(url: String, response: &Response) -> LinkCheckResult {
    let status_code = response.status();
    let code = status_code.as_u16();

    let (status, message) = if status_code.is_success() {
        (LinkStatus::Ok, format!("HTTP {code}"))
    } else if status_code.is_redirection() {
        let redirect_target = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        let message = format!("HTTP {code} -> {redirect_target}");
        (LinkStatus::Redirect(redirect_target), message)
    } else if matches!(status_code, StatusCode::NOT_FOUND | StatusCode::GONE) {
        (LinkStatus::Broken, format!("HTTP {code}"))
    } else if matches!(
        status_code,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::METHOD_NOT_ALLOWED
    ) {
        (LinkStatus::Forbidden, format!("HTTP {code}"))
    } else {
        (LinkStatus::Error, format!("HTTP {code}"))
    };

    LinkCheckResult {
        url,
        status,
        http_status: Some(code),
        via_get_fallback: false,
        message: Some(message),
    }
}

// Categorizes transport errors from reqwest
//
// reqwest's top-level message is generic ("error sending request"), so the
// whole source chain is searched for DNS and certificate hints.
fn categorize_error(url: String, error: &reqwest::Error) -> LinkCheckResult {
    let mut detail = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        detail.push_str(": ");
        detail.push_str(&cause.to_string());
        source = cause.source();
    }
    let lowered = detail.to_lowercase();

    let (status, message) = if error.is_timeout() {
        (LinkStatus::Timeout, "Request timed out".to_string())
    } else if error.is_redirect() {
        (LinkStatus::TooManyRedirects, "Too many redirects".to_string())
    } else if lowered.contains("dns") || lowered.contains("failed to lookup address") {
        (LinkStatus::DnsError, "Could not resolve hostname".to_string())
    } else if lowered.contains("certificate") || lowered.contains("tls") || lowered.contains("ssl") {
        (LinkStatus::SslError, "SSL certificate error".to_string())
    } else if error.is_connect() {
        (LinkStatus::Error, "Connection failed".to_string())
    } else {
        (LinkStatus::Error, detail)
    };

    LinkCheckResult {
        url,
        status,
        http_status: None,
        via_get_fallback: false,
        message: Some(message),
    }
}
