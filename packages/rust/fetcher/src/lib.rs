//! Page fetching for htmlcmd.
//!
//! This crate provides:
//! - [`is_valid_url`] — syntax-only URL validation, checked before any I/O
//! - [`PageFetcher`] — the fetch capability the pipeline depends on
//! - [`FetchSession`] — a scoped HTTP session; the client it owns is released
//!   when the session is dropped

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info, instrument};
use url::Url;

use htmlcmd_shared::{FetcherConfig, HtmlcmdError, Result};

/// Default User-Agent string for fetch requests.
const USER_AGENT: &str = concat!("htmlcmd/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// URL validation
// ---------------------------------------------------------------------------

/// Check that `candidate` is an absolute http(s) URL with a host.
///
/// Pure syntax check. No DNS lookup or network call is made.
pub fn is_valid_url(candidate: &str) -> bool {
    match Url::parse(candidate.trim()) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.host_str().is_some_and(|h| !h.is_empty())
        }
        Err(_) => false,
    }
}

/// Parse `candidate` into a [`Url`], or fail with `InvalidInput` naming the input.
pub fn parse_url(candidate: &str) -> Result<Url> {
    if !is_valid_url(candidate) {
        return Err(HtmlcmdError::invalid_input(format!(
            "invalid URL: {candidate}"
        )));
    }
    Url::parse(candidate.trim())
        .map_err(|e| HtmlcmdError::invalid_input(format!("invalid URL: {candidate} ({e})")))
}

// ---------------------------------------------------------------------------
// Fetcher trait
// ---------------------------------------------------------------------------

/// HTML retrieved for a URL.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Response body.
    pub html: String,
    /// URL after redirects; used as the base for resolving relative links.
    pub final_url: Url,
    /// HTTP status code of the final response.
    pub status: u16,
}

/// Capability to retrieve the HTML of a page.
#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url`, returning its HTML and final URL.
    ///
    /// Fails with `InvalidInput` for a malformed URL (before any I/O) and with
    /// `Fetch` when the host is unreachable, the request times out, or the
    /// response status is not a success.
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

// ---------------------------------------------------------------------------
// FetchSession
// ---------------------------------------------------------------------------

/// A scoped HTTP fetch session.
///
/// Open one per conversion request. The underlying client (and its connection
/// pool) lives exactly as long as the session value; dropping it, whether on
/// success, an early `?` return, or unwinding, releases it.
pub struct FetchSession {
    client: Client,
    headless: bool,
}

impl FetchSession {
    /// Acquire a session configured by `config`.
    pub fn open(config: &FetcherConfig) -> Result<Self> {
        let user_agent = config.user_agent.as_deref().unwrap_or(USER_AGENT);

        let client = Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| HtmlcmdError::Fetch(format!("failed to build HTTP client: {e}")))?;

        info!(
            headless = config.headless,
            timeout_secs = config.timeout_secs,
            "fetch session opened"
        );

        Ok(Self {
            client,
            headless: config.headless,
        })
    }

    /// Whether the session was opened headless.
    pub fn headless(&self) -> bool {
        self.headless
    }
}

impl Drop for FetchSession {
    fn drop(&mut self) {
        debug!("fetch session released");
    }
}

#[async_trait::async_trait]
impl PageFetcher for FetchSession {
    #[instrument(skip(self), fields(headless = self.headless))]
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let url = parse_url(url)?;

        debug!(%url, "fetching page");

        let response = self.client.get(url.as_str()).send().await.map_err(|e| {
            if e.is_timeout() {
                HtmlcmdError::Fetch(format!("{url}: request timed out"))
            } else {
                HtmlcmdError::Fetch(format!("{url}: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HtmlcmdError::Fetch(format!("{url}: HTTP {status}")));
        }

        let final_url = response.url().clone();
        let html = response
            .text()
            .await
            .map_err(|e| HtmlcmdError::Fetch(format!("{url}: body read failed: {e}")))?;

        info!(
            %final_url,
            status = status.as_u16(),
            bytes = html.len(),
            "page fetched"
        );

        Ok(FetchedPage {
            html,
            final_url,
            status: status.as_u16(),
        })
    }
}
