//! GitHub search API client
//!
//! Minimal client for the repository search endpoint. Every request is charged
//! against the shared [`QuotaGuard`] before it leaves the process, and every
//! response is classified into a [`SearchResponse`] or an [`ApiError`]. Nothing
//! here retries; deciding what to do about a failure is the caller's job.

use super::DiscoverySource;
use crate::crawl::clock::Clock;
use crate::crawl::quota::{QuotaExceeded, QuotaGuard};
use chrono::{DateTime, Utc};
use core::fmt::{Display, Formatter};
use core::time::Duration;
use ohno::IntoAppError;
use rand::seq::IndexedRandom;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

const LOG_TARGET: &str = "    search";

/// Production endpoint
pub const GITHUB_API_URL: &str = "https://api.github.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Browser identities rotated across requests.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.1 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/92.0.4515.107 Safari/537.36",
];

/// A repository search: the textual query plus sort hints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub text: String,
    pub sort: &'static str,
    pub order: &'static str,
}

impl SearchQuery {
    /// A query sorted by most recently updated first.
    #[must_use]
    pub fn recently_updated(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sort: "updated",
            order: "desc",
        }
    }
}

/// Pagination for one search call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub page: Option<u32>,
    pub per_page: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub total_count: Option<u64>,
    pub items: Vec<RepositorySummary>,
}

/// The fields of a search hit that the crawl keeps.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositorySummary {
    pub full_name: String,
    pub html_url: String,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Classified failure of a search call.
#[derive(Debug)]
pub enum ApiError {
    /// The local request budget refused the call; nothing was sent
    QuotaExceeded(QuotaExceeded),

    /// The server reported an exhausted rate limit
    RateLimited { reset_at: DateTime<Utc> },

    /// 404
    NotFound,

    /// 451, withheld for legal reasons
    Unavailable,

    /// Any other unsuccessful status
    Http { status: u16 },

    /// The request or the response body could not be transferred
    Transport(ohno::AppError),

    /// The response body was not the expected JSON
    Malformed(ohno::AppError),
}

impl ApiError {
    /// Whether this error ends all further API use for the current run.
    #[must_use]
    pub const fn is_hard_stop(&self) -> bool {
        matches!(self, Self::QuotaExceeded(_) | Self::RateLimited { .. })
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::QuotaExceeded(e) => write!(f, "{e}"),
            Self::RateLimited { reset_at } => write!(f, "rate limited until {}", reset_at.to_rfc3339()),
            Self::NotFound => f.write_str("resource not found"),
            Self::Unavailable => f.write_str("resource unavailable for legal reasons"),
            Self::Http { status } => write!(f, "unexpected HTTP status {status}"),
            Self::Transport(e) => write!(f, "transport error: {e:#}"),
            Self::Malformed(e) => write!(f, "malformed response: {e:#}"),
        }
    }
}

impl core::error::Error for ApiError {}

/// Rate limit information from response headers
#[derive(Debug, Clone, Copy)]
pub struct RateLimitInfo {
    pub remaining: usize,
    pub reset_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
#[expect(clippy::struct_field_names, reason = "client field stores the underlying HTTP client")]
pub struct Client {
    client: reqwest::Client,
    base_url: String,
    quota: Arc<QuotaGuard>,
    clock: Arc<dyn Clock>,
}

impl Client {
    /// Create a search client with an optional token, charging requests to `quota`.
    pub fn new(token: Option<&str>, base_url: impl Into<String>, quota: Arc<QuotaGuard>, clock: Arc<dyn Clock>) -> crate::Result<Self> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github.v3+json"));

        if let Some(t) = token {
            let mut auth_val = HeaderValue::from_str(&format!("token {t}")).into_app_err("invalid characters in API token")?;
            auth_val.set_sensitive(true);
            let _ = headers.insert(AUTHORIZATION, auth_val);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .into_app_err("building HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            quota,
            clock,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn search_url(&self, query: &SearchQuery, page: PageParams) -> crate::Result<Url> {
        let raw = format!("{}/search/repositories", self.base_url.trim_end_matches('/'));
        let mut url = Url::parse(&raw).into_app_err_with(|| format!("invalid API base URL '{}'", self.base_url))?;

        {
            let mut pairs = url.query_pairs_mut();
            let _ = pairs
                .append_pair("q", &query.text)
                .append_pair("sort", query.sort)
                .append_pair("order", query.order)
                .append_pair("per_page", &page.per_page.to_string());
            if let Some(p) = page.page {
                let _ = pairs.append_pair("page", &p.to_string());
            }
        }

        Ok(url)
    }

    /// Run one repository search.
    pub async fn search_repositories(&self, query: &SearchQuery, page: PageParams) -> Result<SearchResponse, ApiError> {
        self.quota.consume().map_err(ApiError::QuotaExceeded)?;

        let url = self.search_url(query, page).map_err(ApiError::Transport)?;
        log::debug!(target: LOG_TARGET, "GET {url}");

        let resp = self
            .client
            .get(url.clone())
            .header(USER_AGENT, pick_user_agent())
            .send()
            .await
            .map_err(|e| {
                log::warn!(target: LOG_TARGET, "Request error for {url}: {e}");
                ApiError::Transport(ohno::AppError::from(e))
            })?;

        let status = resp.status();
        let rate_limit = extract_rate_limit_from_headers(resp.headers());

        if status.is_success() {
            let body = resp.bytes().await.map_err(|e| ApiError::Transport(ohno::AppError::from(e)))?;
            return serde_json::from_slice::<SearchResponse>(&body).map_err(|e| {
                log::warn!(target: LOG_TARGET, "JSON decode error for {url}: {e}");
                ApiError::Malformed(ohno::AppError::from(e))
            });
        }

        Err(self.classify_failure(status, rate_limit, &url))
    }

    fn classify_failure(&self, status: StatusCode, rate_limit: Option<RateLimitInfo>, url: &Url) -> ApiError {
        match status.as_u16() {
            403 | 429 => {
                let reset_at = match rate_limit {
                    Some(info) if info.remaining == 0 => Some(info.reset_at),
                    // 429 without headers is still throttling; assume the usual hourly window
                    None if status == StatusCode::TOO_MANY_REQUESTS => Some(self.clock.now() + chrono::Duration::hours(1)),
                    _ => None,
                };

                if let Some(reset_at) = reset_at {
                    let wait = (reset_at - self.clock.now()).num_seconds().max(0);
                    log::error!(target: LOG_TARGET, "Rate limit exceeded, resets in {:.1} minutes", wait as f64 / 60.0);
                    ApiError::RateLimited { reset_at }
                } else {
                    log::warn!(target: LOG_TARGET, "HTTP {status} for {url}");
                    ApiError::Http { status: status.as_u16() }
                }
            }
            404 => {
                log::warn!(target: LOG_TARGET, "Resource not found: {url}");
                ApiError::NotFound
            }
            451 => {
                log::warn!(target: LOG_TARGET, "Resource unavailable for legal reasons (451): {url}");
                ApiError::Unavailable
            }
            code => {
                log::warn!(target: LOG_TARGET, "HTTP {status} for {url}");
                ApiError::Http { status: code }
            }
        }
    }
}

impl DiscoverySource for Client {
    async fn search(&self, query: &SearchQuery, page: PageParams) -> Result<SearchResponse, ApiError> {
        self.search_repositories(query, page).await
    }
}

fn pick_user_agent() -> &'static str {
    USER_AGENTS.choose(&mut rand::rng()).copied().unwrap_or("import-census")
}

/// Extract rate limit information from API response headers
fn extract_rate_limit_from_headers(headers: &HeaderMap) -> Option<RateLimitInfo> {
    let remaining = headers.get("x-ratelimit-remaining")?.to_str().ok()?.parse::<usize>().ok()?;

    let reset_timestamp = headers.get("x-ratelimit-reset")?.to_str().ok()?.parse::<i64>().ok()?;

    let reset_at = DateTime::from_timestamp(reset_timestamp, 0)?;

    Some(RateLimitInfo { remaining, reset_at })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawl::clock::SystemClock;

    fn client(base_url: &str) -> Client {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let quota = Arc::new(QuotaGuard::new(10, Duration::from_secs(3600), Arc::clone(&clock)));
        Client::new(None, base_url, quota, clock).unwrap()
    }

    #[test]
    fn test_search_url_includes_all_parameters() {
        let client = client("https://api.github.com/");
        let url = client
            .search_url(
                &SearchQuery::recently_updated("language:python stars:>=5"),
                PageParams { page: Some(3), per_page: 100 },
            )
            .unwrap();

        assert_eq!(url.path(), "/search/repositories");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            [
                ("q".to_string(), "language:python stars:>=5".to_string()),
                ("sort".to_string(), "updated".to_string()),
                ("order".to_string(), "desc".to_string()),
                ("per_page".to_string(), "100".to_string()),
                ("page".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn test_search_url_without_page() {
        let client = client("https://api.github.com");
        let url = client
            .search_url(&SearchQuery::recently_updated("x"), PageParams { page: None, per_page: 10 })
            .unwrap();
        assert!(!url.query_pairs().any(|(k, _)| k == "page"));
    }

    #[test]
    fn test_client_new_with_token() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let quota = Arc::new(QuotaGuard::new(10, Duration::from_secs(3600), Arc::clone(&clock)));
        let client = Client::new(Some("test_token"), GITHUB_API_URL, quota, clock).unwrap();
        assert_eq!(client.base_url(), GITHUB_API_URL);
    }

    #[test]
    fn test_search_response_deserialize() {
        let json = r#"{
            "total_count": 2,
            "incomplete_results": false,
            "items": [
                {"full_name": "a/b", "html_url": "https://github.com/a/b", "updated_at": "2024-01-01T00:00:00Z", "stargazers_count": 5},
                {"full_name": "c/d", "html_url": "https://github.com/c/d"}
            ]
        }"#;

        let resp: SearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.total_count, Some(2));
        assert_eq!(resp.items.len(), 2);
        assert_eq!(resp.items[0].updated_at.unwrap().timestamp(), 1_704_067_200);
        assert!(resp.items[1].updated_at.is_none());
    }

    #[test]
    fn test_extract_rate_limit_from_headers() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        let _ = headers.insert("x-ratelimit-reset", HeaderValue::from_static("1704067200"));

        let rate_limit = extract_rate_limit_from_headers(&headers).unwrap();
        assert_eq!(rate_limit.remaining, 0);
        assert_eq!(rate_limit.reset_at.timestamp(), 1_704_067_200);
    }

    #[test]
    fn test_extract_rate_limit_missing_or_invalid() {
        assert!(extract_rate_limit_from_headers(&HeaderMap::new()).is_none());

        let mut headers = HeaderMap::new();
        let _ = headers.insert("x-ratelimit-remaining", HeaderValue::from_static("many"));
        let _ = headers.insert("x-ratelimit-reset", HeaderValue::from_static("1704067200"));
        assert!(extract_rate_limit_from_headers(&headers).is_none());
    }

    #[test]
    fn test_hard_stop_classification() {
        assert!(ApiError::RateLimited { reset_at: Utc::now() }.is_hard_stop());
        assert!(
            ApiError::QuotaExceeded(QuotaExceeded {
                ceiling: 1,
                resets_at: Utc::now()
            })
            .is_hard_stop()
        );
        assert!(!ApiError::NotFound.is_hard_stop());
        assert!(!ApiError::Unavailable.is_hard_stop());
        assert!(!ApiError::Http { status: 500 }.is_hard_stop());
    }

    #[test]
    fn test_user_agent_comes_from_pool() {
        assert!(USER_AGENTS.contains(&pick_user_agent()));
    }
}
