use super::{ApiError, DiscoverySource, PageParams, RepositorySummary, SearchQuery};
use crate::Result;
use crate::crawl::clock::Clock;
use crate::crawl::{CrawlStateStore, RepositoryHandle};
use chrono::{DateTime, Days, Utc};
use clap::ValueEnum;
use core::time::Duration;
use ohno::IntoAppError;
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

const LOG_TARGET: &str = "  discover";

/// The search API only exposes the first 1000 hits, so ten pages of 100.
const RANDOM_PAGE_MAX: u32 = 10;
const RANDOM_PAGE_SIZE: u32 = 100;
const TIME_BUCKET_PAGE_SIZE: u32 = 10;

/// Failed attempts allowed per requested repository.
const FAILED_ATTEMPTS_PER_REPO: usize = 3;

/// How candidate repositories are drawn from the search API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SamplingStrategy {
    /// Random page of the filtered search results, sorted by update recency
    RandomPage,

    /// Repositories pushed during a random hour of the last few years
    TimeBucket,
}

/// Search filters applied by every strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryFilters {
    pub language: String,
    pub min_stars: u32,
    pub min_size_kb: u32,
    pub years_back: u32,
}

/// What one sampling pass achieved.
#[derive(Debug, Default)]
pub struct SamplingReport {
    /// Names of newly discovered repositories, in discovery order
    pub found: Vec<String>,
    pub attempts: usize,
    pub failed_attempts: usize,

    /// Set when a quota or rate limit ended sampling early
    pub halted_by: Option<ApiError>,
}

#[derive(Debug)]
pub struct Sampler<'a, D, R> {
    source: &'a D,
    strategy: SamplingStrategy,
    filters: DiscoveryFilters,
    rng: R,
    clock: Arc<dyn Clock>,
    attempt_delay: Duration,
}

impl<'a, D: DiscoverySource, R: Rng> Sampler<'a, D, R> {
    pub fn new(source: &'a D, strategy: SamplingStrategy, filters: DiscoveryFilters, rng: R, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            strategy,
            filters,
            rng,
            clock,
            attempt_delay: Duration::ZERO,
        }
    }

    /// Pause between consecutive search attempts.
    #[must_use]
    pub const fn with_attempt_delay(mut self, delay: Duration) -> Self {
        self.attempt_delay = delay;
        self
    }

    /// Discover up to `count` repositories not yet in `store`, appending each as it is found.
    ///
    /// Gives up after `3 * count` failed attempts. A quota or rate-limit error stops
    /// sampling immediately and is returned in [`SamplingReport::halted_by`]; only
    /// store I/O failures produce an `Err`.
    pub async fn sample(&mut self, count: usize, store: &mut CrawlStateStore) -> Result<SamplingReport> {
        let max_failures = count.saturating_mul(FAILED_ATTEMPTS_PER_REPO);
        let mut report = SamplingReport::default();

        while report.found.len() < count && report.failed_attempts < max_failures {
            if report.attempts > 0 && !self.attempt_delay.is_zero() {
                tokio::time::sleep(self.attempt_delay).await;
            }
            report.attempts += 1;

            match self.attempt(store).await {
                Ok(Some(handle)) => {
                    let name = handle.name.clone();
                    if store.record_discovered(handle)? {
                        report.found.push(name);
                        log::info!(target: LOG_TARGET, "Found {}/{count} repositories: {}", report.found.len(), report.found.last().map_or("", String::as_str));
                    } else {
                        report.failed_attempts += 1;
                    }
                }
                Ok(None) => report.failed_attempts += 1,
                Err(e) if e.is_hard_stop() => {
                    log::error!(target: LOG_TARGET, "Stopping repository search: {e}");
                    report.halted_by = Some(e);
                    break;
                }
                Err(e) => {
                    log::warn!(target: LOG_TARGET, "Search attempt {} failed: {e}", report.attempts);
                    report.failed_attempts += 1;
                }
            }
        }

        log::info!(
            target: LOG_TARGET,
            "Found {} new repositories in {} attempts",
            report.found.len(),
            report.attempts
        );

        Ok(report)
    }

    /// One search; yields a new handle, or `None` when nothing usable came back.
    async fn attempt(&mut self, store: &CrawlStateStore) -> Result<Option<RepositoryHandle>, ApiError> {
        let (query, page) = self.next_request();
        log::debug!(target: LOG_TARGET, "Searching '{}' (page {:?})", query.text, page.page);

        let response = self.source.search(&query, page).await?;

        let Some(summary) = response.items.choose(&mut self.rng) else {
            log::info!(target: LOG_TARGET, "No repositories found matching '{}'", query.text);
            return Ok(None);
        };

        if store.is_known(&summary.full_name) {
            log::debug!(target: LOG_TARGET, "Skipping already known repository '{}'", summary.full_name);
            return Ok(None);
        }

        match self.to_handle(summary) {
            Ok(handle) => Ok(Some(handle)),
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Ignoring unusable search result '{}': {e:#}", summary.full_name);
                Ok(None)
            }
        }
    }

    fn to_handle(&self, summary: &RepositorySummary) -> Result<RepositoryHandle> {
        let url = Url::parse(&summary.html_url).into_app_err_with(|| format!("invalid URL '{}'", summary.html_url))?;
        RepositoryHandle::new(summary.full_name.clone(), url, summary.updated_at.unwrap_or_else(|| self.clock.now()))
    }

    /// Draw the query and page for the next attempt.
    pub fn next_request(&mut self) -> (SearchQuery, PageParams) {
        match self.strategy {
            SamplingStrategy::RandomPage => {
                let text = format!(
                    "language:{} stars:>={} size:>={}",
                    self.filters.language, self.filters.min_stars, self.filters.min_size_kb
                );
                let page = self.rng.random_range(1..=RANDOM_PAGE_MAX);
                (
                    SearchQuery::recently_updated(text),
                    PageParams {
                        page: Some(page),
                        per_page: RANDOM_PAGE_SIZE,
                    },
                )
            }
            SamplingStrategy::TimeBucket => {
                let start = self.random_hour();
                let end = start + chrono::Duration::hours(1);

                let mut text = format!(
                    "language:{} pushed:{}..{}",
                    self.filters.language,
                    start.format("%Y-%m-%dT%H:%M:%SZ"),
                    end.format("%Y-%m-%dT%H:%M:%SZ")
                );
                if self.filters.min_stars > 0 {
                    text.push_str(&format!(" stars:>={}", self.filters.min_stars));
                }
                if self.filters.min_size_kb > 0 {
                    text.push_str(&format!(" size:>={}", self.filters.min_size_kb));
                }

                (
                    SearchQuery::recently_updated(text),
                    PageParams {
                        page: None,
                        per_page: TIME_BUCKET_PAGE_SIZE,
                    },
                )
            }
        }
    }

    /// A uniformly random whole hour within the last `years_back` years.
    fn random_hour(&mut self) -> DateTime<Utc> {
        let now = self.clock.now();
        let span_days = u64::from(self.filters.years_back) * 365;
        let first_day = now
            .date_naive()
            .checked_sub_days(Days::new(span_days))
            .unwrap_or(now.date_naive());

        let day = first_day
            .checked_add_days(Days::new(self.rng.random_range(0..=span_days)))
            .unwrap_or(first_day);
        let hour = self.rng.random_range(0..24);

        day.and_hms_opt(hour, 0, 0).map_or(now, |t| t.and_utc())
    }
}
