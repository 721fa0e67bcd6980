//! Repository discovery
//!
//! The [`Sampler`] draws random repositories from a [`DiscoverySource`] and appends
//! the new ones to the crawl state. The production source is the GitHub search
//! [`Client`]; tests substitute canned sources.

mod client;
mod sampler;

pub use client::{ApiError, Client, GITHUB_API_URL, PageParams, RepositorySummary, SearchQuery, SearchResponse};
pub use sampler::{DiscoveryFilters, Sampler, SamplingReport, SamplingStrategy};

/// Anything that can answer a repository search.
pub trait DiscoverySource {
    fn search(&self, query: &SearchQuery, page: PageParams) -> impl Future<Output = Result<SearchResponse, ApiError>> + Send;
}
