//! One incremental pass of the crawl.
//!
//! A pass moves through [`Phase::EnsuringBuffer`], where discovery runs only when
//! fewer than `buffer` unprocessed repositories are queued, and
//! [`Phase::ProcessingBatch`], where up to `repos_to_process` repositories are
//! analyzed oldest-first. The runtime budget is checked between repositories.
//! A quota or rate-limit stop during discovery does not end the pass: analysis
//! never touches the search API, so the queued repositories are still processed.

use super::analysis::{AnalysisOutcome, Analyzer, ContentSource};
use super::clock::Clock;
use super::discovery::{ApiError, DiscoverySource, Sampler};
use super::{CrawlStateStore, RecordSink};
use crate::Result;
use core::fmt::{Display, Formatter};
use core::time::Duration;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;

const LOG_TARGET: &str = "     crawl";

/// Batch sizes and ceilings for one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSettings {
    /// Repositories to look for when the queue runs low
    pub repos_to_find: usize,

    /// Upper bound on repositories analyzed per pass
    pub repos_to_process: usize,

    /// Discovery runs when fewer unprocessed repositories than this are queued
    pub buffer: usize,

    /// No new repository is started once this much time has elapsed
    pub max_runtime: Duration,

    /// Pause between consecutive repositories
    pub repo_delay: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    EnsuringBuffer,
    ProcessingBatch,
    Done,
}

/// Why a pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopReason {
    /// `repos_to_process` repositories were attempted
    #[default]
    BatchComplete,

    /// No unprocessed repository was left to attempt
    QueueEmpty,

    /// The runtime budget ran out
    RuntimeExceeded,

    /// The local request quota refused a discovery call
    QuotaExhausted,

    /// The search API reported an exhausted rate limit
    RateLimited,
}

impl Display for StopReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::BatchComplete => "batch complete",
            Self::QueueEmpty => "no unprocessed repositories left",
            Self::RuntimeExceeded => "runtime limit reached",
            Self::QuotaExhausted => "request quota exhausted",
            Self::RateLimited => "rate limited by the search API",
        })
    }
}

/// Counts for one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Repositories newly added to the discovery log
    pub discovered: usize,

    /// Repositories analyzed and marked processed
    pub processed: usize,

    /// Repositories marked processed without analysis
    pub skipped: usize,

    /// Repositories left for a later pass
    pub deferred: usize,

    /// Import records appended to the sink
    pub records: usize,

    pub stop: StopReason,

    /// Set when discovery was cut short by the quota or the rate limit
    pub discovery_halt: Option<StopReason>,
}

impl Display for RunSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "discovered {}, processed {}, skipped {}, deferred {}, {} import records ({})",
            self.discovered, self.processed, self.skipped, self.deferred, self.records, self.stop
        )?;
        if let Some(halt) = self.discovery_halt {
            write!(f, ", discovery stopped early: {halt}")?;
        }
        Ok(())
    }
}

/// Drives one pass over the crawl state.
///
/// The orchestrator is the only writer of the state store and the record sink.
#[derive(Debug)]
pub struct Orchestrator<'a, D, R, C, S> {
    store: CrawlStateStore,
    sampler: Sampler<'a, D, R>,
    analyzer: Analyzer<C>,
    sink: S,
    settings: CrawlSettings,
    clock: Arc<dyn Clock>,
    phase: Phase,
    deferred: HashSet<String>,
}

impl<'a, D, R, C, S> Orchestrator<'a, D, R, C, S>
where
    D: DiscoverySource,
    R: Rng,
    C: ContentSource,
    S: RecordSink,
{
    pub fn new(
        store: CrawlStateStore,
        sampler: Sampler<'a, D, R>,
        analyzer: Analyzer<C>,
        sink: S,
        settings: CrawlSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            sampler,
            analyzer,
            sink,
            settings,
            clock,
            phase: Phase::Idle,
            deferred: HashSet::new(),
        }
    }

    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub const fn store(&self) -> &CrawlStateStore {
        &self.store
    }

    #[must_use]
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// Run one pass: top up the queue if needed, then process a batch.
    ///
    /// Only failures to write the crawl state or the record sink are returned as
    /// errors. Quota and rate-limit stops end discovery early but successfully.
    pub async fn run(&mut self) -> Result<RunSummary> {
        let started_at = self.clock.now();
        let mut summary = RunSummary::default();

        log::info!(target: LOG_TARGET, "Starting incremental pass");

        self.phase = Phase::EnsuringBuffer;
        let unprocessed = self.store.unprocessed_count();
        if unprocessed < self.settings.buffer {
            log::info!(
                target: LOG_TARGET,
                "Only {unprocessed} unprocessed repositories queued, finding {} new repositories",
                self.settings.repos_to_find
            );

            let report = self.sampler.sample(self.settings.repos_to_find, &mut self.store).await?;
            summary.discovered = report.found.len();

            if let Some(e) = report.halted_by {
                summary.discovery_halt = Some(match e {
                    ApiError::RateLimited { .. } => StopReason::RateLimited,
                    _ => StopReason::QuotaExhausted,
                });
                log::warn!(target: LOG_TARGET, "Discovery stopped early, processing the existing queue: {e}");
            }
        } else {
            log::debug!(target: LOG_TARGET, "{unprocessed} unprocessed repositories queued, skipping discovery");
        }

        self.phase = Phase::ProcessingBatch;
        summary.stop = self.process_batch(started_at, &mut summary).await?;
        self.phase = Phase::Done;

        let elapsed = (self.clock.now() - started_at).num_milliseconds().max(0);
        log::info!(
            target: LOG_TARGET,
            "Processed {}/{} repositories in {:.2} seconds",
            summary.processed,
            self.settings.repos_to_process,
            elapsed as f64 / 1000.0
        );

        Ok(summary)
    }

    async fn process_batch(&mut self, started_at: chrono::DateTime<chrono::Utc>, summary: &mut RunSummary) -> Result<StopReason> {
        let max_runtime = chrono::Duration::from_std(self.settings.max_runtime).unwrap_or(chrono::Duration::MAX);

        for i in 0..self.settings.repos_to_process {
            if i > 0 && !self.settings.repo_delay.is_zero() {
                tokio::time::sleep(self.settings.repo_delay).await;
            }

            if self.clock.now() - started_at >= max_runtime {
                log::warn!(target: LOG_TARGET, "Approaching runtime limit, stopping early");
                return Ok(StopReason::RuntimeExceeded);
            }

            let Some(handle) = self.store.next_unprocessed(&self.deferred).cloned() else {
                log::info!(target: LOG_TARGET, "No unprocessed repositories found");
                return Ok(StopReason::QueueEmpty);
            };

            log::info!(target: LOG_TARGET, "Processing repository {}/{}", i + 1, self.settings.repos_to_process);

            match self.analyzer.analyze(&handle).await {
                AnalysisOutcome::Completed { records, .. } => {
                    // records first: a crash in between duplicates records instead of losing them
                    self.sink.append(&records)?;
                    let _ = self.store.mark_processed(&handle.name)?;
                    summary.processed += 1;
                    summary.records += records.len();
                }
                AnalysisOutcome::Skipped { reason } => {
                    log::info!(target: LOG_TARGET, "Marking '{handle}' processed without analysis: {reason}");
                    let _ = self.store.mark_processed(&handle.name)?;
                    summary.skipped += 1;
                }
                AnalysisOutcome::Deferred { reason } => {
                    log::warn!(target: LOG_TARGET, "Leaving '{handle}' for a later pass: {reason}");
                    let _ = self.deferred.insert(handle.name);
                    summary.deferred += 1;
                }
            }
        }

        Ok(StopReason::BatchComplete)
    }
}
