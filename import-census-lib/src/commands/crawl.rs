use super::Host;
use super::common::{CommonArgs, Session};
use crate::Result;
use crate::crawl::analysis::{Analyzer, GitContentSource};
use crate::crawl::discovery::{Sampler, SamplingStrategy};
use crate::crawl::{CrawlSettings, Orchestrator, RunSummary};
use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::io::Write;
use std::sync::Arc;

#[derive(Parser, Debug)]
pub struct CrawlArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Repositories to analyze in this pass (overrides `repos_to_process`)
    #[arg(long, value_name = "N")]
    pub repos_to_process: Option<usize>,

    /// Repositories to discover when the queue runs low (overrides `repos_to_find`)
    #[arg(long, value_name = "N")]
    pub repos_to_find: Option<usize>,

    /// How candidate repositories are sampled (overrides `strategy`)
    #[arg(long, value_name = "STRATEGY")]
    pub strategy: Option<SamplingStrategy>,

    /// Seed for repeatable sampling
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,
}

/// Make one incremental pass: discover if the queue is short, then analyze a batch
pub async fn process_crawl<H: Host>(host: &mut H, args: &CrawlArgs) -> Result<()> {
    let session = Session::open(&args.common)?;

    let mut settings = session.config.crawl_settings();
    if let Some(n) = args.repos_to_process {
        settings.repos_to_process = n;
    }
    if let Some(n) = args.repos_to_find {
        settings.repos_to_find = n;
    }

    let strategy = args.strategy.unwrap_or(session.config.strategy);
    let summary = run_pass(session, settings, strategy, args.seed).await?;

    let _ = writeln!(host.output(), "{summary}");
    Ok(())
}

/// Wire the production components together and run one pass.
pub async fn run_pass(session: Session, settings: CrawlSettings, strategy: SamplingStrategy, seed: Option<u64>) -> Result<RunSummary> {
    let Session {
        config,
        clock,
        client,
        store,
        sink,
    } = session;

    let rng = seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
    let sampler = Sampler::new(&client, strategy, config.discovery_filters(), rng, Arc::clone(&clock)).with_attempt_delay(config.attempt_delay);
    let analyzer = Analyzer::new(GitContentSource::new(config.clone_timeout), config.analyzer_limits(), Arc::clone(&clock));

    let mut orchestrator = Orchestrator::new(store, sampler, analyzer, sink, settings, clock);
    orchestrator.run().await
}
