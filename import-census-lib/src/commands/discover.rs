use super::Host;
use super::common::{CommonArgs, Session};
use crate::Result;
use crate::crawl::discovery::{Sampler, SamplingStrategy};
use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::io::Write;
use std::sync::Arc;

#[derive(Parser, Debug)]
pub struct DiscoverArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Repositories to discover (default is `repos_to_find`)
    #[arg(long, value_name = "N")]
    pub count: Option<usize>,

    /// How candidate repositories are sampled (overrides `strategy`)
    #[arg(long, value_name = "STRATEGY")]
    pub strategy: Option<SamplingStrategy>,

    /// Seed for repeatable sampling
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,
}

/// Add new repositories to the discovery log without analyzing any
pub async fn process_discover<H: Host>(host: &mut H, args: &DiscoverArgs) -> Result<()> {
    let mut session = Session::open(&args.common)?;
    let config = &session.config;

    let count = args.count.unwrap_or(config.repos_to_find);
    let strategy = args.strategy.unwrap_or(config.strategy);
    let rng = args.seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);

    let mut sampler = Sampler::new(&session.client, strategy, config.discovery_filters(), rng, Arc::clone(&session.clock))
        .with_attempt_delay(config.attempt_delay);
    let report = sampler.sample(count, &mut session.store).await?;

    let _ = writeln!(
        host.output(),
        "Found {}/{count} new repositories in {} attempts",
        report.found.len(),
        report.attempts
    );
    for name in &report.found {
        let _ = writeln!(host.output(), "  {name}");
    }
    if let Some(e) = report.halted_by {
        let _ = writeln!(host.error(), "Search stopped early: {e}");
    }

    Ok(())
}
