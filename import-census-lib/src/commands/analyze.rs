use super::Host;
use super::common::{CommonArgs, Session};
use super::crawl::run_pass;
use crate::Result;
use clap::Parser;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Repositories to analyze (default is `repos_to_process`)
    #[arg(long, value_name = "N")]
    pub count: Option<usize>,
}

/// Analyze queued repositories without running discovery
pub async fn process_analyze<H: Host>(host: &mut H, args: &AnalyzeArgs) -> Result<()> {
    let session = Session::open(&args.common)?;

    let mut settings = session.config.crawl_settings();
    settings.repos_to_process = args.count.unwrap_or(settings.repos_to_process);
    // an empty buffer requirement is always met, so the pass never searches
    settings.buffer = 0;

    let strategy = session.config.strategy;
    let summary = run_pass(session, settings, strategy, None).await?;

    let _ = writeln!(host.output(), "{summary}");
    Ok(())
}
