//! Command dispatch logic for import-census

use super::{
    AnalyzeArgs, CrawlArgs, DiscoverArgs, InitArgs, ReportArgs, ValidateArgs, init_config, process_analyze, process_crawl,
    process_discover, process_report, validate_config,
};
use crate::{Host, Result};
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "import-census", version, author, long_about = None)]
#[command(about = "Sample public repositories and count the libraries they import")]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(subcommand)]
    command: CensusSubcommand,
}

#[derive(Subcommand, Debug)]
enum CensusSubcommand {
    /// Run one pass: top up the repository queue, then analyze a batch
    Crawl(Box<CrawlArgs>),
    /// Sample new repositories without analyzing any
    Discover(Box<DiscoverArgs>),
    /// Analyze queued repositories without searching for more
    Analyze(Box<AnalyzeArgs>),
    /// Aggregate import records into library counts
    Report(ReportArgs),
    /// Generate a default configuration file
    Init(InitArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

/// Dispatch command-line arguments to the appropriate handler
///
/// # Errors
///
/// Returns an error if command parsing fails or if the executed command fails
pub async fn run<I, T, H>(host: &mut H, args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
    H: Host,
{
    match &Cli::parse_from(args).command {
        CensusSubcommand::Crawl(crawl_args) => process_crawl(host, crawl_args).await,
        CensusSubcommand::Discover(discover_args) => process_discover(host, discover_args).await,
        CensusSubcommand::Analyze(analyze_args) => process_analyze(host, analyze_args).await,
        CensusSubcommand::Report(report_args) => process_report(host, report_args),
        CensusSubcommand::Init(init_args) => init_config(host, init_args),
        CensusSubcommand::Validate(validate_args) => validate_config(host, validate_args),
    }
}
