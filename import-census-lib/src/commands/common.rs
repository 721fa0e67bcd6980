//! Arguments and setup shared by the crawl commands.

use super::config::Config;
use crate::Result;
use crate::crawl::clock::{Clock, SystemClock};
use crate::crawl::discovery::Client;
use crate::crawl::quota::QuotaGuard;
use crate::crawl::{CrawlStateStore, JsonlSink};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, ValueEnum};
use std::sync::Arc;

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    None,

    /// Only error messages
    Error,

    /// Warning and error messages
    Warn,

    /// Info, warning, and error messages
    Info,

    /// Debug, info, warning, and error messages
    Debug,

    /// Trace, debug, info, warning, and error messages
    Trace,
}

/// Arguments shared by the commands that touch the crawl state
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// GitHub personal access token
    #[arg(long, value_name = "TOKEN", env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Path to configuration file (default is `census.toml`)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Discovery log, one repository per line
    #[arg(long, default_value = "data/repos.jsonl", value_name = "PATH")]
    pub repos_file: Utf8PathBuf,

    /// Names of repositories already processed
    #[arg(long, default_value = "data/processed_repos.txt", value_name = "PATH")]
    pub processed_file: Utf8PathBuf,

    /// Import records, one JSON object per line
    #[arg(long, default_value = "data/imports.jsonl", value_name = "PATH")]
    pub imports_file: Utf8PathBuf,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    pub log_level: LogLevel,
}

/// Everything a command needs to talk to the search API and the crawl state.
#[derive(Debug)]
pub struct Session {
    pub config: Config,
    pub clock: Arc<dyn Clock>,
    pub client: Client,
    pub store: CrawlStateStore,
    pub sink: JsonlSink,
}

impl Session {
    pub fn open(args: &CommonArgs) -> Result<Self> {
        init_logging(args.log_level);

        let config = Config::load(Utf8Path::new("."), args.config.as_ref())?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let quota = Arc::new(QuotaGuard::new(config.request_quota, config.quota_window, Arc::clone(&clock)));
        let client = Client::new(args.github_token.as_deref(), config.api_url.clone(), quota, Arc::clone(&clock))?;

        let store = CrawlStateStore::open(args.repos_file.as_std_path(), args.processed_file.as_std_path(), clock.now())?;
        let sink = JsonlSink::new(args.imports_file.as_std_path());

        Ok(Self {
            config,
            clock,
            client,
            store,
            sink,
        })
    }
}

pub fn init_logging(log_level: LogLevel) {
    let level = match log_level {
        LogLevel::None => return,
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", level);

    // a second command in the same process keeps the first logger
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(matches!(log_level, LogLevel::Debug | LogLevel::Trace))
        .try_init();
}
