//! Command-line interface and orchestration for import-census
//!
//! This module parses arguments, loads configuration, and wires the crawl
//! pipeline together for each command.
//!
//! ## Commands
//!
//! - **crawl**: One incremental pass. Tops up the repository queue through the
//!   search API when it runs low, then clones and analyzes a batch
//! - **discover**: Sampling only, appending new repositories to the discovery log
//! - **analyze**: Processing only, draining the existing queue without searching
//! - **report**: Aggregate the import records into a CSV and an optional README table
//! - **init**: Generate a default configuration file
//! - **validate**: Check a configuration file
//!
//! The crawl commands share [`common::Session`], which opens the state files and
//! builds the quota-guarded search client from the loaded configuration.

mod analyze;
mod common;
mod config;
mod crawl;
mod discover;
mod host;
mod init;
mod report;
mod run;
mod validate;

#[cfg(debug_assertions)]
pub use config::Config;

pub use analyze::{AnalyzeArgs, process_analyze};
pub use crawl::{CrawlArgs, process_crawl};
pub use discover::{DiscoverArgs, process_discover};
pub use host::Host;
pub use init::{InitArgs, init_config};
pub use report::{ReportArgs, process_report};
pub use run::run;
pub use validate::{ValidateArgs, validate_config};
