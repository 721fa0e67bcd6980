//! Per-repository analysis
//!
//! The [`Analyzer`] fetches a repository through a [`ContentSource`] into a
//! temporary directory, walks a bounded set of source files, and turns the imports
//! found by [`import_extractor`] into [`ImportRecord`](crate::crawl::ImportRecord)s.

mod analyzer;
mod git;
pub mod import_extractor;

pub use analyzer::{AnalysisOutcome, Analyzer, AnalyzerLimits, enumerate_source_files};
pub use git::{CLONE_TIMEOUT, ContentSource, FetchError, GitContentSource};
pub use import_extractor::{Extraction, extract};

const LOG_TARGET: &str = "   analyze";
