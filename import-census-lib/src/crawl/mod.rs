//! The incremental discover-and-analyze pipeline
//!
//! Each invocation makes one bounded pass: it tops up the queue of discovered
//! repositories through the search API when it runs low, then analyzes a few of
//! the oldest unprocessed ones. All progress is appended to plain files, so a pass
//! killed at any point loses at most the repository it was working on.

pub mod analysis;
pub mod clock;
pub mod discovery;
mod import_record;
mod orchestrator;
pub mod quota;
mod record_sink;
mod repository_handle;
mod state_store;

pub use import_record::ImportRecord;
pub use orchestrator::{CrawlSettings, Orchestrator, Phase, RunSummary, StopReason};
pub use record_sink::{JsonlSink, RecordSink};
pub use repository_handle::{RepositoryHandle, default_url};
pub use state_store::CrawlStateStore;
