use super::LOG_TARGET;
use super::git::{ContentSource, FetchError};
use super::import_extractor;
use crate::crawl::clock::Clock;
use crate::crawl::{ImportRecord, RepositoryHandle};
use chrono::{DateTime, Utc};
use core::time::Duration;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::spawn_blocking;

/// Bounds on the work done for one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerLimits {
    /// Maximum number of source files examined
    pub max_files: usize,

    /// Wall-clock budget for enumerating source files
    pub search_budget: Duration,

    /// Files larger than this many bytes are skipped
    pub max_file_size: u64,

    /// File extensions treated as source, without the dot
    pub extensions: Vec<String>,
}

impl Default for AnalyzerLimits {
    fn default() -> Self {
        Self {
            max_files: 10,
            search_budget: Duration::from_mins(2),
            max_file_size: 1_000_000,
            extensions: vec!["py".to_string()],
        }
    }
}

/// Result of analyzing one repository.
#[derive(Debug)]
pub enum AnalysisOutcome {
    /// The repository was examined; `records` may be empty
    Completed {
        records: Vec<ImportRecord>,
        files_scanned: usize,
        files_with_fallback: usize,
    },

    /// The repository can never be analyzed and should not be tried again
    Skipped { reason: String },

    /// The repository could not be analyzed now but may be later
    Deferred { reason: String },
}

impl AnalysisOutcome {
    /// Whether the repository should be recorded as processed.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Deferred { .. })
    }
}

/// Clones repositories and extracts their imports.
#[derive(Debug)]
pub struct Analyzer<C> {
    source: C,
    limits: AnalyzerLimits,
    clock: Arc<dyn Clock>,
}

impl<C: ContentSource> Analyzer<C> {
    pub fn new(source: C, limits: AnalyzerLimits, clock: Arc<dyn Clock>) -> Self {
        Self { source, limits, clock }
    }

    #[must_use]
    pub const fn limits(&self) -> &AnalyzerLimits {
        &self.limits
    }

    /// Analyze one repository in a private temporary directory, removed before returning.
    pub async fn analyze(&self, handle: &RepositoryHandle) -> AnalysisOutcome {
        log::info!(target: LOG_TARGET, "Processing repository '{handle}'");

        let workspace = match tempfile::Builder::new().prefix("import-census-").tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                log::error!(target: LOG_TARGET, "Could not create a workspace for '{handle}': {e}");
                return AnalysisOutcome::Deferred {
                    reason: format!("creating workspace: {e}"),
                };
            }
        };
        let checkout = workspace.path().join("repo");

        if let Err(e) = self.source.fetch(&handle.url, &checkout).await {
            return match e {
                FetchError::Gone(_) => {
                    log::warn!(target: LOG_TARGET, "Skipping '{handle}': {e}");
                    AnalysisOutcome::Skipped { reason: e.to_string() }
                }
                FetchError::Failed(_) | FetchError::TimedOut(_) | FetchError::Io(_) => {
                    log::error!(target: LOG_TARGET, "Could not fetch '{handle}', will retry on a later run: {e}");
                    AnalysisOutcome::Deferred { reason: e.to_string() }
                }
            };
        }

        let fetched_at = self.clock.now();
        let limits = self.limits.clone();
        let handle_for_scan = handle.clone();

        let outcome = spawn_blocking(move || scan_checkout(&checkout, &limits, &handle_for_scan, fetched_at))
            .await
            .expect("task must not panic");

        if let Err(e) = workspace.close() {
            log::debug!(target: LOG_TARGET, "Could not remove workspace for '{handle}': {e}");
        }

        if let AnalysisOutcome::Completed {
            records,
            files_scanned,
            files_with_fallback,
        } = &outcome
        {
            log::info!(
                target: LOG_TARGET,
                "Found {} imports in {files_scanned} files of '{handle}' ({files_with_fallback} via fallback)",
                records.len()
            );
        }

        outcome
    }
}

fn scan_checkout(root: &Path, limits: &AnalyzerLimits, handle: &RepositoryHandle, fetched_at: DateTime<Utc>) -> AnalysisOutcome {
    let deadline = Instant::now() + limits.search_budget;
    let files = enumerate_source_files(root, &limits.extensions, limits.max_files, || Instant::now() >= deadline);

    let mut records = Vec::new();
    let mut files_scanned = 0;
    let mut files_with_fallback = 0;

    for path in files {
        let relative = relative_path(root, &path);

        let source = match read_source(&path, limits.max_file_size) {
            Ok(Some(source)) => source,
            Ok(None) => continue,
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Could not read '{relative}' in '{handle}': {e}");
                continue;
            }
        };

        let extraction = import_extractor::extract_tagged(&source);
        files_scanned += 1;
        if extraction.used_fallback() {
            files_with_fallback += 1;
            log::debug!(target: LOG_TARGET, "Used pattern fallback for '{relative}' in '{handle}'");
        }

        records.extend(extraction.into_libraries().into_iter().map(|library| ImportRecord {
            library,
            repository: handle.name.clone(),
            file_path: relative.clone(),
            fetched_at,
            repository_last_updated: handle.last_updated,
        }));
    }

    AnalysisOutcome::Completed {
        records,
        files_scanned,
        files_with_fallback,
    }
}

/// Source files under `root` in walk order, bounded by count and time.
///
/// `out_of_time` is polled before each directory entry. Symlinks are not followed
/// and `.git` is never entered. Running out of time returns whatever was found so far.
pub fn enumerate_source_files(
    root: &Path,
    extensions: &[String],
    max_files: usize,
    mut out_of_time: impl FnMut() -> bool,
) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if max_files == 0 {
        return files;
    }

    let walker = walkdir::WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || e.file_name() != ".git");

    for entry in walker {
        if out_of_time() {
            log::warn!(target: LOG_TARGET, "Search time limit reached after finding {} source files", files.len());
            break;
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log::debug!(target: LOG_TARGET, "Could not walk directory: {err:#}");
                continue;
            }
        };

        if entry.file_type().is_dir() || entry.path_is_symlink() {
            continue;
        }

        let matches = entry
            .path()
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| extensions.iter().any(|e| e == ext));

        if matches {
            files.push(entry.into_path());
            if files.len() >= max_files {
                break;
            }
        }
    }

    files
}

/// File content with invalid UTF-8 dropped, or `None` when the file is over the size ceiling.
fn read_source(path: &Path, max_file_size: u64) -> std::io::Result<Option<String>> {
    let size = fs::metadata(path)?.len();
    if size > max_file_size {
        log::info!(target: LOG_TARGET, "Skipping large file '{}' ({:.2} MB)", path.display(), size as f64 / 1_000_000.0);
        return Ok(None);
    }

    let bytes = fs::read(path)?;
    Ok(Some(bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()))
}

fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
