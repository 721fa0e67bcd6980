//! Durable crawl state: the discovery log and the processed-name log.
//!
//! Both files are append-only. The discovery log holds one JSON object per line
//! describing a [`RepositoryHandle`]; the processed log holds one repository name
//! per line. Both are read fully on open, skipping lines that cannot be parsed.
//! A half-written trailing line from a killed run is terminated before the next
//! append, so it costs only itself and never swallows the entry written after it.

use super::RepositoryHandle;
use crate::Result;
use chrono::{DateTime, Utc};
use ohno::IntoAppError;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const LOG_TARGET: &str = "     state";

#[derive(Debug)]
pub struct CrawlStateStore {
    discovered_path: PathBuf,
    processed_path: PathBuf,
    handles: Vec<RepositoryHandle>,
    known: HashSet<String>,
    processed: HashSet<String>,
}

impl CrawlStateStore {
    /// Load both logs, treating missing files as empty.
    pub fn open(discovered_path: impl Into<PathBuf>, processed_path: impl Into<PathBuf>, now: DateTime<Utc>) -> Result<Self> {
        let discovered_path = discovered_path.into();
        let processed_path = processed_path.into();

        let mut handles = Vec::new();
        let mut known = HashSet::new();
        for (index, line) in read_lines(&discovered_path)?.into_iter().enumerate() {
            match RepositoryHandle::from_log_line(&line, now) {
                Ok(handle) => {
                    if known.insert(handle.name.clone()) {
                        handles.push(handle);
                    }
                }
                Err(e) => {
                    log::debug!(target: LOG_TARGET, "Skipping line {} of '{}': {e:#}", index + 1, discovered_path.display());
                }
            }
        }

        let processed: HashSet<String> = read_lines(&processed_path)?.into_iter().collect();

        log::debug!(
            target: LOG_TARGET,
            "Loaded {} discovered and {} processed repositories",
            handles.len(),
            processed.len()
        );

        Ok(Self {
            discovered_path,
            processed_path,
            handles,
            known,
            processed,
        })
    }

    /// All discovered handles, oldest first.
    #[must_use]
    pub fn handles(&self) -> &[RepositoryHandle] {
        &self.handles
    }

    #[must_use]
    pub fn is_known(&self, name: &str) -> bool {
        self.known.contains(name)
    }

    #[must_use]
    pub fn is_processed(&self, name: &str) -> bool {
        self.processed.contains(name)
    }

    #[must_use]
    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    #[must_use]
    pub fn unprocessed_count(&self) -> usize {
        self.handles.iter().filter(|h| !self.processed.contains(&h.name)).count()
    }

    /// The oldest discovered handle that is neither processed nor excluded.
    #[must_use]
    pub fn next_unprocessed(&self, exclude: &HashSet<String>) -> Option<&RepositoryHandle> {
        self.handles
            .iter()
            .find(|h| !self.processed.contains(&h.name) && !exclude.contains(&h.name))
    }

    /// Append a newly discovered handle. Returns `false` if the name was already known.
    pub fn record_discovered(&mut self, handle: RepositoryHandle) -> Result<bool> {
        if self.known.contains(&handle.name) {
            return Ok(false);
        }

        let line = handle.to_log_line()?;
        append_line(&self.discovered_path, &line)?;

        let _ = self.known.insert(handle.name.clone());
        self.handles.push(handle);
        Ok(true)
    }

    /// Mark a repository processed. Returns `false` if it already was.
    pub fn mark_processed(&mut self, name: &str) -> Result<bool> {
        if self.processed.contains(name) {
            return Ok(false);
        }

        append_line(&self.processed_path, name)?;
        let _ = self.processed.insert(name.to_string());
        Ok(true)
    }
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).into_app_err_with(|| format!("opening '{}'", path.display())),
    };

    let mut lines = Vec::new();
    for line in BufReader::new(file).split(b'\n') {
        let bytes = line.into_app_err_with(|| format!("reading '{}'", path.display()))?;
        let text = String::from_utf8_lossy(&bytes);
        let text = text.trim();
        if !text.is_empty() {
            lines.push(text.to_string());
        }
    }

    Ok(lines)
}

/// Append one line and flush it, creating the file and its parent directory if needed.
pub(crate) fn append_line(path: &Path, line: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).into_app_err_with(|| format!("creating directory '{}'", parent.display()))?;
    }

    let mut file = OpenOptions::new()
        .read(true)
        .create(true)
        .append(true)
        .open(path)
        .into_app_err_with(|| format!("opening '{}' for append", path.display()))?;

    if ends_mid_line(&mut file).into_app_err_with(|| format!("reading the tail of '{}'", path.display()))? {
        log::warn!(target: LOG_TARGET, "Terminating a partial last line in '{}'", path.display());
        writeln!(file).into_app_err_with(|| format!("appending to '{}'", path.display()))?;
    }

    writeln!(file, "{line}").into_app_err_with(|| format!("appending to '{}'", path.display()))?;
    file.flush().into_app_err_with(|| format!("flushing '{}'", path.display()))?;
    Ok(())
}

/// Whether the file is non-empty and its last byte is not a newline.
fn ends_mid_line(file: &mut File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }

    let mut last = [0_u8; 1];
    let _ = file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_704_067_200, 0).unwrap()
    }

    fn handle(name: &str) -> RepositoryHandle {
        RepositoryHandle::new(name, Url::parse(&format!("https://github.com/{name}")).unwrap(), now()).unwrap()
    }

    fn open(dir: &Path) -> CrawlStateStore {
        CrawlStateStore::open(dir.join("data/repos.jsonl"), dir.join("data/processed_repos.txt"), now()).unwrap()
    }

    #[test]
    fn test_missing_files_are_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open(tmp.path());
        assert!(store.handles().is_empty());
        assert_eq!(store.unprocessed_count(), 0);
        assert!(store.next_unprocessed(&HashSet::new()).is_none());
    }

    #[test]
    fn test_state_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();

        let mut store = open(tmp.path());
        assert!(store.record_discovered(handle("a/one")).unwrap());
        assert!(store.record_discovered(handle("a/two")).unwrap());
        assert!(store.mark_processed("a/one").unwrap());

        let store = open(tmp.path());
        assert_eq!(store.handles().len(), 2);
        assert!(store.is_known("a/two"));
        assert!(store.is_processed("a/one"));
        assert_eq!(store.unprocessed_count(), 1);
        assert_eq!(store.next_unprocessed(&HashSet::new()).unwrap().name, "a/two");
    }

    #[test]
    fn test_duplicates_are_not_appended() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = open(tmp.path());

        assert!(store.record_discovered(handle("a/one")).unwrap());
        assert!(!store.record_discovered(handle("a/one")).unwrap());
        assert!(store.mark_processed("a/one").unwrap());
        assert!(!store.mark_processed("a/one").unwrap());

        let repos = fs::read_to_string(tmp.path().join("data/repos.jsonl")).unwrap();
        let processed = fs::read_to_string(tmp.path().join("data/processed_repos.txt")).unwrap();
        assert_eq!(repos.lines().count(), 1);
        assert_eq!(processed, "a/one\n");
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("data")).unwrap();
        fs::write(
            tmp.path().join("data/repos.jsonl"),
            "{\"repo_name\": \"a/one\"}\nthis is not json\n\n{\"repo_name\": \"a/two\", \"repo_url\": \"https://github.com/a/two\"}\n{\"repo_na",
        )
        .unwrap();

        let store = open(tmp.path());
        let names: Vec<_> = store.handles().iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, ["a/one", "a/two"]);
    }

    #[test]
    fn test_duplicate_log_entries_collapse_to_first() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("data")).unwrap();
        fs::write(
            tmp.path().join("data/repos.jsonl"),
            "{\"repo_name\": \"a/one\"}\n{\"repo_name\": \"a/two\"}\n{\"repo_name\": \"a/one\"}\n",
        )
        .unwrap();

        let store = open(tmp.path());
        assert_eq!(store.handles().len(), 2);
    }

    #[test]
    fn test_next_unprocessed_follows_discovery_order_and_exclusions() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = open(tmp.path());
        for name in ["a/one", "a/two", "a/three"] {
            let _ = store.record_discovered(handle(name)).unwrap();
        }
        let _ = store.mark_processed("a/one").unwrap();

        assert_eq!(store.next_unprocessed(&HashSet::new()).unwrap().name, "a/two");

        let exclude: HashSet<String> = ["a/two".to_string()].into_iter().collect();
        assert_eq!(store.next_unprocessed(&exclude).unwrap().name, "a/three");
    }

    #[test]
    fn test_processed_names_not_in_discovery_log_are_kept() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("data")).unwrap();
        fs::write(tmp.path().join("data/processed_repos.txt"), "x/gone\n  \ny/other\r\n").unwrap();

        let store = open(tmp.path());
        assert_eq!(store.processed_count(), 2);
        assert!(store.is_processed("y/other"));
    }

    #[test]
    fn test_append_after_torn_tail_keeps_new_entries() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("data")).unwrap();
        fs::write(tmp.path().join("data/repos.jsonl"), "{\"repo_name\": \"a/one\"}\n{\"repo_na").unwrap();
        fs::write(tmp.path().join("data/processed_repos.txt"), "a/one\na/tw").unwrap();

        let mut store = open(tmp.path());
        assert!(store.record_discovered(handle("b/new")).unwrap());
        assert!(store.mark_processed("b/new").unwrap());

        let store = open(tmp.path());
        assert!(store.is_known("a/one"));
        assert!(store.is_known("b/new"));
        assert!(store.is_processed("b/new"));
        assert!(store.is_processed("a/one"));

        let processed = fs::read_to_string(tmp.path().join("data/processed_repos.txt")).unwrap();
        assert_eq!(processed, "a/one\na/tw\nb/new\n");
    }

    #[test]
    fn test_append_to_clean_file_adds_no_blank_line() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("log.txt");
        append_line(&path, "one").unwrap();
        append_line(&path, "two").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }
}
