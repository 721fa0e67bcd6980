use super::LOG_TARGET;
use core::fmt::{Display, Formatter};
use core::time::Duration;
use regex::Regex;
use std::path::Path;
use std::process::Output;
use std::sync::LazyLock;
use tokio::process::Command;
use url::Url;

/// Default bound on a single clone.
pub const CLONE_TIMEOUT: Duration = Duration::from_mins(5);

/// Fragments of git's lowercased stderr meaning the repository is gone or private.
const GONE_MARKERS: &[&str] = &["repository not found", "could not read username", "repository is disabled"];

/// `fatal: repository '<url>' not found`, and the `does not exist` variant.
static MISSING_REPOSITORY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"repository '[^'\n]*' (?:not found|does not exist)").expect("invalid regex"));

/// Why repository content could not be fetched.
#[derive(Debug)]
pub enum FetchError {
    /// The fetch failed in a way that may succeed later
    Failed(String),

    /// The repository no longer exists or is not public
    Gone(String),

    /// The fetch did not finish in time and was killed
    TimedOut(Duration),

    /// The fetch could not be started
    Io(std::io::Error),
}

impl FetchError {
    /// Whether retrying later could help.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::Gone(_))
    }
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Failed(stderr) => write!(f, "clone failed: {stderr}"),
            Self::Gone(stderr) => write!(f, "repository unavailable: {stderr}"),
            Self::TimedOut(limit) => write!(f, "clone timed out after {} seconds", limit.as_secs()),
            Self::Io(e) => write!(f, "could not run git: {e}"),
        }
    }
}

impl core::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// Fetches the content of a repository into a local directory.
pub trait ContentSource {
    /// Populate `dest` (which must not exist yet) with the repository at `url`.
    fn fetch(&self, url: &Url, dest: &Path) -> impl Future<Output = Result<(), FetchError>> + Send;
}

/// Shallow clones with the `git` command line.
#[derive(Debug, Clone)]
pub struct GitContentSource {
    timeout: Duration,
}

impl GitContentSource {
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for GitContentSource {
    fn default() -> Self {
        Self::new(CLONE_TIMEOUT)
    }
}

impl ContentSource for GitContentSource {
    async fn fetch(&self, url: &Url, dest: &Path) -> Result<(), FetchError> {
        let start_time = std::time::Instant::now();
        log::debug!(target: LOG_TARGET, "Cloning '{url}'");

        let child = Command::new("git")
            .args(["clone", "--depth", "1", "--single-branch", "--no-tags", "--quiet"])
            .arg(url.as_str())
            .arg(dest)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(FetchError::Io)?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(FetchError::Io(e)),
            Err(_) => return Err(FetchError::TimedOut(self.timeout)),
        };

        check_clone_output(&output)?;

        log::debug!(target: LOG_TARGET, "Cloned '{url}' in {:.3}s", start_time.elapsed().as_secs_f64());
        Ok(())
    }
}

fn check_clone_output(output: &Output) -> Result<(), FetchError> {
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let lowered = stderr.to_lowercase();
    if GONE_MARKERS.iter().any(|m| lowered.contains(m)) || MISSING_REPOSITORY.is_match(&lowered) {
        Err(FetchError::Gone(stderr))
    } else {
        Err(FetchError::Failed(stderr))
    }
}
