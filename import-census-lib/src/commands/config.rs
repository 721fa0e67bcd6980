use crate::Result;
use crate::crawl::CrawlSettings;
use crate::crawl::analysis::AnalyzerLimits;
use crate::crawl::discovery::{DiscoveryFilters, GITHUB_API_URL, SamplingStrategy};
use camino::{Utf8Path, Utf8PathBuf};
use core::time::Duration;
use ohno::{IntoAppError, app_err};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use url::Url;

/// The default configuration TOML content, embedded from `default_config.toml`
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../../default_config.toml");

/// Name of the configuration file looked up when none is given
pub const CONFIG_FILE_NAME: &str = "census.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Language filter passed to the repository search
    #[serde(default = "default_language")]
    pub language: String,

    /// Minimum stargazer count of sampled repositories
    #[serde(default = "default_min_stars")]
    pub min_stars: u32,

    /// Minimum repository size, in kilobytes
    #[serde(default = "default_min_size_kb")]
    pub min_size_kb: u32,

    /// Time-bucket sampling picks a random hour within this many years
    #[serde(default = "default_years_back")]
    pub years_back: u32,

    #[serde(default = "default_strategy")]
    pub strategy: SamplingStrategy,

    /// Pause between consecutive search attempts
    #[serde(default = "default_delay", with = "humantime_serde")]
    pub attempt_delay: Duration,

    /// Search API endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Outbound search requests allowed per quota window
    #[serde(default = "default_request_quota")]
    pub request_quota: u32,

    #[serde(default = "default_quota_window", with = "humantime_serde")]
    pub quota_window: Duration,

    /// Repositories to look for when the queue runs low
    #[serde(default = "default_repos_to_find")]
    pub repos_to_find: usize,

    /// Discovery runs when fewer unprocessed repositories than this are queued
    #[serde(default = "default_buffer")]
    pub buffer: usize,

    /// Repositories analyzed per pass
    #[serde(default = "default_repos_to_process")]
    pub repos_to_process: usize,

    /// No new repository is started once a pass has run this long
    #[serde(default = "default_max_runtime", with = "humantime_serde")]
    pub max_runtime: Duration,

    /// Pause between consecutive repositories
    #[serde(default = "default_delay", with = "humantime_serde")]
    pub repo_delay: Duration,

    /// Source files examined per repository
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Files larger than this many bytes are skipped
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Source file extensions, without the dot
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Time allowed for finding source files in a clone
    #[serde(default = "default_search_budget", with = "humantime_serde")]
    pub search_budget: Duration,

    /// Time allowed for a single clone
    #[serde(default = "default_clone_timeout", with = "humantime_serde")]
    pub clone_timeout: Duration,
}

fn default_language() -> String {
    "python".to_string()
}

const fn default_min_stars() -> u32 {
    5
}

const fn default_min_size_kb() -> u32 {
    100
}

const fn default_years_back() -> u32 {
    10
}

const fn default_strategy() -> SamplingStrategy {
    SamplingStrategy::RandomPage
}

const fn default_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_api_url() -> String {
    GITHUB_API_URL.to_string()
}

const fn default_request_quota() -> u32 {
    900
}

const fn default_quota_window() -> Duration {
    Duration::from_hours(1)
}

const fn default_repos_to_find() -> usize {
    5
}

const fn default_buffer() -> usize {
    5
}

const fn default_repos_to_process() -> usize {
    1
}

const fn default_max_runtime() -> Duration {
    Duration::from_secs(21_000)
}

const fn default_max_files() -> usize {
    10
}

const fn default_max_file_size() -> u64 {
    1_000_000
}

fn default_extensions() -> Vec<String> {
    vec!["py".to_string()]
}

const fn default_search_budget() -> Duration {
    Duration::from_mins(2)
}

const fn default_clone_timeout() -> Duration {
    Duration::from_mins(5)
}

impl Config {
    /// Load configuration from a file or use defaults
    ///
    /// Without an explicit path, `census.toml` in `base_dir` is used when it exists.
    pub fn load(base_dir: &Utf8Path, config_path: Option<&Utf8PathBuf>) -> Result<Self> {
        let (final_path, text) = if let Some(path) = config_path {
            let text = fs::read_to_string(path).into_app_err_with(|| format!("reading configuration file '{path}'"))?;
            (path.clone(), text)
        } else {
            let path = base_dir.join(CONFIG_FILE_NAME);
            match fs::read_to_string(&path) {
                Ok(text) => (path, text),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Ok(Self::default());
                }
                Err(e) => return Err(e).into_app_err_with(|| format!("reading configuration file '{path}'")),
            }
        };

        let config: Self = toml::from_str(&text).into_app_err_with(|| format!("parsing configuration file '{final_path}'"))?;
        config.validate()?;

        Ok(config)
    }

    /// Save the default configuration to a TOML file
    pub fn save_default(output_path: &Utf8Path) -> Result<()> {
        fs::write(output_path, DEFAULT_CONFIG_TOML).into_app_err_with(|| format!("writing default configuration to {output_path}"))?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.language.is_empty() || self.language.chars().any(char::is_whitespace) {
            return Err(app_err!("language must be a single non-empty word, got '{}'", self.language));
        }

        if self.request_quota == 0 {
            return Err(app_err!("request_quota must be greater than 0"));
        }

        if self.quota_window.is_zero() {
            return Err(app_err!("quota_window must be greater than 0"));
        }

        if self.max_files == 0 {
            return Err(app_err!("max_files must be greater than 0"));
        }

        if self.extensions.is_empty() {
            return Err(app_err!("extensions must list at least one file extension"));
        }

        if let Some(ext) = self.extensions.iter().find(|e| e.is_empty() || e.starts_with('.')) {
            return Err(app_err!("extensions are given without a leading dot, got '{ext}'"));
        }

        let _ = Url::parse(&self.api_url).into_app_err_with(|| format!("api_url '{}' is not a valid URL", self.api_url))?;

        Ok(())
    }

    #[must_use]
    pub fn discovery_filters(&self) -> DiscoveryFilters {
        DiscoveryFilters {
            language: self.language.clone(),
            min_stars: self.min_stars,
            min_size_kb: self.min_size_kb,
            years_back: self.years_back,
        }
    }

    #[must_use]
    pub fn analyzer_limits(&self) -> AnalyzerLimits {
        AnalyzerLimits {
            max_files: self.max_files,
            search_budget: self.search_budget,
            max_file_size: self.max_file_size,
            extensions: self.extensions.clone(),
        }
    }

    #[must_use]
    pub const fn crawl_settings(&self) -> CrawlSettings {
        CrawlSettings {
            repos_to_find: self.repos_to_find,
            repos_to_process: self.repos_to_process,
            buffer: self.buffer,
            max_runtime: self.max_runtime,
            repo_delay: self.repo_delay,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG_TOML).expect("default_config.toml should be valid TOML that deserializes to Config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
    }

    #[test]
    fn test_embedded_defaults_match_field_defaults() {
        let embedded = Config::default();
        let empty: Config = toml::from_str("").unwrap();
        assert_eq!(embedded, empty);
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.language, "python");
        assert_eq!(config.strategy, SamplingStrategy::RandomPage);
        assert_eq!(config.request_quota, 900);
        assert_eq!(config.quota_window, Duration::from_secs(3600));
        assert_eq!(config.max_runtime, Duration::from_secs(21_000));
        assert_eq!(config.repos_to_find, 5);
        assert_eq!(config.repos_to_process, 1);
        assert_eq!(config.buffer, 5);
        assert_eq!(config.max_files, 10);
        assert_eq!(config.max_file_size, 1_000_000);
        assert_eq!(config.search_budget, Duration::from_secs(120));
        assert_eq!(config.clone_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_partial_config_keeps_other_defaults() {
        let config: Config = toml::from_str("strategy = \"time-bucket\"\nmax_runtime = \"10m\"\n").unwrap();
        assert_eq!(config.strategy, SamplingStrategy::TimeBucket);
        assert_eq!(config.max_runtime, Duration::from_secs(600));
        assert_eq!(config.min_stars, 5);
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        assert!(toml::from_str::<Config>("unknown_field = 1\n").is_err());
    }

    #[test]
    fn test_invalid_duration_is_rejected() {
        assert!(toml::from_str::<Config>("max_runtime = \"soon\"\n").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad = [
            Config {
                language: String::new(),
                ..Config::default()
            },
            Config {
                language: "python rust".into(),
                ..Config::default()
            },
            Config {
                request_quota: 0,
                ..Config::default()
            },
            Config {
                quota_window: Duration::ZERO,
                ..Config::default()
            },
            Config {
                max_files: 0,
                ..Config::default()
            },
            Config {
                extensions: Vec::new(),
                ..Config::default()
            },
            Config {
                extensions: vec![".py".into()],
                ..Config::default()
            },
            Config {
                api_url: "not a url".into(),
                ..Config::default()
            },
        ];

        for config in bad {
            assert!(config.validate().is_err(), "{config:?} should be rejected");
        }
    }

    #[test]
    fn test_derived_settings() {
        let config = Config::default();
        assert_eq!(config.discovery_filters().min_size_kb, 100);
        assert_eq!(config.analyzer_limits(), AnalyzerLimits::default());
        assert_eq!(config.crawl_settings().buffer, 5);
    }

    #[test]
    fn test_save_default_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let base = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        let output_path = base.join(CONFIG_FILE_NAME);
        Config::save_default(&output_path).unwrap();

        let explicit = Config::load(&base, Some(&output_path)).unwrap();
        let implicit = Config::load(&base, None).unwrap();
        assert_eq!(explicit, implicit);
    }

    #[test]
    fn test_load_missing_config_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let base = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        assert_eq!(Config::load(&base, None).unwrap(), Config::default());
    }

    #[test]
    fn test_load_missing_explicit_config_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let base = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        assert!(Config::load(&base, Some(&base.join("nope.toml"))).is_err());
    }

    #[test]
    fn test_load_validates() {
        let tmp = tempfile::tempdir().unwrap();
        let base = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        let path = base.join(CONFIG_FILE_NAME);
        fs::write(&path, "max_files = 0\n").unwrap();
        assert!(Config::load(&base, None).is_err());
    }
}
