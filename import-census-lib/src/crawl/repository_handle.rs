use crate::Result;
use chrono::{DateTime, Utc};
use core::fmt::{Display, Formatter};
use ohno::{IntoAppError, bail};
use serde::{Deserialize, Serialize};
use url::Url;

/// A discovered repository, as persisted in the discovery log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryHandle {
    /// `owner/name`, unique across the crawl
    #[serde(rename = "repo_name")]
    pub name: String,

    #[serde(rename = "repo_url")]
    pub url: Url,

    pub last_updated: DateTime<Utc>,
}

/// Loose form of a discovery log line; older logs may lack the URL or timestamp.
#[derive(Debug, Deserialize)]
struct LoggedHandle {
    repo_name: Option<String>,
    repo_url: Option<String>,
    last_updated: Option<String>,
}

impl RepositoryHandle {
    pub fn new(name: impl Into<String>, url: Url, last_updated: DateTime<Utc>) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self { name, url, last_updated })
    }

    /// Parse one discovery log line.
    ///
    /// A missing URL defaults to the repository's GitHub page and a missing or
    /// unreadable timestamp defaults to `now`.
    pub fn from_log_line(line: &str, now: DateTime<Utc>) -> Result<Self> {
        let logged: LoggedHandle = serde_json::from_str(line).into_app_err("parsing discovery log line")?;
        let name = logged.repo_name.into_app_err("discovery log line has no repo_name")?;

        let url = match logged.repo_url {
            Some(url) => Url::parse(&url).into_app_err_with(|| format!("invalid URL for '{name}'"))?,
            None => default_url(&name)?,
        };

        let last_updated = logged
            .last_updated
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map_or(now, |t| t.with_timezone(&Utc));

        Self::new(name, url, last_updated)
    }

    pub fn to_log_line(&self) -> Result<String> {
        serde_json::to_string(self).into_app_err("serializing repository handle")
    }
}

impl Display for RepositoryHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.name)
    }
}

/// The public page of a GitHub repository, used when a log line carries no URL.
pub fn default_url(name: &str) -> Result<Url> {
    Url::parse(&format!("https://github.com/{name}")).into_app_err_with(|| format!("building URL for '{name}'"))
}

fn validate_name(name: &str) -> Result<()> {
    let mut parts = name.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(repo), None) if !owner.is_empty() && !repo.is_empty() => Ok(()),
        _ => bail!("invalid repository name '{name}', expected 'owner/name'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_704_067_200, 0).unwrap()
    }

    #[test]
    fn test_round_trips_through_log_line() {
        let handle = RepositoryHandle::new(
            "psf/requests",
            Url::parse("https://github.com/psf/requests").unwrap(),
            DateTime::from_timestamp(1_600_000_000, 0).unwrap(),
        )
        .unwrap();

        let line = handle.to_log_line().unwrap();
        assert!(line.contains(r#""repo_name":"psf/requests""#));
        assert!(line.contains(r#""repo_url":"https://github.com/psf/requests""#));
        assert!(line.contains(r#""last_updated":"2020-09-13T12:26:40Z""#));

        assert_eq!(RepositoryHandle::from_log_line(&line, now()).unwrap(), handle);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let handle = RepositoryHandle::from_log_line(r#"{"repo_name": "pallets/flask"}"#, now()).unwrap();
        assert_eq!(handle.url.as_str(), "https://github.com/pallets/flask");
        assert_eq!(handle.last_updated, now());
    }

    #[test]
    fn test_unreadable_timestamp_takes_default() {
        let handle =
            RepositoryHandle::from_log_line(r#"{"repo_name": "a/b", "last_updated": "yesterday"}"#, now()).unwrap();
        assert_eq!(handle.last_updated, now());
    }

    #[test]
    fn test_rejects_malformed_lines() {
        assert!(RepositoryHandle::from_log_line("not json", now()).is_err());
        assert!(RepositoryHandle::from_log_line(r#"{"repo_url": "https://github.com/a/b"}"#, now()).is_err());
        assert!(RepositoryHandle::from_log_line(r#"{"repo_name": "no-slash"}"#, now()).is_err());
        assert!(RepositoryHandle::from_log_line(r#"{"repo_name": "a/b", "repo_url": "::"}"#, now()).is_err());
    }

    #[test]
    fn test_validate_name() {
        validate_name("owner/repo").unwrap();
        assert!(validate_name("owner/").is_err());
        assert!(validate_name("/repo").is_err());
        assert!(validate_name("a/b/c").is_err());
        assert!(validate_name("").is_err());
    }
}
