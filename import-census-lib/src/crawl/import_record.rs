use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One library imported by one file of one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRecord {
    pub library: String,

    #[serde(rename = "repo")]
    pub repository: String,

    /// Path relative to the repository root, `/`-separated
    pub file_path: String,

    #[serde(rename = "fetch_date")]
    pub fetched_at: DateTime<Utc>,

    #[serde(rename = "last_updated")]
    pub repository_last_updated: DateTime<Utc>,
}
