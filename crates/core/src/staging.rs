//! Raw staging area for downloaded daily files.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use tracing::{debug, info};

/// Directory that receives raw daily files before aggregation.
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the directory if it does not exist.
    pub async fn ensure(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    /// Removes every regular file in the staging area, returning how many
    /// were deleted. Subdirectories are left alone.
    pub async fn purge(&self) -> std::io::Result<usize> {
        if !tokio::fs::try_exists(&self.root).await? {
            return Ok(0);
        }

        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                tokio::fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }

        info!(dir = %self.root.display(), removed, "Purged staging area");
        Ok(removed)
    }

    /// Date of the newest file in the staging area.
    ///
    /// Only files whose name carries an 8-digit `YYYYMMDD` token count; the
    /// lexicographically greatest such name wins. Returns `None` when there
    /// is none or the winning token is not a real date.
    pub async fn latest_data_date(&self) -> Option<NaiveDate> {
        let mut entries = tokio::fs::read_dir(&self.root).await.ok()?;
        let mut newest: Option<String> = None;

        while let Ok(Some(entry)) = entries.next_entry().await {
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_file || !DATE_TOKEN.is_match(&name) {
                continue;
            }
            if newest.as_ref().is_none_or(|current| name > *current) {
                newest = Some(name);
            }
        }

        let name = newest?;
        let date = date_token(&name);
        debug!(file = %name, ?date, "Latest staged file");
        date
    }
}

static DATE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{8}").expect("date token pattern"));

/// Extracts the first `YYYYMMDD` token from a file name.
pub fn date_token(name: &str) -> Option<NaiveDate> {
    let token = DATE_TOKEN.find(name)?.as_str();
    NaiveDate::parse_from_str(token, "%Y%m%d").ok()
}

/// Human-readable form used in operator reports.
pub fn describe_date(date: Option<NaiveDate>) -> String {
    match date {
        Some(d) => d.format("%Y-%m-%d").to_string(),
        None => "not available".to_string(),
    }
}
