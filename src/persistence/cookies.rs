//! Cookie jar carried between runs so a solved challenge is not repeated.

use crate::core::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// A browser cookie in a driver-neutral shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    /// Expiry as epoch seconds; `None` for session cookies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<i64>,
}

impl CookieRecord {
    pub fn is_expired(&self, now_epoch: i64) -> bool {
        matches!(self.expiry, Some(expiry) if expiry <= now_epoch)
    }
}

#[derive(Debug, Clone)]
pub struct CookieJar {
    path: PathBuf,
}

impl CookieJar {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cookies that are still valid at `now_epoch`. A missing file yields none.
    pub fn load(&self, now_epoch: i64) -> Result<Vec<CookieRecord>> {
        if !self.path.exists() {
            tracing::info!("cookies file not found at {}", self.path.display());
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        let cookies: Vec<CookieRecord> = serde_json::from_str(&contents)?;
        let total = cookies.len();
        let live: Vec<CookieRecord> = cookies
            .into_iter()
            .filter(|c| !c.is_expired(now_epoch))
            .collect();
        if live.len() < total {
            tracing::debug!("skipping {} expired cookies", total - live.len());
        }
        Ok(live)
    }

    pub fn save(&self, cookies: &[CookieRecord]) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(cookies)?)?;
        Ok(())
    }
}
