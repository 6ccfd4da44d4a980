//! Forensic artifacts: page sources and screenshots named by capture time.

use crate::core::error::Result;
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

pub fn time_prefix() -> String {
    Local::now().format("%Y-%m-%d %H-%M-%S-%6f").to_string()
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn page_path(&self, name: &str) -> PathBuf {
        self.root
            .join("pages")
            .join(format!("{}-{}.html", time_prefix(), name))
    }

    pub fn screenshot_path(&self, name: &str) -> PathBuf {
        self.root
            .join("screenshots")
            .join(format!("{}-{}.png", time_prefix(), name))
    }

    pub fn save_page(&self, name: &str, source: &str) -> Result<PathBuf> {
        let path = self.page_path(name);
        write_creating_dirs(&path, source.as_bytes())?;
        Ok(path)
    }

    pub fn save_screenshot(&self, name: &str, png: &[u8]) -> Result<PathBuf> {
        let path = self.screenshot_path(name);
        write_creating_dirs(&path, png)?;
        Ok(path)
    }
}

fn write_creating_dirs(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifacts_are_prefixed_and_grouped() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        let page = store.save_page("calendar", "<html></html>").unwrap();
        let shot = store.save_screenshot("calendar", b"png").unwrap();

        assert!(page.starts_with(dir.path().join("pages")));
        assert!(shot.starts_with(dir.path().join("screenshots")));
        let file_name = page.file_name().unwrap().to_string_lossy().to_string();
        assert!(file_name.ends_with("-calendar.html"));
        // "YYYY-MM-DD HH-MM-SS-ffffff-"
        assert_eq!(file_name.len(), "2024-01-01 00-00-00-000000-calendar.html".len());
        assert_eq!(fs::read_to_string(page).unwrap(), "<html></html>");
    }
}
