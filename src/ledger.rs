use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::ledger_file_name;
use crate::error::UploadError;

/// Append-only record of archive names already uploaded to one site.
/// A name appears at most once; presence means "do not upload again".
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    entries: HashSet<String>,
}

impl Ledger {
    /// Open (creating if absent) `uploaded_files_{slug}.log` inside `dir`.
    pub fn open(dir: &Path, slug: &str) -> Result<Self> {
        let path = dir.join(ledger_file_name(slug));
        Self::open_path(path)
    }

    pub fn open_path(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            std::fs::write(&path, "")
                .with_context(|| format!("cannot create ledger {}", path.display()))?;
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read ledger {}", path.display()))?;
        let entries = raw
            .lines()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .map(|l| l.to_string())
            .collect();
        Ok(Self { path, entries })
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.entries.contains(file_name)
    }

    /// Append `file_name` and flush it to disk. Recording a name twice is a no-op.
    pub fn record(&mut self, file_name: &str) -> Result<(), UploadError> {
        if self.entries.contains(file_name) {
            return Ok(());
        }
        let fail = |e: std::io::Error| {
            UploadError::LedgerWriteFailed(self.path.display().to_string(), e.to_string())
        };
        let mut f = OpenOptions::new().create(true).append(true).open(&self.path).map_err(fail)?;
        writeln!(f, "{}", file_name).map_err(fail)?;
        f.sync_all().map_err(fail)?;
        self.entries.insert(file_name.to_string());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path(), "site").unwrap();
        assert!(ledger.is_empty());
        assert!(dir.path().join("uploaded_files_site.log").exists());
    }

    #[test]
    fn record_is_persistent_and_unique() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = Ledger::open(dir.path(), "site").unwrap();
        ledger.record("KTB_1.zip").unwrap();
        ledger.record("KTB_1.zip").unwrap();
        ledger.record("KTB_2.zip").unwrap();

        let raw = std::fs::read_to_string(ledger.path()).unwrap();
        assert_eq!(raw, "KTB_1.zip\nKTB_2.zip\n");

        let reopened = Ledger::open(dir.path(), "site").unwrap();
        assert_eq!(reopened.len(), 2);
        assert!(reopened.contains("KTB_2.zip"));
    }

    #[test]
    fn membership_is_whole_line() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("uploaded_files_s.log"), "KTB_10.zip\n").unwrap();
        let ledger = Ledger::open(dir.path(), "s").unwrap();
        assert!(ledger.contains("KTB_10.zip"));
        assert!(!ledger.contains("KTB_1.zip"));
        assert!(!ledger.contains("B_10.zip"));
    }
}
