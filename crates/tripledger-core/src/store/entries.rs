use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::debug;

use crate::models::DailyEntry;

/// Entry list file name in the data directory
const ENTRIES_FILE: &str = "daily_entries_v1.json";

/// Persisted list of daily entries, latest first.
pub struct EntryStore {
    data_dir: PathBuf,
}

impl EntryStore {
    pub fn new(data_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    fn entries_path(&self) -> PathBuf {
        self.data_dir.join(ENTRIES_FILE)
    }

    /// Prepend a new entry so the most recent day is first.
    pub fn save_entry(&self, entry: DailyEntry) -> Result<()> {
        let mut entries = self.all_entries()?;
        entries.insert(0, entry);
        let contents = serde_json::to_string_pretty(&entries)?;
        std::fs::write(self.entries_path(), contents)?;
        debug!(count = entries.len(), "Saved daily entry");
        Ok(())
    }

    pub fn all_entries(&self) -> Result<Vec<DailyEntry>> {
        let path = self.entries_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents =
            std::fs::read_to_string(&path).context("Failed to read daily entries file")?;
        serde_json::from_str(&contents).context("Failed to parse daily entries file")
    }

    pub fn clear(&self) -> Result<()> {
        let path = self.entries_path();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::daily_breakdown;
    use crate::models::VehicleSettings;

    fn sample_entry(date: &str, kms: f64) -> DailyEntry {
        let breakdown = daily_breakdown(kms, &VehicleSettings::default());
        DailyEntry::from_breakdown(date.to_string(), breakdown, None, None)
    }

    #[test]
    fn test_entries_are_returned_latest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = EntryStore::new(dir.path().to_path_buf()).unwrap();

        store.save_entry(sample_entry("30 Oct 2025", 150.0)).unwrap();
        store.save_entry(sample_entry("31 Oct 2025", 120.0)).unwrap();

        let entries = store.all_entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].date, "31 Oct 2025");
        assert_eq!(entries[1].date, "30 Oct 2025");
    }

    #[test]
    fn test_empty_store_reads_as_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = EntryStore::new(dir.path().to_path_buf()).unwrap();
        assert!(store.all_entries().unwrap().is_empty());
    }

    #[test]
    fn test_clear_removes_all_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = EntryStore::new(dir.path().to_path_buf()).unwrap();
        store.save_entry(sample_entry("31 Oct 2025", 120.0)).unwrap();

        store.clear().unwrap();
        assert!(store.all_entries().unwrap().is_empty());
    }
}
