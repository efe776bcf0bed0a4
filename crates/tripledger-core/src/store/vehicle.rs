use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::models::VehicleSettings;

/// Vehicle settings file name in the data directory
const VEHICLE_FILE: &str = "vehicle_settings_v1.json";

/// Persisted one-time vehicle profile. Reads fall back to the built-in
/// defaults when nothing has been saved yet; unknown or missing fields in
/// a saved file also take their defaults.
pub struct VehicleStore {
    data_dir: PathBuf,
}

impl VehicleStore {
    pub fn new(data_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    fn settings_path(&self) -> PathBuf {
        self.data_dir.join(VEHICLE_FILE)
    }

    pub fn load(&self) -> Result<VehicleSettings> {
        let path = self.settings_path();
        if !path.exists() {
            return Ok(VehicleSettings::default());
        }
        let contents =
            std::fs::read_to_string(&path).context("Failed to read vehicle settings file")?;
        serde_json::from_str(&contents).context("Failed to parse vehicle settings file")
    }

    pub fn save(&self, settings: &VehicleSettings) -> Result<()> {
        let contents = serde_json::to_string_pretty(settings)?;
        std::fs::write(self.settings_path(), contents)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        let path = self.settings_path();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_without_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = VehicleStore::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(store.load().unwrap(), VehicleSettings::default());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = VehicleStore::new(dir.path().to_path_buf()).unwrap();

        let mut settings = VehicleSettings::default();
        settings.rate_per_km = 18.5;
        settings.fuel_price = 104.0;
        store.save(&settings).unwrap();

        assert_eq!(store.load().unwrap(), settings);
    }

    #[test]
    fn test_partial_file_merges_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = VehicleStore::new(dir.path().to_path_buf()).unwrap();
        std::fs::write(
            dir.path().join("vehicle_settings_v1.json"),
            r#"{ "rate_per_km": 20.0 }"#,
        )
        .unwrap();

        let settings = store.load().unwrap();
        assert_eq!(settings.rate_per_km, 20.0);
        assert_eq!(settings.mileage_kmpl, VehicleSettings::default().mileage_kmpl);
    }

    #[test]
    fn test_clear_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = VehicleStore::new(dir.path().to_path_buf()).unwrap();
        let mut settings = VehicleSettings::default();
        settings.emi = 0.0;
        store.save(&settings).unwrap();

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), VehicleSettings::default());
    }
}
