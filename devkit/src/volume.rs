/*!
Volume partagé temporaire pour les tests

Reproduit le répertoire que le conteneur monte et dans lequel il écrit
son adresse et son historique télémétrie.
*/

use anyhow::Result;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const ADDRESS_FILE: &str = "local_address.txt";
pub const HISTORY_FILE: &str = "local_history.json";

/// Répertoire de volume supprimé automatiquement à la fin du test
pub struct VolumeFixture {
    dir: TempDir,
}

impl VolumeFixture {
    pub fn new() -> Result<Self> {
        env_logger::builder().is_test(true).try_init().ok(); // Init logging pour tests

        let dir = tempfile::Builder::new().prefix("edge-node-volume").tempdir()?;
        log::debug!("Volume fixture at {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn address_path(&self) -> PathBuf {
        self.dir.path().join(ADDRESS_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.dir.path().join(HISTORY_FILE)
    }

    pub fn write_address(&self, content: &str) -> Result<()> {
        std::fs::write(self.address_path(), content)?;
        Ok(())
    }

    pub fn write_history(&self, doc: &Value) -> Result<()> {
        std::fs::write(self.history_path(), serde_json::to_vec(doc)?)?;
        Ok(())
    }

    /// Contenu brut, par exemple un document tronqué en cours d'écriture
    pub fn write_raw_history(&self, bytes: &[u8]) -> Result<()> {
        std::fs::write(self.history_path(), bytes)?;
        Ok(())
    }

    pub fn remove_address(&self) -> Result<()> {
        std::fs::remove_file(self.address_path())?;
        Ok(())
    }

    pub fn remove_history(&self) -> Result<()> {
        std::fs::remove_file(self.history_path())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_files_land_in_volume_dir() {
        let volume = VolumeFixture::new().unwrap();
        volume.write_address("0xai_abc node-1").unwrap();
        volume.write_history(&serde_json::json!({"timestamps": []})).unwrap();

        assert!(volume.address_path().starts_with(volume.path()));
        assert_eq!(std::fs::read_to_string(volume.address_path()).unwrap(), "0xai_abc node-1");

        volume.remove_history().unwrap();
        assert!(!volume.history_path().exists());
    }
}
