//! Shared volume access
//!
//! Reads the files the container publishes into its mounted volume. An
//! absent file is a normal state (node not booted yet) and maps to `None`.

use std::io;
use std::path::{Path, PathBuf};

use crate::config::ContainerConfig;

/// Source of the address and history files
#[allow(async_fn_in_trait)]
pub trait VolumeSource {
    async fn read_address(&mut self) -> io::Result<Option<String>>;
    async fn read_history(&mut self) -> io::Result<Option<Vec<u8>>>;
}

/// Volume directory on the local filesystem
#[derive(Debug, Clone)]
pub struct FsVolume {
    address_path: PathBuf,
    history_path: PathBuf,
}

impl FsVolume {
    pub fn new(dir: &Path, address_file: &str, history_file: &str) -> Self {
        Self {
            address_path: dir.join(address_file),
            history_path: dir.join(history_file),
        }
    }

    pub fn from_config(config: &ContainerConfig) -> Self {
        Self::new(&config.volume_dir, &config.address_file, &config.history_file)
    }

    pub fn history_path(&self) -> &Path {
        &self.history_path
    }
}

impl VolumeSource for FsVolume {
    async fn read_address(&mut self) -> io::Result<Option<String>> {
        Ok(read_optional(&self.address_path)
            .await?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    async fn read_history(&mut self) -> io::Result<Option<Vec<u8>>> {
        read_optional(&self.history_path).await
    }
}

async fn read_optional(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
