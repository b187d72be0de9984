//! Host identification for the startup banner
//!
//! This module handles:
//! - Hostname, OS name/version and kernel detection
//! - Architecture and installed memory

use serde::Serialize;
use sysinfo::System;
use tracing::{debug, info};

/// Host the launcher runs on
#[derive(Debug, Clone, Serialize)]
pub struct PlatformInfo {
    pub hostname: String,
    pub os: String,
    pub os_version: String,
    pub kernel_version: String,
    pub architecture: String,
    pub total_memory_mb: u64,
}

impl PlatformInfo {
    pub fn discover() -> Self {
        debug!("Collecting platform information...");

        let hostname = gethostname::gethostname().to_string_lossy().to_string();

        let mut sys = System::new();
        sys.refresh_memory();

        Self {
            hostname,
            os: System::name().unwrap_or_else(|| std::env::consts::OS.to_string()),
            os_version: System::os_version().unwrap_or_else(|| "unknown".to_string()),
            kernel_version: System::kernel_version().unwrap_or_else(|| "unknown".to_string()),
            architecture: std::env::consts::ARCH.to_string(),
            total_memory_mb: sys.total_memory() / 1024 / 1024,
        }
    }

    /// One-line summary, e.g. `Ubuntu 22.04 (kernel 6.5.0, x86_64) on falcon-host`
    pub fn summary(&self) -> String {
        format!(
            "{} {} (kernel {}, {}) on {}",
            self.os, self.os_version, self.kernel_version, self.architecture, self.hostname
        )
    }

    pub fn log(&self) {
        info!("Platform: {}", self.summary());
        info!("Memory: {} MB", self.total_memory_mb);
    }
}
