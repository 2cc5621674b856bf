// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline configuration

use crate::constants;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Every Nth delivered frame is persisted while recording
    pub sampling_period: u64,
    /// Quality of the intermediate JPEG pass
    pub intermediate_jpeg_quality: u8,
    /// Quality of the stored JPEG
    pub stored_jpeg_quality: u8,
    /// Number of persistence pool workers
    pub save_workers: usize,
    /// Depth of the bounded save-job queue
    pub save_queue_depth: usize,
    /// Grace period for in-flight jobs on shutdown (milliseconds)
    pub pool_shutdown_grace_ms: u64,
    /// Bound on waiting for a location fix at recording start (milliseconds)
    pub location_timeout_ms: u64,
    /// Root directory for session folders; system pictures dir when unset
    pub pictures_root: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sampling_period: constants::SAMPLING_PERIOD,
            intermediate_jpeg_quality: constants::INTERMEDIATE_JPEG_QUALITY,
            stored_jpeg_quality: constants::STORED_JPEG_QUALITY,
            save_workers: constants::DEFAULT_SAVE_WORKERS,
            save_queue_depth: constants::DEFAULT_SAVE_QUEUE_DEPTH,
            pool_shutdown_grace_ms: constants::POOL_SHUTDOWN_GRACE.as_millis() as u64,
            location_timeout_ms: constants::DEFAULT_LOCATION_TIMEOUT.as_millis() as u64,
            pictures_root: None,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, String> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        serde_json::from_str(&data)
            .map_err(|e| format!("Failed to parse {}: {}", path.display(), e))
    }

    pub fn pool_shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.pool_shutdown_grace_ms)
    }

    pub fn location_timeout(&self) -> Duration {
        Duration::from_millis(self.location_timeout_ms)
    }
}
