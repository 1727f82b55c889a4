use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Call manager configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallManagerConfig {
    /// JSON file holding completed calls
    pub history_path: PathBuf,

    /// Quality snapshots kept per call
    pub metric_window: usize,

    /// Orphan sweep interval (seconds)
    pub sweep_interval_secs: u64,

    /// A call with no snapshots older than this is orphaned (seconds)
    pub orphan_without_metrics_secs: u64,

    /// Any call older than this is orphaned (seconds)
    pub orphan_max_age_secs: u64,

    /// History entries returned when no limit is given
    pub default_history_limit: usize,
}

impl Default for CallManagerConfig {
    fn default() -> Self {
        Self {
            history_path: PathBuf::from("data/calls.json"),
            metric_window: 100,
            sweep_interval_secs: 300, // 5 minutes
            orphan_without_metrics_secs: 600,
            orphan_max_age_secs: 1800,
            default_history_limit: 100,
        }
    }
}

impl CallManagerConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}
