//! Engine configuration. Every field has a default, so partial files load.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellgridConfig {
    pub simulation: SimulationConfig,
    pub stats: StatsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seconds simulated by one graph step.
    pub time_step: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self { time_step: 0.05 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Number of ticks averaged.
    pub window: usize,
    /// Ticks between statistics log lines.
    pub log_interval: u32,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            window: 100,
            log_interval: 100,
        }
    }
}
