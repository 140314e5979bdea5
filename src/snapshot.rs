use std::collections::BTreeMap;

use serde::Serialize;

use crate::input::KeyCode;

/// Point-in-time view of an aggregator, taken under one lock so the figures
/// agree with each other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub instant_apm: u32,
    pub instant_clicks_per_minute: u32,
    pub instant_movement_per_minute: u32,
    pub instant_pixels_per_minute: u64,
    pub total_actions: u64,
    pub total_mouse_clicks: u64,
    pub total_pixels: u64,
    /// One value per history bucket, oldest first.
    pub historical_apm: Vec<u64>,
    pub key_presses: BTreeMap<KeyCode, u64>,
}

impl MetricsSnapshot {
    pub fn key_presses_for(&self, code: KeyCode) -> u64 {
        self.key_presses.get(&code).copied().unwrap_or(0)
    }

    /// Highest bucket in the history, for scaling a bar graph.
    pub fn peak_historical_apm(&self) -> u64 {
        self.historical_apm.iter().copied().max().unwrap_or(0)
    }

    /// Mean over buckets that saw any actions.
    pub fn average_historical_apm(&self) -> f64 {
        let active: Vec<u64> = self.historical_apm.iter().copied().filter(|&v| v > 0).collect();
        if active.is_empty() {
            0.0
        } else {
            active.iter().sum::<u64>() as f64 / active.len() as f64
        }
    }

    pub fn format_status_line(&self) -> String {
        format!(
            "APM: {:>4} | CPM: {:>4} | MPM: {:>4} | PPM: {:>6} | Actions: {} | Clicks: {} | \
             Pixels: {} | Hist avg: {:>6.1} | Hist peak: {:>4}",
            self.instant_apm,
            self.instant_clicks_per_minute,
            self.instant_movement_per_minute,
            self.instant_pixels_per_minute,
            self.total_actions,
            self.total_mouse_clicks,
            self.total_pixels,
            self.average_historical_apm(),
            self.peak_historical_apm(),
        )
    }
}
