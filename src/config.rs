use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, WindowError};
use crate::input::{KeyCode, MouseButton};

/// Capacity and time-to-live of one expiring window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub capacity: usize,
    pub ttl_ms: u64,
}

impl WindowConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    fn validate(&self, name: &str) -> Result<(), WindowError> {
        if self.capacity == 0 {
            return Err(WindowError::InvalidConfig(format!("{name}: capacity must be positive")));
        }
        if self.ttl_ms == 0 {
            return Err(WindowError::InvalidConfig(format!("{name}: ttl_ms must be positive")));
        }
        Ok(())
    }
}

/// Bucket layout of the historical action-rate window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryConfig {
    pub buckets: usize,
    pub bucket_ms: u64,
}

impl HistoryConfig {
    pub fn bucket_duration(&self) -> Duration {
        Duration::from_millis(self.bucket_ms)
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        // One graph bar per bucket: 15 minutes of history.
        Self { buckets: 180, bucket_ms: 5_000 }
    }
}

/// Everything a [`crate::MetricsAggregator`] needs at construction. Any field
/// missing from a config file falls back to its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Recent actions, for instant APM. ~1000 APM is about 16 per second, so
    /// 32 slots over one second leave headroom.
    pub actions: WindowConfig,
    pub clicks: WindowConfig,
    pub movement: WindowConfig,
    /// Recent pointer moves. Hooks report moves at the polling rate, so this
    /// one needs far more slots than the others.
    pub pixels: WindowConfig,
    pub history: HistoryConfig,

    pub action_keys: BTreeSet<KeyCode>,
    /// Keys that also count as movement. Only counted when they are action keys.
    pub movement_keys: BTreeSet<KeyCode>,
    pub action_buttons: BTreeSet<MouseButton>,
    pub click_buttons: BTreeSet<MouseButton>,

    /// Character shown for a key code, used to look up per-key totals by
    /// character (`{tk:w}`).
    pub key_labels: BTreeMap<KeyCode, char>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            actions: WindowConfig { capacity: 32, ttl_ms: 1_000 },
            clicks: WindowConfig { capacity: 20, ttl_ms: 3_000 },
            movement: WindowConfig { capacity: 40, ttl_ms: 3_000 },
            pixels: WindowConfig { capacity: 1_024, ttl_ms: 1_000 },
            history: HistoryConfig::default(),
            // W A S D, LCtrl, Space, Q E R T, F, LShift
            action_keys: keys(&[17, 30, 31, 32, 29, 57, 16, 18, 19, 20, 33, 42]),
            movement_keys: keys(&[17, 30, 31, 32, 29, 57]),
            // left, right, middle, mouse5
            action_buttons: buttons(&[1, 2, 3, 5]),
            click_buttons: buttons(&[1, 2]),
            key_labels: [
                (16, 'q'),
                (17, 'w'),
                (18, 'e'),
                (19, 'r'),
                (20, 't'),
                (30, 'a'),
                (31, 's'),
                (32, 'd'),
                (33, 'f'),
                (57, ' '),
            ]
            .into_iter()
            .map(|(code, c)| (KeyCode(code), c))
            .collect(),
        }
    }
}

fn keys(codes: &[u32]) -> BTreeSet<KeyCode> {
    codes.iter().map(|&c| KeyCode(c)).collect()
}

fn buttons(codes: &[u32]) -> BTreeSet<MouseButton> {
    codes.iter().map(|&c| MouseButton(c)).collect()
}

impl AggregatorConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), WindowError> {
        self.actions.validate("actions")?;
        self.clicks.validate("clicks")?;
        self.movement.validate("movement")?;
        self.pixels.validate("pixels")?;
        if self.history.buckets == 0 {
            return Err(WindowError::InvalidConfig("history: buckets must be positive".into()));
        }
        if self.history.bucket_ms == 0 {
            return Err(WindowError::InvalidConfig("history: bucket_ms must be positive".into()));
        }
        Ok(())
    }

    /// Key code labelled with `c`, compared case-insensitively.
    pub fn key_for_char(&self, c: char) -> Option<KeyCode> {
        let c = c.to_ascii_lowercase();
        self.key_labels
            .iter()
            .find(|(_, label)| label.to_ascii_lowercase() == c)
            .map(|(&code, _)| code)
    }

    pub(crate) fn tracks_key(&self, code: KeyCode) -> bool {
        self.action_keys.contains(&code)
    }
}
