//! Pool configuration.
//!
//! All tunables the surrounding system exposes at runtime live here, with
//! defaults matching the sizing the pool was designed around: pool length
//! as a ratio of total memory, a reserved free-memory floor, and the
//! thresholds driving the background refill heuristic.

use serde::Deserialize;
use std::path::Path;

use crate::page::PAGES_PER_MB;

/// Default pool size ratio: this many 1024ths of total memory.
pub const DEFAULT_SIZE_RATIO: u32 = 42;

/// Default reserved floor of free system memory, in megabytes. Refill never
/// dips free memory below this.
pub const DEFAULT_RESERVED_FLOOR_MB: u32 = 128;

/// Default minimum number of empty ring slots before the refill worker is
/// worth waking.
pub const DEFAULT_FILL_THRESHOLD: u32 = 1024;

/// Default occupancy below which a non-zero-fill pool asks for a refill.
/// Above this, frees from the rest of the system are expected to top the
/// pool off for free.
pub const DEFAULT_ZERO_FILL_MIN: u32 = 256;

fn default_enabled() -> bool {
    true
}

fn default_size_ratio() -> u32 {
    DEFAULT_SIZE_RATIO
}

fn default_reserved_floor_mb() -> u32 {
    DEFAULT_RESERVED_FLOOR_MB
}

fn default_fill_threshold() -> u32 {
    DEFAULT_FILL_THRESHOLD
}

fn default_zero_fill_min() -> u32 {
    DEFAULT_ZERO_FILL_MIN
}

/// Page pool configuration loaded from TOML or built in code.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolConfig {
    /// Whether pooling is enabled at startup.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Deliver only pre-zeroed pages. Forces the background worker to
    /// allocate fresh pages rather than rely on recycled ones.
    #[serde(default)]
    pub zero_fill: bool,

    /// Explicit pool length in pages. When unset, the length is derived
    /// from `size_ratio` and total system memory.
    #[serde(default)]
    pub length: Option<u32>,

    /// Pool size as 1024ths of total memory, used when `length` is unset.
    #[serde(default = "default_size_ratio")]
    pub size_ratio: u32,

    /// Free system memory that must remain untouched by refill, in MB.
    #[serde(default = "default_reserved_floor_mb")]
    pub reserved_floor_mb: u32,

    /// Minimum empty ring slots before waking the refill worker.
    #[serde(default = "default_fill_threshold")]
    pub fill_threshold: u32,

    /// Occupancy below which a non-zero-fill pool requests refill.
    #[serde(default = "default_zero_fill_min")]
    pub zero_fill_min: u32,

    /// Pages to fill at construction time. `Some(0)` fills the whole pool.
    #[serde(default)]
    pub prefill: Option<u32>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            zero_fill: false,
            length: None,
            size_ratio: DEFAULT_SIZE_RATIO,
            reserved_floor_mb: DEFAULT_RESERVED_FLOOR_MB,
            fill_threshold: DEFAULT_FILL_THRESHOLD,
            zero_fill_min: DEFAULT_ZERO_FILL_MIN,
            prefill: None,
        }
    }
}

impl PoolConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: PoolConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// The reserved floor converted to pages.
    pub fn reserved_floor_pages(&self) -> u32 {
        self.reserved_floor_mb.saturating_mul(PAGES_PER_MB)
    }

    /// Pool length for a system with `total_pages` of memory: the explicit
    /// override when set, otherwise `size_ratio` 1024ths of total.
    pub fn target_length(&self, total_pages: u32) -> u32 {
        match self.length {
            Some(length) => length,
            None => ((total_pages as u64 * self.size_ratio as u64) / 1024) as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PoolConfig::default();
        assert!(config.enabled);
        assert!(!config.zero_fill);
        assert_eq!(config.size_ratio, 42);
        assert_eq!(config.reserved_floor_mb, 128);
        assert_eq!(config.fill_threshold, 1024);
        assert_eq!(config.zero_fill_min, 256);
        assert_eq!(config.prefill, None);
    }

    #[test]
    fn test_reserved_floor_pages() {
        let config = PoolConfig::default();
        assert_eq!(config.reserved_floor_pages(), 128 * 256);
    }

    #[test]
    fn test_target_length_from_ratio() {
        let config = PoolConfig::default();
        // 1 GB system: 262144 pages * 42 / 1024 = 10752 pages (42 MB).
        assert_eq!(config.target_length(262_144), 10_752);
    }

    #[test]
    fn test_target_length_override() {
        let config = PoolConfig {
            length: Some(512),
            ..Default::default()
        };
        assert_eq!(config.target_length(262_144), 512);
    }

    #[test]
    fn test_parse_toml() {
        let config: PoolConfig = toml::from_str(
            r#"
            enabled = true
            zero_fill = true
            length = 2048
            reserved_floor_mb = 64
            "#,
        )
        .unwrap();
        assert!(config.zero_fill);
        assert_eq!(config.length, Some(2048));
        assert_eq!(config.reserved_floor_mb, 64);
        // Unspecified fields keep their defaults.
        assert_eq!(config.fill_threshold, 1024);
    }

    #[test]
    fn test_parse_rejects_unknown_fields() {
        let result: Result<PoolConfig, _> = toml::from_str("no_such_field = 1");
        assert!(result.is_err());
    }
}
