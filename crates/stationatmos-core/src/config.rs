//! Engine configuration.

use serde::{Deserialize, Serialize};
use stationatmos_logic::constants::ATMOS_TICK_RATE;

/// Tuning knobs for `AtmosEngine`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtmosConfig {
    /// Simulation ticks per second.
    pub tick_rate: f32,
    /// Diffuse gas between neighbouring tiles each tick.
    pub tile_equalization: bool,
    /// Most ticks one `update` call may run to catch up.
    pub max_frame_ticks: u32,
}

impl Default for AtmosConfig {
    fn default() -> Self {
        Self {
            tick_rate: ATMOS_TICK_RATE,
            tile_equalization: true,
            max_frame_ticks: 5,
        }
    }
}

impl AtmosConfig {
    /// Seconds per tick. Non-positive rates fall back to the default.
    pub fn tick_interval(&self) -> f32 {
        if self.tick_rate > 0.0 {
            1.0 / self.tick_rate
        } else {
            1.0 / ATMOS_TICK_RATE
        }
    }

    pub fn from_json(json: &str) -> Result<Self, crate::AtmosError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = AtmosConfig::from_json(r#"{ "tick_rate": 30.0 }"#).unwrap();
        assert_eq!(config.tick_rate, 30.0);
        assert!(config.tile_equalization);
        assert_eq!(config.max_frame_ticks, 5);
    }

    #[test]
    fn test_bad_rate_falls_back() {
        let config = AtmosConfig {
            tick_rate: 0.0,
            ..Default::default()
        };
        assert!((config.tick_interval() - 1.0 / ATMOS_TICK_RATE).abs() < 1e-6);
    }
}
