//! Tuning parameters of the steering engine

use botnav_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Thresholds and distances used by local steering and vertical traversal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringConfig {
    /// Crouch under low obstacles when the species can
    pub autocrouch: bool,
    /// Minimal height of the next corner above the actor for upward movement
    pub upward_navcon_min_height: f32,
    /// Degrees added to the leap angle when leaping upward
    pub upward_leap_angle_corr: f32,
    /// How far below the desired height the jetpack landing starts
    pub jetpack_landing_z: f32,
    /// How far above the desired height the jetpack is stopped
    pub jetpack_overshoot_z: f32,
    /// Doors and movers are ignored while stuck for less than this
    pub ignore_geometry_ms: i64,
    /// Stuck for longer than this reports failure
    pub soft_stuck_ms: i64,
    /// Length of the forward obstacle sweep
    pub obstacle_avoid_range: f32,
    /// Largest step walked without jumping
    pub step_size: f32,
    /// Angle between two detour headings
    pub detour_step_deg: f32,
    /// Widest detour heading on either side
    pub detour_max_deg: f32,
    /// Moving this far from the stuck anchor counts as progress
    pub stuck_radius: f32,
    /// Below this stamina humans walk instead of running
    pub low_stamina: i32,
    /// Fuel of a full jetpack
    pub jetpack_fuel_max: i32,
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            autocrouch: true,
            upward_navcon_min_height: 100.0,
            upward_leap_angle_corr: 20.0,
            jetpack_landing_z: 100.0,
            jetpack_overshoot_z: 0.0,
            ignore_geometry_ms: 1700,
            soft_stuck_ms: 5000,
            obstacle_avoid_range: 20.0,
            step_size: 18.0,
            detour_step_deg: 15.0,
            detour_max_deg: 75.0,
            stuck_radius: 64.0,
            low_stamina: 100,
            jetpack_fuel_max: 6000,
        }
    }
}

impl SteeringConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_autocrouch(mut self, autocrouch: bool) -> Self {
        self.autocrouch = autocrouch;
        self
    }

    pub fn with_upward_navcon_min_height(mut self, height: f32) -> Self {
        self.upward_navcon_min_height = height;
        self
    }

    pub fn with_jetpack_landing_z(mut self, z: f32) -> Self {
        self.jetpack_landing_z = z;
        self
    }

    pub fn with_jetpack_overshoot_z(mut self, z: f32) -> Self {
        self.jetpack_overshoot_z = z;
        self
    }

    pub fn with_ignore_geometry_ms(mut self, ms: i64) -> Self {
        self.ignore_geometry_ms = ms;
        self
    }

    pub fn with_soft_stuck_ms(mut self, ms: i64) -> Self {
        self.soft_stuck_ms = ms;
        self
    }

    pub fn with_detour_angles(mut self, step_deg: f32, max_deg: f32) -> Self {
        self.detour_step_deg = step_deg;
        self.detour_max_deg = max_deg;
        self
    }

    /// Loads a JSON file, missing fields keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
            .map_err(|e| Error::InvalidConfig(format!("{}: {e}", path.display())))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.obstacle_avoid_range <= 0.0 {
            return Err(Error::InvalidConfig(
                "Obstacle avoid range must be positive".to_string(),
            ));
        }
        if self.step_size < 0.0 {
            return Err(Error::InvalidConfig(
                "Step size cannot be negative".to_string(),
            ));
        }
        if self.detour_step_deg <= 0.0 || self.detour_max_deg < self.detour_step_deg {
            return Err(Error::InvalidConfig(format!(
                "Invalid detour angles: step {} max {}",
                self.detour_step_deg, self.detour_max_deg
            )));
        }
        if self.detour_max_deg > 180.0 {
            return Err(Error::InvalidConfig(
                "Detours cannot look behind the actor".to_string(),
            ));
        }
        if self.ignore_geometry_ms < 0 || self.soft_stuck_ms < 0 {
            return Err(Error::InvalidConfig(
                "Stuck thresholds cannot be negative".to_string(),
            ));
        }
        if self.jetpack_fuel_max <= 0 {
            return Err(Error::InvalidConfig(
                "Jetpack fuel capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of detour headings on each side
    pub fn detour_count(&self) -> usize {
        (self.detour_max_deg / self.detour_step_deg).floor() as usize
    }
}
