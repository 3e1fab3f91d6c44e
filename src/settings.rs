//! Simulation settings
//!
//! Tunables for the scheduler windows, saber dimensions and haptic pulses.
//! Loaded from JSON; any missing field keeps its default.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Spawn/despawn windowing and collision readiness
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Beats ahead of the playhead at which targets are instantiated
    pub spawn_horizon_beats: f32,
    /// Beats behind the playhead at which targets are evicted
    pub despawn_horizon_beats: f32,
    /// Distance to the player (meters) under which a target becomes testable
    pub testable_distance: f32,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            spawn_horizon_beats: 8.0,
            despawn_horizon_beats: 2.0,
            testable_distance: 3.0,
        }
    }
}

/// Saber blade modelled as a finite cylinder
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaponSettings {
    pub blade_length: f32,
    pub blade_radius: f32,
}

impl Default for WeaponSettings {
    fn default() -> Self {
        Self {
            blade_length: 1.2,
            blade_radius: 0.03,
        }
    }
}

/// Controller vibration pulses
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HapticSettings {
    /// Pulse strength on a target hit (0.0 - 1.0)
    pub hit_intensity: f32,
    pub hit_duration_ms: u32,
    /// Pulse strength when the two sabers start touching (0.0 - 1.0)
    pub clash_intensity: f32,
    pub clash_duration_ms: u32,
}

impl Default for HapticSettings {
    fn default() -> Self {
        Self {
            hit_intensity: 1.0,
            hit_duration_ms: 50,
            clash_intensity: 0.5,
            clash_duration_ms: 30,
        }
    }
}

/// All simulation settings
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub scheduler: SchedulerSettings,
    pub weapon: WeaponSettings,
    pub haptics: HapticSettings,
}

impl Settings {
    /// Parse and validate settings from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file (native only)
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let settings = Self::from_json(&json)?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Check every value is usable by the simulation
    pub fn validate(&self) -> Result<()> {
        let s = &self.scheduler;
        if !s.spawn_horizon_beats.is_finite() || s.spawn_horizon_beats <= 0.0 {
            return Err(invalid(format!(
                "spawn_horizon_beats must be positive, got {}",
                s.spawn_horizon_beats
            )));
        }
        if !s.despawn_horizon_beats.is_finite() || s.despawn_horizon_beats < 0.0 {
            return Err(invalid(format!(
                "despawn_horizon_beats must be non-negative, got {}",
                s.despawn_horizon_beats
            )));
        }
        if !s.testable_distance.is_finite() || s.testable_distance <= 0.0 {
            return Err(invalid(format!(
                "testable_distance must be positive, got {}",
                s.testable_distance
            )));
        }

        let w = &self.weapon;
        if !(w.blade_length > 0.0 && w.blade_length.is_finite()) {
            return Err(invalid(format!("blade_length must be positive, got {}", w.blade_length)));
        }
        if !(w.blade_radius > 0.0 && w.blade_radius.is_finite()) {
            return Err(invalid(format!("blade_radius must be positive, got {}", w.blade_radius)));
        }

        let h = &self.haptics;
        for (name, value) in [("hit_intensity", h.hit_intensity), ("clash_intensity", h.clash_intensity)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(format!("{name} must be within 0..=1, got {value}")));
            }
        }

        Ok(())
    }
}

fn invalid(msg: String) -> SimError {
    SimError::InvalidSettings(msg)
}
