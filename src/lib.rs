//! Saber Sim - simulation core of a VR rhythm slicing game
//!
//! Core modules:
//! - `beatmap`: Beatmap and info record parsing/validation
//! - `sim`: Deterministic simulation (scheduling, sabers, collisions, session)
//! - `settings`: Data-driven tuning (horizons, blade dimensions, haptics)
//! - `error`: Crate error type

pub mod beatmap;
pub mod error;
pub mod settings;
pub mod sim;

pub use beatmap::{Beatmap, BeatmapInfo};
pub use error::{Result, SimError};
pub use settings::Settings;

use glam::Vec3;

/// World layout constants
pub mod consts {
    /// Target cube edge length (meters)
    pub const BOX_SIZE: f32 = 0.25;
    /// Horizontal distance between lane centers
    pub const LANE_SPACING: f32 = 0.3;
    /// Number of lanes (line indices 0-3)
    pub const LANE_COUNT: u8 = 4;
    /// Number of layers (line layers 0-2)
    pub const LAYER_COUNT: u8 = 3;
    /// Height of the lowest layer's center
    pub const BASE_LAYER_Y: f32 = 0.8;
    /// Vertical distance between layer centers
    pub const LAYER_SPACING: f32 = 0.3;

    /// Full-height walls reach from the floor to this height
    pub const WALL_HEIGHT: f32 = 1.2;
    /// Crouch walls hang between these heights
    pub const CROUCH_WALL_BOTTOM: f32 = 1.0;
    pub const CROUCH_WALL_TOP: f32 = 1.3;

    /// Sine of the angle below which two saber axes are treated as parallel.
    /// The skew solve loses all precision in f32 well before the axes are
    /// exactly parallel; at this angle two blades diverge by about a millimeter.
    pub const PARALLEL_EPSILON: f32 = 1e-3;
    /// Slack on radius comparisons to absorb f32 rounding
    pub const GEOM_EPSILON: f32 = 1e-6;
}

/// Convert a playback position (meters travelled) to beats
///
/// `speed` is in meters per second of playback, so `position / speed` is
/// seconds and `seconds * bpm / 60` is beats.
#[inline]
pub fn position_to_beats(position: f32, bpm: f32, speed: f32) -> f32 {
    position / speed * bpm / 60.0
}

/// Convert a beat time to the playback position (meters) at which it is reached
#[inline]
pub fn beats_to_position(beats: f32, bpm: f32, speed: f32) -> f32 {
    beats * 60.0 / bpm * speed
}

/// World-space center of a grid cell at the player plane (z = 0)
#[inline]
pub fn lane_position(lane_index: u8, lane_layer: u8) -> Vec3 {
    use consts::*;
    let x = lane_index as f32 * LANE_SPACING - LANE_SPACING * (LANE_COUNT as f32 - 1.0) / 2.0;
    let y = BASE_LAYER_Y + lane_layer as f32 * LAYER_SPACING;
    Vec3::new(x, y, 0.0)
}
