//! Beatmap input records
//!
//! Raw notes and obstacles exactly as they appear in the beatmap file. Both
//! the camelCase layout (`timeBeats`, `laneIndex`, ...) and the underscore
//! layout of the legacy map format (`_time`, `_lineIndex`, ...) are
//! accepted. Integer fields are kept wide here so out-of-range values reach
//! validation instead of failing inside serde with a less useful message.

use serde::{Deserialize, Serialize};

use crate::consts::{LANE_COUNT, LAYER_COUNT};
use crate::error::{Result, SimError};
use crate::sim::target::{CutDirection, NoteKind, TargetSpec, WallKind, WallSpec};

/// A single note record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    #[serde(alias = "_time")]
    pub time_beats: f32,
    #[serde(alias = "_lineIndex")]
    pub lane_index: i64,
    #[serde(alias = "_lineLayer")]
    pub lane_layer: i64,
    #[serde(alias = "_cutDirection")]
    pub cut_direction: i64,
    /// 0 = left, 1 = right, 2 = either hand, 3 = bomb
    #[serde(rename = "type", alias = "_type")]
    pub note_type: i64,
}

impl Note {
    /// Validate into a typed target description; `index` is only used for errors
    pub fn to_spec(&self, index: usize) -> Result<TargetSpec> {
        let cut_direction = CutDirection::try_from(self.cut_direction).map_err(|value| {
            SimError::InvalidCutDirection {
                note_index: index,
                value,
            }
        })?;
        let kind = NoteKind::try_from(self.note_type).map_err(|value| SimError::InvalidNoteType {
            note_index: index,
            value,
        })?;
        let in_grid = (0..LANE_COUNT as i64).contains(&self.lane_index)
            && (0..LAYER_COUNT as i64).contains(&self.lane_layer);
        if !in_grid {
            return Err(SimError::InvalidLane {
                note_index: index,
                lane_index: self.lane_index,
                lane_layer: self.lane_layer,
            });
        }

        Ok(TargetSpec {
            time_beats: self.time_beats,
            lane_index: self.lane_index as u8,
            lane_layer: self.lane_layer as u8,
            cut_direction,
            kind,
        })
    }
}

/// A single obstacle record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Obstacle {
    #[serde(alias = "_time")]
    pub time_beats: f32,
    #[serde(alias = "_duration")]
    pub duration_beats: f32,
    #[serde(alias = "_lineIndex")]
    pub lane_index: i64,
    /// Width in lanes
    #[serde(alias = "_width")]
    pub width: i64,
    /// 0 = full height, 1 = crouch
    #[serde(rename = "type", alias = "_type")]
    pub obstacle_type: i64,
}

impl Obstacle {
    pub fn to_spec(&self, index: usize) -> Result<WallSpec> {
        let kind = WallKind::try_from(self.obstacle_type).map_err(|value| {
            SimError::InvalidObstacleType {
                obstacle_index: index,
                value,
            }
        })?;

        Ok(WallSpec {
            time_beats: self.time_beats,
            duration_beats: self.duration_beats.max(0.0),
            lane_index: self.lane_index.clamp(0, LANE_COUNT as i64 - 1) as u8,
            width: self.width.clamp(1, LANE_COUNT as i64) as u8,
            kind,
        })
    }
}

/// A complete beatmap (one difficulty)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Beatmap {
    /// Tempo, when the map file carries it
    #[serde(default, alias = "_beatsPerMinute", skip_serializing_if = "Option::is_none")]
    pub bpm: Option<f32>,
    #[serde(default, alias = "_notes")]
    pub notes: Vec<Note>,
    #[serde(default, alias = "_obstacles")]
    pub obstacles: Vec<Obstacle>,
}

impl Beatmap {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a beatmap file (native only)
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

/// Tempo and travel speed for a beatmap
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeatmapInfo {
    /// Beats per minute
    pub bpm: f32,
    /// Meters per second the world scrolls toward the player
    pub note_jump_speed: f32,
}

#[derive(Deserialize)]
struct InfoRecord {
    #[serde(rename = "_beatsPerMinute")]
    bpm: f32,
    #[serde(rename = "_difficultyBeatmapSets", default)]
    sets: Vec<DifficultySet>,
}

#[derive(Deserialize)]
struct DifficultySet {
    #[serde(rename = "_difficultyBeatmaps", default)]
    beatmaps: Vec<DifficultyBeatmap>,
}

#[derive(Deserialize)]
struct DifficultyBeatmap {
    #[serde(rename = "_difficulty")]
    difficulty: String,
    #[serde(rename = "_noteJumpMovementSpeed")]
    note_jump_speed: f32,
}

impl BeatmapInfo {
    pub fn new(bpm: f32, note_jump_speed: f32) -> Self {
        Self { bpm, note_jump_speed }
    }

    /// Read bpm and the named difficulty's jump speed from an Info record
    pub fn from_info_json(json: &str, difficulty: &str) -> Result<Self> {
        let record: InfoRecord = serde_json::from_str(json)?;
        let speed = record
            .sets
            .iter()
            .flat_map(|set| set.beatmaps.iter())
            .find(|b| b.difficulty.eq_ignore_ascii_case(difficulty))
            .map(|b| b.note_jump_speed)
            .ok_or_else(|| SimError::UnknownDifficulty(difficulty.to_string()))?;

        let info = Self::new(record.bpm, speed);
        info.validate()?;
        Ok(info)
    }

    pub fn validate(&self) -> Result<()> {
        let ok = |v: f32| v.is_finite() && v > 0.0;
        if ok(self.bpm) && ok(self.note_jump_speed) {
            Ok(())
        } else {
            Err(SimError::InvalidTempo {
                bpm: self.bpm,
                speed: self.note_jump_speed,
            })
        }
    }
}
