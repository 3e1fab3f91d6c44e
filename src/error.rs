//! Error types
//!
//! Beatmap problems are configuration errors: the whole load is refused.

/// Errors produced while loading beatmaps, settings or wiring callbacks
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// A note carries a cut direction outside 0-8
    #[error("note {note_index}: unrecognized cut direction {value}")]
    InvalidCutDirection { note_index: usize, value: i64 },

    /// A note carries a type other than left/right/either/bomb
    #[error("note {note_index}: unrecognized note type {value}")]
    InvalidNoteType { note_index: usize, value: i64 },

    /// A note sits outside the 4x3 lane grid
    #[error("note {note_index}: lane ({lane_index}, {lane_layer}) outside the grid")]
    InvalidLane {
        note_index: usize,
        lane_index: i64,
        lane_layer: i64,
    },

    /// An obstacle carries an unknown wall type
    #[error("obstacle {obstacle_index}: unrecognized obstacle type {value}")]
    InvalidObstacleType { obstacle_index: usize, value: i64 },

    /// bpm or speed is zero, negative or not finite
    #[error("invalid tempo: bpm={bpm}, speed={speed}")]
    InvalidTempo { bpm: f32, speed: f32 },

    /// The info record has no beatmap for the requested difficulty
    #[error("no difficulty named {0:?} in info record")]
    UnknownDifficulty(String),

    /// A settings value is out of range
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// A target's collision callback may only be registered once
    #[error("target {target_id} already has a collision callback")]
    CallbackAlreadySet { target_id: u32 },

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;
