//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must stay free of rendering,
//! audio and platform dependencies:
//! - Single-threaded; everything runs inside `tick` or host input callbacks
//! - Stable iteration order (targets in spawn order, left saber before right)
//! - Playback position and poses come from the host every frame

pub mod geom;
pub mod scheduler;
pub mod session;
pub mod target;
pub mod tick;
pub mod weapon;

pub use geom::{Aabb, ClosestApproach, Cylinder, CylinderAxis, closest_approach_segments};
pub use scheduler::{AdvanceReport, Scheduler};
pub use session::{
    HitEvent, PlaybackCallbacks, Session, SessionEvent, SessionInput, SessionState,
};
pub use target::{CutDirection, NoteKind, Target, TargetHit, Wall, WallKind};
pub use tick::{TickInput, TickOutcome, tick};
pub use weapon::{ClashResult, Hand, HapticChannel, Pose, WeaponTracker};
