//! Targets (cuttable notes and bombs) and walls
//!
//! A target is spawned by the scheduler, becomes testable as it nears the
//! player, and can be hit exactly once. Walls share the spawn/evict lifecycle
//! but never take hits.

use std::f32::consts::PI;
use std::fmt;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::geom::{Aabb, bounding_box_from_transform};
use super::weapon::Hand;
use crate::consts::*;
use crate::error::{Result, SimError};
use crate::{beats_to_position, lane_position};

/// Direction a note expects to be cut from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CutDirection {
    Up,
    Down,
    Left,
    Right,
    UpLeft,
    UpRight,
    DownLeft,
    DownRight,
    Any,
}

impl TryFrom<i64> for CutDirection {
    /// The unrecognized raw value
    type Error = i64;

    fn try_from(value: i64) -> std::result::Result<Self, i64> {
        Ok(match value {
            0 => CutDirection::Up,
            1 => CutDirection::Down,
            2 => CutDirection::Left,
            3 => CutDirection::Right,
            4 => CutDirection::UpLeft,
            5 => CutDirection::UpRight,
            6 => CutDirection::DownLeft,
            7 => CutDirection::DownRight,
            8 => CutDirection::Any,
            other => return Err(other),
        })
    }
}

impl CutDirection {
    /// Roll of the note mesh around the travel (z) axis, radians
    pub fn rotation_z(self) -> f32 {
        match self {
            CutDirection::Up => PI,
            CutDirection::Down => 0.0,
            CutDirection::Left => -PI * 0.5,
            CutDirection::Right => PI * 0.5,
            CutDirection::UpLeft => -PI * 0.75,
            CutDirection::UpRight => PI * 0.75,
            CutDirection::DownLeft => -PI * 0.25,
            CutDirection::DownRight => PI * 0.25,
            CutDirection::Any => 0.0,
        }
    }
}

/// Which saber a note belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteKind {
    Left,
    Right,
    /// Either saber scores
    Either,
    /// Registers hits but never scores
    Bomb,
}

impl TryFrom<i64> for NoteKind {
    type Error = i64;

    fn try_from(value: i64) -> std::result::Result<Self, i64> {
        Ok(match value {
            0 => NoteKind::Left,
            1 => NoteKind::Right,
            2 => NoteKind::Either,
            3 => NoteKind::Bomb,
            other => return Err(other),
        })
    }
}

impl NoteKind {
    /// Counts toward `total_scorable_count`
    pub fn is_scorable(self) -> bool {
        self != NoteKind::Bomb
    }

    /// A hit by `hand` scores on this note
    pub fn scores_for(self, hand: Hand) -> bool {
        match self {
            NoteKind::Left => hand == Hand::Left,
            NoteKind::Right => hand == Hand::Right,
            NoteKind::Either => true,
            NoteKind::Bomb => false,
        }
    }
}

/// Validated note data, as sorted by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub time_beats: f32,
    pub lane_index: u8,
    pub lane_layer: u8,
    pub cut_direction: CutDirection,
    pub kind: NoteKind,
}

/// Emitted by a target the one time it is hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetHit {
    pub target_id: u32,
    /// Whether this hit increments the hit counter
    pub scoring: bool,
}

/// One-shot presentation callback fired when a target is hit
pub type CollisionCallback = Box<dyn FnMut(&TargetHit)>;

/// A live note
pub struct Target {
    pub id: u32,
    pub spec: TargetSpec,
    bounds: Option<Aabb>,
    testable: bool,
    hit: bool,
    on_collision: Option<CollisionCallback>,
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("id", &self.id)
            .field("spec", &self.spec)
            .field("bounds", &self.bounds)
            .field("testable", &self.testable)
            .field("hit", &self.hit)
            .field("has_callback", &self.on_collision.is_some())
            .finish()
    }
}

impl Target {
    pub fn new(id: u32, spec: TargetSpec) -> Self {
        Self {
            id,
            spec,
            bounds: None,
            testable: false,
            hit: false,
            on_collision: None,
        }
    }

    #[inline]
    pub fn is_hit(&self) -> bool {
        self.hit
    }

    #[inline]
    pub fn is_testable(&self) -> bool {
        self.testable
    }

    /// Last computed world bounds (None until first computed while testable)
    #[inline]
    pub fn bounds(&self) -> Option<Aabb> {
        self.bounds
    }

    /// Meters between the target and the player plane (negative once past)
    pub fn distance_to_player(&self, current_beat: f32, bpm: f32, speed: f32) -> f32 {
        beats_to_position(self.spec.time_beats - current_beat, bpm, speed)
    }

    /// World position and orientation of the target mesh
    pub fn world_transform(&self, current_beat: f32, bpm: f32, speed: f32) -> (Vec3, Quat) {
        let distance = self.distance_to_player(current_beat, bpm, speed);
        let position = lane_position(self.spec.lane_index, self.spec.lane_layer) - Vec3::Z * distance;
        let orientation = Quat::from_rotation_z(self.spec.cut_direction.rotation_z());
        (position, orientation)
    }

    /// Latch `testable` once the target is within `threshold` meters
    pub fn update_testable(&mut self, distance: f32, threshold: f32) {
        if !self.testable && distance < threshold {
            self.testable = true;
        }
    }

    /// Refresh world bounds from the current transform (no-op unless testable)
    pub fn recompute_bounds(&mut self, position: Vec3, orientation: Quat) {
        if !self.testable {
            return;
        }
        self.bounds = Some(bounding_box_from_transform(
            position,
            orientation,
            Vec3::splat(BOX_SIZE * 0.5),
        ));
    }

    /// Register the presentation callback; only one per target
    pub fn set_on_collision(&mut self, callback: CollisionCallback) -> Result<()> {
        if self.on_collision.is_some() {
            return Err(SimError::CallbackAlreadySet { target_id: self.id });
        }
        self.on_collision = Some(callback);
        Ok(())
    }

    /// Test a saber's bounds against this target
    ///
    /// Returns `None` without side effects when the target is not testable,
    /// already hit, has no bounds yet, or does not overlap. On overlap the
    /// target latches `hit`, fires its callback once and reports whether the
    /// hit scores (never for bombs).
    pub fn test_collision(&mut self, weapon_bounds: &Aabb, counts_for_score: bool) -> Option<TargetHit> {
        if !self.testable || self.hit {
            return None;
        }
        let bounds = self.bounds?;
        if !bounds.intersects(weapon_bounds) {
            return None;
        }

        self.hit = true;
        let hit = TargetHit {
            target_id: self.id,
            scoring: counts_for_score && self.spec.kind.is_scorable(),
        };
        if let Some(callback) = self.on_collision.as_mut() {
            callback(&hit);
        }
        Some(hit)
    }
}

/// Obstacle shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WallKind {
    /// Floor to head height across its lanes
    FullHeight,
    /// Overhead bar across every lane
    Crouch,
}

impl TryFrom<i64> for WallKind {
    type Error = i64;

    fn try_from(value: i64) -> std::result::Result<Self, i64> {
        match value {
            0 => Ok(WallKind::FullHeight),
            1 => Ok(WallKind::Crouch),
            other => Err(other),
        }
    }
}

/// Validated obstacle data
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WallSpec {
    pub time_beats: f32,
    pub duration_beats: f32,
    pub lane_index: u8,
    /// Lanes covered, starting at `lane_index`
    pub width: u8,
    pub kind: WallKind,
}

/// A live obstacle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wall {
    pub id: u32,
    pub spec: WallSpec,
}

impl Wall {
    pub fn new(id: u32, spec: WallSpec) -> Self {
        Self { id, spec }
    }

    /// Beat at which the wall's far end reaches the player
    #[inline]
    pub fn end_beats(&self) -> f32 {
        self.spec.time_beats + self.spec.duration_beats
    }

    /// World-space extent of the wall for presentation
    pub fn world_bounds(&self, current_beat: f32, bpm: f32, speed: f32) -> Aabb {
        let near_z = -beats_to_position(self.spec.time_beats - current_beat, bpm, speed);
        let far_z = -beats_to_position(self.end_beats() - current_beat, bpm, speed);

        let half_box = BOX_SIZE * 0.5;
        let (x_min, x_max, y_min, y_max) = match self.spec.kind {
            WallKind::FullHeight => {
                let last_lane = (self.spec.lane_index + self.spec.width.max(1) - 1).min(LANE_COUNT - 1);
                (
                    lane_position(self.spec.lane_index, 0).x - half_box,
                    lane_position(last_lane, 0).x + half_box,
                    0.0,
                    WALL_HEIGHT,
                )
            }
            WallKind::Crouch => (
                lane_position(0, 0).x - half_box,
                lane_position(LANE_COUNT - 1, 0).x + half_box,
                CROUCH_WALL_BOTTOM,
                CROUCH_WALL_TOP,
            ),
        };

        Aabb::new(Vec3::new(x_min, y_min, near_z), Vec3::new(x_max, y_max, far_z))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn spec(kind: NoteKind) -> TargetSpec {
        TargetSpec {
            time_beats: 4.0,
            lane_index: 1,
            lane_layer: 0,
            cut_direction: CutDirection::Down,
            kind,
        }
    }

    /// Target at the player plane with bounds computed
    fn ready_target(kind: NoteKind) -> Target {
        let mut target = Target::new(1, spec(kind));
        target.update_testable(0.0, 3.0);
        let (pos, rot) = target.world_transform(4.0, 120.0, 1.0);
        target.recompute_bounds(pos, rot);
        target
    }

    fn saber_box_at(center: Vec3) -> Aabb {
        Aabb::from_center_half_extents(center, Vec3::new(0.03, 0.6, 0.03))
    }

    #[test]
    fn test_every_direction_maps_to_rotation() {
        for raw in 0..=8 {
            let dir = CutDirection::try_from(raw).unwrap();
            assert!(dir.rotation_z().is_finite());
        }
        assert_eq!(CutDirection::try_from(9), Err(9));
        assert_eq!(CutDirection::try_from(-1), Err(-1));
    }

    #[test]
    fn test_not_testable_is_noop() {
        let mut target = Target::new(1, spec(NoteKind::Left));
        let (pos, rot) = target.world_transform(4.0, 120.0, 1.0);
        target.recompute_bounds(pos, rot);
        assert!(target.bounds().is_none());
        assert!(target.test_collision(&saber_box_at(pos), true).is_none());
        assert!(!target.is_hit());
    }

    #[test]
    fn test_testable_latches() {
        let mut target = Target::new(1, spec(NoteKind::Left));
        target.update_testable(5.0, 3.0);
        assert!(!target.is_testable());
        target.update_testable(2.9, 3.0);
        assert!(target.is_testable());
        target.update_testable(10.0, 3.0);
        assert!(target.is_testable());
    }

    #[test]
    fn test_hit_fires_callback_once() {
        let mut target = ready_target(NoteKind::Left);
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        target
            .set_on_collision(Box::new(move |_| counter.set(counter.get() + 1)))
            .unwrap();

        let saber = saber_box_at(target.bounds().unwrap().center());
        let hit = target.test_collision(&saber, true).unwrap();
        assert!(hit.scoring);
        assert!(target.is_hit());
        assert!(target.test_collision(&saber, true).is_none());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_second_callback_rejected() {
        let mut target = Target::new(3, spec(NoteKind::Right));
        target.set_on_collision(Box::new(|_| {})).unwrap();
        let err = target.set_on_collision(Box::new(|_| {})).unwrap_err();
        assert!(matches!(err, SimError::CallbackAlreadySet { target_id: 3 }));
    }

    #[test]
    fn test_bomb_hit_never_scores() {
        let mut target = ready_target(NoteKind::Bomb);
        let saber = saber_box_at(target.bounds().unwrap().center());
        let hit = target.test_collision(&saber, true).unwrap();
        assert!(!hit.scoring);
        assert!(target.is_hit());
    }

    #[test]
    fn test_miss_leaves_target_untouched() {
        let mut target = ready_target(NoteKind::Left);
        let far = saber_box_at(Vec3::new(5.0, 5.0, 5.0));
        assert!(target.test_collision(&far, true).is_none());
        assert!(!target.is_hit());
    }

    #[test]
    fn test_scoring_rule_by_hand() {
        assert!(NoteKind::Left.scores_for(Hand::Left));
        assert!(!NoteKind::Left.scores_for(Hand::Right));
        assert!(NoteKind::Either.scores_for(Hand::Right));
        assert!(!NoteKind::Bomb.scores_for(Hand::Left));
    }

    #[test]
    fn test_wall_bounds_span_lanes_and_duration() {
        let wall = Wall::new(
            1,
            WallSpec {
                time_beats: 8.0,
                duration_beats: 2.0,
                lane_index: 0,
                width: 2,
                kind: WallKind::FullHeight,
            },
        );
        // bpm 60, 1 m/s: one beat per meter
        let bounds = wall.world_bounds(6.0, 60.0, 1.0);
        assert!((bounds.max.z - -2.0).abs() < 1e-5);
        assert!((bounds.min.z - -4.0).abs() < 1e-5);
        assert!((bounds.min.x - (lane_position(0, 0).x - BOX_SIZE / 2.0)).abs() < 1e-6);
        assert!((bounds.max.x - (lane_position(1, 0).x + BOX_SIZE / 2.0)).abs() < 1e-6);
        assert_eq!(bounds.min.y, 0.0);
        assert_eq!(bounds.max.y, WALL_HEIGHT);
    }

    proptest! {
        #[test]
        fn prop_hit_is_write_once(offsets in prop::collection::vec((-0.5f32..0.5, -0.5f32..0.5), 1..20)) {
            let mut target = ready_target(NoteKind::Either);
            let center = target.bounds().unwrap().center();
            let mut hits = 0;
            let mut was_hit = false;
            for (dx, dy) in offsets {
                if target.test_collision(&saber_box_at(center + Vec3::new(dx, dy, 0.0)), true).is_some() {
                    hits += 1;
                }
                // once hit, stays hit
                prop_assert!(!was_hit || target.is_hit());
                was_hit = target.is_hit();
            }
            prop_assert!(hits <= 1);
        }
    }
}
