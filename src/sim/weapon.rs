//! Saber tracking
//!
//! Holds the latest controller pose for each hand and derives the blade's
//! bounding volume from it on demand. Also runs the saber-vs-saber clash test
//! and forwards vibration requests to the controllers.

use std::fmt;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::geom::{
    Aabb, ClosestApproach, Cylinder, bounding_box_from_transform, closest_approach_segments,
    cylinder_axis,
};
use crate::settings::WeaponSettings;

/// Which hand holds a saber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    pub const BOTH: [Hand; 2] = [Hand::Left, Hand::Right];

    #[inline]
    fn index(self) -> usize {
        match self {
            Hand::Left => 0,
            Hand::Right => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Hand::Left => "left",
            Hand::Right => "right",
        }
    }
}

/// Controller pose: grip position plus orientation (local +y runs up the blade)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quat,
}

impl Pose {
    pub fn new(position: Vec3, orientation: Quat) -> Self {
        Self {
            position,
            orientation,
        }
    }
}

/// Vibration output of a controller
pub trait HapticChannel {
    /// Fire-and-forget pulse; `intensity` is 0.0 - 1.0
    fn pulse(&mut self, intensity: f32, duration_ms: u32);
}

/// World-space volume of a blade
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeaponVolume {
    /// Broad-phase box enclosing the blade
    pub bounds: Aabb,
    pub cylinder: Cylinder,
}

impl WeaponVolume {
    pub fn from_pose(pose: &Pose, dims: &WeaponSettings) -> Self {
        let axis = cylinder_axis(pose.position, pose.orientation, dims.blade_length);
        let half_extents = Vec3::new(dims.blade_radius, dims.blade_length * 0.5, dims.blade_radius);
        Self {
            bounds: bounding_box_from_transform(axis.origin, pose.orientation, half_extents),
            cylinder: Cylinder {
                axis,
                length: dims.blade_length,
                radius: dims.blade_radius,
            },
        }
    }
}

/// Outcome of the clash test
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClashResult {
    /// At least one saber has no pose yet
    Untracked,
    Apart,
    Touching { point_left: Vec3, point_right: Vec3 },
}

impl ClashResult {
    #[inline]
    pub fn intersects(&self) -> bool {
        matches!(self, ClashResult::Touching { .. })
    }
}

#[derive(Default)]
struct Saber {
    pose: Option<Pose>,
    volume: Option<WeaponVolume>,
    /// Pose changed since `volume` was derived
    dirty: bool,
    haptic: Option<Box<dyn HapticChannel>>,
}

/// Pose and volume state for both sabers
pub struct WeaponTracker {
    dims: WeaponSettings,
    sabers: [Saber; 2],
    /// Result of the most recent clash test
    clashing: bool,
}

impl fmt::Debug for WeaponTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeaponTracker")
            .field("dims", &self.dims)
            .field("left_pose", &self.sabers[0].pose)
            .field("right_pose", &self.sabers[1].pose)
            .field("clashing", &self.clashing)
            .finish()
    }
}

impl WeaponTracker {
    pub fn new(dims: WeaponSettings) -> Self {
        Self {
            dims,
            sabers: Default::default(),
            clashing: false,
        }
    }

    pub fn dims(&self) -> &WeaponSettings {
        &self.dims
    }

    /// Store a new pose; the volume is derived lazily
    pub fn update_pose(&mut self, hand: Hand, position: Vec3, orientation: Quat) {
        let saber = &mut self.sabers[hand.index()];
        saber.pose = Some(Pose::new(position, orientation));
        saber.dirty = true;
    }

    pub fn pose(&self, hand: Hand) -> Option<Pose> {
        self.sabers[hand.index()].pose
    }

    /// Forget a pose (controller lost tracking)
    pub fn clear_pose(&mut self, hand: Hand) {
        let saber = &mut self.sabers[hand.index()];
        saber.pose = None;
        saber.volume = None;
        saber.dirty = false;
    }

    /// Blade volume for `hand`, or `None` if the hand has never been tracked
    pub fn bounding_volume(&mut self, hand: Hand) -> Option<WeaponVolume> {
        let dims = self.dims;
        let saber = &mut self.sabers[hand.index()];
        let pose = saber.pose?;
        if saber.dirty || saber.volume.is_none() {
            saber.volume = Some(WeaponVolume::from_pose(&pose, &dims));
            saber.dirty = false;
        }
        saber.volume
    }

    /// Whether the last clash test found the sabers touching
    pub fn is_clashing(&self) -> bool {
        self.clashing
    }

    /// Saber-vs-saber test: box overlap first, then the exact cylinder test
    pub fn test_weapon_clash(&mut self) -> ClashResult {
        let (Some(left), Some(right)) = (self.bounding_volume(Hand::Left), self.bounding_volume(Hand::Right))
        else {
            self.clashing = false;
            return ClashResult::Untracked;
        };

        let result = clash_between(&left, &right);
        self.clashing = result.intersects();
        result
    }

    /// Attach a controller's vibration output
    pub fn set_haptic_channel(&mut self, hand: Hand, channel: Box<dyn HapticChannel>) {
        self.sabers[hand.index()].haptic = Some(channel);
    }

    /// Pulse a controller; silently skipped when no channel is attached
    pub fn trigger_haptic(&mut self, hand: Hand, intensity: f32, duration_ms: u32) {
        match self.sabers[hand.index()].haptic.as_mut() {
            Some(channel) => channel.pulse(intensity.clamp(0.0, 1.0), duration_ms),
            None => log::trace!("No haptic channel for {} hand", hand.as_str()),
        }
    }
}

fn clash_between(left: &WeaponVolume, right: &WeaponVolume) -> ClashResult {
    if !left.bounds.intersects(&right.bounds) {
        return ClashResult::Apart;
    }
    let ClosestApproach {
        intersects,
        point_a,
        point_b,
    } = closest_approach_segments(&left.cylinder, &right.cylinder);
    if intersects {
        ClashResult::Touching {
            point_left: point_a,
            point_right: point_b,
        }
    } else {
        ClashResult::Apart
    }
}
