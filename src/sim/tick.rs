//! Per-frame simulation tick
//!
//! Applies one frame in the order collisions depend on: advance the
//! playhead, take the new saber poses, clash test, then target collisions.
//! Nothing runs outside `map-playing`.

use glam::{Quat, Vec3};

use super::scheduler::AdvanceReport;
use super::session::{HitEvent, Session, SessionEvent, SessionState};
use super::weapon::{ClashResult, Hand, Pose, WeaponTracker};

/// Where idle autopilot sabers rest, clear of every lane
const REST_X: f32 = 1.0;
const REST_Y: f32 = 0.6;

/// Host input for a single frame
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Playback position (meters travelled) reported by the audio clock
    pub position: f32,
    /// Latest left controller pose, if tracked this frame
    pub left: Option<Pose>,
    pub right: Option<Pose>,
    /// Demo mode - sabers steer themselves through upcoming targets
    pub autopilot: bool,
}

/// What happened during a frame
#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    pub window: AdvanceReport,
    pub clash: Option<ClashResult>,
    pub hits: Vec<HitEvent>,
}

/// Advance the session by one frame
pub fn tick(session: &mut Session, weapons: &mut WeaponTracker, input: &TickInput) -> TickOutcome {
    if session.state() != SessionState::MapPlaying {
        return TickOutcome::default();
    }

    let window = session.advance(input.position);

    let mut input = input.clone();
    if input.autopilot {
        input.left = Some(autopilot_pose(session, weapons, Hand::Left));
        input.right = Some(autopilot_pose(session, weapons, Hand::Right));
    }
    for (hand, pose) in [(Hand::Left, input.left), (Hand::Right, input.right)] {
        if let Some(pose) = pose {
            weapons.update_pose(hand, pose.position, pose.orientation);
        }
    }

    let was_clashing = weapons.is_clashing();
    let clash = weapons.test_weapon_clash();
    if let ClashResult::Touching {
        point_left,
        point_right,
    } = clash
    {
        // Pulse only on the first frame of contact
        if !was_clashing {
            let haptics = session.settings().haptics;
            for hand in Hand::BOTH {
                weapons.trigger_haptic(hand, haptics.clash_intensity, haptics.clash_duration_ms);
            }
            session.emit(SessionEvent::WeaponClash {
                point_left,
                point_right,
            });
        }
    }

    let hits = session.test_collisions(weapons);
    log::trace!(
        "Tick beat={:.3} live={} hits={}",
        session.current_beat(),
        session.scheduler().targets().len(),
        hits.len()
    );

    TickOutcome {
        window,
        clash: Some(clash),
        hits,
    }
}

/// Pose that runs `hand`'s blade through the nearest target it can score on
fn autopilot_pose(session: &Session, weapons: &WeaponTracker, hand: Hand) -> Pose {
    let scheduler = session.scheduler();
    let half_blade = weapons.dims().blade_length * 0.5;

    let next = scheduler.info().and_then(|info| {
        let beat = scheduler.current_beat();
        scheduler
            .targets()
            .iter()
            .filter(|t| t.is_testable() && !t.is_hit() && t.spec.kind.scores_for(hand))
            .min_by(|a, b| a.spec.time_beats.total_cmp(&b.spec.time_beats))
            .map(|t| t.world_transform(beat, info.bpm, info.note_jump_speed).0)
    });

    match next {
        Some(center) => Pose::new(center - Vec3::Y * half_blade, Quat::IDENTITY),
        None => {
            let x = match hand {
                Hand::Left => -REST_X,
                Hand::Right => REST_X,
            };
            Pose::new(Vec3::new(x, REST_Y, 0.0), Quat::IDENTITY)
        }
    }
}
