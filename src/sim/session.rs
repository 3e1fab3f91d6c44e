//! Session lifecycle
//!
//! The session owns the scheduler (and through it the live targets and
//! walls) plus the hit counters. It reacts to trigger presses and host
//! completion signals, and reports everything presentation needs through
//! subscribed observers.

use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::scheduler::{AdvanceReport, Scheduler};
use super::target::Target;
use super::weapon::{Hand, WeaponTracker};
use crate::beatmap::{Beatmap, BeatmapInfo};
use crate::error::Result;
use crate::settings::Settings;

/// Top-level lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Waiting for the host to be ready
    Idle,
    Menu,
    /// Beatmap and audio are being fetched by the host
    MapLoading,
    MapLoaded,
    MapPlaying,
    MapPaused,
    /// Playback finished; a new session is needed to play again
    MapEnded,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Menu => "menu",
            SessionState::MapLoading => "map-loading",
            SessionState::MapLoaded => "map-loaded",
            SessionState::MapPlaying => "map-playing",
            SessionState::MapPaused => "map-paused",
            SessionState::MapEnded => "map-ended",
        }
    }
}

/// Signals that drive the state machine (beatmap delivery goes through
/// [`Session::load_complete`] since it carries data)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionInput {
    /// Host finished starting up
    Ready,
    /// Controller trigger pressed
    Trigger(Hand),
    /// Audio reached its end
    PlaybackEnded,
}

/// A target was struck
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitEvent {
    pub target_id: u32,
    pub scoring: bool,
    pub hand: Hand,
}

/// Everything presentation may react to
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionEvent {
    StateChanged { from: SessionState, to: SessionState },
    TargetSpawned { id: u32 },
    TargetDespawned { id: u32, was_hit: bool },
    WallSpawned { id: u32 },
    WallDespawned { id: u32 },
    Hit(HitEvent),
    CountersChanged { hit_count: u32, total_scorable: u32 },
    /// The sabers started touching
    WeaponClash { point_left: Vec3, point_right: Vec3 },
}

pub type Observer = Box<dyn FnMut(&SessionEvent)>;

/// Called with every freshly spawned target, e.g. to attach its collision callback
pub type SpawnHook = Box<dyn FnMut(&mut Target)>;

/// Host playback side effects of state transitions
#[derive(Default)]
pub struct PlaybackCallbacks {
    /// menu -> map-loading: start fetching beatmap and audio
    pub on_begin_load: Option<Box<dyn FnMut()>>,
    /// map-loaded -> map-playing
    pub on_play: Option<Box<dyn FnMut()>>,
    /// map-playing -> map-paused
    pub on_pause: Option<Box<dyn FnMut()>>,
    /// map-paused -> map-playing: rewind audio to zero and play
    pub on_reset: Option<Box<dyn FnMut()>>,
}

fn fire(callback: &mut Option<Box<dyn FnMut()>>) {
    if let Some(cb) = callback.as_mut() {
        cb();
    }
}

/// One play session
pub struct Session {
    settings: Settings,
    state: SessionState,
    scheduler: Scheduler,
    hit_count: u32,
    callbacks: PlaybackCallbacks,
    observers: Vec<Observer>,
    spawn_hook: Option<SpawnHook>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("hit_count", &self.hit_count)
            .field("scheduler", &self.scheduler)
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            state: SessionState::Idle,
            scheduler: Scheduler::new(settings.scheduler),
            hit_count: 0,
            callbacks: PlaybackCallbacks::default(),
            observers: Vec::new(),
            spawn_hook: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn hit_count(&self) -> u32 {
        self.hit_count
    }

    pub fn total_scorable_count(&self) -> u32 {
        self.scheduler.total_scorable()
    }

    /// Playhead in beats, for scrolling the world
    pub fn current_beat(&self) -> f32 {
        self.scheduler.current_beat()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn target_mut(&mut self, id: u32) -> Option<&mut Target> {
        self.scheduler.target_mut(id)
    }

    pub fn subscribe(&mut self, observer: Observer) {
        self.observers.push(observer);
    }

    pub fn set_playback_callbacks(&mut self, callbacks: PlaybackCallbacks) {
        self.callbacks = callbacks;
    }

    pub fn set_spawn_hook(&mut self, hook: SpawnHook) {
        self.spawn_hook = Some(hook);
    }

    pub(crate) fn emit(&mut self, event: SessionEvent) {
        for observer in &mut self.observers {
            observer(&event);
        }
    }

    fn transition(&mut self, to: SessionState) {
        let from = self.state;
        self.state = to;
        log::info!("Session {} -> {}", from.as_str(), to.as_str());
        self.emit(SessionEvent::StateChanged { from, to });
    }

    /// Apply an input; returns whether the state changed
    ///
    /// Inputs with no matching transition are ignored.
    pub fn handle(&mut self, input: SessionInput) -> bool {
        use SessionState::*;

        match (self.state, input) {
            (Idle, SessionInput::Ready) => self.transition(Menu),
            (Menu, SessionInput::Trigger(_)) => {
                self.transition(MapLoading);
                fire(&mut self.callbacks.on_begin_load);
            }
            (MapLoaded, SessionInput::Trigger(_)) => {
                self.transition(MapPlaying);
                fire(&mut self.callbacks.on_play);
            }
            (MapPlaying, SessionInput::Trigger(_)) => {
                self.transition(MapPaused);
                fire(&mut self.callbacks.on_pause);
            }
            (MapPaused, SessionInput::Trigger(_)) => {
                self.restart();
                self.transition(MapPlaying);
                fire(&mut self.callbacks.on_reset);
            }
            (MapPlaying, SessionInput::PlaybackEnded) => self.transition(MapEnded),
            (state, input) => {
                log::warn!("Ignoring {:?} in state {}", input, state.as_str());
                return false;
            }
        }
        true
    }

    /// Host finished loading beatmap and audio
    ///
    /// Only meaningful in `map-loading`. A malformed beatmap is refused with
    /// an error and the session stays in `map-loading`.
    pub fn load_complete(&mut self, info: BeatmapInfo, beatmap: &Beatmap) -> Result<bool> {
        if self.state != SessionState::MapLoading {
            log::warn!("Ignoring load completion in state {}", self.state.as_str());
            return Ok(false);
        }

        let report = match self.scheduler.load(info, beatmap) {
            Ok(report) => report,
            Err(err) => {
                log::error!("Refusing beatmap: {}", err);
                return Err(err);
            }
        };
        self.hit_count = 0;
        self.publish(report);
        self.emit_counters();
        self.transition(SessionState::MapLoaded);
        Ok(true)
    }

    /// Zero the playhead and counters and burst-load again
    fn restart(&mut self) {
        log::info!("Restarting map from the beginning");
        let report = self.scheduler.reset();
        self.hit_count = 0;
        self.publish(report);
        self.emit_counters();
    }

    /// Move the playhead; spawns and evicts targets and walls
    ///
    /// Only a playing session moves; any other state returns an empty report.
    pub fn advance(&mut self, position: f32) -> AdvanceReport {
        if self.state != SessionState::MapPlaying {
            log::trace!("Not advancing in state {}", self.state.as_str());
            return AdvanceReport::default();
        }
        let report = self.scheduler.advance(position);
        self.publish(report.clone());
        report
    }

    /// Run spawn hooks and forward window changes to observers
    fn publish(&mut self, report: AdvanceReport) {
        if let Some(hook) = self.spawn_hook.as_mut() {
            for &id in &report.spawned_targets {
                if let Some(target) = self.scheduler.target_mut(id) {
                    hook(target);
                }
            }
        }

        for (id, was_hit) in report.evicted_targets {
            self.emit(SessionEvent::TargetDespawned { id, was_hit });
        }
        for id in report.evicted_walls {
            self.emit(SessionEvent::WallDespawned { id });
        }
        for id in report.spawned_targets {
            self.emit(SessionEvent::TargetSpawned { id });
        }
        for id in report.spawned_walls {
            self.emit(SessionEvent::WallSpawned { id });
        }
    }

    fn emit_counters(&mut self) {
        let event = SessionEvent::CountersChanged {
            hit_count: self.hit_count,
            total_scorable: self.total_scorable_count(),
        };
        self.emit(event);
    }

    /// Test both sabers against every testable target
    ///
    /// Bounds of testable targets are refreshed first. A saber without a pose
    /// is skipped for this tick. Left is tested before right, so a target in
    /// reach of both goes to the left saber. Nothing is tested unless the
    /// map is playing.
    pub fn test_collisions(&mut self, weapons: &mut WeaponTracker) -> Vec<HitEvent> {
        if self.state != SessionState::MapPlaying {
            return Vec::new();
        }
        let Some(info) = self.scheduler.info() else {
            return Vec::new();
        };
        let beat = self.scheduler.current_beat();

        for target in self.scheduler.targets_mut() {
            if target.is_testable() && !target.is_hit() {
                let (position, orientation) = target.world_transform(beat, info.bpm, info.note_jump_speed);
                target.recompute_bounds(position, orientation);
            }
        }

        let mut hits = Vec::new();
        for hand in Hand::BOTH {
            let Some(volume) = weapons.bounding_volume(hand) else {
                log::debug!("{} saber untracked, skipping its collision tests", hand.as_str());
                continue;
            };
            for target in self.scheduler.targets_mut() {
                let counts = target.spec.kind.scores_for(hand);
                if let Some(hit) = target.test_collision(&volume.bounds, counts) {
                    hits.push(HitEvent {
                        target_id: hit.target_id,
                        scoring: hit.scoring,
                        hand,
                    });
                }
            }
        }

        let haptics = self.settings.haptics;
        let mut scored = false;
        for hit in &hits {
            log::debug!(
                "Hit target {} with {} saber (scoring={})",
                hit.target_id,
                hit.hand.as_str(),
                hit.scoring
            );
            if hit.scoring {
                self.hit_count += 1;
                scored = true;
            }
            weapons.trigger_haptic(hit.hand, haptics.hit_intensity, haptics.hit_duration_ms);
            self.emit(SessionEvent::Hit(*hit));
        }
        if scored {
            self.emit_counters();
        }

        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beatmap::Note;
    use proptest::prelude::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn map_with(notes: Vec<Note>) -> Beatmap {
        Beatmap {
            bpm: None,
            notes,
            obstacles: vec![],
        }
    }

    fn loaded_session(beatmap: &Beatmap) -> Session {
        let mut session = Session::new(Settings::default());
        assert!(session.handle(SessionInput::Ready));
        assert!(session.handle(SessionInput::Trigger(Hand::Right)));
        assert!(session.load_complete(BeatmapInfo::new(120.0, 1.0), beatmap).unwrap());
        session
    }

    fn recorder(session: &mut Session) -> Rc<RefCell<Vec<SessionEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        session.subscribe(Box::new(move |e| sink.borrow_mut().push(*e)));
        events
    }

    #[test]
    fn test_full_lifecycle_fires_callbacks() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut session = Session::new(Settings::default());
        let mk = |name: &'static str| {
            let calls = calls.clone();
            Some(Box::new(move || calls.borrow_mut().push(name)) as Box<dyn FnMut()>)
        };
        session.set_playback_callbacks(PlaybackCallbacks {
            on_begin_load: mk("load"),
            on_play: mk("play"),
            on_pause: mk("pause"),
            on_reset: mk("reset"),
        });

        assert_eq!(session.state(), SessionState::Idle);
        session.handle(SessionInput::Ready);
        assert_eq!(session.state(), SessionState::Menu);
        session.handle(SessionInput::Trigger(Hand::Left));
        assert_eq!(session.state(), SessionState::MapLoading);
        session.load_complete(BeatmapInfo::new(120.0, 1.0), &Beatmap::default()).unwrap();
        assert_eq!(session.state(), SessionState::MapLoaded);
        session.handle(SessionInput::Trigger(Hand::Left));
        assert_eq!(session.state(), SessionState::MapPlaying);
        session.handle(SessionInput::Trigger(Hand::Left));
        assert_eq!(session.state(), SessionState::MapPaused);
        session.handle(SessionInput::Trigger(Hand::Right));
        assert_eq!(session.state(), SessionState::MapPlaying);
        session.handle(SessionInput::PlaybackEnded);
        assert_eq!(session.state(), SessionState::MapEnded);

        assert_eq!(calls.borrow().as_slice(), &["load", "play", "pause", "reset"]);
    }

    #[test]
    fn test_inapplicable_inputs_ignored() {
        let mut session = Session::new(Settings::default());
        assert!(!session.handle(SessionInput::Trigger(Hand::Left)));
        assert!(!session.handle(SessionInput::PlaybackEnded));
        assert_eq!(session.state(), SessionState::Idle);

        session.handle(SessionInput::Ready);
        assert!(!session.handle(SessionInput::Ready));
        assert!(!session.handle(SessionInput::PlaybackEnded));
        assert_eq!(session.state(), SessionState::Menu);

        // Load completion outside map-loading does nothing
        assert!(!session.load_complete(BeatmapInfo::new(120.0, 1.0), &Beatmap::default()).unwrap());
        assert_eq!(session.state(), SessionState::Menu);
    }

    #[test]
    fn test_trigger_after_end_stays_ended() {
        let mut session = loaded_session(&Beatmap::default());
        session.handle(SessionInput::Trigger(Hand::Left));
        session.handle(SessionInput::PlaybackEnded);
        assert_eq!(session.state(), SessionState::MapEnded);

        assert!(!session.handle(SessionInput::Trigger(Hand::Left)));
        assert!(!session.handle(SessionInput::Trigger(Hand::Right)));
        assert_eq!(session.state(), SessionState::MapEnded);
    }

    #[test]
    fn test_malformed_map_keeps_loading_state() {
        let mut session = Session::new(Settings::default());
        session.handle(SessionInput::Ready);
        session.handle(SessionInput::Trigger(Hand::Left));
        let bad = map_with(vec![Note {
            time_beats: 1.0,
            lane_index: 0,
            lane_layer: 0,
            cut_direction: 42,
            note_type: 0,
        }]);
        assert!(session.load_complete(BeatmapInfo::new(120.0, 1.0), &bad).is_err());
        assert_eq!(session.state(), SessionState::MapLoading);
        assert!(!session.handle(SessionInput::Trigger(Hand::Left)));
    }

    #[test]
    fn test_empty_map_ends_only_on_playback_signal() {
        let mut session = loaded_session(&Beatmap::default());
        assert_eq!(session.total_scorable_count(), 0);
        session.handle(SessionInput::Trigger(Hand::Left));
        for i in 0..100 {
            assert!(session.advance(i as f32).is_empty());
        }
        assert!(session.scheduler().targets().is_empty());
        assert_eq!(session.state(), SessionState::MapPlaying);
        session.handle(SessionInput::PlaybackEnded);
        assert_eq!(session.state(), SessionState::MapEnded);
    }

    #[test]
    fn test_spawn_hook_attaches_collision_callbacks() {
        let struck = Rc::new(RefCell::new(Vec::new()));
        let mut session = Session::new(Settings::default());
        let sink = struck.clone();
        session.set_spawn_hook(Box::new(move |target| {
            let sink = sink.clone();
            target
                .set_on_collision(Box::new(move |hit| sink.borrow_mut().push(hit.target_id)))
                .unwrap();
        }));
        session.handle(SessionInput::Ready);
        session.handle(SessionInput::Trigger(Hand::Left));
        let map = map_with(vec![Note {
            time_beats: 1.0,
            lane_index: 0,
            lane_layer: 1,
            cut_direction: 8,
            note_type: 2,
        }]);
        session.load_complete(BeatmapInfo::new(120.0, 1.0), &map).unwrap();
        session.handle(SessionInput::Trigger(Hand::Left));

        let position = session.scheduler().position_for_beat(1.0);
        session.advance(position);
        let target_pos = crate::lane_position(0, 1);
        let mut weapons = WeaponTracker::new(session.settings().weapon);
        weapons.update_pose(Hand::Right, target_pos - Vec3::Y * 0.6, glam::Quat::IDENTITY);

        let hits = session.test_collisions(&mut weapons);
        assert_eq!(hits.len(), 1);
        assert_eq!(struck.borrow().as_slice(), &[hits[0].target_id]);
        assert_eq!(session.hit_count(), 1);
    }

    #[test]
    fn test_restart_zeroes_counters_and_respawns() {
        let map = map_with(vec![Note {
            time_beats: 1.0,
            lane_index: 2,
            lane_layer: 0,
            cut_direction: 0,
            note_type: 1,
        }]);
        let mut session = loaded_session(&map);
        let events = recorder(&mut session);
        session.handle(SessionInput::Trigger(Hand::Left));

        session.advance(session.scheduler().position_for_beat(1.0));
        let mut weapons = WeaponTracker::new(session.settings().weapon);
        weapons.update_pose(Hand::Right, crate::lane_position(2, 0) - Vec3::Y * 0.6, glam::Quat::IDENTITY);
        assert_eq!(session.test_collisions(&mut weapons).len(), 1);
        assert_eq!(session.hit_count(), 1);
        let first_id = session.scheduler().targets()[0].id;

        session.handle(SessionInput::Trigger(Hand::Left)); // pause
        session.handle(SessionInput::Trigger(Hand::Left)); // reset and replay
        assert_eq!(session.state(), SessionState::MapPlaying);
        assert_eq!(session.hit_count(), 0);
        assert_eq!(session.current_beat(), 0.0);
        let targets = session.scheduler().targets();
        assert_eq!(targets.len(), 1);
        assert_ne!(targets[0].id, first_id);
        assert!(!targets[0].is_hit());

        let events = events.borrow();
        assert!(events.contains(&SessionEvent::TargetDespawned {
            id: first_id,
            was_hit: true
        }));
        assert!(events.contains(&SessionEvent::CountersChanged {
            hit_count: 0,
            total_scorable: 1
        }));
    }

    #[test]
    fn test_wrong_hand_hits_without_scoring() {
        let map = map_with(vec![Note {
            time_beats: 2.0,
            lane_index: 1,
            lane_layer: 0,
            cut_direction: 1,
            note_type: 0,
        }]);
        let mut session = loaded_session(&map);
        session.handle(SessionInput::Trigger(Hand::Left));
        session.advance(session.scheduler().position_for_beat(2.0));

        let mut weapons = WeaponTracker::new(session.settings().weapon);
        weapons.update_pose(Hand::Right, crate::lane_position(1, 0) - Vec3::Y * 0.6, glam::Quat::IDENTITY);
        let hits = session.test_collisions(&mut weapons);
        assert_eq!(hits.len(), 1);
        assert!(!hits[0].scoring);
        assert_eq!(hits[0].hand, Hand::Right);
        assert_eq!(session.hit_count(), 0);
        assert!(session.scheduler().targets()[0].is_hit());
    }

    #[test]
    fn test_untracked_sabers_never_hit() {
        let map = map_with(vec![Note {
            time_beats: 2.0,
            lane_index: 1,
            lane_layer: 0,
            cut_direction: 1,
            note_type: 0,
        }]);
        let mut session = loaded_session(&map);
        session.handle(SessionInput::Trigger(Hand::Left));
        session.advance(session.scheduler().position_for_beat(2.0));

        let mut weapons = WeaponTracker::new(session.settings().weapon);
        assert!(session.test_collisions(&mut weapons).is_empty());
        assert!(!session.scheduler().targets()[0].is_hit());
    }

    #[test]
    fn test_no_play_outside_playing_state() {
        let map = map_with(vec![Note {
            time_beats: 1.0,
            lane_index: 1,
            lane_layer: 0,
            cut_direction: 1,
            note_type: 0,
        }]);
        let mut session = loaded_session(&map);
        let mut weapons = WeaponTracker::new(session.settings().weapon);
        weapons.update_pose(Hand::Left, crate::lane_position(1, 0) - Vec3::Y * 0.6, glam::Quat::IDENTITY);

        // map-loaded: playhead stays put
        assert!(session.advance(session.scheduler().position_for_beat(1.0)).is_empty());
        assert_eq!(session.current_beat(), 0.0);

        session.handle(SessionInput::Trigger(Hand::Left));
        session.handle(SessionInput::PlaybackEnded);
        assert_eq!(session.state(), SessionState::MapEnded);

        assert!(session.advance(session.scheduler().position_for_beat(1.0)).is_empty());
        assert_eq!(session.current_beat(), 0.0);
        assert!(session.test_collisions(&mut weapons).is_empty());
        assert_eq!(session.hit_count(), 0);
        assert!(session.scheduler().targets().iter().all(|t| !t.is_hit()));
    }

    fn any_note() -> impl Strategy<Value = Note> {
        (
            0.5f32..8.0,
            0i64..4,
            0i64..3,
            0i64..9,
            prop::sample::select(vec![0i64, 1, 2, 3]),
        )
            .prop_map(|(time_beats, lane_index, lane_layer, cut_direction, note_type)| Note {
                time_beats,
                lane_index,
                lane_layer,
                cut_direction,
                note_type,
            })
    }

    proptest! {
        #[test]
        fn prop_hit_count_bounded_by_scorable_notes(
            notes in prop::collection::vec(any_note(), 0..16),
            placements in prop::collection::vec((0u8..4, 0u8..3, 0u8..4, 0u8..3), 1..48),
        ) {
            let mut session = loaded_session(&map_with(notes));
            session.handle(SessionInput::Trigger(Hand::Left));
            let total = session.total_scorable_count();
            let mut weapons = WeaponTracker::new(session.settings().weapon);

            let mut previous = 0;
            for (step, (ll, ly, rl, ry)) in placements.into_iter().enumerate() {
                // Half a beat per step at 120 bpm and 1 m/s
                session.advance(step as f32 * 0.25);
                weapons.update_pose(Hand::Left, crate::lane_position(ll, ly) - Vec3::Y * 0.6, glam::Quat::IDENTITY);
                weapons.update_pose(Hand::Right, crate::lane_position(rl, ry) - Vec3::Y * 0.6, glam::Quat::IDENTITY);
                session.test_collisions(&mut weapons);

                let count = session.hit_count();
                prop_assert!(count >= previous);
                prop_assert!(count <= total);
                previous = count;
            }
        }
    }
}
