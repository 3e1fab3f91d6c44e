//! Timeline scheduler
//!
//! Walks the sorted notes and obstacles with two cursors, materializing only
//! what is inside the spawn horizon and evicting what has fallen behind the
//! despawn horizon. The sorted arrays are never rescanned from the start.

use super::target::{Target, TargetSpec, Wall, WallSpec};
use crate::beatmap::{Beatmap, BeatmapInfo};
use crate::error::Result;
use crate::settings::SchedulerSettings;
use crate::{beats_to_position, position_to_beats};

/// What changed during a load or advance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdvanceReport {
    pub spawned_targets: Vec<u32>,
    /// Evicted target ids with their hit state
    pub evicted_targets: Vec<(u32, bool)>,
    pub spawned_walls: Vec<u32>,
    pub evicted_walls: Vec<u32>,
}

impl AdvanceReport {
    pub fn is_empty(&self) -> bool {
        self.spawned_targets.is_empty()
            && self.evicted_targets.is_empty()
            && self.spawned_walls.is_empty()
            && self.evicted_walls.is_empty()
    }
}

/// Sorted event stream plus the live window over it
#[derive(Debug)]
pub struct Scheduler {
    settings: SchedulerSettings,
    info: Option<BeatmapInfo>,
    notes: Vec<TargetSpec>,
    obstacles: Vec<WallSpec>,
    cursor: usize,
    wall_cursor: usize,
    current_beat: f32,
    targets: Vec<Target>,
    walls: Vec<Wall>,
    total_scorable: u32,
    next_id: u32,
}

impl Scheduler {
    pub fn new(settings: SchedulerSettings) -> Self {
        Self {
            settings,
            info: None,
            notes: Vec::new(),
            obstacles: Vec::new(),
            cursor: 0,
            wall_cursor: 0,
            current_beat: 0.0,
            targets: Vec::new(),
            walls: Vec::new(),
            total_scorable: 0,
            next_id: 1,
        }
    }

    /// Validate, sort and burst-load a beatmap
    ///
    /// Every record is validated before anything changes; a single malformed
    /// note refuses the whole map and leaves the scheduler as it was.
    pub fn load(&mut self, info: BeatmapInfo, beatmap: &Beatmap) -> Result<AdvanceReport> {
        info.validate()?;
        let mut notes = beatmap
            .notes
            .iter()
            .enumerate()
            .map(|(i, n)| n.to_spec(i))
            .collect::<Result<Vec<_>>>()?;
        let mut obstacles = beatmap
            .obstacles
            .iter()
            .enumerate()
            .map(|(i, o)| o.to_spec(i))
            .collect::<Result<Vec<_>>>()?;

        // Stable: ties keep beatmap order
        notes.sort_by(|a, b| a.time_beats.total_cmp(&b.time_beats));
        obstacles.sort_by(|a, b| a.time_beats.total_cmp(&b.time_beats));

        self.total_scorable = notes.iter().filter(|n| n.kind.is_scorable()).count() as u32;
        self.notes = notes;
        self.obstacles = obstacles;
        self.info = Some(info);

        log::info!(
            "Loaded beatmap: bpm={}, speed={}, notes={} ({} scorable), obstacles={}",
            info.bpm,
            info.note_jump_speed,
            self.notes.len(),
            self.total_scorable,
            self.obstacles.len()
        );

        Ok(self.reset())
    }

    /// Drop the live window and burst-load from beat 0 again
    pub fn reset(&mut self) -> AdvanceReport {
        let mut report = AdvanceReport::default();
        report.evicted_targets = self.targets.drain(..).map(|t| (t.id, t.is_hit())).collect();
        report.evicted_walls = self.walls.drain(..).map(|w| w.id).collect();
        self.cursor = 0;
        self.wall_cursor = 0;
        self.current_beat = 0.0;

        if self.info.is_some() {
            self.step(0.0, &mut report);
        }
        report
    }

    /// Move the playhead to `position` (meters travelled)
    pub fn advance(&mut self, position: f32) -> AdvanceReport {
        let mut report = AdvanceReport::default();
        let Some(info) = self.info else {
            return report;
        };
        let beat = position_to_beats(position, info.bpm, info.note_jump_speed);
        self.step(beat, &mut report);
        report
    }

    fn step(&mut self, beat: f32, report: &mut AdvanceReport) {
        let (bpm, speed) = self.tempo();
        let threshold = self.settings.testable_distance;
        self.current_beat = beat;

        for target in &mut self.targets {
            let distance = target.distance_to_player(beat, bpm, speed);
            target.update_testable(distance, threshold);
        }

        let spawn_limit = beat + self.settings.spawn_horizon_beats;
        while let Some(spec) = self.notes.get(self.cursor).copied() {
            if spec.time_beats > spawn_limit {
                break;
            }
            let id = self.next_entity_id();
            let mut target = Target::new(id, spec);
            target.update_testable(target.distance_to_player(beat, bpm, speed), threshold);
            log::debug!("Spawn target {} at beat {}", id, spec.time_beats);
            self.targets.push(target);
            report.spawned_targets.push(id);
            self.cursor += 1;
        }

        while let Some(spec) = self.obstacles.get(self.wall_cursor).copied() {
            if spec.time_beats > spawn_limit {
                break;
            }
            let id = self.next_entity_id();
            log::debug!("Spawn wall {} at beat {}", id, spec.time_beats);
            self.walls.push(Wall::new(id, spec));
            report.spawned_walls.push(id);
            self.wall_cursor += 1;
        }

        let despawn_limit = beat - self.settings.despawn_horizon_beats;
        self.targets.retain(|t| {
            let keep = t.spec.time_beats >= despawn_limit;
            if !keep {
                log::debug!("Despawn target {} (hit={})", t.id, t.is_hit());
                report.evicted_targets.push((t.id, t.is_hit()));
            }
            keep
        });
        self.walls.retain(|w| {
            let keep = w.end_beats() >= despawn_limit;
            if !keep {
                log::debug!("Despawn wall {}", w.id);
                report.evicted_walls.push(w.id);
            }
            keep
        });
    }

    /// Allocate a new entity ID
    fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn tempo(&self) -> (f32, f32) {
        self.info
            .map(|i| (i.bpm, i.note_jump_speed))
            .unwrap_or((60.0, 1.0))
    }

    pub fn is_loaded(&self) -> bool {
        self.info.is_some()
    }

    pub fn info(&self) -> Option<BeatmapInfo> {
        self.info
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[inline]
    pub fn wall_cursor(&self) -> usize {
        self.wall_cursor
    }

    #[inline]
    pub fn current_beat(&self) -> f32 {
        self.current_beat
    }

    pub fn total_scorable(&self) -> u32 {
        self.total_scorable
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn targets_mut(&mut self) -> &mut [Target] {
        &mut self.targets
    }

    pub fn target_mut(&mut self, id: u32) -> Option<&mut Target> {
        self.targets.iter_mut().find(|t| t.id == id)
    }

    pub fn walls(&self) -> &[Wall] {
        &self.walls
    }

    /// Every note and obstacle has been spawned and evicted
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.notes.len()
            && self.wall_cursor >= self.obstacles.len()
            && self.targets.is_empty()
            && self.walls.is_empty()
    }

    /// Beat of the last note or obstacle end, 0 for an empty map
    pub fn last_beat(&self) -> f32 {
        let notes = self.notes.last().map(|n| n.time_beats).unwrap_or(0.0);
        let walls = self
            .obstacles
            .iter()
            .map(|o| o.time_beats + o.duration_beats)
            .fold(0.0, f32::max);
        notes.max(walls)
    }

    /// Playback position (meters) at which `beats` is reached
    pub fn position_for_beat(&self, beats: f32) -> f32 {
        let (bpm, speed) = self.tempo();
        beats_to_position(beats, bpm, speed)
    }
}
