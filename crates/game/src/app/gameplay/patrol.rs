use std::f32::consts::{PI, TAU};

use engine::Vec2;
use serde::Deserialize;
use thiserror::Error;

use super::detection::{ConeShape, VisionPose};
use super::vision_cone::{generate_cone, VisionMesh, DEFAULT_CONE_SEGMENTS};

pub(crate) const ARRIVAL_EPSILON: f32 = 0.1;
const MESH_ANGLE_EPSILON: f32 = 1.0e-4;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct PatrolTuning {
    pub(crate) move_speed: f32,
    pub(crate) wait_time: f32,
    /// Cone angle in degrees while travelling.
    pub(crate) vision_angle: f32,
    /// Cone angle in degrees while waiting at a waypoint.
    pub(crate) vision_angle_idle: f32,
    pub(crate) vision_distance: f32,
    pub(crate) rotation_speed: f32,
    pub(crate) vision_change_speed: f32,
    pub(crate) look_around_degrees: f32,
    pub(crate) segments: u32,
}

impl Default for PatrolTuning {
    fn default() -> Self {
        Self {
            move_speed: 2.0,
            wait_time: 2.0,
            vision_angle: 45.0,
            vision_angle_idle: 90.0,
            vision_distance: 5.0,
            rotation_speed: 2.0,
            vision_change_speed: 2.0,
            look_around_degrees: 90.0,
            segments: DEFAULT_CONE_SEGMENTS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PatrolPhase {
    Moving,
    Waiting,
    Alerted,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PatrolState {
    pub(crate) current_index: usize,
    pub(crate) wait_elapsed: f32,
    pub(crate) vision_angle_current: f32,
    pub(crate) facing: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PatrolTransition {
    Arrived { waypoint_index: usize },
    Departed { waypoint_index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub(crate) enum PatrolError {
    #[error("patrol route needs at least one waypoint")]
    NoWaypoints,
}

#[derive(Debug, Clone)]
pub(crate) struct PatrolStateMachine {
    tuning: PatrolTuning,
    waypoints: Vec<Vec2>,
    position: Vec2,
    phase: PatrolPhase,
    state: PatrolState,
    facing_target: f32,
    sweep_origin: f32,
    mesh: VisionMesh,
    mesh_angle: Option<f32>,
    vision_hidden: bool,
}

impl PatrolStateMachine {
    pub(crate) fn new(
        tuning: PatrolTuning,
        waypoints: Vec<Vec2>,
        start_position: Vec2,
        initial_facing: f32,
    ) -> Result<Self, PatrolError> {
        if waypoints.is_empty() {
            return Err(PatrolError::NoWaypoints);
        }
        let mut machine = Self {
            tuning,
            waypoints,
            position: start_position,
            phase: PatrolPhase::Moving,
            state: PatrolState {
                current_index: 0,
                wait_elapsed: 0.0,
                vision_angle_current: tuning.vision_angle,
                facing: initial_facing,
            },
            facing_target: initial_facing,
            sweep_origin: initial_facing,
            mesh: VisionMesh::default(),
            mesh_angle: None,
            vision_hidden: false,
        };
        machine.refresh_mesh();
        Ok(machine)
    }

    pub(crate) fn tick(&mut self, dt: f32) -> Option<PatrolTransition> {
        let transition = match self.phase {
            PatrolPhase::Moving => self.tick_moving(dt),
            PatrolPhase::Waiting => self.tick_waiting(dt),
            PatrolPhase::Alerted => return None,
        };

        let t = ease_factor(dt, self.tuning.rotation_speed);
        self.state.facing = lerp_angle(self.state.facing, self.facing_target, t);
        self.refresh_mesh();
        transition
    }

    fn tick_moving(&mut self, dt: f32) -> Option<PatrolTransition> {
        let index = self.state.current_index;
        let target = self.waypoints[index];
        self.position = self
            .position
            .move_towards(target, self.tuning.move_speed * dt);

        let mut transition = None;
        if self.position.distance(target) < ARRIVAL_EPSILON {
            self.phase = PatrolPhase::Waiting;
            self.state.wait_elapsed = 0.0;
            self.sweep_origin = self.state.facing;
            transition = Some(PatrolTransition::Arrived {
                waypoint_index: index,
            });
        }

        if let Some(direction) = (target - self.position).try_normalized() {
            self.facing_target = direction.angle();
        }
        self.ease_vision_angle(self.tuning.vision_angle, dt);
        transition
    }

    fn tick_waiting(&mut self, dt: f32) -> Option<PatrolTransition> {
        self.state.wait_elapsed += dt;
        if self.state.wait_elapsed >= self.tuning.wait_time {
            self.phase = PatrolPhase::Moving;
            self.state.wait_elapsed = 0.0;
            self.state.current_index = (self.state.current_index + 1) % self.waypoints.len();
            return Some(PatrolTransition::Departed {
                waypoint_index: self.state.current_index,
            });
        }

        let sweep = (self.state.wait_elapsed * self.tuning.rotation_speed).sin()
            * self.tuning.look_around_degrees.to_radians();
        self.facing_target = wrap_angle(self.sweep_origin + sweep);
        self.ease_vision_angle(self.tuning.vision_angle_idle, dt);
        None
    }

    fn ease_vision_angle(&mut self, target_angle: f32, dt: f32) {
        let t = ease_factor(dt, self.tuning.vision_change_speed);
        let current = self.state.vision_angle_current;
        self.state.vision_angle_current = current + (target_angle - current) * t;
    }

    fn refresh_mesh(&mut self) {
        if self.vision_hidden {
            return;
        }
        let angle = self.state.vision_angle_current;
        let unchanged = self
            .mesh_angle
            .is_some_and(|last| (last - angle).abs() <= MESH_ANGLE_EPSILON);
        if unchanged && !self.mesh.is_empty() {
            return;
        }
        self.mesh = generate_cone(angle, self.tuning.vision_distance, self.tuning.segments);
        self.mesh_angle = Some(angle);
    }

    /// Freezes the machine after the owner reported a detection.
    pub(crate) fn alert(&mut self) {
        self.phase = PatrolPhase::Alerted;
    }

    pub(crate) fn hide_vision(&mut self) {
        self.vision_hidden = true;
        self.mesh.clear();
        self.mesh_angle = None;
    }

    pub(crate) fn restore_vision(&mut self) {
        self.vision_hidden = false;
        self.refresh_mesh();
    }

    pub(crate) fn is_vision_hidden(&self) -> bool {
        self.vision_hidden
    }

    #[cfg(test)]
    pub(crate) fn phase(&self) -> PatrolPhase {
        self.phase
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> &PatrolState {
        &self.state
    }

    #[cfg(test)]
    pub(crate) fn is_waiting(&self) -> bool {
        self.phase == PatrolPhase::Waiting
    }

    #[cfg(test)]
    pub(crate) fn position(&self) -> Vec2 {
        self.position
    }

    #[cfg(test)]
    pub(crate) fn current_target(&self) -> Vec2 {
        self.waypoints[self.state.current_index]
    }

    pub(crate) fn mesh(&self) -> &VisionMesh {
        &self.mesh
    }

    pub(crate) fn pose(&self) -> VisionPose {
        VisionPose {
            origin: self.position,
            facing_radians: self.state.facing,
        }
    }

    pub(crate) fn cone_shape(&self) -> ConeShape {
        ConeShape {
            angle_degrees: self.state.vision_angle_current,
            distance: self.tuning.vision_distance,
        }
    }
}

/// Exponential smoothing factor; stays in `0..=1` for any frame time.
pub(crate) fn ease_factor(dt: f32, rate: f32) -> f32 {
    (dt * rate).clamp(0.0, 1.0)
}

pub(crate) fn wrap_angle(radians: f32) -> f32 {
    let wrapped = (radians + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Interpolates along the shorter arc between two headings.
pub(crate) fn lerp_angle(from: f32, to: f32, t: f32) -> f32 {
    let delta = wrap_angle(to - from);
    wrap_angle(from + delta * t)
}
