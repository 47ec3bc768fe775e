use engine::{CollisionQuery, LayerMask, Vec2};
use serde::Deserialize;
use tracing::info;

use super::detection::{is_target_visible, ConeShape, VisionPose};

pub(crate) const ALL_AROUND_DEGREES: f32 = 360.0;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct LightTiming {
    pub(crate) green_duration: f32,
    pub(crate) red_duration: f32,
    pub(crate) sight_distance: f32,
}

impl Default for LightTiming {
    fn default() -> Self {
        Self {
            green_duration: 5.0,
            red_duration: 3.0,
            sight_distance: 30.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LightState {
    Green,
    Red,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LightTick {
    Quiet,
    Switched(LightState),
    Detected,
}

/// Green/red cycle. Durations are validated as positive when the level loads.
#[derive(Debug, Clone)]
pub(crate) struct TimedLightSwitch {
    timing: LightTiming,
    position: Vec2,
    state: LightState,
    phase_elapsed: f32,
}

impl TimedLightSwitch {
    pub(crate) fn new(timing: LightTiming, position: Vec2) -> Self {
        Self {
            timing,
            position,
            state: LightState::Green,
            phase_elapsed: 0.0,
        }
    }

    pub(crate) fn state(&self) -> LightState {
        self.state
    }

    pub(crate) fn position(&self) -> Vec2 {
        self.position
    }

    #[cfg(test)]
    pub(crate) fn phase_elapsed(&self) -> f32 {
        self.phase_elapsed
    }

    /// Advances the phase timer, then, while red, looks for the player all
    /// around the light. Surplus time carries into the next phase. A `None`
    /// target keeps the cycle running without looking.
    pub(crate) fn update(
        &mut self,
        dt: f32,
        player: Option<Vec2>,
        obstacle_mask: LayerMask,
        collision: &dyn CollisionQuery,
    ) -> LightTick {
        let switched = self.advance(dt);
        if self.state == LightState::Red {
            if let Some(player) = player {
                if self.sees(player, obstacle_mask, collision) {
                    return LightTick::Detected;
                }
            }
        }
        match switched {
            Some(state) => LightTick::Switched(state),
            None => LightTick::Quiet,
        }
    }

    fn advance(&mut self, dt: f32) -> Option<LightState> {
        self.phase_elapsed += dt;
        let mut switched = None;
        loop {
            let duration = self.phase_duration();
            if duration <= 0.0 || self.phase_elapsed < duration {
                break;
            }
            self.phase_elapsed -= duration;
            self.state = match self.state {
                LightState::Green => LightState::Red,
                LightState::Red => LightState::Green,
            };
            match self.state {
                LightState::Green => info!(x = self.position.x, y = self.position.y, "light_green"),
                LightState::Red => info!(x = self.position.x, y = self.position.y, "light_red"),
            }
            switched = Some(self.state);
        }
        switched
    }

    fn phase_duration(&self) -> f32 {
        match self.state {
            LightState::Green => self.timing.green_duration,
            LightState::Red => self.timing.red_duration,
        }
    }

    fn sees(&self, player: Vec2, obstacle_mask: LayerMask, collision: &dyn CollisionQuery) -> bool {
        is_target_visible(
            VisionPose {
                origin: self.position,
                facing_radians: 0.0,
            },
            player,
            ConeShape {
                angle_degrees: ALL_AROUND_DEGREES,
                distance: self.timing.sight_distance,
            },
            obstacle_mask,
            collision,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::{ColliderSet, WorldAabb};

    const DT: f32 = 0.25;

    fn light() -> TimedLightSwitch {
        TimedLightSwitch::new(LightTiming::default(), Vec2::ZERO)
    }

    #[test]
    fn green_never_detects() {
        let colliders = ColliderSet::default();
        let mut light = light();
        for _ in 0..19 {
            let tick = light.update(DT, Some(Vec2::new(1.0, 0.0)), LayerMask::OBSTACLE, &colliders);
            assert_eq!(tick, LightTick::Quiet);
        }
        assert_eq!(light.state(), LightState::Green);
    }

    #[test]
    fn red_phase_detects_visible_player() {
        let colliders = ColliderSet::default();
        let mut light = light();
        let far_away = Some(Vec2::new(100.0, 0.0));
        let mut ticks = 0;
        while light.state() == LightState::Green {
            let tick = light.update(DT, far_away, LayerMask::OBSTACLE, &colliders);
            ticks += 1;
            if light.state() == LightState::Red {
                assert_eq!(tick, LightTick::Switched(LightState::Red));
            }
        }
        assert_eq!(ticks, 20);
        let tick = light.update(DT, Some(Vec2::new(-3.0, 2.0)), LayerMask::OBSTACLE, &colliders);
        assert_eq!(tick, LightTick::Detected);
    }

    #[test]
    fn cover_hides_player_from_red_light() {
        let mut colliders = ColliderSet::default();
        colliders.insert(
            WorldAabb {
                min: Vec2::new(1.0, -1.0),
                max: Vec2::new(2.0, 1.0),
            },
            LayerMask::OBSTACLE,
        );
        let mut light = light();
        light.update(5.0, Some(Vec2::new(100.0, 0.0)), LayerMask::OBSTACLE, &colliders);
        assert_eq!(light.state(), LightState::Red);
        let tick = light.update(DT, Some(Vec2::new(4.0, 0.0)), LayerMask::OBSTACLE, &colliders);
        assert_eq!(tick, LightTick::Quiet);
    }

    #[test]
    fn surplus_time_carries_into_next_phase() {
        let colliders = ColliderSet::default();
        let mut light = light();
        let far_away = Some(Vec2::new(100.0, 0.0));
        assert_eq!(
            light.update(5.5, far_away, LayerMask::OBSTACLE, &colliders),
            LightTick::Switched(LightState::Red)
        );
        assert!((light.phase_elapsed() - 0.5).abs() < 1.0e-5);
        assert_eq!(
            light.update(2.5, far_away, LayerMask::OBSTACLE, &colliders),
            LightTick::Switched(LightState::Green)
        );
        assert!(light.phase_elapsed().abs() < 1.0e-5);
    }

    #[test]
    fn long_frame_crosses_several_phases() {
        let colliders = ColliderSet::default();
        let mut light = light();
        light.update(9.0, None, LayerMask::OBSTACLE, &colliders);
        assert_eq!(light.state(), LightState::Green);
        assert!((light.phase_elapsed() - 1.0).abs() < 1.0e-5);
    }
}
