use engine::{CollisionQuery, LayerMask, Vec2};

pub(crate) const DEFAULT_PLAYER_SPEED: f32 = 5.0;
/// Gap kept between the player and an obstacle it walks into.
pub(crate) const PLAYER_SKIN_DISTANCE: f32 = 0.05;

#[derive(Debug, Clone)]
pub(crate) struct PlayerMotor {
    position: Vec2,
    move_speed: f32,
    enabled: bool,
}

impl PlayerMotor {
    pub(crate) fn new(position: Vec2, move_speed: f32) -> Self {
        Self {
            position,
            move_speed,
            enabled: true,
        }
    }

    pub(crate) fn position(&self) -> Vec2 {
        self.position
    }

    #[cfg(test)]
    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Moves along the normalized input axis. Each axis is clipped on its own
    /// so the player slides along walls instead of sticking to them.
    pub(crate) fn step(
        &mut self,
        axis: Vec2,
        dt: f32,
        obstacle_mask: LayerMask,
        collision: &dyn CollisionQuery,
    ) -> Vec2 {
        if !self.enabled {
            return self.position;
        }
        let delta = axis.normalized_or_zero() * (self.move_speed * dt);
        for component in [Vec2::new(delta.x, 0.0), Vec2::new(0.0, delta.y)] {
            self.position += clip_step(self.position, component, obstacle_mask, collision);
        }
        self.position
    }
}

fn clip_step(
    origin: Vec2,
    delta: Vec2,
    obstacle_mask: LayerMask,
    collision: &dyn CollisionQuery,
) -> Vec2 {
    let Some(direction) = delta.try_normalized() else {
        return Vec2::ZERO;
    };
    let length = delta.length();
    match collision.raycast_first_hit(origin, direction, length + PLAYER_SKIN_DISTANCE, obstacle_mask)
    {
        Some(hit) => direction * (hit.distance - PLAYER_SKIN_DISTANCE).clamp(0.0, length),
        None => delta,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::{ColliderSet, WorldAabb};

    fn assert_vec2_close(actual: Vec2, expected: Vec2) {
        assert!(
            actual.distance(expected) < 1.0e-4,
            "expected {expected:?}, got {actual:?}"
        );
    }

    #[test]
    fn diagonal_input_is_normalized() {
        let colliders = ColliderSet::default();
        let mut motor = PlayerMotor::new(Vec2::ZERO, 2.0);
        let position = motor.step(Vec2::new(1.0, 1.0), 1.0, LayerMask::OBSTACLE, &colliders);
        let expected = std::f32::consts::SQRT_2;
        assert_vec2_close(position, Vec2::new(expected, expected));
    }

    #[test]
    fn obstacle_stops_the_player_short() {
        let mut colliders = ColliderSet::default();
        colliders.insert(
            WorldAabb {
                min: Vec2::new(1.0, -1.0),
                max: Vec2::new(2.0, 1.0),
            },
            LayerMask::OBSTACLE,
        );
        let mut motor = PlayerMotor::new(Vec2::ZERO, 5.0);
        for _ in 0..10 {
            motor.step(Vec2::new(1.0, 0.0), 0.1, LayerMask::OBSTACLE, &colliders);
        }
        assert_vec2_close(motor.position(), Vec2::new(1.0 - PLAYER_SKIN_DISTANCE, 0.0));
    }

    #[test]
    fn blocked_axis_still_lets_the_other_slide() {
        let mut colliders = ColliderSet::default();
        colliders.insert(
            WorldAabb {
                min: Vec2::new(0.5, -10.0),
                max: Vec2::new(1.0, 10.0),
            },
            LayerMask::OBSTACLE,
        );
        let mut motor = PlayerMotor::new(Vec2::new(0.45, 0.0), 1.0);
        motor.step(Vec2::new(1.0, 1.0), 1.0, LayerMask::OBSTACLE, &colliders);
        assert!(motor.position().x <= 0.45 + 1.0e-4);
        assert!(motor.position().y > 0.5);
    }

    #[test]
    fn disabled_motor_does_not_move() {
        let colliders = ColliderSet::default();
        let mut motor = PlayerMotor::new(Vec2::new(3.0, 3.0), 5.0);
        motor.set_enabled(false);
        motor.step(Vec2::new(1.0, 0.0), 1.0, LayerMask::OBSTACLE, &colliders);
        assert_eq!(motor.position(), Vec2::new(3.0, 3.0));
        assert!(!motor.is_enabled());
    }
}
