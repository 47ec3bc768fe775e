use engine::{CollisionQuery, LayerMask, Vec2};

const COINCIDENT_TARGET_EPSILON: f32 = 1.0e-4;
const BLOCK_EPSILON: f32 = 1.0e-3;
const ANGLE_EPSILON_DEGREES: f32 = 1.0e-3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct VisionPose {
    pub(crate) origin: Vec2,
    pub(crate) facing_radians: f32,
}

impl VisionPose {
    pub(crate) fn forward(&self) -> Vec2 {
        Vec2::from_angle(self.facing_radians)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ConeShape {
    pub(crate) angle_degrees: f32,
    pub(crate) distance: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum DetectionCheck {
    Visible { distance: f32 },
    OutOfRange { distance: f32 },
    OutsideAngle { angle_degrees: f32 },
    Blocked { hit_distance: f32 },
}

impl DetectionCheck {
    pub(crate) fn is_visible(&self) -> bool {
        matches!(self, Self::Visible { .. })
    }
}

/// Range, then angle, then line of sight. Only the final step touches the
/// collision collaborator; a missing hit means nothing is in the way.
pub(crate) fn check_target(
    pose: VisionPose,
    target: Vec2,
    cone: ConeShape,
    obstacle_mask: LayerMask,
    collision: &dyn CollisionQuery,
) -> DetectionCheck {
    let to_target = target - pose.origin;
    let distance = to_target.length();
    if distance > cone.distance {
        return DetectionCheck::OutOfRange { distance };
    }
    if distance <= COINCIDENT_TARGET_EPSILON {
        return DetectionCheck::Visible { distance };
    }

    let angle_degrees = pose.forward().angle_between(to_target).to_degrees();
    if angle_degrees > cone.angle_degrees / 2.0 + ANGLE_EPSILON_DEGREES {
        return DetectionCheck::OutsideAngle { angle_degrees };
    }

    match collision.raycast_first_hit(pose.origin, to_target, distance, obstacle_mask) {
        Some(hit) if hit.distance + BLOCK_EPSILON < distance => DetectionCheck::Blocked {
            hit_distance: hit.distance,
        },
        _ => DetectionCheck::Visible { distance },
    }
}

pub(crate) fn is_target_visible(
    pose: VisionPose,
    target: Vec2,
    cone: ConeShape,
    obstacle_mask: LayerMask,
    collision: &dyn CollisionQuery,
) -> bool {
    check_target(pose, target, cone, obstacle_mask, collision).is_visible()
}
