use serde::{Deserialize, Serialize};

use super::scene::Vec2;

const PARALLEL_EPSILON: f32 = 1.0e-6;

/// Bit set of collision layers. A collider matches a mask when their bits
/// intersect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const NONE: LayerMask = LayerMask(0);
    pub const OBSTACLE: LayerMask = LayerMask(1 << 0);
    pub const PLAYER: LayerMask = LayerMask(1 << 1);
    pub const ENEMY: LayerMask = LayerMask(1 << 2);
    pub const ALL: LayerMask = LayerMask(u32::MAX);

    pub const fn intersects(self, other: LayerMask) -> bool {
        self.0 & other.0 != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldAabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl WorldAabb {
    /// Slab test; returns the entry distance along a normalized ray, `0.0`
    /// when the origin is already inside the box.
    pub fn ray_distance(
        &self,
        origin: Vec2,
        dir_normalized: Vec2,
        max_distance: f32,
    ) -> Option<f32> {
        let mut tmin = 0.0f32;
        let mut tmax = max_distance.max(0.0);

        for axis in 0..2 {
            let (o, d, mn, mx) = if axis == 0 {
                (origin.x, dir_normalized.x, self.min.x, self.max.x)
            } else {
                (origin.y, dir_normalized.y, self.min.y, self.max.y)
            };
            if d.abs() < PARALLEL_EPSILON {
                if o < mn || o > mx {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let mut t1 = (mn - o) * inv;
            let mut t2 = (mx - o) * inv;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }
            tmin = tmin.max(t1);
            tmax = tmax.min(t2);
            if tmin > tmax {
                return None;
            }
        }

        if tmax < 0.0 {
            return None;
        }
        (tmin <= max_distance).then_some(tmin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColliderId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    pub collider: ColliderId,
    pub point: Vec2,
    pub distance: f32,
}

/// Physics query surface used by detection and movement.
pub trait CollisionQuery {
    fn raycast_first_hit(
        &self,
        origin: Vec2,
        direction: Vec2,
        max_distance: f32,
        mask: LayerMask,
    ) -> Option<RaycastHit>;
}

#[derive(Debug, Clone, Copy)]
struct Collider {
    id: ColliderId,
    bounds: WorldAabb,
    layer: LayerMask,
}

/// Static axis-aligned colliders, queried by linear scan.
#[derive(Debug, Clone, Default)]
pub struct ColliderSet {
    colliders: Vec<Collider>,
    next_id: u32,
}

impl ColliderSet {
    pub fn insert(&mut self, bounds: WorldAabb, layer: LayerMask) -> ColliderId {
        let id = ColliderId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        self.colliders.push(Collider { id, bounds, layer });
        id
    }

    pub fn clear(&mut self) {
        self.colliders.clear();
        self.next_id = 0;
    }

    pub fn len(&self) -> usize {
        self.colliders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }
}

impl CollisionQuery for ColliderSet {
    fn raycast_first_hit(
        &self,
        origin: Vec2,
        direction: Vec2,
        max_distance: f32,
        mask: LayerMask,
    ) -> Option<RaycastHit> {
        let dir = direction.try_normalized()?;
        self.colliders
            .iter()
            .filter(|collider| collider.layer.intersects(mask))
            .filter_map(|collider| {
                collider
                    .bounds
                    .ray_distance(origin, dir, max_distance)
                    .map(|distance| RaycastHit {
                        collider: collider.id,
                        point: origin + dir * distance,
                        distance,
                    })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}
