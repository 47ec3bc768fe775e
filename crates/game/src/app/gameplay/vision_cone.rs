use engine::Vec2;

pub(crate) const DEFAULT_CONE_SEGMENTS: u32 = 20;

/// Triangle-fan mesh of a vision sector in the owner's local frame. The apex
/// is vertex 0 at the origin and the sector opens along local +X.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct VisionMesh {
    pub(crate) vertices: Vec<Vec2>,
    pub(crate) triangles: Vec<[u32; 3]>,
}

impl VisionMesh {
    pub(crate) fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.vertices.clear();
        self.triangles.clear();
    }
}

/// Samples the arc `[-angle/2, +angle/2]` at `angle / segments` steps.
/// `segments == 0` or a non-positive distance yields an empty mesh.
pub(crate) fn generate_cone(angle_degrees: f32, distance: f32, segments: u32) -> VisionMesh {
    if segments == 0 || !distance.is_finite() || distance <= 0.0 || !angle_degrees.is_finite() {
        return VisionMesh::default();
    }

    let angle = angle_degrees.clamp(0.0, 360.0);
    let angle_step = angle / segments as f32;
    let mut vertices = Vec::with_capacity(segments as usize + 2);
    let mut triangles = Vec::with_capacity(segments as usize);

    vertices.push(Vec2::ZERO);
    for i in 0..=segments {
        let current_angle = -angle / 2.0 + angle_step * i as f32;
        vertices.push(Vec2::from_angle(current_angle.to_radians()) * distance);
        if i < segments {
            triangles.push([0, i + 1, i + 2]);
        }
    }

    VisionMesh {
        vertices,
        triangles,
    }
}
