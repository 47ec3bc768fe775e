use engine::Vec2;
use serde::Deserialize;

/// One background layer as it appears in level files.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ParallaxLayerDef {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) start: Vec2,
    /// Sprite bounds; a zero extent disables wrapping on that axis.
    pub(crate) size: Vec2,
    /// 0.0 = static background, 1.0 = moves with the camera.
    #[serde(default)]
    pub(crate) parallax_effect: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParallaxLayer {
    name: String,
    start: Vec2,
    size: Vec2,
    parallax_effect: f32,
    position: Vec2,
}

impl ParallaxLayer {
    pub(crate) fn from_def(def: &ParallaxLayerDef) -> Self {
        Self {
            name: def.name.clone(),
            start: def.start,
            size: def.size,
            parallax_effect: def.parallax_effect,
            position: def.start,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn position(&self) -> Vec2 {
        self.position
    }

    #[cfg(test)]
    pub(crate) fn start(&self) -> Vec2 {
        self.start
    }

    /// Places the layer relative to the camera, then shifts its anchor by one
    /// layer size once the camera has travelled past it.
    pub(crate) fn update(&mut self, camera: Vec2) {
        let offset = camera * self.parallax_effect;
        let travel = camera * (1.0 - self.parallax_effect);
        self.position = self.start + offset;

        self.start.x = wrap_axis(self.start.x, self.size.x, travel.x);
        self.start.y = wrap_axis(self.start.y, self.size.y, travel.y);
    }
}

fn wrap_axis(start: f32, size: f32, travel: f32) -> f32 {
    if size <= 0.0 {
        start
    } else if travel > start + size {
        start + size
    } else if travel < start - size {
        start - size
    } else {
        start
    }
}
