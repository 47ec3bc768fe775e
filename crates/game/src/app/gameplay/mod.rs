pub(crate) mod detection;
pub(crate) mod dialogue;
pub(crate) mod effects;
pub(crate) mod light_switch;
pub(crate) mod parallax;
pub(crate) mod patrol;
pub(crate) mod player;
mod scene;
pub(crate) mod vision_cone;
pub(crate) mod words;

pub(crate) use scene::{LevelAssets, StealthScene};

#[cfg(test)]
mod tests;
