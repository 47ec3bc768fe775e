mod collision;
mod input;
mod loop_runner;
mod scene;

pub use collision::{ColliderId, ColliderSet, CollisionQuery, LayerMask, RaycastHit, WorldAabb};
pub use input::{
    IdleInput, InputAction, InputScript, InputScriptError, InputSnapshot, InputSource,
    ScriptedInput, ScriptedPress, ScriptedStep,
};
pub use loop_runner::{run_headless, LoopConfig, LoopSummary, StopReason};
pub use scene::{
    Camera2D, Entity, EntityId, RenderableDesc, Scene, SceneCommand, SceneMachine, SceneWorld,
    Transform, Vec2,
};
